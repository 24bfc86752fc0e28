//! Pad a logo onto a solid background so that it covers a fixed central
//! fraction of the output, for launcher icons that crop their edges.

pub mod config;
pub mod error;
pub mod padded_logo;

pub use config::{AlphaMode, PadConfig};
pub use error::PadError;
pub use padded_logo::{
    compute_layout, encode_png, generate, load_source, pad_image, verify_layout, write_padded,
    Layout, LayoutCheck, PadOptions, PadReport, MAX_CANVAS_BYTES,
};
