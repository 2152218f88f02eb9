mod document;
mod field_path;

pub use document::*;
pub use field_path::*;
