mod field_index;
mod index_key;
mod options;
mod registry;

pub use field_index::*;
pub use index_key::*;
pub use options::*;
pub use registry::*;
