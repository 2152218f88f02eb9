mod modifier;
mod update_spec;

pub use modifier::*;
pub use update_spec::*;
