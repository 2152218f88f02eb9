//! Durable storage: the line format of documents and the append-only datafile.

mod log_record;
mod model;
mod persistence;

pub use log_record::*;
pub use model::*;
pub use persistence::*;
