//! The datastore: a single-writer queue in front of the document arena, its indexes and
//! its datafile.

mod cursor;
mod datastore;
mod engine;
mod event;
mod executor;
mod options;

pub use cursor::*;
pub use datastore::*;
pub use event::*;
pub use executor::{LoadHook, Pending};
pub use options::*;
