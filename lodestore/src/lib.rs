#![allow(dead_code, clippy::module_inception)]
//! # Lodestore - Embedded Document Datastore
//!
//! Lodestore is an embedded, single-process document datastore. Schema-less documents are
//! kept in memory, indexed by any number of secondary indexes and durably logged to an
//! append-only datafile that is compacted periodically.
//!
//! ## Key Features
//!
//! - **Embedded**: No separate server process required
//! - **Documents**: Schema-less nested documents with dates, arrays and sub-documents
//! - **Queries**: Mongo style query documents or a fluent API, with sort, skip, limit and
//!   projection
//! - **Updates**: Modifiers (`$set`, `$inc`, `$push`, ...) or whole-document replacement
//! - **Indexing**: Unique, sparse, compound, multi-key and TTL indexes
//! - **Atomic batches**: Multi-document inserts and updates are all-or-nothing
//! - **Durability**: Append-only log with crash-safe compaction
//! - **Events**: Listeners for load and compaction events
//!
//! ## Quick Start
//!
//! ```rust
//! use lodestore::datastore_builder::DatastoreBuilder;
//! use lodestore::datastore::UpdateOptions;
//! use lodestore::doc;
//! use lodestore::filter::field;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatastoreBuilder::default().in_memory().open()?;
//!
//! db.insert(doc! { planet: "Mars", system: "solar", moons: 2 })?;
//! db.insert(doc! { planet: "Earth", system: "solar", moons: 1 })?;
//!
//! let solar = db.find(doc! { system: "solar" }).sort(doc! { planet: 1 }).exec()?;
//! assert_eq!(solar.len(), 2);
//!
//! db.update(
//!     field("planet").eq("Mars"),
//!     doc! { "$set": { inhabited: false } },
//!     UpdateOptions::default(),
//! )?;
//! assert_eq!(db.count(doc! { inhabited: false })?, 1);
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Pattern
//!
//! Public handles ([datastore::Datastore], [datastore_config::DatastoreConfig]) follow the
//! **PIMPL** pattern: clones share one `Arc`-held implementation. The datastore state is
//! owned by a single worker thread; every operation is a task on its FIFO queue.
//!
//! ## Module Organization
//!
//! - [`common`] - Values, constants, the event bus and shared utilities
//! - [`datastore`] - The datastore handle, cursors and operation options
//! - [`datastore_builder`] - Datastore builder
//! - [`datastore_config`] - Datastore configuration
//! - [`document`] - Documents and dot-path access
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Queries, matching and projections
//! - [`index`] - Index definitions and structures
//! - [`store`] - The datafile: line format, append, replay and compaction
//! - [`update`] - Update modifiers and replacement

use crate::common::*;
use std::sync::LazyLock;

pub mod common;
pub mod datastore;
pub mod datastore_builder;
pub mod datastore_config;
pub mod document;
pub mod errors;
pub mod filter;
pub mod index;
pub mod store;
pub mod update;

pub(crate) static SCHEDULER: LazyLock<Scheduler> = LazyLock::new(Scheduler::new);

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    colog::init();
}
