//! Queries for selecting documents.
//!
//! A [Query] is parsed from a query document or built fluently, then evaluated against
//! documents with [matches].
//!
//! ```rust
//! use lodestore::doc;
//! use lodestore::filter::{field, matches, Query};
//!
//! let parsed = Query::parse(&doc! { age: { "$gt": 30 }, status: "active" }).unwrap();
//! let built = field("age").gt(30).and(field("status").eq("active"));
//!
//! let doc = doc! { age: 42, status: "active" };
//! assert!(matches(&parsed, &doc));
//! assert!(matches(&built, &doc));
//! ```
//!
//! # Supported Operators
//!
//! - **Comparison**: `$lt`, `$lte`, `$gt`, `$gte` (numbers, strings and dates), `$ne`
//! - **Membership**: `$in`, `$nin`
//! - **Element**: `$exists`, `$regex`
//! - **Array**: `$size`, `$elemMatch`
//! - **Logical**: `$and`, `$or`, `$not`, and [where_fn] predicates
//!
//! A condition on an array field holds when any element satisfies it. `$size`,
//! `$elemMatch` and `$exists` look at the array as a whole.

mod fluent;
mod matcher;
mod projection;
mod query;

pub use fluent::*;
pub use matcher::*;
pub use projection::*;
pub use query::*;
