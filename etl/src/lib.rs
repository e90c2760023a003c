//! Incremental extraction of MySQL tables into BigQuery.
//!
//! A [`pipeline::Pipeline`] reads each configured table from a [`source::Source`], applies the
//! table's [`transform`] rules and appends the result to a [`destination::Destination`].
//! Incremental tables only read rows above the watermark kept in a
//! [`store::watermark::WatermarkStore`].

#[cfg(feature = "bigquery")]
pub mod bigquery;
pub mod destination;
pub mod error;
mod macros;
pub mod pipeline;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
