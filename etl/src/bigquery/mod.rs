//! BigQuery plumbing shared by the destination and the watermark store.

mod client;
mod encoding;
mod schema;

pub use client::*;
pub use encoding::BigQueryTableRow;
pub use schema::{BigQueryType, coerce_cell};
