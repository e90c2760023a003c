mod base;
#[cfg(feature = "bigquery")]
mod bigquery;
mod memory;

pub use base::Destination;
#[cfg(feature = "bigquery")]
pub use bigquery::BigQueryDestination;
pub use memory::MemoryDestination;
