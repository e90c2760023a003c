mod base;
#[cfg(feature = "bigquery")]
mod bigquery;
mod memory;

pub use base::*;
#[cfg(feature = "bigquery")]
pub use bigquery::*;
pub use memory::*;
