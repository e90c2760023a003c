//! Data types moved through the pipeline.

mod batch;
mod cell;
mod table_row;
mod watermark;

pub use batch::*;
pub use cell::*;
pub use table_row::*;
pub use watermark::*;

pub use etl_config::shared::{TableSpec, Transformation};
