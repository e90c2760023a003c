mod base;
mod extract;
mod memory;
mod mysql;
mod query;

pub use base::Source;
pub use extract::extract_table;
pub use memory::MemorySource;
pub use mysql::MySqlSource;
pub use query::{ExtractQuery, quote_identifier};
