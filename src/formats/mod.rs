pub mod delimited;

pub use delimited::{DelimitedConfig, RecordSource};
