pub mod encoder;
pub mod loader;

pub use loader::BulkLoader;
