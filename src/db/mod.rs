pub mod pool;
pub mod schema;

pub use pool::{connect, wait_until_ready, ConnectSettings};
pub use schema::mutations_schema;
