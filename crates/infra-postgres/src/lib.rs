// Queuebench Infrastructure - PostgreSQL Adapter
// Implements: QueueStore, QueueTransaction with FOR UPDATE SKIP LOCKED claims

mod connection;
mod error;
mod queue_store;
mod schema;
mod transaction;

pub use connection::{connect_options, create_pool};
pub use error::map_sqlx_error;
pub use queue_store::PostgresQueueStore;
pub use schema::{load_schema, SCHEMA};
pub use transaction::PostgresQueueTransaction;
