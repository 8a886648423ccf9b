// Transaction port for atomic claim-retire cycles

use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
///
/// Dropping a transaction without calling `commit` must discard its effects.
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
