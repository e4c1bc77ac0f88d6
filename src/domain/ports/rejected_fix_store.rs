//! Storage port behind rejected-fix memory.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{FixKey, RejectedFixRecord};

#[async_trait]
pub trait RejectedFixStore: Send + Sync {
    /// Single keyed read.
    async fn get(&self, key: &FixKey) -> DomainResult<Option<RejectedFixRecord>>;

    /// Insert, or overwrite the reason of an existing record with the same key.
    ///
    /// `created_at` of an existing record is preserved.
    async fn upsert(&self, record: &RejectedFixRecord) -> DomainResult<()>;

    async fn count(&self) -> DomainResult<u64>;
}
