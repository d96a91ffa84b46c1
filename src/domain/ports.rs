use crate::domain::model::ServiceName;
use crate::utils::error::Result;
use std::future::Future;

/// Backing store for service blobs. One text blob per service.
///
/// Implementations do no locking of their own; `InventoryStore` serializes
/// every mutation of a given service before calling in here.
pub trait Storage: Send + Sync {
    /// Names of all services present, creating the storage root if missing.
    fn list(&self) -> impl Future<Output = Result<Vec<ServiceName>>> + Send;

    /// Full blob of a service, or `None` when it has no backing storage.
    fn read(&self, service: &ServiceName)
        -> impl Future<Output = Result<Option<String>>> + Send;

    /// Replace the blob in one step. Prior content survives a failed write.
    fn write(
        &self,
        service: &ServiceName,
        content: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Create an empty blob. Returns `false` if one already exists.
    fn create(&self, service: &ServiceName) -> impl Future<Output = Result<bool>> + Send;

    /// Remove the blob. Returns `false` if there was nothing to remove.
    fn remove(&self, service: &ServiceName) -> impl Future<Output = Result<bool>> + Send;
}
