use crate::domain::entities::{Guest, GuestDraft};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Remote table store holding the authoritative guest list.
///
/// Implementations only translate calls to the wire: no retries, no local
/// state. Transport failures surface as `AppError::Network`, non-2xx statuses
/// and malformed bodies as `AppError::Protocol`.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_guests(&self) -> Result<Vec<Guest>, AppError>;

    async fn update_guest(&self, guest: &Guest) -> Result<(), AppError>;

    /// Creates the guest and returns it with the identifier assigned remotely.
    async fn create_guest(&self, draft: &GuestDraft) -> Result<Guest, AppError>;
}
