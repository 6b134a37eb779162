use crate::domain::model::FailureAlert;
use crate::utils::error::Result;
use async_trait::async_trait;

/// A channel a handler can report its own failures to.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn notify(&self, alert: &FailureAlert) -> Result<()>;
}
