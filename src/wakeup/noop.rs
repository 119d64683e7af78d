use super::WakeupProvider;
use crate::common::error::WakeError;
use async_trait::async_trait;
use tracing::info;

/// Provider for targets that are always on
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

#[async_trait]
impl WakeupProvider for Noop {
    async fn wake(&self) -> Result<(), WakeError> {
        info!("Noop wakeup: doing nothing");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
