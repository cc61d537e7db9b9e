use async_trait::async_trait;
use tracing::{error, info};

/// Where user-facing messages go.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn info(&self, text: &str);
    fn error(&self, text: &str);
    /// Blocks until the user answers; only used when confirmation is enabled.
    async fn confirm(&self, text: &str) -> bool;
}

/// Sends everything to the log and answers every confirmation with a fixed
/// value. Used for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    pub auto_confirm: bool,
}

#[async_trait]
impl NotificationSink for LogNotifier {
    fn info(&self, text: &str) {
        info!("{}", text);
    }

    fn error(&self, text: &str) {
        error!("{}", text);
    }

    async fn confirm(&self, text: &str) -> bool {
        info!("{} (auto-answered: {})", text, self.auto_confirm);
        self.auto_confirm
    }
}
