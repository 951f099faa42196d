use async_trait::async_trait;
use std::time::Duration;

/// Time source for polling loops.
///
/// Injected so tests drive elapsed time without real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic-ish milliseconds; only differences are meaningful.
    fn now_millis(&self) -> u64;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
