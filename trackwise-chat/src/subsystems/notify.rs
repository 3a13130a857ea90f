//! Transient notifications backed by a single timer.
//!
//! Showing a notice aborts any pending clear (last write wins). The timer is
//! released on `clear()` and on drop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const MARKER_NOTICE_DURATION: Duration = Duration::from_millis(4000);
pub const TOO_SHORT_NOTICE_DURATION: Duration = Duration::from_millis(2000);
pub const ERROR_NOTICE_DURATION: Duration = Duration::from_millis(5000);

pub struct Notifier {
    current: Arc<watch::Sender<Option<String>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    default_duration: Duration,
}

impl Notifier {
    pub fn new(default_duration: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            current: Arc::new(tx),
            timer: Mutex::new(None),
            default_duration,
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Show `message` for `duration`, replacing whatever is showing.
    ///
    /// Outside a tokio runtime no timer can run, so the notice stays until
    /// the next `show` or `clear`.
    pub fn show(&self, message: impl Into<String>, duration: Duration) {
        let message = message.into();
        tracing::debug!(notice = %message, ms = duration.as_millis() as u64, "Showing notification");

        let mut timer = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(pending) = timer.take() {
            pending.abort();
        }
        self.current.send_replace(Some(message));

        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("No runtime, notification will not auto-clear");
            return;
        };
        let current = Arc::clone(&self.current);
        *timer = Some(runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            current.send_replace(None);
        }));
    }

    pub fn show_default(&self, message: impl Into<String>) {
        self.show(message, self.default_duration);
    }

    pub fn clear(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(pending) = timer.take() {
            pending.abort();
        }
        self.current.send_replace(None);
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        let timer = self.timer.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(pending) = timer.take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notice_clears_after_duration() {
        let notifier = Notifier::new(Duration::from_millis(20));
        notifier.show_default("Saved");
        assert_eq!(notifier.current().as_deref(), Some("Saved"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(notifier.current().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let notifier = Notifier::new(Duration::from_millis(3500));
        notifier.show("first", Duration::from_millis(30));
        notifier.show("second", Duration::from_millis(300));

        // The first timer was aborted and must not clear the second notice.
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(notifier.current().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_clear_is_immediate() {
        let notifier = Notifier::new(Duration::from_secs(5));
        let rx = notifier.subscribe();
        notifier.show_default("hello");
        notifier.clear();
        assert!(notifier.current().is_none());
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn test_show_without_runtime_keeps_notice() {
        let notifier = Notifier::new(Duration::from_millis(10));
        notifier.show_default("Message noted!");
        assert_eq!(notifier.current().as_deref(), Some("Message noted!"));

        notifier.clear();
        assert!(notifier.current().is_none());
    }
}
