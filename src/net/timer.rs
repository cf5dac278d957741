//! Cancellable one-shot timers that deliver an event to a session inbox

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// One pending delivery; scheduling again replaces it
#[derive(Debug, Default)]
pub struct Timer {
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to `inbox` after `delay`, aborting any earlier schedule
    pub fn schedule<E>(&mut self, delay: Duration, inbox: UnboundedSender<E>, event: E)
    where
        E: Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session already ended
            let _ = inbox.send(event);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
