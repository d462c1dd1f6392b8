//! Event polling during a test invocation
//!
//! While a test runs in the pod, its event endpoint is polled at a fixed
//! interval and every event is handed to a callback. Polling stops when the
//! invocation cancels its token.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::CommandEvent;
use crate::proxy::PodProxy;

/// Receives events emitted by the in-pod runner
pub trait CommandCallback: Send + Sync {
    fn on_event(&self, event: &CommandEvent);
}

/// Writes every event to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingCallback;

impl CommandCallback for LoggingCallback {
    fn on_event(&self, event: &CommandEvent) {
        match event.payload.as_ref() {
            Some(payload) => info!(kind = %event.kind, payload = %payload, "{}", event.message),
            None => info!(kind = %event.kind, "{}", event.message),
        }
    }
}

/// Starts background polling of an event endpoint
pub trait EventScheduler: Send + Sync {
    /// Poll `event_url` until `cancel` fires
    fn schedule(&self, event_url: String, cancel: CancellationToken);
}

/// Polls the event endpoint on a tokio task
pub struct EventPoller {
    proxy: Arc<dyn PodProxy>,
    interval: Duration,
    callback: Arc<dyn CommandCallback>,
}

impl EventPoller {
    pub fn new(
        proxy: Arc<dyn PodProxy>,
        interval: Duration,
        callback: Arc<dyn CommandCallback>,
    ) -> Self {
        Self {
            proxy,
            interval,
            callback,
        }
    }
}

impl EventScheduler for EventPoller {
    fn schedule(&self, event_url: String, cancel: CancellationToken) {
        let proxy = self.proxy.clone();
        let callback = self.callback.clone();
        let period = self.interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Event polling stopped for {}", event_url);
                        break;
                    }
                    _ = ticker.tick() => {
                        match proxy.poll_events(&event_url).await {
                            Ok(events) => {
                                for event in &events {
                                    callback.on_event(event);
                                }
                            }
                            Err(e) => warn!("Event poll failed: {}", e),
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use crate::models::{LabelSet, TestResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct EventSource {
        polls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl PodProxy for EventSource {
        async fn find_pod(&self, _: &LabelSet, _: usize) -> Result<String, ProxyError> {
            Ok("10.1.0.1".to_string())
        }

        fn url(&self, host: &str, port: u16, path: &str, query: &str) -> String {
            format!("http://{host}:{port}{path}?{query}")
        }

        async fn invoke_test(&self, _: &str) -> Result<TestResult, ProxyError> {
            Ok(TestResult::passed())
        }

        async fn poll_events(&self, url: &str) -> Result<Vec<CommandEvent>, ProxyError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(ProxyError::status(url, 503, "starting"));
            }
            Ok(vec![CommandEvent::new("log", format!("poll {n}"))])
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl CommandCallback for Collect {
        fn on_event(&self, event: &CommandEvent) {
            self.0.lock().unwrap().push(event.message.clone());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_cancelled() {
        let source = Arc::new(EventSource {
            polls: AtomicUsize::new(0),
            fail_first: true,
        });
        let collect = Arc::new(Collect::default());
        let poller = EventPoller::new(source.clone(), Duration::from_millis(100), collect.clone());

        let cancel = CancellationToken::new();
        poller.schedule("http://pod/x?cmd=event".to_string(), cancel.clone());

        tokio::time::sleep(Duration::from_millis(350)).await;
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let polled = source.polls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.polls.load(Ordering::SeqCst), polled);

        // Ticks at 0, 100, 200 and 300ms; the first poll failed
        assert_eq!(polled, 4);
        let messages = collect.0.lock().unwrap().clone();
        assert_eq!(messages, vec!["poll 1", "poll 2", "poll 3"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_tick() {
        let source = Arc::new(EventSource {
            polls: AtomicUsize::new(0),
            fail_first: false,
        });
        let poller = EventPoller::new(source.clone(), Duration::from_secs(60), Arc::new(LoggingCallback));

        let cancel = CancellationToken::new();
        cancel.cancel();
        poller.schedule("http://pod/x".to_string(), cancel);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // select! may take either ready branch on the first pass
        assert!(source.polls.load(Ordering::SeqCst) <= 1);
    }
}
