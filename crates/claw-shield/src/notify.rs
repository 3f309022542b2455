//! Security alert channel.
//!
//! A bounded FIFO queue between policy decisions and a single consumer.
//! Publishing never waits: when the queue is full an alert is dropped
//! according to the configured [`OverflowPolicy`] and counted.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::config::OverflowPolicy;
use crate::error::{ShieldError, ShieldResult};

/// Kind of security alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// A failure carried a suspicious username.
    SuspiciousActivity,
    /// An address crossed the permanent block threshold.
    PermanentBlock,
}

/// A human-readable security alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityAlert {
    /// What happened.
    pub kind: AlertKind,
    /// Address the alert concerns.
    pub address: String,
    /// Rendered message.
    pub message: String,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

impl SecurityAlert {
    /// Alert for a failure with a suspicious username.
    #[must_use]
    pub fn suspicious(address: &str, username: &str) -> Self {
        Self {
            kind: AlertKind::SuspiciousActivity,
            address: address.to_owned(),
            message: format!(
                "Suspicious activity detected from IP: {address} with username: {username}"
            ),
            raised_at: Utc::now(),
        }
    }

    /// Alert for a new permanent block.
    #[must_use]
    pub fn permanently_blocked(address: &str) -> Self {
        Self {
            kind: AlertKind::PermanentBlock,
            address: address.to_owned(),
            message: format!("IP {address} permanently blocked due to excessive attempts"),
            raised_at: Utc::now(),
        }
    }
}

impl fmt::Display for SecurityAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<VecDeque<SecurityAlert>>,
    ready: Notify,
    capacity: usize,
    policy: OverflowPolicy,
    published: AtomicU64,
    dropped: AtomicU64,
    subscribed: AtomicBool,
}

/// Bounded, non-blocking alert queue.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    shared: Arc<Shared>,
}

impl NotificationBus {
    /// Create a bus holding at most `capacity` undelivered alerts.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                ready: Notify::new(),
                capacity: capacity.max(1),
                policy,
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                subscribed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue an alert without waiting.
    ///
    /// Returns `false` if the alert itself was discarded.
    pub fn publish(&self, alert: SecurityAlert) -> bool {
        let accepted = {
            let mut queue = self.shared.queue.lock();
            if queue.len() < self.shared.capacity {
                queue.push_back(alert);
                true
            } else {
                match self.shared.policy {
                    OverflowPolicy::DropNewest => {
                        self.note_dropped(&alert);
                        false
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = queue.pop_front() {
                            self.note_dropped(&evicted);
                        }
                        queue.push_back(alert);
                        true
                    }
                }
            }
        };

        if accepted {
            self.shared.published.fetch_add(1, Ordering::Relaxed);
            self.shared.ready.notify_one();
        }
        accepted
    }

    fn note_dropped(&self, alert: &SecurityAlert) {
        let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            address = %alert.address,
            dropped_total = dropped,
            "Alert queue full, dropping alert"
        );
    }

    /// Take the single consumer end of the bus.
    ///
    /// # Errors
    ///
    /// Returns `ShieldError::AlreadySubscribed` while another stream is alive.
    pub fn subscribe(&self) -> ShieldResult<AlertStream> {
        if self
            .shared
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ShieldError::AlreadySubscribed);
        }
        Ok(AlertStream {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Alerts accepted into the queue so far.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Alerts discarded because the queue was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Alerts waiting for the consumer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Maximum number of queued alerts.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Consumer end of a [`NotificationBus`].
///
/// The sequence never ends; `recv` waits until an alert is available.
/// Dropping the stream lets another consumer subscribe.
#[derive(Debug)]
pub struct AlertStream {
    shared: Arc<Shared>,
}

impl AlertStream {
    /// Wait for the next alert.
    pub async fn recv(&mut self) -> SecurityAlert {
        loop {
            if let Some(alert) = self.try_recv() {
                return alert;
            }
            self.shared.ready.notified().await;
        }
    }

    /// Take the next alert if one is queued.
    pub fn try_recv(&mut self) -> Option<SecurityAlert> {
        self.shared.queue.lock().pop_front()
    }

    /// Adapt into a `futures::Stream`.
    pub fn into_stream(self) -> impl Stream<Item = SecurityAlert> + Send {
        stream::unfold(self, |mut alerts| async move {
            let alert = alerts.recv().await;
            Some((alert, alerts))
        })
    }
}

impl Drop for AlertStream {
    fn drop(&mut self) {
        self.shared.subscribed.store(false, Ordering::Release);
    }
}
