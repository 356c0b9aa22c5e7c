//! Transport session: a notification stream, a writer, and the subscription
//! that has to be closed when the client goes away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use corrector_traits::clock::Clock;
use corrector_traits::{Notification, NodeId, PointWriter};
use crossbeam_channel::Receiver;

use crate::binding::OutputNodes;
use crate::error::CorrectorError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server-side subscription handle.
pub trait Subscription: Send {
    fn close(&mut self) -> Result<(), BoxError>;
}

/// Closes the subscription once, on `close()` or on drop. Failures are logged.
pub struct SubscriptionGuard {
    inner: Option<Box<dyn Subscription>>,
}

impl SubscriptionGuard {
    pub fn new(sub: impl Subscription + 'static) -> Self {
        Self {
            inner: Some(Box::new(sub)),
        }
    }

    pub fn close(&mut self) {
        if let Some(mut sub) = self.inner.take() {
            match sub.close() {
                Ok(()) => tracing::info!("subscription closed"),
                Err(e) => tracing::warn!(error = %e, "subscription close failed"),
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

impl core::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An established connection with an active data-change subscription.
pub struct Session<W> {
    pub notifications: Receiver<Notification>,
    pub writer: W,
    pub subscription: SubscriptionGuard,
}

/// What to subscribe to and where corrections are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    /// Nodes monitored for data changes.
    pub nodes: Vec<NodeId>,
    /// Requested publishing interval of the subscription.
    pub publishing_interval: Duration,
    /// Targets of the session writer.
    pub outputs: OutputNodes,
}

/// Opens a session against a server and subscribes per `spec`.
pub trait Connector {
    type Writer: PointWriter + Send + 'static;

    fn connect(
        &mut self,
        url: &str,
        spec: &SubscriptionSpec,
    ) -> Result<Session<Self::Writer>, BoxError>;
}

/// Try to connect until it works, waiting `delay` between attempts.
///
/// Returns `CorrectorError::Transport` only when `shutdown` is raised before a
/// session is established.
pub fn connect_with_retry<C: Connector>(
    connector: &mut C,
    url: &str,
    spec: &SubscriptionSpec,
    delay: Duration,
    clock: &dyn Clock,
    shutdown: &AtomicBool,
) -> Result<Session<C::Writer>, CorrectorError> {
    let mut attempt: u32 = 0;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Err(CorrectorError::Transport(format!(
                "shutdown requested before connecting to {url}"
            )));
        }
        attempt = attempt.saturating_add(1);
        match connector.connect(url, spec) {
            Ok(session) => {
                tracing::info!(
                    url,
                    attempt,
                    nodes = spec.nodes.len(),
                    publishing_interval_ms = spec.publishing_interval.as_millis() as u64,
                    "connected and subscribed"
                );
                return Ok(session);
            }
            Err(e) => {
                tracing::warn!(
                    url,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "connection failed"
                );
                clock.sleep(delay);
            }
        }
    }
}
