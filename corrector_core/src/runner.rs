use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use corrector_traits::Notification;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::dispatch::Dispatcher;
use crate::handler::{HandlerCounts, Reaction, SubscriptionHandler};

/// Default wait between shutdown checks when the stream is idle.
pub const DEFAULT_POLL: Duration = Duration::from_millis(50);

/// Why the reactive loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown flag was raised.
    Interrupted,
    /// The notification stream was closed by the session.
    StreamClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunExit {
    pub reason: ExitReason,
    pub handled: HandlerCounts,
    /// Requests the dispatcher refused because its queue was full.
    pub rejected: u64,
}

/// Drive `handler` from `notifications` until shutdown or end of stream.
///
/// Notifications are handled strictly in arrival order on the calling
/// thread. Triggered corrections are handed to `dispatcher` without waiting
/// for them, so a slow model never delays the next notification.
pub fn run(
    handler: &mut SubscriptionHandler,
    notifications: &Receiver<Notification>,
    dispatcher: &Dispatcher,
    shutdown: &AtomicBool,
    poll: Duration,
) -> RunExit {
    let mut rejected = 0u64;
    let reason = loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested, leaving subscription loop");
            break ExitReason::Interrupted;
        }
        match notifications.recv_timeout(poll) {
            Ok(n) => {
                if let Reaction::Triggered(req) = handler.on_notification(&n) {
                    if !dispatcher.submit(req) {
                        rejected = rejected.saturating_add(1);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("notification stream closed");
                break ExitReason::StreamClosed;
            }
        }
    };
    RunExit {
        reason,
        handled: handler.counts(),
        rejected,
    }
}
