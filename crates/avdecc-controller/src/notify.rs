use std::fmt;
use std::sync::mpsc;

use crate::descriptor::{CommandKind, FrameInfo};

/// Caller-chosen token identifying one command until it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The entity answered SUCCESS. Holds the response PDU.
    Success(FrameInfo),
    /// The entity answered with a non-success status.
    Failed { status: u8 },
    /// No response after the retry budget ran out.
    TimedOut,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Completion of one command. Each [`NotificationId`] is reported at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub entity_id: u64,
    pub command: CommandKind,
    pub outcome: Outcome,
}

/// Receives command completions. Called from the receive and timer threads
/// with no controller locks held. Entity removal waits for notifications
/// already under way, so a sink must not remove entities from inside
/// `notify`.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for mpsc::Sender<Notification> {
    fn notify(&self, notification: Notification) {
        if let Err(err) = self.send(notification) {
            tracing::debug!(id = %err.0.id, "notification receiver dropped");
        }
    }
}

/// Adapts a closure into a [`NotificationSink`].
pub struct CallbackSink<F>(pub F);

impl<F> NotificationSink for CallbackSink<F>
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        (self.0)(notification)
    }
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}
