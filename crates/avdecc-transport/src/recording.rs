use std::sync::Mutex;

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::traits::{DeliveryMode, TxQueue};

/// A frame captured by [`RecordingTxQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub token: u64,
    pub mode: DeliveryMode,
    pub frame: Bytes,
}

/// In-memory [`TxQueue`] that keeps every frame it is given.
///
/// Used by tests and offline tooling in place of a real network tap.
#[derive(Debug, Default)]
pub struct RecordingTxQueue {
    sent: Mutex<Vec<SentFrame>>,
    fail_next: Mutex<bool>,
}

impl RecordingTxQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `enqueue` fail with [`TransportError::Shutdown`].
    pub fn fail_next(&self) {
        if let Ok(mut flag) = self.fail_next.lock() {
            *flag = true;
        }
    }

    /// Snapshot of everything enqueued so far.
    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Remove and return everything enqueued so far.
    pub fn take(&self) -> Vec<SentFrame> {
        self.sent
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TxQueue for RecordingTxQueue {
    fn enqueue(&self, token: u64, mode: DeliveryMode, frame: Bytes) -> Result<()> {
        let mut fail = self.fail_next.lock().map_err(|_| TransportError::Shutdown)?;
        if std::mem::take(&mut *fail) {
            return Err(TransportError::Shutdown);
        }
        drop(fail);

        self.sent
            .lock()
            .map_err(|_| TransportError::Shutdown)?
            .push(SentFrame { token, mode, frame });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let queue = RecordingTxQueue::new();
        queue
            .enqueue(1, DeliveryMode::NotifyOnTransmit, Bytes::from_static(b"a"))
            .unwrap();
        queue
            .enqueue(2, DeliveryMode::FireAndForget, Bytes::from_static(b"b"))
            .unwrap();

        let sent = queue.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].token, 1);
        assert_eq!(sent[1].frame.as_ref(), b"b");
        assert!(queue.is_empty());
    }

    #[test]
    fn fail_next_is_one_shot() {
        let queue = RecordingTxQueue::new();
        queue.fail_next();
        assert!(queue
            .enqueue(1, DeliveryMode::FireAndForget, Bytes::new())
            .is_err());
        assert!(queue
            .enqueue(2, DeliveryMode::FireAndForget, Bytes::new())
            .is_ok());
        assert_eq!(queue.len(), 1);
    }
}
