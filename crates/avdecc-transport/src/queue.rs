use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::{DeliveryMode, FrameSink, TransmitObserver, TxQueue, MAX_FRAME_SIZE};

/// Configuration for [`SystemTxQueue`].
#[derive(Debug, Clone)]
pub struct TxQueueConfig {
    /// Frames that may wait for the worker before `enqueue` reports
    /// [`TransportError::QueueFull`].
    pub capacity: usize,
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for TxQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            thread_name: "avdecc-tx".to_string(),
        }
    }
}

struct Job {
    token: u64,
    mode: DeliveryMode,
    frame: Bytes,
}

/// Bounded transmit queue drained by a dedicated worker thread.
///
/// `enqueue` never blocks: when the worker falls behind the caller gets
/// [`TransportError::QueueFull`] instead.
pub struct SystemTxQueue {
    sender: Mutex<Option<SyncSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: usize,
}

impl SystemTxQueue {
    /// Start a queue writing to `sink` with default configuration.
    pub fn spawn<S: FrameSink + 'static>(sink: S) -> Result<Self> {
        Self::spawn_with_config(sink, None, TxQueueConfig::default())
    }

    /// Start a queue with an optional transmit observer and explicit configuration.
    pub fn spawn_with_config<S: FrameSink + 'static>(
        sink: S,
        observer: Option<Arc<dyn TransmitObserver>>,
        config: TxQueueConfig,
    ) -> Result<Self> {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let worker = std::thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || run_worker(sink, observer, receiver))
            .map_err(TransportError::Spawn)?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            capacity,
        })
    }

    /// Stop accepting frames and wait for the worker to drain what is queued.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("transmit worker panicked");
            }
        }
    }

    /// Queue capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl TxQueue for SystemTxQueue {
    fn enqueue(&self, token: u64, mode: DeliveryMode, frame: Bytes) -> Result<()> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                len: frame.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let guard = self.sender.lock().map_err(|_| TransportError::Shutdown)?;
        let sender = guard.as_ref().ok_or(TransportError::Shutdown)?;
        match sender.try_send(Job { token, mode, frame }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::QueueFull(self.capacity)),
            Err(TrySendError::Disconnected(_)) => Err(TransportError::Shutdown),
        }
    }
}

impl Drop for SystemTxQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<S: FrameSink>(
    mut sink: S,
    observer: Option<Arc<dyn TransmitObserver>>,
    receiver: Receiver<Job>,
) {
    debug!("transmit worker started");
    while let Ok(job) = receiver.recv() {
        let result = sink.send_frame(&job.frame);
        match &result {
            Ok(()) => trace!(token = job.token, len = job.frame.len(), "frame transmitted"),
            Err(err) => warn!(token = job.token, error = %err, "frame transmit failed"),
        }
        if job.mode == DeliveryMode::NotifyOnTransmit {
            if let Some(observer) = &observer {
                observer.transmitted(job.token, result.as_ref().map(|_| ()));
            }
        }
    }
    debug!("transmit worker stopped");
}
