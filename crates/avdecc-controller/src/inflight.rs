//! In-flight request table shared by the AECP and ACMP engines.
//!
//! Requests are indexed by sequence id. Each engine adds its own match key
//! `K` on top, checked before a response may retire a request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::descriptor::CommandKind;
use crate::error::{ControllerError, Result};
use crate::notify::NotificationId;

/// Lifecycle of a pending request.
///
/// `Sent → AwaitingResponse → (Retried → AwaitingResponse)*`, leaving the
/// table on completion, timeout or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Registered, not yet accepted by the transmit queue.
    Sent,
    AwaitingResponse,
    /// Retransmitted after a timeout, not yet accepted by the transmit queue.
    Retried,
}

#[derive(Debug, Clone)]
pub(crate) struct PendingRequest<K> {
    pub key: K,
    pub id: NotificationId,
    pub entity_id: u64,
    pub command: CommandKind,
    /// The command as first sent, reused verbatim for retransmission.
    pub frame: Bytes,
    pub retries: u32,
    pub timeout: Duration,
    pub deadline: Instant,
    pub state: RequestState,
}

/// Work produced by [`InflightTable::expire`], performed by the caller once
/// the table lock is released.
#[derive(Debug)]
pub(crate) enum Expired<K> {
    Retransmit {
        id: NotificationId,
        sequence_id: u16,
        frame: Bytes,
    },
    TimedOut(PendingRequest<K>),
}

/// Result of looking a response up in the table.
#[derive(Debug)]
pub(crate) enum Lookup<K> {
    /// The request was removed from the table.
    Taken(PendingRequest<K>),
    /// The request stays pending with a fresh deadline.
    Rearmed(NotificationId),
    NotFound,
}

#[derive(Debug)]
pub(crate) struct InflightTable<K> {
    next_sequence_id: u16,
    pending: HashMap<u16, PendingRequest<K>>,
}

impl<K> InflightTable<K> {
    pub fn new() -> Self {
        Self {
            next_sequence_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Next sequence id, wrapping at 16 bits and skipping ids still held by
    /// a pending request.
    pub fn allocate_sequence_id(&mut self) -> Result<u16> {
        for _ in 0..=u16::MAX as usize {
            let candidate = self.next_sequence_id;
            self.next_sequence_id = self.next_sequence_id.wrapping_add(1);
            if !self.pending.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(ControllerError::SequenceExhausted(self.pending.len()))
    }

    pub fn insert(&mut self, sequence_id: u16, request: PendingRequest<K>) -> Result<()> {
        if self.pending.contains_key(&sequence_id) {
            return Err(ControllerError::SequenceInUse(sequence_id));
        }
        self.pending.insert(sequence_id, request);
        Ok(())
    }

    pub fn set_state(&mut self, sequence_id: u16, state: RequestState) {
        if let Some(request) = self.pending.get_mut(&sequence_id) {
            request.state = state;
        }
    }

    pub fn remove(&mut self, sequence_id: u16) -> Option<PendingRequest<K>> {
        self.pending.remove(&sequence_id)
    }

    /// Retire the request at `sequence_id` if its key satisfies `matches`.
    /// With `rearm_at` set, the request stays pending until that deadline
    /// instead.
    pub fn lookup(
        &mut self,
        sequence_id: u16,
        matches: impl FnOnce(&K) -> bool,
        rearm_at: Option<Instant>,
    ) -> Lookup<K> {
        let Some(request) = self.pending.get_mut(&sequence_id) else {
            return Lookup::NotFound;
        };
        if !matches(&request.key) {
            return Lookup::NotFound;
        }
        if let Some(deadline) = rearm_at {
            request.deadline = deadline;
            request.state = RequestState::AwaitingResponse;
            return Lookup::Rearmed(request.id);
        }
        match self.pending.remove(&sequence_id) {
            Some(request) => Lookup::Taken(request),
            None => Lookup::NotFound,
        }
    }

    /// Collect every request whose deadline has passed. Requests with retry
    /// budget left are re-armed for retransmission; the rest are removed.
    pub fn expire(&mut self, now: Instant, max_retries: u32) -> Vec<Expired<K>> {
        let mut due: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(sequence_id, _)| *sequence_id)
            .collect();
        due.sort_unstable();

        let mut expired = Vec::with_capacity(due.len());
        for sequence_id in due {
            let Some(request) = self.pending.get_mut(&sequence_id) else {
                continue;
            };
            if request.retries < max_retries {
                request.retries += 1;
                request.deadline = now + request.timeout;
                request.state = RequestState::Retried;
                expired.push(Expired::Retransmit {
                    id: request.id,
                    sequence_id,
                    frame: request.frame.clone(),
                });
            } else if let Some(request) = self.pending.remove(&sequence_id) {
                expired.push(Expired::TimedOut(request));
            }
        }
        expired
    }

    /// Remove the request carrying `id`.
    pub fn cancel(&mut self, id: NotificationId) -> Option<PendingRequest<K>> {
        let sequence_id = self
            .pending
            .iter()
            .find(|(_, request)| request.id == id)
            .map(|(sequence_id, _)| *sequence_id)?;
        self.pending.remove(&sequence_id)
    }

    /// Remove every request addressed to `entity_id`.
    pub fn cancel_entity(&mut self, entity_id: u64) -> Vec<PendingRequest<K>> {
        let doomed: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, request)| request.entity_id == entity_id)
            .map(|(sequence_id, _)| *sequence_id)
            .collect();
        doomed
            .into_iter()
            .filter_map(|sequence_id| self.pending.remove(&sequence_id))
            .collect()
    }

    pub fn state(&self, sequence_id: u16) -> Option<RequestState> {
        self.pending.get(&sequence_id).map(|request| request.state)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn request(id: u64, entity_id: u64, now: Instant) -> PendingRequest<u64> {
        PendingRequest {
            key: entity_id,
            id: NotificationId(id),
            entity_id,
            command: CommandKind::GetCounters,
            frame: Bytes::from_static(b"frame"),
            retries: 0,
            timeout: TIMEOUT,
            deadline: now + TIMEOUT,
            state: RequestState::Sent,
        }
    }

    #[test]
    fn sequence_ids_skip_pending_and_wrap() {
        let now = Instant::now();
        let mut table = InflightTable::new();
        table.next_sequence_id = u16::MAX;
        table.insert(0, request(1, 1, now)).unwrap();

        assert_eq!(table.allocate_sequence_id().unwrap(), u16::MAX);
        assert_eq!(table.allocate_sequence_id().unwrap(), 1);
    }

    #[test]
    fn duplicate_sequence_rejected() {
        let now = Instant::now();
        let mut table = InflightTable::new();
        table.insert(7, request(1, 1, now)).unwrap();
        assert!(matches!(
            table.insert(7, request(2, 1, now)),
            Err(ControllerError::SequenceInUse(7))
        ));
    }

    #[test]
    fn lookup_requires_matching_key() {
        let now = Instant::now();
        let mut table = InflightTable::new();
        table.insert(3, request(1, 10, now)).unwrap();

        assert!(matches!(table.lookup(3, |k| *k == 11, None), Lookup::NotFound));
        assert!(matches!(table.lookup(4, |k| *k == 10, None), Lookup::NotFound));
        assert!(matches!(
            table.lookup(3, |k| *k == 10, None),
            Lookup::Taken(r) if r.id == NotificationId(1)
        ));
        assert!(matches!(table.lookup(3, |k| *k == 10, None), Lookup::NotFound));
    }

    #[test]
    fn rearm_keeps_request_pending() {
        let now = Instant::now();
        let mut table = InflightTable::new();
        table.insert(3, request(1, 10, now)).unwrap();

        let later = now + Duration::from_secs(5);
        assert!(matches!(
            table.lookup(3, |_| true, Some(later)),
            Lookup::Rearmed(NotificationId(1))
        ));
        assert!(table.expire(now + TIMEOUT, 0).is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn expire_retries_then_times_out() {
        let now = Instant::now();
        let mut table = InflightTable::new();
        table.insert(1, request(1, 10, now)).unwrap();
        table.set_state(1, RequestState::AwaitingResponse);

        assert!(table.expire(now, 1).is_empty());

        let first = table.expire(now + TIMEOUT, 1);
        assert!(matches!(
            first.as_slice(),
            [Expired::Retransmit { sequence_id: 1, .. }]
        ));
        assert_eq!(table.state(1), Some(RequestState::Retried));

        let second = table.expire(now + TIMEOUT * 2, 1);
        assert!(matches!(second.as_slice(), [Expired::TimedOut(r)] if r.retries == 1));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn cancel_by_id_and_entity() {
        let now = Instant::now();
        let mut table = InflightTable::new();
        table.insert(1, request(1, 10, now)).unwrap();
        table.insert(2, request(2, 20, now)).unwrap();
        table.insert(3, request(3, 20, now)).unwrap();

        assert_eq!(table.cancel(NotificationId(1)).map(|r| r.id), Some(NotificationId(1)));
        assert!(table.cancel(NotificationId(1)).is_none());
        assert_eq!(table.cancel_entity(20).len(), 2);
        assert_eq!(table.len(), 0);
    }
}
