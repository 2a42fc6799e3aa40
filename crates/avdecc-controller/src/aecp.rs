//! AECP AEM controller state machine.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use avdecc_frame::aecp::offsets;
use avdecc_frame::consts::{
    aecp_message, aem_command_name, aem_status, aem_status_name, SUBTYPE_AECP,
};
use avdecc_frame::{AemHeader, ControlHeader, EtherHeader, MacAddr, ETHER_HDR_SIZE};
use avdecc_transport::{DeliveryMode, TxQueue};
use bytes::{BufMut, Bytes, BytesMut};

use crate::clock::Clock;
use crate::config::AecpConfig;
use crate::descriptor::{CommandKind, FrameInfo};
use crate::error::{ControllerError, Result};
use crate::inflight::{Expired, InflightTable, Lookup, PendingRequest, RequestState};
use crate::notify::{Notification, NotificationId, NotificationSink, Outcome};

/// Message type of AEM commands, for [`AecpController::common_hdr_init`].
pub const AEM_COMMAND: u8 = aecp_message::AEM_COMMAND;

/// What became of an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Retired the request `id`; its caller has been notified.
    Completed { id: NotificationId, status: u8 },
    /// The entity is still working on `id`; its timer was re-armed.
    InProgress { id: NotificationId },
    /// Unsolicited status push. No request involved, no notification.
    Unsolicited { status: u8 },
    /// Matched nothing pending. Dropped.
    Unmatched { status: u8 },
}

impl Resolution {
    pub fn status(&self) -> Option<u8> {
        match self {
            Resolution::Completed { status, .. }
            | Resolution::Unsolicited { status }
            | Resolution::Unmatched { status } => Some(*status),
            Resolution::InProgress { .. } => None,
        }
    }

    pub fn id(&self) -> Option<NotificationId> {
        match self {
            Resolution::Completed { id, .. } | Resolution::InProgress { id } => Some(*id),
            _ => None,
        }
    }
}

/// Responses match on target entity and command type, besides the sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AecpKey {
    target_entity_id: u64,
    command_type: u16,
}

/// Correlates AEM commands with their responses.
pub struct AecpController {
    config: AecpConfig,
    controller_entity_id: u64,
    controller_mac: MacAddr,
    tx: Arc<dyn TxQueue>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    inflight: Mutex<InflightTable<AecpKey>>,
}

impl AecpController {
    pub fn new(
        config: AecpConfig,
        controller_entity_id: u64,
        controller_mac: MacAddr,
        tx: Arc<dyn TxQueue>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            controller_entity_id,
            controller_mac,
            tx,
            clock,
            sink,
            inflight: Mutex::new(InflightTable::new()),
        }
    }

    pub fn controller_entity_id(&self) -> u64 {
        self.controller_entity_id
    }

    /// A zeroed frame of `pdu_len` bytes after an Ethernet header addressed
    /// to `dest`.
    pub fn ether_frame_init(&self, dest: MacAddr, pdu_len: usize) -> BytesMut {
        let mut frame = BytesMut::zeroed(ETHER_HDR_SIZE + pdu_len);
        // The buffer is sized for the header above.
        let _ = EtherHeader::avtp(dest, self.controller_mac).encode(&mut frame);
        frame
    }

    /// Write the common control header and stamp a fresh sequence id.
    ///
    /// `frame` must already hold the encoded AEM PDU after its Ethernet
    /// header. Returns the allocated sequence id.
    pub fn common_hdr_init(
        &self,
        message_type: u8,
        frame: &mut [u8],
        target_entity_id: u64,
        control_data_length: u16,
    ) -> Result<u16> {
        let current = ControlHeader::decode(frame, ETHER_HDR_SIZE)?;
        ControlHeader {
            subtype: SUBTYPE_AECP,
            message_type,
            status: current.status,
            control_data_length,
            stream_id: target_entity_id,
        }
        .encode(frame, ETHER_HDR_SIZE)?;

        let sequence_id = self.lock()?.allocate_sequence_id()?;
        let at = ETHER_HDR_SIZE + offsets::SEQUENCE_ID;
        if frame.len() < at + 2 {
            return Err(avdecc_frame::FrameError::BufferTooSmall {
                capacity: frame.len(),
                need: at + 2,
            }
            .into());
        }
        (&mut frame[at..at + 2]).put_u16(sequence_id);
        Ok(sequence_id)
    }

    /// Register `frame` as pending and hand it to the transmit queue.
    ///
    /// If the queue refuses the frame the request is dropped again and the
    /// error returned; nothing stays pending.
    pub fn queue_command(
        &self,
        id: NotificationId,
        command: CommandKind,
        frame: Bytes,
    ) -> Result<()> {
        let header = AemHeader::decode(&frame, ETHER_HDR_SIZE)?;
        let sequence_id = header.sequence_id;
        let now = self.clock.now();
        self.lock()?.insert(
            sequence_id,
            PendingRequest {
                key: AecpKey {
                    target_entity_id: header.target_entity_id,
                    command_type: header.command_type,
                },
                id,
                entity_id: header.target_entity_id,
                command,
                frame: frame.clone(),
                retries: 0,
                timeout: self.config.command_timeout,
                deadline: now + self.config.command_timeout,
                state: RequestState::Sent,
            },
        )?;

        if let Err(err) = self.tx.enqueue(id.0, DeliveryMode::NotifyOnTransmit, frame) {
            self.lock()?.remove(sequence_id);
            tracing::warn!(
                entity_id = header.target_entity_id,
                sequence_id,
                command = %command,
                error = %err,
                "AEM command not queued"
            );
            return Err(err.into());
        }

        self.lock()?.set_state(sequence_id, RequestState::AwaitingResponse);
        tracing::debug!(
            entity_id = header.target_entity_id,
            sequence_id,
            command = %command,
            token = id.0,
            "AEM command sent"
        );
        Ok(())
    }

    /// Resolve an inbound AEM response against the pending requests.
    ///
    /// `apply` performs the caller's cache update. It runs only for a
    /// response that retires a pending request or is unsolicited, after the
    /// table lock is released and before the caller is notified.
    pub fn update_inflight_for_rcvd_resp<F>(
        &self,
        header: &AemHeader,
        response: FrameInfo,
        apply: F,
    ) -> Result<Resolution>
    where
        F: FnOnce() -> Result<()>,
    {
        let status = header.status;
        if header.unsolicited {
            run_apply(apply, header.target_entity_id);
            tracing::debug!(
                entity_id = header.target_entity_id,
                command = aem_command_name(header.command_type),
                status = aem_status_name(status),
                "unsolicited AEM response"
            );
            return Ok(Resolution::Unsolicited { status });
        }

        let key = AecpKey {
            target_entity_id: header.target_entity_id,
            command_type: header.command_type,
        };
        let rearm_at = (status == aem_status::IN_PROGRESS)
            .then(|| self.clock.now() + self.config.command_timeout);
        let lookup = self.lock()?.lookup(header.sequence_id, |k| *k == key, rearm_at);

        match lookup {
            Lookup::NotFound => {
                tracing::debug!(
                    entity_id = header.target_entity_id,
                    sequence_id = header.sequence_id,
                    command = aem_command_name(header.command_type),
                    "unmatched AEM response dropped"
                );
                Ok(Resolution::Unmatched { status })
            }
            Lookup::Rearmed(id) => {
                tracing::debug!(
                    entity_id = header.target_entity_id,
                    sequence_id = header.sequence_id,
                    token = id.0,
                    "AEM command in progress"
                );
                Ok(Resolution::InProgress { id })
            }
            Lookup::Taken(request) => {
                run_apply(apply, request.entity_id);
                let outcome = if status == aem_status::SUCCESS {
                    Outcome::Success(response)
                } else {
                    Outcome::Failed { status }
                };
                tracing::debug!(
                    entity_id = request.entity_id,
                    sequence_id = header.sequence_id,
                    command = %request.command,
                    status = aem_status_name(status),
                    token = request.id.0,
                    "AEM command completed"
                );
                self.sink.notify(Notification {
                    id: request.id,
                    entity_id: request.entity_id,
                    command: request.command,
                    outcome,
                });
                Ok(Resolution::Completed {
                    id: request.id,
                    status,
                })
            }
        }
    }

    /// Retransmit or time out every request whose deadline is at or before `now`.
    pub fn tick(&self, now: Instant) -> Result<()> {
        let expired = self.lock()?.expire(now, self.config.max_retries);
        for work in expired {
            match work {
                Expired::Retransmit {
                    id,
                    sequence_id,
                    frame,
                } => {
                    tracing::debug!(sequence_id, token = id.0, "AEM command retransmitted");
                    match self.tx.enqueue(id.0, DeliveryMode::FireAndForget, frame) {
                        Ok(()) => self
                            .lock()?
                            .set_state(sequence_id, RequestState::AwaitingResponse),
                        Err(err) => tracing::warn!(
                            sequence_id,
                            error = %err,
                            "AEM retransmission not queued"
                        ),
                    }
                }
                Expired::TimedOut(request) => {
                    tracing::warn!(
                        entity_id = request.entity_id,
                        command = %request.command,
                        token = request.id.0,
                        retries = request.retries,
                        "AEM command timed out"
                    );
                    self.sink.notify(Notification {
                        id: request.id,
                        entity_id: request.entity_id,
                        command: request.command,
                        outcome: Outcome::TimedOut,
                    });
                }
            }
        }
        Ok(())
    }

    /// Drop the pending request `id` without notifying. Returns whether one existed.
    pub fn cancel(&self, id: NotificationId) -> Result<bool> {
        Ok(self.lock()?.cancel(id).is_some())
    }

    /// Drop every pending request to `entity_id` without notifying.
    pub fn cancel_entity(&self, entity_id: u64) -> Result<usize> {
        Ok(self.lock()?.cancel_entity(entity_id).len())
    }

    pub fn pending(&self) -> usize {
        self.lock().map(|table| table.len()).unwrap_or(0)
    }

    /// State of the request holding `sequence_id`, if pending.
    pub fn request_state(&self, sequence_id: u16) -> Option<RequestState> {
        self.lock().ok().and_then(|table| table.state(sequence_id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, InflightTable<AecpKey>>> {
        self.inflight
            .lock()
            .map_err(|_| ControllerError::LockPoisoned("AECP inflight"))
    }
}

fn run_apply<F: FnOnce() -> Result<()>>(apply: F, entity_id: u64) {
    if let Err(err) = apply() {
        tracing::warn!(entity_id, error = %err, "descriptor cache not updated");
    }
}
