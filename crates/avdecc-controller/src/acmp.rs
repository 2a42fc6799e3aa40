//! ACMP controller state machine.
//!
//! ACMP responses echo the command PDU with the message type bumped by one.
//! A response retires a pending command when the echoed addressing fields
//! and sequence id agree with what was sent.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use avdecc_frame::acmp::{offsets, ACMP_CONTROL_DATA_LEN};
use avdecc_frame::consts::{
    acmp_message, acmp_message_name, acmp_status, acmp_status_name, SUBTYPE_ACMP,
};
use avdecc_frame::{
    AcmpPdu, ControlHeader, EtherHeader, FrameError, MacAddr, ACMPDU_LEN, ETHER_HDR_SIZE,
};
use avdecc_transport::{DeliveryMode, TxQueue};
use bytes::{BufMut, Bytes, BytesMut};

use crate::aecp::Resolution;
use crate::clock::Clock;
use crate::config::AcmpConfig;
use crate::descriptor::{CommandKind, FrameInfo};
use crate::error::{ControllerError, Result};
use crate::inflight::{Expired, InflightTable, Lookup, PendingRequest, RequestState};
use crate::notify::{Notification, NotificationId, NotificationSink, Outcome};

/// Fields a response must echo to retire a command.
///
/// Talker fields take part only for CONNECT_RX and DISCONNECT_RX: a
/// GET_RX_STATE response reports whichever talker is connected, not the
/// zeroed talker in the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AcmpKey {
    command_type: u8,
    controller_entity_id: u64,
    listener_entity_id: u64,
    listener_unique_id: u16,
    talker: Option<(u64, u16)>,
}

impl AcmpKey {
    fn of_command(pdu: &AcmpPdu) -> Self {
        let talker = match pdu.message_type {
            acmp_message::CONNECT_RX_COMMAND | acmp_message::DISCONNECT_RX_COMMAND => {
                Some((pdu.talker_entity_id, pdu.talker_unique_id))
            }
            _ => None,
        };
        Self {
            command_type: pdu.message_type,
            controller_entity_id: pdu.controller_entity_id,
            listener_entity_id: pdu.listener_entity_id,
            listener_unique_id: pdu.listener_unique_id,
            talker,
        }
    }

    fn matches_response(&self, pdu: &AcmpPdu) -> bool {
        pdu.message_type == self.command_type + 1
            && pdu.controller_entity_id == self.controller_entity_id
            && pdu.listener_entity_id == self.listener_entity_id
            && pdu.listener_unique_id == self.listener_unique_id
            && self
                .talker
                .is_none_or(|talker| talker == (pdu.talker_entity_id, pdu.talker_unique_id))
    }
}

/// Correlates ACMP listener commands with their responses.
pub struct AcmpController {
    config: AcmpConfig,
    controller_entity_id: u64,
    controller_mac: MacAddr,
    tx: Arc<dyn TxQueue>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    inflight: Mutex<InflightTable<AcmpKey>>,
}

impl AcmpController {
    pub fn new(
        config: AcmpConfig,
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

    /// A zeroed ACMPDU-sized frame addressed to the ACMP multicast group.
    pub fn ether_frame_init(&self) -> BytesMut {
        let mut frame = BytesMut::zeroed(ETHER_HDR_SIZE + ACMPDU_LEN);
        // The buffer is sized for the header above.
        let _ = EtherHeader::avtp(MacAddr::ACMP_MULTICAST, self.controller_mac).encode(&mut frame);
        frame
    }

    /// Write the common control header and stamp a fresh sequence id.
    pub fn common_hdr_init(&self, message_type: u8, frame: &mut [u8]) -> Result<u16> {
        let current = ControlHeader::decode(frame, ETHER_HDR_SIZE)?;
        ControlHeader {
            subtype: SUBTYPE_ACMP,
            message_type,
            status: current.status,
            control_data_length: ACMP_CONTROL_DATA_LEN,
            stream_id: current.stream_id,
        }
        .encode(frame, ETHER_HDR_SIZE)?;

        let at = ETHER_HDR_SIZE + offsets::SEQUENCE_ID;
        if frame.len() < at + 2 {
            return Err(FrameError::BufferTooSmall {
                capacity: frame.len(),
                need: at + 2,
            }
            .into());
        }
        let sequence_id = self.lock()?.allocate_sequence_id()?;
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
        let pdu = AcmpPdu::decode(&frame, ETHER_HDR_SIZE)?;
        let timeout = self.config.timeout_for(pdu.message_type);
        let now = self.clock.now();
        self.lock()?.insert(
            pdu.sequence_id,
            PendingRequest {
                key: AcmpKey::of_command(&pdu),
                id,
                entity_id: pdu.listener_entity_id,
                command,
                frame: frame.clone(),
                retries: 0,
                timeout,
                deadline: now + timeout,
                state: RequestState::Sent,
            },
        )?;

        if let Err(err) = self.tx.enqueue(id.0, DeliveryMode::NotifyOnTransmit, frame) {
            self.lock()?.remove(pdu.sequence_id);
            tracing::warn!(
                entity_id = pdu.listener_entity_id,
                sequence_id = pdu.sequence_id,
                command = %command,
                error = %err,
                "ACMP command not queued"
            );
            return Err(err.into());
        }

        self.lock()?
            .set_state(pdu.sequence_id, RequestState::AwaitingResponse);
        tracing::debug!(
            entity_id = pdu.listener_entity_id,
            sequence_id = pdu.sequence_id,
            command = acmp_message_name(pdu.message_type),
            token = id.0,
            "ACMP command sent"
        );
        Ok(())
    }

    /// Resolve an inbound ACMP response against the pending commands.
    ///
    /// `apply` runs only when the response retires a pending command, after
    /// the table lock is released and before the caller is notified.
    pub fn state_resp<F>(&self, pdu: &AcmpPdu, response: FrameInfo, apply: F) -> Result<Resolution>
    where
        F: FnOnce() -> Result<()>,
    {
        let status = pdu.status;
        let lookup = self
            .lock()?
            .lookup(pdu.sequence_id, |key| key.matches_response(pdu), None);

        let request = match lookup {
            Lookup::Taken(request) => request,
            Lookup::NotFound | Lookup::Rearmed(_) => {
                tracing::debug!(
                    entity_id = pdu.listener_entity_id,
                    sequence_id = pdu.sequence_id,
                    message = acmp_message_name(pdu.message_type),
                    "unmatched ACMP response dropped"
                );
                return Ok(Resolution::Unmatched { status });
            }
        };

        if let Err(err) = apply() {
            tracing::warn!(
                entity_id = request.entity_id,
                error = %err,
                "descriptor cache not updated"
            );
        }
        let outcome = if status == acmp_status::SUCCESS {
            Outcome::Success(response)
        } else {
            Outcome::Failed { status }
        };
        tracing::debug!(
            entity_id = request.entity_id,
            sequence_id = pdu.sequence_id,
            command = %request.command,
            status = acmp_status_name(status),
            token = request.id.0,
            "ACMP command completed"
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

    /// Retransmit or time out every command whose deadline is at or before `now`.
    pub fn tick(&self, now: Instant) -> Result<()> {
        let expired = self.lock()?.expire(now, self.config.max_retries);
        for work in expired {
            match work {
                Expired::Retransmit {
                    id,
                    sequence_id,
                    frame,
                } => {
                    tracing::debug!(sequence_id, token = id.0, "ACMP command retransmitted");
                    match self.tx.enqueue(id.0, DeliveryMode::FireAndForget, frame) {
                        Ok(()) => self
                            .lock()?
                            .set_state(sequence_id, RequestState::AwaitingResponse),
                        Err(err) => tracing::warn!(
                            sequence_id,
                            error = %err,
                            "ACMP retransmission not queued"
                        ),
                    }
                }
                Expired::TimedOut(request) => {
                    tracing::warn!(
                        entity_id = request.entity_id,
                        command = %request.command,
                        token = request.id.0,
                        retries = request.retries,
                        "ACMP command timed out"
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

    /// Drop the pending command `id` without notifying. Returns whether one existed.
    pub fn cancel(&self, id: NotificationId) -> Result<bool> {
        Ok(self.lock()?.cancel(id).is_some())
    }

    /// Drop every pending command whose listener is `entity_id`, without notifying.
    pub fn cancel_entity(&self, entity_id: u64) -> Result<usize> {
        Ok(self.lock()?.cancel_entity(entity_id).len())
    }

    pub fn pending(&self) -> usize {
        self.lock().map(|table| table.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, InflightTable<AcmpKey>>> {
        self.inflight
            .lock()
            .map_err(|_| ControllerError::LockPoisoned("ACMP inflight"))
    }
}
