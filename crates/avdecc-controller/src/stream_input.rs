//! STREAM_INPUT command façade.
//!
//! Turns stream-level intents into AEM and ACMP command frames, and applies
//! the matching responses to the descriptor cache. Sends return as soon as
//! the frame is queued; completion arrives through the notification sink.

use std::sync::Arc;

use avdecc_frame::aecp::stream_info_flags;
use avdecc_frame::consts::{acmp_status, aem_status, descriptor_type};
use avdecc_frame::descriptor::set_current_format;
use avdecc_frame::{AcmpPdu, AemPayload, AemPdu, StreamInfo, ACMPDU_LEN, ETHER_HDR_SIZE};
use bytes::Bytes;

use crate::acmp::AcmpController;
use crate::aecp::{AecpController, Resolution, AEM_COMMAND};
use crate::capability::{DescriptorCapability, STREAM_INPUT_COMMANDS};
use crate::descriptor::{CommandKind, DescriptorKey, FrameInfo};
use crate::entity::Entity;
use crate::error::{ControllerError, Result};
use crate::notify::NotificationId;
use crate::views::{
    CountersResponse, RxStateResponse, StreamFormatResponse, StreamInfoResponse,
    StreamInputDescriptorResponse,
};

/// A command to a STREAM_INPUT descriptor together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRequest {
    GetStreamFormat,
    SetStreamFormat(u64),
    GetStreamInfo,
    SetStreamInfo(StreamInfo),
    StartStreaming,
    StopStreaming,
    GetCounters,
    ConnectRx {
        talker_entity_id: u64,
        talker_unique_id: u16,
        /// ACMP flags such as `acmp_flags::CLASS_B` or `FAST_CONNECT`.
        flags: u16,
    },
    DisconnectRx {
        talker_entity_id: u64,
        talker_unique_id: u16,
    },
    GetRxState,
}

impl CommandRequest {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandRequest::GetStreamFormat => CommandKind::GetStreamFormat,
            CommandRequest::SetStreamFormat(_) => CommandKind::SetStreamFormat,
            CommandRequest::GetStreamInfo => CommandKind::GetStreamInfo,
            CommandRequest::SetStreamInfo(_) => CommandKind::SetStreamInfo,
            CommandRequest::StartStreaming => CommandKind::StartStreaming,
            CommandRequest::StopStreaming => CommandKind::StopStreaming,
            CommandRequest::GetCounters => CommandKind::GetCounters,
            CommandRequest::ConnectRx { .. } => CommandKind::ConnectRx,
            CommandRequest::DisconnectRx { .. } => CommandKind::DisconnectRx,
            CommandRequest::GetRxState => CommandKind::GetRxState,
        }
    }
}

/// Handle on one cached STREAM_INPUT descriptor of a remote entity.
///
/// The entity acts as ACMP listener; the descriptor index is its listener
/// unique id.
#[derive(Clone)]
pub struct StreamInput {
    entity: Arc<Entity>,
    key: DescriptorKey,
    aecp: Arc<AecpController>,
    acmp: Arc<AcmpController>,
}

impl DescriptorCapability for StreamInput {
    const DESCRIPTOR_TYPE: u16 = descriptor_type::STREAM_INPUT;
    const COMMANDS: &'static [CommandKind] = STREAM_INPUT_COMMANDS;
}

impl StreamInput {
    /// Fails with `UnknownDescriptor` unless `entity` caches this descriptor.
    pub fn new(
        entity: Arc<Entity>,
        descriptor_index: u16,
        aecp: Arc<AecpController>,
        acmp: Arc<AcmpController>,
    ) -> Result<Self> {
        let key = DescriptorKey::new(Self::DESCRIPTOR_TYPE, descriptor_index);
        if !entity.has_descriptor(key)? {
            return Err(ControllerError::UnknownDescriptor {
                entity_id: entity.entity_id(),
                key,
            });
        }
        Ok(Self {
            entity,
            key,
            aecp,
            acmp,
        })
    }

    pub fn entity_id(&self) -> u64 {
        self.entity.entity_id()
    }

    pub fn descriptor_index(&self) -> u16 {
        self.key.descriptor_index
    }

    pub fn key(&self) -> DescriptorKey {
        self.key
    }

    /// Send any STREAM_INPUT command.
    pub fn send(&self, id: NotificationId, request: CommandRequest) -> Result<()> {
        match request {
            CommandRequest::GetStreamFormat => self.send_get_stream_format_cmd(id),
            CommandRequest::SetStreamFormat(format) => self.send_set_stream_format_cmd(id, format),
            CommandRequest::GetStreamInfo => self.send_get_stream_info_cmd(id),
            CommandRequest::SetStreamInfo(info) => self.send_set_stream_info_cmd(id, info),
            CommandRequest::StartStreaming => self.send_start_streaming_cmd(id),
            CommandRequest::StopStreaming => self.send_stop_streaming_cmd(id),
            CommandRequest::GetCounters => self.send_get_counters_cmd(id),
            CommandRequest::ConnectRx {
                talker_entity_id,
                talker_unique_id,
                flags,
            } => self.send_connect_rx_cmd(id, talker_entity_id, talker_unique_id, flags),
            CommandRequest::DisconnectRx {
                talker_entity_id,
                talker_unique_id,
            } => self.send_disconnect_rx_cmd(id, talker_entity_id, talker_unique_id),
            CommandRequest::GetRxState => self.send_get_rx_state_cmd(id),
        }
    }

    pub fn send_get_stream_format_cmd(&self, id: NotificationId) -> Result<()> {
        self.send_aem(id, CommandKind::GetStreamFormat, AemPayload::Empty)
    }

    pub fn send_set_stream_format_cmd(&self, id: NotificationId, format: u64) -> Result<()> {
        self.send_aem(id, CommandKind::SetStreamFormat, AemPayload::StreamFormat(format))
    }

    pub fn send_get_stream_info_cmd(&self, id: NotificationId) -> Result<()> {
        self.send_aem(id, CommandKind::GetStreamInfo, AemPayload::Empty)
    }

    /// Only fields whose `*_VALID` flag is set in `info.flags` are applied
    /// by the entity.
    pub fn send_set_stream_info_cmd(&self, id: NotificationId, info: StreamInfo) -> Result<()> {
        self.send_aem(id, CommandKind::SetStreamInfo, AemPayload::StreamInfo(info))
    }

    pub fn send_start_streaming_cmd(&self, id: NotificationId) -> Result<()> {
        self.send_aem(id, CommandKind::StartStreaming, AemPayload::Empty)
    }

    pub fn send_stop_streaming_cmd(&self, id: NotificationId) -> Result<()> {
        self.send_aem(id, CommandKind::StopStreaming, AemPayload::Empty)
    }

    pub fn send_get_counters_cmd(&self, id: NotificationId) -> Result<()> {
        self.send_aem(id, CommandKind::GetCounters, AemPayload::Empty)
    }

    /// Ask this listener to connect to the talker stream
    /// `talker_entity_id`/`talker_unique_id`.
    pub fn send_connect_rx_cmd(
        &self,
        id: NotificationId,
        talker_entity_id: u64,
        talker_unique_id: u16,
        flags: u16,
    ) -> Result<()> {
        self.send_acmp(id, CommandKind::ConnectRx, talker_entity_id, talker_unique_id, flags)
    }

    pub fn send_disconnect_rx_cmd(
        &self,
        id: NotificationId,
        talker_entity_id: u64,
        talker_unique_id: u16,
    ) -> Result<()> {
        self.send_acmp(id, CommandKind::DisconnectRx, talker_entity_id, talker_unique_id, 0)
    }

    pub fn send_get_rx_state_cmd(&self, id: NotificationId) -> Result<()> {
        self.send_acmp(id, CommandKind::GetRxState, 0, 0, 0)
    }

    pub fn proc_get_stream_format_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_aem_resp(CommandKind::GetStreamFormat, frame)
    }

    pub fn proc_set_stream_format_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_aem_resp(CommandKind::SetStreamFormat, frame)
    }

    pub fn proc_get_stream_info_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_aem_resp(CommandKind::GetStreamInfo, frame)
    }

    pub fn proc_set_stream_info_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_aem_resp(CommandKind::SetStreamInfo, frame)
    }

    pub fn proc_start_streaming_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_aem_resp(CommandKind::StartStreaming, frame)
    }

    pub fn proc_stop_streaming_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_aem_resp(CommandKind::StopStreaming, frame)
    }

    pub fn proc_get_counters_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_aem_resp(CommandKind::GetCounters, frame)
    }

    pub fn proc_connect_rx_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_acmp_resp(CommandKind::ConnectRx, frame)
    }

    pub fn proc_disconnect_rx_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_acmp_resp(CommandKind::DisconnectRx, frame)
    }

    pub fn proc_get_rx_state_resp(&self, frame: Bytes) -> Result<Resolution> {
        self.proc_acmp_resp(CommandKind::GetRxState, frame)
    }

    /// Process an AEM response of `kind` addressed to this descriptor.
    ///
    /// A frame that does not decode, or decodes to a response for another
    /// descriptor or command, is rejected before any request is matched and
    /// before the cache is touched.
    pub fn proc_aem_resp(&self, kind: CommandKind, frame: Bytes) -> Result<Resolution> {
        let pdu = match AemPdu::decode(&frame, ETHER_HDR_SIZE) {
            Ok(pdu) => pdu,
            Err(err) => {
                tracing::warn!(
                    entity_id = self.entity_id(),
                    command = %kind,
                    error = %err,
                    "AEM response dropped"
                );
                return Err(err.into());
            }
        };
        if !pdu.header.is_response()
            || pdu.header.target_entity_id != self.entity_id()
            || DescriptorKey::new(pdu.descriptor_type, pdu.descriptor_index) != self.key
            || CommandKind::from_aem(pdu.header.command_type) != Some(kind)
        {
            return Err(ControllerError::Misrouted(format!(
                "{} for 0x{:016x} {}[{}] handed to {} of 0x{:016x}",
                kind,
                pdu.header.target_entity_id,
                pdu.descriptor_type,
                pdu.descriptor_index,
                self.key,
                self.entity_id()
            )));
        }
        // Held through notification so a concurrent removal waits for it.
        let _alive = self.entity.liveness_guard()?;

        let response = FrameInfo::new(frame, ETHER_HDR_SIZE, pdu.encoded_len())?;
        let stored = response.clone();
        let status = pdu.header.status;
        self.aecp
            .update_inflight_for_rcvd_resp(&pdu.header, response, move || {
                if status != aem_status::SUCCESS {
                    return Ok(());
                }
                self.apply_aem(kind, &pdu, stored)
            })
    }

    /// Process an ACMP response of `kind` for this listener.
    pub fn proc_acmp_resp(&self, kind: CommandKind, frame: Bytes) -> Result<Resolution> {
        let pdu = match AcmpPdu::decode(&frame, ETHER_HDR_SIZE) {
            Ok(pdu) => pdu,
            Err(err) => {
                tracing::warn!(
                    entity_id = self.entity_id(),
                    command = %kind,
                    error = %err,
                    "ACMP response dropped"
                );
                return Err(err.into());
            }
        };
        if !pdu.is_response()
            || pdu.listener_entity_id != self.entity_id()
            || pdu.listener_unique_id != self.key.descriptor_index
            || CommandKind::from_acmp(pdu.message_type) != Some(kind)
        {
            return Err(ControllerError::Misrouted(format!(
                "{} for listener 0x{:016x}/{} handed to {} of 0x{:016x}",
                kind,
                pdu.listener_entity_id,
                pdu.listener_unique_id,
                self.key,
                self.entity_id()
            )));
        }
        // Held through notification so a concurrent removal waits for it.
        let _alive = self.entity.liveness_guard()?;

        let response = FrameInfo::new(frame, ETHER_HDR_SIZE, ACMPDU_LEN)?;
        let stored = response.clone();
        let status = pdu.status;
        self.acmp.state_resp(&pdu, response, move || {
            if status != acmp_status::SUCCESS || kind != CommandKind::GetRxState {
                return Ok(());
            }
            self.entity.with_descriptor_mut(self.key, |descriptor| {
                descriptor.store_cmd_resp_frame(
                    CommandKind::GetRxState,
                    stored.buffer().clone(),
                    stored.pos(),
                    stored.size(),
                )
            })
        })
    }

    /// Current descriptor snapshot.
    pub fn get_stream_input_response(&self) -> Result<StreamInputDescriptorResponse> {
        let snapshot = self
            .entity
            .with_descriptor(self.key, |descriptor| descriptor.snapshot().clone())?;
        StreamInputDescriptorResponse::new(snapshot)
    }

    /// Latest stream format reported by GET_STREAM_FORMAT or SET_STREAM_FORMAT.
    pub fn get_stream_format_response(&self) -> Result<Option<StreamFormatResponse>> {
        self.stored(CommandKind::GetStreamFormat)?
            .map(StreamFormatResponse::new)
            .transpose()
    }

    /// Latest stream info reported by GET_STREAM_INFO or SET_STREAM_INFO.
    pub fn get_stream_info_response(&self) -> Result<Option<StreamInfoResponse>> {
        self.stored(CommandKind::GetStreamInfo)?
            .map(StreamInfoResponse::new)
            .transpose()
    }

    pub fn get_counters_response(&self) -> Result<Option<CountersResponse>> {
        self.stored(CommandKind::GetCounters)?
            .map(CountersResponse::new)
            .transpose()
    }

    pub fn get_rx_state_response(&self) -> Result<Option<RxStateResponse>> {
        self.stored(CommandKind::GetRxState)?
            .map(RxStateResponse::new)
            .transpose()
    }

    fn stored(&self, kind: CommandKind) -> Result<Option<FrameInfo>> {
        self.entity
            .with_descriptor(self.key, |descriptor| descriptor.get_cmd_resp_frame_info(kind))
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.entity.is_alive() {
            Ok(())
        } else {
            Err(ControllerError::EntityDeparted(self.entity_id()))
        }
    }

    fn send_aem(&self, id: NotificationId, kind: CommandKind, payload: AemPayload) -> Result<()> {
        Self::ensure_supported(kind)?;
        self.ensure_alive()?;
        let command_type = kind
            .aem_command_type()
            .ok_or(ControllerError::UnsupportedCommand {
                descriptor_type: Self::DESCRIPTOR_TYPE,
                command: kind,
            })?;

        let pdu = AemPdu::command(
            self.aecp.controller_entity_id(),
            command_type,
            self.key.descriptor_type,
            self.key.descriptor_index,
            payload,
        );
        let mut frame = self.aecp.ether_frame_init(self.entity.mac(), pdu.encoded_len());
        if let Err(err) = pdu.encode(&mut frame, ETHER_HDR_SIZE) {
            tracing::warn!(
                entity_id = self.entity_id(),
                command = %kind,
                error = %err,
                "AEM command not encoded"
            );
            return Err(err.into());
        }
        self.aecp.common_hdr_init(
            AEM_COMMAND,
            &mut frame,
            self.entity_id(),
            pdu.header.control_data_length,
        )?;
        self.aecp.queue_command(id, kind, frame.freeze())
    }

    fn send_acmp(
        &self,
        id: NotificationId,
        kind: CommandKind,
        talker_entity_id: u64,
        talker_unique_id: u16,
        flags: u16,
    ) -> Result<()> {
        Self::ensure_supported(kind)?;
        self.ensure_alive()?;
        let message_type = kind
            .acmp_message_type()
            .ok_or(ControllerError::UnsupportedCommand {
                descriptor_type: Self::DESCRIPTOR_TYPE,
                command: kind,
            })?;

        let pdu = AcmpPdu {
            talker_entity_id,
            talker_unique_id,
            listener_entity_id: self.entity_id(),
            listener_unique_id: self.key.descriptor_index,
            flags,
            ..AcmpPdu::command(message_type, self.acmp.controller_entity_id())
        };
        let mut frame = self.acmp.ether_frame_init();
        if let Err(err) = pdu.encode(&mut frame, ETHER_HDR_SIZE) {
            tracing::warn!(
                entity_id = self.entity_id(),
                command = %kind,
                error = %err,
                "ACMP command not encoded"
            );
            return Err(err.into());
        }
        self.acmp.common_hdr_init(message_type, &mut frame)?;
        self.acmp.queue_command(id, kind, frame.freeze())
    }

    /// Cache update for a successful AEM response.
    fn apply_aem(&self, kind: CommandKind, pdu: &AemPdu, response: FrameInfo) -> Result<()> {
        let (store_as, new_format) = match (kind, &pdu.payload) {
            (CommandKind::GetStreamFormat, _) => (Some(CommandKind::GetStreamFormat), None),
            (CommandKind::SetStreamFormat, AemPayload::StreamFormat(format)) => {
                (Some(CommandKind::GetStreamFormat), Some(*format))
            }
            (CommandKind::GetStreamInfo, _) => (Some(CommandKind::GetStreamInfo), None),
            (CommandKind::SetStreamInfo, AemPayload::StreamInfo(info)) => {
                let format = info
                    .has_flag(stream_info_flags::STREAM_FORMAT_VALID)
                    .then_some(info.stream_format);
                (Some(CommandKind::GetStreamInfo), format)
            }
            (CommandKind::GetCounters, _) => (Some(CommandKind::GetCounters), None),
            _ => (None, None),
        };
        if store_as.is_none() && new_format.is_none() {
            return Ok(());
        }

        self.entity.with_descriptor_mut(self.key, |descriptor| {
            if let Some(format) = new_format {
                descriptor.modify_snapshot(|buf, pos| set_current_format(buf, pos, format))?;
                tracing::debug!(
                    entity_id = self.entity.entity_id(),
                    descriptor = %self.key,
                    format,
                    "stream format updated"
                );
            }
            if let Some(kind) = store_as {
                descriptor.store_cmd_resp_frame(
                    kind,
                    response.buffer().clone(),
                    response.pos(),
                    response.size(),
                )?;
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for StreamInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInput")
            .field("entity_id", &format_args!("0x{:016x}", self.entity_id()))
            .field("key", &self.key)
            .finish()
    }
}
