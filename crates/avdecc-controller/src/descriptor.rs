use std::collections::HashMap;
use std::fmt;

use avdecc_frame::consts::{acmp_message, aem_command, descriptor_type_name};
use avdecc_frame::FrameError;
use bytes::{Bytes, BytesMut};

use crate::error::Result;

/// Identifies a descriptor within one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey {
    pub descriptor_type: u16,
    pub descriptor_index: u16,
}

impl DescriptorKey {
    pub fn new(descriptor_type: u16, descriptor_index: u16) -> Self {
        Self {
            descriptor_type,
            descriptor_index,
        }
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]",
            descriptor_type_name(self.descriptor_type),
            self.descriptor_index
        )
    }
}

/// A command the controller can issue, across AECP and ACMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    GetStreamFormat,
    SetStreamFormat,
    GetStreamInfo,
    SetStreamInfo,
    StartStreaming,
    StopStreaming,
    GetCounters,
    ConnectRx,
    DisconnectRx,
    GetRxState,
}

impl CommandKind {
    /// AEM command type, for AECP kinds.
    pub fn aem_command_type(self) -> Option<u16> {
        let command_type = match self {
            CommandKind::GetStreamFormat => aem_command::GET_STREAM_FORMAT,
            CommandKind::SetStreamFormat => aem_command::SET_STREAM_FORMAT,
            CommandKind::GetStreamInfo => aem_command::GET_STREAM_INFO,
            CommandKind::SetStreamInfo => aem_command::SET_STREAM_INFO,
            CommandKind::StartStreaming => aem_command::START_STREAMING,
            CommandKind::StopStreaming => aem_command::STOP_STREAMING,
            CommandKind::GetCounters => aem_command::GET_COUNTERS,
            _ => return None,
        };
        Some(command_type)
    }

    /// ACMP command message type, for ACMP kinds.
    pub fn acmp_message_type(self) -> Option<u8> {
        let message_type = match self {
            CommandKind::ConnectRx => acmp_message::CONNECT_RX_COMMAND,
            CommandKind::DisconnectRx => acmp_message::DISCONNECT_RX_COMMAND,
            CommandKind::GetRxState => acmp_message::GET_RX_STATE_COMMAND,
            _ => return None,
        };
        Some(message_type)
    }

    pub fn from_aem(command_type: u16) -> Option<Self> {
        let kind = match command_type & aem_command::COMMAND_TYPE_MASK {
            aem_command::GET_STREAM_FORMAT => CommandKind::GetStreamFormat,
            aem_command::SET_STREAM_FORMAT => CommandKind::SetStreamFormat,
            aem_command::GET_STREAM_INFO => CommandKind::GetStreamInfo,
            aem_command::SET_STREAM_INFO => CommandKind::SetStreamInfo,
            aem_command::START_STREAMING => CommandKind::StartStreaming,
            aem_command::STOP_STREAMING => CommandKind::StopStreaming,
            aem_command::GET_COUNTERS => CommandKind::GetCounters,
            _ => return None,
        };
        Some(kind)
    }

    /// Kind for an ACMP command or response message type.
    pub fn from_acmp(message_type: u8) -> Option<Self> {
        let kind = match message_type & !1 {
            acmp_message::CONNECT_RX_COMMAND => CommandKind::ConnectRx,
            acmp_message::DISCONNECT_RX_COMMAND => CommandKind::DisconnectRx,
            acmp_message::GET_RX_STATE_COMMAND => CommandKind::GetRxState,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::GetStreamFormat => "GET_STREAM_FORMAT",
            CommandKind::SetStreamFormat => "SET_STREAM_FORMAT",
            CommandKind::GetStreamInfo => "GET_STREAM_INFO",
            CommandKind::SetStreamInfo => "SET_STREAM_INFO",
            CommandKind::StartStreaming => "START_STREAMING",
            CommandKind::StopStreaming => "STOP_STREAMING",
            CommandKind::GetCounters => "GET_COUNTERS",
            CommandKind::ConnectRx => "CONNECT_RX",
            CommandKind::DisconnectRx => "DISCONNECT_RX",
            CommandKind::GetRxState => "GET_RX_STATE",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A region of a shared frame buffer: `size` bytes starting at `pos`.
///
/// Cloning shares the buffer. A region stays readable for as long as any
/// clone is alive, even after the cache has moved on to a newer buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameInfo {
    buffer: Bytes,
    pos: usize,
    size: usize,
}

impl FrameInfo {
    /// Fails if the region does not fit inside `buffer`.
    pub fn new(buffer: Bytes, pos: usize, size: usize) -> Result<Self> {
        let need = pos.saturating_add(size);
        if buffer.len() < need {
            return Err(FrameError::Truncated {
                len: buffer.len(),
                need,
            }
            .into());
        }
        Ok(Self { buffer, pos, size })
    }

    /// The whole backing buffer.
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The region itself.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[self.pos..self.pos + self.size]
    }
}

impl fmt::Debug for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameInfo")
            .field("buffer_len", &self.buffer.len())
            .field("pos", &self.pos)
            .field("size", &self.size)
            .finish()
    }
}

/// Cached state of one descriptor: its AEM snapshot plus the latest
/// response frame received for each command kind.
#[derive(Debug, Clone)]
pub struct Descriptor {
    key: DescriptorKey,
    snapshot: FrameInfo,
    responses: HashMap<CommandKind, FrameInfo>,
}

impl Descriptor {
    pub fn new(key: DescriptorKey, snapshot: FrameInfo) -> Self {
        Self {
            key,
            snapshot,
            responses: HashMap::new(),
        }
    }

    pub fn key(&self) -> DescriptorKey {
        self.key
    }

    pub fn snapshot(&self) -> &FrameInfo {
        &self.snapshot
    }

    pub fn get_desc_buffer(&self) -> &Bytes {
        self.snapshot.buffer()
    }

    pub fn get_desc_size(&self) -> usize {
        self.snapshot.size()
    }

    pub fn get_desc_pos(&self) -> usize {
        self.snapshot.pos()
    }

    /// Record the latest response for `kind`, dropping any earlier one.
    pub fn store_cmd_resp_frame(
        &mut self,
        kind: CommandKind,
        frame: Bytes,
        pos: usize,
        size: usize,
    ) -> Result<()> {
        let info = FrameInfo::new(frame, pos, size)?;
        self.responses.insert(kind, info);
        Ok(())
    }

    /// Latest response stored for `kind`, if any.
    pub fn get_cmd_resp_frame_info(&self, kind: CommandKind) -> Option<FrameInfo> {
        self.responses.get(&kind).cloned()
    }

    /// Swap in a new snapshot. The old buffer is released once no view
    /// holds it any more.
    pub fn replace_desc_frame(&mut self, buffer: Bytes, pos: usize, size: usize) -> Result<()> {
        self.snapshot = FrameInfo::new(buffer, pos, size)?;
        Ok(())
    }

    /// Copy the snapshot, let `edit` change the copy, then make the copy
    /// the snapshot. `edit` receives the copied buffer and the descriptor
    /// position in it. Nothing changes if `edit` fails.
    pub fn modify_snapshot<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut [u8], usize) -> std::result::Result<(), FrameError>,
    {
        let mut copy = BytesMut::from(&self.snapshot.buffer()[..]);
        edit(&mut copy, self.snapshot.pos())?;
        let (pos, size) = (self.snapshot.pos(), self.snapshot.size());
        self.replace_desc_frame(copy.freeze(), pos, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_frame::consts::descriptor_type;
    use avdecc_frame::descriptor::set_current_format;
    use avdecc_frame::StreamInputDescriptor;

    fn snapshot() -> FrameInfo {
        let desc = StreamInputDescriptor {
            current_format: 0x1111,
            ..StreamInputDescriptor::default()
        };
        let mut buf = vec![0xEEu8; 8 + desc.encoded_len()];
        desc.encode(&mut buf, 8).unwrap();
        FrameInfo::new(Bytes::from(buf), 8, desc.encoded_len()).unwrap()
    }

    #[test]
    fn command_kind_mappings() {
        assert_eq!(
            CommandKind::from_aem(aem_command::GET_COUNTERS | aem_command::UNSOLICITED_FLAG),
            Some(CommandKind::GetCounters)
        );
        assert_eq!(
            CommandKind::from_acmp(acmp_message::CONNECT_RX_RESPONSE),
            Some(CommandKind::ConnectRx)
        );
        assert_eq!(CommandKind::from_acmp(acmp_message::CONNECT_TX_COMMAND), None);
        assert_eq!(CommandKind::ConnectRx.aem_command_type(), None);
        assert_eq!(
            CommandKind::GetRxState.acmp_message_type(),
            Some(acmp_message::GET_RX_STATE_COMMAND)
        );
    }

    #[test]
    fn frame_info_bounds() {
        assert!(FrameInfo::new(Bytes::from_static(&[0; 10]), 4, 6).is_ok());
        assert!(FrameInfo::new(Bytes::from_static(&[0; 10]), 4, 7).is_err());
        let info = FrameInfo::new(Bytes::from_static(&[1, 2, 3, 4]), 1, 2).unwrap();
        assert_eq!(info.bytes(), &[2, 3]);
    }

    #[test]
    fn response_storage_is_per_kind() {
        let mut desc = Descriptor::new(
            DescriptorKey::new(descriptor_type::STREAM_INPUT, 0),
            snapshot(),
        );
        assert!(desc.get_cmd_resp_frame_info(CommandKind::GetCounters).is_none());

        desc.store_cmd_resp_frame(CommandKind::GetCounters, Bytes::from_static(&[1; 20]), 14, 6)
            .unwrap();
        desc.store_cmd_resp_frame(CommandKind::GetCounters, Bytes::from_static(&[2; 20]), 14, 6)
            .unwrap();
        let latest = desc.get_cmd_resp_frame_info(CommandKind::GetCounters).unwrap();
        assert_eq!(latest.bytes(), &[2; 6]);
        assert!(desc.get_cmd_resp_frame_info(CommandKind::GetStreamFormat).is_none());
    }

    #[test]
    fn modify_snapshot_copies_before_replacing() {
        let mut desc = Descriptor::new(
            DescriptorKey::new(descriptor_type::STREAM_INPUT, 0),
            snapshot(),
        );
        let held = desc.snapshot().clone();

        desc.modify_snapshot(|buf, pos| set_current_format(buf, pos, 0x2222))
            .unwrap();

        assert_ne!(desc.get_desc_buffer(), held.buffer());
        assert_eq!(desc.get_desc_pos(), held.pos());
        assert_eq!(desc.get_desc_size(), held.size());
        let at = held.pos() + 74;
        assert_eq!(&held.buffer()[at..at + 8], &0x1111u64.to_be_bytes());
        assert_eq!(&desc.get_desc_buffer()[at..at + 8], &0x2222u64.to_be_bytes());
    }

    #[test]
    fn failed_modify_leaves_snapshot() {
        let mut desc = Descriptor::new(
            DescriptorKey::new(descriptor_type::STREAM_INPUT, 0),
            snapshot(),
        );
        let before = desc.snapshot().clone();
        let result = desc.modify_snapshot(|_, _| {
            Err(FrameError::Truncated { len: 0, need: 1 })
        });
        assert!(result.is_err());
        assert_eq!(desc.snapshot(), &before);
    }
}
