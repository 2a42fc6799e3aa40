//! IEEE 1722 / 1722.1 protocol constants.
//!
//! Values are grouped by the field they populate. Only the subset the
//! controller core speaks is listed; everything else is reported as
//! "UNKNOWN" by the name helpers.

/// AVTP ethertype carried by every AVDECC frame.
pub const AVTP_ETHERTYPE: u16 = 0x22F0;

/// AVTP control subtype for AECP.
pub const SUBTYPE_AECP: u8 = 0x7B;

/// AVTP control subtype for ACMP.
pub const SUBTYPE_ACMP: u8 = 0x7C;

/// AVTP common control header: subtype through stream_id / entity_id.
pub const COMMON_CONTROL_HEADER_LEN: usize = 12;

/// AECP `message_type` values.
pub mod aecp_message {
    pub const AEM_COMMAND: u8 = 0;
    pub const AEM_RESPONSE: u8 = 1;
}

/// AEM `command_type` values.
pub mod aem_command {
    pub const READ_DESCRIPTOR: u16 = 0x0004;
    pub const SET_STREAM_FORMAT: u16 = 0x0008;
    pub const GET_STREAM_FORMAT: u16 = 0x0009;
    pub const SET_STREAM_INFO: u16 = 0x000E;
    pub const GET_STREAM_INFO: u16 = 0x000F;
    pub const START_STREAMING: u16 = 0x0022;
    pub const STOP_STREAMING: u16 = 0x0023;
    pub const GET_COUNTERS: u16 = 0x0029;

    /// Unsolicited flag carried in the top bit of `command_type`.
    pub const UNSOLICITED_FLAG: u16 = 0x8000;
    /// Mask selecting the command type proper.
    pub const COMMAND_TYPE_MASK: u16 = 0x7FFF;
}

/// AEM response `status` values.
pub mod aem_status {
    pub const SUCCESS: u8 = 0;
    pub const NOT_IMPLEMENTED: u8 = 1;
    pub const NO_SUCH_DESCRIPTOR: u8 = 2;
    pub const ENTITY_LOCKED: u8 = 3;
    pub const ENTITY_ACQUIRED: u8 = 4;
    pub const NOT_AUTHENTICATED: u8 = 5;
    pub const AUTHENTICATION_DISABLED: u8 = 6;
    pub const BAD_ARGUMENTS: u8 = 7;
    pub const NO_RESOURCES: u8 = 8;
    pub const IN_PROGRESS: u8 = 9;
    pub const ENTITY_MISBEHAVING: u8 = 10;
    pub const NOT_SUPPORTED: u8 = 11;
    pub const STREAM_IS_RUNNING: u8 = 12;
}

/// ACMP `message_type` values. Responses are always `command + 1`.
pub mod acmp_message {
    pub const CONNECT_TX_COMMAND: u8 = 0;
    pub const CONNECT_TX_RESPONSE: u8 = 1;
    pub const DISCONNECT_TX_COMMAND: u8 = 2;
    pub const DISCONNECT_TX_RESPONSE: u8 = 3;
    pub const GET_TX_STATE_COMMAND: u8 = 4;
    pub const GET_TX_STATE_RESPONSE: u8 = 5;
    pub const CONNECT_RX_COMMAND: u8 = 6;
    pub const CONNECT_RX_RESPONSE: u8 = 7;
    pub const DISCONNECT_RX_COMMAND: u8 = 8;
    pub const DISCONNECT_RX_RESPONSE: u8 = 9;
    pub const GET_RX_STATE_COMMAND: u8 = 10;
    pub const GET_RX_STATE_RESPONSE: u8 = 11;
    pub const GET_TX_CONNECTION_COMMAND: u8 = 12;
    pub const GET_TX_CONNECTION_RESPONSE: u8 = 13;
}

/// ACMP response `status` values.
pub mod acmp_status {
    pub const SUCCESS: u8 = 0;
    pub const LISTENER_UNKNOWN_ID: u8 = 1;
    pub const TALKER_UNKNOWN_ID: u8 = 2;
    pub const TALKER_DEST_MAC_FAIL: u8 = 3;
    pub const TALKER_NO_STREAM_INDEX: u8 = 4;
    pub const TALKER_NO_BANDWIDTH: u8 = 5;
    pub const TALKER_EXCLUSIVE: u8 = 6;
    pub const LISTENER_TALKER_TIMEOUT: u8 = 7;
    pub const LISTENER_EXCLUSIVE: u8 = 8;
    pub const STATE_UNAVAILABLE: u8 = 9;
    pub const NOT_CONNECTED: u8 = 10;
    pub const NO_SUCH_CONNECTION: u8 = 11;
    pub const COULD_NOT_SEND_MESSAGE: u8 = 12;
    pub const TALKER_MISBEHAVING: u8 = 13;
    pub const LISTENER_MISBEHAVING: u8 = 14;
    pub const CONTROLLER_NOT_AUTHORIZED: u8 = 16;
    pub const INCOMPATIBLE_REQUEST: u8 = 17;
    pub const NOT_SUPPORTED: u8 = 31;
}

/// ACMP `flags` bits.
pub mod acmp_flags {
    pub const CLASS_B: u16 = 0x0001;
    pub const FAST_CONNECT: u16 = 0x0002;
    pub const SAVED_STATE: u16 = 0x0004;
    pub const STREAMING_WAIT: u16 = 0x0008;
    pub const SUPPORTS_ENCRYPTED: u16 = 0x0010;
    pub const ENCRYPTED_PDU: u16 = 0x0020;
    pub const TALKER_FAILED: u16 = 0x0040;
}

/// AEM `descriptor_type` values.
pub mod descriptor_type {
    pub const ENTITY: u16 = 0x0000;
    pub const CONFIGURATION: u16 = 0x0001;
    pub const STREAM_INPUT: u16 = 0x0005;
    pub const STREAM_OUTPUT: u16 = 0x0006;
    pub const EXTERNAL_PORT_INPUT: u16 = 0x0020;
    pub const EXTERNAL_PORT_OUTPUT: u16 = 0x0021;
}

/// Returns a human-readable name for an AEM command type.
pub fn aem_command_name(command_type: u16) -> &'static str {
    match command_type & aem_command::COMMAND_TYPE_MASK {
        aem_command::READ_DESCRIPTOR => "READ_DESCRIPTOR",
        aem_command::SET_STREAM_FORMAT => "SET_STREAM_FORMAT",
        aem_command::GET_STREAM_FORMAT => "GET_STREAM_FORMAT",
        aem_command::SET_STREAM_INFO => "SET_STREAM_INFO",
        aem_command::GET_STREAM_INFO => "GET_STREAM_INFO",
        aem_command::START_STREAMING => "START_STREAMING",
        aem_command::STOP_STREAMING => "STOP_STREAMING",
        aem_command::GET_COUNTERS => "GET_COUNTERS",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for an AEM status code.
pub fn aem_status_name(status: u8) -> &'static str {
    match status {
        aem_status::SUCCESS => "SUCCESS",
        aem_status::NOT_IMPLEMENTED => "NOT_IMPLEMENTED",
        aem_status::NO_SUCH_DESCRIPTOR => "NO_SUCH_DESCRIPTOR",
        aem_status::ENTITY_LOCKED => "ENTITY_LOCKED",
        aem_status::ENTITY_ACQUIRED => "ENTITY_ACQUIRED",
        aem_status::NOT_AUTHENTICATED => "NOT_AUTHENTICATED",
        aem_status::AUTHENTICATION_DISABLED => "AUTHENTICATION_DISABLED",
        aem_status::BAD_ARGUMENTS => "BAD_ARGUMENTS",
        aem_status::NO_RESOURCES => "NO_RESOURCES",
        aem_status::IN_PROGRESS => "IN_PROGRESS",
        aem_status::ENTITY_MISBEHAVING => "ENTITY_MISBEHAVING",
        aem_status::NOT_SUPPORTED => "NOT_SUPPORTED",
        aem_status::STREAM_IS_RUNNING => "STREAM_IS_RUNNING",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for an ACMP message type.
pub fn acmp_message_name(message_type: u8) -> &'static str {
    match message_type {
        acmp_message::CONNECT_TX_COMMAND => "CONNECT_TX_COMMAND",
        acmp_message::CONNECT_TX_RESPONSE => "CONNECT_TX_RESPONSE",
        acmp_message::DISCONNECT_TX_COMMAND => "DISCONNECT_TX_COMMAND",
        acmp_message::DISCONNECT_TX_RESPONSE => "DISCONNECT_TX_RESPONSE",
        acmp_message::GET_TX_STATE_COMMAND => "GET_TX_STATE_COMMAND",
        acmp_message::GET_TX_STATE_RESPONSE => "GET_TX_STATE_RESPONSE",
        acmp_message::CONNECT_RX_COMMAND => "CONNECT_RX_COMMAND",
        acmp_message::CONNECT_RX_RESPONSE => "CONNECT_RX_RESPONSE",
        acmp_message::DISCONNECT_RX_COMMAND => "DISCONNECT_RX_COMMAND",
        acmp_message::DISCONNECT_RX_RESPONSE => "DISCONNECT_RX_RESPONSE",
        acmp_message::GET_RX_STATE_COMMAND => "GET_RX_STATE_COMMAND",
        acmp_message::GET_RX_STATE_RESPONSE => "GET_RX_STATE_RESPONSE",
        acmp_message::GET_TX_CONNECTION_COMMAND => "GET_TX_CONNECTION_COMMAND",
        acmp_message::GET_TX_CONNECTION_RESPONSE => "GET_TX_CONNECTION_RESPONSE",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for an ACMP status code.
pub fn acmp_status_name(status: u8) -> &'static str {
    match status {
        acmp_status::SUCCESS => "SUCCESS",
        acmp_status::LISTENER_UNKNOWN_ID => "LISTENER_UNKNOWN_ID",
        acmp_status::TALKER_UNKNOWN_ID => "TALKER_UNKNOWN_ID",
        acmp_status::TALKER_DEST_MAC_FAIL => "TALKER_DEST_MAC_FAIL",
        acmp_status::TALKER_NO_STREAM_INDEX => "TALKER_NO_STREAM_INDEX",
        acmp_status::TALKER_NO_BANDWIDTH => "TALKER_NO_BANDWIDTH",
        acmp_status::TALKER_EXCLUSIVE => "TALKER_EXCLUSIVE",
        acmp_status::LISTENER_TALKER_TIMEOUT => "LISTENER_TALKER_TIMEOUT",
        acmp_status::LISTENER_EXCLUSIVE => "LISTENER_EXCLUSIVE",
        acmp_status::STATE_UNAVAILABLE => "STATE_UNAVAILABLE",
        acmp_status::NOT_CONNECTED => "NOT_CONNECTED",
        acmp_status::NO_SUCH_CONNECTION => "NO_SUCH_CONNECTION",
        acmp_status::COULD_NOT_SEND_MESSAGE => "COULD_NOT_SEND_MESSAGE",
        acmp_status::TALKER_MISBEHAVING => "TALKER_MISBEHAVING",
        acmp_status::LISTENER_MISBEHAVING => "LISTENER_MISBEHAVING",
        acmp_status::CONTROLLER_NOT_AUTHORIZED => "CONTROLLER_NOT_AUTHORIZED",
        acmp_status::INCOMPATIBLE_REQUEST => "INCOMPATIBLE_REQUEST",
        acmp_status::NOT_SUPPORTED => "NOT_SUPPORTED",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for a descriptor type.
pub fn descriptor_type_name(descriptor_type: u16) -> &'static str {
    match descriptor_type {
        descriptor_type::ENTITY => "ENTITY",
        descriptor_type::CONFIGURATION => "CONFIGURATION",
        descriptor_type::STREAM_INPUT => "STREAM_INPUT",
        descriptor_type::STREAM_OUTPUT => "STREAM_OUTPUT",
        descriptor_type::EXTERNAL_PORT_INPUT => "EXTERNAL_PORT_INPUT",
        descriptor_type::EXTERNAL_PORT_OUTPUT => "EXTERNAL_PORT_OUTPUT",
        _ => "UNKNOWN",
    }
}
