//! Which commands each descriptor type accepts.
//!
//! A descriptor type is selected by its AEM type tag. The façade for that
//! type implements [`DescriptorCapability`] and lists the command kinds it
//! can encode, decode and apply.

use avdecc_frame::consts::descriptor_type;

use crate::descriptor::CommandKind;
use crate::error::{ControllerError, Result};

/// Commands handled by STREAM_INPUT.
pub const STREAM_INPUT_COMMANDS: &[CommandKind] = &[
    CommandKind::GetStreamFormat,
    CommandKind::SetStreamFormat,
    CommandKind::GetStreamInfo,
    CommandKind::SetStreamInfo,
    CommandKind::StartStreaming,
    CommandKind::StopStreaming,
    CommandKind::GetCounters,
    CommandKind::ConnectRx,
    CommandKind::DisconnectRx,
    CommandKind::GetRxState,
];

/// Per-type command support.
pub trait DescriptorCapability {
    /// AEM descriptor type tag.
    const DESCRIPTOR_TYPE: u16;

    /// Command kinds this type can send and process.
    const COMMANDS: &'static [CommandKind];

    fn supports(kind: CommandKind) -> bool {
        Self::COMMANDS.contains(&kind)
    }

    /// `Ok` if `kind` is supported, otherwise `UnsupportedCommand`.
    fn ensure_supported(kind: CommandKind) -> Result<()> {
        if Self::supports(kind) {
            Ok(())
        } else {
            Err(ControllerError::UnsupportedCommand {
                descriptor_type: Self::DESCRIPTOR_TYPE,
                command: kind,
            })
        }
    }
}

/// Commands supported by `descriptor_type`. Unknown types support none.
pub fn commands_for(descriptor_type: u16) -> &'static [CommandKind] {
    match descriptor_type {
        descriptor_type::STREAM_INPUT => STREAM_INPUT_COMMANDS,
        _ => &[],
    }
}

/// Type-tag dispatch counterpart of [`DescriptorCapability::ensure_supported`].
pub fn ensure_supported(descriptor_type: u16, kind: CommandKind) -> Result<()> {
    if commands_for(descriptor_type).contains(&kind) {
        Ok(())
    } else {
        Err(ControllerError::UnsupportedCommand {
            descriptor_type,
            command: kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_input_supports_every_kind() {
        for kind in STREAM_INPUT_COMMANDS {
            assert!(ensure_supported(descriptor_type::STREAM_INPUT, *kind).is_ok());
        }
        assert_eq!(commands_for(descriptor_type::STREAM_INPUT).len(), 10);
    }

    #[test]
    fn external_port_input_supports_nothing() {
        assert!(commands_for(descriptor_type::EXTERNAL_PORT_INPUT).is_empty());
        let err = ensure_supported(descriptor_type::EXTERNAL_PORT_INPUT, CommandKind::GetCounters)
            .unwrap_err();
        assert!(matches!(
            err,
            ControllerError::UnsupportedCommand {
                descriptor_type: descriptor_type::EXTERNAL_PORT_INPUT,
                command: CommandKind::GetCounters,
            }
        ));
    }
}
