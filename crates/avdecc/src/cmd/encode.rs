use std::sync::Arc;

use avdecc_controller::{CommandRequest, Controller, ControllerConfig, NotificationId, NullSink};
use avdecc_frame::aecp::stream_info_flags;
use avdecc_frame::descriptor::encode_read_descriptor_response;
use avdecc_frame::{AemHeader, EtherHeader, StreamInfo, StreamInputDescriptor, ETHER_HDR_SIZE};
use avdecc_transport::RecordingTxQueue;
use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::cmd::{CommandName, EncodeArgs};
use crate::exit::{controller_error, frame_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

/// Builds the frame through a controller wired to a recording queue, so the
/// output is exactly what a live controller would transmit for sequence 0.
pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let request = request_for(&args)?;
    let tx = Arc::new(RecordingTxQueue::new());
    let controller = Controller::new(
        ControllerConfig::new(args.controller, args.controller_mac),
        tx.clone(),
        Arc::new(NullSink),
    );

    controller
        .add_entity(args.entity, args.entity_mac)
        .map_err(|err| controller_error("failed registering entity", err))?;
    let descriptor = placeholder_descriptor(&args)?;
    controller
        .add_descriptor(args.entity, descriptor)
        .map_err(|err| controller_error("failed caching descriptor", err))?;

    let stream_input = controller
        .stream_input(args.entity, args.index)
        .map_err(|err| controller_error("failed opening STREAM_INPUT", err))?;
    stream_input
        .send(NotificationId(0), request)
        .map_err(|err| controller_error("failed building command", err))?;

    let sent = tx
        .take()
        .pop()
        .ok_or_else(|| CliError::new(INTERNAL, "controller transmitted nothing"))?;
    debug!(
        command = request.kind().name(),
        mode = ?sent.mode,
        bytes = sent.frame.len(),
        "command encoded"
    );
    print_frame(request.kind().name(), &sent.frame, format);
    Ok(SUCCESS)
}

fn request_for(args: &EncodeArgs) -> CliResult<CommandRequest> {
    let stream_format = || {
        args.stream_format
            .ok_or_else(|| CliError::new(USAGE, "--stream-format is required"))
    };
    let talker = || {
        args.talker
            .ok_or_else(|| CliError::new(USAGE, "--talker is required"))
    };
    Ok(match args.command {
        CommandName::GetStreamFormat => CommandRequest::GetStreamFormat,
        CommandName::SetStreamFormat => CommandRequest::SetStreamFormat(stream_format()?),
        CommandName::GetStreamInfo => CommandRequest::GetStreamInfo,
        CommandName::SetStreamInfo => CommandRequest::SetStreamInfo(StreamInfo {
            flags: stream_info_flags::STREAM_FORMAT_VALID,
            stream_format: stream_format()?,
            ..StreamInfo::default()
        }),
        CommandName::StartStreaming => CommandRequest::StartStreaming,
        CommandName::StopStreaming => CommandRequest::StopStreaming,
        CommandName::GetCounters => CommandRequest::GetCounters,
        CommandName::ConnectRx => CommandRequest::ConnectRx {
            talker_entity_id: talker()?,
            talker_unique_id: args.talker_unique_id,
            flags: args.flags,
        },
        CommandName::DisconnectRx => CommandRequest::DisconnectRx {
            talker_entity_id: talker()?,
            talker_unique_id: args.talker_unique_id,
        },
        CommandName::GetRxState => CommandRequest::GetRxState,
    })
}

/// A READ_DESCRIPTOR response carrying an empty STREAM_INPUT at `args.index`.
fn placeholder_descriptor(args: &EncodeArgs) -> CliResult<Bytes> {
    let desc = StreamInputDescriptor {
        descriptor_index: args.index,
        ..StreamInputDescriptor::default()
    };
    let mut body = vec![0u8; desc.encoded_len()];
    desc.encode(&mut body, 0)
        .map_err(|err| frame_error("failed encoding descriptor", err))?;

    let mut frame = BytesMut::zeroed(ETHER_HDR_SIZE + 28 + body.len());
    EtherHeader::avtp(args.controller_mac, args.entity_mac)
        .encode(&mut frame)
        .map_err(|err| frame_error("failed encoding ethernet header", err))?;
    let header = AemHeader {
        target_entity_id: args.entity,
        controller_entity_id: args.controller,
        ..AemHeader::default()
    };
    encode_read_descriptor_response(&header, 0, &body, &mut frame, ETHER_HDR_SIZE)
        .map_err(|err| frame_error("failed encoding descriptor response", err))?;
    Ok(frame.freeze())
}
