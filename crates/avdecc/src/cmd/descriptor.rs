use std::sync::Arc;

use avdecc_controller::{
    Controller, ControllerConfig, ExternalPortInputDescriptorResponse, NullSink,
    StreamInputDescriptorResponse,
};
use avdecc_frame::consts::descriptor_type;
use avdecc_frame::{AemHeader, EtherHeader, ETHER_HDR_SIZE};
use avdecc_transport::RecordingTxQueue;
use bytes::Bytes;
use tracing::debug;

use crate::cmd::{read_frame, DescriptorArgs};
use crate::exit::{controller_error, frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_fields, Field, OutputFormat};

/// Loads the frame into a controller's descriptor cache and prints the
/// cached view, so the output reflects what commands would operate on.
pub fn run(args: DescriptorArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = Bytes::from(read_frame(args.hex.as_deref(), args.file.as_ref())?);
    let ether =
        EtherHeader::decode(&frame).map_err(|err| frame_error("failed decoding frame", err))?;
    let header = AemHeader::decode(&frame, ETHER_HDR_SIZE)
        .map_err(|err| frame_error("failed decoding AEM header", err))?;

    let controller = Controller::new(
        ControllerConfig::new(header.controller_entity_id, ether.dest),
        Arc::new(RecordingTxQueue::new()),
        Arc::new(NullSink),
    );
    let entity_id = header.target_entity_id;
    controller
        .add_entity(entity_id, ether.src)
        .map_err(|err| controller_error("failed registering entity", err))?;
    let key = controller
        .add_descriptor(entity_id, frame)
        .map_err(|err| controller_error("failed caching descriptor", err))?;
    debug!(entity_id, key = %key, "descriptor cached");

    match key.descriptor_type {
        descriptor_type::STREAM_INPUT => {
            let view = controller
                .stream_input(entity_id, key.descriptor_index)
                .and_then(|stream| stream.get_stream_input_response())
                .map_err(|err| controller_error("failed reading descriptor", err))?;
            print_fields("stream_input", &stream_input_fields(&view), format);
        }
        descriptor_type::EXTERNAL_PORT_INPUT => {
            let view = controller
                .external_port_input(entity_id, key.descriptor_index)
                .and_then(|port| port.get_external_port_input_response())
                .map_err(|err| controller_error("failed reading descriptor", err))?;
            print_fields("external_port_input", &external_port_fields(&view), format);
        }
        other => {
            return Err(CliError::new(
                DATA_INVALID,
                format!("descriptor type 0x{other:04x} has no view"),
            ))
        }
    }
    Ok(SUCCESS)
}

fn stream_input_fields(view: &StreamInputDescriptorResponse) -> Vec<Field> {
    let mut fields = vec![
        Field::new("descriptor_index", view.descriptor_index()),
        Field::new("object_name", view.object_name()),
        Field::new("localized_description", view.localized_description()),
        Field::new("clock_domain_index", view.clock_domain_index()),
        Field::new("stream_flags", format!("0x{:04x}", view.stream_flags())),
        Field::hex64("current_format", view.current_format()),
        Field::new("number_of_formats", view.number_of_formats()),
    ];
    for talker in (0..3).filter_map(|n| view.backup_talker(n)) {
        fields.push(Field::new(
            "backup_talker",
            format!("0x{:016x}/{}", talker.entity_id, talker.unique_id),
        ));
    }
    let backedup = view.backedup_talker();
    fields.push(Field::new(
        "backedup_talker",
        format!("0x{:016x}/{}", backedup.entity_id, backedup.unique_id),
    ));
    fields.push(Field::new("avb_interface_index", view.avb_interface_index()));
    fields.push(Field::new("buffer_length", view.buffer_length()));
    for format in view.formats() {
        fields.push(Field::hex64("format", format));
    }
    fields
}

fn external_port_fields(view: &ExternalPortInputDescriptorResponse) -> Vec<Field> {
    vec![
        Field::new("descriptor_index", view.descriptor_index()),
        Field::new("port_flags", format!("0x{:04x}", view.port_flags())),
        Field::new("clock_domain_index", view.clock_domain_index()),
        Field::new("number_of_controls", view.number_of_controls()),
        Field::new("base_control", view.base_control()),
        Field::new("signal_type", format!("0x{:04x}", view.signal_type())),
        Field::new("signal_index", view.signal_index()),
        Field::new("signal_output", view.signal_output()),
        Field::new("block_latency", view.block_latency()),
        Field::new("jack_index", view.jack_index()),
    ]
}
