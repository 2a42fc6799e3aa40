use avdecc_controller::CommandKind;
use avdecc_frame::{decode_frame, AcmpPdu, AemPayload, AemPdu, EtherHeader, Pdu};

use crate::cmd::{read_frame, DecodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_fields, Field, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = read_frame(args.hex.as_deref(), args.file.as_ref())?;
    let frame = decode_frame(&bytes).map_err(|err| frame_error("failed decoding frame", err))?;

    let mut fields = ether_fields(&frame.ether);
    let kind = match &frame.pdu {
        Pdu::Aem(pdu) => {
            fields.extend(aem_fields(pdu));
            "aecp"
        }
        Pdu::Acmp(pdu) => {
            fields.extend(acmp_fields(pdu));
            "acmp"
        }
    };
    print_fields(kind, &fields, format);
    Ok(SUCCESS)
}

fn ether_fields(ether: &EtherHeader) -> Vec<Field> {
    vec![
        Field::new("dest", ether.dest),
        Field::new("src", ether.src),
        Field::new("ethertype", format!("0x{:04x}", ether.ethertype)),
    ]
}

fn aem_fields(pdu: &AemPdu) -> Vec<Field> {
    let header = &pdu.header;
    let command = CommandKind::from_aem(header.command_type)
        .map(|kind| kind.name().to_string())
        .unwrap_or_else(|| format!("0x{:04x}", header.command_type));
    let mut fields = vec![
        Field::new(
            "message_type",
            if header.is_response() { "AEM_RESPONSE" } else { "AEM_COMMAND" },
        ),
        Field::new("status", header.status),
        Field::new("control_data_length", header.control_data_length),
        Field::hex64("target_entity_id", header.target_entity_id),
        Field::hex64("controller_entity_id", header.controller_entity_id),
        Field::new("sequence_id", header.sequence_id),
        Field::new("unsolicited", header.unsolicited),
        Field::new("command_type", command),
        Field::new("descriptor_type", format!("0x{:04x}", pdu.descriptor_type)),
        Field::new("descriptor_index", pdu.descriptor_index),
    ];
    match &pdu.payload {
        AemPayload::Empty => {}
        AemPayload::StreamFormat(format) => fields.push(Field::hex64("stream_format", *format)),
        AemPayload::StreamInfo(info) => {
            fields.push(Field::new("flags", format!("0x{:08x}", info.flags)));
            fields.push(Field::hex64("stream_format", info.stream_format));
            fields.push(Field::hex64("stream_id", info.stream_id));
            fields.push(Field::new(
                "msrp_accumulated_latency",
                info.msrp_accumulated_latency,
            ));
            fields.push(Field::new("stream_dest_mac", info.stream_dest_mac));
            fields.push(Field::new("msrp_failure_code", info.msrp_failure_code));
            fields.push(Field::hex64(
                "msrp_failure_bridge_id",
                info.msrp_failure_bridge_id,
            ));
            fields.push(Field::new("stream_vlan_id", info.stream_vlan_id));
        }
        AemPayload::Counters(counters) => {
            fields.push(Field::new(
                "counters_valid",
                format!("0x{:08x}", counters.counters_valid),
            ));
            let block = counters
                .counters
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            fields.push(Field::new("counters", block));
        }
    }
    fields
}

fn acmp_fields(pdu: &AcmpPdu) -> Vec<Field> {
    let message = CommandKind::from_acmp(pdu.message_type)
        .map(|kind| {
            let suffix = if pdu.is_response() { "_RESPONSE" } else { "_COMMAND" };
            format!("{}{suffix}", kind.name())
        })
        .unwrap_or_else(|| pdu.message_type.to_string());
    vec![
        Field::new("message_type", message),
        Field::new("status", pdu.status),
        Field::hex64("stream_id", pdu.stream_id),
        Field::hex64("controller_entity_id", pdu.controller_entity_id),
        Field::hex64("talker_entity_id", pdu.talker_entity_id),
        Field::hex64("listener_entity_id", pdu.listener_entity_id),
        Field::new("talker_unique_id", pdu.talker_unique_id),
        Field::new("listener_unique_id", pdu.listener_unique_id),
        Field::new("stream_dest_mac", pdu.stream_dest_mac),
        Field::new("connection_count", pdu.connection_count),
        Field::new("sequence_id", pdu.sequence_id),
        Field::new("flags", format!("0x{:04x}", pdu.flags)),
        Field::new("stream_vlan_id", pdu.stream_vlan_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_frame::consts::{acmp_message, aem_command, descriptor_type};

    fn value<'a>(fields: &'a [Field], name: &str) -> &'a str {
        fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
            .unwrap()
    }

    #[test]
    fn aem_fields_name_the_command() {
        let mut pdu = AemPdu::command(
            0x0001_0203_0405_0607,
            aem_command::SET_STREAM_FORMAT,
            descriptor_type::STREAM_INPUT,
            2,
            AemPayload::StreamFormat(0x00A0_0208_4000_0800),
        );
        pdu.header.sequence_id = 9;
        let fields = aem_fields(&pdu);
        assert_eq!(value(&fields, "message_type"), "AEM_COMMAND");
        assert_eq!(value(&fields, "command_type"), "SET_STREAM_FORMAT");
        assert_eq!(value(&fields, "sequence_id"), "9");
        assert_eq!(value(&fields, "descriptor_index"), "2");
        assert_eq!(value(&fields, "stream_format"), "0x00a0020840000800");
    }

    #[test]
    fn acmp_fields_mark_responses() {
        let mut pdu = AcmpPdu::command(acmp_message::CONNECT_RX_RESPONSE, 7);
        pdu.listener_unique_id = 4;
        let fields = acmp_fields(&pdu);
        assert_eq!(value(&fields, "message_type"), "CONNECT_RX_RESPONSE");
        assert_eq!(value(&fields, "listener_unique_id"), "4");
        assert_eq!(value(&fields, "controller_entity_id"), "0x0000000000000007");
    }
}
