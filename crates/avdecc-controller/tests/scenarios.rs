//! End-to-end command scenarios against a controller with a recording
//! transmit queue and a manual clock.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use avdecc_controller::{
    CallbackSink, Controller, ControllerConfig, DescriptorKey, ManualClock, Notification,
    NotificationId, Outcome, Resolution, StreamFormatResponse,
};
use avdecc_frame::aecp::aem_pdu_len;
use avdecc_frame::consts::{acmp_status, aecp_message, aem_command, aem_status, descriptor_type};
use avdecc_frame::descriptor::{encode_read_descriptor_response, stream_input};
use avdecc_frame::{
    AcmpPdu, AemHeader, AemPayload, AemPdu, Counters, EtherHeader, MacAddr, StreamInputDescriptor,
    TalkerRef, ACMPDU_LEN, ETHER_HDR_SIZE,
};
use avdecc_transport::{DeliveryMode, RecordingTxQueue};
use bytes::{Bytes, BytesMut};

const CONTROLLER: u64 = 0x0001_0203_0405_0607;
const CONTROLLER_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
const LISTENER: u64 = 0x0011_2233_4455_6677;
const LISTENER_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
const TALKER: u64 = 0x0099_8877_6655_4433;
const FORMAT: u64 = 0x00A0_0208_4000_0800;
const INITIAL_FORMAT: u64 = 0x00A0_0310_6000_0800;

struct Bench {
    controller: Arc<Controller>,
    tx: Arc<RecordingTxQueue>,
    clock: Arc<ManualClock>,
    notifications: mpsc::Receiver<Notification>,
}

impl Bench {
    fn new() -> Self {
        let tx = Arc::new(RecordingTxQueue::new());
        let clock = Arc::new(ManualClock::new());
        let (sink, notifications) = mpsc::channel();
        let controller = Arc::new(Controller::with_clock(
            ControllerConfig::new(CONTROLLER, CONTROLLER_MAC),
            tx.clone(),
            Arc::new(sink),
            clock.clone(),
        ));
        controller.add_entity(LISTENER, LISTENER_MAC).unwrap();
        controller
            .add_descriptor(LISTENER, read_descriptor_response(0))
            .unwrap();
        Self {
            controller,
            tx,
            clock,
            notifications,
        }
    }

    fn last_sent(&self) -> Bytes {
        self.tx.sent().last().map(|s| s.frame.clone()).unwrap()
    }

    fn drain(&self) -> Vec<Notification> {
        self.notifications.try_iter().collect()
    }

    fn snapshot_bytes(&self) -> Vec<u8> {
        self.controller
            .entity(LISTENER)
            .unwrap()
            .with_descriptor(DescriptorKey::new(descriptor_type::STREAM_INPUT, 0), |d| {
                d.snapshot().bytes().to_vec()
            })
            .unwrap()
    }
}

fn read_descriptor_response(index: u16) -> Bytes {
    let desc = StreamInputDescriptor {
        descriptor_index: index,
        object_name: "Listener In".into(),
        stream_flags: 0x0001,
        current_format: INITIAL_FORMAT,
        backup_talkers: [
            TalkerRef {
                entity_id: TALKER,
                unique_id: 0,
            },
            TalkerRef::default(),
            TalkerRef::default(),
        ],
        buffer_length: 8000,
        formats: vec![FORMAT, INITIAL_FORMAT],
        ..StreamInputDescriptor::default()
    };
    let mut body = vec![0u8; desc.encoded_len()];
    desc.encode(&mut body, 0).unwrap();

    let mut frame = BytesMut::zeroed(ETHER_HDR_SIZE + 28 + body.len());
    EtherHeader::avtp(CONTROLLER_MAC, LISTENER_MAC)
        .encode(&mut frame)
        .unwrap();
    let header = AemHeader {
        target_entity_id: LISTENER,
        controller_entity_id: CONTROLLER,
        ..AemHeader::default()
    };
    encode_read_descriptor_response(&header, 0, &body, &mut frame, ETHER_HDR_SIZE).unwrap();
    frame.freeze()
}

/// AEM response echoing `command` with `status` and `payload`.
fn aem_response(command: &Bytes, status: u8, payload: AemPayload) -> Bytes {
    let mut pdu = AemPdu::decode(command, ETHER_HDR_SIZE).unwrap();
    pdu.header.message_type = aecp_message::AEM_RESPONSE;
    pdu.header.status = status;
    pdu.payload = payload;
    let len = aem_pdu_len(pdu.header.command_type, true).unwrap();
    pdu.header.control_data_length = (len - 12) as u16;
    let mut frame = BytesMut::zeroed(ETHER_HDR_SIZE + len);
    EtherHeader::avtp(CONTROLLER_MAC, LISTENER_MAC)
        .encode(&mut frame)
        .unwrap();
    pdu.encode(&mut frame, ETHER_HDR_SIZE).unwrap();
    frame.freeze()
}

/// ACMP response echoing `command` with `status`.
fn acmp_response(command: &Bytes, status: u8) -> Bytes {
    let mut pdu = AcmpPdu::decode(command, ETHER_HDR_SIZE).unwrap();
    pdu.message_type += 1;
    pdu.status = status;
    let mut frame = BytesMut::zeroed(ETHER_HDR_SIZE + ACMPDU_LEN);
    EtherHeader::avtp(MacAddr::ACMP_MULTICAST, LISTENER_MAC)
        .encode(&mut frame)
        .unwrap();
    pdu.encode(&mut frame, ETHER_HDR_SIZE).unwrap();
    frame.freeze()
}

fn counters(first: u32) -> Counters {
    let mut counters = Counters {
        counters_valid: 1,
        ..Counters::default()
    };
    counters.counters[0] = first;
    counters
}

#[test]
fn get_stream_format_yields_one_success() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input.send_get_stream_format_cmd(NotificationId(1)).unwrap();

    let response = aem_response(
        &bench.last_sent(),
        aem_status::SUCCESS,
        AemPayload::StreamFormat(FORMAT),
    );
    bench.controller.process_frame(response).unwrap();

    let notes = bench.drain();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, NotificationId(1));
    let Outcome::Success(frame) = notes[0].outcome.clone() else {
        panic!("expected success, got {:?}", notes[0].outcome);
    };
    assert_eq!(StreamFormatResponse::new(frame).unwrap().stream_format(), FORMAT);

    let stored = input.get_stream_format_response().unwrap().unwrap();
    assert_eq!(stored.stream_format(), FORMAT);
    assert_eq!(stored.status(), aem_status::SUCCESS);
}

#[test]
fn connect_rx_refused_reports_status_and_keeps_cache() {
    let bench = Bench::new();
    let before = bench.snapshot_bytes();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input
        .send_connect_rx_cmd(NotificationId(2), TALKER, 3, 0)
        .unwrap();
    assert_eq!(bench.tx.sent()[0].mode, DeliveryMode::NotifyOnTransmit);

    let response = acmp_response(&bench.last_sent(), acmp_status::CONTROLLER_NOT_AUTHORIZED);
    bench.controller.process_frame(response).unwrap();

    let notes = bench.drain();
    assert_eq!(notes.len(), 1);
    assert_eq!(
        notes[0].outcome,
        Outcome::Failed {
            status: acmp_status::CONTROLLER_NOT_AUTHORIZED
        }
    );
    assert_eq!(bench.snapshot_bytes(), before);
    assert!(input.get_rx_state_response().unwrap().is_none());
}

#[test]
fn out_of_order_counters_resolve_their_own_tokens() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input.send_get_counters_cmd(NotificationId(10)).unwrap();
    let first = bench.last_sent();
    input.send_get_counters_cmd(NotificationId(11)).unwrap();
    let second = bench.last_sent();

    bench
        .controller
        .process_frame(aem_response(
            &second,
            aem_status::SUCCESS,
            AemPayload::Counters(counters(222)),
        ))
        .unwrap();
    bench
        .controller
        .process_frame(aem_response(
            &first,
            aem_status::SUCCESS,
            AemPayload::Counters(counters(111)),
        ))
        .unwrap();

    let notes = bench.drain();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].id, NotificationId(11));
    assert_eq!(notes[1].id, NotificationId(10));
    for note in &notes {
        let Outcome::Success(frame) = &note.outcome else {
            panic!("expected success");
        };
        let view = avdecc_controller::CountersResponse::new(frame.clone()).unwrap();
        let expected = if note.id == NotificationId(11) { 222 } else { 111 };
        assert_eq!(view.counter(0), Some(expected));
    }
    assert_eq!(
        input.get_counters_response().unwrap().unwrap().counter(0),
        Some(111)
    );
}

#[test]
fn retry_then_late_response_resolves_once() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input.send_get_stream_info_cmd(NotificationId(20)).unwrap();
    let command = bench.last_sent();

    bench.clock.advance(Duration::from_millis(250));
    bench.controller.tick().unwrap();
    let sent = bench.tx.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].frame, command);
    assert_eq!(sent[1].token, 20);
    assert!(bench.drain().is_empty());

    let response = aem_response(
        &command,
        aem_status::SUCCESS,
        AemPayload::StreamInfo(Default::default()),
    );
    bench.controller.process_frame(response.clone()).unwrap();
    let duplicate = bench.controller.process_frame(response).unwrap();
    assert!(matches!(duplicate, Some(Resolution::Unmatched { .. })));

    bench.clock.advance(Duration::from_secs(5));
    bench.controller.tick().unwrap();

    let notes = bench.drain();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].outcome.is_success());
}

#[test]
fn exhausted_retries_time_out_once() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input.send_get_rx_state_cmd(NotificationId(21)).unwrap();
    let command = bench.last_sent();

    for _ in 0..5 {
        bench.clock.advance(Duration::from_millis(200));
        bench.controller.tick().unwrap();
    }
    let notes = bench.drain();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].outcome, Outcome::TimedOut);
    assert_eq!(bench.tx.len(), 2);

    let late = bench
        .controller
        .process_frame(acmp_response(&command, acmp_status::SUCCESS))
        .unwrap();
    assert!(matches!(late, Some(Resolution::Unmatched { .. })));
    assert!(bench.drain().is_empty());
    assert!(input.get_rx_state_response().unwrap().is_none());
}

#[test]
fn unmatched_response_changes_nothing() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input.send_set_stream_format_cmd(NotificationId(30), FORMAT).unwrap();
    let command = bench.last_sent();
    let before = bench.snapshot_bytes();

    let mut stale = BytesMut::from(&aem_response(
        &command,
        aem_status::SUCCESS,
        AemPayload::StreamFormat(FORMAT),
    )[..]);
    let seq_at = ETHER_HDR_SIZE + 20;
    stale[seq_at] ^= 0x80;
    let resolution = bench.controller.process_frame(stale.freeze()).unwrap();

    assert!(matches!(resolution, Some(Resolution::Unmatched { .. })));
    assert!(bench.drain().is_empty());
    assert_eq!(bench.snapshot_bytes(), before);
    assert!(input.get_stream_format_response().unwrap().is_none());
    assert_eq!(bench.controller.pending(), 1);
}

#[test]
fn set_stream_format_touches_only_the_format_field() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    let view_before = input.get_stream_input_response().unwrap();
    let before = bench.snapshot_bytes();

    input.send_set_stream_format_cmd(NotificationId(31), FORMAT).unwrap();
    let response = aem_response(
        &bench.last_sent(),
        aem_status::SUCCESS,
        AemPayload::StreamFormat(FORMAT),
    );
    bench.controller.process_frame(response).unwrap();

    let after = bench.snapshot_bytes();
    let at = stream_input::CURRENT_FORMAT;
    assert_eq!(&after[at..at + 8], &FORMAT.to_be_bytes());
    assert_eq!(&after[..at], &before[..at]);
    assert_eq!(&after[at + 8..], &before[at + 8..]);

    assert_eq!(view_before.current_format(), INITIAL_FORMAT);
    let view_after = input.get_stream_input_response().unwrap();
    assert_eq!(view_after.current_format(), FORMAT);
    assert_eq!(view_after.object_name(), "Listener In");
    assert_eq!(view_after.backup_talker(0).map(|t| t.entity_id), Some(TALKER));
}

#[test]
fn removed_entity_ignores_late_responses() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input.send_set_stream_format_cmd(NotificationId(40), FORMAT).unwrap();
    let command = bench.last_sent();
    let before = bench.snapshot_bytes();
    let entity = bench.controller.entity(LISTENER).unwrap();

    bench.controller.remove_entity(LISTENER).unwrap();
    let resolution = bench
        .controller
        .process_frame(aem_response(
            &command,
            aem_status::SUCCESS,
            AemPayload::StreamFormat(FORMAT),
        ))
        .unwrap();

    assert_eq!(resolution, None);
    assert!(bench.drain().is_empty());
    let after = entity
        .with_descriptor(DescriptorKey::new(descriptor_type::STREAM_INPUT, 0), |d| {
            d.snapshot().bytes().to_vec()
        })
        .unwrap();
    assert_eq!(after, before);
}

#[test]
fn concurrent_senders_get_distinct_sequence_ids() {
    let bench = Bench::new();
    let mut handles = Vec::new();
    for worker in 0..4u64 {
        let controller = Arc::clone(&bench.controller);
        handles.push(thread::spawn(move || {
            let input = controller.stream_input(LISTENER, 0).unwrap();
            for n in 0..25 {
                input
                    .send_get_counters_cmd(NotificationId(worker * 100 + n))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let sequence_ids: HashSet<u16> = bench
        .tx
        .sent()
        .iter()
        .map(|s| AemHeader::decode(&s.frame, ETHER_HDR_SIZE).unwrap().sequence_id)
        .collect();
    assert_eq!(sequence_ids.len(), 100);
    assert_eq!(bench.controller.pending(), 100);
}

#[test]
fn responses_race_the_timer() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    let mut commands = Vec::new();
    for n in 0..50 {
        input.send_get_counters_cmd(NotificationId(n)).unwrap();
        commands.push(bench.last_sent());
    }
    bench.clock.advance(Duration::from_millis(250));

    let responder = {
        let controller = Arc::clone(&bench.controller);
        thread::spawn(move || {
            for command in commands {
                let response =
                    aem_response(&command, aem_status::SUCCESS, AemPayload::Counters(counters(1)));
                controller.process_frame(response).unwrap();
            }
        })
    };
    let ticker = {
        let controller = Arc::clone(&bench.controller);
        let clock = Arc::clone(&bench.clock);
        thread::spawn(move || {
            for _ in 0..10 {
                controller.tick().unwrap();
                clock.advance(Duration::from_millis(250));
            }
        })
    };
    responder.join().unwrap();
    ticker.join().unwrap();

    let notes = bench.drain();
    assert_eq!(notes.len(), 50);
    let ids: HashSet<NotificationId> = notes.iter().map(|n| n.id).collect();
    assert_eq!(ids.len(), 50);
    assert_eq!(bench.controller.pending(), 0);
}

#[test]
fn unsolicited_format_change_updates_cache_silently() {
    let bench = Bench::new();
    let input = bench.controller.stream_input(LISTENER, 0).unwrap();
    input.send_get_stream_format_cmd(NotificationId(50)).unwrap();
    let command = bench.last_sent();

    let mut push = AemPdu::decode(
        &aem_response(&command, aem_status::SUCCESS, AemPayload::StreamFormat(FORMAT)),
        ETHER_HDR_SIZE,
    )
    .unwrap();
    push.header.command_type = aem_command::SET_STREAM_FORMAT;
    push.header.unsolicited = true;
    push.header.sequence_id = push.header.sequence_id.wrapping_add(0x100);
    let mut frame = BytesMut::zeroed(ETHER_HDR_SIZE + push.encoded_len());
    EtherHeader::avtp(CONTROLLER_MAC, LISTENER_MAC)
        .encode(&mut frame)
        .unwrap();
    push.encode(&mut frame, ETHER_HDR_SIZE).unwrap();

    let resolution = bench.controller.process_frame(frame.freeze()).unwrap();

    assert_eq!(
        resolution,
        Some(Resolution::Unsolicited {
            status: aem_status::SUCCESS
        })
    );
    assert!(bench.drain().is_empty());
    assert_eq!(
        input.get_stream_input_response().unwrap().current_format(),
        FORMAT
    );
    assert_eq!(
        input.get_stream_format_response().unwrap().unwrap().stream_format(),
        FORMAT
    );
    assert_eq!(bench.controller.pending(), 1);
}

#[test]
fn removal_waits_for_notification_in_progress() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let sink = CallbackSink(move |note: Notification| {
        entered_tx.send(note.id).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
    });
    let tx = Arc::new(RecordingTxQueue::new());
    let controller = Arc::new(Controller::with_clock(
        ControllerConfig::new(CONTROLLER, CONTROLLER_MAC),
        tx.clone(),
        Arc::new(sink),
        Arc::new(ManualClock::new()),
    ));
    controller.add_entity(LISTENER, LISTENER_MAC).unwrap();
    controller
        .add_descriptor(LISTENER, read_descriptor_response(0))
        .unwrap();
    controller
        .stream_input(LISTENER, 0)
        .unwrap()
        .send_set_stream_format_cmd(NotificationId(60), FORMAT)
        .unwrap();
    let command = tx.sent().last().map(|s| s.frame.clone()).unwrap();

    let receiver = {
        let controller = Arc::clone(&controller);
        thread::spawn(move || {
            let response =
                aem_response(&command, aem_status::SUCCESS, AemPayload::StreamFormat(FORMAT));
            controller.process_frame(response).unwrap()
        })
    };
    assert_eq!(
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        NotificationId(60)
    );

    let (removed_tx, removed_rx) = mpsc::channel();
    let remover = {
        let controller = Arc::clone(&controller);
        thread::spawn(move || {
            controller.remove_entity(LISTENER).unwrap();
            removed_tx.send(()).unwrap();
        })
    };
    assert!(removed_rx.recv_timeout(Duration::from_millis(50)).is_err());

    release_tx.send(()).unwrap();
    removed_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(
        receiver.join().unwrap(),
        Some(Resolution::Completed { .. })
    ));
    remover.join().unwrap();
    assert_eq!(controller.pending(), 0);
    assert!(controller.entity(LISTENER).is_err());
}
