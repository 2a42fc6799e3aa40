//! Controller wiring: entity directory, both correlation engines, the
//! receive demultiplexer and the retry timer.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use avdecc_frame::consts::{aem_status, descriptor_type, SUBTYPE_ACMP, SUBTYPE_AECP};
use avdecc_frame::descriptor::read_descriptor_body;
use avdecc_frame::header::peek_subtype;
use avdecc_frame::{
    AcmpPdu, AemHeader, AemPdu, EtherHeader, FrameError, MacAddr, ACMPDU_LEN, ETHER_HDR_SIZE,
};
use avdecc_transport::TxQueue;
use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::acmp::AcmpController;
use crate::aecp::{AecpController, Resolution};
use crate::capability;
use crate::clock::{Clock, SystemClock};
use crate::config::ControllerConfig;
use crate::descriptor::{CommandKind, DescriptorKey, FrameInfo};
use crate::entity::{Entity, EntityDirectory};
use crate::error::{ControllerError, Result};
use crate::external_port_input::ExternalPortInput;
use crate::notify::{NotificationId, NotificationSink};
use crate::stream_input::{CommandRequest, StreamInput};

/// An AVDECC controller core.
///
/// Owns the AECP and ACMP engines and the entity directory. Share it behind
/// an `Arc`: sends, [`process_frame`](Self::process_frame) and
/// [`tick`](Self::tick) may run on different threads.
pub struct Controller {
    config: ControllerConfig,
    directory: Arc<EntityDirectory>,
    aecp: Arc<AecpController>,
    acmp: Arc<AcmpController>,
    clock: Arc<dyn Clock>,
    // Held shared by each retry pass; taken exclusively to wait one out.
    ticking: RwLock<()>,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        tx: Arc<dyn TxQueue>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::with_clock(config, tx, sink, Arc::new(SystemClock))
    }

    /// Build a controller on an explicit time source.
    pub fn with_clock(
        config: ControllerConfig,
        tx: Arc<dyn TxQueue>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let aecp = Arc::new(AecpController::new(
            config.aecp.clone(),
            config.controller_entity_id,
            config.controller_mac,
            Arc::clone(&tx),
            Arc::clone(&clock),
            Arc::clone(&sink),
        ));
        let acmp = Arc::new(AcmpController::new(
            config.acmp.clone(),
            config.controller_entity_id,
            config.controller_mac,
            tx,
            Arc::clone(&clock),
            sink,
        ));
        Self {
            directory: Arc::new(EntityDirectory::new(config.controller_entity_id)),
            config,
            aecp,
            acmp,
            clock,
            ticking: RwLock::new(()),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn controller_entity_id(&self) -> u64 {
        self.config.controller_entity_id
    }

    pub fn directory(&self) -> &Arc<EntityDirectory> {
        &self.directory
    }

    pub fn aecp(&self) -> &Arc<AecpController> {
        &self.aecp
    }

    pub fn acmp(&self) -> &Arc<AcmpController> {
        &self.acmp
    }

    /// Register a discovered entity reachable at `mac`.
    pub fn add_entity(&self, entity_id: u64, mac: MacAddr) -> Result<Arc<Entity>> {
        let entity = self.directory.insert(Entity::new(entity_id, mac))?;
        info!(entity_id, mac = %mac, "entity added");
        Ok(entity)
    }

    pub fn entity(&self, entity_id: u64) -> Result<Arc<Entity>> {
        self.directory.get(entity_id)
    }

    /// Cache the descriptor carried by a READ_DESCRIPTOR response frame.
    ///
    /// The frame becomes the descriptor's snapshot buffer; nothing is copied.
    pub fn add_descriptor(&self, entity_id: u64, frame: Bytes) -> Result<DescriptorKey> {
        let entity = self.directory.get(entity_id)?;
        EtherHeader::decode(&frame)?;
        let header = AemHeader::decode(&frame, ETHER_HDR_SIZE)?;
        if header.target_entity_id != entity_id {
            return Err(ControllerError::Misrouted(format!(
                "READ_DESCRIPTOR from 0x{:016x} added to 0x{entity_id:016x}",
                header.target_entity_id
            )));
        }
        if header.status != aem_status::SUCCESS {
            return Err(ControllerError::DescriptorRejected {
                entity_id,
                status: header.status,
            });
        }
        let (pos, size) = read_descriptor_body(&frame, ETHER_HDR_SIZE)?;
        entity.insert_descriptor(FrameInfo::new(frame, pos, size)?)
    }

    /// Command façade for STREAM_INPUT `descriptor_index` of `entity_id`.
    pub fn stream_input(&self, entity_id: u64, descriptor_index: u16) -> Result<StreamInput> {
        StreamInput::new(
            self.directory.get(entity_id)?,
            descriptor_index,
            Arc::clone(&self.aecp),
            Arc::clone(&self.acmp),
        )
    }

    pub fn external_port_input(
        &self,
        entity_id: u64,
        descriptor_index: u16,
    ) -> Result<ExternalPortInput> {
        ExternalPortInput::new(self.directory.get(entity_id)?, descriptor_index)
    }

    /// Send `request` to the descriptor `key`, selected by its type tag.
    pub fn send(
        &self,
        entity_id: u64,
        key: DescriptorKey,
        id: NotificationId,
        request: CommandRequest,
    ) -> Result<()> {
        capability::ensure_supported(key.descriptor_type, request.kind())?;
        match key.descriptor_type {
            descriptor_type::STREAM_INPUT => self
                .stream_input(entity_id, key.descriptor_index)?
                .send(id, request),
            other => Err(ControllerError::UnsupportedCommand {
                descriptor_type: other,
                command: request.kind(),
            }),
        }
    }

    /// Route one received Ethernet frame.
    ///
    /// Returns `None` for frames that are not responses to this controller
    /// or that concern an unknown entity or command. Undecodable frames are
    /// returned as errors and never matched.
    pub fn process_frame(&self, frame: Bytes) -> Result<Option<Resolution>> {
        match EtherHeader::decode(&frame) {
            Ok(_) => {}
            Err(FrameError::BadEthertype(ethertype)) => {
                trace!(ethertype, "non-AVTP frame ignored");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }
        match peek_subtype(&frame, ETHER_HDR_SIZE)? {
            SUBTYPE_AECP => self.process_aecp(frame),
            SUBTYPE_ACMP => self.process_acmp(frame),
            subtype => {
                trace!(subtype, "AVTP subtype ignored");
                Ok(None)
            }
        }
    }

    fn process_aecp(&self, frame: Bytes) -> Result<Option<Resolution>> {
        let header = match AemHeader::decode(&frame, ETHER_HDR_SIZE) {
            Ok(header) => header,
            Err(FrameError::UnsupportedMessageType(message_type)) => {
                trace!(message_type, "non-AEM AECP message ignored");
                return Ok(None);
            }
            Err(err) => {
                warn!(error = %err, "AECP frame dropped");
                return Err(err.into());
            }
        };
        if !header.is_response()
            || header.controller_entity_id != self.config.controller_entity_id
        {
            return Ok(None);
        }
        let Some(kind) = CommandKind::from_aem(header.command_type) else {
            debug!(
                entity_id = header.target_entity_id,
                command_type = header.command_type,
                "AEM response for unhandled command ignored"
            );
            return Ok(None);
        };
        let Some(entity) = self.known_entity(header.target_entity_id)? else {
            return Ok(None);
        };

        let pdu = match AemPdu::decode(&frame, ETHER_HDR_SIZE) {
            Ok(pdu) => pdu,
            Err(err) => {
                warn!(
                    entity_id = entity.entity_id(),
                    command = %kind,
                    error = %err,
                    "AEM response dropped"
                );
                return Err(err.into());
            }
        };
        let key = DescriptorKey::new(pdu.descriptor_type, pdu.descriptor_index);
        if key.descriptor_type == descriptor_type::STREAM_INPUT && entity.has_descriptor(key)? {
            let input = StreamInput::new(
                entity,
                key.descriptor_index,
                Arc::clone(&self.aecp),
                Arc::clone(&self.acmp),
            )?;
            return input.proc_aem_resp(kind, frame).map(Some);
        }

        // Nothing cached for this descriptor: resolve the request only.
        let Some(_alive) = hold_alive(&entity)? else {
            return Ok(None);
        };
        let response = FrameInfo::new(frame, ETHER_HDR_SIZE, pdu.encoded_len())?;
        self.aecp
            .update_inflight_for_rcvd_resp(&pdu.header, response, || Ok(()))
            .map(Some)
    }

    fn process_acmp(&self, frame: Bytes) -> Result<Option<Resolution>> {
        let pdu = match AcmpPdu::decode(&frame, ETHER_HDR_SIZE) {
            Ok(pdu) => pdu,
            Err(err) => {
                warn!(error = %err, "ACMP frame dropped");
                return Err(err.into());
            }
        };
        if !pdu.is_response() || pdu.controller_entity_id != self.config.controller_entity_id {
            return Ok(None);
        }
        let Some(kind) = CommandKind::from_acmp(pdu.message_type) else {
            trace!(message_type = pdu.message_type, "ACMP response for unhandled command ignored");
            return Ok(None);
        };
        let Some(entity) = self.known_entity(pdu.listener_entity_id)? else {
            return Ok(None);
        };

        let key = DescriptorKey::new(descriptor_type::STREAM_INPUT, pdu.listener_unique_id);
        if entity.has_descriptor(key)? {
            let input = StreamInput::new(
                entity,
                pdu.listener_unique_id,
                Arc::clone(&self.aecp),
                Arc::clone(&self.acmp),
            )?;
            return input.proc_acmp_resp(kind, frame).map(Some);
        }

        let Some(_alive) = hold_alive(&entity)? else {
            return Ok(None);
        };
        let response = FrameInfo::new(frame, ETHER_HDR_SIZE, ACMPDU_LEN)?;
        self.acmp.state_resp(&pdu, response, || Ok(())).map(Some)
    }

    fn known_entity(&self, entity_id: u64) -> Result<Option<Arc<Entity>>> {
        match self.directory.get(entity_id) {
            Ok(entity) => Ok(Some(entity)),
            Err(ControllerError::UnknownEntity(_)) => {
                debug!(entity_id, "response from unknown entity ignored");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Run the retry/timeout pass of both engines at the current time.
    pub fn tick(&self) -> Result<()> {
        self.tick_at(self.clock.now())
    }

    pub fn tick_at(&self, now: Instant) -> Result<()> {
        let _ticking = self
            .ticking
            .read()
            .map_err(|_| ControllerError::LockPoisoned("retry timer"))?;
        self.aecp.tick(now)?;
        self.acmp.tick(now)
    }

    /// Drop the pending command `id` without notifying. Returns whether one
    /// existed.
    pub fn cancel(&self, id: NotificationId) -> Result<bool> {
        let aecp = self.aecp.cancel(id)?;
        let acmp = self.acmp.cancel(id)?;
        Ok(aecp || acmp)
    }

    /// Forget an entity. Its pending commands are dropped without
    /// notification and late responses no longer reach its descriptors.
    ///
    /// A response or retry pass already under way for the entity finishes
    /// first; no notification for it is delivered after this returns.
    pub fn remove_entity(&self, entity_id: u64) -> Result<()> {
        self.directory.remove(entity_id)?;
        let cancelled = self.aecp.cancel_entity(entity_id)? + self.acmp.cancel_entity(entity_id)?;
        // A retry pass may already hold an expired request for this entity.
        drop(
            self.ticking
                .write()
                .map_err(|_| ControllerError::LockPoisoned("retry timer"))?,
        );
        info!(entity_id, cancelled, "entity removed");
        Ok(())
    }

    /// Pending commands across both engines.
    pub fn pending(&self) -> usize {
        self.aecp.pending() + self.acmp.pending()
    }

    /// Run [`tick`](Self::tick) every `tick_interval` on a background thread
    /// until the returned handle is stopped or dropped.
    pub fn spawn_timer(self: &Arc<Self>) -> Result<TimerHandle> {
        let controller = Arc::clone(self);
        let period = self.config.tick_interval;
        let (stop, stopped) = mpsc::channel::<()>();
        let worker = std::thread::Builder::new()
            .name("avdecc-timer".to_string())
            .spawn(move || run_timer(controller, period, stopped))
            .map_err(ControllerError::Spawn)?;
        Ok(TimerHandle {
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    /// Run [`tick`](Self::tick) every `tick_interval` on the tokio runtime
    /// until `cancel` fires.
    #[cfg(feature = "async")]
    pub fn spawn_timer_task(
        self: &Arc<Self>,
        cancel: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let period = self.config.tick_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("controller timer task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(err) = controller.tick() {
                            warn!(error = %err, "controller tick failed");
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("entities", &self.directory.len())
            .field("pending", &self.pending())
            .finish()
    }
}

/// `None` when the entity departed after it was looked up.
fn hold_alive(entity: &Entity) -> Result<Option<RwLockReadGuard<'_, ()>>> {
    match entity.liveness_guard() {
        Ok(guard) => Ok(Some(guard)),
        Err(ControllerError::EntityDeparted(entity_id)) => {
            debug!(entity_id, "response for departed entity ignored");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn run_timer(controller: Arc<Controller>, period: Duration, stopped: mpsc::Receiver<()>) {
    debug!(period_ms = period.as_millis() as u64, "controller timer started");
    loop {
        match stopped.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(err) = controller.tick() {
                    warn!(error = %err, "controller tick failed");
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("controller timer stopped");
}

/// Background retry timer started by [`Controller::spawn_timer`].
///
/// Dropping the handle stops the timer and waits for its thread.
pub struct TimerHandle {
    stop: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("controller timer panicked");
            }
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
