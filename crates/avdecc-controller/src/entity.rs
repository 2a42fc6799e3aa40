use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use avdecc_frame::{FrameError, MacAddr};
use bytes::Buf;

use crate::descriptor::{Descriptor, DescriptorKey, FrameInfo};
use crate::error::{ControllerError, Result};

/// A remote AVDECC entity and its cached descriptors.
///
/// All descriptors of one entity share a single lock, held only for the
/// duration of one read or one copy-modify-replace.
#[derive(Debug)]
pub struct Entity {
    entity_id: u64,
    mac: MacAddr,
    alive: AtomicBool,
    departure: RwLock<()>,
    descriptors: Mutex<HashMap<DescriptorKey, Descriptor>>,
}

impl Entity {
    pub fn new(entity_id: u64, mac: MacAddr) -> Self {
        Self {
            entity_id,
            mac,
            alive: AtomicBool::new(true),
            departure: RwLock::new(()),
            descriptors: Mutex::new(HashMap::new()),
        }
    }

    pub fn entity_id(&self) -> u64 {
        self.entity_id
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// After this, descriptor mutations fail with `EntityDeparted`.
    ///
    /// Blocks until every outstanding [`liveness_guard`](Self::liveness_guard)
    /// is dropped.
    pub fn mark_departed(&self) {
        let _gate = self
            .departure
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.alive.store(false, Ordering::Release);
    }

    /// Hold off departure while a response is being applied and notified.
    ///
    /// Fails with `EntityDeparted` once the entity is gone. Must not be held
    /// across a call that removes this entity.
    pub fn liveness_guard(&self) -> Result<RwLockReadGuard<'_, ()>> {
        let guard = self
            .departure
            .read()
            .map_err(|_| ControllerError::LockPoisoned("entity departure"))?;
        if !self.is_alive() {
            return Err(ControllerError::EntityDeparted(self.entity_id));
        }
        Ok(guard)
    }

    /// Cache a descriptor from its READ_DESCRIPTOR body.
    ///
    /// The type and index are read from the first four bytes of `snapshot`.
    /// An existing descriptor with the same key is replaced along with its
    /// stored responses.
    pub fn insert_descriptor(&self, snapshot: FrameInfo) -> Result<DescriptorKey> {
        let mut header = snapshot.bytes();
        if header.len() < 4 {
            return Err(FrameError::Truncated {
                len: header.len(),
                need: 4,
            }
            .into());
        }
        let key = DescriptorKey::new(header.get_u16(), header.get_u16());
        self.lock()?.insert(key, Descriptor::new(key, snapshot));
        tracing::debug!(entity_id = self.entity_id, descriptor = %key, "descriptor cached");
        Ok(key)
    }

    pub fn has_descriptor(&self, key: DescriptorKey) -> Result<bool> {
        Ok(self.lock()?.contains_key(&key))
    }

    pub fn descriptor_keys(&self) -> Result<Vec<DescriptorKey>> {
        let mut keys: Vec<_> = self.lock()?.keys().copied().collect();
        keys.sort();
        Ok(keys)
    }

    /// Run `f` against a descriptor under the entity lock.
    pub fn with_descriptor<R>(
        &self,
        key: DescriptorKey,
        f: impl FnOnce(&Descriptor) -> R,
    ) -> Result<R> {
        let descriptors = self.lock()?;
        let descriptor = descriptors
            .get(&key)
            .ok_or(ControllerError::UnknownDescriptor {
                entity_id: self.entity_id,
                key,
            })?;
        Ok(f(descriptor))
    }

    /// Run `f` against a descriptor for mutation, under the entity lock.
    ///
    /// Liveness is checked with the lock held, so a departure that completed
    /// before this call can never be followed by a cache write.
    pub fn with_descriptor_mut<R>(
        &self,
        key: DescriptorKey,
        f: impl FnOnce(&mut Descriptor) -> Result<R>,
    ) -> Result<R> {
        let mut descriptors = self.lock()?;
        if !self.is_alive() {
            return Err(ControllerError::EntityDeparted(self.entity_id));
        }
        let descriptor = descriptors
            .get_mut(&key)
            .ok_or(ControllerError::UnknownDescriptor {
                entity_id: self.entity_id,
                key,
            })?;
        f(descriptor)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<DescriptorKey, Descriptor>>> {
        self.descriptors
            .lock()
            .map_err(|_| ControllerError::LockPoisoned("entity descriptors"))
    }
}

/// Known entities, keyed by entity id.
#[derive(Debug)]
pub struct EntityDirectory {
    controller_entity_id: u64,
    entities: RwLock<HashMap<u64, Arc<Entity>>>,
}

impl EntityDirectory {
    pub fn new(controller_entity_id: u64) -> Self {
        Self {
            controller_entity_id,
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Entity id of the local controller.
    pub fn get_controller_entity_id(&self) -> u64 {
        self.controller_entity_id
    }

    /// Add an entity, replacing any entry with the same id. The replaced
    /// entity is marked departed.
    pub fn insert(&self, entity: Entity) -> Result<Arc<Entity>> {
        let entity = Arc::new(entity);
        let previous = self
            .entities
            .write()
            .map_err(|_| ControllerError::LockPoisoned("entity directory"))?
            .insert(entity.entity_id(), Arc::clone(&entity));
        if let Some(previous) = previous {
            previous.mark_departed();
        }
        Ok(entity)
    }

    pub fn get(&self, entity_id: u64) -> Result<Arc<Entity>> {
        self.entities
            .read()
            .map_err(|_| ControllerError::LockPoisoned("entity directory"))?
            .get(&entity_id)
            .cloned()
            .ok_or(ControllerError::UnknownEntity(entity_id))
    }

    /// Remove an entity and mark it departed.
    pub fn remove(&self, entity_id: u64) -> Result<Arc<Entity>> {
        let entity = self
            .entities
            .write()
            .map_err(|_| ControllerError::LockPoisoned("entity directory"))?
            .remove(&entity_id)
            .ok_or(ControllerError::UnknownEntity(entity_id))?;
        entity.mark_departed();
        Ok(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_frame::consts::descriptor_type;
    use avdecc_frame::StreamInputDescriptor;
    use bytes::Bytes;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn stream_input(index: u16) -> FrameInfo {
        let desc = StreamInputDescriptor {
            descriptor_index: index,
            ..StreamInputDescriptor::default()
        };
        let mut buf = vec![0u8; desc.encoded_len()];
        desc.encode(&mut buf, 0).unwrap();
        FrameInfo::new(Bytes::from(buf), 0, desc.encoded_len()).unwrap()
    }

    #[test]
    fn insert_reads_key_from_snapshot() {
        let entity = Entity::new(1, MacAddr::ZERO);
        let key = entity.insert_descriptor(stream_input(2)).unwrap();
        assert_eq!(key, DescriptorKey::new(descriptor_type::STREAM_INPUT, 2));
        assert!(entity.has_descriptor(key).unwrap());
        assert_eq!(entity.descriptor_keys().unwrap(), vec![key]);
    }

    #[test]
    fn unknown_descriptor() {
        let entity = Entity::new(1, MacAddr::ZERO);
        let err = entity
            .with_descriptor(DescriptorKey::new(descriptor_type::STREAM_INPUT, 0), |_| ())
            .unwrap_err();
        assert!(matches!(err, ControllerError::UnknownDescriptor { entity_id: 1, .. }));
    }

    #[test]
    fn departed_entity_rejects_mutation_but_allows_reads() {
        let entity = Entity::new(1, MacAddr::ZERO);
        let key = entity.insert_descriptor(stream_input(0)).unwrap();
        entity.mark_departed();

        let err = entity.with_descriptor_mut(key, |_| Ok(())).unwrap_err();
        assert!(matches!(err, ControllerError::EntityDeparted(1)));
        assert!(entity.with_descriptor(key, |d| d.get_desc_size()).is_ok());
    }

    #[test]
    fn departure_waits_for_response_in_progress() {
        let entity = Arc::new(Entity::new(1, MacAddr::ZERO));
        let guard = entity.liveness_guard().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let remover = {
            let entity = Arc::clone(&entity);
            thread::spawn(move || {
                entity.mark_departed();
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(entity.is_alive());

        drop(guard);
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        remover.join().unwrap();
        assert!(!entity.is_alive());
        assert!(matches!(
            entity.liveness_guard(),
            Err(ControllerError::EntityDeparted(1))
        ));
    }

    #[test]
    fn directory_remove_marks_departed() {
        let directory = EntityDirectory::new(0xC0);
        let entity = directory.insert(Entity::new(5, MacAddr::ZERO)).unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.get_controller_entity_id(), 0xC0);

        directory.remove(5).unwrap();
        assert!(!entity.is_alive());
        assert!(directory.is_empty());
        assert!(matches!(
            directory.get(5),
            Err(ControllerError::UnknownEntity(5))
        ));
    }

    #[test]
    fn concurrent_access_to_different_entities() {
        let directory = Arc::new(EntityDirectory::new(0));
        for id in 0..4u64 {
            let entity = directory.insert(Entity::new(id, MacAddr::ZERO)).unwrap();
            entity.insert_descriptor(stream_input(0)).unwrap();
        }

        let handles: Vec<_> = (0..4u64)
            .map(|id| {
                let directory = Arc::clone(&directory);
                thread::spawn(move || {
                    let entity = directory.get(id).unwrap();
                    let key = DescriptorKey::new(descriptor_type::STREAM_INPUT, 0);
                    for n in 0..50u64 {
                        entity
                            .with_descriptor_mut(key, |d| {
                                d.modify_snapshot(|buf, pos| {
                                    avdecc_frame::descriptor::set_current_format(buf, pos, n)
                                })
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entity = directory.get(3).unwrap();
        let format = entity
            .with_descriptor(DescriptorKey::new(descriptor_type::STREAM_INPUT, 0), |d| {
                let at = d.get_desc_pos() + 74;
                u64::from_be_bytes(d.get_desc_buffer()[at..at + 8].try_into().unwrap())
            })
            .unwrap();
        assert_eq!(format, 49);
    }
}
