//! EXTERNAL_PORT_INPUT descriptor access. Read-only: the type accepts no
//! commands.

use std::sync::Arc;

use avdecc_frame::consts::descriptor_type;

use crate::capability::DescriptorCapability;
use crate::descriptor::{CommandKind, DescriptorKey};
use crate::entity::Entity;
use crate::error::{ControllerError, Result};
use crate::views::ExternalPortInputDescriptorResponse;

#[derive(Debug, Clone)]
pub struct ExternalPortInput {
    entity: Arc<Entity>,
    key: DescriptorKey,
}

impl DescriptorCapability for ExternalPortInput {
    const DESCRIPTOR_TYPE: u16 = descriptor_type::EXTERNAL_PORT_INPUT;
    const COMMANDS: &'static [CommandKind] = &[];
}

impl ExternalPortInput {
    /// Fails with `UnknownDescriptor` unless `entity` caches this descriptor.
    pub fn new(entity: Arc<Entity>, descriptor_index: u16) -> Result<Self> {
        let key = DescriptorKey::new(Self::DESCRIPTOR_TYPE, descriptor_index);
        if !entity.has_descriptor(key)? {
            return Err(ControllerError::UnknownDescriptor {
                entity_id: entity.entity_id(),
                key,
            });
        }
        Ok(Self { entity, key })
    }

    pub fn entity_id(&self) -> u64 {
        self.entity.entity_id()
    }

    pub fn key(&self) -> DescriptorKey {
        self.key
    }

    pub fn get_external_port_input_response(&self) -> Result<ExternalPortInputDescriptorResponse> {
        let snapshot = self
            .entity
            .with_descriptor(self.key, |descriptor| descriptor.snapshot().clone())?;
        ExternalPortInputDescriptorResponse::new(snapshot)
    }
}
