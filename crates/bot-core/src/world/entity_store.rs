use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::entity::Entity;
use super::fields::{extract, FieldSet, ObjectType};
use super::movement::OrientedPoint3D;
use super::update_mask::UpdateMask;

#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent {
    Appear {
        guid: u64,
        object_type: ObjectType,
        entry: u32,
        name: Option<String>,
    },
    Disappear {
        guid: u64,
        object_type: ObjectType,
        name: Option<String>,
    },
    Update {
        guid: u64,
        changed: Vec<&'static str>,
    },
}

/// Entities currently in range, indexed by guid and by object type.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<u64, Entity>,
    by_type: HashMap<ObjectType, BTreeSet<u64>>,
}

fn appear(entity: &Entity) -> EntityEvent {
    EntityEvent::Appear {
        guid: entity.guid,
        object_type: entity.object_type,
        entry: entity.entry,
        name: entity.name.clone(),
    }
}

fn disappear(entity: Entity) -> EntityEvent {
    EntityEvent::Disappear {
        guid: entity.guid,
        object_type: entity.object_type,
        name: entity.name,
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, guid: u64) -> Option<&Entity> {
        self.entities.get(&guid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn get_by_type(&self, object_type: ObjectType) -> Vec<&Entity> {
        self.by_type
            .get(&object_type)
            .map(|guids| guids.iter().filter_map(|g| self.entities.get(g)).collect())
            .unwrap_or_default()
    }

    fn remove(&mut self, guid: u64) -> Option<Entity> {
        let entity = self.entities.remove(&guid)?;
        if let Some(guids) = self.by_type.get_mut(&entity.object_type) {
            guids.remove(&guid);
            if guids.is_empty() {
                self.by_type.remove(&entity.object_type);
            }
        }
        Some(entity)
    }

    fn insert(&mut self, entity: Entity) -> EntityEvent {
        let event = appear(&entity);
        self.by_type
            .entry(entity.object_type)
            .or_default()
            .insert(entity.guid);
        self.entities.insert(entity.guid, entity);
        event
    }

    /// Replaces whatever lives at `guid`. A type change reports the old entity gone first.
    pub fn create(&mut self, guid: u64, object_type: ObjectType, fields: &FieldSet) -> Vec<EntityEvent> {
        let mut entity = Entity::new(guid, object_type);
        entity.apply(fields);
        self.replace(entity)
    }

    /// Creates from a raw create block, keeping the raw values for later partial updates.
    pub fn create_from_mask(
        &mut self,
        guid: u64,
        object_type: ObjectType,
        mask: &UpdateMask,
        position: Option<OrientedPoint3D>,
    ) -> Vec<EntityEvent> {
        let mut entity = Entity::new(guid, object_type);
        entity.raw = mask.clone();
        entity.apply(&extract(object_type, mask, mask));
        entity.position = position;
        self.replace(entity)
    }

    fn replace(&mut self, entity: Entity) -> Vec<EntityEvent> {
        let mut events = Vec::new();
        if let Some(old) = self.remove(entity.guid) {
            if old.object_type != entity.object_type {
                debug!(
                    guid = old.guid,
                    from = ?old.object_type,
                    to = ?entity.object_type,
                    "entity.type_changed"
                );
                events.push(disappear(old));
            }
        }
        events.push(self.insert(entity));
        events
    }

    pub fn update(&mut self, guid: u64, fields: &FieldSet) -> Option<EntityEvent> {
        if fields.is_empty() {
            return None;
        }
        let entity = self.entities.get_mut(&guid)?;
        let changed = entity.apply(fields);
        (!changed.is_empty()).then_some(EntityEvent::Update { guid, changed })
    }

    /// Merges a raw values block into the entity's snapshot and applies the named fields it
    /// touches.
    pub fn apply_values(&mut self, guid: u64, mask: &UpdateMask) -> Option<EntityEvent> {
        let entity = self.entities.get_mut(&guid)?;
        for (index, value) in mask.iter() {
            entity.raw.set(index, value);
        }
        let fields = extract(entity.object_type, mask, &entity.raw);
        let changed = entity.apply(&fields);
        (!changed.is_empty()).then_some(EntityEvent::Update { guid, changed })
    }

    pub fn set_position(&mut self, guid: u64, position: OrientedPoint3D) -> Option<EntityEvent> {
        let entity = self.entities.get_mut(&guid)?;
        entity.set_position(position).then(|| EntityEvent::Update {
            guid,
            changed: vec!["position"],
        })
    }

    pub fn set_name(&mut self, guid: u64, name: &str) -> Option<EntityEvent> {
        let entity = self.entities.get_mut(&guid)?;
        entity.set_name(name).then(|| EntityEvent::Update {
            guid,
            changed: vec!["name"],
        })
    }

    /// Names every entity with the given entry, for creature and game object query responses.
    pub fn set_name_by_entry(
        &mut self,
        object_type: ObjectType,
        entry: u32,
        name: &str,
    ) -> Vec<EntityEvent> {
        let guids: Vec<u64> = self
            .get_by_type(object_type)
            .into_iter()
            .filter(|e| e.entry == entry)
            .map(|e| e.guid)
            .collect();
        guids
            .into_iter()
            .filter_map(|guid| self.set_name(guid, name))
            .collect()
    }

    pub fn destroy(&mut self, guid: u64) -> Option<EntityEvent> {
        self.remove(guid).map(disappear)
    }

    pub fn clear(&mut self) -> Vec<EntityEvent> {
        self.by_type.clear();
        self.entities.drain().map(|(_, e)| disappear(e)).collect()
    }
}
