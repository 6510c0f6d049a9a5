use std::collections::BTreeMap;

use super::fields::{FieldSet, FieldValue, ObjectType, POWER_SLOTS};
use super::movement::OrientedPoint3D;
use super::update_mask::UpdateMask;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitData {
    pub health: u32,
    pub max_health: u32,
    pub level: u32,
    pub faction_template: u32,
    pub display_id: u32,
    pub npc_flags: u32,
    pub unit_flags: u32,
    pub target: u64,
    pub race: u8,
    pub class: u8,
    pub gender: u8,
    pub power: [u32; POWER_SLOTS],
    pub max_power: [u32; POWER_SLOTS],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameObjectData {
    pub display_id: u32,
    pub flags: u32,
    pub go_type: u8,
    pub state: u8,
    pub bytes: [u8; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Base,
    Unit(UnitData),
    GameObject(GameObjectData),
}

impl EntityKind {
    fn for_type(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Unit | ObjectType::Player => Self::Unit(UnitData::default()),
            ObjectType::GameObject => Self::GameObject(GameObjectData::default()),
            _ => Self::Base,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub guid: u64,
    pub object_type: ObjectType,
    pub entry: u32,
    pub scale: f32,
    pub position: Option<OrientedPoint3D>,
    pub name: Option<String>,
    /// Every raw field value seen so far.
    pub raw: UpdateMask,
    /// Named fields without a typed slot.
    pub other: BTreeMap<&'static str, FieldValue>,
    pub kind: EntityKind,
}

fn assign<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

fn assign_slots(array: &mut [u32; POWER_SLOTS], value: &FieldValue) -> bool {
    let FieldValue::Slots(slots) = value else {
        return false;
    };
    let mut changed = false;
    for (slot, v) in slots {
        if let Some(current) = array.get_mut(*slot) {
            if *current != *v {
                *current = *v;
                changed = true;
            }
        }
    }
    changed
}

impl Entity {
    pub fn new(guid: u64, object_type: ObjectType) -> Self {
        Self {
            guid,
            object_type,
            entry: 0,
            scale: 1.0,
            position: None,
            name: None,
            raw: UpdateMask::new(),
            other: BTreeMap::new(),
            kind: EntityKind::for_type(object_type),
        }
    }

    pub fn unit(&self) -> Option<&UnitData> {
        match &self.kind {
            EntityKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn game_object(&self) -> Option<&GameObjectData> {
        match &self.kind {
            EntityKind::GameObject(go) => Some(go),
            _ => None,
        }
    }

    /// Merges `fields` and returns the names whose value actually changed, in field order.
    pub fn apply(&mut self, fields: &FieldSet) -> Vec<&'static str> {
        let mut changed = Vec::new();
        for (name, value) in fields.iter() {
            if self.apply_one(name, value) {
                changed.push(name);
            }
        }
        changed
    }

    fn apply_one(&mut self, name: &'static str, value: &FieldValue) -> bool {
        match name {
            // The guid never changes and `type` is a type mask, not the object type.
            "guid" | "type" => return false,
            "entry" => return assign(&mut self.entry, value.as_u32()),
            "scale" => return assign(&mut self.scale, value.as_f32()),
            _ => {}
        }

        let handled = match &mut self.kind {
            EntityKind::Unit(unit) => match name {
                "health" => Some(assign(&mut unit.health, value.as_u32())),
                "max_health" => Some(assign(&mut unit.max_health, value.as_u32())),
                "level" => Some(assign(&mut unit.level, value.as_u32())),
                "faction_template" => Some(assign(&mut unit.faction_template, value.as_u32())),
                "display_id" => Some(assign(&mut unit.display_id, value.as_u32())),
                "npc_flags" => Some(assign(&mut unit.npc_flags, value.as_u32())),
                "unit_flags" => Some(assign(&mut unit.unit_flags, value.as_u32())),
                "target" => Some(assign(&mut unit.target, value.as_u64())),
                "race" => Some(assign(&mut unit.race, value.as_u8())),
                "class" => Some(assign(&mut unit.class, value.as_u8())),
                "gender" => Some(assign(&mut unit.gender, value.as_u8())),
                "power" => Some(assign_slots(&mut unit.power, value)),
                "max_power" => Some(assign_slots(&mut unit.max_power, value)),
                _ => None,
            },
            EntityKind::GameObject(go) => match name {
                "display_id" => Some(assign(&mut go.display_id, value.as_u32())),
                "flags" => Some(assign(&mut go.flags, value.as_u32())),
                "go_type" => Some(assign(&mut go.go_type, value.as_u8())),
                "state" => Some(assign(&mut go.state, value.as_u8())),
                "bytes" => Some(match value {
                    FieldValue::Bytes(bytes) => assign(&mut go.bytes, Some(*bytes)),
                    _ => false,
                }),
                _ => None,
            },
            EntityKind::Base => None,
        };

        match handled {
            Some(changed) => changed,
            None => {
                if self.other.get(name) == Some(value) {
                    false
                } else {
                    self.other.insert(name, value.clone());
                    true
                }
            }
        }
    }

    pub fn set_position(&mut self, position: OrientedPoint3D) -> bool {
        if self.position == Some(position) {
            return false;
        }
        self.position = Some(position);
        true
    }

    pub fn set_name(&mut self, name: &str) -> bool {
        if self.name.as_deref() == Some(name) {
            return false;
        }
        self.name = Some(name.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_object_type() {
        assert!(Entity::new(1, ObjectType::Player).unit().is_some());
        assert!(Entity::new(1, ObjectType::GameObject).game_object().is_some());
        assert_eq!(Entity::new(1, ObjectType::Item).kind, EntityKind::Base);
    }

    #[test]
    fn apply_reports_only_real_changes() {
        let mut entity = Entity::new(5, ObjectType::Unit);
        let fields = FieldSet::new()
            .with("guid", FieldValue::U64(5))
            .with("health", FieldValue::U32(10))
            .with("bounding_radius", FieldValue::F32(0.5));
        assert_eq!(entity.apply(&fields), vec!["health", "bounding_radius"]);
        assert!(entity.apply(&fields).is_empty());
        assert_eq!(entity.other.get("bounding_radius"), Some(&FieldValue::F32(0.5)));
    }

    #[test]
    fn power_slots_update_in_place() {
        let mut entity = Entity::new(5, ObjectType::Unit);
        entity.apply(&FieldSet::new().with("power", FieldValue::Slots(vec![(0, 100), (1, 5)])));
        let changed =
            entity.apply(&FieldSet::new().with("power", FieldValue::Slots(vec![(1, 6), (9, 1)])));
        assert_eq!(changed, vec!["power"]);
        assert_eq!(entity.unit().unwrap().power[..3], [100, 6, 0]);
    }
}
