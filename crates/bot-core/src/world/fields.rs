//! Update-field tables for 3.3.5a and the extraction of named values from raw field indices.

use super::update_mask::UpdateMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Object,
    Item,
    Container,
    Unit,
    Player,
    GameObject,
    DynamicObject,
    Corpse,
    Other(u8),
}

impl From<u8> for ObjectType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Object,
            1 => Self::Item,
            2 => Self::Container,
            3 => Self::Unit,
            4 => Self::Player,
            5 => Self::GameObject,
            6 => Self::DynamicObject,
            7 => Self::Corpse,
            other => Self::Other(other),
        }
    }
}

impl From<ObjectType> for u8 {
    fn from(value: ObjectType) -> Self {
        match value {
            ObjectType::Object => 0,
            ObjectType::Item => 1,
            ObjectType::Container => 2,
            ObjectType::Unit => 3,
            ObjectType::Player => 4,
            ObjectType::GameObject => 5,
            ObjectType::DynamicObject => 6,
            ObjectType::Corpse => 7,
            ObjectType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U32,
    /// Low word at the field index, high word at the next one.
    U64,
    F32,
    /// Four bytes kept whole.
    Bytes,
    /// Four bytes split into the named parts in byte order. With `keep_raw` the whole value is
    /// also reported under the field's own name.
    Packed {
        parts: &'static [&'static str],
        keep_raw: bool,
    },
    /// Consecutive u32 slots starting at the field index.
    Array(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub index: u16,
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn def(index: u16, name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { index, name, kind }
}

pub const UNIT_FIELD_HEALTH: u16 = 0x18;
pub const UNIT_FIELD_POWER1: u16 = 0x19;
pub const UNIT_FIELD_MAXHEALTH: u16 = 0x20;
pub const UNIT_FIELD_MAXPOWER1: u16 = 0x21;
pub const UNIT_FIELD_LEVEL: u16 = 0x36;
pub const POWER_SLOTS: usize = 7;

pub static OBJECT_FIELDS: &[FieldDef] = &[
    def(0x00, "guid", FieldKind::U64),
    def(0x02, "type", FieldKind::U32),
    def(0x03, "entry", FieldKind::U32),
    def(0x04, "scale", FieldKind::F32),
];

pub static UNIT_FIELDS: &[FieldDef] = &[
    def(0x06, "charm", FieldKind::U64),
    def(0x08, "summon", FieldKind::U64),
    def(0x0A, "critter", FieldKind::U64),
    def(0x0C, "charmed_by", FieldKind::U64),
    def(0x0E, "summoned_by", FieldKind::U64),
    def(0x10, "created_by", FieldKind::U64),
    def(0x12, "target", FieldKind::U64),
    def(0x14, "channel_object", FieldKind::U64),
    def(0x16, "channel_spell", FieldKind::U32),
    def(
        0x17,
        "bytes_0",
        FieldKind::Packed {
            parts: &["race", "class", "gender", "power_type"],
            keep_raw: false,
        },
    ),
    def(UNIT_FIELD_HEALTH, "health", FieldKind::U32),
    def(UNIT_FIELD_POWER1, "power", FieldKind::Array(POWER_SLOTS as u16)),
    def(UNIT_FIELD_MAXHEALTH, "max_health", FieldKind::U32),
    def(UNIT_FIELD_MAXPOWER1, "max_power", FieldKind::Array(POWER_SLOTS as u16)),
    def(UNIT_FIELD_LEVEL, "level", FieldKind::U32),
    def(0x37, "faction_template", FieldKind::U32),
    def(0x3B, "unit_flags", FieldKind::U32),
    def(0x3C, "unit_flags_2", FieldKind::U32),
    def(0x41, "bounding_radius", FieldKind::F32),
    def(0x42, "combat_reach", FieldKind::F32),
    def(0x43, "display_id", FieldKind::U32),
    def(0x44, "native_display_id", FieldKind::U32),
    def(0x45, "mount_display_id", FieldKind::U32),
    def(0x4A, "bytes_1", FieldKind::Bytes),
    def(0x4F, "dynamic_flags", FieldKind::U32),
    def(0x52, "npc_flags", FieldKind::U32),
];

pub static GAMEOBJECT_FIELDS: &[FieldDef] = &[
    def(0x06, "created_by", FieldKind::U64),
    def(0x08, "display_id", FieldKind::U32),
    def(0x09, "flags", FieldKind::U32),
    def(0x0E, "dynamic", FieldKind::U32),
    def(0x0F, "faction", FieldKind::U32),
    def(0x10, "level", FieldKind::U32),
    def(
        0x11,
        "bytes",
        FieldKind::Packed {
            parts: &["state", "go_type"],
            keep_raw: true,
        },
    ),
];

/// Type-specific table; the object table applies to every type on top of it.
pub fn type_fields(object_type: ObjectType) -> &'static [FieldDef] {
    match object_type {
        ObjectType::Unit | ObjectType::Player => UNIT_FIELDS,
        ObjectType::GameObject => GAMEOBJECT_FIELDS,
        _ => &[],
    }
}

pub fn fields_for(object_type: ObjectType) -> impl Iterator<Item = &'static FieldDef> {
    OBJECT_FIELDS.iter().chain(type_fields(object_type).iter())
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    U32(u32),
    U64(u64),
    F32(f32),
    Bytes([u8; 4]),
    /// `(slot, value)` for the array slots present in the update only.
    Slots(Vec<(usize, u32)>),
}

impl FieldValue {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U8(v) => Some(*v as u32),
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            Self::U32(v) => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }
}

/// Named values extracted from one update, in table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    values: Vec<(&'static str, FieldValue)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: FieldValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &'static str, value: FieldValue) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(n, _)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Extracts every field touched by `changed`, reading values from `snapshot`.
///
/// `snapshot` must already contain `changed`, so a 64-bit field whose halves arrive in different
/// updates still resolves to the full value.
pub fn extract(object_type: ObjectType, changed: &UpdateMask, snapshot: &UpdateMask) -> FieldSet {
    let mut set = FieldSet::new();
    let value = |index: u16| snapshot.get(index).unwrap_or(0);

    for field in fields_for(object_type) {
        let index = field.index;
        match field.kind {
            FieldKind::U32 if changed.contains(index) => {
                set.push(field.name, FieldValue::U32(value(index)));
            }
            FieldKind::F32 if changed.contains(index) => {
                set.push(field.name, FieldValue::F32(f32::from_bits(value(index))));
            }
            FieldKind::Bytes if changed.contains(index) => {
                set.push(field.name, FieldValue::Bytes(value(index).to_le_bytes()));
            }
            FieldKind::U64 if changed.contains(index) || changed.contains(index + 1) => {
                let full = value(index) as u64 | ((value(index + 1) as u64) << 32);
                set.push(field.name, FieldValue::U64(full));
            }
            FieldKind::Packed { parts, keep_raw } if changed.contains(index) => {
                let bytes = value(index).to_le_bytes();
                for (part, byte) in parts.iter().zip(bytes) {
                    set.push(*part, FieldValue::U8(byte));
                }
                if keep_raw {
                    set.push(field.name, FieldValue::Bytes(bytes));
                }
            }
            FieldKind::Array(len) => {
                let slots: Vec<(usize, u32)> = (0..len)
                    .filter(|slot| changed.contains(index + slot))
                    .map(|slot| (slot as usize, value(index + slot)))
                    .collect();
                if !slots.is_empty() {
                    set.push(field.name, FieldValue::Slots(slots));
                }
            }
            _ => {}
        }
    }

    set
}
