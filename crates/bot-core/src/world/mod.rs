pub mod entity;
pub mod entity_store;
pub mod fields;
pub mod friend_store;
pub mod movement;
pub mod update_mask;
pub mod update_object;

pub use entity::{Entity, EntityKind, GameObjectData, UnitData};
pub use entity_store::{EntityEvent, EntityStore};
pub use fields::{FieldSet, FieldValue, ObjectType};
pub use friend_store::{FriendEntry, FriendEvent, FriendStore, FriendUpdate};
pub use movement::{MovementBlock, OrientedPoint3D, PackedGuid, Point3D};
pub use update_mask::UpdateMask;
pub use update_object::{DestroyObject, UpdateBlock, UpdateObject};
