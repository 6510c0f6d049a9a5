use rusty_bot_core::world::{EntityEvent, FriendEvent};

use crate::codec::chat::ChatMessage;
use crate::codec::group::{GroupMember, PartyCommandResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    Invited { by: String },
    Declined { by: String },
    LeaderChanged { name: String },
    /// We were removed from the group.
    Removed,
    Destroyed,
    List {
        members: Vec<GroupMember>,
        leader: Option<String>,
    },
    CommandResult {
        result: PartyCommandResult,
        label: String,
    },
}

/// Everything a subscriber of a world session can observe.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Chat(ChatMessage),
    Group(GroupEvent),
    Entity(EntityEvent),
    Friend(FriendEvent),
    /// A frame that failed to decode. The session keeps running.
    DecodeError { opcode: u16, message: String },
    /// First sighting of an opcode nothing handles.
    NotImplemented(u16),
}
