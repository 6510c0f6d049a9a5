//! Per-connection world state and the opcode handlers that mutate it.

use std::collections::{BTreeMap, HashMap, HashSet};

use rusty_bot_core::packet::PacketResult;
use rusty_bot_core::world::{
    DestroyObject, EntityEvent, EntityStore, FriendStore, FriendUpdate, ObjectType, UpdateBlock,
    UpdateObject,
};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

use super::events::{GroupEvent, SessionEvent};
use crate::codec::chat::{
    self, CHANNEL_YOU_JOINED, CHANNEL_YOU_LEFT, ChannelNotify, ChatMessage, ChatPayload, ChatTarget,
};
use crate::codec::group::{self, GroupList, PartyCommandResult};
use crate::codec::login;
use crate::codec::query::{self, NameQueryResponse};
use crate::codec::social::{self, FriendStatus};
use crate::dispatch::Dispatcher;
use crate::wotlk::opcode::Opcode;

/// Everything one world connection knows. Only the connection task touches it.
pub struct WorldContext {
    events: broadcast::Sender<SessionEvent>,
    outbox: Vec<(u16, Vec<u8>)>,
    connected_at: Instant,

    pub self_guid: u64,
    pub self_name: String,
    pub sticky: Option<ChatTarget>,

    names: HashMap<u64, String>,
    names_in_flight: HashSet<u64>,
    pending_chat: HashMap<u64, Vec<ChatPayload>>,
    creature_names: HashMap<u32, String>,
    gameobject_names: HashMap<u32, String>,
    templates_in_flight: HashSet<(ObjectType, u32)>,

    channels: BTreeMap<u8, String>,
    party: HashMap<String, u64>,
    pub entities: EntityStore,
    pub friends: FriendStore,

    ping_sequence: u32,
    ping_sent_at: Option<Instant>,
    pub latency_ms: u32,
}

impl WorldContext {
    pub fn new(events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            events,
            outbox: Vec::new(),
            connected_at: Instant::now(),
            self_guid: 0,
            self_name: String::new(),
            sticky: None,
            names: HashMap::new(),
            names_in_flight: HashSet::new(),
            pending_chat: HashMap::new(),
            creature_names: HashMap::new(),
            gameobject_names: HashMap::new(),
            templates_in_flight: HashSet::new(),
            channels: BTreeMap::new(),
            party: HashMap::new(),
            entities: EntityStore::new(),
            friends: FriendStore::new(),
            ping_sequence: 0,
            ping_sent_at: None,
            latency_ms: 0,
        }
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    pub fn queue(&mut self, opcode: u16, body: Vec<u8>) {
        self.outbox.push((opcode, body));
    }

    pub fn take_outbox(&mut self) -> Vec<(u16, Vec<u8>)> {
        std::mem::take(&mut self.outbox)
    }

    pub fn set_self(&mut self, guid: u64, name: &str) {
        self.self_guid = guid;
        self.self_name = name.to_string();
        self.names.insert(guid, name.to_string());
    }

    pub fn cached_name(&self, guid: u64) -> Option<&str> {
        self.names.get(&guid).map(String::as_str)
    }

    pub fn channel_name(&self, index: u8) -> Option<&str> {
        self.channels.get(&index).map(String::as_str)
    }

    pub fn party_member(&self, name: &str) -> Option<u64> {
        self.party.get(&name.to_lowercase()).copied()
    }

    pub fn next_ping(&mut self) -> Vec<u8> {
        self.ping_sequence = self.ping_sequence.wrapping_add(1);
        self.ping_sent_at = Some(Instant::now());
        login::build_ping(self.ping_sequence, self.latency_ms)
    }

    /// Issues `CMSG_NAME_QUERY` unless the name is known or already asked for.
    fn request_name(&mut self, guid: u64) {
        if guid == 0 || self.names.contains_key(&guid) || !self.names_in_flight.insert(guid) {
            return;
        }
        debug!(guid, "name.query");
        self.queue(Opcode::CMSG_NAME_QUERY, query::build_name_query(guid));
    }

    fn request_template(&mut self, object_type: ObjectType, entry: u32, guid: u64) {
        if entry == 0 || !self.templates_in_flight.insert((object_type, entry)) {
            return;
        }
        let opcode = match object_type {
            ObjectType::GameObject => Opcode::CMSG_GAMEOBJECT_QUERY,
            _ => Opcode::CMSG_CREATURE_QUERY,
        };
        self.queue(opcode, query::build_entry_query(entry, guid));
    }

    fn emit_entity(&self, event: EntityEvent) {
        self.emit(SessionEvent::Entity(event));
    }

    fn emit_group(&self, event: GroupEvent) {
        self.emit(SessionEvent::Group(event));
    }

    fn system(&self, text: impl Into<String>) {
        self.emit(SessionEvent::Chat(ChatMessage::system(text)));
    }

    /// Delivers the message now if its sender is known, otherwise parks it behind a name query.
    fn deliver_chat(&mut self, payload: ChatPayload) {
        if let Some(name) = payload.sender_name.clone() {
            self.emit(SessionEvent::Chat(payload.into_message(name)));
            return;
        }
        if payload.sender_guid == 0 {
            self.emit(SessionEvent::Chat(payload.into_message(String::new())));
            return;
        }
        if let Some(name) = self.names.get(&payload.sender_guid).cloned() {
            self.emit(SessionEvent::Chat(payload.into_message(name)));
            return;
        }
        let guid = payload.sender_guid;
        self.pending_chat.entry(guid).or_default().push(payload);
        self.request_name(guid);
    }

    fn resolve_name(&mut self, guid: u64, name: String) {
        self.names_in_flight.remove(&guid);
        if let Some(event) = self.entities.set_name(guid, &name) {
            self.emit_entity(event);
        }
        self.friends.set_name(guid, &name);
        for payload in self.pending_chat.remove(&guid).unwrap_or_default() {
            self.emit(SessionEvent::Chat(payload.into_message(name.clone())));
        }
        self.names.insert(guid, name);
    }

    fn name_entity(&mut self, guid: u64, object_type: ObjectType, entry: u32) {
        match object_type {
            ObjectType::Player => match self.names.get(&guid).cloned() {
                Some(name) => {
                    if let Some(event) = self.entities.set_name(guid, &name) {
                        self.emit_entity(event);
                    }
                }
                None => self.request_name(guid),
            },
            ObjectType::Unit | ObjectType::GameObject => {
                let cache = if object_type == ObjectType::Unit {
                    &self.creature_names
                } else {
                    &self.gameobject_names
                };
                match cache.get(&entry).cloned() {
                    Some(name) => {
                        if let Some(event) = self.entities.set_name(guid, &name) {
                            self.emit_entity(event);
                        }
                    }
                    None => self.request_template(object_type, entry, guid),
                }
            }
            _ => {}
        }
    }

    fn apply_update(&mut self, update: UpdateObject) {
        for block in update.blocks {
            match block {
                UpdateBlock::Values { guid, mask } => {
                    if let Some(event) = self.entities.apply_values(guid, &mask) {
                        self.emit_entity(event);
                    }
                }
                UpdateBlock::Movement { guid, movement } => {
                    if let Some(position) = movement.position() {
                        if let Some(event) = self.entities.set_position(guid, position) {
                            self.emit_entity(event);
                        }
                    }
                }
                UpdateBlock::Create {
                    guid,
                    object_type,
                    movement,
                    mask,
                    ..
                } => {
                    let events =
                        self.entities
                            .create_from_mask(guid, object_type, &mask, movement.position());
                    for event in events {
                        self.emit_entity(event);
                    }
                    let entry = self.entities.get(guid).map_or(0, |e| e.entry);
                    self.name_entity(guid, object_type, entry);
                }
                UpdateBlock::OutOfRange { guids } => {
                    for guid in guids {
                        if let Some(event) = self.entities.destroy(guid) {
                            self.emit_entity(event);
                        }
                    }
                }
                UpdateBlock::NearObjects { guids } => {
                    debug!(count = guids.len(), "entity.near_objects");
                }
            }
        }
    }

    fn replace_party(&mut self, list: &GroupList) {
        self.party = list
            .members
            .iter()
            .map(|m| (m.name.to_lowercase(), m.guid))
            .collect();
        for member in &list.members {
            if !self.names.contains_key(&member.guid) {
                self.resolve_name(member.guid, member.name.clone());
            }
        }
    }

    /// Lowest free index starting at 1.
    fn assign_channel(&mut self, name: &str) -> u8 {
        if let Some((&index, _)) = self
            .channels
            .iter()
            .find(|(_, joined)| joined.eq_ignore_ascii_case(name))
        {
            return index;
        }
        let index = (1..=u8::MAX)
            .find(|i| !self.channels.contains_key(i))
            .unwrap_or(u8::MAX);
        self.channels.insert(index, name.to_string());
        index
    }
}

pub fn register(dispatcher: &mut Dispatcher<WorldContext>) {
    dispatcher
        .on(Opcode::SMSG_MESSAGECHAT, handle_message_chat)
        .on(Opcode::SMSG_GM_MESSAGECHAT, handle_gm_message_chat)
        .on(Opcode::SMSG_NAME_QUERY_RESPONSE, handle_name_query_response)
        .on(Opcode::SMSG_CREATURE_QUERY_RESPONSE, handle_creature_query_response)
        .on(Opcode::SMSG_GAMEOBJECT_QUERY_RESPONSE, handle_gameobject_query_response)
        .on(Opcode::SMSG_CHANNEL_NOTIFY, handle_channel_notify)
        .on(Opcode::SMSG_NOTIFICATION, handle_notification)
        .on(Opcode::SMSG_MOTD, handle_motd)
        .on(Opcode::SMSG_CHAT_PLAYER_NOT_FOUND, handle_player_not_found)
        .on(Opcode::SMSG_GROUP_INVITE, handle_group_invite)
        .on(Opcode::SMSG_GROUP_DECLINE, handle_group_decline)
        .on(Opcode::SMSG_GROUP_SET_LEADER, handle_group_set_leader)
        .on(Opcode::SMSG_GROUP_UNINVITE, handle_group_uninvite)
        .on(Opcode::SMSG_GROUP_DESTROYED, handle_group_destroyed)
        .on(Opcode::SMSG_GROUP_LIST, handle_group_list)
        .on(Opcode::SMSG_PARTY_COMMAND_RESULT, handle_party_command_result)
        .on(Opcode::SMSG_CONTACT_LIST, handle_contact_list)
        .on(Opcode::SMSG_FRIEND_STATUS, handle_friend_status)
        .on(Opcode::SMSG_UPDATE_OBJECT, handle_update_object)
        .on(Opcode::SMSG_COMPRESSED_UPDATE_OBJECT, handle_compressed_update_object)
        .on(Opcode::SMSG_DESTROY_OBJECT, handle_destroy_object)
        .on(Opcode::SMSG_PONG, handle_pong)
        .on(Opcode::SMSG_TIME_SYNC_REQ, handle_time_sync_request);
}

fn handle_message_chat(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let payload = chat::decode_message_chat(body, false)?;
    ctx.deliver_chat(payload);
    Ok(())
}

fn handle_gm_message_chat(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let payload = chat::decode_message_chat(body, true)?;
    ctx.deliver_chat(payload);
    Ok(())
}

fn handle_name_query_response(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let response = NameQueryResponse::decode(body)?;
    let name = response.info.map(|info| info.name).unwrap_or_default();
    debug!(guid = response.guid, name = %name, "name.resolved");
    ctx.resolve_name(response.guid, name);
    Ok(())
}

fn handle_creature_query_response(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let template = query::decode_creature_response(body)?;
    ctx.templates_in_flight.remove(&(ObjectType::Unit, template.entry));
    if let Some(name) = template.name {
        for event in ctx
            .entities
            .set_name_by_entry(ObjectType::Unit, template.entry, &name)
        {
            ctx.emit_entity(event);
        }
        ctx.creature_names.insert(template.entry, name);
    }
    Ok(())
}

fn handle_gameobject_query_response(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let template = query::decode_gameobject_response(body)?;
    ctx.templates_in_flight
        .remove(&(ObjectType::GameObject, template.entry));
    if let Some(name) = template.name {
        for event in ctx
            .entities
            .set_name_by_entry(ObjectType::GameObject, template.entry, &name)
        {
            ctx.emit_entity(event);
        }
        ctx.gameobject_names.insert(template.entry, name);
    }
    Ok(())
}

fn handle_channel_notify(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let notify = ChannelNotify::decode(body)?;
    match notify.kind {
        CHANNEL_YOU_JOINED => {
            let index = ctx.assign_channel(&notify.channel);
            info!(index, channel = %notify.channel, "channel.joined");
        }
        CHANNEL_YOU_LEFT => {
            ctx.channels
                .retain(|_, name| !name.eq_ignore_ascii_case(&notify.channel));
            info!(channel = %notify.channel, "channel.left");
        }
        _ => ctx.system(notify.describe()),
    }
    Ok(())
}

fn handle_notification(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    ctx.system(chat::decode_notification(body)?);
    Ok(())
}

fn handle_motd(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    for line in chat::decode_motd(body)? {
        ctx.system(line);
    }
    Ok(())
}

fn handle_player_not_found(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let name = chat::decode_player_not_found(body)?;
    ctx.system(format!("no player named {name:?} is online"));
    Ok(())
}

fn handle_group_invite(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let by = group::decode_invite(body)?;
    ctx.emit_group(GroupEvent::Invited { by });
    Ok(())
}

fn handle_group_decline(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let by = group::decode_name(body)?;
    ctx.emit_group(GroupEvent::Declined { by });
    Ok(())
}

fn handle_group_set_leader(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let name = group::decode_name(body)?;
    ctx.emit_group(GroupEvent::LeaderChanged { name });
    Ok(())
}

fn handle_group_uninvite(ctx: &mut WorldContext, _body: &[u8]) -> PacketResult<()> {
    ctx.party.clear();
    ctx.emit_group(GroupEvent::Removed);
    Ok(())
}

fn handle_group_destroyed(ctx: &mut WorldContext, _body: &[u8]) -> PacketResult<()> {
    ctx.party.clear();
    ctx.emit_group(GroupEvent::Destroyed);
    Ok(())
}

fn handle_group_list(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let list = GroupList::decode(body)?;
    ctx.replace_party(&list);
    let leader = list.leader_name(ctx.self_guid, &ctx.self_name);
    ctx.emit_group(GroupEvent::List {
        members: list.members,
        leader,
    });
    Ok(())
}

fn handle_party_command_result(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let result = PartyCommandResult::decode(body)?;
    let label = result.label();
    ctx.emit_group(GroupEvent::CommandResult { result, label });
    Ok(())
}

fn handle_contact_list(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let mut friends = social::decode_contact_list(body)?;
    for friend in &mut friends {
        match ctx.names.get(&friend.guid) {
            Some(name) => friend.name = name.clone(),
            None => ctx.request_name(friend.guid),
        }
    }
    let event = ctx.friends.set(&friends);
    ctx.emit(SessionEvent::Friend(event));
    Ok(())
}

fn handle_friend_status(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let event = match FriendStatus::decode(body)? {
        FriendStatus::Online { guid, update } => ctx.friends.update(guid, &update),
        FriendStatus::Offline { guid } => ctx.friends.update(
            guid,
            &FriendUpdate {
                status: Some(0),
                ..FriendUpdate::default()
            },
        ),
        FriendStatus::Added(mut entry) => {
            match ctx.names.get(&entry.guid) {
                Some(name) => entry.name = name.clone(),
                None => ctx.request_name(entry.guid),
            }
            Some(ctx.friends.add(&entry))
        }
        FriendStatus::Removed { guid } => ctx.friends.remove(guid),
        FriendStatus::Failed { result, .. } => {
            ctx.system(social::friend_result_label(result));
            None
        }
    };
    if let Some(event) = event {
        ctx.emit(SessionEvent::Friend(event));
    }
    Ok(())
}

fn handle_update_object(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    ctx.apply_update(UpdateObject::decode(body)?);
    Ok(())
}

fn handle_compressed_update_object(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    ctx.apply_update(UpdateObject::decode_compressed(body)?);
    Ok(())
}

fn handle_destroy_object(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let destroy = DestroyObject::decode(body)?;
    if let Some(event) = ctx.entities.destroy(destroy.guid) {
        ctx.emit_entity(event);
    }
    Ok(())
}

fn handle_pong(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let sequence = login::decode_pong(body)?;
    if let Some(sent) = ctx.ping_sent_at.take() {
        ctx.latency_ms = u32::try_from(sent.elapsed().as_millis()).unwrap_or(u32::MAX);
    }
    debug!(sequence, latency_ms = ctx.latency_ms, "world.pong");
    Ok(())
}

fn handle_time_sync_request(ctx: &mut WorldContext, body: &[u8]) -> PacketResult<()> {
    let counter = login::decode_time_sync_request(body)?;
    let ticks = u32::try_from(ctx.connected_at.elapsed().as_millis()).unwrap_or(u32::MAX);
    ctx.queue(
        Opcode::CMSG_TIME_SYNC_RESP,
        login::build_time_sync_response(counter, ticks),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::chat::ChatKind;
    use crate::dispatch::Dispatch;
    use rusty_bot_core::packet::PacketWriter;
    use rusty_bot_core::world::{FriendEvent, PackedGuid};

    fn setup() -> (
        Dispatcher<WorldContext>,
        WorldContext,
        broadcast::Receiver<SessionEvent>,
    ) {
        let (tx, rx) = broadcast::channel(64);
        let mut dispatcher = Dispatcher::new();
        register(&mut dispatcher);
        let mut ctx = WorldContext::new(tx);
        ctx.set_self(0x01, "Me");
        (dispatcher, ctx, rx)
    }

    fn say(guid: u64, text: &str) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer
            .u8(u8::from(ChatKind::Say))
            .u32_le(7)
            .u64_le(guid)
            .u32_le(0)
            .u64_le(0)
            .u32_le(text.len() as u32 + 1)
            .cstring(text)
            .u8(0);
        writer.into_inner()
    }

    fn name_response(guid: u64, name: &str) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer
            .packed_guid(PackedGuid(guid))
            .u8(0)
            .cstring(name)
            .cstring("")
            .u8(1)
            .u8(0)
            .u8(1)
            .u8(0);
        writer.into_inner()
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn chat_texts(events: &[SessionEvent]) -> Vec<(String, String)> {
        events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Chat(message) => {
                    Some((message.sender.clone(), message.text.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn chat_waits_for_one_name_query_then_flushes_in_order() {
        let (mut dispatcher, mut ctx, mut rx) = setup();
        dispatcher.dispatch(&mut ctx, Opcode::SMSG_MESSAGECHAT, &say(0x42, "one"));
        dispatcher.dispatch(&mut ctx, Opcode::SMSG_MESSAGECHAT, &say(0x42, "two"));
        assert!(drain(&mut rx).is_empty());
        let outbox = ctx.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, Opcode::CMSG_NAME_QUERY);

        dispatcher.dispatch(
            &mut ctx,
            Opcode::SMSG_NAME_QUERY_RESPONSE,
            &name_response(0x42, "Ann"),
        );
        assert_eq!(
            chat_texts(&drain(&mut rx)),
            vec![
                ("Ann".to_string(), "one".to_string()),
                ("Ann".to_string(), "two".to_string())
            ]
        );

        dispatcher.dispatch(&mut ctx, Opcode::SMSG_MESSAGECHAT, &say(0x42, "three"));
        assert!(ctx.take_outbox().is_empty());
        assert_eq!(chat_texts(&drain(&mut rx)).len(), 1);
    }

    #[test]
    fn zero_guid_chat_is_delivered_without_a_query() {
        let (mut dispatcher, mut ctx, mut rx) = setup();
        dispatcher.dispatch(&mut ctx, Opcode::SMSG_MESSAGECHAT, &say(0, "server"));
        assert!(ctx.take_outbox().is_empty());
        assert_eq!(
            chat_texts(&drain(&mut rx)),
            vec![(String::new(), "server".to_string())]
        );
    }

    #[test]
    fn channel_indices_fill_the_lowest_gap() {
        let (mut dispatcher, mut ctx, _rx) = setup();
        let notify = |kind: u8, name: &str| {
            let mut writer = PacketWriter::new();
            writer.u8(kind).cstring(name);
            writer.into_inner()
        };
        for name in ["General", "Trade", "LookingForGroup"] {
            dispatcher.dispatch(
                &mut ctx,
                Opcode::SMSG_CHANNEL_NOTIFY,
                &notify(CHANNEL_YOU_JOINED, name),
            );
        }
        dispatcher.dispatch(
            &mut ctx,
            Opcode::SMSG_CHANNEL_NOTIFY,
            &notify(CHANNEL_YOU_LEFT, "trade"),
        );
        assert_eq!(ctx.channel_name(2), None);
        dispatcher.dispatch(
            &mut ctx,
            Opcode::SMSG_CHANNEL_NOTIFY,
            &notify(CHANNEL_YOU_JOINED, "Guild Recruitment"),
        );
        assert_eq!(ctx.channel_name(1), Some("General"));
        assert_eq!(ctx.channel_name(2), Some("Guild Recruitment"));
        assert_eq!(ctx.channel_name(3), Some("LookingForGroup"));
    }

    #[test]
    fn time_sync_is_answered_with_the_counter() {
        let (mut dispatcher, mut ctx, _rx) = setup();
        dispatcher.dispatch(&mut ctx, Opcode::SMSG_TIME_SYNC_REQ, &5u32.to_le_bytes());
        let outbox = ctx.take_outbox();
        assert_eq!(outbox[0].0, Opcode::CMSG_TIME_SYNC_RESP);
        assert_eq!(&outbox[0].1[..4], &5u32.to_le_bytes());
    }

    #[test]
    fn malformed_frames_fail_without_side_effects() {
        let (mut dispatcher, mut ctx, mut rx) = setup();
        assert!(matches!(
            dispatcher.dispatch(&mut ctx, Opcode::SMSG_MESSAGECHAT, &[1, 2]),
            Dispatch::Failed(_)
        ));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn friends_pick_up_cached_and_queried_names() {
        let (mut dispatcher, mut ctx, mut rx) = setup();
        dispatcher.dispatch(
            &mut ctx,
            Opcode::SMSG_NAME_QUERY_RESPONSE,
            &name_response(0x10, "Known"),
        );
        let mut writer = PacketWriter::new();
        writer
            .u32_le(7)
            .u32_le(2)
            .u64_le(0x10)
            .u32_le(1)
            .cstring("")
            .u8(0)
            .u64_le(0x11)
            .u32_le(1)
            .cstring("")
            .u8(0);
        dispatcher.dispatch(&mut ctx, Opcode::SMSG_CONTACT_LIST, writer.as_slice());
        assert_eq!(ctx.friends.get(0x10).map(|f| f.name.as_str()), Some("Known"));
        let outbox = ctx.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].1, 0x11u64.to_le_bytes().to_vec());

        dispatcher.dispatch(
            &mut ctx,
            Opcode::SMSG_NAME_QUERY_RESPONSE,
            &name_response(0x11, "Later"),
        );
        assert_eq!(ctx.friends.get(0x11).map(|f| f.name.as_str()), Some("Later"));
        assert!(
            drain(&mut rx)
                .iter()
                .any(|event| matches!(event, SessionEvent::Friend(FriendEvent::ListReplaced(list)) if list.len() == 2))
        );
    }

    #[test]
    fn group_list_names_us_as_leader() {
        let (mut dispatcher, mut ctx, mut rx) = setup();
        let mut writer = PacketWriter::new();
        writer
            .u8(0)
            .u8(0)
            .u8(0)
            .u8(0)
            .u64_le(0)
            .u32_le(0)
            .u32_le(1)
            .cstring("Bo")
            .u64_le(0x20)
            .u8(1)
            .u8(0)
            .u8(0)
            .u8(0)
            .u64_le(0x01);
        dispatcher.dispatch(&mut ctx, Opcode::SMSG_GROUP_LIST, writer.as_slice());
        assert_eq!(ctx.party_member("bo"), Some(0x20));
        let events = drain(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::Group(GroupEvent::List { leader: Some(leader), .. }) if leader == "Me"
        )));
    }
}
