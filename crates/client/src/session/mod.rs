//! One world connection: handshake, then a task that owns the socket and serves commands.

pub mod context;
pub mod events;

use std::collections::HashSet;

use rusty_bot_core::packet::{PacketError, PacketReader};
use rusty_bot_core::world::{Entity, FriendEntry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

pub use context::WorldContext;
pub use events::{GroupEvent, SessionEvent};

use crate::auth::AuthResult;
use crate::codec::chat::{self, ChatTarget};
use crate::codec::group;
use crate::codec::login::{self, AuthChallenge, AuthResponse, LoginVerifyWorld};
use crate::codec::social;
use crate::codec::who::{self, WhoEntry, WhoQuery};
use crate::config::SessionConfig;
use crate::dispatch::{Dispatch, Dispatcher, wait_for};
use crate::error::{ClientError, Result};
use crate::framing::WorldFramer;
use crate::wotlk::opcode::Opcode;

const READ_CHUNK: usize = 16 * 1024;
const EVENT_CAPACITY: usize = 1024;
const COMMAND_CAPACITY: usize = 64;

#[derive(Debug)]
enum GroupAction {
    Invite(String),
    Uninvite(String),
    Leave,
    SetLeader(String),
    Accept,
    Decline,
}

#[derive(Debug)]
enum Command {
    Chat {
        target: ChatTarget,
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Sticky {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Who {
        query: WhoQuery,
        reply: oneshot::Sender<Result<Vec<WhoEntry>>>,
    },
    Group {
        action: GroupAction,
        reply: oneshot::Sender<Result<()>>,
    },
    AddFriend {
        name: String,
        note: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveFriend {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Friends {
        reply: oneshot::Sender<Vec<FriendEntry>>,
    },
    JoinChannel {
        name: String,
        password: String,
        reply: oneshot::Sender<Result<()>>,
    },
    LeaveChannel {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ChannelName {
        index: u8,
        reply: oneshot::Sender<Option<String>>,
    },
    Nearby {
        reply: oneshot::Sender<Vec<Entity>>,
    },
    Close,
}

/// Cloneable front end of a running world session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    closed: watch::Receiver<bool>,
}

impl SessionHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ClientError::SessionClosed)?;
        rx.await.map_err(|_| ClientError::SessionClosed)
    }

    /// Sends `text` and makes `target` the sticky mode.
    pub async fn send_chat(&self, target: ChatTarget, text: &str) -> Result<()> {
        let text = text.to_string();
        self.request(|reply| Command::Chat {
            target,
            text,
            reply,
        })
        .await?
    }

    pub async fn say(&self, text: &str) -> Result<()> {
        self.send_chat(ChatTarget::Say, text).await
    }

    pub async fn whisper(&self, name: &str, text: &str) -> Result<()> {
        self.send_chat(ChatTarget::Whisper(name.to_string()), text)
            .await
    }

    /// Sends in whatever mode was used last.
    pub async fn send_sticky(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        self.request(|reply| Command::Sticky { text, reply }).await?
    }

    pub async fn who(&self, query: WhoQuery) -> Result<Vec<WhoEntry>> {
        self.request(|reply| Command::Who { query, reply }).await?
    }

    async fn group(&self, action: GroupAction) -> Result<()> {
        self.request(|reply| Command::Group { action, reply }).await?
    }

    pub async fn invite(&self, name: &str) -> Result<()> {
        self.group(GroupAction::Invite(name.to_string())).await
    }

    pub async fn uninvite(&self, name: &str) -> Result<()> {
        self.group(GroupAction::Uninvite(name.to_string())).await
    }

    pub async fn leave_group(&self) -> Result<()> {
        self.group(GroupAction::Leave).await
    }

    /// Fails with `UnknownPartyMember` unless `name` is in the last group list.
    pub async fn set_leader(&self, name: &str) -> Result<()> {
        self.group(GroupAction::SetLeader(name.to_string())).await
    }

    pub async fn accept_invite(&self) -> Result<()> {
        self.group(GroupAction::Accept).await
    }

    pub async fn decline_invite(&self) -> Result<()> {
        self.group(GroupAction::Decline).await
    }

    pub async fn add_friend(&self, name: &str, note: &str) -> Result<()> {
        let (name, note) = (name.to_string(), note.to_string());
        self.request(|reply| Command::AddFriend { name, note, reply })
            .await?
    }

    pub async fn remove_friend(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.request(|reply| Command::RemoveFriend { name, reply })
            .await?
    }

    /// Friend list sorted by name.
    pub async fn friends(&self) -> Result<Vec<FriendEntry>> {
        self.request(|reply| Command::Friends { reply }).await
    }

    pub async fn join_channel(&self, name: &str, password: &str) -> Result<()> {
        let (name, password) = (name.to_string(), password.to_string());
        self.request(|reply| Command::JoinChannel {
            name,
            password,
            reply,
        })
        .await?
    }

    pub async fn leave_channel(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.request(|reply| Command::LeaveChannel { name, reply })
            .await?
    }

    pub async fn channel_name(&self, index: u8) -> Result<Option<String>> {
        self.request(|reply| Command::ChannelName { index, reply })
            .await
    }

    pub async fn nearby_entities(&self) -> Result<Vec<Entity>> {
        self.request(|reply| Command::Nearby { reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Asks the session to stop and waits until it has.
    pub async fn close(&self) {
        // An error means the task is already gone.
        let _ = self.commands.send(Command::Close).await;
        self.closed().await;
    }

    /// Resolves once the session has ended, whichever side ended it.
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        // The task always publishes `true` before dropping the sender.
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

/// Logs into the world server named by `auth` and returns once the character is in the world.
pub async fn connect_world(config: SessionConfig, auth: AuthResult) -> Result<SessionHandle> {
    let address = auth.realm.address();
    info!(%address, realm = %auth.realm.name, "world.connect");
    let stream = TcpStream::connect(&address).await?;
    stream.set_nodelay(true)?;
    let (mut reader, writer) = stream.into_split();

    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let mut world = World::new(writer, config, events.clone());
    world.enter(&mut reader, &auth).await?;

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (closed_tx, closed_rx) = watch::channel(false);
    tokio::spawn(run(world, reader, commands_rx, closed_tx));

    Ok(SessionHandle {
        commands: commands_tx,
        events,
        closed: closed_rx,
    })
}

fn decode_error(opcode: u16) -> impl FnOnce(PacketError) -> ClientError {
    move |source| ClientError::decode(opcode, source)
}

struct World {
    writer: OwnedWriteHalf,
    framer: WorldFramer,
    dispatcher: Dispatcher<WorldContext>,
    ctx: WorldContext,
    config: SessionConfig,
    reported: HashSet<u16>,
}

impl World {
    fn new(
        writer: OwnedWriteHalf,
        config: SessionConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let mut dispatcher = Dispatcher::new();
        context::register(&mut dispatcher);
        Self {
            writer,
            framer: WorldFramer::new(),
            dispatcher,
            ctx: WorldContext::new(events),
            config,
            reported: HashSet::new(),
        }
    }

    async fn send(&mut self, opcode: u16, body: &[u8]) -> Result<()> {
        let frame = self
            .framer
            .encode(opcode, body)
            .map_err(decode_error(opcode))?;
        self.writer.write_all(&frame).await?;
        debug!(
            opcode = format_args!("0x{opcode:04x}"),
            body_len = body.len(),
            "world.tx"
        );
        Ok(())
    }

    async fn flush_outbox(&mut self) -> Result<()> {
        for (opcode, body) in self.ctx.take_outbox() {
            self.send(opcode, &body).await?;
        }
        Ok(())
    }

    /// Dispatches every complete frame. A framing error means the stream is out of sync.
    fn process_frames(&mut self) -> Result<()> {
        while let Some(packet) = self.framer.next_packet().map_err(decode_error(0))? {
            let opcode = packet.opcode;
            trace!(
                opcode = format_args!("0x{opcode:04x}"),
                body_len = packet.body.len(),
                "world.rx"
            );
            match self.dispatcher.dispatch(&mut self.ctx, opcode, &packet.body) {
                Dispatch::Expected | Dispatch::Handled => {}
                Dispatch::Failed(err) => {
                    warn!(opcode = format_args!("0x{opcode:04x}"), error = %err, "world.decode_error");
                    self.ctx.emit(SessionEvent::DecodeError {
                        opcode,
                        message: err.to_string(),
                    });
                }
                Dispatch::Unhandled => {
                    if self.config.report_unhandled_opcodes && self.reported.insert(opcode) {
                        self.ctx.emit(SessionEvent::NotImplemented(opcode));
                    }
                }
            }
        }
        Ok(())
    }

    async fn ingest(&mut self, chunk: &[u8]) -> Result<()> {
        self.framer.feed(chunk);
        self.process_frames()?;
        self.flush_outbox().await
    }

    async fn read_some(&mut self, reader: &mut OwnedReadHalf) -> Result<()> {
        let mut chunk = [0u8; 4096];
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(ClientError::ConnectionClosedUnexpectedly);
        }
        self.ingest(&chunk[..read]).await
    }

    /// Reads until a frame with `opcode` arrives. Frames before it go through the handlers.
    async fn expect(&mut self, reader: &mut OwnedReadHalf, opcode: u16) -> Result<Vec<u8>> {
        let mut waiter = self.dispatcher.expect(opcode)?;
        let deadline = Instant::now() + self.config.expect_timeout();
        loop {
            match waiter.try_recv() {
                Ok(body) => return Ok(body),
                Err(TryRecvError::Closed) => return Err(ClientError::SessionClosed),
                Err(TryRecvError::Empty) => {}
            }
            tokio::time::timeout_at(deadline, self.read_some(reader))
                .await
                .map_err(|_| ClientError::ExpectTimeout(opcode))??;
        }
    }

    async fn enter(&mut self, reader: &mut OwnedReadHalf, auth: &AuthResult) -> Result<()> {
        let body = self.expect(reader, Opcode::SMSG_AUTH_CHALLENGE).await?;
        let challenge =
            AuthChallenge::decode(&body).map_err(decode_error(Opcode::SMSG_AUTH_CHALLENGE))?;

        let account = self.config.account.clone();
        let client_seed: u32 = rand::random();
        let digest = login::auth_session_digest(
            &account,
            client_seed,
            challenge.server_seed,
            &auth.session_key,
        );
        let session = login::build_auth_session(
            &account,
            client_seed,
            u32::from(auth.realm.id),
            &digest,
        );
        self.send(Opcode::CMSG_AUTH_SESSION, &session).await?;
        self.framer.enable_encryption(&auth.session_key);
        info!(account = %account, "world.stage auth_session");

        self.await_auth_response(reader).await?;

        self.send(Opcode::CMSG_CHAR_ENUM, &[]).await?;
        let body = self.expect(reader, Opcode::SMSG_CHAR_ENUM).await?;
        let characters =
            login::decode_char_enum(&body).map_err(decode_error(Opcode::SMSG_CHAR_ENUM))?;
        let found = characters
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&self.config.character));
        let Some(index) = found else {
            return Err(ClientError::CharacterNotFound {
                requested: self.config.character.clone(),
                available: characters.into_iter().map(|c| c.name).collect(),
            });
        };
        let character = &characters[index];
        self.ctx.set_self(character.guid, &character.name);
        info!(
            character = %character.name,
            guid = character.guid,
            level = character.level,
            "world.stage player_login"
        );

        self.send(
            Opcode::CMSG_PLAYER_LOGIN,
            &login::build_player_login(character.guid),
        )
        .await?;
        let body = self.expect(reader, Opcode::SMSG_LOGIN_VERIFY_WORLD).await?;
        let verify: LoginVerifyWorld = PacketReader::new(&body)
            .read_layout()
            .map_err(decode_error(Opcode::SMSG_LOGIN_VERIFY_WORLD))?;
        info!(
            map = verify.map,
            x = verify.position.point.x,
            y = verify.position.point.y,
            z = verify.position.point.z,
            "world.stage in_world"
        );

        for channel in self.config.channels.clone() {
            self.send(Opcode::CMSG_JOIN_CHANNEL, &chat::build_join_channel(&channel, ""))
                .await?;
        }
        self.send(
            Opcode::CMSG_CONTACT_LIST,
            &social::build_contact_list_request(),
        )
        .await
    }

    /// A queued login gets further responses; timeouts are expected while waiting in line.
    async fn await_auth_response(&mut self, reader: &mut OwnedReadHalf) -> Result<()> {
        let mut queued = false;
        loop {
            let body = match self.expect(reader, Opcode::SMSG_AUTH_RESPONSE).await {
                Ok(body) => body,
                Err(ClientError::ExpectTimeout(_)) if queued => continue,
                Err(err) => return Err(err),
            };
            match AuthResponse::decode(&body).map_err(decode_error(Opcode::SMSG_AUTH_RESPONSE))? {
                AuthResponse::Ok => return Ok(()),
                AuthResponse::Queued { position } => {
                    info!(position, "world.queued");
                    queued = true;
                }
                AuthResponse::Failed(status) => {
                    warn!(%status, "world.auth_rejected");
                    return Err(ClientError::WorldAuthFailed(status));
                }
            }
        }
    }

    fn chat_packet(&self, target: &ChatTarget, text: &str) -> Result<Vec<u8>> {
        let destination = match target {
            ChatTarget::Channel(index) => Some(
                self.ctx
                    .channel_name(*index)
                    .ok_or(ClientError::UnknownChannel(*index))?
                    .to_string(),
            ),
            ChatTarget::Whisper(name) => Some(name.clone()),
            _ => None,
        };
        Ok(chat::build_message_chat(
            target.kind(),
            self.config.language,
            destination.as_deref(),
            text,
        ))
    }

    async fn send_chat(&mut self, target: ChatTarget, text: &str) -> Result<()> {
        let body = self.chat_packet(&target, text)?;
        self.send(Opcode::CMSG_MESSAGECHAT, &body).await?;
        self.ctx.sticky = Some(target);
        Ok(())
    }

    async fn send_group(&mut self, action: GroupAction) -> Result<()> {
        let (opcode, body) = match action {
            GroupAction::Invite(name) => (Opcode::CMSG_GROUP_INVITE, group::build_invite(&name)),
            GroupAction::Uninvite(name) => {
                (Opcode::CMSG_GROUP_UNINVITE, group::build_uninvite(&name))
            }
            GroupAction::Leave => (Opcode::CMSG_GROUP_DISBAND, group::build_empty()),
            GroupAction::SetLeader(name) => {
                let guid = self
                    .ctx
                    .party_member(&name)
                    .ok_or(ClientError::UnknownPartyMember(name))?;
                (Opcode::CMSG_GROUP_SET_LEADER, group::build_set_leader(guid))
            }
            GroupAction::Accept => (Opcode::CMSG_GROUP_ACCEPT, group::build_accept()),
            GroupAction::Decline => (Opcode::CMSG_GROUP_DECLINE, group::build_empty()),
        };
        self.send(opcode, &body).await
    }

    /// Registers the `SMSG_WHO` waiter, sends the query and answers from a detached task.
    async fn start_who(
        &mut self,
        query: WhoQuery,
        reply: oneshot::Sender<Result<Vec<WhoEntry>>>,
    ) {
        let waiter = match self.dispatcher.expect(Opcode::SMSG_WHO) {
            Ok(waiter) => waiter,
            Err(err) => {
                let _ = reply.send(Err(err));
                return;
            }
        };
        if let Err(err) = self.send(Opcode::CMSG_WHO, &query.encode()).await {
            let _ = reply.send(Err(err));
            return;
        }
        let timeout = self.config.expect_timeout();
        tokio::spawn(async move {
            let result = wait_for(waiter, Opcode::SMSG_WHO, timeout)
                .await
                .and_then(|body| who::decode_who(&body).map_err(decode_error(Opcode::SMSG_WHO)));
            let _ = reply.send(result);
        });
    }

    async fn execute(&mut self, command: Command) {
        // Replies are dropped silently when the caller stopped waiting.
        match command {
            Command::Chat {
                target,
                text,
                reply,
            } => {
                let _ = reply.send(self.send_chat(target, &text).await);
            }
            Command::Sticky { text, reply } => {
                let result = match self.ctx.sticky.clone() {
                    Some(target) => self.send_chat(target, &text).await,
                    None => Err(ClientError::NoStickyChatMode),
                };
                let _ = reply.send(result);
            }
            Command::Who { query, reply } => self.start_who(query, reply).await,
            Command::Group { action, reply } => {
                let _ = reply.send(self.send_group(action).await);
            }
            Command::AddFriend { name, note, reply } => {
                let body = social::build_add_friend(&name, &note);
                let _ = reply.send(self.send(Opcode::CMSG_ADD_FRIEND, &body).await);
            }
            Command::RemoveFriend { name, reply } => {
                let result = match self.ctx.friends.find_by_name(&name).map(|f| f.guid) {
                    Some(guid) => {
                        self.send(Opcode::CMSG_DEL_FRIEND, &social::build_del_friend(guid))
                            .await
                    }
                    None => Err(ClientError::UnknownFriend(name)),
                };
                let _ = reply.send(result);
            }
            Command::Friends { reply } => {
                let _ = reply.send(self.ctx.friends.all());
            }
            Command::JoinChannel {
                name,
                password,
                reply,
            } => {
                let body = chat::build_join_channel(&name, &password);
                let _ = reply.send(self.send(Opcode::CMSG_JOIN_CHANNEL, &body).await);
            }
            Command::LeaveChannel { name, reply } => {
                let body = chat::build_leave_channel(&name);
                let _ = reply.send(self.send(Opcode::CMSG_LEAVE_CHANNEL, &body).await);
            }
            Command::ChannelName { index, reply } => {
                let _ = reply.send(self.ctx.channel_name(index).map(str::to_string));
            }
            Command::Nearby { reply } => {
                let _ = reply.send(self.ctx.entities.iter().cloned().collect());
            }
            Command::Close => {}
        }
    }

    async fn shutdown(&mut self) {
        for event in self.ctx.entities.clear() {
            self.ctx.emit(SessionEvent::Entity(event));
        }
        if let Err(err) = self.writer.shutdown().await {
            debug!(error = %err, "world.shutdown_error");
        }
    }
}

async fn run(
    mut world: World,
    mut reader: OwnedReadHalf,
    mut commands: mpsc::Receiver<Command>,
    closed: watch::Sender<bool>,
) {
    let period = world.config.ping_interval();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    info!("world.closed_by_peer");
                    break;
                }
                Ok(n) => {
                    if let Err(err) = world.ingest(&chunk[..n]).await {
                        warn!(error = %err, "world.stream_error");
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "world.read_error");
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Close) | None => {
                    info!("world.close");
                    break;
                }
                Some(command) => world.execute(command).await,
            },
            _ = ping.tick() => {
                let body = world.ctx.next_ping();
                if let Err(err) = world.send(Opcode::CMSG_PING, &body).await {
                    warn!(error = %err, "world.ping_failed");
                    break;
                }
            }
        }
    }

    world.shutdown().await;
    closed.send_replace(true);
}
