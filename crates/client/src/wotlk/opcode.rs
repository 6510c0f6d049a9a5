/// Auth server commands (first byte of every realm-server packet).
pub struct AuthCmd;

impl AuthCmd {
    pub const LOGON_CHALLENGE: u8 = 0x00;
    pub const LOGON_PROOF: u8 = 0x01;
    pub const RECONNECT_CHALLENGE: u8 = 0x02;
    pub const RECONNECT_PROOF: u8 = 0x03;
    pub const REALM_LIST: u8 = 0x10;
}

/// World opcodes for 3.3.5a. Servers send them as u16, clients as u32.
pub struct Opcode;

impl Opcode {
    // Character selection and login.
    pub const CMSG_CHAR_ENUM: u16 = 0x037;
    pub const SMSG_CHAR_ENUM: u16 = 0x03B;
    pub const CMSG_PLAYER_LOGIN: u16 = 0x03D;
    pub const SMSG_AUTH_CHALLENGE: u16 = 0x1EC;
    pub const CMSG_AUTH_SESSION: u16 = 0x1ED;
    pub const SMSG_AUTH_RESPONSE: u16 = 0x1EE;
    pub const SMSG_LOGIN_VERIFY_WORLD: u16 = 0x236;

    // Queries.
    pub const CMSG_NAME_QUERY: u16 = 0x050;
    pub const SMSG_NAME_QUERY_RESPONSE: u16 = 0x051;
    pub const CMSG_GAMEOBJECT_QUERY: u16 = 0x05E;
    pub const SMSG_GAMEOBJECT_QUERY_RESPONSE: u16 = 0x05F;
    pub const CMSG_CREATURE_QUERY: u16 = 0x060;
    pub const SMSG_CREATURE_QUERY_RESPONSE: u16 = 0x061;
    pub const CMSG_WHO: u16 = 0x062;
    pub const SMSG_WHO: u16 = 0x063;

    // Social.
    pub const CMSG_CONTACT_LIST: u16 = 0x066;
    pub const SMSG_CONTACT_LIST: u16 = 0x067;
    pub const SMSG_FRIEND_STATUS: u16 = 0x068;
    pub const CMSG_ADD_FRIEND: u16 = 0x069;
    pub const CMSG_DEL_FRIEND: u16 = 0x06A;

    // Group.
    pub const CMSG_GROUP_INVITE: u16 = 0x06E;
    pub const SMSG_GROUP_INVITE: u16 = 0x06F;
    pub const CMSG_GROUP_ACCEPT: u16 = 0x072;
    pub const CMSG_GROUP_DECLINE: u16 = 0x073;
    pub const SMSG_GROUP_DECLINE: u16 = 0x074;
    pub const CMSG_GROUP_UNINVITE: u16 = 0x075;
    pub const SMSG_GROUP_UNINVITE: u16 = 0x077;
    pub const CMSG_GROUP_SET_LEADER: u16 = 0x078;
    pub const SMSG_GROUP_SET_LEADER: u16 = 0x079;
    pub const CMSG_GROUP_DISBAND: u16 = 0x07B;
    pub const SMSG_GROUP_DESTROYED: u16 = 0x07C;
    pub const SMSG_GROUP_LIST: u16 = 0x07D;
    pub const SMSG_PARTY_COMMAND_RESULT: u16 = 0x07F;

    // Chat and channels.
    pub const CMSG_MESSAGECHAT: u16 = 0x095;
    pub const SMSG_MESSAGECHAT: u16 = 0x096;
    pub const CMSG_JOIN_CHANNEL: u16 = 0x097;
    pub const CMSG_LEAVE_CHANNEL: u16 = 0x098;
    pub const SMSG_CHANNEL_NOTIFY: u16 = 0x099;
    pub const SMSG_NOTIFICATION: u16 = 0x1CB;
    pub const SMSG_CHAT_PLAYER_NOT_FOUND: u16 = 0x2A9;
    pub const SMSG_MOTD: u16 = 0x33D;
    pub const SMSG_GM_MESSAGECHAT: u16 = 0x3B3;

    // Objects.
    pub const SMSG_UPDATE_OBJECT: u16 = 0x0A9;
    pub const SMSG_DESTROY_OBJECT: u16 = 0x0AA;
    pub const SMSG_COMPRESSED_UPDATE_OBJECT: u16 = 0x1F6;

    // Keep-alive.
    pub const CMSG_PING: u16 = 0x1DC;
    pub const SMSG_PONG: u16 = 0x1DD;
    pub const SMSG_TIME_SYNC_REQ: u16 = 0x390;
    pub const CMSG_TIME_SYNC_RESP: u16 = 0x391;
}
