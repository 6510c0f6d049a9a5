use std::collections::HashMap;

/// Friend status bits as sent in contact lists.
pub const FRIEND_STATUS_OFFLINE: u8 = 0x00;
pub const FRIEND_STATUS_ONLINE: u8 = 0x01;
pub const FRIEND_STATUS_AFK: u8 = 0x02;
pub const FRIEND_STATUS_DND: u8 = 0x04;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FriendEntry {
    pub guid: u64,
    pub name: String,
    pub note: String,
    pub status: u8,
    pub area: u32,
    pub level: u32,
    pub class: u32,
}

impl FriendEntry {
    pub fn is_online(&self) -> bool {
        self.status != FRIEND_STATUS_OFFLINE
    }
}

/// Partial change to one entry; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FriendUpdate {
    pub status: Option<u8>,
    pub area: Option<u32>,
    pub level: Option<u32>,
    pub class: Option<u32>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendEvent {
    ListReplaced(Vec<FriendEntry>),
    Online { guid: u64, name: String },
    Offline { guid: u64, name: String },
    Added(FriendEntry),
    Removed { guid: u64, name: String },
}

#[derive(Debug, Default)]
pub struct FriendStore {
    entries: HashMap<u64, FriendEntry>,
}

impl FriendStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, guid: u64) -> Option<&FriendEntry> {
        self.entries.get(&guid)
    }

    /// Entries sorted by name.
    pub fn all(&self) -> Vec<FriendEntry> {
        let mut all: Vec<FriendEntry> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.guid.cmp(&b.guid)));
        all
    }

    pub fn find_by_name(&self, name: &str) -> Option<&FriendEntry> {
        self.entries
            .values()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn set(&mut self, list: &[FriendEntry]) -> FriendEvent {
        self.entries = list.iter().map(|e| (e.guid, e.clone())).collect();
        FriendEvent::ListReplaced(self.all())
    }

    /// Applies a status change. Carrying a status yields an online or offline event for the
    /// resulting state; unknown guids are ignored.
    pub fn update(&mut self, guid: u64, update: &FriendUpdate) -> Option<FriendEvent> {
        let entry = self.entries.get_mut(&guid)?;
        if let Some(status) = update.status {
            entry.status = status;
        }
        if let Some(area) = update.area {
            entry.area = area;
        }
        if let Some(level) = update.level {
            entry.level = level;
        }
        if let Some(class) = update.class {
            entry.class = class;
        }
        if let Some(note) = &update.note {
            entry.note = note.clone();
        }
        update.status?;

        let name = entry.name.clone();
        Some(if entry.is_online() {
            FriendEvent::Online { guid, name }
        } else {
            FriendEvent::Offline { guid, name }
        })
    }

    pub fn add(&mut self, entry: &FriendEntry) -> FriendEvent {
        self.entries.insert(entry.guid, entry.clone());
        FriendEvent::Added(entry.clone())
    }

    pub fn remove(&mut self, guid: u64) -> Option<FriendEvent> {
        self.entries
            .remove(&guid)
            .map(|e| FriendEvent::Removed { guid, name: e.name })
    }

    /// Fills in a name resolved after the entry arrived. No event.
    pub fn set_name(&mut self, guid: u64, name: &str) -> bool {
        match self.entries.get_mut(&guid) {
            Some(entry) if entry.name != name => {
                entry.name = name.to_string();
                true
            }
            _ => false,
        }
    }
}
