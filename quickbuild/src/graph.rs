//! The room/exit graph produced by the builder and consumed by the code generator.
//!
//! Rooms live in an arena keyed by their source token, so a [`RoomId`] stays
//! valid for the life of the graph. Exits live in a second arena in creation
//! order and are indexed per source room by sanitized exit id.

use std::collections::HashMap;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::escape::{token_id, token_name};
use crate::opcode::Reference;

/// Attribute base used until an `ATTR BASE:` directive says otherwise.
pub const DEFAULT_ATTR_BASE: &str = "ROOM.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitId(usize);

#[derive(Debug, Clone)]
pub struct Room {
    /// Source token, e.g. `"Red Room".dark`.
    pub token: String,
    /// Attribute-safe id derived from the token.
    pub id: String,
    /// Display name used when digging.
    pub name: String,
    pub attr_base: String,
    pub parent: Option<Reference>,
    pub zone: Option<Reference>,
    pub flags: Option<String>,
    pub description: Option<String>,
    buffer: String,
    exits: IndexMap<String, ExitId>,
}

impl Room {
    fn new(token: &str, attr_base: &str) -> Self {
        Self {
            token: token.to_string(),
            id: token_id(token),
            name: token_name(token).to_string(),
            attr_base: attr_base.to_string(),
            parent: None,
            zone: None,
            flags: None,
            description: None,
            buffer: String::new(),
            exits: IndexMap::new(),
        }
    }

    /// Attribute on the builder that holds this room's dbref.
    pub fn slot(&self) -> String {
        format!("{}{}", self.attr_base, self.id)
    }

    /// Buffered MUSH code with leading whitespace removed.
    pub fn buffer(&self) -> &str {
        self.buffer.trim_start()
    }

    pub fn append_buffer(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Outgoing exits in creation order.
    pub fn exits(&self) -> impl Iterator<Item = ExitId> + '_ {
        self.exits.values().copied()
    }

    pub fn exit_count(&self) -> usize {
        self.exits.len()
    }

    pub fn lookup_exit(&self, token: &str) -> Option<ExitId> {
        self.exits.get(&token_id(token)).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Exit {
    pub token: String,
    pub id: String,
    /// Name passed to `@open`, aliases included.
    pub name: String,
    pub from: RoomId,
    pub to: RoomId,
    pub parent: Option<Reference>,
    pub zone: Option<Reference>,
    pub flags: Option<String>,
    buffer: String,
}

impl Exit {
    pub fn buffer(&self) -> &str {
        self.buffer.trim_start()
    }

    pub fn append_buffer(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Name used to address the exit after it is opened: the last of its
    /// `;`-separated names.
    pub fn match_name(&self) -> &str {
        self.name
            .rsplit(';')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(self.name.as_str())
    }
}

/// A parent or zone named before any room with that token exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub attr_base: String,
    pub id: String,
    pub name: String,
}

impl Placeholder {
    pub fn for_token(token: &str, attr_base: &str) -> Self {
        Self {
            attr_base: attr_base.to_string(),
            id: token_id(token),
            name: token_name(token).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    Placeholder(Placeholder),
    Room(RoomId),
}

/// Which deferred-reference table an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Parent,
    Zone,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    rooms: IndexMap<String, Room>,
    /// Sanitized id to the room that owns it.
    ids: HashMap<String, RoomId>,
    exits: Vec<Exit>,
    pending_parents: IndexMap<String, Pending>,
    pending_zones: IndexMap<String, Pending>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_id(&self, token: &str) -> Option<RoomId> {
        self.rooms.get_index_of(token).map(RoomId)
    }

    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id.0]
    }

    pub fn room_mut(&mut self, id: RoomId) -> &mut Room {
        &mut self.rooms[id.0]
    }

    pub fn room_by_token(&self, token: &str) -> Option<&Room> {
        self.rooms.get(token)
    }

    /// The room whose sanitized id is `id`, whatever token it was written as.
    pub fn room_with_id(&self, id: &str) -> Option<&Room> {
        self.ids.get(id).map(|r| self.room(*r))
    }

    /// Rooms in creation order.
    pub fn rooms(&self) -> impl Iterator<Item = (RoomId, &Room)> {
        self.rooms.values().enumerate().map(|(i, r)| (RoomId(i), r))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Return the room for `token`, creating it with `attr_base` if needed.
    pub fn add_room(&mut self, token: &str, attr_base: &str) -> RoomId {
        let index = match self.rooms.entry(token.to_string()) {
            Entry::Occupied(e) => e.index(),
            Entry::Vacant(e) => {
                let index = e.index();
                let room = e.insert(Room::new(token, attr_base));
                self.ids.entry(room.id.clone()).or_insert(RoomId(index));
                index
            },
        };
        RoomId(index)
    }

    pub fn exit(&self, id: ExitId) -> &Exit {
        &self.exits[id.0]
    }

    pub fn exit_mut(&mut self, id: ExitId) -> &mut Exit {
        &mut self.exits[id.0]
    }

    /// All exits in creation order.
    pub fn exits(&self) -> impl Iterator<Item = &Exit> {
        self.exits.iter()
    }

    pub fn exit_count(&self) -> usize {
        self.exits.len()
    }

    /// Open a new exit. Returns `None` when `from` already has an exit with
    /// the same id.
    pub fn add_exit(&mut self, token: &str, name: String, from: RoomId, to: RoomId) -> Option<ExitId> {
        let id = token_id(token);
        let exit_id = ExitId(self.exits.len());
        match self.rooms[from.0].exits.entry(id.clone()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(e) => {
                e.insert(exit_id);
            },
        }
        self.exits.push(Exit {
            token: token.to_string(),
            id,
            name,
            from,
            to,
            parent: None,
            zone: None,
            flags: None,
            buffer: String::new(),
        });
        Some(exit_id)
    }

    pub fn pending(&self, kind: PendingKind) -> &IndexMap<String, Pending> {
        match kind {
            PendingKind::Parent => &self.pending_parents,
            PendingKind::Zone => &self.pending_zones,
        }
    }

    /// Record `token` as a parent or zone target.
    pub fn register_pending(&mut self, kind: PendingKind, token: &str, attr_base: &str) {
        let entry = match self.room_id(token) {
            Some(id) => Pending::Room(id),
            None => Pending::Placeholder(Placeholder::for_token(token, attr_base)),
        };
        self.pending_mut(kind).insert(token.to_string(), entry);
    }

    /// Point any pending entries for `token` at the now existing room.
    pub fn resolve_pending(&mut self, token: &str, room: RoomId) {
        for kind in [PendingKind::Parent, PendingKind::Zone] {
            if let Some(entry) = self.pending_mut(kind).get_mut(token) {
                *entry = Pending::Room(room);
            }
        }
    }

    /// Placeholders that no room creation has resolved, in registration order.
    pub fn unresolved(&self, kind: PendingKind) -> Vec<(String, Placeholder)> {
        self.pending(kind)
            .iter()
            .filter_map(|(token, entry)| match entry {
                Pending::Placeholder(p) => Some((token.clone(), p.clone())),
                Pending::Room(_) => None,
            })
            .collect()
    }

    /// `from-->to` for every exit, in creation order.
    pub fn edge_list(&self) -> Vec<String> {
        self.exits
            .iter()
            .map(|e| format!("{}-->{}", self.room(e.from).id, self.room(e.to).id))
            .collect()
    }

    fn pending_mut(&mut self, kind: PendingKind) -> &mut IndexMap<String, Pending> {
        match kind {
            PendingKind::Parent => &mut self.pending_parents,
            PendingKind::Zone => &mut self.pending_zones,
        }
    }
}
