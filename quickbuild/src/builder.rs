//! Folds the opcode stream into a [`Graph`].
//!
//! Directives update [`BuilderState`] (attribute base, alias tables and the
//! sticky parent/zone/flag settings); creation and buffer opcodes mutate the
//! graph. Referential problems are fatal and carry the location of the
//! offending instruction. Warnings go to the caller's diagnostics sink so
//! they survive a later fatal error.

use std::collections::HashMap;

use log::{debug, info, warn};
use thiserror::Error;

use crate::Options;
use crate::diagnostics::{Diagnostic, Location};
use crate::escape::{token_id, token_name};
use crate::graph::{DEFAULT_ATTR_BASE, ExitId, Graph, PendingKind, RoomId};
use crate::opcode::{Instruction, Opcode, Reference};

/// Fatal errors raised while building the graph.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An ERROR instruction from the line classifier.
    #[error("{location}: {message}")]
    Syntax { location: Location, message: String },
    #[error("{location}: Room {room} doesn't exist")]
    MissingRoom { location: Location, room: String },
    #[error("{location}: Exit {exit} doesn't exist")]
    MissingExit { location: Location, exit: String },
    #[error("{location}: No reverse exit for {exit}")]
    NoReverseExit { location: Location, exit: String },
    #[error("{location}: Exit {exit} already exists in room {room}")]
    DuplicateExit {
        location: Location,
        exit: String,
        room: String,
    },
    /// Two room tokens that sanitize to the same attribute name.
    #[error("{location}: Room {room} collides with {other} as attribute {id}")]
    IdCollision {
        location: Location,
        room: String,
        other: String,
        id: String,
    },
}

impl BuildError {
    pub fn location(&self) -> &Location {
        match self {
            BuildError::Syntax { location, .. }
            | BuildError::MissingRoom { location, .. }
            | BuildError::MissingExit { location, .. }
            | BuildError::NoReverseExit { location, .. }
            | BuildError::DuplicateExit { location, .. }
            | BuildError::IdCollision { location, .. } => location,
        }
    }
}

/// Settings carried from one instruction to the next. Discarded after the pass.
#[derive(Debug, Clone)]
pub struct BuilderState {
    options: Options,
    attr_base: String,
    aliases: HashMap<String, String>,
    reverses: HashMap<String, String>,
    room_parent: Option<Reference>,
    room_zone: Option<Reference>,
    exit_parent: Option<Reference>,
    exit_zone: Option<Reference>,
    room_flags: Option<String>,
    exit_flags: Option<String>,
}

impl BuilderState {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            attr_base: DEFAULT_ATTR_BASE.to_string(),
            aliases: HashMap::new(),
            reverses: HashMap::new(),
            room_parent: None,
            room_zone: None,
            exit_parent: None,
            exit_zone: None,
            room_flags: None,
            exit_flags: None,
        }
    }

    pub fn attr_base(&self) -> &str {
        &self.attr_base
    }

    /// Registered reverse of `exit`, if any.
    pub fn reverse_of(&self, exit: &str) -> Option<&str> {
        self.reverses.get(exit).map(String::as_str)
    }

    /// Apply one instruction.
    ///
    /// # Errors
    /// Returns a `BuildError` for ERROR instructions and broken references.
    pub fn apply(
        &mut self,
        graph: &mut Graph,
        instruction: &Instruction,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), BuildError> {
        let location = &instruction.location;
        match &instruction.opcode {
            Opcode::Nop => {},
            Opcode::Error(message) => {
                return Err(BuildError::Syntax {
                    location: location.clone(),
                    message: message.clone(),
                });
            },
            Opcode::Warning(message) => warn_at(diagnostics, location, message.clone()),
            Opcode::AttrBase(base) => {
                let base = base.trim();
                self.attr_base = if base.is_empty() {
                    DEFAULT_ATTR_BASE.to_string()
                } else {
                    base.to_string()
                };
            },
            Opcode::Alias { exit, aliases } => {
                self.aliases.insert(exit.clone(), aliases.clone());
            },
            Opcode::Reverse { exit, reverse } => {
                self.reverses.insert(exit.clone(), reverse.clone());
                if self.options.bidirectional_reverse {
                    self.reverses.insert(reverse.clone(), exit.clone());
                }
            },
            Opcode::RoomParent(r) => self.room_parent = self.track(graph, PendingKind::Parent, r),
            Opcode::RoomZone(r) => self.room_zone = self.track(graph, PendingKind::Zone, r),
            Opcode::ExitParent(r) => self.exit_parent = self.track(graph, PendingKind::Parent, r),
            Opcode::ExitZone(r) => self.exit_zone = self.track(graph, PendingKind::Zone, r),
            Opcode::RoomFlags(flags) => self.room_flags = non_empty(flags),
            Opcode::ExitFlags(flags) => self.exit_flags = non_empty(flags),
            Opcode::Describe { room, text } => {
                let id = self.room_for_text(graph, room, location, diagnostics)?;
                graph.room_mut(id).description = Some(text.clone());
            },
            Opcode::CreateRoom(token) => {
                self.create_room(graph, token, location)?;
            },
            Opcode::CreateExit { exit, from, to } => {
                let from = require_room(graph, from, location)?;
                let to = require_room(graph, to, location)?;
                self.open_exit(graph, exit, from, to, location)?;
            },
            Opcode::CreateReverseExit { exit, from, to } => {
                let reverse = self
                    .reverses
                    .get(exit)
                    .cloned()
                    .ok_or_else(|| BuildError::NoReverseExit {
                        location: location.clone(),
                        exit: exit.clone(),
                    })?;
                let from = require_room(graph, from, location)?;
                let to = require_room(graph, to, location)?;
                self.open_exit(graph, &reverse, to, from, location)?;
            },
            Opcode::BufferRoom { room, text } => {
                let id = self.room_for_text(graph, room, location, diagnostics)?;
                graph.room_mut(id).append_buffer(text);
            },
            Opcode::BufferExit { room, exit, text } => {
                let room_id = require_room(graph, room, location)?;
                let exit_id = graph
                    .room(room_id)
                    .lookup_exit(exit)
                    .ok_or_else(|| BuildError::MissingExit {
                        location: location.clone(),
                        exit: exit.clone(),
                    })?;
                graph.exit_mut(exit_id).append_buffer(text);
            },
        }
        Ok(())
    }

    /// New value for a sticky parent/zone setting; id references are
    /// registered as pending so the code generator can find or create them.
    fn track(&self, graph: &mut Graph, kind: PendingKind, reference: &Option<Reference>) -> Option<Reference> {
        if let Some(Reference::Id(token)) = reference {
            graph.register_pending(kind, token, &self.attr_base);
        }
        reference.clone()
    }

    fn create_room(&self, graph: &mut Graph, token: &str, location: &Location) -> Result<RoomId, BuildError> {
        let id = match graph.room_id(token) {
            Some(existing) => existing,
            None => {
                check_id_free(graph, token, location)?;
                let id = graph.add_room(token, &self.attr_base);
                let room = graph.room_mut(id);
                // never parent or zone a room to itself
                room.parent = self.room_parent.clone().filter(|r| r.as_str() != token);
                room.zone = self.room_zone.clone().filter(|r| r.as_str() != token);
                room.flags = self.room_flags.clone();
                debug!("created room {token} as {}", room.slot());
                id
            },
        };
        graph.resolve_pending(token, id);
        Ok(id)
    }

    /// Room for IN/DESC text; a missing room is created empty with a warning.
    fn room_for_text(
        &self,
        graph: &mut Graph,
        token: &str,
        location: &Location,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<RoomId, BuildError> {
        if let Some(id) = graph.room_id(token) {
            return Ok(id);
        }
        check_id_free(graph, token, location)?;
        warn_at(diagnostics, location, format!("Room {token} doesn't exist"));
        let id = graph.add_room(token, &self.attr_base);
        graph.resolve_pending(token, id);
        Ok(id)
    }

    fn open_exit(
        &self,
        graph: &mut Graph,
        token: &str,
        from: RoomId,
        to: RoomId,
        location: &Location,
    ) -> Result<ExitId, BuildError> {
        let name = self.exit_name(token);
        let id = graph
            .add_exit(token, name, from, to)
            .ok_or_else(|| BuildError::DuplicateExit {
                location: location.clone(),
                exit: token.to_string(),
                room: graph.room(from).token.clone(),
            })?;
        let exit = graph.exit_mut(id);
        exit.parent = self.exit_parent.clone();
        exit.zone = self.exit_zone.clone();
        exit.flags = self.exit_flags.clone();
        Ok(id)
    }

    fn exit_name(&self, token: &str) -> String {
        if let Some(alias) = self.aliases.get(token) {
            return alias.clone();
        }
        let name = token_name(token);
        if self.options.brackets {
            bracket_name(name)
        } else {
            name.to_string()
        }
    }
}

/// Fold a whole program into a graph.
///
/// # Errors
/// Stops at the first fatal instruction; warnings seen so far stay in
/// `diagnostics`.
pub fn build_graph(
    program: &[Instruction],
    options: Options,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Graph, BuildError> {
    let mut state = BuilderState::new(options);
    let mut graph = Graph::new();
    for instruction in program {
        state.apply(&mut graph, instruction, diagnostics)?;
    }
    info!("built graph: {} rooms, {} exits", graph.room_count(), graph.exit_count());
    Ok(graph)
}

/// Expand `<B>racket` markup into MUSH aliases: `<N>orth` becomes
/// `<N>orth;n;north`. Names without markup are returned unchanged.
pub fn bracket_name(name: &str) -> String {
    let mut short = String::new();
    let mut inside = false;
    for ch in name.chars() {
        match ch {
            '<' => inside = true,
            '>' => inside = false,
            c if inside => short.push(c),
            _ => {},
        }
    }
    if short.is_empty() {
        return name.to_string();
    }
    let short = short.to_lowercase();
    let plain: String = name.chars().filter(|c| *c != '<' && *c != '>').collect::<String>().to_lowercase();
    let mut names = vec![name.to_string(), short];
    if !names.contains(&plain) {
        names.push(plain);
    }
    names.join(";")
}

fn require_room(graph: &Graph, token: &str, location: &Location) -> Result<RoomId, BuildError> {
    graph.room_id(token).ok_or_else(|| BuildError::MissingRoom {
        location: location.clone(),
        room: token.to_string(),
    })
}

/// A new room's attribute name must not already belong to another token.
fn check_id_free(graph: &Graph, token: &str, location: &Location) -> Result<(), BuildError> {
    let id = token_id(token);
    match graph.room_with_id(&id) {
        Some(other) if other.token != token => Err(BuildError::IdCollision {
            location: location.clone(),
            room: token.to_string(),
            other: other.token.clone(),
            id,
        }),
        _ => Ok(()),
    }
}

fn warn_at(diagnostics: &mut Vec<Diagnostic>, location: &Location, message: String) {
    warn!("{location}: {message}");
    diagnostics.push(Diagnostic::warning(Some(location.clone()), message));
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
