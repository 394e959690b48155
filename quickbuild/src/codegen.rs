//! Turns a finished [`Graph`] into PennMUSH commands.
//!
//! Rooms are dug first and their dbrefs stored in attributes on the builder
//! (`@set me=ROOM.Red_Room:%l`); exits are opened afterwards by teleporting
//! back into each source room. Parents and zones that were never declared as
//! rooms become things created up front.

use std::collections::HashMap;

use indexmap::IndexSet;
use log::{debug, info, warn};
use textwrap::{Options as WrapOptions, WordSeparator, WordSplitter, WrapAlgorithm};
use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::escape::escape_literal;
use crate::graph::{Graph, Pending, PendingKind, Placeholder, Room};
use crate::opcode::Reference;

/// Separator between levels of an attribute tree.
pub const TREE_SEPARATOR: char = '`';

/// Content width of the `@@` edge summary, not counting the prefix.
pub const WRAP_WIDTH: usize = 75;

const SUMMARY_PREFIX: &str = "@@ ";

#[derive(Debug, Error)]
pub enum GenerateError {
    /// A parent or zone names a token that is neither a room nor a placeholder.
    #[error("Unresolved reference {0}")]
    UnresolvedReference(String),
}

/// Generate the full command list for `graph`.
///
/// Appends a warning to `diagnostics` for every room without exits.
///
/// # Errors
/// Fails only if a parent or zone reference was never registered.
pub fn generate(graph: &Graph, diagnostics: &mut Vec<Diagnostic>) -> Result<Vec<String>, GenerateError> {
    let rooms = ordered_rooms(graph);
    let mut out = Vec::new();

    out.extend(edge_summary(&graph.edge_list()));
    out.extend(attribute_trees(&rooms));

    let mut slots: HashMap<&str, String> = graph.rooms().map(|(_, r)| (r.token.as_str(), r.slot())).collect();
    materialize(graph, &mut slots, &mut out);

    out.push("think Digging Rooms".to_string());
    for room in &rooms {
        out.push(format!("@dig/teleport {}", room.name));
        out.push(format!("@set me={}:%l", room.slot()));
        if let Some(flags) = &room.flags {
            out.push(format!("@set here={flags}"));
        }
        if let Some(text) = &room.description {
            out.push(format!("@describe here={}", escape_literal(text)));
        }
        push_buffer(&mut out, room.buffer());
        if let Some(parent) = &room.parent {
            out.push(format!("@parent here={}", link(&slots, parent)?));
        }
        if let Some(zone) = &room.zone {
            out.push(format!("@chzone here={}", link(&slots, zone)?));
        }
    }

    out.push("think Linking Rooms".to_string());
    for room in &rooms {
        if room.exit_count() == 0 {
            warn!("Creating room with no exits: {}", room.name);
            out.push(format!("think WARNING: Creating room with no exits: {}", room.name));
            diagnostics.push(Diagnostic::warning(None, format!("Creating room with no exits: {}", room.name)));
        }
        for exit in room.exits().map(|id| graph.exit(id)) {
            let target = exit.match_name();
            out.push(format!("@teleport [v({})]", room.slot()));
            out.push(format!("@open {}=[v({})]", exit.name, graph.room(exit.to).slot()));
            if let Some(flags) = &exit.flags {
                out.push(format!("@set {target}={flags}"));
            }
            push_buffer(&mut out, exit.buffer());
            if let Some(parent) = &exit.parent {
                out.push(format!("@parent {target}={}", link(&slots, parent)?));
            }
            if let Some(zone) = &exit.zone {
                out.push(format!("@chzone {target}={}", link(&slots, zone)?));
            }
        }
    }

    info!("generated {} commands for {} rooms", out.len(), rooms.len());
    Ok(out)
}

/// Rooms without a zone first, then rooms without a parent; otherwise
/// creation order.
///
/// This is not a dependency sort. A room used as a parent or zone that has a
/// parent or zone of its own can be dug after the rooms linking to it; their
/// `@parent here=[v(slot)]` then runs while the slot is still empty and links
/// to nothing.
pub fn ordered_rooms(graph: &Graph) -> Vec<&Room> {
    let mut rooms: Vec<&Room> = graph.rooms().map(|(_, r)| r).collect();
    rooms.sort_by_key(|r| (r.zone.is_some(), r.parent.is_some()));
    rooms
}

/// `@@ A-->B B-->A ...` wrapped to [`WRAP_WIDTH`] columns of content.
pub fn edge_summary(edges: &[String]) -> Vec<String> {
    let text = edges.join(" ");
    if text.is_empty() {
        return vec![SUMMARY_PREFIX.to_string()];
    }
    let options = WrapOptions::new(WRAP_WIDTH + SUMMARY_PREFIX.len())
        .initial_indent(SUMMARY_PREFIX)
        .subsequent_indent(SUMMARY_PREFIX)
        .word_separator(WordSeparator::AsciiSpace)
        .word_splitter(WordSplitter::NoHyphenation)
        .wrap_algorithm(WrapAlgorithm::FirstFit)
        .break_words(true);
    textwrap::wrap(&text, options).into_iter().map(|line| line.into_owned()).collect()
}

/// Placeholder attributes for every level of nested attribute bases.
fn attribute_trees(rooms: &[&Room]) -> Vec<String> {
    let mut bases: Vec<&str> = rooms.iter().map(|r| r.attr_base.as_str()).collect();
    bases.sort_unstable();
    bases.dedup();

    let mut made = IndexSet::new();
    for base in bases {
        let mut pieces: Vec<&str> = base.split(TREE_SEPARATOR).collect();
        while pieces.last().is_some_and(|p| p.is_empty()) {
            pieces.pop();
        }
        if pieces.len() < 2 {
            continue;
        }
        let sep = TREE_SEPARATOR.to_string();
        for depth in 1..=pieces.len() {
            made.insert(format!("&{} me=Placeholder", pieces[..depth].join(&sep)));
        }
    }
    if made.is_empty() {
        return Vec::new();
    }
    let mut out = vec!["think Constructing attribute trees (legacy support)".to_string()];
    out.extend(made);
    out
}

/// Create things for parents and zones that never became rooms, recording
/// their slots.
fn materialize<'g>(graph: &'g Graph, slots: &mut HashMap<&'g str, String>, out: &mut Vec<String>) {
    for (kind, header) in [
        (PendingKind::Parent, "think Creating room & exit parents as things"),
        (PendingKind::Zone, "think Creating room & exit zones as things"),
    ] {
        let fresh: Vec<(&str, &Placeholder)> = graph
            .pending(kind)
            .iter()
            .filter_map(|(token, entry)| match entry {
                Pending::Placeholder(p) if !slots.contains_key(token.as_str()) => Some((token.as_str(), p)),
                _ => None,
            })
            .collect();
        if fresh.is_empty() {
            continue;
        }
        out.push(header.to_string());
        for (token, placeholder) in fresh {
            let slot = format!("{}{}", placeholder.attr_base, placeholder.id);
            debug!("materializing {token} as {slot}");
            out.push(format!("@set me={slot}:[create({},10)]", placeholder.name));
            slots.insert(token, slot);
        }
    }
}

fn link(slots: &HashMap<&str, String>, reference: &Reference) -> Result<String, GenerateError> {
    match reference {
        Reference::Raw(raw) => Ok(raw.clone()),
        Reference::Id(token) => slots
            .get(token.as_str())
            .map(|slot| format!("[v({slot})]"))
            .ok_or_else(|| GenerateError::UnresolvedReference(token.clone())),
    }
}

fn push_buffer(out: &mut Vec<String>, buffer: &str) {
    if !buffer.is_empty() {
        out.extend(buffer.split('\n').map(str::to_string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DEFAULT_ATTR_BASE;

    #[test]
    fn summary_wraps_at_width() {
        assert_eq!(edge_summary(&[]), vec!["@@ "]);
        assert_eq!(edge_summary(&["A-->B".into(), "B-->A".into()]), vec!["@@ A-->B B-->A"]);

        let edges: Vec<String> = (0..12).map(|i| format!("Room_{i:02}-->Room_{:02}", i + 1)).collect();
        let lines = edge_summary(&edges);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.starts_with("@@ "));
            assert!(line.len() <= WRAP_WIDTH + 3, "{line}");
        }
        let rejoined: Vec<&str> = lines.iter().map(|l| &l[3..]).collect();
        assert_eq!(rejoined.join(" "), edges.join(" "));
    }

    #[test]
    fn rooms_ordered_by_zone_then_parent() {
        let mut g = Graph::new();
        for (name, parent, zone) in [("Z", false, true), ("P", true, false), ("Plain", false, false), ("Both", true, true)] {
            let id = g.add_room(&format!("\"{name}\""), DEFAULT_ATTR_BASE);
            let room = g.room_mut(id);
            room.parent = parent.then(|| Reference::Raw("#1".into()));
            room.zone = zone.then(|| Reference::Raw("#2".into()));
        }
        let names: Vec<_> = ordered_rooms(&g).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Plain", "P", "Z", "Both"]);
    }

    #[test]
    fn parented_parent_is_dug_after_its_children() {
        let mut g = Graph::new();
        let child = g.add_room("\"A\"", DEFAULT_ATTR_BASE);
        let parent = g.add_room("\"P\"", DEFAULT_ATTR_BASE);
        g.room_mut(child).parent = Some(Reference::Id("\"P\"".into()));
        g.room_mut(parent).parent = Some(Reference::Id("\"Q\"".into()));
        g.register_pending(PendingKind::Parent, "\"Q\"", DEFAULT_ATTR_BASE);
        let out = generate(&g, &mut Vec::new()).unwrap();
        let link = out.iter().position(|l| l == "@parent here=[v(ROOM.P)]").unwrap();
        let stored = out.iter().position(|l| l == "@set me=ROOM.P:%l").unwrap();
        // known gap of the two-key ordering: the link is emitted first
        assert!(link < stored);
    }

    #[test]
    fn nested_attribute_bases_build_trees_once() {
        let mut g = Graph::new();
        g.add_room("\"A\"", "AREA`NORTH`");
        g.add_room("\"B\"", "AREA`SOUTH`");
        g.add_room("\"C\"", DEFAULT_ATTR_BASE);
        let rooms = ordered_rooms(&g);
        assert_eq!(
            attribute_trees(&rooms),
            vec![
                "think Constructing attribute trees (legacy support)",
                "&AREA me=Placeholder",
                "&AREA`NORTH me=Placeholder",
                "&AREA`SOUTH me=Placeholder",
            ]
        );
    }

    #[test]
    fn placeholders_created_once_and_linked() {
        let mut g = Graph::new();
        g.register_pending(PendingKind::Parent, "\"Master\"", "PARENT.");
        g.register_pending(PendingKind::Zone, "\"Master\"", "PARENT.");
        g.register_pending(PendingKind::Zone, "\"Zone Thing\"", "ZONE.");
        let a = g.add_room("\"A\"", DEFAULT_ATTR_BASE);
        g.room_mut(a).parent = Some(Reference::Id("\"Master\"".into()));
        g.room_mut(a).zone = Some(Reference::Id("\"Zone Thing\"".into()));
        g.add_exit("\"Loop\"", "Loop".into(), a, a);

        let mut diagnostics = Vec::new();
        let out = generate(&g, &mut diagnostics).unwrap();
        let creates: Vec<_> = out.iter().filter(|l| l.contains("create(")).collect();
        assert_eq!(
            creates,
            vec![
                "@set me=PARENT.Master:[create(Master,10)]",
                "@set me=ZONE.Zone_Thing:[create(Zone Thing,10)]"
            ]
        );
        assert!(out.contains(&"@parent here=[v(PARENT.Master)]".to_string()));
        assert!(out.contains(&"@chzone here=[v(ZONE.Zone_Thing)]".to_string()));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn room_without_exits_is_reported() {
        let mut g = Graph::new();
        let attic = g.add_room("\"Attic\"", DEFAULT_ATTR_BASE);
        g.room_mut(attic).flags = Some("dark".into());
        g.room_mut(attic).description = Some("Dusty; (very)".into());
        let mut diagnostics = Vec::new();
        let out = generate(&g, &mut diagnostics).unwrap();
        assert_eq!(
            out,
            vec![
                "@@ ",
                "think Digging Rooms",
                "@dig/teleport Attic",
                "@set me=ROOM.Attic:%l",
                "@set here=dark",
                "@describe here=Dusty\\; \\(very\\)",
                "think Linking Rooms",
                "think WARNING: Creating room with no exits: Attic",
            ]
        );
        assert_eq!(diagnostics[0].to_string(), "WARNING: Creating room with no exits: Attic");
    }

    #[test]
    fn exit_follow_ups_use_match_name() {
        let mut g = Graph::new();
        let a = g.add_room("\"A\"", DEFAULT_ATTR_BASE);
        let b = g.add_room("\"B\"", DEFAULT_ATTR_BASE);
        let e = g.add_exit("\"North\"", "<N>orth;n;north".into(), a, b).unwrap();
        g.exit_mut(e).flags = Some("transparent".into());
        g.exit_mut(e).parent = Some(Reference::Raw("#77".into()));
        g.exit_mut(e).append_buffer("\n@desc north=A door.");
        let out = generate(&g, &mut Vec::new()).unwrap();
        let tail: Vec<_> = out.iter().skip_while(|l| *l != "think Linking Rooms").skip(1).take(5).collect();
        assert_eq!(
            tail,
            vec![
                "@teleport [v(ROOM.A)]",
                "@open <N>orth;n;north=[v(ROOM.B)]",
                "@set north=transparent",
                "@desc north=A door.",
                "@parent north=#77",
            ]
        );
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let mut g = Graph::new();
        let a = g.add_room("\"A\"", DEFAULT_ATTR_BASE);
        g.room_mut(a).parent = Some(Reference::Id("\"Nobody\"".into()));
        let err = generate(&g, &mut Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "Unresolved reference \"Nobody\"");
    }
}
