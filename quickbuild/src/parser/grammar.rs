//! The quickbuild line grammar, expressed as rules over the state machine.
//!
//! Rule order is precedence: blank lines, MUSH comments, `>` escapes and
//! `#` comments first, then the root-level directives, the room chain, the
//! block openers and closers. Anything left over is buffered as free text
//! inside a block, and is an error outside one.

use regex::Regex;

use super::helpers::{buffer_prefix, escaped_line};
use super::machine::{LineMatch, MachineError, Mode, Rule, StateMachine};
use crate::diagnostics::Location;
use crate::opcode::{Opcode, Reference};

/// A quoted room or exit token with an optional type suffix: `"Name"` or `"Name".kind`.
const TOKEN: &str = r#"".*"(?:[^->\s]\S*)?"#;
/// Shortest-match version of [`TOKEN`] for lines holding several tokens.
const LAZY_TOKEN: &str = r#"".*?"(?:[^->\s]\S*)?"#;

/// Lexical mode of the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMode {
    Default,
    /// Inside `IN "room"` ... `ENDIN`.
    In {
        room: String,
        /// Where the most recent `>` line was read.
        escape_line: Option<Location>,
    },
    /// Inside `ON "exit" FROM "room"` ... `ENDON`.
    On {
        room: String,
        exit: String,
        escape_line: Option<Location>,
    },
    /// Entered after a grammar error; nothing further is classified.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTag {
    Default,
    In,
    On,
    Error,
}

impl ModeTag {
    pub fn label(self) -> &'static str {
        match self {
            ModeTag::Default => "default",
            ModeTag::In => "in",
            ModeTag::On => "on",
            ModeTag::Error => "error",
        }
    }
}

impl Mode for ParseMode {
    type Tag = ModeTag;

    fn tag(&self) -> ModeTag {
        match self {
            ParseMode::Default => ModeTag::Default,
            ParseMode::In { .. } => ModeTag::In,
            ParseMode::On { .. } => ModeTag::On,
            ParseMode::Error => ModeTag::Error,
        }
    }
}

pub type Grammar = StateMachine<ParseMode, Opcode>;
type GrammarRule = Rule<ParseMode, Opcode>;
type Step = (ParseMode, Vec<Opcode>);

/// Build the classifier, starting in [`ParseMode::Default`].
///
/// # Errors
/// Only fails if one of the built-in patterns does not compile.
pub fn grammar() -> Result<Grammar, MachineError> {
    let mut machine = StateMachine::new(ParseMode::Default);

    machine.push(
        GrammarRule::new("blank", r"^\s*$")?
            .on(ModeTag::Default, nop)
            .on(ModeTag::In, nop)
            .on(ModeTag::On, nop),
    );
    machine.push(GrammarRule::new("@@", r"^@@")?.on(ModeTag::In, nop).on(ModeTag::On, nop));
    machine.push(
        GrammarRule::new(">", r"^>(.*)$")?
            .on(ModeTag::In, escaped_text)
            .on(ModeTag::On, escaped_text),
    );
    machine.push(
        GrammarRule::new("#", r"^#.*$")?
            .on(ModeTag::Default, nop)
            .on(ModeTag::In, buffer_line)
            .on(ModeTag::On, buffer_line),
    );

    machine.push(directive("ATTR BASE", r"(?i)^ATTR BASE:\s*(.*)$", |m| {
        Opcode::AttrBase(group(m, 1))
    })?);
    machine.push(directive(
        "ALIAS",
        &format!(r#"(?i)^ALIAS\s*:?\s*({TOKEN})\s*"(.*)""#),
        |m| Opcode::Alias {
            exit: group(m, 1),
            aliases: group(m, 2),
        },
    )?);
    machine.push(directive(
        "REVERSE",
        &format!(r"(?i)^REVERSE\s*:?\s*({TOKEN})\s*({TOKEN})"),
        |m| Opcode::Reverse {
            exit: group(m, 1),
            reverse: group(m, 2),
        },
    )?);
    machine.push(reference_directive("ROOM PARENT", Opcode::RoomParent)?);
    machine.push(reference_directive("ROOM ZONE", Opcode::RoomZone)?);
    machine.push(reference_directive("EXIT PARENT", Opcode::ExitParent)?);
    machine.push(reference_directive("EXIT ZONE", Opcode::ExitZone)?);
    machine.push(directive("ROOM FLAGS", r"(?i)^ROOM FLAGS:\s*(.*)$", |m| {
        Opcode::RoomFlags(group(m, 1).trim().to_string())
    })?);
    machine.push(directive("EXIT FLAGS", r"(?i)^EXIT FLAGS:\s*(.*)$", |m| {
        Opcode::ExitFlags(group(m, 1).trim().to_string())
    })?);
    machine.push(directive(
        "DESC",
        &format!(r"(?i)^DESC(?:RIBE)?\s+({LAZY_TOKEN})\s*=\s*(.*)$"),
        |m| Opcode::Describe {
            room: group(m, 1),
            text: group(m, 2),
        },
    )?);
    machine.push(room_chain()?);

    machine.push(
        GrammarRule::new("IN", &format!(r"(?i)^IN\s+({TOKEN})\s*$"))?
            .on(ModeTag::Default, |_, lm| {
                let mode = ParseMode::In {
                    room: group(lm, 1),
                    escape_line: None,
                };
                (mode, vec![Opcode::Nop])
            })
            .otherwise(|s, _| warn_outside_default("IN", s)),
    );
    machine.push(
        GrammarRule::new("ON", &format!(r"(?i)^ON\s+({TOKEN})\s+FROM\s+({TOKEN})\s*$"))?
            .on(ModeTag::Default, |_, lm| {
                let mode = ParseMode::On {
                    room: group(lm, 2),
                    exit: group(lm, 1),
                    escape_line: None,
                };
                (mode, vec![Opcode::Nop])
            })
            .otherwise(|s, _| warn_outside_default("ON", s)),
    );
    machine.push(
        GrammarRule::new("ENDIN", r"(?i)^ENDIN\s*$")?
            .on(ModeTag::In, |_, _| (ParseMode::Default, vec![Opcode::Nop]))
            .on(ModeTag::Default, |_, _| {
                (ParseMode::Error, vec![Opcode::Error("ENDIN outside of IN-block.".into())])
            })
            .on(ModeTag::On, |_, _| {
                (ParseMode::Default, vec![Opcode::Warning("ENDIN inside ON-block.".into())])
            }),
    );
    machine.push(
        GrammarRule::new("ENDON", r"(?i)^ENDON\s*$")?
            .on(ModeTag::On, |_, _| (ParseMode::Default, vec![Opcode::Nop]))
            .on(ModeTag::Default, |_, _| {
                (ParseMode::Error, vec![Opcode::Error("ENDON outside of ON-block.".into())])
            })
            .on(ModeTag::In, |_, _| {
                (ParseMode::Default, vec![Opcode::Warning("ENDON inside IN-block.".into())])
            }),
    );

    machine.catch_all(ModeTag::Default, |_, _| {
        (ParseMode::Error, vec![Opcode::Error("Unrecognized command.".into())])
    });
    machine.catch_all(ModeTag::In, buffer_line);
    machine.catch_all(ModeTag::On, buffer_line);
    Ok(machine)
}

fn group(m: &LineMatch<'_>, index: usize) -> String {
    m.group(index).unwrap_or_default().to_string()
}

fn nop(s: &ParseMode, _: &LineMatch<'_>) -> Step {
    (s.clone(), vec![Opcode::Nop])
}

fn warn_outside_default(name: &str, s: &ParseMode) -> Option<Vec<Opcode>> {
    match s.tag() {
        ModeTag::Default | ModeTag::Error => None,
        tag => Some(vec![Opcode::Warning(format!(
            "{name} matched inside \"{}\" state.",
            tag.label()
        ))]),
    }
}

/// A root-level directive: applied in default mode, warned about inside blocks.
fn directive(
    name: &'static str,
    pattern: &str,
    build: impl Fn(&LineMatch<'_>) -> Opcode + 'static,
) -> Result<GrammarRule, MachineError> {
    Ok(GrammarRule::new(name, pattern)?
        .on(ModeTag::Default, move |s, m| (s.clone(), vec![build(m)]))
        .otherwise(move |s, _| warn_outside_default(name, s)))
}

/// `KEYWORD:` followed by nothing (clear), `#<digits>` (raw) or a token (id).
fn reference_directive(
    keyword: &'static str,
    build: fn(Option<Reference>) -> Opcode,
) -> Result<GrammarRule, MachineError> {
    let pattern = format!(r"(?i)^{keyword}:\s*(?:(#\d+)|({TOKEN}))?\s*$");
    directive(keyword, &pattern, move |m| {
        let reference = match (m.group(1), m.group(2)) {
            (Some(raw), _) => Some(Reference::Raw(raw.to_string())),
            (None, Some(id)) => Some(Reference::Id(id.to_string())),
            (None, None) => None,
        };
        build(reference)
    })
}

/// `"Exit" : "A" -> "B" <-> "C" ...`
fn room_chain() -> Result<GrammarRule, MachineError> {
    const NAME: &str = "room chain";
    let hop_pattern = format!(r"\s*(<?->)\s*({LAZY_TOKEN})");
    let hop = Regex::new(&hop_pattern).map_err(|source| MachineError::Pattern {
        rule: NAME.to_string(),
        source,
    })?;
    let pattern = format!(r"^({LAZY_TOKEN})\s*:\s*(({LAZY_TOKEN})(?:{hop_pattern})+)$");
    Ok(GrammarRule::new(NAME, &pattern)?
        .on(ModeTag::Default, move |s, m| {
            let exit = group(m, 1);
            let chain = m.group(2).unwrap_or_default();
            let first = m.group(3).unwrap_or_default();
            let mut last = first.to_string();
            let mut ops = vec![Opcode::CreateRoom(last.clone())];
            for caps in hop.captures_iter(&chain[first.len()..]) {
                let next = caps[2].to_string();
                ops.push(Opcode::CreateRoom(next.clone()));
                ops.push(Opcode::CreateExit {
                    exit: exit.clone(),
                    from: last.clone(),
                    to: next.clone(),
                });
                if &caps[1] == "<->" {
                    ops.push(Opcode::CreateReverseExit {
                        exit: exit.clone(),
                        from: last.clone(),
                        to: next.clone(),
                    });
                }
                last = next;
            }
            (s.clone(), ops)
        })
        .otherwise(|s, _| warn_outside_default(NAME, s)))
}

fn buffer_line(s: &ParseMode, m: &LineMatch<'_>) -> Step {
    let text = buffer_prefix(m.line);
    let op = match s {
        ParseMode::In { room, .. } => Opcode::BufferRoom {
            room: room.clone(),
            text,
        },
        ParseMode::On { room, exit, .. } => Opcode::BufferExit {
            room: room.clone(),
            exit: exit.clone(),
            text,
        },
        ParseMode::Default | ParseMode::Error => Opcode::Nop,
    };
    (s.clone(), vec![op])
}

fn escaped_text(s: &ParseMode, m: &LineMatch<'_>) -> Step {
    let here = m.location;
    let rest = m.group(1).unwrap_or_default();
    // only consecutive lines of the same source are joined
    let adjacent = |prev: &Option<Location>| {
        matches!(prev, Some(p) if p.file == here.file && p.line + 1 == here.line)
    };
    match s {
        ParseMode::In { room, escape_line } => (
            ParseMode::In {
                room: room.clone(),
                escape_line: Some(here.clone()),
            },
            vec![Opcode::BufferRoom {
                room: room.clone(),
                text: escaped_line(rest, adjacent(escape_line)),
            }],
        ),
        ParseMode::On {
            room,
            exit,
            escape_line,
        } => (
            ParseMode::On {
                room: room.clone(),
                exit: exit.clone(),
                escape_line: Some(here.clone()),
            },
            vec![Opcode::BufferExit {
                room: room.clone(),
                exit: exit.clone(),
                text: escaped_line(rest, adjacent(escape_line)),
            }],
        ),
        ParseMode::Default | ParseMode::Error => (s.clone(), Vec::new()),
    }
}
