//! Intermediate instruction stream between the line classifier and the graph builder.
//!
//! Room and exit operands are source tokens exactly as written, quotes and
//! type suffix included (`"Red Room"`, `"Red Room".dark`).

use std::fmt;

use crate::diagnostics::Location;

/// A parent or zone target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A literal such as `#123`, emitted untouched.
    Raw(String),
    /// A room or thing token, looked up when the code is generated.
    Id(String),
}

impl Reference {
    pub fn as_str(&self) -> &str {
        match self {
            Reference::Raw(s) | Reference::Id(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    /// Fatal: the run stops at this instruction.
    Error(String),
    Warning(String),
    AttrBase(String),
    Alias {
        exit: String,
        aliases: String,
    },
    Reverse {
        exit: String,
        reverse: String,
    },
    /// `None` clears the sticky reference.
    RoomParent(Option<Reference>),
    RoomZone(Option<Reference>),
    ExitParent(Option<Reference>),
    ExitZone(Option<Reference>),
    RoomFlags(String),
    ExitFlags(String),
    Describe {
        room: String,
        text: String,
    },
    CreateRoom(String),
    CreateExit {
        exit: String,
        from: String,
        to: String,
    },
    /// Opens the registered reverse of `exit` from `to` back to `from`.
    CreateReverseExit {
        exit: String,
        from: String,
        to: String,
    },
    BufferRoom {
        room: String,
        text: String,
    },
    BufferExit {
        room: String,
        exit: String,
        text: String,
    },
}

/// An opcode paired with the input line that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub location: Location,
    pub opcode: Opcode,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.location, self.opcode)
    }
}
