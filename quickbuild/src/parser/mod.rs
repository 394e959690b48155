//! Line classifier: turns quickbuild source text into the opcode stream.
//!
//! The generic engine lives in [`machine`]; the quickbuild rule set in
//! `grammar`. One machine is shared by every source of a run, so a block left
//! open in the configuration file carries on into the main input.

use std::sync::Arc;

use log::debug;

use crate::diagnostics::Location;
use crate::opcode::{Instruction, Opcode};

mod grammar;
mod helpers;
pub mod machine;

pub use grammar::{Grammar, ModeTag, ParseMode, grammar};

/// Classify every line of `source`, numbering lines from 1.
pub fn classify(machine: &mut Grammar, file: &str, source: &str) -> Vec<Instruction> {
    let file: Arc<str> = Arc::from(file);
    let mut out = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let location = Location::new(Arc::clone(&file), index + 1);
        for opcode in machine.invoke(line, &location) {
            out.push(Instruction {
                location: location.clone(),
                opcode,
            });
        }
    }
    let meaningful = out.iter().filter(|i| i.opcode != Opcode::Nop).count();
    debug!("classified '{file}': {} instructions ({meaningful} non-NOP)", out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_follow_source_lines() {
        let mut m = grammar().unwrap();
        let src = "# header\n\n\"Up\" : \"Cellar\" -> \"Kitchen\"\r\nbogus line\n";
        let program = classify(&mut m, "area.qb", src);
        let lines: Vec<_> = program
            .iter()
            .filter(|i| i.opcode != Opcode::Nop)
            .map(|i| i.location.line)
            .collect();
        assert_eq!(lines, vec![3, 3, 3, 4]);
        assert_eq!(&*program[0].location.file, "area.qb");
        assert_eq!(
            program.last().map(|i| &i.opcode),
            Some(&Opcode::Error("Unrecognized command.".into()))
        );
    }

    #[test]
    fn mode_carries_across_sources() {
        let mut m = grammar().unwrap();
        classify(&mut m, "qb.cfg", "IN \"Lobby\"\n");
        let program = classify(&mut m, "main.qb", "@emit hi\nENDIN\n");
        assert_eq!(
            program[0].opcode,
            Opcode::BufferRoom {
                room: "\"Lobby\"".into(),
                text: "\n@emit hi".into(),
            }
        );
        assert_eq!(m.state(), &ParseMode::Default);
    }
}
