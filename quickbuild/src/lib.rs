//! quickbuild: compile a compact area description into PennMUSH softcode.
//!
//! A quickbuild file names rooms and the exits between them:
//!
//! ```text
//! "Up" : "Cellar" <-> "Kitchen"
//! REVERSE "Up" "Down"
//! IN "Kitchen"
//! @desc here=Smells of bread.
//! ENDIN
//! ```
//!
//! The pipeline has three passes:
//! - [`parser`] classifies each input line into an [`opcode::Instruction`];
//! - [`builder`] folds the instruction stream into a [`graph::Graph`];
//! - [`codegen`] orders the rooms and emits `@dig`/`@open` commands that a
//!   builder character can paste into the game.
//!
//! [`Compiler`] drives all three over any number of sources (a configuration
//! file followed by the area files, usually).

pub mod builder;
pub mod codegen;
pub mod diagnostics;
pub mod escape;
pub mod graph;
pub mod opcode;
pub mod parser;

use log::debug;
use thiserror::Error;

use crate::builder::{BuildError, build_graph};
use crate::codegen::{GenerateError, generate};
use crate::diagnostics::Diagnostic;
use crate::graph::Graph;
use crate::opcode::Instruction;
use crate::parser::machine::MachineError;
use crate::parser::{Grammar, classify, grammar};

/// Name of the configuration file read before the area files.
pub const DEFAULT_CONFIG_FILE: &str = "qb.cfg";

/// Switches that change how the graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// `REVERSE "A" "B"` also makes `"A"` the reverse of `"B"`.
    pub bidirectional_reverse: bool,
    /// Expand `<N>orth` style exit names into aliases.
    pub brackets: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            bidirectional_reverse: true,
            brackets: true,
        }
    }
}

/// Any fatal error a run can stop on.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Result of a successful run.
#[derive(Debug)]
pub struct Output {
    pub commands: Vec<String>,
    pub graph: Graph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Accumulates sources through one line classifier, then builds and
/// generates in [`Compiler::finish`].
pub struct Compiler {
    options: Options,
    machine: Grammar,
    program: Vec<Instruction>,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    /// # Errors
    /// Fails if a classifier pattern does not compile.
    pub fn new(options: Options) -> Result<Self, Error> {
        Ok(Self {
            options,
            machine: grammar()?,
            program: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    /// Classify `text`, reporting locations against `name`.
    pub fn add_source(&mut self, name: &str, text: &str) {
        let instructions = classify(&mut self.machine, name, text);
        debug!("{name}: {} instructions queued", instructions.len());
        self.program.extend(instructions);
    }

    /// Instructions classified so far.
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Warnings gathered so far. After a failed [`Compiler::finish`] these are
    /// the warnings seen before the fatal error.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Build the graph and generate commands.
    ///
    /// # Errors
    /// Returns the first fatal build or generation error.
    pub fn finish(&mut self) -> Result<Output, Error> {
        let graph = build_graph(&self.program, self.options, &mut self.diagnostics)?;
        let commands = generate(&graph, &mut self.diagnostics)?;
        Ok(Output {
            commands,
            graph,
            diagnostics: std::mem::take(&mut self.diagnostics),
        })
    }
}

/// Compile a single source in one call.
///
/// # Errors
/// See [`Compiler::finish`].
pub fn compile_str(name: &str, source: &str, options: Options) -> Result<Output, Error> {
    let mut compiler = Compiler::new(options)?;
    compiler.add_source(name, source);
    compiler.finish()
}
