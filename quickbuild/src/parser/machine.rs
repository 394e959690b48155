//! A small pattern-driven state machine over lines of text.
//!
//! The machine holds a current mode and an ordered list of rules. Each rule
//! pairs a regex with handlers keyed by mode tag. For every line the rules are
//! scanned in registration order; the first rule whose pattern matches *and*
//! which claims the line for the current mode decides the outcome. A rule
//! that matches without a handler for the mode may still claim the line
//! through its fallback, otherwise scanning continues with the next rule.
//! Lines no rule claims go to the catch-all handler registered for the mode,
//! or are dropped when there is none.

use std::fmt;

use log::trace;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::diagnostics::Location;

/// Machine state. The tag selects handlers; the value carries mode data.
pub trait Mode {
    type Tag: Copy + Eq + fmt::Debug;

    fn tag(&self) -> Self::Tag;
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("invalid pattern for rule '{rule}': {source}")]
    Pattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// The line being handled, with its captures when a rule pattern matched.
pub struct LineMatch<'a> {
    pub line: &'a str,
    pub captures: Option<Captures<'a>>,
    pub location: &'a Location,
}

impl<'a> LineMatch<'a> {
    /// Text of capture group `index`, if the group took part in the match.
    pub fn group(&self, index: usize) -> Option<&'a str> {
        self.captures.as_ref().and_then(|c| c.get(index)).map(|m| m.as_str())
    }
}

/// Returns the next mode and the instructions produced for the line.
pub type Handler<S, O> = Box<dyn Fn(&S, &LineMatch<'_>) -> (S, Vec<O>)>;

/// Called when a rule matches but has no handler for the current mode.
/// `Some` claims the line without changing mode; `None` lets later rules try.
pub type Fallback<S, O> = Box<dyn Fn(&S, &LineMatch<'_>) -> Option<Vec<O>>>;

pub struct Rule<S: Mode, O> {
    name: String,
    pattern: Regex,
    handlers: Vec<(S::Tag, Handler<S, O>)>,
    fallback: Option<Fallback<S, O>>,
}

impl<S: Mode, O> Rule<S, O> {
    /// # Errors
    /// Returns `MachineError::Pattern` if `pattern` is not a valid regex.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, MachineError> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|source| MachineError::Pattern {
            rule: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            pattern,
            handlers: Vec::new(),
            fallback: None,
        })
    }

    /// Handle matching lines while the machine is in mode `tag`.
    #[must_use]
    pub fn on(mut self, tag: S::Tag, handler: impl Fn(&S, &LineMatch<'_>) -> (S, Vec<O>) + 'static) -> Self {
        self.handlers.push((tag, Box::new(handler)));
        self
    }

    #[must_use]
    pub fn otherwise(mut self, fallback: impl Fn(&S, &LineMatch<'_>) -> Option<Vec<O>> + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn handler(&self, tag: S::Tag) -> Option<&Handler<S, O>> {
        self.handlers.iter().find(|(t, _)| *t == tag).map(|(_, h)| h)
    }
}

pub struct StateMachine<S: Mode, O> {
    state: S,
    rules: Vec<Rule<S, O>>,
    catch_all: Vec<(S::Tag, Handler<S, O>)>,
}

impl<S: Mode, O> StateMachine<S, O> {
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            rules: Vec::new(),
            catch_all: Vec::new(),
        }
    }

    /// Append a rule; it has lower precedence than every rule pushed before it.
    pub fn push(&mut self, rule: Rule<S, O>) {
        self.rules.push(rule);
    }

    /// Handle lines no rule claims while in mode `tag`.
    pub fn catch_all(&mut self, tag: S::Tag, handler: impl Fn(&S, &LineMatch<'_>) -> (S, Vec<O>) + 'static) {
        self.catch_all.push((tag, Box::new(handler)));
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Rule::name)
    }

    /// Feed one line through the machine.
    pub fn invoke(&mut self, line: &str, location: &Location) -> Vec<O> {
        let tag = self.state.tag();
        for rule in &self.rules {
            let Some(captures) = rule.pattern.captures(line) else {
                continue;
            };
            let m = LineMatch {
                line,
                captures: Some(captures),
                location,
            };
            if let Some(handler) = rule.handler(tag) {
                trace!("{location}: rule '{}' in {tag:?}", rule.name);
                let (next, out) = handler(&self.state, &m);
                self.state = next;
                return out;
            }
            if let Some(fallback) = &rule.fallback {
                if let Some(out) = fallback(&self.state, &m) {
                    trace!("{location}: rule '{}' fallback in {tag:?}", rule.name);
                    return out;
                }
            }
        }
        if let Some((_, handler)) = self.catch_all.iter().find(|(t, _)| *t == tag) {
            let m = LineMatch {
                line,
                captures: None,
                location,
            };
            let (next, out) = handler(&self.state, &m);
            self.state = next;
            return out;
        }
        trace!("{location}: no rule claimed line in {tag:?}; dropped");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Toy {
        Idle,
        Open(u32),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ToyTag {
        Idle,
        Open,
    }

    impl Mode for Toy {
        type Tag = ToyTag;

        fn tag(&self) -> ToyTag {
            match self {
                Toy::Idle => ToyTag::Idle,
                Toy::Open(_) => ToyTag::Open,
            }
        }
    }

    fn loc(line: usize) -> Location {
        Location::new("toy", line)
    }

    fn toy_machine() -> StateMachine<Toy, String> {
        let mut m = StateMachine::new(Toy::Idle);
        m.push(
            Rule::new("open", r"^open (\d+)$")
                .unwrap()
                .on(ToyTag::Idle, |_, lm| {
                    let n = lm.group(1).unwrap().parse().unwrap();
                    (Toy::Open(n), vec![format!("opened {n}")])
                })
                .otherwise(|_, _| Some(vec!["already open".to_string()])),
        );
        // Only claims lines while open; idle lines fall through to later rules.
        m.push(Rule::new("close", r"^close$").unwrap().on(ToyTag::Open, |s, _| {
            let Toy::Open(n) = s else { unreachable!() };
            (Toy::Idle, vec![format!("closed {n}")])
        }));
        m.push(Rule::new("any word", r"^\w+$").unwrap().on(ToyTag::Idle, |s: &Toy, lm: &LineMatch<'_>| {
            (s.clone(), vec![format!("word {}", lm.line)])
        }));
        m.catch_all(ToyTag::Open, |s, lm| (s.clone(), vec![format!("text {}", lm.line)]));
        m
    }

    #[test]
    fn first_rule_with_handler_wins() {
        let mut m = toy_machine();
        assert_eq!(m.invoke("open 7", &loc(1)), vec!["opened 7"]);
        assert_eq!(m.state(), &Toy::Open(7));
        // "close" also matches "any word"; the earlier rule takes it
        assert_eq!(m.invoke("close", &loc(2)), vec!["closed 7"]);
        assert_eq!(m.state(), &Toy::Idle);
    }

    #[test]
    fn rule_without_handler_yields_to_next_rule() {
        let mut m = toy_machine();
        assert_eq!(m.invoke("close", &loc(1)), vec!["word close"]);
        assert_eq!(m.state(), &Toy::Idle);
    }

    #[test]
    fn fallback_claims_line_without_changing_mode() {
        let mut m = toy_machine();
        m.invoke("open 1", &loc(1));
        assert_eq!(m.invoke("open 2", &loc(2)), vec!["already open"]);
        assert_eq!(m.state(), &Toy::Open(1));
    }

    #[test]
    fn catch_all_and_dropped_lines() {
        let mut m = toy_machine();
        // idle has no catch-all: dropped
        assert!(m.invoke("two words", &loc(1)).is_empty());
        m.invoke("open 3", &loc(2));
        assert_eq!(m.invoke("two words", &loc(3)), vec!["text two words"]);
    }

    #[test]
    fn rule_order_is_registration_order() {
        let m = toy_machine();
        assert_eq!(m.rule_names().collect::<Vec<_>>(), vec!["open", "close", "any word"]);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = Rule::<Toy, String>::new("broken", "(unclosed").err().expect("pattern error");
        assert!(err.to_string().contains("broken"));
    }
}
