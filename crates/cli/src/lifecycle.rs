//! Start/stop flow around a CLI invocation.
//!
//! The topology is fixed: `start` always passes through `version` and then
//! `onfailure`; every other transition ends in `stop`. Real command dispatch
//! is still to be wired in here.

use std::io::{self, Write};

use crate::config::CliConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Help,
    Version,
    OnSuccess,
    OnFailure,
    Stop,
}

impl Transition {
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Version => "version",
            Self::OnSuccess => "onsuccess",
            Self::OnFailure => "onfailure",
            Self::Stop => "stop",
        }
    }

    /// The transition after `self`, for a flow entered at `entry`.
    fn successor(self, entry: Transition) -> Option<Transition> {
        match (self, entry) {
            (Self::Stop, _) => None,
            (Self::Start, _) => Some(Self::Version),
            (Self::Version, Self::Start) => Some(Self::OnFailure),
            _ => Some(Self::Stop),
        }
    }
}

pub struct Lifecycle<'a, O, E> {
    config: &'a CliConfig,
    exit_status: i32,
    out: O,
    err: E,
    visited: Vec<Transition>,
}

impl<'a, O: Write, E: Write> Lifecycle<'a, O, E> {
    pub fn new(config: &'a CliConfig, out: O, err: E) -> Self {
        Self {
            config,
            exit_status: 0,
            out,
            err,
            visited: Vec::new(),
        }
    }

    /// Preset the exit status reported by `stop`.
    pub fn with_exit_status(mut self, status: i32) -> Self {
        self.exit_status = status;
        self
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Transitions entered so far, in order.
    pub fn visited(&self) -> &[Transition] {
        self.visited.as_slice()
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    /// Run the flow from `entry` until `stop`, returning the exit status.
    pub fn dispatch(&mut self, entry: Transition) -> io::Result<i32> {
        let mut state = entry;
        loop {
            self.enter(state)?;
            match state.successor(entry) {
                Some(next) => state = next,
                None => return Ok(self.exit_status),
            }
        }
    }

    fn enter(&mut self, state: Transition) -> io::Result<()> {
        tracing::debug!(transition = state.label(), "lifecycle");
        self.visited.push(state);
        match state {
            Transition::Stop => {
                // Stopping never reports success unless a status was set.
                if self.exit_status == 0 {
                    self.exit_status = 1;
                }
                writeln!(
                    self.err,
                    "{}: stop (exit status: {})",
                    self.config.program, self.exit_status
                )
            }
            other => writeln!(self.out, "{}", other.label()),
        }
    }
}

/// Start a fresh flow on the process's standard streams.
pub fn run(config: &CliConfig) -> io::Result<i32> {
    Lifecycle::new(config, io::stdout().lock(), io::stderr().lock()).dispatch(Transition::Start)
}
