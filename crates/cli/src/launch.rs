//! Hand-off from the launcher to the engine that actually runs scripts.

use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::scan::{LaunchOptions, ModuleMode};

/// Scanner output resolved into what the engine should do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LaunchPlan {
    pub options: LaunchOptions,
    /// Entry script, when no expression was given.
    pub script: Option<String>,
    /// Evaluation mode for the entry script.
    pub script_mode: ModuleMode,
    /// Everything from the cursor on, script name first.
    pub script_args: Vec<String>,
}

impl LaunchPlan {
    pub fn resolve(mut options: LaunchOptions, argv: &[String], cursor: usize) -> Self {
        let script_args: Vec<String> = argv.get(cursor..).unwrap_or_default().to_vec();

        let script = match options.expr {
            Some(_) => None,
            None => script_args.first().cloned(),
        };

        if options.empty_run == 0 && options.expr.is_none() && script.is_none() {
            options.interactive = true;
        }

        let script_mode = match &script {
            Some(path) => options.module.for_path(path),
            None => options.module,
        };

        tracing::debug!(
            script = script.as_deref().unwrap_or("-"),
            interactive = options.interactive,
            "resolved launch plan"
        );

        Self {
            options,
            script,
            script_mode,
            script_args,
        }
    }
}

/// Arguments forwarded to the bytecode compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileRequest {
    pub args: Vec<String>,
}

impl CompileRequest {
    pub fn new(args: &[String]) -> Self {
        Self {
            args: args.to_vec(),
        }
    }
}

/// The engine side of the launcher.
///
/// Implementations return the process exit status.
pub trait Runtime {
    fn launch(&mut self, plan: &LaunchPlan) -> Result<i32>;

    fn compile(&mut self, request: &CompileRequest) -> Result<i32>;
}

/// A runtime that prints what it would do as JSON and succeeds.
pub struct DryRun<W> {
    out: W,
}

impl DryRun<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> DryRun<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<T: Serialize>(&mut self, value: &T) -> Result<i32> {
        let json = serde_json::to_string_pretty(value).context("failed to serialize plan")?;
        writeln!(self.out, "{json}").context("failed to write plan")?;
        Ok(0)
    }
}

impl<W: Write> Runtime for DryRun<W> {
    fn launch(&mut self, plan: &LaunchPlan) -> Result<i32> {
        tracing::debug!("dry-run launch");
        self.emit(plan)
    }

    fn compile(&mut self, request: &CompileRequest) -> Result<i32> {
        tracing::debug!(args = request.args.len(), "dry-run compile");
        self.emit(request)
    }
}
