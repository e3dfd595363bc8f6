//! Declarative command tree and help rendering.
//!
//! This crate is intentionally small and dependency-free so it can be reused by:
//! - the `ptkl` launcher (to render `--help` for the runtime and its subcommands)
//! - embedders that register their own commands on top of the launcher's tree
//!
//! The tree is built once at startup and then only read. Usage strings for
//! subcommands are synthesized lazily, the first time help is rendered.

pub mod tree {
    use std::cell::OnceCell;

    use super::usage::{self, UsageError};

    /// Size of the usage buffer owned by each command, terminator slot included.
    pub const DEFAULT_USAGE_CAPACITY: usize = 32;

    /// The kind of value an option binds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum OptionKind {
        String,
        #[default]
        Boolean,
        Integer,
    }

    /// A value bound to an option.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum OptionValue {
        String(String),
        Boolean(bool),
        Integer(i64),
    }

    impl OptionValue {
        /// Convert `raw` according to `kind`.
        ///
        /// Integers are parsed leniently: anything unparsable binds `0`.
        pub fn parse(kind: OptionKind, raw: &str) -> Self {
            match kind {
                OptionKind::String => Self::String(raw.to_string()),
                OptionKind::Boolean => {
                    let raw = raw.trim().to_ascii_lowercase();
                    Self::Boolean(!matches!(raw.as_str(), "false" | "0" | "no" | "off"))
                }
                OptionKind::Integer => Self::Integer(raw.trim().parse().unwrap_or(0)),
            }
        }
    }

    /// One flag of a command, e.g. `-e/--eval`.
    #[derive(Debug, Clone, Default)]
    pub struct OptionRecord {
        pub short: Option<char>,
        pub long: String,
        pub help: String,
        /// Whether the option may be given more than once.
        pub repeatable: bool,
        /// Hidden options are accepted but left out of help.
        pub hidden: bool,
        pub kind: OptionKind,
        values: Vec<OptionValue>,
    }

    impl OptionRecord {
        /// A boolean option known by its long name (without the leading `--`).
        pub fn new(long: impl Into<String>) -> Self {
            Self {
                long: long.into(),
                ..Default::default()
            }
        }

        pub fn short(mut self, short: char) -> Self {
            self.short = Some(short);
            self
        }

        pub fn help(mut self, help: impl Into<String>) -> Self {
            self.help = help.into();
            self
        }

        pub fn kind(mut self, kind: OptionKind) -> Self {
            self.kind = kind;
            self
        }

        pub fn repeatable(mut self) -> Self {
            self.repeatable = true;
            self
        }

        pub fn hidden(mut self) -> Self {
            self.hidden = true;
            self
        }

        /// Bind a raw value to this option.
        ///
        /// A repeatable option accumulates values; any other option keeps only
        /// the most recent one.
        pub fn bind(&mut self, raw: &str) -> &OptionValue {
            let value = OptionValue::parse(self.kind, raw);
            if !self.repeatable {
                self.values.clear();
            }
            self.values.push(value);
            &self.values[self.values.len() - 1]
        }

        /// The most recently bound value.
        pub fn value(&self) -> Option<&OptionValue> {
            self.values.last()
        }

        /// All bound values, in binding order.
        pub fn values(&self) -> &[OptionValue] {
            self.values.as_slice()
        }
    }

    /// A positional argument descriptor, rendered as `<name>` or `[name]`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ArgRecord {
        pub name: String,
        pub optional: bool,
    }

    impl ArgRecord {
        pub fn required(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                optional: false,
            }
        }

        pub fn optional(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                optional: true,
            }
        }
    }

    /// A named command with its own options, positional arguments and children.
    ///
    /// Registration appends; nothing is ever removed. Order of registration is
    /// the order of help output and of the synthesized usage string.
    #[derive(Debug, Clone)]
    pub struct CommandNode {
        pub name: String,
        pub help: String,
        usage_capacity: usize,
        usage: OnceCell<String>,
        args: Vec<ArgRecord>,
        options: Vec<OptionRecord>,
        subcommands: Vec<CommandNode>,
    }

    impl CommandNode {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                help: String::new(),
                usage_capacity: DEFAULT_USAGE_CAPACITY,
                usage: OnceCell::new(),
                args: Vec::new(),
                options: Vec::new(),
                subcommands: Vec::new(),
            }
        }

        pub fn help(mut self, help: impl Into<String>) -> Self {
            self.help = help.into();
            self
        }

        /// Set the size of this command's usage buffer (terminator slot included).
        pub fn usage_capacity(mut self, capacity: usize) -> Self {
            self.usage_capacity = capacity;
            self.usage = OnceCell::new();
            self
        }

        pub fn arg(mut self, arg: ArgRecord) -> Self {
            self.add_arg(arg);
            self
        }

        pub fn option(mut self, opt: OptionRecord) -> Self {
            self.add_option(opt);
            self
        }

        pub fn subcommand(mut self, cmd: CommandNode) -> Self {
            self.add_subcommand(cmd);
            self
        }

        /// Append a positional argument descriptor.
        pub fn add_arg(&mut self, arg: ArgRecord) -> &mut Self {
            self.args.push(arg);
            // The cached usage no longer reflects the argument list.
            self.usage = OnceCell::new();
            self
        }

        /// Append an option descriptor.
        pub fn add_option(&mut self, opt: OptionRecord) -> &mut Self {
            self.options.push(opt);
            self
        }

        /// Append a child command.
        pub fn add_subcommand(&mut self, cmd: CommandNode) -> &mut Self {
            self.subcommands.push(cmd);
            self
        }

        pub fn args(&self) -> &[ArgRecord] {
            self.args.as_slice()
        }

        pub fn options(&self) -> &[OptionRecord] {
            self.options.as_slice()
        }

        pub fn subcommands(&self) -> &[CommandNode] {
            self.subcommands.as_slice()
        }

        pub fn find_option(&self, long: &str) -> Option<&OptionRecord> {
            self.options.iter().find(|o| o.long == long)
        }

        pub fn find_option_mut(&mut self, long: &str) -> Option<&mut OptionRecord> {
            self.options.iter_mut().find(|o| o.long == long)
        }

        pub fn find_subcommand(&self, name: &str) -> Option<&CommandNode> {
            self.subcommands.iter().find(|c| c.name == name)
        }

        pub fn capacity(&self) -> usize {
            self.usage_capacity
        }

        /// The synthesized usage string, computed on first use.
        pub fn usage(&self) -> Result<&str, UsageError> {
            if let Some(cached) = self.usage.get() {
                return Ok(cached.as_str());
            }
            let rendered = usage::cmdusage(self, self.usage_capacity)?;
            Ok(self.usage.get_or_init(|| rendered).as_str())
        }
    }
}

pub mod usage {
    use std::fmt;

    use super::tree::{ArgRecord, CommandNode, OptionRecord};

    /// Minimum column width, for an aesthetic gap before the help column.
    pub const MIN_FIELD_WIDTH: usize = 10;

    const COLUMN_SEP: &str = "  ";
    const ELLIPSIS: &str = " ...";

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum UsageError {
        /// The buffer cannot hold even `name ...`.
        NoRoom { name: String, capacity: usize },
    }

    impl UsageError {
        pub fn message(&self) -> String {
            match self {
                Self::NoRoom { name, capacity } => {
                    format!("usage for '{name}' does not fit in {capacity} bytes")
                }
            }
        }
    }

    impl fmt::Display for UsageError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message())
        }
    }

    impl std::error::Error for UsageError {}

    /// The longest prefix of `s` that fits in `max` bytes without splitting a char.
    fn truncate_bytes(s: &str, max: usize) -> &str {
        if s.len() <= max {
            return s;
        }
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }

    fn brackets(arg: &ArgRecord) -> (char, char) {
        if arg.optional { ('[', ']') } else { ('<', '>') }
    }

    /// Synthesize the usage string for `cmd` in a buffer of `capacity` bytes.
    ///
    /// One byte of the buffer is reserved for a terminator, so at most
    /// `capacity - 1` bytes are available. The result is either the full
    /// `name <arg> [arg]` sequence or, once the available room is reached, the
    /// fixed form `name ...`. A partially rendered argument list is never
    /// returned.
    pub fn cmdusage(cmd: &CommandNode, capacity: usize) -> Result<String, UsageError> {
        let cap = capacity.saturating_sub(1);
        if cmd.name.len() >= cap {
            return ellipsis(&cmd.name, capacity);
        }

        let mut usage = String::with_capacity(capacity);
        usage.push_str(&cmd.name);
        for arg in cmd.args() {
            let (open, close) = brackets(arg);
            usage.push(' ');
            usage.push(open);
            usage.push_str(&arg.name);
            usage.push(close);
            if usage.len() >= cap {
                return ellipsis(&cmd.name, capacity);
            }
        }
        Ok(usage)
    }

    fn ellipsis(name: &str, capacity: usize) -> Result<String, UsageError> {
        let cap = capacity.saturating_sub(1);
        let room = cap.saturating_sub(ELLIPSIS.len());
        let prefix = truncate_bytes(name, room);
        // Not even the first character of the name fits.
        if room == 0 || (prefix.is_empty() && !name.is_empty()) {
            return Err(UsageError::NoRoom {
                name: name.to_string(),
                capacity,
            });
        }
        Ok(format!("{prefix}{ELLIPSIS}"))
    }

    fn visible_options(cmd: &CommandNode) -> impl Iterator<Item = &OptionRecord> {
        cmd.options().iter().filter(|o| !o.hidden)
    }

    /// Shared width of the left column for both the Options and Commands blocks.
    ///
    /// The widest of the floor, every visible long option name and every direct
    /// subcommand's usage string. Subcommand usage is synthesized here.
    pub fn column_width(cmd: &CommandNode) -> Result<usize, UsageError> {
        let mut width = MIN_FIELD_WIDTH;
        for opt in visible_options(cmd) {
            width = width.max(opt.long.chars().count());
        }
        for sub in cmd.subcommands() {
            width = width.max(sub.usage()?.chars().count());
        }
        Ok(width)
    }

    fn option_line(opt: &OptionRecord, width: usize) -> String {
        let short = match opt.short {
            Some(c) => format!("-{c}"),
            None => "  ".to_string(),
        };
        let line = format!(
            "{COLUMN_SEP}{short}{COLUMN_SEP}--{:<width$}{COLUMN_SEP}{}",
            opt.long,
            opt.help,
            width = width
        );
        format!("{}\n", line.trim_end())
    }

    fn command_line(usage: &str, help: &str, width: usize) -> String {
        let line = format!(
            "{COLUMN_SEP}{:<width$}{COLUMN_SEP}{}",
            usage,
            help,
            width = width + 2
        );
        format!("{}\n", line.trim_end())
    }

    /// Render help for one command: its help text, then its options and its
    /// direct subcommands in aligned columns.
    pub fn command_help(cmd: &CommandNode) -> Result<String, UsageError> {
        let mut out = String::new();
        if !cmd.help.trim().is_empty() {
            out.push_str(cmd.help.trim_end());
            out.push('\n');
        }

        let width = column_width(cmd)?;

        let options: Vec<&OptionRecord> = visible_options(cmd).collect();
        if !options.is_empty() {
            out.push_str("\nOptions:\n");
            for opt in options {
                out.push_str(&option_line(opt, width));
            }
        }

        if !cmd.subcommands().is_empty() {
            out.push_str("\nCommands:\n");
            for sub in cmd.subcommands() {
                out.push_str(&command_line(sub.usage()?, &sub.help, width));
            }
        }

        Ok(out)
    }

    /// Render the top-level help: a title banner followed by the root command.
    pub fn cli_help(title: &str, version: &str, root: &CommandNode) -> Result<String, UsageError> {
        let mut out = if version.trim().is_empty() {
            format!("{title}\n\n")
        } else {
            format!("{title} (version {})\n\n", version.trim())
        };
        out.push_str(&command_help(root)?);
        Ok(out)
    }
}
