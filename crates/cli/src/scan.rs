//! Single-pass scanner for the runtime's own flags.
//!
//! Don't use a getopt-style parser here: everything after the first
//! non-option token belongs to the script and must pass through untouched.

use std::fmt;

use ptkl_argparse::tree::CommandNode;
use serde::Serialize;

/// Default bound on `-I/--include` files.
pub const DEFAULT_INCLUDE_LIMIT: usize = 32;

/// How the entry script is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleMode {
    Script,
    Module,
    #[default]
    Autodetect,
}

impl ModuleMode {
    /// Resolve autodetection for `path` where the file name alone decides.
    ///
    /// `.mjs` files are always modules. Anything else stays `Autodetect` and is
    /// left to the engine's source sniffing.
    pub fn for_path(self, path: &str) -> Self {
        match self {
            Self::Autodetect if path.ends_with(".mjs") => Self::Module,
            other => other,
        }
    }
}

/// Files evaluated before the entry script, bounded at insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IncludeList {
    paths: Vec<String>,
    #[serde(skip)]
    limit: usize,
}

impl IncludeList {
    pub fn new(limit: usize) -> Self {
        Self {
            paths: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, path: impl Into<String>) -> Result<(), ScanError> {
        if self.paths.len() >= self.limit {
            return Err(ScanError::TooManyIncludes { limit: self.limit });
        }
        self.paths.push(path.into());
        Ok(())
    }

    pub fn paths(&self) -> &[String] {
        self.paths.as_slice()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Everything the scanner learned from argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LaunchOptions {
    pub expr: Option<String>,
    pub interactive: bool,
    pub dump_memory: u32,
    pub trace_memory: u32,
    pub empty_run: u32,
    pub module: ModuleMode,
    pub load_std: bool,
    pub dump_unhandled_rejection: bool,
    pub memory_limit: usize,
    pub stack_size: usize,
    pub bignum_ext: bool,
    pub includes: IncludeList,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUDE_LIMIT)
    }
}

impl LaunchOptions {
    pub fn new(include_limit: usize) -> Self {
        Self {
            expr: None,
            interactive: false,
            dump_memory: 0,
            trace_memory: 0,
            empty_run: 0,
            // Can't make module the default yet: `with` statements still need scripts.
            module: ModuleMode::Autodetect,
            load_std: true,
            dump_unhandled_rejection: false,
            memory_limit: 0,
            stack_size: 0,
            bignum_ext: false,
            includes: IncludeList::new(include_limit),
        }
    }

    /// Restore launcher defaults, keeping the include bound.
    fn reset(&mut self) {
        *self = Self::new(self.includes.limit());
    }
}

/// A flag as the user typed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flag {
    Short(char),
    Long(String),
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(c) => write!(f, "-{c}"),
            Self::Long(name) => write!(f, "--{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A value-taking option reached the end of argv.
    MissingValue { flag: Flag, expecting: &'static str },
    UnknownOption(Flag),
    TooManyIncludes { limit: usize },
}

impl ScanError {
    pub fn message(&self) -> String {
        match self {
            Self::MissingValue { flag, expecting } => format!("missing {expecting} for {flag}"),
            Self::UnknownOption(flag) => format!("unknown option '{flag}'"),
            Self::TooManyIncludes { limit } => {
                format!("too many included files (limit {limit})")
            }
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ScanError {}

/// How scanning ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Options are complete; `cursor` indexes the first positional token.
    Launch { cursor: usize },
    Help,
    Version,
}

struct Cursor<'a> {
    argv: &'a [String],
    index: usize,
}

impl<'a> Cursor<'a> {
    /// The value for `flag`: the text glued to it, else the next token.
    fn value(
        &mut self,
        flag: Flag,
        attached: &'a str,
        expecting: &'static str,
    ) -> Result<&'a str, ScanError> {
        if !attached.is_empty() {
            return Ok(attached);
        }
        let Some(next) = self.argv.get(self.index) else {
            return Err(ScanError::MissingValue { flag, expecting });
        };
        self.index += 1;
        Ok(next.as_str())
    }
}

/// Scan `argv` (program name at index 0) into `opts`.
///
/// Scanning stops at the first token that is not an option, at a bare `-`,
/// or after a `--` (which is consumed). Short options may share a token
/// (`-md`); a value-taking short option ends the token and takes the rest of
/// it, or the next token when nothing is attached.
pub fn scan(argv: &[String], opts: &mut LaunchOptions) -> Result<ScanOutcome, ScanError> {
    scan_with(argv, opts, Bindings(None))
}

/// Like [`scan`], also binding every accepted flag to the option of the same
/// long name in `tree`. Flags `tree` does not register are only scanned.
pub fn scan_into(
    argv: &[String],
    opts: &mut LaunchOptions,
    tree: &mut CommandNode,
) -> Result<ScanOutcome, ScanError> {
    scan_with(argv, opts, Bindings(Some(tree)))
}

/// Where accepted flags are recorded, if anywhere.
struct Bindings<'t>(Option<&'t mut CommandNode>);

impl Bindings<'_> {
    fn record(&mut self, long: &str, raw: &str) {
        let Some(opt) = self.0.as_deref_mut().and_then(|t| t.find_option_mut(long)) else {
            return;
        };
        let value = opt.bind(raw);
        tracing::trace!(option = long, ?value, "bound");
    }
}

/// Long name of a short flag.
fn long_name(c: char) -> Option<&'static str> {
    Some(match c {
        'h' | '?' => "help",
        'v' => "version",
        'e' => "eval",
        'I' => "include",
        'm' => "module",
        'd' => "dump",
        'T' => "trace",
        'q' => "quit",
        _ => return None,
    })
}

fn scan_with(
    argv: &[String],
    opts: &mut LaunchOptions,
    mut bindings: Bindings<'_>,
) -> Result<ScanOutcome, ScanError> {
    opts.reset();
    let mut cursor = Cursor { argv, index: 1 };

    while let Some(token) = argv.get(cursor.index) {
        let Some(body) = token.strip_prefix('-') else {
            break;
        };
        // A single `-` is not an option; it also stops scanning.
        if body.is_empty() {
            break;
        }
        cursor.index += 1;

        if let Some(long) = body.strip_prefix('-') {
            // `--` stops scanning.
            if long.is_empty() {
                break;
            }
            if let Some(outcome) = scan_long(long, &mut cursor, opts, &mut bindings)? {
                return Ok(outcome);
            }
            continue;
        }

        if let Some(outcome) = scan_short(body, &mut cursor, opts, &mut bindings)? {
            return Ok(outcome);
        }
    }

    tracing::debug!(cursor = cursor.index, "option scan complete");
    Ok(ScanOutcome::Launch {
        cursor: cursor.index,
    })
}

fn scan_short<'a>(
    body: &'a str,
    cursor: &mut Cursor<'a>,
    opts: &mut LaunchOptions,
    bindings: &mut Bindings<'_>,
) -> Result<Option<ScanOutcome>, ScanError> {
    for (idx, c) in body.char_indices() {
        let rest = &body[idx + c.len_utf8()..];
        tracing::trace!(option = %Flag::Short(c), "short option");
        let Some(long) = long_name(c) else {
            return Err(ScanError::UnknownOption(Flag::Short(c)));
        };
        match c {
            'h' | '?' => {
                bindings.record(long, "");
                return Ok(Some(ScanOutcome::Help));
            }
            'v' => {
                bindings.record(long, "");
                return Ok(Some(ScanOutcome::Version));
            }
            'e' => {
                let expr = cursor.value(Flag::Short(c), rest, "expression")?;
                opts.expr = Some(expr.to_string());
                bindings.record(long, expr);
                break;
            }
            'I' => {
                let path = cursor.value(Flag::Short(c), rest, "filename")?;
                opts.includes.push(path)?;
                bindings.record(long, path);
                break;
            }
            'm' => opts.module = ModuleMode::Module,
            'd' => opts.dump_memory += 1,
            'T' => opts.trace_memory += 1,
            // q
            _ => opts.empty_run += 1,
        }
        bindings.record(long, "");
    }
    Ok(None)
}

fn scan_long(
    name: &str,
    cursor: &mut Cursor<'_>,
    opts: &mut LaunchOptions,
    bindings: &mut Bindings<'_>,
) -> Result<Option<ScanOutcome>, ScanError> {
    let flag = || Flag::Long(name.to_string());
    tracing::trace!(option = %flag(), "long option");
    let mut raw = "";
    match name {
        "help" => {
            bindings.record(name, "");
            return Ok(Some(ScanOutcome::Help));
        }
        "version" => {
            bindings.record(name, "");
            return Ok(Some(ScanOutcome::Version));
        }
        "eval" => {
            raw = cursor.value(flag(), "", "expression")?;
            opts.expr = Some(raw.to_string());
        }
        "include" => {
            raw = cursor.value(flag(), "", "filename")?;
            opts.includes.push(raw)?;
        }
        "module" => opts.module = ModuleMode::Module,
        "script" => opts.module = ModuleMode::Script,
        "dump" => opts.dump_memory += 1,
        "trace" => opts.trace_memory += 1,
        "std" => opts.load_std = true,
        "unhandled-rejection" => opts.dump_unhandled_rejection = true,
        "bignum" => opts.bignum_ext = true,
        "quit" => opts.empty_run += 1,
        "memory-limit" => {
            opts.memory_limit = parse_lenient_size(cursor.value(flag(), "", "memory limit")?);
            bindings.record(name, &opts.memory_limit.to_string());
            return Ok(None);
        }
        "stack-size" => {
            opts.stack_size = parse_lenient_size(cursor.value(flag(), "", "stack size")?);
            bindings.record(name, &opts.stack_size.to_string());
            return Ok(None);
        }
        _ => return Err(ScanError::UnknownOption(flag())),
    }
    bindings.record(name, raw);
    Ok(None)
}

/// Parse a byte count the way `strtod` would, truncated to an integer.
///
/// Only the longest numeric prefix is read (`"64k"` is 64). Anything that
/// does not start with a number, and any negative value, yields 0. A `0x`
/// prefix reads hexadecimal digits.
pub fn parse_lenient_size(raw: &str) -> usize {
    let s = raw.trim_start();
    let unsigned = s.strip_prefix('+').unwrap_or(s);

    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        if !digits.is_empty() {
            return u64::from_str_radix(&digits, 16)
                .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
                .unwrap_or(usize::MAX);
        }
    }

    let prefix = &s[..numeric_prefix_len(s)];
    match prefix.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v as usize,
        _ => 0,
    }
}

fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("ptkl")
            .chain(items.iter().copied())
            .map(str::to_string)
            .collect()
    }

    fn scan_ok(items: &[&str]) -> (LaunchOptions, ScanOutcome) {
        let argv = argv(items);
        let mut opts = LaunchOptions::default();
        let outcome = scan(&argv, &mut opts).unwrap();
        (opts, outcome)
    }

    #[test]
    fn defaults_when_no_options() {
        let (opts, outcome) = scan_ok(&[]);
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 1 });
        assert_eq!(opts, LaunchOptions::default());
        assert_eq!(opts.module, ModuleMode::Autodetect);
        assert!(opts.load_std);
    }

    #[test]
    fn eval_takes_next_token() {
        let (opts, outcome) = scan_ok(&["-e", "print(1)"]);
        assert_eq!(opts.expr.as_deref(), Some("print(1)"));
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 3 });
    }

    #[test]
    fn eval_attached_and_separate_are_equivalent() {
        let (glued, glued_outcome) = scan_ok(&["-efoo"]);
        let (split, split_outcome) = scan_ok(&["-e", "foo"]);
        assert_eq!(glued.expr.as_deref(), Some("foo"));
        assert_eq!(glued.expr, split.expr);
        assert_eq!(glued_outcome, ScanOutcome::Launch { cursor: 2 });
        assert_eq!(split_outcome, ScanOutcome::Launch { cursor: 3 });
    }

    #[test]
    fn long_eval_takes_next_token() {
        let (opts, _) = scan_ok(&["--eval", "1+1"]);
        assert_eq!(opts.expr.as_deref(), Some("1+1"));
    }

    #[test]
    fn module_eval_scenario() {
        let (opts, outcome) = scan_ok(&["-m", "-e", "1+1", "script.js", "a", "b"]);
        assert_eq!(opts.module, ModuleMode::Module);
        assert_eq!(opts.expr.as_deref(), Some("1+1"));
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 4 });
    }

    #[test]
    fn double_dash_stops_and_is_consumed() {
        let (opts, outcome) = scan_ok(&["--", "-e", "x"]);
        assert_eq!(opts.expr, None);
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 2 });

        let (opts, outcome) = scan_ok(&["-d", "--", "--version"]);
        assert_eq!(opts.dump_memory, 1);
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 3 });
    }

    #[test]
    fn single_dash_stops_without_being_consumed() {
        let (_, outcome) = scan_ok(&["-q", "-", "-e", "x"]);
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 2 });
    }

    #[test]
    fn first_positional_stops_scanning() {
        let (opts, outcome) = scan_ok(&["app.js", "-e", "x"]);
        assert_eq!(opts.expr, None);
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 1 });
    }

    #[test]
    fn short_options_share_a_token() {
        let (opts, _) = scan_ok(&["-dTdq"]);
        assert_eq!(opts.dump_memory, 2);
        assert_eq!(opts.trace_memory, 1);
        assert_eq!(opts.empty_run, 1);

        let (opts, outcome) = scan_ok(&["-me", "x", "rest"]);
        assert_eq!(opts.module, ModuleMode::Module);
        assert_eq!(opts.expr.as_deref(), Some("x"));
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 3 });
    }

    #[test]
    fn counters_and_switches() {
        let (opts, _) = scan_ok(&[
            "--dump",
            "--trace",
            "--trace",
            "--quit",
            "--bignum",
            "--unhandled-rejection",
            "--std",
        ]);
        assert_eq!(opts.dump_memory, 1);
        assert_eq!(opts.trace_memory, 2);
        assert_eq!(opts.empty_run, 1);
        assert!(opts.bignum_ext);
        assert!(opts.dump_unhandled_rejection);
        assert!(opts.load_std);
    }

    #[test]
    fn last_mode_flag_wins() {
        let (opts, _) = scan_ok(&["-m", "--script"]);
        assert_eq!(opts.module, ModuleMode::Script);
        let (opts, _) = scan_ok(&["--script", "--module"]);
        assert_eq!(opts.module, ModuleMode::Module);
    }

    #[test]
    fn includes_accumulate_in_order() {
        let (opts, outcome) = scan_ok(&["-I", "a.js", "--include", "b.js", "-Ic.js", "main.js"]);
        assert_eq!(opts.includes.paths(), ["a.js", "b.js", "c.js"]);
        assert_eq!(outcome, ScanOutcome::Launch { cursor: 6 });
    }

    #[test]
    fn include_bound_is_enforced() {
        let argv = argv(&["-I", "a.js", "-I", "b.js", "-I", "c.js"]);
        let mut opts = LaunchOptions::new(2);
        let err = scan(&argv, &mut opts).unwrap_err();
        assert_eq!(err, ScanError::TooManyIncludes { limit: 2 });
        assert!(err.to_string().contains("too many included files"));
    }

    #[test]
    fn default_include_bound_is_32() {
        let mut items = Vec::new();
        for _ in 0..DEFAULT_INCLUDE_LIMIT {
            items.extend(["-I", "lib.js"]);
        }
        let (opts, _) = scan_ok(&items);
        assert_eq!(opts.includes.len(), DEFAULT_INCLUDE_LIMIT);

        items.extend(["-I", "one-too-many.js"]);
        let argv = argv(&items);
        let err = scan(&argv, &mut LaunchOptions::default()).unwrap_err();
        assert_eq!(err, ScanError::TooManyIncludes { limit: 32 });
    }

    #[test]
    fn missing_values_are_errors() {
        for (items, flag, expecting) in [
            (&["-e"][..], Flag::Short('e'), "expression"),
            (&["--eval"][..], Flag::Long("eval".into()), "expression"),
            (&["-I"][..], Flag::Short('I'), "filename"),
            (&["--memory-limit"][..], Flag::Long("memory-limit".into()), "memory limit"),
            (&["--stack-size"][..], Flag::Long("stack-size".into()), "stack size"),
        ] {
            let argv = argv(items);
            let err = scan(&argv, &mut LaunchOptions::default()).unwrap_err();
            assert_eq!(err, ScanError::MissingValue { flag, expecting });
        }
        let err = scan(&argv(&["-e"]), &mut LaunchOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing expression for -e");
    }

    #[test]
    fn unknown_options_name_the_offender() {
        let err = scan(&argv(&["-z"]), &mut LaunchOptions::default()).unwrap_err();
        assert_eq!(err, ScanError::UnknownOption(Flag::Short('z')));
        assert_eq!(err.to_string(), "unknown option '-z'");

        let err = scan(&argv(&["--frobnicate"]), &mut LaunchOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "unknown option '--frobnicate'");

        // Long options do not take `=value`.
        let err = scan(&argv(&["--eval=1"]), &mut LaunchOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "unknown option '--eval=1'");

        // A bad flag later in a shared token still fails.
        let err = scan(&argv(&["-dz"]), &mut LaunchOptions::default()).unwrap_err();
        assert_eq!(err, ScanError::UnknownOption(Flag::Short('z')));
    }

    #[test]
    fn help_and_version_end_scanning() {
        let help: [&[&str]; 4] = [&["-h"], &["-?"], &["--help"], &["-dh", "-z"]];
        for items in help {
            let (_, outcome) = scan_ok(items);
            assert_eq!(outcome, ScanOutcome::Help, "{items:?}");
        }
        let version: [&[&str]; 4] = [&["-v"], &["--version"], &["-v", "-z"], &["-qv", "--bogus"]];
        for items in version {
            let (_, outcome) = scan_ok(items);
            assert_eq!(outcome, ScanOutcome::Version, "{items:?}");
        }
    }

    #[test]
    fn sizes_are_parsed_leniently() {
        let (opts, _) = scan_ok(&["--memory-limit", "1048576", "--stack-size", "1e6"]);
        assert_eq!(opts.memory_limit, 1_048_576);
        assert_eq!(opts.stack_size, 1_000_000);

        let (opts, _) = scan_ok(&["--memory-limit", "lots", "--stack-size", "-4"]);
        assert_eq!(opts.memory_limit, 0);
        assert_eq!(opts.stack_size, 0);
    }

    #[test]
    fn lenient_size_prefixes() {
        assert_eq!(parse_lenient_size("64k"), 64);
        assert_eq!(parse_lenient_size("  12.9"), 12);
        assert_eq!(parse_lenient_size("+8"), 8);
        assert_eq!(parse_lenient_size("0x10"), 16);
        assert_eq!(parse_lenient_size("2e"), 2);
        assert_eq!(parse_lenient_size(".5"), 0);
        assert_eq!(parse_lenient_size("1.5e3"), 1500);
        assert_eq!(parse_lenient_size(""), 0);
        assert_eq!(parse_lenient_size("."), 0);
        assert_eq!(parse_lenient_size("e5"), 0);
    }

    #[test]
    fn scan_resets_previous_state() {
        let mut opts = LaunchOptions::new(4);
        scan(&argv(&["-e", "x", "-I", "a.js", "--script"]), &mut opts).unwrap();
        scan(&argv(&[]), &mut opts).unwrap();
        assert_eq!(opts, LaunchOptions::new(4));
        assert_eq!(opts.includes.limit(), 4);
    }

    #[test]
    fn module_mode_for_path() {
        assert_eq!(ModuleMode::Autodetect.for_path("main.mjs"), ModuleMode::Module);
        assert_eq!(ModuleMode::Autodetect.for_path("main.js"), ModuleMode::Autodetect);
        assert_eq!(ModuleMode::Script.for_path("main.mjs"), ModuleMode::Script);
    }
}
