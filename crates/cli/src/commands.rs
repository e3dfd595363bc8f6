use anyhow::{Context, Result};
use ptkl_argparse::tree::{ArgRecord, CommandNode, OptionKind, OptionRecord, OptionValue};
use ptkl_argparse::usage;

use crate::config::CliConfig;

/// The launcher's command tree, as shown by `--help`.
///
/// Every flag the scanner understands is registered here; the ones not part of
/// the published help are hidden.
pub fn root(config: &CliConfig) -> CommandNode {
    let mut root = CommandNode::new(&config.program)
        .help(&config.usage)
        .usage_capacity(config.usage_capacity);

    root.add_option(
        OptionRecord::new("eval")
            .short('e')
            .kind(OptionKind::String)
            .help("evaluate EXPR"),
    )
    .add_option(OptionRecord::new("version").short('v').help("print version"))
    .add_option(OptionRecord::new("help").short('h').help("show this help"))
    .add_option(
        OptionRecord::new("module")
            .short('m')
            .hidden()
            .help("load as ES6 module (default=autodetect)"),
    )
    .add_option(
        OptionRecord::new("script")
            .hidden()
            .help("load as ES6 script (default=autodetect)"),
    )
    .add_option(
        OptionRecord::new("include")
            .short('I')
            .kind(OptionKind::String)
            .repeatable()
            .hidden()
            .help("include an additional file"),
    )
    .add_option(
        OptionRecord::new("std")
            .hidden()
            .help("make 'std' and 'os' available to the loaded script"),
    )
    .add_option(
        OptionRecord::new("bignum")
            .hidden()
            .help("enable the bignum extensions (BigFloat, BigDecimal)"),
    )
    .add_option(
        OptionRecord::new("trace")
            .short('T')
            .repeatable()
            .hidden()
            .help("trace memory allocation"),
    )
    .add_option(
        OptionRecord::new("dump")
            .short('d')
            .repeatable()
            .hidden()
            .help("dump the memory usage stats"),
    )
    .add_option(
        OptionRecord::new("memory-limit")
            .kind(OptionKind::Integer)
            .hidden()
            .help("limit the memory usage to 'n' bytes"),
    )
    .add_option(
        OptionRecord::new("stack-size")
            .kind(OptionKind::Integer)
            .hidden()
            .help("limit the stack size to 'n' bytes"),
    )
    .add_option(
        OptionRecord::new("unhandled-rejection")
            .hidden()
            .help("dump unhandled promise rejections"),
    )
    .add_option(
        OptionRecord::new("quit")
            .short('q')
            .repeatable()
            .hidden()
            .help("just instantiate the interpreter and quit"),
    );

    root.add_subcommand(
        CommandNode::new("compile")
            .help("compile a script to bytecode")
            .usage_capacity(config.usage_capacity)
            .arg(ArgRecord::required("input"))
            .arg(ArgRecord::optional("output")),
    );

    root
}

/// Render the full `--help` text for the launcher.
pub fn help(config: &CliConfig) -> Result<String> {
    render_help(config, &root(config))
}

/// Render `--help` from an already built (possibly scanned) tree.
pub fn render_help(config: &CliConfig, root: &CommandNode) -> Result<String> {
    usage::cli_help(&config.title, &config.version, root).context("failed to render help")
}

/// Options of `root` that were given on the command line, with their last value.
pub fn given(root: &CommandNode) -> Vec<(&str, &OptionValue)> {
    root.options()
        .iter()
        .filter_map(|o| o.value().map(|v| (o.long.as_str(), v)))
        .collect()
}
