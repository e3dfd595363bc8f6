use anyhow::{Result, anyhow};
use ptkl::commands;
use ptkl::config::{CliConfig, PROGRAM_NAME};
use ptkl::launch::{CompileRequest, DryRun, LaunchPlan, Runtime};
use ptkl::scan::{self, LaunchOptions, ScanOutcome};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    init_tracing();

    let code = match collect_args().and_then(|argv| run(&argv)) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{PROGRAM_NAME}: {err:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(argv: &[String]) -> Result<i32> {
    let config = CliConfig::from_env()?;
    let mut runtime = DryRun::stdout();

    if argv.get(1).is_some_and(|a| a == "compile") {
        tracing::debug!("dispatching compile");
        return runtime.compile(&CompileRequest::new(&argv[2..]));
    }

    let mut tree = commands::root(&config);
    let mut options = LaunchOptions::new(config.include_limit);
    match scan::scan_into(argv, &mut options, &mut tree) {
        Ok(ScanOutcome::Launch { cursor }) => {
            tracing::debug!(given = ?commands::given(&tree), "options scanned");
            let plan = LaunchPlan::resolve(options, argv, cursor);
            runtime.launch(&plan)
        }
        Ok(ScanOutcome::Help) => {
            print!("{}", commands::render_help(&config, &tree)?);
            Ok(0)
        }
        Ok(ScanOutcome::Version) => {
            println!("{} {}", config.program, config.version);
            Ok(0)
        }
        Err(err) => {
            eprintln!("{}: {err}", config.program);
            print!("{}", commands::render_help(&config, &tree)?);
            Ok(1)
        }
    }
}

/// Process arguments as `String`s; a token that is not UTF-8 is an error.
fn collect_args() -> Result<Vec<String>> {
    std::env::args_os()
        .enumerate()
        .map(|(idx, arg)| {
            arg.into_string()
                .map_err(|raw| anyhow!("argument {idx} is not valid UTF-8: {raw:?}"))
        })
        .collect()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
