mod debug_report;

use clap::Parser;
use ensemble::{DEFAULT_MAX_NESTING_DEPTH, DEFAULT_NAMESPACE_ROOT, Interp, Options};
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "ENSEMBLE_LOG";

/// Evaluate a script of ensemble definitions and invocations.
///
/// Each command's non-empty result is printed on its own line. On error the
/// full error trace goes to stderr and the exit code is 1.
#[derive(Parser, Debug)]
#[command(name = "ensemble", version)]
struct Cli {
    /// Script file. Reads stdin when omitted.
    file: Option<PathBuf>,

    /// Print every ensemble and its part table after evaluation.
    #[arg(long)]
    dump: bool,

    /// Force ANSI color output.
    #[arg(long, conflicts_with = "no_color")]
    color: bool,

    /// Disable ANSI color output.
    #[arg(long)]
    no_color: bool,

    /// Root of the namespaces allocated for ensembles.
    #[arg(long, value_name = "NAMESPACE", default_value = DEFAULT_NAMESPACE_ROOT)]
    namespace_root: String,

    /// Maximum nesting of evaluations and ensemble dispatches.
    #[arg(long = "max-depth", value_name = "N", default_value_t = DEFAULT_MAX_NESTING_DEPTH)]
    max_depth: usize,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let script = match read_script(cli.file.as_deref()) {
        Ok(script) => script,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let color = if cli.color {
        true
    } else if cli.no_color {
        false
    } else {
        io::stdout().is_terminal()
    };

    let options = Options { namespace_root: cli.namespace_root, max_nesting_depth: cli.max_depth };
    let mut interp = Interp::with_options(options);
    let outcome = interp.eval_each(&script, |result| {
        if !result.is_empty() {
            println!("{result}");
        }
    });

    if cli.dump {
        debug_report::print_ensembles(&interp.describe_ensembles(), color);
    }

    if let Err(err) = outcome {
        tracing::debug!(kind = ?err.kind(), "script failed");
        eprintln!("{}", err.error_info());
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(io::stderr).init();
}

fn read_script(file: Option<&Path>) -> io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
