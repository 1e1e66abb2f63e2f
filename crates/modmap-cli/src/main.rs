#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::too_many_lines)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "modmap")]
#[command(author, version, about = "Inspect module resolution, import types and export maps", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Settings file (defaults to the nearest .modmaprc.json)
    #[arg(long, global = true, value_name = "FILE", env = "MODMAP_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve an import specifier as seen from a file
    Resolve {
        /// The import specifier, e.g. "./util" or "lodash/fp"
        specifier: String,

        /// The importing file
        #[arg(long, default_value = "index.js")]
        from: PathBuf,

        /// Also check the casing of segments inside the working directory
        #[arg(long)]
        strict_case: bool,
    },

    /// Classify an import specifier (builtin, external, sibling, ...)
    Classify {
        specifier: String,

        /// The importing file
        #[arg(long, default_value = "index.js")]
        from: PathBuf,
    },

    /// Print the export map of a module
    Exports {
        /// Module file
        file: PathBuf,
    },

    /// Check a dotted namespace access such as `ns.a.b` against a module
    Deref {
        /// Module file the root namespace is imported from
        file: PathBuf,

        /// Dotted access path; the first segment names the namespace import
        access: String,
    },

    /// Parse every module under a directory and report problems
    Scan {
        /// Directory to scan (defaults to the working directory)
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    let Some(command) = cli.command else {
        return commands::version::run(cli.json);
    };
    if matches!(command, Commands::Version) {
        return commands::version::run(cli.json);
    }

    let env = commands::Env::load(cwd, cli.settings.as_deref(), cli.json)?;
    let span = tracing::info_span!(
        "cmd",
        cwd = %env.cwd.display(),
        settings = ?env.settings_file
    );
    let _guard = span.enter();

    match command {
        Commands::Version => commands::version::run(cli.json),
        Commands::Resolve {
            specifier,
            from,
            strict_case,
        } => commands::resolve::run(&env, &specifier, &from, strict_case),
        Commands::Classify { specifier, from } => commands::classify::run(&env, &specifier, &from),
        Commands::Exports { file } => commands::exports::run(&env, &file),
        Commands::Deref { file, access } => commands::deref::run(&env, &file, &access),
        Commands::Scan { root } => commands::scan::run(&env, root.as_deref()),
    }
}
