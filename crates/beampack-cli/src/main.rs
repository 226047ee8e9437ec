use std::path::PathBuf;

use atty::Stream;
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::json;

use beampack_core::{
    discover_project_root, escriptize, EscriptizeRequest, ExecutionOutcome,
};

mod style;

use style::Style;

#[derive(Parser)]
#[command(
    name = "beampack",
    version,
    about = "Builds self-contained executable escripts from compiled BEAM projects"
)]
struct BeampackCli {
    /// Suppress status output
    #[arg(long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Enable trace-level logging
    #[arg(long, global = true)]
    trace: bool,

    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the project's executable escript
    Build {
        /// Directory holding compiled applications (default: _build/lib)
        #[arg(long)]
        lib_dir: Option<PathBuf>,

        /// Output location for the escript (default: bin/<name>)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Report what would be embedded without writing the file
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = BeampackCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let outcome = run(&cli)?;
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn run(cli: &BeampackCli) -> Result<ExecutionOutcome> {
    match &cli.command {
        Command::Build {
            lib_dir,
            out,
            dry_run,
        } => {
            let Some(root) = discover_project_root().map_err(|err| eyre!("{err:?}"))? else {
                return Ok(ExecutionOutcome::user_error(
                    "beampack build: no beampack.toml found in this directory or any parent",
                    json!({ "hint": "run beampack inside a project, or create beampack.toml" }),
                ));
            };
            let request = EscriptizeRequest {
                lib_dir: lib_dir.clone(),
                out: out.clone(),
                dry_run: *dry_run,
            };
            escriptize(&root, &request).map_err(|err| eyre!("{err:?}"))
        }
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("beampack_core={level},beampack_domain={level},beampack={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &BeampackCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = json!({
            "command": "build",
            "status": outcome.status,
            "exit_code": code,
            "message": outcome.message,
            "details": outcome.details,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        println!("{}", style.status(outcome.status, &outcome.message));
        if let Some(hint) = outcome.hint() {
            let hint_line = format!("Hint: {hint}");
            println!("{}", style.info(&hint_line));
        }
    }

    Ok(code)
}
