//! snaketron-ctl CLI - build and run the snaketron container

use clap::Parser;
use snaketron_ctl::cli::{Args, SubCommand};
use snaketron_ctl::{
    format_output, Interrupt, LauncherConfig, LifecycleManager, OutputFormat, Report,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> snaketron_ctl::Result<i32> {
    let output_format = if args.json { OutputFormat::Json } else { OutputFormat::Human };

    let cwd = std::env::current_dir()?;
    let config = LauncherConfig::load(args.config.as_deref())?
        .with_overrides(args.overrides().relative_to(&cwd));
    config.validate()?;

    let interrupt = Interrupt::install()?;
    let manager = LifecycleManager::from_config(config, args.dry_run).with_interrupt(interrupt);

    let (report, code) = match args.command {
        SubCommand::Build { force } => (Report::Build(manager.ensure_built(force)?), 0),
        SubCommand::Run { force, .. } => {
            let outcome = manager.build_and_run(force)?;
            let code = outcome.exit_code();
            (Report::Run(outcome), code)
        }
        SubCommand::Clean => (Report::Clean(manager.clean()?), 0),
        SubCommand::Status => (Report::Status(manager.status()?), 0),
    };

    println!("{}", format_output(&report, &output_format));
    Ok(code)
}
