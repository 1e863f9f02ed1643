use clap::Parser;
use colored::*;
use curate::batch::{WorkError, WorkStatus};
use curate::error::{CurateError, Result};
use curate::model::Target;
use curate::outcome::Report;
use curate::registry::fs::FileRegistry;
use curate::registry::EntityRegistry;
use curate::resolve::TargetSpec;
use curate::runner::{exit_code, BatchRun};
use chrono::Utc;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod args;
use args::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let Cli {
        command,
        registry: registry_path,
        threads,
        force,
    } = cli;

    let registry = match FileRegistry::open(&registry_path) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            print_error(&e);
            return 1;
        }
    };

    match command {
        Commands::List => match handle_list(&registry) {
            Ok(()) => 0,
            Err(e) => {
                print_error(&e);
                1
            }
        },
        Commands::Sweep {
            identifiers,
            all,
            taxon,
        } => finish(handle_sweep(&registry, identifiers, all, taxon, threads, force)),
        Commands::Purge {
            identifiers,
            all,
            yes,
        } => finish(handle_purge(&registry, identifiers, all, yes, threads, force)),
    }
}

fn finish(result: Result<Report>) -> i32 {
    if let Err(e) = &result {
        print_error(e);
    }
    exit_code(&result)
}

fn print_error(e: &CurateError) {
    eprintln!("{} {}", "Error:".red(), e);
}

fn handle_list(registry: &Arc<FileRegistry>) -> Result<()> {
    let entities = registry.entities();
    if entities.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }
    for entity in entities {
        let taxon = entity.taxon.as_deref().unwrap_or("-");
        println!(
            "{:>6}  {:<24}  {}",
            entity.id,
            entity.short_name,
            taxon.dimmed()
        );
    }
    Ok(())
}

fn spec_from(identifiers: Vec<String>, all: bool, taxon: Option<String>) -> Result<TargetSpec> {
    if all {
        Ok(TargetSpec::All)
    } else if let Some(taxon) = taxon {
        Ok(TargetSpec::Taxon(taxon))
    } else if !identifiers.is_empty() {
        Ok(TargetSpec::Identifiers(identifiers))
    } else {
        Err(CurateError::Usage(
            "provide entity identifiers, --all, or --taxon".to_string(),
        ))
    }
}

fn handle_sweep(
    registry: &Arc<FileRegistry>,
    identifiers: Vec<String>,
    all: bool,
    taxon: Option<String>,
    threads: usize,
    force: bool,
) -> Result<Report> {
    let spec = spec_from(identifiers, all, taxon)?;
    let lookup: Arc<dyn EntityRegistry> = Arc::clone(registry) as Arc<dyn EntityRegistry>;

    let mut run = BatchRun::new(lookup, spec)
        .with_gate(registry.as_ref(), "sweep")
        .concurrency(threads)
        .force(force);
    if all {
        run = run.lazy();
    }

    let store = Arc::clone(registry);
    let work = move |target: &Target| -> std::result::Result<WorkStatus, WorkError> {
        store.validate(target.id).map_err(box_err)?;
        store
            .record_event(target.id, "sweep", Utc::now())
            .map_err(box_err)?;
        Ok(WorkStatus::Done("validated and swept".to_string()))
    };

    let stdin = io::stdin();
    run.execute(&work, &mut stdin.lock(), &mut io::stdout())
}

fn handle_purge(
    registry: &Arc<FileRegistry>,
    identifiers: Vec<String>,
    all: bool,
    yes: bool,
    threads: usize,
    force: bool,
) -> Result<Report> {
    let spec = spec_from(identifiers, all, None)?;
    let lookup: Arc<dyn EntityRegistry> = Arc::clone(registry) as Arc<dyn EntityRegistry>;

    let run = BatchRun::new(lookup, spec)
        .confirmation("this permanently removes the selected entities from the catalog")
        .concurrency(threads)
        .force(force || yes);

    let store = Arc::clone(registry);
    let work = move |target: &Target| -> std::result::Result<WorkStatus, WorkError> {
        store.remove(target.id).map_err(box_err)?;
        Ok(WorkStatus::Done("purged".to_string()))
    };

    let stdin = io::stdin();
    run.execute(&work, &mut stdin.lock(), &mut io::stdout())
}

fn box_err(e: CurateError) -> WorkError {
    Box::new(e)
}
