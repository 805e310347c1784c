use anyhow::Context;
use clap::{Parser, Subcommand};
use protochain::doc::Document;
use protochain::render::render_tree;
use protochain::session::{RebuildReport, Session};
use protochain::view::build_snapshot;
use protochain::RecordId;
use tracing_subscriber::EnvFilter;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "protochain")]
#[command(about = "Prototype-inheritance record resolver", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the hierarchy from a records document and emit resolved values.
    Resolve {
        #[arg(long)]
        records: String,

        /// Write the JSON snapshot here instead of stdout.
        #[arg(short = 'o', long)]
        out: Option<String>,

        #[arg(long)]
        skip_instance_cycle_check: bool,
    },
    /// Print the prototype forest.
    Tree {
        #[arg(long)]
        records: String,

        #[arg(long)]
        skip_instance_cycle_check: bool,
    },
    /// Check whether `record` may take `prototype` as its prototype.
    Check {
        #[arg(long)]
        records: String,

        #[arg(long)]
        record: String,

        #[arg(long)]
        prototype: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Commands::Resolve {
            records,
            out,
            skip_instance_cycle_check,
        } => {
            let (session, report) = load_session(&records, skip_instance_cycle_check)?;
            let snapshot = build_snapshot(&session, Some(&report));
            let json = serde_json::to_string_pretty(&snapshot)?;
            match out {
                Some(out) => {
                    std::fs::write(&out, json).with_context(|| format!("write {}", out))?;
                    println!("Wrote {}", out);
                }
                None => println!("{}", json),
            }
        }
        Commands::Tree {
            records,
            skip_instance_cycle_check,
        } => {
            let (session, _) = load_session(&records, skip_instance_cycle_check)?;
            print!("{}", render_tree(session.hierarchy()));
        }
        Commands::Check {
            records,
            record,
            prototype,
        } => {
            let (session, _) = load_session(&records, false)?;
            let (record, prototype) = (RecordId::from(record), RecordId::from(prototype));
            session.validate_prototype_assignment(&record, &prototype)?;
            println!("ok");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse + validate the records document, then rebuild a session from it.
fn load_session(path: &str, skip_instance_cycle_check: bool) -> Result<(Session, RebuildReport)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    let loaded = Document::from_json(&text)?.validate_and_build()?;

    let mut config = loaded.config;
    if skip_instance_cycle_check {
        config.instance_cycle_check = false;
    }

    let mut session = Session::new(config);
    let report = session.full_rebuild(loaded.records);
    Ok((session, report))
}
