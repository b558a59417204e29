//! ARQ CLI: records manager for archive boxes.
//!
//! Commands: init, add, preview-id, move, retrieve, return, edit, show,
//! list, history, options, completions

mod config;
mod output;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use arq_core::audit::{AuditFilter, EventKind};
use arq_core::lifecycle::{NewRecord, Placement, RecordEdit, Transition};
use arq_core::record::parse_date;
use arq_core::{Sheet, Status};
use arq_store::workbook::sheets;
use arq_store::{Archive, FsStore, Outcome};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{Config, CONFIG_FILE};
use output::{render, to_json, Grid, OutputFormat};

#[derive(Parser)]
#[command(name = "arq")]
#[command(version)]
#[command(about = "Records manager for archive boxes")]
struct Cli {
    /// Config file (default: ./arq.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create an empty workbook
    Init,
    /// Register a new box
    Add(AddArgs),
    /// Show the id the next registration would get
    PreviewId {
        #[arg(long)]
        category: String,
        #[arg(long)]
        document_type: String,
    },
    /// Move archived boxes to a new placement
    Move {
        /// Box ids (comma-separated lists accepted)
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        location: String,
        #[arg(long)]
        shelf: String,
        #[arg(long)]
        rack: String,
        #[arg(long)]
        responsible: String,
    },
    /// Mark a box as retrieved
    Retrieve(TransitionArgs),
    /// Return a retrieved box to the archive
    Return(TransitionArgs),
    /// Edit descriptive fields of a box
    Edit {
        id: String,
        /// FIELD=VALUE, repeatable (box_label, contents, coding, tag, book,
        /// seal, requester, period_start, period_end)
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        set: Vec<String>,
        #[arg(long)]
        responsible: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Show one box
    Show { id: String },
    /// List boxes
    #[command(alias = "ls")]
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Query the audit history, newest first
    History {
        #[arg(long)]
        id: Option<String>,
        #[arg(long, value_parser = parse_event)]
        event: Option<EventKind>,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long, value_parser = parse_timestamp)]
        since: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_timestamp)]
        until: Option<DateTime<Utc>>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show or replace option tables
    Options {
        #[command(subcommand)]
        command: OptionsCommand,
    },
    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

#[derive(clap::Args)]
struct AddArgs {
    #[arg(long)]
    category: String,
    #[arg(long)]
    document_type: String,
    /// Submission origin; selects the retention period
    #[arg(long)]
    origin: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    shelf: String,
    #[arg(long)]
    rack: String,
    #[arg(long = "box")]
    box_label: String,
    #[arg(long)]
    contents: String,
    #[arg(long)]
    requester: String,
    #[arg(long)]
    responsible: String,
    #[arg(long)]
    coding: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    book: Option<String>,
    #[arg(long)]
    seal: Option<String>,
    #[arg(long, value_parser = parse_day)]
    period_start: Option<NaiveDate>,
    #[arg(long, value_parser = parse_day)]
    period_end: Option<NaiveDate>,
}

#[derive(clap::Args)]
struct TransitionArgs {
    id: String,
    #[arg(long)]
    responsible: String,
    /// Operation date (default: today)
    #[arg(long, value_parser = parse_day)]
    date: Option<NaiveDate>,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Subcommand)]
enum OptionsCommand {
    /// Print option tables as JSON
    Show {
        /// Selectboxes, Retenção or Espaços (default: all)
        sheet: Option<String>,
    },
    /// Replace one option table from a JSON file (`{"columns", "rows"}`)
    Set {
        sheet: String,
        file: PathBuf,
        #[arg(long)]
        responsible: String,
    },
}

fn parse_day(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("invalid date '{value}'"))
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    parse_day(value).map(|d| d.and_time(chrono::NaiveTime::default()).and_utc())
}

fn parse_status(value: &str) -> std::result::Result<Status, String> {
    value.parse().map_err(|e: arq_core::LifecycleError| e.to_string())
}

fn parse_event(value: &str) -> std::result::Result<EventKind, String> {
    value.parse()
}

fn init_logging(verbose: u8) {
    let filter = if verbose > 0 {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("ARQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn open(config: &Config) -> Result<Archive<FsStore>> {
    let settings = config.settings()?;
    debug!(root = %config.store_root.display(), workbook = %settings.workbook, "opening archive");
    Ok(Archive::new(FsStore::new(&config.store_root), settings))
}

/// Print the value and surface any audit warning on stderr.
fn report<T: serde::Serialize>(outcome: &Outcome<T>) {
    println!("{}", to_json(&outcome.value));
    if let Some(warning) = &outcome.audit_warning {
        eprintln!("warning: history not recorded: {warning}");
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn transition(args: &TransitionArgs) -> Transition {
    Transition {
        responsible: args.responsible.clone(),
        date: Some(args.date.unwrap_or_else(today)),
        note: args.note.clone(),
    }
}

fn cmd_init(explicit: Option<&Path>) -> Result<()> {
    let path = explicit.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
    if !path.exists() {
        std::fs::write(&path, Config::default().to_toml()?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    let config = Config::load(Some(path.as_path()))?;
    std::fs::create_dir_all(&config.store_root)
        .with_context(|| format!("creating {}", config.store_root.display()))?;

    let archive = open(&config)?;
    let location = config.store_root.join(&config.workbook);
    if archive.init()? {
        println!("Initialized ARQ workbook at {}", location.display());
    } else {
        println!("Workbook already exists at {}", location.display());
    }
    Ok(())
}

fn cmd_options_set(archive: &mut Archive<FsStore>, sheet: &str, file: &Path, responsible: &str) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let mut table: Sheet =
        serde_json::from_str(&text).with_context(|| format!("parsing {} as a sheet", file.display()))?;
    table.normalize();
    let outcome = archive.set_options(sheet, table, responsible)?;
    if let Some(warning) = &outcome.audit_warning {
        eprintln!("warning: history not recorded: {warning}");
    }
    println!("Replaced option sheet {}", sheet.trim());
    Ok(())
}

fn cmd_options_show(archive: &Archive<FsStore>, sheet: Option<&str>) -> Result<()> {
    let options = archive.options()?;
    let all = [
        (sheets::SELECTBOXES, options.selectboxes.sheet()),
        (sheets::RETENTION, options.retention.sheet()),
        (sheets::SPACES, options.spaces.sheet()),
    ];
    let mut shown = serde_json::Map::new();
    for (aliases, table) in all {
        let wanted = sheet.is_none_or(|s| sheets::option_aliases(s) == Some(aliases));
        if wanted {
            shown.insert(aliases[0].to_string(), serde_json::to_value(table)?);
        }
    }
    if shown.is_empty() {
        bail!("unknown option sheet '{}'", sheet.unwrap_or_default());
    }
    println!("{}", to_json(&shown));
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Init = cli.command {
        return cmd_init(cli.config.as_deref());
    }
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "arq", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let mut archive = open(&config)?;

    match cli.command {
        Commands::Init | Commands::Completions { .. } => {}
        Commands::Add(args) => {
            let input = NewRecord {
                category: args.category,
                document_type: args.document_type,
                submission_origin: args.origin,
                location: args.location,
                shelf: args.shelf,
                rack: args.rack,
                box_label: args.box_label,
                contents: args.contents,
                requester: args.requester,
                responsible: args.responsible,
                coding: args.coding,
                tag: args.tag,
                book: args.book,
                seal: args.seal,
                period_start: args.period_start,
                period_end: args.period_end,
            };
            report(&archive.register(&input)?);
        }
        Commands::PreviewId {
            category,
            document_type,
        } => {
            println!("{}", archive.preview_id(&category, &document_type)?);
        }
        Commands::Move {
            ids,
            location,
            shelf,
            rack,
            responsible,
        } => {
            let target = Placement { location, shelf, rack };
            report(&archive.move_records(&ids, &target, &responsible)?);
        }
        Commands::Retrieve(args) => {
            report(&archive.retrieve(&args.id, &transition(&args))?);
        }
        Commands::Return(args) => {
            report(&archive.return_to_archive(&args.id, &transition(&args))?);
        }
        Commands::Edit {
            id,
            set,
            responsible,
            note,
        } => {
            let mut changes = RecordEdit::default();
            for pair in &set {
                let Some((field, value)) = pair.split_once('=') else {
                    bail!("expected FIELD=VALUE, got '{pair}'");
                };
                changes.set(field, value)?;
            }
            report(&archive.edit(&id, &changes, &responsible, note.as_deref())?);
        }
        Commands::Show { id } => {
            println!("{}", to_json(&archive.show(&id)?));
        }
        Commands::List { status, format } => {
            let records = archive.list(status)?;
            print!("{}", ensure_newline(render(&records, || Grid::records(&records), format)));
        }
        Commands::History {
            id,
            event,
            actor,
            since,
            until,
            limit,
            format,
        } => {
            let filter = AuditFilter {
                record_id: id,
                event,
                actor,
                since,
                until,
                limit,
            };
            let entries = archive.history(&filter)?;
            print!("{}", ensure_newline(render(&entries, || Grid::history(&entries), format)));
        }
        Commands::Options { command } => match command {
            OptionsCommand::Show { sheet } => cmd_options_show(&archive, sheet.as_deref())?,
            OptionsCommand::Set {
                sheet,
                file,
                responsible,
            } => cmd_options_set(&mut archive, &sheet, &file, &responsible)?,
        },
    }
    Ok(())
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
