use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use talent_core::export::{table_to_csv, table_to_xlsx};
use talent_core::{EngineConfig, ResultEnvelope, Session, Table};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "talent-query")]
#[command(about = "Ask natural-language questions about a talent table")]
struct Args {
    /// CSV, spreadsheet, PDF, DOCX or text file to load at startup
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// JSON engine config (defaults apply to missing fields)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON rule table replacing the built-in rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Interaction log file
    #[arg(long)]
    log: Option<PathBuf>,

    /// SQLite file holding the last loaded table
    #[arg(long)]
    store: Option<PathBuf>,

    /// Single query to answer; starts an interactive prompt when omitted
    query: Option<String>,
}

const HELP: &str = "Commands: :load <file>, :export <file.xlsx|file.csv>, :dashboard, :log, :quit";
const PREVIEW_ROWS: usize = 10;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if args.rules.is_some() {
        config.rules_path = args.rules.clone();
    }
    if args.log.is_some() {
        config.log_path = args.log.clone();
    }
    if args.store.is_some() {
        config.store_path = args.store.clone();
    }

    let mut session = Session::from_config(&config).context("failed to start session")?;
    if let Some(path) = session.log().path() {
        info!("logging interactions to {}", path.display());
    }

    match &args.file {
        // A file given at startup that cannot be loaded is fatal
        Some(path) => load_path(&mut session, path)?,
        None => {
            if session.restore_from_store()? {
                info!("restored the previous table");
            }
        }
    }

    if let Some(query) = &args.query {
        print_envelope(&session.ask(query));
        return Ok(());
    }

    repl(&mut session)
}

fn load_path(session: &mut Session, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    session
        .load_file(&name, &bytes)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(())
}

fn repl(session: &mut Session) -> Result<()> {
    println!("{}", HELP);
    let stdin = std::io::stdin();
    let mut last_table: Option<Table> = None;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            (":quit", _) | (":q", _) => break,
            (":load", path) => {
                // Failed loads keep the current table
                if let Err(e) = load_path(session, Path::new(path.trim())) {
                    error!("{:#}", e);
                }
            }
            (":export", path) => match &last_table {
                Some(table) => match export_table(table, Path::new(path.trim())) {
                    Ok(()) => println!("wrote {} rows to {}", table.row_count(), path.trim()),
                    Err(e) => error!("{:#}", e),
                },
                None => println!("no result table to export"),
            },
            (":dashboard", _) => {
                for metric in session.dashboard() {
                    println!("{:>6}  {}", metric.count, metric.label);
                }
            }
            (":log", _) => print!("{}", session.chat_log()?),
            (":help", _) => println!("{}", HELP),
            _ => {
                let envelope = session.ask(line);
                print_envelope(&envelope);
                if envelope.result_table.is_some() {
                    last_table = envelope.result_table;
                }
            }
        }
    }
    Ok(())
}

/// `.xlsx` paths get a workbook, everything else CSV
fn export_table(table: &Table, path: &Path) -> Result<()> {
    let is_xlsx = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    let bytes = if is_xlsx {
        table_to_xlsx(table)?
    } else {
        table_to_csv(table)?
    };
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn print_envelope(envelope: &ResultEnvelope) {
    println!("{}", envelope.response_text());

    if let Some(table) = &envelope.result_table {
        let preview = table.head(PREVIEW_ROWS);
        println!("{}", preview.column_names().join(" | "));
        for row in 0..preview.row_count() {
            let cells: Vec<String> = preview.row(row).iter().map(|v| v.to_string()).collect();
            println!("{}", cells.join(" | "));
        }
        if table.row_count() > PREVIEW_ROWS {
            println!("... {} more rows", table.row_count() - PREVIEW_ROWS);
        }
    }

    if let Some(chart) = &envelope.chart_spec {
        for (value, count) in &chart.value_counts {
            println!("{:>6}  {}", count, value);
        }
    }
}
