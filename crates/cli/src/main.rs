// consulta CLI - query portals and inspect stored records

mod exit_codes;
mod query;
mod records;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use consulta_config::{Settings, SettingsError};
use consulta_recon::{Estado, ReconError, StoreError};
use consulta_store::SqliteStore;

use exit_codes::{recon_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "consulta")]
#[command(about = "Query public registry portals and reconcile the results into stored records")]
#[command(version)]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// SQLite database path (default: settings, then the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Portal definitions file (default: settings, then the config directory)
    #[arg(long, global = true)]
    portals: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract tables from a rendered HTML page and classify the result
    #[command(after_help = "\
Examples:
  consulta extract page.html
  consulta extract sri.html --layout zk")]
    Extract {
        /// Rendered HTML snapshot
        html: PathBuf,

        /// Table markup family
        #[arg(long, value_enum, default_value_t = LayoutArg::Html)]
        layout: LayoutArg,
    },

    /// Run a portal query against an HTML snapshot and store the result
    #[command(after_help = "\
Examples:
  consulta run antecedentes 1102961867 --html consulta.html
  consulta run sri 1713449831001 --html ruc.html --timeout-ms 30000
  consulta --portals ./portals.toml --db ./consulta.db run sri 1713449831001 --html ruc.html")]
    Run {
        /// Portal name (a [portals.<name>] table)
        portal: String,

        /// Cédula (10 digits) or RUC (13 digits)
        id: String,

        /// Rendered HTML snapshot of the portal's result page
        #[arg(long)]
        html: PathBuf,

        /// Override the portal's wait timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Validate a portals file without running anything
    #[command(after_help = "\
Examples:
  consulta validate portals.toml")]
    Validate {
        /// Portals file (default: --portals or settings)
        file: Option<PathBuf>,
    },

    /// Print the stored record for one identifier
    Show {
        collection: String,
        id: String,
    },

    /// List stored records, most recently updated first
    #[command(after_help = "\
Examples:
  consulta list datosSRI
  consulta list datosSRI --estado error --limit 20")]
    List {
        collection: String,

        /// Only records in this state
        #[arg(long, value_parser = parse_estado)]
        estado: Option<Estado>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Counts per state for a collection
    Stats {
        collection: String,

        /// Output JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show effective settings, optionally writing them to the settings file
    #[command(after_help = "\
Examples:
  consulta config
  consulta --db /srv/consulta.db config --write")]
    Config {
        /// Persist the effective settings (including --db/--portals)
        #[arg(long)]
        write: bool,
    },

    /// Delete records not updated in the last N days
    #[command(after_help = "\
Examples:
  consulta cleanup antecedentes
  consulta cleanup datosSRI --days 90")]
    Cleanup {
        collection: String,

        /// Retention window (default: settings, 30)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// ZK listboxes (company registry)
    Zk,
    /// Plain <table> markup
    Html,
}

fn parse_estado(s: &str) -> Result<Estado, String> {
    Estado::parse(s).ok_or_else(|| format!("expected exitoso, no_registrado or error, got '{s}'"))
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.target(env_logger::Target::Stderr);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Context::load(cli.db, cli.portals).and_then(|ctx| match cli.command {
        Commands::Extract { html, layout } => query::cmd_extract(&html, layout),
        Commands::Run { portal, id, html, timeout_ms } => {
            query::cmd_run(&ctx, &portal, &id, &html, timeout_ms)
        }
        Commands::Validate { file } => query::cmd_validate(&ctx, file),
        Commands::Show { collection, id } => records::cmd_show(&ctx, &collection, &id),
        Commands::List { collection, estado, limit } => {
            records::cmd_list(&ctx, &collection, estado, limit)
        }
        Commands::Stats { collection, json } => records::cmd_stats(&ctx, &collection, json),
        Commands::Cleanup { collection, days } => records::cmd_cleanup(&ctx, &collection, days),
        Commands::Config { write } => cmd_config(ctx, write),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Shared context
// ============================================================================

/// Settings plus command-line overrides.
pub struct Context {
    pub settings: Settings,
    db: Option<PathBuf>,
    portals: Option<PathBuf>,
}

impl Context {
    fn load(db: Option<PathBuf>, portals: Option<PathBuf>) -> Result<Self, CliError> {
        let settings = Settings::load().map_err(CliError::settings)?;
        Ok(Self { settings, db, portals })
    }

    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(|| self.settings.effective_db_path())
    }

    pub fn portals_file(&self) -> PathBuf {
        self.portals
            .clone()
            .unwrap_or_else(|| self.settings.effective_portals_file())
    }

    pub fn open_store(&self) -> Result<SqliteStore, CliError> {
        let path = self.db_path();
        SqliteStore::open(&path).map_err(|e| {
            CliError::store(e).with_hint(format!("database: {}", path.display()))
        })
    }
}

fn cmd_config(ctx: Context, write: bool) -> Result<(), CliError> {
    let mut settings = ctx.settings.clone();
    settings.db_path = Some(ctx.db_path());
    settings.portals_file = Some(ctx.portals_file());
    print_json(&settings)?;

    if write {
        settings.save().map_err(CliError::settings)?;
        eprintln!("wrote {}", Settings::config_path().display());
    }
    Ok(())
}

// ============================================================================
// Errors + output
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn recon(err: ReconError) -> Self {
        Self::new(recon_exit_code(&err), err.to_string())
    }

    pub fn store(err: StoreError) -> Self {
        Self::new(EXIT_STORE, format!("store error: {err}"))
    }

    pub fn settings(err: SettingsError) -> Self {
        Self::new(EXIT_CONFIG, err.to_string()).with_hint(format!(
            "settings file: {}",
            Settings::config_path().display()
        ))
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{json}");
    Ok(())
}
