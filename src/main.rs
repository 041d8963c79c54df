//! CLI entry point for `attache`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};

use attache::config::{self, Config, Overrides};
use attache::pipeline::session;
use attache::pipeline::summary::RunSummary;
use attache::service::imap::ImapConnector;

#[derive(Parser)]
#[command(
    name = "attache",
    version,
    about = "Download all attachments of an IMAP account into {path}/{sender}/{date}/"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Username for the IMAP server
    #[arg(long, env = "ATTACHE_USERNAME")]
    username: Option<String>,

    /// Password for the IMAP server
    #[arg(long, env = "ATTACHE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// IMAP server name
    #[arg(long, env = "ATTACHE_SERVER")]
    server: Option<String>,

    /// Port of the IMAP server [default: 993]
    #[arg(long, env = "ATTACHE_PORT")]
    port: Option<u16>,

    /// TLS encrypted session [default: true]
    #[arg(long, env = "ATTACHE_TLS", value_name = "BOOL", action = clap::ArgAction::Set)]
    tls: Option<bool>,

    /// Directory where the attachments are saved [default: .]
    #[arg(long, env = "ATTACHE_PATH", value_name = "DIR")]
    path: Option<PathBuf>,

    /// Comma separated list of IMAP folders to skip [default: Spam,Trash,Deleted Messages]
    #[arg(long, env = "ATTACHE_EXCLUDE", value_name = "FOLDERS")]
    exclude: Option<String>,

    /// Messages requested per FETCH command [default: 50]
    #[arg(long, env = "ATTACHE_FETCH_BATCH", value_name = "N")]
    fetch_batch: Option<u32>,

    /// Configuration file
    #[arg(long, env = "ATTACHE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            server: self.server.clone(),
            port: self.port,
            tls: self.tls,
            username: self.username.clone(),
            password: self.password.clone(),
            path: self.path.clone(),
            exclude: self.exclude.clone(),
            fetch_batch: self.fetch_batch,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(*shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        None => {}
    }

    let (file, source) = config::load_file_config(cli.config.as_deref());

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => file.general.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &file.general);
    source.log();

    let config = match Config::resolve(cli.overrides(), file) {
        Ok(config) => config,
        Err(e) => Cli::command()
            .error(ErrorKind::MissingRequiredArgument, e.to_string())
            .exit(),
    };

    match run(&config) {
        Ok(summary) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&config, &summary);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error, stopping");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Connect as configured and run the extraction.
fn run(config: &Config) -> attache::error::Result<RunSummary> {
    let account = &config.account;
    tracing::info!(
        server = %account.server,
        port = account.port,
        tls = account.tls,
        path = %config.extract.output_root.display(),
        "Starting"
    );
    if account.tls {
        session::run(ImapConnector::dial_tls(&account.server, account.port)?, config)
    } else {
        session::run(ImapConnector::dial_plain(&account.server, account.port)?, config)
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, general: &config::GeneralConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(general);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "attache.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<ExitCode> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "attache", &mut std::io::stdout());
    Ok(ExitCode::SUCCESS)
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<ExitCode> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(ExitCode::SUCCESS)
}

/// Print the run summary as a human-readable table.
fn print_summary(config: &Config, s: &RunSummary) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<25} {}", "Output", config.extract.output_root.display());
    println!(
        "  {:<25} {} listed, {} processed, {} excluded, {} empty",
        "Folders", s.folders_listed, s.folders_processed, s.folders_excluded, s.folders_empty
    );
    println!(
        "  {:<25} {} extracted, {} skipped, {} incomplete, {} abandoned",
        "Messages", s.messages_extracted, s.messages_skipped, s.messages_incomplete, s.messages_abandoned
    );
    if s.messages_skipped_incomplete > 0 {
        println!(
            "  {:<25} {} (remove their directories to retry)",
            "Skipped, incomplete", s.messages_skipped_incomplete
        );
    }
    println!(
        "  {:<25} {} saved, {} failed",
        "Attachments", s.attachments_saved, s.attachments_failed
    );
    println!("  {:<25} {}", "Written", format_size(s.bytes_written, BINARY));
    println!();
}
