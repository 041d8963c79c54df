//! Application configuration.
//!
//! Every setting is taken from the first source that provides it:
//! 1. command-line flag
//! 2. environment variable (`ATTACHE_*`, handled by the CLI layer)
//! 3. TOML file at `$ATTACHE_CONFIG` / `--config`, else
//!    `~/.config/attache/config.toml` (Linux/macOS),
//!    `%APPDATA%\attache\config.toml` (Windows)
//! 4. built-in defaults
//!
//! The merged [`Config`] is built once at startup and passed down explicitly.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AttacheError, Result};
use crate::model::folder::{ExclusionSet, DEFAULT_EXCLUDE};

/// Default IMAP port (implicit TLS).
pub const DEFAULT_PORT: u16 = 993;

/// Default number of messages per FETCH command.
pub const DEFAULT_FETCH_BATCH: u32 = 50;

// ── File configuration ──────────────────────────────────────────

/// Contents of the optional TOML file. Every key may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Logging and cache locations.
    pub general: GeneralConfig,
    /// Server and credentials.
    pub account: AccountSection,
    /// Output and folder selection.
    pub extract: ExtractSection,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory holding `attache.log`.
    pub cache_dir: Option<PathBuf>,
}

/// `[account]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSection {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// `[extract]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSection {
    /// Output root directory.
    pub path: Option<PathBuf>,
    /// Folder names never processed.
    pub exclude: Option<Vec<String>>,
    /// Messages per FETCH command.
    pub fetch_batch: Option<u32>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_dir: None,
        }
    }
}

// ── Command-line / environment values ───────────────────────────

/// Values given on the command line or through `ATTACHE_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub path: Option<PathBuf>,
    /// Comma-separated folder list.
    pub exclude: Option<String>,
    pub fetch_batch: Option<u32>,
}

// ── Effective configuration ─────────────────────────────────────

/// The effective configuration of one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    pub account: AccountConfig,
    pub extract: ExtractConfig,
}

/// Where and as whom to connect.
#[derive(Clone)]
pub struct AccountConfig {
    pub server: String,
    pub port: u16,
    pub tls: bool,
    pub username: String,
    pub password: String,
}

/// Password is never printed.
impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What to extract and where to put it.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub output_root: PathBuf,
    pub exclude: ExclusionSet,
    pub fetch_batch: u32,
}

impl Config {
    /// Merge command-line values over the file configuration.
    ///
    /// Fails if username, password or server is missing (or empty).
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let FileConfig {
            general,
            account,
            extract,
        } = file;

        let server = non_empty(overrides.server).or(non_empty(account.server));
        let username = non_empty(overrides.username).or(non_empty(account.username));
        let password = non_empty(overrides.password).or(non_empty(account.password));

        let missing: Vec<&str> = [
            ("username", username.is_none()),
            ("password", password.is_none()),
            ("server", server.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        let (Some(server), Some(username), Some(password)) = (server, username, password) else {
            return Err(AttacheError::Config(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )));
        };

        let exclude = match (overrides.exclude, extract.exclude) {
            (Some(list), _) => ExclusionSet::parse(&list),
            (None, Some(names)) => ExclusionSet::new(names),
            (None, None) => ExclusionSet::parse(DEFAULT_EXCLUDE),
        };

        let fetch_batch = overrides
            .fetch_batch
            .or(extract.fetch_batch)
            .unwrap_or(DEFAULT_FETCH_BATCH);
        if fetch_batch == 0 {
            return Err(AttacheError::Config("fetch batch must be at least 1".into()));
        }

        Ok(Self {
            general,
            account: AccountConfig {
                server,
                port: overrides.port.or(account.port).unwrap_or(DEFAULT_PORT),
                tls: overrides.tls.or(account.tls).unwrap_or(true),
                username,
                password,
            },
            extract: ExtractConfig {
                output_root: overrides
                    .path
                    .or(extract.path)
                    .unwrap_or_else(|| PathBuf::from(".")),
                exclude,
                fetch_batch,
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ── Load ────────────────────────────────────────────────────────

/// Where the file configuration came from.
#[derive(Debug)]
pub enum FileSource {
    /// No file at the given or standard location.
    Absent,
    /// The file was read and parsed.
    Loaded(PathBuf),
    /// The file exists but was unusable; defaults apply instead.
    Rejected { path: PathBuf, error: AttacheError },
}

impl FileSource {
    /// Log how the file configuration was obtained.
    ///
    /// Loading happens before logging is configured (the file may set the
    /// log level), so the outcome is reported afterwards through this call.
    pub fn log(&self) {
        match self {
            Self::Absent => tracing::debug!("No config file, using defaults"),
            Self::Loaded(path) => tracing::info!(path = %path.display(), "Loaded config"),
            Self::Rejected { path, error } => tracing::warn!(
                path = %path.display(),
                error = %error,
                "Unusable config file, using defaults"
            ),
        }
    }
}

/// Load the file configuration from `path`, or from the standard location.
///
/// Returns the defaults if no file is found or it cannot be read or parsed;
/// the returned [`FileSource`] says which.
pub fn load_file_config(path: Option<&Path>) -> (FileConfig, FileSource) {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return (FileConfig::default(), FileSource::Absent);
    };
    if !path.exists() {
        return (FileConfig::default(), FileSource::Absent);
    }
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| AttacheError::io(&path, e))
        .and_then(|contents| {
            toml::from_str::<FileConfig>(&contents)
                .map_err(|e| AttacheError::Config(format!("invalid TOML: {e}")))
        });
    match parsed {
        Ok(cfg) => (cfg, FileSource::Loaded(path)),
        Err(error) => (FileConfig::default(), FileSource::Rejected { path, error }),
    }
}

/// Standard config file location.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("attache").join("config.toml"))
}

/// Directory for the log file.
pub fn cache_dir(general: &GeneralConfig) -> PathBuf {
    if let Some(ref dir) = general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("attache")
}
