//! Configuration loading and root folder resolution
//!
//! Root folder resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SRM_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: the resolver logs a
//! warning and falls through to the next tier.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SRM_ROOT_FOLDER";

/// Environment variable overriding the HTTP bind address
pub const BIND_ADDR_ENV: &str = "SRM_BIND_ADDR";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "srm.db";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Per-module TOML configuration file contents
///
/// Every field is optional so that partial files are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub token_ttl_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// Built-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub bind_addr: String,
    pub token_ttl_secs: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            token_ttl_secs: 2 * 60 * 60,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/srm (or /var/lib/srm for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("srm"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/srm"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/srm
        dirs::data_dir()
            .map(|d| d.join("srm"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/srm"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\srm
        dirs::data_local_dir()
            .map(|d| d.join("srm"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\srm"))
    } else {
        PathBuf::from("./srm_data")
    }
}

/// Resolves the root folder (and the rest of the module config) for one module
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Attach the `--root-folder` command-line value (priority 1)
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Candidate config file locations, most specific first
    pub fn config_file_candidates(&self) -> Vec<PathBuf> {
        let file_name = format!("{}.toml", self.module_name);
        let mut candidates = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("srm").join(&file_name));
        }
        if cfg!(target_os = "linux") {
            candidates.push(PathBuf::from("/etc/srm").join(&file_name));
        }
        candidates
    }

    /// Load the first config file that exists, if any
    pub fn load_toml(&self) -> Option<TomlConfig> {
        let path = self
            .config_file_candidates()
            .into_iter()
            .find(|p| p.exists())?;

        match TomlConfig::load(&path) {
            Ok(config) => {
                debug!("Loaded config file {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Resolve the root folder using the four-tier priority order
    pub fn resolve(&self) -> PathBuf {
        self.resolve_with_config(self.load_toml().as_ref())
    }

    /// Same as [`resolve`](Self::resolve) with an already loaded config file
    pub fn resolve_with_config(&self, toml: Option<&TomlConfig>) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(root) = toml.and_then(|c| c.root_folder.clone()) {
            return root;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing. Idempotent.
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// Fully resolved settings for the record service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub token_ttl_secs: u64,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge CLI values, environment, TOML file and compiled defaults
    pub fn resolve(
        module_name: &str,
        cli_root: Option<PathBuf>,
        cli_bind: Option<String>,
    ) -> Self {
        let resolver = RootFolderResolver::new(module_name).with_cli_arg(cli_root);
        let toml = resolver.load_toml();
        let root_folder = resolver.resolve_with_config(toml.as_ref());
        let toml = toml.unwrap_or_default();
        let defaults = CompiledDefaults::for_current_platform();

        let bind_addr = cli_bind
            .or_else(|| std::env::var(BIND_ADDR_ENV).ok())
            .or_else(|| toml.bind_addr.clone())
            .unwrap_or(defaults.bind_addr);

        Self {
            root_folder,
            bind_addr,
            token_ttl_secs: toml.token_ttl_secs.unwrap_or(defaults.token_ttl_secs),
            log_level: toml.logging.level,
        }
    }
}
