use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "trigrep";
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the index file location
pub const INDEX_PATH_ENV: &str = "TRIGREP_INDEX_PATH";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Flush threshold of the segmented builder, in estimated bytes
    #[serde(default = "default_max_segment_bytes")]
    pub max_segment_bytes: u64,

    /// Files larger than this are not indexed; searches always read them
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Worker threads for indexing and search. 0 uses the CPU count
    #[serde(default)]
    pub threads: usize,
}

fn default_max_segment_bytes() -> u64 {
    128 * 1024 * 1024
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: default_max_segment_bytes(),
            max_file_size: default_max_file_size(),
            threads: 0,
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Thread count with 0 resolved to the CPU count
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.threads
        }
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_app_data_dir()?.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Directory holding the default per-directory index files
pub fn get_indexes_dir() -> Result<PathBuf> {
    let dir = get_app_data_dir()?.join("indexes");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// 32-bit string hash that is stable across runs and platforms:
/// `h = 37; h = h * 31 + unit` over the UTF-16 code units, wrapping.
pub fn stable_hash(text: &str) -> u32 {
    text.encode_utf16()
        .fold(37u32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as u32))
}

/// Index file name for a directory: `<dir name>.<stable hash as 8 hex digits>`
pub fn index_file_name(directory: &Path) -> String {
    let full = directory.to_string_lossy();
    let full = full.trim_end_matches(std::path::MAIN_SEPARATOR);
    let name = Path::new(full)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.{:08x}", name, stable_hash(full))
}

/// Where an index file lives and how it was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLocation {
    pub index_path: PathBuf,
    /// Whether the file already exists
    pub exists: bool,
}

/// Resolve the index file for `directory`.
///
/// Priority: the `TRIGREP_INDEX_PATH` variable, then the explicit flag, then
/// the nearest existing default index of `directory` or one of its parents,
/// then the default index path of `directory` itself.
pub fn resolve_index_path(directory: &Path, flag: Option<&Path>) -> Result<IndexLocation> {
    let env = std::env::var_os(INDEX_PATH_ENV).map(PathBuf::from);
    let explicit = env.or_else(|| flag.map(Path::to_path_buf));
    let index_path = match explicit {
        Some(path) => path,
        None => find_existing_index(directory, &get_indexes_dir()?),
    };
    Ok(IndexLocation {
        exists: index_path.is_file(),
        index_path,
    })
}

/// Nearest default index of `origin` or a parent, falling back to the
/// default path of `origin`
pub fn find_existing_index(origin: &Path, indexes_dir: &Path) -> PathBuf {
    for directory in origin.ancestors() {
        let candidate = indexes_dir.join(index_file_name(directory));
        if candidate.is_file() {
            return candidate;
        }
    }
    indexes_dir.join(index_file_name(origin))
}

/// Remove an index file if present
pub fn remove_index(index_path: &Path) -> Result<()> {
    if index_path.exists() {
        fs::remove_file(index_path)
            .with_context(|| format!("Failed to remove index {}", index_path.display()))?;
    }
    Ok(())
}
