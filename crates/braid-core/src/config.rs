use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::BraidError;

/// Relative location of the project config under the working directory.
pub const PROJECT_CONFIG_PATH: &str = ".braid/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_merge_method")]
    pub merge_method: String,
    /// Reject unknown merge methods instead of falling back to interleave.
    #[serde(default)]
    pub strict_merge_method: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            vector_weight: default_vector_weight(),
            merge_method: default_merge_method(),
            strict_merge_method: false,
        }
    }
}

/// Where each collaborator's data lives.
///
/// Relative paths resolve against the project root when the config file sits
/// in `.braid/` (or no file exists), and against the config file's own
/// directory otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub vector: Option<PathBuf>,
    #[serde(default)]
    pub graph: Option<PathBuf>,
    #[serde(default = "default_store")]
    pub store: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            vector: None,
            graph: None,
            store: default_store(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Project config with paths resolved and environment overrides applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    /// File the project config was read from, if any.
    pub config_path: Option<PathBuf>,
}

impl EffectiveConfig {
    /// True when at least one retrieval source is configured.
    #[must_use]
    pub const fn has_any_source(&self) -> bool {
        self.project.sources.vector.is_some() || self.project.sources.graph.is_some()
    }
}

/// Load a project config from an explicit file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content).map_err(|err| {
        BraidError::ConfigParse {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
        .into()
    })
}

/// Load `.braid/config.toml` under `project_root`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_CONFIG_PATH);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    load_config_file(&path)
}

/// Load `~/.config/braid/config.toml`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("braid/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the effective configuration for a run.
///
/// `explicit` (the `--config` flag) wins over `.braid/config.toml`. Source
/// paths are made absolute relative to the config file's directory, and
/// `BRAID_LIMIT`, `BRAID_VECTOR_WEIGHT`, `BRAID_MERGE_METHOD` override the
/// `[search]` table.
///
/// # Errors
///
/// Returns an error if a config file cannot be read or parsed.
pub fn resolve_config(project_root: &Path, explicit: Option<&Path>) -> Result<EffectiveConfig> {
    let (mut project, config_path) = match explicit {
        Some(path) => (load_config_file(path)?, Some(path.to_path_buf())),
        None => {
            let path = project_root.join(PROJECT_CONFIG_PATH);
            let exists = path.exists();
            (
                load_project_config(project_root)?,
                exists.then_some(path),
            )
        }
    };

    let base = config_path
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| {
            if dir.ends_with(".braid") {
                dir.parent().unwrap_or(dir).to_path_buf()
            } else {
                dir.to_path_buf()
            }
        })
        .unwrap_or_else(|| project_root.to_path_buf());
    resolve_source_paths(&mut project.sources, &base);

    apply_env_overrides(
        &mut project.search,
        env::var("BRAID_LIMIT").ok().as_deref(),
        env::var("BRAID_VECTOR_WEIGHT").ok().as_deref(),
        env::var("BRAID_MERGE_METHOD").ok(),
    );

    Ok(EffectiveConfig {
        project,
        user: load_user_config()?,
        config_path,
    })
}

fn resolve_source_paths(sources: &mut SourcesConfig, base: &Path) {
    let absolutize = |path: &Path| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    };

    sources.vector = sources.vector.as_deref().map(absolutize);
    sources.graph = sources.graph.as_deref().map(absolutize);
    sources.store = absolutize(&sources.store);
}

fn apply_env_overrides(
    search: &mut SearchConfig,
    limit: Option<&str>,
    vector_weight: Option<&str>,
    merge_method: Option<String>,
) {
    if let Some(raw) = limit {
        match raw.trim().parse() {
            Ok(value) => search.limit = value,
            Err(_) => tracing::warn!(value = raw, "ignoring invalid BRAID_LIMIT"),
        }
    }

    if let Some(raw) = vector_weight {
        match raw.trim().parse() {
            Ok(value) => search.vector_weight = value,
            Err(_) => tracing::warn!(value = raw, "ignoring invalid BRAID_VECTOR_WEIGHT"),
        }
    }

    if let Some(method) = merge_method.filter(|m| !m.trim().is_empty()) {
        search.merge_method = method;
    }
}

const fn default_limit() -> usize {
    10
}

const fn default_vector_weight() -> f64 {
    0.5
}

fn default_merge_method() -> String {
    "weighted".to_string()
}

fn default_store() -> PathBuf {
    PathBuf::from(".braid/documents.sqlite3")
}
