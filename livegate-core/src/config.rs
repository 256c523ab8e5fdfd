//! Configuration file support for livegate
//!
//! Loads project-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.livegaterc.json` in project root
//! 3. `livegate.config.json` in project root
//!
//! All fields are optional.

use crate::rating::{DebtRatingGrid, DEFAULT_RATING_GRID};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the SQLite database, relative to the project root
pub const DEFAULT_DATABASE: &str = ".livegate/livegate.db";

/// livegate configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiveGateConfig {
    /// Upper debt density bounds of ratings A, B, C and D (default: [0.05, 0.1, 0.2, 0.5])
    #[serde(default)]
    pub rating_grid: Option<Vec<f64>>,

    /// Path of the SQLite database (default: .livegate/livegate.db)
    #[serde(default)]
    pub database: Option<PathBuf>,
}

/// Resolved configuration, carried by quality gate change events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub debt_rating_grid: DebtRatingGrid,
    pub database: PathBuf,
    /// Path the config was loaded from (None if defaults)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
}

impl LiveGateConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref grid) = self.rating_grid {
            if grid.len() != 4 {
                anyhow::bail!("rating_grid must hold exactly 4 values (got {})", grid.len());
            }
            for (i, bound) in grid.iter().enumerate() {
                if *bound < 0.0 {
                    anyhow::bail!("rating_grid[{}] must be non-negative (got {})", i, bound);
                }
            }
            for pair in grid.windows(2) {
                if pair[0] >= pair[1] {
                    anyhow::bail!(
                        "rating_grid must be strictly increasing ({} is not less than {})",
                        pair[0],
                        pair[1]
                    );
                }
            }
        }

        if let Some(ref database) = self.database {
            if database.as_os_str().is_empty() {
                anyhow::bail!("database must not be empty");
            }
        }

        Ok(())
    }

    /// Resolve config into the form used by a recomputation pass
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let debt_rating_grid = match &self.rating_grid {
            Some(grid) => DebtRatingGrid::from_slice(grid)?,
            None => DebtRatingGrid::new(DEFAULT_RATING_GRID)?,
        };

        Ok(ResolvedConfig {
            debt_rating_grid,
            database: self
                .database
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        LiveGateConfig::default().resolve()
    }
}

/// Discover and load a config file from the project root
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(LiveGateConfig, PathBuf)>> {
    for name in [".livegaterc.json", "livegate.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<LiveGateConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: LiveGateConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// A relative database path is taken relative to the project root.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (LiveGateConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if resolved.database.is_relative() {
        resolved.database = project_root.join(&resolved.database);
    }
    resolved.config_path = source_path;
    Ok(resolved)
}
