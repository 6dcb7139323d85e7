//! Configuration file handling for schema-sync.
//!
//! Looks for `.config/schema-sync.styx` in the current directory or any parent directory.

pub use schema_sync_config::Config;

use camino::{Utf8Path, Utf8PathBuf};
use schema_sync::{
    Casing, CompareOptions, DiffOptions, Environment, FixtureFile, Topology,
};
use std::path::{Path, PathBuf};

const CONFIG_PATH: &str = ".config/schema-sync.styx";

/// A parsed config plus the directory its relative snapshot paths resolve against.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub path: PathBuf,
    pub root: Utf8PathBuf,
}

/// Load configuration from `.config/schema-sync.styx`, searching up the directory tree.
pub fn load() -> Result<Loaded, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(e.to_string()))?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<Loaded, ConfigError> {
    let config_path = find_config_file(start)?;
    load_path(&config_path)
}

/// Load configuration from an explicit file.
pub fn load_path(config_path: &Path) -> Result<Loaded, ConfigError> {
    let content =
        std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io(e.to_string()))?;

    let config: Config =
        facet_styx::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let root = project_root(config_path);
    let root = Utf8PathBuf::from_path_buf(root)
        .map_err(|p| ConfigError::NonUtf8Path(p.display().to_string()))?;

    tracing::debug!(path = %config_path.display(), environments = config.environments.len(), "loaded config");
    Ok(Loaded {
        config,
        path: config_path.to_path_buf(),
        root,
    })
}

/// Find `.config/schema-sync.styx` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_PATH);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// `a/.config/schema-sync.styx` resolves against `a`, any other file against its directory.
fn project_root(config_path: &Path) -> PathBuf {
    let dir = config_path.parent().unwrap_or(Path::new("."));
    if dir.file_name().is_some_and(|name| name == ".config") {
        dir.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

impl Loaded {
    pub fn casing(&self) -> Casing {
        if self.config.case_insensitive {
            Casing::Insensitive
        } else {
            Casing::Sensitive
        }
    }

    pub fn diff_options(&self) -> Result<DiffOptions, ConfigError> {
        let compare = CompareOptions {
            check_indexes: self.config.compare.indexes(),
            check_constraints: self.config.compare.constraints(),
            check_defaults: self.config.compare.defaults(),
        };
        Ok(DiffOptions::new(
            self.config.ignore_tables.iter().cloned(),
            compare,
            self.casing(),
        )?)
    }

    pub fn topology(&self) -> Topology {
        match &self.config.baseline {
            Some(baseline) => Topology::Star {
                baseline: baseline.clone(),
            },
            None => Topology::AllPairs,
        }
    }

    /// Build one snapshot source per configured environment, in declaration order.
    pub fn environments(&self) -> Result<Vec<Environment>, ConfigError> {
        let casing = self.casing();
        self.config
            .environments
            .iter()
            .map(|(name, env)| {
                let expanded = expand_vars(&env.snapshot, |var| std::env::var(var).ok())?;
                let path = resolve(&self.root, Utf8Path::new(&expanded));
                Ok(Environment::new(
                    name.clone(),
                    FixtureFile::new(path).with_casing(casing),
                ))
            })
            .collect()
    }
}

fn resolve(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Replace `${NAME}` references using `lookup`. An unterminated `${` is kept as is.
fn expand_vars(
    raw: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| ConfigError::UndefinedVariable(name.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No `.config/schema-sync.styx` found in any parent directory
    #[error("No .config/schema-sync.styx found in current directory or any parent")]
    NotFound,

    /// I/O error reading the file
    #[error("Failed to read config: {0}")]
    Io(String),

    /// Parse error in the Styx file
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("environment variable '{0}' referenced in config is not set")]
    UndefinedVariable(String),

    #[error("config path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error(transparent)]
    Invalid(#[from] schema_sync::ConfigError),
}
