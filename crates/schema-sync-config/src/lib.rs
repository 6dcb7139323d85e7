//! Facet types for the `.config/schema-sync.styx` validation config.
//!
//! These types can be:
//! - Deserialized from styx using facet-styx
//! - Used to generate a styx schema via facet-styx's schema generation
//!
//! ```styx
//! environments {
//!     staging { snapshot "snapshots/staging.json" }
//!     production { snapshot "${SNAPSHOT_DIR}/production.json" }
//! }
//! ignore-tables ("schema_migrations")
//! compare { defaults false }
//! baseline "production"
//! ```

use facet::Facet;
use indexmap::IndexMap;

/// Top-level validation config.
#[derive(Debug, Clone, Default, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct Config {
    /// Environments to compare, keyed by name, in declaration order.
    #[facet(default)]
    pub environments: IndexMap<String, EnvironmentConfig>,

    /// Tables excluded from every comparison.
    #[facet(default)]
    pub ignore_tables: Vec<String>,

    /// Optional comparison categories.
    #[facet(default)]
    pub compare: CompareConfig,

    /// Compare every environment against this one instead of all pairs.
    pub baseline: Option<String>,

    /// Fold identifier case when matching names.
    #[facet(default)]
    pub case_insensitive: bool,

    /// Maximum number of snapshots taken at once.
    pub concurrency: Option<usize>,

    /// SQL dialect used when a migration is rendered for a differing pair.
    pub dialect: Option<String>,
}

impl Config {
    /// Snapshot concurrency, defaulting to one slot per environment.
    pub fn concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| self.environments.len().max(1))
    }
}

/// Where one environment's snapshot comes from.
#[derive(Debug, Clone, Facet)]
pub struct EnvironmentConfig {
    /// Path to a JSON snapshot. `${VAR}` references are expanded from the
    /// process environment when the config is loaded.
    pub snapshot: String,
}

/// Which optional categories are compared. Unset means compared.
#[derive(Debug, Clone, Default, Facet)]
pub struct CompareConfig {
    pub indexes: Option<bool>,
    pub constraints: Option<bool>,
    pub defaults: Option<bool>,
}

impl CompareConfig {
    pub fn indexes(&self) -> bool {
        self.indexes.unwrap_or(true)
    }

    pub fn constraints(&self) -> bool {
        self.constraints.unwrap_or(true)
    }

    pub fn defaults(&self) -> bool {
        self.defaults.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_styx::RenderError;

    #[test]
    fn compare_defaults_to_everything() {
        let compare = CompareConfig::default();
        assert!(compare.indexes());
        assert!(compare.constraints());
        assert!(compare.defaults());

        let compare = CompareConfig {
            defaults: Some(false),
            ..CompareConfig::default()
        };
        assert!(!compare.defaults());
    }

    #[test]
    fn concurrency_defaults_to_environment_count() {
        let mut config = Config::default();
        assert_eq!(config.concurrency(), 1);

        for name in ["staging", "production", "qa"] {
            config.environments.insert(
                name.to_string(),
                EnvironmentConfig {
                    snapshot: format!("{name}.json"),
                },
            );
        }
        assert_eq!(config.concurrency(), 3);

        config.concurrency = Some(2);
        assert_eq!(config.concurrency(), 2);
    }

    #[test]
    fn parses_styx_document() {
        let source = r#"
environments {
    staging { snapshot "snapshots/staging.json" }
    production { snapshot "snapshots/production.json" }
}
ignore-tables ("schema_migrations" "audit_log")
compare { defaults false }
baseline "production"
"#;
        let result: Result<Config, _> = facet_styx::from_str(source);

        match result {
            Ok(config) => {
                let names: Vec<_> = config.environments.keys().map(String::as_str).collect();
                assert_eq!(names, ["staging", "production"]);
                assert_eq!(
                    config.environments["staging"].snapshot,
                    "snapshots/staging.json"
                );
                assert_eq!(config.ignore_tables, ["schema_migrations", "audit_log"]);
                assert!(config.compare.indexes());
                assert!(!config.compare.defaults());
                assert_eq!(config.baseline.as_deref(), Some("production"));
                assert!(!config.case_insensitive);
            }
            Err(e) => {
                panic!("Failed to parse: {}", e.render("<test>", source));
            }
        }
    }
}
