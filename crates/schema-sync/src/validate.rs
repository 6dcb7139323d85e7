//! Validation orchestrator - compare many environments at once.
//!
//! Snapshots are taken concurrently on tokio's blocking pool, bounded by a
//! semaphore. Each requested pair is then diffed. One environment failing
//! never cancels the others: every pair involving it is reported as errored
//! and the rest are compared normally.

use crate::{ConfigError, DiffOptions, SchemaDiff, SnapshotError, SnapshotSource, try_diff};
use schema_sync_model::Schema;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Overall result of a comparison, independent of how it is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoDifferences,
    DifferencesFound,
    SnapshotFailed,
}

/// A named environment and where its snapshot comes from.
#[derive(Clone)]
pub struct Environment {
    pub name: String,
    pub source: Arc<dyn SnapshotSource>,
}

impl Environment {
    pub fn new(name: impl Into<String>, source: impl SnapshotSource + 'static) -> Self {
        Self {
            name: name.into(),
            source: Arc::new(source),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("source", &self.source.describe())
            .finish()
    }
}

/// Which pairs get compared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Topology {
    /// Every ordered pair of distinct environments.
    #[default]
    AllPairs,
    /// The baseline against each other environment.
    Star { baseline: String },
}

/// Result for one (source, target) pair.
#[derive(Debug, Clone)]
pub enum PairOutcome {
    Matched,
    Differs(SchemaDiff),
    /// A snapshot for one side failed; carries the failing environment's error.
    Errored {
        environment: String,
        error: Arc<SnapshotError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    DifferencesFound,
    Errored,
}

impl Verdict {
    pub fn outcome(&self) -> Outcome {
        match self {
            Verdict::Passed => Outcome::NoDifferences,
            Verdict::DifferencesFound => Outcome::DifferencesFound,
            Verdict::Errored => Outcome::SnapshotFailed,
        }
    }
}

/// All pair results, keyed by (source, target).
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pairs: BTreeMap<(String, String), PairOutcome>,
    failures: BTreeMap<String, Arc<SnapshotError>>,
}

impl ValidationReport {
    pub fn pairs(&self) -> &BTreeMap<(String, String), PairOutcome> {
        &self.pairs
    }

    pub fn get(&self, source: &str, target: &str) -> Option<&PairOutcome> {
        self.pairs.get(&(source.to_string(), target.to_string()))
    }

    /// Environments whose snapshot failed.
    pub fn failures(&self) -> &BTreeMap<String, Arc<SnapshotError>> {
        &self.failures
    }

    pub fn verdict(&self) -> Verdict {
        let outcomes = || self.pairs.values();
        if outcomes().any(|p| matches!(p, PairOutcome::Errored { .. })) {
            Verdict::Errored
        } else if outcomes().any(|p| matches!(p, PairOutcome::Differs(_))) {
            Verdict::DifferencesFound
        } else {
            Verdict::Passed
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.verdict().outcome()
    }
}

/// Snapshot every environment and compare the pairs `topology` asks for.
///
/// Configuration problems are rejected before any snapshot is taken.
pub async fn validate(
    environments: &[Environment],
    options: &DiffOptions,
    topology: &Topology,
    concurrency: usize,
) -> Result<ValidationReport, ConfigError> {
    check_config(environments, topology, concurrency)?;

    let snapshots = take_snapshots(environments, concurrency).await;

    let mut failures = BTreeMap::new();
    for (env, snapshot) in environments.iter().zip(&snapshots) {
        if let Err(error) = snapshot {
            failures.insert(env.name.clone(), error.clone());
        }
    }

    let pair_indices: Vec<(usize, usize)> = match topology {
        Topology::AllPairs => (0..environments.len())
            .flat_map(|i| (0..environments.len()).map(move |j| (i, j)))
            .filter(|(i, j)| i != j)
            .collect(),
        Topology::Star { baseline } => {
            let base = environments
                .iter()
                .position(|env| &env.name == baseline)
                .ok_or_else(|| ConfigError::UnknownBaseline(baseline.clone()))?;
            (0..environments.len())
                .filter(|&j| j != base)
                .map(|j| (base, j))
                .collect()
        }
    };

    let mut pairs = BTreeMap::new();
    for (i, j) in pair_indices {
        let outcome = match (&snapshots[i], &snapshots[j]) {
            (Ok(source), Ok(target)) => {
                let diff = try_diff(source, target, options)?;
                if diff.is_empty() {
                    PairOutcome::Matched
                } else {
                    PairOutcome::Differs(diff)
                }
            }
            (Err(error), _) => PairOutcome::Errored {
                environment: environments[i].name.clone(),
                error: error.clone(),
            },
            (_, Err(error)) => PairOutcome::Errored {
                environment: environments[j].name.clone(),
                error: error.clone(),
            },
        };
        pairs.insert(
            (environments[i].name.clone(), environments[j].name.clone()),
            outcome,
        );
    }

    let report = ValidationReport { pairs, failures };
    tracing::debug!(
        environments = environments.len(),
        pairs = report.pairs.len(),
        verdict = ?report.verdict(),
        "validation finished"
    );
    Ok(report)
}

fn check_config(
    environments: &[Environment],
    topology: &Topology,
    concurrency: usize,
) -> Result<(), ConfigError> {
    if environments.len() < 2 {
        return Err(ConfigError::TooFewEnvironments(environments.len()));
    }
    if concurrency == 0 {
        return Err(ConfigError::ZeroConcurrency);
    }
    let mut seen = HashSet::new();
    for env in environments {
        if !seen.insert(env.name.as_str()) {
            return Err(ConfigError::DuplicateEnvironment(env.name.clone()));
        }
    }
    if let Topology::Star { baseline } = topology {
        if !seen.contains(baseline.as_str()) {
            return Err(ConfigError::UnknownBaseline(baseline.clone()));
        }
    }
    Ok(())
}

/// Snapshot all environments, at most `concurrency` at a time. Results are
/// returned in input order regardless of completion order.
async fn take_snapshots(
    environments: &[Environment],
    concurrency: usize,
) -> Vec<Result<Schema, Arc<SnapshotError>>> {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::with_capacity(environments.len());

    for env in environments {
        let unavailable = |message: String| SnapshotError::Unavailable {
            source_name: env.name.clone(),
            message,
        };
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                handles.push(Err(unavailable(e.to_string())));
                continue;
            }
        };
        let source = env.source.clone();
        let span = tracing::debug_span!("snapshot", environment = %env.name);
        handles.push(Ok(tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            let _permit = permit;
            tracing::debug!(source = %source.describe(), "taking snapshot");
            source.snapshot()
        })));
    }

    let mut snapshots = Vec::with_capacity(handles.len());
    for (env, handle) in environments.iter().zip(handles) {
        let result = match handle {
            Ok(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(SnapshotError::Unavailable {
                    source_name: env.name.clone(),
                    message: format!("snapshot task failed: {}", e),
                }),
            },
            Err(error) => Err(error),
        };
        if let Err(error) = &result {
            tracing::warn!(environment = %env.name, %error, "snapshot failed");
        }
        snapshots.push(result.map_err(Arc::new));
    }
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_sync_model::{Column, LogicalType, Table};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Unreachable;

    impl SnapshotSource for Unreachable {
        fn describe(&self) -> String {
            "postgres://staging".to_string()
        }

        fn snapshot(&self) -> Result<Schema, SnapshotError> {
            Err(SnapshotError::Unavailable {
                source_name: "staging".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    /// Records the peak number of snapshots running at once.
    struct Tracked {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl SnapshotSource for Tracked {
        fn describe(&self) -> String {
            "tracked".to_string()
        }

        fn snapshot(&self) -> Result<Schema, SnapshotError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Schema::new())
        }
    }

    fn users(extra: Option<&str>) -> Schema {
        let mut table = Table::new("users").column(Column::new("id", LogicalType::Integer));
        if let Some(extra) = extra {
            table = table.column(Column::new(extra, LogicalType::Text));
        }
        Schema::from_tables(vec![table]).unwrap()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[tokio::test]
    async fn test_case_folded_collision_is_a_config_error() {
        let envs = vec![
            Environment::new("dev", users(Some("ID"))),
            Environment::new("prod", users(None)),
        ];
        let options = DiffOptions::new(
            Vec::<String>::new(),
            crate::CompareOptions::default(),
            schema_sync_model::Casing::Insensitive,
        )
        .unwrap();

        let err = validate(&envs, &options, &Topology::AllPairs, 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AmbiguousNames(schema_sync_model::ModelError::DuplicateColumn { column, .. })
                if column == "ID"
        ));
    }

    #[tokio::test]
    async fn test_identical_environments_pass() {
        let envs = vec![
            Environment::new("dev", users(None)),
            Environment::new("prod", users(None)),
        ];
        let report = validate(&envs, &DiffOptions::default(), &Topology::AllPairs, 4)
            .await
            .unwrap();
        assert_eq!(report.pairs().len(), 2);
        assert_eq!(report.verdict(), Verdict::Passed);
        assert_eq!(report.outcome(), Outcome::NoDifferences);
    }

    #[tokio::test]
    async fn test_failing_environment_only_errors_its_pairs() {
        let envs = vec![
            Environment::new("dev", users(Some("bio"))),
            Environment::new("prod", users(None)),
            Environment::new("staging", Unreachable),
        ];
        let report = validate(&envs, &DiffOptions::default(), &Topology::AllPairs, 2)
            .await
            .unwrap();

        let keys: Vec<_> = report.pairs().keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                key("dev", "prod"),
                key("dev", "staging"),
                key("prod", "dev"),
                key("prod", "staging"),
                key("staging", "dev"),
                key("staging", "prod"),
            ]
        );
        assert!(matches!(report.get("dev", "prod"), Some(PairOutcome::Differs(_))));
        assert!(matches!(report.get("prod", "dev"), Some(PairOutcome::Differs(_))));
        let errored = report
            .pairs()
            .values()
            .filter(|p| matches!(p, PairOutcome::Errored { environment, .. } if environment == "staging"))
            .count();
        assert_eq!(errored, 4);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.verdict(), Verdict::Errored);
        assert_eq!(report.outcome(), Outcome::SnapshotFailed);
    }

    #[tokio::test]
    async fn test_star_topology_compares_against_baseline() {
        let envs = vec![
            Environment::new("dev", users(Some("bio"))),
            Environment::new("prod", users(None)),
            Environment::new("qa", users(None)),
        ];
        let topology = Topology::Star {
            baseline: "prod".to_string(),
        };
        let report = validate(&envs, &DiffOptions::default(), &topology, 4)
            .await
            .unwrap();

        let keys: Vec<_> = report.pairs().keys().cloned().collect();
        assert_eq!(keys, vec![key("prod", "dev"), key("prod", "qa")]);
        assert!(matches!(report.get("prod", "qa"), Some(PairOutcome::Matched)));
        assert_eq!(report.verdict(), Verdict::DifferencesFound);
    }

    #[tokio::test]
    async fn test_rejects_bad_configuration() {
        let one = vec![Environment::new("dev", users(None))];
        assert_eq!(
            validate(&one, &DiffOptions::default(), &Topology::AllPairs, 1)
                .await
                .unwrap_err(),
            ConfigError::TooFewEnvironments(1)
        );

        let dup = vec![
            Environment::new("dev", users(None)),
            Environment::new("dev", users(None)),
        ];
        assert_eq!(
            validate(&dup, &DiffOptions::default(), &Topology::AllPairs, 1)
                .await
                .unwrap_err(),
            ConfigError::DuplicateEnvironment("dev".to_string())
        );

        let two = vec![
            Environment::new("dev", users(None)),
            Environment::new("prod", users(None)),
        ];
        let topology = Topology::Star {
            baseline: "qa".to_string(),
        };
        assert_eq!(
            validate(&two, &DiffOptions::default(), &topology, 1)
                .await
                .unwrap_err(),
            ConfigError::UnknownBaseline("qa".to_string())
        );
        assert_eq!(
            validate(&two, &DiffOptions::default(), &Topology::AllPairs, 0)
                .await
                .unwrap_err(),
            ConfigError::ZeroConcurrency
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let envs: Vec<_> = (0..4)
            .map(|i| {
                Environment::new(
                    format!("env{}", i),
                    Tracked {
                        running: running.clone(),
                        peak: peak.clone(),
                    },
                )
            })
            .collect();

        let report = validate(&envs, &DiffOptions::default(), &Topology::AllPairs, 1)
            .await
            .unwrap();
        assert_eq!(report.pairs().len(), 12);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
