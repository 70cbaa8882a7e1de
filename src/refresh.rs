//! The throttled refresh cycle: freshness gate, lock, generate, publish.

use std::time::SystemTime;

use anyhow::Result;

use crate::aggregate::aggregate;
use crate::cache::{self, LockOutcome, Snapshot};
use crate::config::Config;
use crate::process::{self, build_children_index, Measurement, ParentMap};
use crate::tmux::{Pane, TmuxClient};

/// Sources of raw system data. Each degrades to an empty result on failure.
pub trait Probe {
    async fn sample_memory(&self) -> Measurement;
    async fn list_parents(&self) -> ParentMap;
    async fn list_panes(&self) -> Vec<Pane>;
}

/// Probe backed by `top`/procfs, `ps` and tmux
pub struct SystemProbe {
    tmux: TmuxClient,
    config: Config,
}

impl SystemProbe {
    pub fn new(config: &Config) -> Self {
        Self {
            tmux: TmuxClient::new(config.tmux_path.clone(), config.command_timeout()),
            config: config.clone(),
        }
    }
}

impl Probe for SystemProbe {
    async fn sample_memory(&self) -> Measurement {
        process::sample_memory(self.config.command_timeout()).await
    }

    async fn list_parents(&self) -> ParentMap {
        process::list_parents(self.config.command_timeout()).await
    }

    async fn list_panes(&self) -> Vec<Pane> {
        self.tmux.list_panes().await
    }
}

/// What a refresh invocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache is within the staleness window
    Fresh,
    /// Another refresh holds the lock
    Contended,
    /// Removed a crashed run's lock and skipped generation
    StaleLockCleared,
    /// A new snapshot was published
    Published { panes: usize },
}

/// Regenerate the snapshot unless it is fresh or another run is generating
pub async fn refresh<P: Probe>(config: &Config, probe: &P) -> Result<RefreshOutcome> {
    if cache::is_fresh(&config.cache_file, config.stale_window()) {
        return Ok(RefreshOutcome::Fresh);
    }

    let _guard = match cache::try_lock(&config.lock_file, config.lock_expiry())? {
        LockOutcome::Acquired(guard) => guard,
        LockOutcome::Contended => {
            tracing::debug!("refresh already in progress");
            return Ok(RefreshOutcome::Contended);
        }
        LockOutcome::StaleReclaimed => return Ok(RefreshOutcome::StaleLockCleared),
    };

    let snapshot = generate(probe).await;
    let panes = snapshot.pane.len();
    cache::publish(&config.cache_file, &snapshot)?;

    tracing::debug!(panes, total = %snapshot.total, "published snapshot");
    Ok(RefreshOutcome::Published { panes })
}

async fn generate<P: Probe>(probe: &P) -> Snapshot {
    let (measurement, parents, panes) = tokio::join!(
        probe.sample_memory(),
        probe.list_parents(),
        probe.list_panes(),
    );
    tracing::debug!(
        sampled = measurement.len(),
        processes = parents.len(),
        panes = panes.len(),
        "collected system data"
    );

    let children = build_children_index(&parents);
    let totals = aggregate(&panes, &measurement, &children);
    Snapshot::from_totals(&totals, SystemTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::Duration;

    /// Canned data plus a count of every probe call
    #[derive(Default)]
    struct FakeProbe {
        measurement: Measurement,
        parents: ParentMap,
        panes: Vec<Pane>,
        calls: Cell<usize>,
    }

    impl FakeProbe {
        fn single_pane(measurement: Measurement) -> Self {
            Self {
                measurement,
                parents: ParentMap::from([(101, 100), (102, 101)]),
                panes: vec![Pane {
                    session: "work".to_string(),
                    window_index: "1".to_string(),
                    window_id: "@1".to_string(),
                    pane_id: "%0".to_string(),
                    pid: 100,
                }],
                calls: Cell::new(0),
            }
        }
    }

    impl Probe for FakeProbe {
        async fn sample_memory(&self) -> Measurement {
            self.calls.set(self.calls.get() + 1);
            self.measurement.clone()
        }

        async fn list_parents(&self) -> ParentMap {
            self.calls.set(self.calls.get() + 1);
            self.parents.clone()
        }

        async fn list_panes(&self) -> Vec<Pane> {
            self.calls.set(self.calls.get() + 1);
            self.panes.clone()
        }
    }

    fn config_in(dir: &Path) -> Config {
        Config {
            cache_file: dir.join("mem.json"),
            lock_file: dir.join("mem.lock"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_publishes_pane_window_and_total() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let probe =
            FakeProbe::single_pane(Measurement::from([(100, 50.0), (101, 10.0), (102, 5.0)]));

        let outcome = refresh(&config, &probe).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Published { panes: 1 });

        let snap = cache::read_snapshot(&config.cache_file).unwrap();
        assert_eq!(snap.pane["%0"], "65M");
        assert_eq!(snap.window["work:1"], "65M");
        assert_eq!(snap.total, "65M");
        assert!(!config.lock_file.exists());
    }

    #[tokio::test]
    async fn test_exited_process_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let probe = FakeProbe::single_pane(Measurement::from([(100, 50.0), (101, 10.0)]));

        refresh(&config, &probe).await.unwrap();
        let snap = cache::read_snapshot(&config.cache_file).unwrap();
        assert_eq!(snap.pane["%0"], "60M");
    }

    #[tokio::test]
    async fn test_second_call_within_window_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let probe = FakeProbe::single_pane(Measurement::from([(100, 1.0)]));

        refresh(&config, &probe).await.unwrap();
        let calls_after_first = probe.calls.get();
        assert_eq!(calls_after_first, 3);

        let outcome = refresh(&config, &probe).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Fresh);
        assert_eq!(probe.calls.get(), calls_after_first);
    }

    #[tokio::test]
    async fn test_stale_cache_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let probe = FakeProbe::single_pane(Measurement::from([(100, 1.0)]));

        refresh(&config, &probe).await.unwrap();
        let file = File::options().write(true).open(&config.cache_file).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();

        let outcome = refresh(&config, &probe).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Published { panes: 1 });
        assert_eq!(probe.calls.get(), 6);
    }

    #[tokio::test]
    async fn test_live_lock_skips_generation() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.lock_file, "").unwrap();
        let probe = FakeProbe::default();

        let outcome = refresh(&config, &probe).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Contended);
        assert_eq!(probe.calls.get(), 0);
        assert!(config.lock_file.exists());
        assert!(!config.cache_file.exists());
    }

    #[tokio::test]
    async fn test_expired_lock_cleared_without_generating() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.lock_file, "").unwrap();
        let file = File::options().write(true).open(&config.lock_file).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(120))
            .unwrap();
        let probe = FakeProbe::default();

        let outcome = refresh(&config, &probe).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::StaleLockCleared);
        assert!(!config.lock_file.exists());
        assert!(!config.cache_file.exists());
        assert_eq!(probe.calls.get(), 0);

        let outcome = refresh(&config, &probe).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Published { panes: 0 });
    }

    #[tokio::test]
    async fn test_empty_sources_publish_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        refresh(&config, &FakeProbe::default()).await.unwrap();
        let snap = cache::read_snapshot(&config.cache_file).unwrap();
        assert!(snap.pane.is_empty());
        assert!(snap.window.is_empty());
        assert_eq!(snap.total, "0M");
    }

    #[tokio::test]
    async fn test_publish_failure_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.cache_file = dir.path().join("absent").join("mem.json");

        let result = refresh(&config, &FakeProbe::default()).await;
        assert!(result.is_err());
        assert!(!config.lock_file.exists());
    }
}
