//! Configuration file watcher for hot reload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::DirectorConfig;

/// Watches the config file and forwards every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<DirectorConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<DirectorConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors and deploy tools that replace the file by rename are noticed.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(OsString::from);
        let path = self.path.clone();
        let tx = self.update_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };

                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(OsString::from) == file_name);
                let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
                if !touches_config || !relevant {
                    return;
                }

                match load_config(&path) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Config file changed, reloading");
                        if tx.send(config).is_err() {
                            tracing::debug!("Config receiver gone, dropping reloaded config");
                        }
                    }
                    Err(e) => tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Rejected config change, keeping current configuration"
                    ),
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_valid_change_is_forwarded_and_invalid_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("director.toml");
        fs::write(&path, "[throttle]\nmax_requests = 30\n").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&path, "[throttle]\nmax_requests = 0\n").unwrap();
        fs::write(&path, "[throttle]\nmax_requests = 5\n").unwrap();

        let config = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match updates.recv().await {
                    Some(config) if config.throttle.max_requests == 5 => break config,
                    Some(config) => assert_ne!(config.throttle.max_requests, 0),
                    None => panic!("watcher closed"),
                }
            }
        })
        .await
        .expect("no reload observed");
        assert_eq!(config.throttle.max_requests, 5);
    }
}
