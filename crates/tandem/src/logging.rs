//! Log sink setup.
//!
//! `RUST_LOG` overrides the default filter.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// With a path, events are appended to that file without color codes;
/// otherwise they go to stderr. Fails if a subscriber is already installed.
pub fn init(logfile: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match logfile {
        Some(path) => {
            let file = open_log_file(path)?;
            builder
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| Error::Logger(e.to_string()))?;

    if let Some(path) = logfile {
        tracing::info!(path = %path.display(), "logging initialized");
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    let open = || -> std::io::Result<std::fs::File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    };

    open().map_err(|source| Error::LogFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log").join("tandem.log");

        init(Some(&path)).unwrap();
        tracing::warn!("written to the log file");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("written to the log file"));

        assert!(matches!(init(None), Err(Error::Logger(_))));
    }

    #[test]
    fn test_unopenable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let err = open_log_file(&blocker.join("tandem.log")).unwrap_err();
        assert!(matches!(err, Error::LogFile { .. }));
    }
}
