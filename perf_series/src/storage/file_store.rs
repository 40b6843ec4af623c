use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufReader, Read, Write},
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use defer::defer;
use itertools::Itertools;
use log::{debug, trace, warn};

use crate::{
    data::BenchRun,
    defaults,
    serialization::{deserialize, serialize_single},
};

use super::{
    storage_definitions::{LOCK_FILE_EXTENSION, SERIES_FILE_EXTENSION},
    storage_types::PersistenceError,
    CommitMode, Persistence,
};

fn map_error_for_backoff(e: PersistenceError) -> ::backoff::Error<PersistenceError> {
    match e {
        PersistenceError::Locked { .. } => ::backoff::Error::transient(e),
        PersistenceError::Io { .. }
        | PersistenceError::Encode { .. }
        | PersistenceError::DuplicateCommit { .. } => ::backoff::Error::permanent(e),
    }
}

/// Stores each series as a file of JSON lines, one bench run per line.
///
/// Writers of a series are serialized through a lock file next to the series
/// file. Every file handle is closed before the function that opened it
/// returns.
#[derive(Debug, Clone)]
pub struct JsonLinesPersistence {
    dir: PathBuf,
    backoff_max_elapsed: Duration,
}

impl JsonLinesPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonLinesPersistence {
            dir: dir.into(),
            backoff_max_elapsed: Duration::from_secs(
                defaults::DEFAULT_BACKOFF_MAX_ELAPSED_SECONDS,
            ),
        }
    }

    #[must_use]
    pub fn with_backoff_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.backoff_max_elapsed = max_elapsed;
        self
    }

    fn series_path(&self, series: &str) -> PathBuf {
        self.dir.join(format!("{series}.{SERIES_FILE_EXTENSION}"))
    }

    fn lock_path(&self, series: &str) -> PathBuf {
        self.dir.join(format!("{series}.{LOCK_FILE_EXTENSION}"))
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::default()
            .with_max_elapsed_time(Some(self.backoff_max_elapsed))
            .build()
    }

    fn raw_commit(
        &self,
        series: &str,
        run: &BenchRun,
        line: &str,
        mode: CommitMode,
    ) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(PersistenceError::io(&self.dir))?;

        let lock_path = self.lock_path(series);
        acquire_lock(&lock_path)?;
        defer!(release_lock(&lock_path));

        let path = self.series_path(series);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(PersistenceError::io(&path))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(PersistenceError::io(&path))?;

        // A record without its newline was torn by an interrupted writer
        let complete = complete_records_len(&content);
        if complete < content.len() {
            warn!(
                "Discarding {} bytes of a torn record at the end of {}",
                content.len() - complete,
                path.display()
            );
            file.set_len(complete as u64)
                .map_err(PersistenceError::io(&path))?;
        }

        if mode == CommitMode::Unique {
            let stored = deserialize(&String::from_utf8_lossy(&content[..complete]));
            if stored.iter().any(|r| r.commit_id() == run.commit_id()) {
                return Err(PersistenceError::DuplicateCommit {
                    series: series.to_string(),
                    commit: run.commit_id().to_string(),
                });
            }
        }

        // One write per record keeps concurrent readers from seeing half a line
        // in the common case.
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(PersistenceError::io(&path))?;

        trace!("appended {} bytes to {}", line.len(), path.display());
        Ok(())
    }
}

fn acquire_lock(lock_path: &Path) -> Result<(), PersistenceError> {
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
    {
        Ok(mut lock) => {
            // The pid is informational only, for humans finding a stale lock.
            if let Err(e) = writeln!(lock, "{}", process::id()) {
                debug!("Could not record pid in {}: {e}", lock_path.display());
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(PersistenceError::Locked {
            path: lock_path.to_path_buf(),
        }),
        Err(e) => Err(PersistenceError::Io {
            path: lock_path.to_path_buf(),
            source: e,
        }),
    }
}

/// Length of the prefix of `content` made of newline-terminated records.
fn complete_records_len(content: &[u8]) -> usize {
    content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1)
}

fn release_lock(lock_path: &Path) {
    if let Err(e) = fs::remove_file(lock_path) {
        warn!("Failed to remove lock file {}: {e}", lock_path.display());
    }
}

fn read_series_file(path: &Path) -> Result<Vec<BenchRun>, PersistenceError> {
    let file = File::open(path).map_err(PersistenceError::io(path))?;
    let mut content = String::new();
    BufReader::new(file)
        .read_to_string(&mut content)
        .map_err(PersistenceError::io(path))?;
    Ok(deserialize(&content))
}

impl Persistence for JsonLinesPersistence {
    fn load(&self) -> Result<Vec<(String, Vec<BenchRun>)>, PersistenceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Store directory {} does not exist yet", self.dir.display());
                return Ok(vec![]);
            }
            Err(e) => {
                return Err(PersistenceError::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let paths: Vec<PathBuf> = entries
            .map_ok(|entry| entry.path())
            .filter_ok(|path| {
                path.extension()
                    .is_some_and(|ext| ext == SERIES_FILE_EXTENSION)
            })
            .try_collect()
            .map_err(PersistenceError::io(&self.dir))?;

        paths
            .into_iter()
            .sorted()
            .filter_map(|path| {
                let name = path.file_stem()?.to_str()?.to_string();
                Some((name, path))
            })
            .map(|(name, path)| -> Result<_, PersistenceError> {
                let runs = read_series_file(&path)?;
                debug!("loaded {} runs of series '{name}'", runs.len());
                Ok((name, runs))
            })
            .collect()
    }

    fn commit(
        &self,
        series: &str,
        run: &BenchRun,
        mode: CommitMode,
    ) -> Result<(), PersistenceError> {
        let line = serialize_single(run).map_err(|source| PersistenceError::Encode {
            series: series.to_string(),
            source,
        })?;

        let op = || -> Result<(), ::backoff::Error<PersistenceError>> {
            self.raw_commit(series, run, &line, mode)
                .map_err(map_error_for_backoff)
        };

        ::backoff::retry(self.backoff(), op).map_err(|e| match e {
            ::backoff::Error::Permanent(err) => err,
            ::backoff::Error::Transient { err, .. } => err,
        })
    }
}
