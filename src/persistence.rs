//! File-based model storage: one pretty-printed JSON [`ModelRecord`] per file.
//!
//! Writes use optimistic locking. Overwriting a stored record succeeds only if
//! it is still at the version the in-memory model was loaded from; the stored
//! version then advances by one and so does the model's. The first save of a
//! model keeps its version.
//!
//! Each save holds an exclusive `<file>.lock` sentinel across the version
//! check, the write and the rename, so concurrent writers on the same file
//! are serialized and all but one of a set of stale writers see
//! [`Error::VersionConflict`]. A sentinel left behind by a crashed process
//! must be removed by hand; saves give up after [`LOCK_TIMEOUT`].
//!
//! # Usage
//!
//! ```ignore
//! use driftbook::persistence;
//! use std::path::Path;
//!
//! let mut model = persistence::load_model(Path::new("growth.json"))?;
//! model.add_portfolio("PORTFOLIO-2")?;
//! persistence::save_model(&mut model, Path::new("growth.json"))?;
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::model::{InvestmentModel, ModelRecord};

/// How long a save waits for another writer's lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY: Duration = Duration::from_millis(2);

/// Exclusive write lock on a model file, released on drop.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(target: &Path) -> Result<Self> {
        let path = lock_path(target);
        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::WouldBlock,
                            format!("timed out waiting for lock {}", path.display()),
                        )));
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to release lock {}: {e}", self.path.display());
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Read the stored version without building the model.
fn stored_version(path: &Path) -> Result<Option<u32>> {
    match File::open(path) {
        Ok(file) => {
            let record: ModelRecord = serde_json::from_reader(BufReader::new(file))?;
            Ok(Some(record.version))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Persist `model` to `path`.
///
/// Overwriting an existing record fails with [`Error::VersionConflict`] if
/// the file holds a different version than `model`, and otherwise bumps the
/// version of both. A first save stores the model's current version. The
/// model is re-validated first and left untouched on any failure. Returns
/// the stored version.
pub fn save_model(model: &mut InvestmentModel, path: &Path) -> Result<u32> {
    model.validate_all_business_rules()?;

    let _lock = FileLock::acquire(path)?;

    let overwrite = match stored_version(path)? {
        Some(found) if found != model.version() => {
            return Err(Error::VersionConflict {
                expected: model.version(),
                found,
            });
        }
        Some(_) => true,
        None => false,
    };

    let mut record = model.to_record();
    if overwrite {
        record.version = model.version() + 1;
    }

    // Write beside the target and rename so readers never see a partial file.
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &record)?;
        writeln!(writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;

    let version = if overwrite {
        model.increment_version()
    } else {
        model.version()
    };
    debug!("saved model {} at version {version} to {}", model.model_id(), path.display());
    Ok(version)
}

/// Load and fully re-validate a stored model.
pub fn load_model(path: &Path) -> Result<InvestmentModel> {
    let file = File::open(path)?;
    let record: ModelRecord = serde_json::from_reader(BufReader::new(file))?;
    InvestmentModel::try_from(record)
}
