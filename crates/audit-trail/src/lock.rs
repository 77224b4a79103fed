//! Advisory lock guarding the read-modify-write cycle across processes.
//!
//! The lock is an OS file lock on `<store>.lock`, not the file's existence:
//! the file may outlive its writers, and the kernel drops the lock when the
//! holder's descriptor closes, including when the process dies.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;

use crate::error::{LedgerError, LedgerResult};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Held while a writer owns the store. Dropping it releases the lock.
#[derive(Debug)]
pub(crate) struct StoreLock {
    _file: File,
}

impl StoreLock {
    /// `<store>.lock` next to the store itself.
    pub(crate) fn path_for(store: &Path) -> PathBuf {
        let mut raw = store.as_os_str().to_owned();
        raw.push(".lock");
        PathBuf::from(raw)
    }

    /// Take the exclusive lock on `path`, polling until `wait` elapses.
    pub(crate) fn acquire(path: &Path, wait: Duration) -> LedgerResult<Self> {
        let write_err = |source| LedgerError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(write_err)?;

        let started = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(e) if e.kind() == fs4::lock_contended_error().kind() => {
                    if started.elapsed() >= wait {
                        return Err(LedgerError::LockTimeout {
                            path: path.to_path_buf(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(write_err(e)),
            }
        }

        // Owner pid, for whoever inspects a stuck writer.
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { _file: file })
    }
}
