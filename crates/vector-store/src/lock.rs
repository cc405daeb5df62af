use crate::error::{Result, VectorStoreError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive advisory lock on a file, shared with other processes.
///
/// Released when dropped.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
    path: PathBuf,
}

impl FileLockGuard {
    /// Poll for the lock until `timeout` elapses
    pub async fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    })
                }
                Err(err) if is_contended(&err) => {}
                Err(err) => return Err(err.into()),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                log::warn!("store lock {} busy after {waited:?}", path.display());
                #[allow(clippy::cast_possible_truncation)]
                return Err(VectorStoreError::LockTimeout {
                    path: path.to_path_buf(),
                    waited_ms: waited.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout - waited)).await;
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            log::debug!("unlock {} failed: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_holder_times_out_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".store.lock");

        let first = FileLockGuard::acquire(&path, Duration::from_millis(100))
            .await
            .unwrap();
        let err = FileLockGuard::acquire(&path, Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::LockTimeout { .. }));
        assert!(err.is_recoverable());

        drop(first);
        assert!(FileLockGuard::acquire(&path, Duration::from_millis(100))
            .await
            .is_ok());
    }
}
