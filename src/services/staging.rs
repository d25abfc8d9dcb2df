use crate::services::error::GatewayError;
use crate::utils::validation::sanitize_filename;
use bytes::Bytes;
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// An upload persisted to the staging directory.
///
/// The file is removed when the value is released or dropped, whichever comes first.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads the whole staged file into memory.
    pub async fn read(&self) -> io::Result<Bytes> {
        tokio::fs::read(&*self.path).await.map(Bytes::from)
    }
}

/// Length of the random segment in staged file names.
const RANDOM_SEGMENT_LEN: usize = 6;

/// Whether `name` has the `<millis>-<random>-<name>` shape produced by [`StagingArea::stage`].
fn is_staged_name(name: &str) -> bool {
    let Some((millis, rest)) = name.split_once('-') else {
        return false;
    };
    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match rest.get(..RANDOM_SEGMENT_LEN) {
        Some(random) if random.bytes().all(|b| b.is_ascii_alphanumeric()) => rest
            .get(RANDOM_SEGMENT_LEN..)
            .and_then(|tail| tail.strip_prefix('-'))
            .is_some_and(|original| !original.is_empty()),
        _ => false,
    }
}

pub struct StagingArea {
    dir: PathBuf,
    max_file_size: usize,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the staging directory. Safe to call concurrently.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Streams `reader` to a fresh file named `<millis>-<random>-<name>`.
    pub async fn stage<R>(&self, mut reader: R, original_name: &str) -> Result<StagedFile, GatewayError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.ensure_dir().await?;

        let temp_file = tempfile::Builder::new()
            .prefix(&format!("{}-", Utc::now().timestamp_millis()))
            .rand_bytes(RANDOM_SEGMENT_LEN)
            .suffix(&format!("-{}", sanitize_filename(original_name)))
            .tempfile_in(&self.dir)?;
        let (file, path) = temp_file.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        tracing::debug!("Staging upload {} at {}", original_name, path.display());

        let mut buffer = [0u8; 8192];
        let mut total_size: u64 = 0;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            total_size += n as u64;
            if total_size > self.max_file_size as u64 {
                // `path` drops here and takes the partial file with it
                return Err(GatewayError::PayloadTooLarge {
                    limit: self.max_file_size,
                });
            }
            file.write_all(&buffer[..n]).await?;
        }
        file.flush().await?;

        Ok(StagedFile {
            path,
            size: total_size,
        })
    }

    /// Removes a staged file. Failures are logged, never returned.
    pub fn release(&self, staged: StagedFile) {
        let path = staged.path.to_path_buf();
        match staged.path.close() {
            Ok(()) => tracing::debug!("Released staged file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove staged file {}: {}", path.display(), e),
        }
    }

    /// Deletes staged files last modified at least `max_age` ago.
    ///
    /// Only names shaped like the ones [`stage`](Self::stage) creates are touched; anything
    /// else sharing the directory is left alone. Returns how many files were removed.
    pub async fn sweep_orphans(&self, max_age: Duration) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_str().is_some_and(is_staged_name) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|t| t.elapsed().ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    tracing::info!("🧹 Removed orphaned staging file {}", entry.path().display());
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Failed to remove orphaned staging file {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_stage_and_release() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(tmp.path().join("uploads"), 1024);

        let staged = staging.stage(&b"hello staging"[..], "a.txt").await.unwrap();
        assert_eq!(staged.size(), 13);
        assert!(staged.path().starts_with(staging.dir()));
        let file_name = staged.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.ends_with("-a.txt"), "{}", file_name);
        assert_eq!(&staged.read().await.unwrap()[..], b"hello staging");

        let path = staged.path().to_path_buf();
        staging.release(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_staged_file() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(tmp.path(), 1024);

        let staged = staging.stage(&b"data"[..], "b.bin").await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(tmp.path(), 1024);

        let staged = staging.stage(&b"data"[..], "c.bin").await.unwrap();
        std::fs::remove_file(staged.path()).unwrap();
        staging.release(staged);
    }

    #[tokio::test]
    async fn test_oversized_upload_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(tmp.path().join("uploads"), 8);

        let err = staging
            .stage(&b"more than eight bytes"[..], "big.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge { limit: 8 }));
        assert_eq!(file_count(staging.dir()), 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_dir_once() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = Arc::new(StagingArea::new(tmp.path().join("a/b/uploads"), 1024));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let staging = staging.clone();
                tokio::spawn(async move {
                    let staged = staging.stage(&b"x"[..], "same.txt").await.unwrap();
                    let path = staged.path().to_path_buf();
                    (i, path, staged)
                })
            })
            .collect();

        let mut paths = Vec::new();
        let mut staged_files = Vec::new();
        for handle in handles {
            let (_, path, staged) = handle.await.unwrap();
            paths.push(path);
            staged_files.push(staged);
        }

        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 16);
        assert_eq!(file_count(staging.dir()), 16);

        for staged in staged_files {
            staging.release(staged);
        }
        assert_eq!(file_count(staging.dir()), 0);
    }

    #[tokio::test]
    async fn test_sweep_orphans() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(tmp.path().join("uploads"), 1024);

        assert_eq!(staging.sweep_orphans(Duration::ZERO).await.unwrap(), 0);

        staging.ensure_dir().await.unwrap();
        std::fs::write(staging.dir().join("1700000000000-a1B2c3-left.txt"), b"left").unwrap();
        std::fs::create_dir(staging.dir().join("nested")).unwrap();

        assert_eq!(
            staging.sweep_orphans(Duration::from_secs(3600)).await.unwrap(),
            0
        );
        assert_eq!(staging.sweep_orphans(Duration::ZERO).await.unwrap(), 1);
        assert_eq!(file_count(staging.dir()), 1);
    }

    #[tokio::test]
    async fn test_sweep_leaves_foreign_files_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(tmp.path(), 1024);

        let foreign = ["keep.db", "2024-report.pdf", "17-abc-short.txt", "123-abcdef-", ".env"];
        for name in foreign {
            std::fs::write(staging.dir().join(name), b"not ours").unwrap();
        }
        let staged = staging.stage(&b"ours"[..], "mine.txt").await.unwrap();
        let staged_path = staged.path().to_path_buf();
        // simulate a crash: the guard never runs
        staged.path.keep().unwrap();

        assert_eq!(staging.sweep_orphans(Duration::ZERO).await.unwrap(), 1);
        assert!(!staged_path.exists());
        for name in foreign {
            assert!(staging.dir().join(name).exists(), "{} was removed", name);
        }
    }

    #[test]
    fn test_is_staged_name() {
        assert!(is_staged_name("1700000000000-a1B2c3-report.pdf"));
        assert!(is_staged_name("1-zzzzzz-a-b-c"));
        assert!(!is_staged_name("keep.db"));
        assert!(!is_staged_name("2024-report.pdf"));
        assert!(!is_staged_name("1700000000000-a1B2c3-"));
        assert!(!is_staged_name("1700000000000-a1_2c3-x"));
        assert!(!is_staged_name("-a1B2c3-x"));
    }
}
