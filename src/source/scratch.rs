use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

/// Temporary directory that receives extractor output.
///
/// Every extraction purges it first, and a background sweeper removes files
/// past the retention window so an abandoned extraction never lingers.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.path).await
    }

    /// Delete every regular file in the directory. Returns how many were removed.
    pub async fn purge(&self) -> io::Result<usize> {
        self.remove_files_where(|_| true).await
    }

    /// Delete files whose modification time is older than `retention`
    pub async fn sweep_older_than(&self, retention: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        self.remove_files_where(move |modified| {
            now.duration_since(modified).map(|age| age > retention).unwrap_or(false)
        })
        .await
    }

    async fn remove_files_where<F>(&self, should_remove: F) -> io::Result<usize>
    where
        F: Fn(SystemTime) -> bool,
    {
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
            if !should_remove(modified) {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Could not delete {}: {}", entry.path().display(), e),
            }
        }

        Ok(removed)
    }

    /// Find the extractor's output file.
    ///
    /// Prefers a file whose name starts with `video_id` (case-insensitive) and
    /// falls back to the most recently modified `.wav`.
    pub async fn locate(&self, video_id: Option<&str>) -> io::Result<Option<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        let wanted = video_id.map(str::to_lowercase);

        let mut newest_wav: Option<(SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_lowercase();
            if let Some(id) = &wanted {
                if name.starts_with(id.as_str()) {
                    return Ok(Some(path));
                }
            }

            let is_wav = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            if is_wav {
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                let newer = newest_wav.as_ref().map(|(t, _)| modified > *t).unwrap_or(true);
                if newer {
                    newest_wav = Some((modified, path));
                }
            }
        }

        Ok(newest_wav.map(|(_, path)| path))
    }

    /// Run `sweep_older_than(retention)` every `interval` until the task is aborted
    pub fn spawn_sweeper(&self, interval: Duration, retention: Duration) -> JoinHandle<()> {
        let scratch = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match scratch.sweep_older_than(retention).await {
                    Ok(0) => {}
                    Ok(n) => log::info!("Swept {} stale file(s) from {}", n, scratch.path.display()),
                    Err(e) => log::warn!("Scratch sweep of {} failed: {}", scratch.path.display(), e),
                }
            }
        })
    }
}
