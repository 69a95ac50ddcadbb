use dealwatch_core::{PersistenceError, SeenIdSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Newline-delimited file of post ids that have already been processed.
#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is a first run, not an error.
    pub async fn load(&self) -> Result<SeenIdSet, PersistenceError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No seen-id file at {}, starting empty", self.path.display());
                return Ok(SeenIdSet::new());
            }
            Err(source) => {
                return Err(PersistenceError::SeenIdsLoad {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        let seen: SeenIdSet = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        debug!("Loaded {} seen ids from {}", seen.len(), self.path.display());
        Ok(seen)
    }

    /// Writes the whole set to a temp file next to the target, then renames it
    /// over the target so an interrupted save leaves the previous file intact.
    pub async fn save(&self, seen: &SeenIdSet) -> Result<(), PersistenceError> {
        let tmp_path = self.tmp_path();
        self.write_tmp(&tmp_path, seen)
            .await
            .map_err(|source| self.save_error(source))?;

        if let Err(source) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(self.save_error(source));
        }

        debug!("Saved {} seen ids to {}", seen.len(), self.path.display());
        Ok(())
    }

    async fn write_tmp(&self, tmp_path: &Path, seen: &SeenIdSet) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut contents = String::new();
        for id in seen.sorted() {
            contents.push_str(id);
            contents.push('\n');
        }

        let mut file = fs::File::create(tmp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn save_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::SeenIdsSave {
            path: self.path.display().to_string(),
            source,
        }
    }
}
