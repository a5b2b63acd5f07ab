//! JSON-file persistence: one file per task stream.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;

use super::traits::{PersistencePlugin, StoredState};
use crate::domain::TaskState;
use crate::error::Result;

/// Stores the run state as pretty-printed JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    /// Persist to the given file path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Persist the named task stream under `dir` as `<dir>/<name>.json`
    pub fn for_stream(dir: impl AsRef<Path>, name: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{}.json", name)))
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the state file; a missing file is not an error
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the raw snapshot without first-run interpretation
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<TaskState<T>>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl<T> PersistencePlugin<T> for FilePersistence
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get_state(&self) -> Result<StoredState<T>> {
        match self.load::<T>().await? {
            Some(state) => {
                debug!("Loaded state from {}", self.path.display());
                Ok(StoredState::from_state(state))
            }
            None => {
                debug!("No state file at {}", self.path.display());
                Ok(StoredState::FirstRun)
            }
        }
    }

    async fn set_state(&self, state: &TaskState<T>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write-then-rename: a killed process never leaves a torn snapshot behind.
        let content = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        fs::write(&temp, content).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}
