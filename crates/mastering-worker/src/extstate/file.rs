use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{WorkerError, WorkerResult};
use crate::extstate::ExtState;

/// File-backed store: one JSON object per section, keys mapped to strings.
///
/// Writes are read-modify-write of the whole section file. That is safe here
/// because the host and the worker never write the same key concurrently;
/// the host only touches `Command` while the worker only touches `Status`.
#[derive(Clone)]
pub struct FileExtState {
    root: PathBuf,
}

impl FileExtState {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn section_path(&self, section: &str) -> WorkerResult<PathBuf> {
        validate_component(section)?;
        Ok(self.root.join(format!("{section}.json")))
    }

    async fn load_section(&self, path: &Path) -> WorkerResult<serde_json::Map<String, Value>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(serde_json::Map::new())
            }
            Err(error) => {
                return Err(WorkerError::Environment(format!(
                    "failed to read state file {}: {error}",
                    path.display()
                )))
            }
        };
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|error| WorkerError::Internal(format!("state file parse error: {error}")))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(WorkerError::Internal(format!(
                "state file {} is not a JSON object",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl ExtState for FileExtState {
    async fn get(&self, section: &str, key: &str) -> WorkerResult<Option<String>> {
        let path = self.section_path(section)?;
        let map = self.load_section(&path).await?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    async fn set(&self, section: &str, key: &str, value: &str) -> WorkerResult<()> {
        let path = self.section_path(section)?;
        let mut map = self.load_section(&path).await?;
        map.insert(key.to_string(), Value::String(value.to_string()));

        tokio::fs::create_dir_all(&self.root).await.map_err(|error| {
            WorkerError::Environment(format!(
                "failed to create state directory {}: {error}",
                self.root.display()
            ))
        })?;
        let serialized = serde_json::to_vec_pretty(&Value::Object(map))
            .map_err(|error| WorkerError::Internal(format!("state serialize error: {error}")))?;
        tokio::fs::write(&path, serialized).await.map_err(|error| {
            WorkerError::Environment(format!(
                "failed to write state file {}: {error}",
                path.display()
            ))
        })
    }
}

fn validate_component(name: &str) -> WorkerResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(WorkerError::InvalidInput(format!(
            "invalid state section {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sets_and_gets_value() {
        let dir = tempdir().expect("tempdir");
        let store = FileExtState::new(dir.path().to_path_buf());
        store
            .set("MatcheringWorker", "Status", "Running...")
            .await
            .expect("set");
        let value = store
            .get("MatcheringWorker", "Status")
            .await
            .expect("get");
        assert_eq!(value, Some("Running...".to_string()));
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let dir = tempdir().expect("tempdir");
        let store = FileExtState::new(dir.path().to_path_buf());
        let value = store.get("MatcheringWorker", "Target").await.expect("get");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn overwrite_keeps_other_keys() {
        let dir = tempdir().expect("tempdir");
        let store = FileExtState::new(dir.path().to_path_buf());
        store.set("S", "Target", "/a.wav").await.expect("set");
        store.set("S", "Status", "Running...").await.expect("set");
        store.set("S", "Status", "Done").await.expect("set");
        assert_eq!(
            store.get("S", "Target").await.expect("get"),
            Some("/a.wav".to_string())
        );
        assert_eq!(
            store.get("S", "Status").await.expect("get"),
            Some("Done".to_string())
        );
    }

    #[tokio::test]
    async fn invalid_section_rejected() {
        let dir = tempdir().expect("tempdir");
        let store = FileExtState::new(dir.path().to_path_buf());
        let err = store.set("../escape", "k", "v").await.expect_err("invalid");
        match err {
            WorkerError::InvalidInput(_) => {}
            other => panic!("expected invalid input, got {other}"),
        }
    }
}
