use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::WorkerResult;
use crate::extstate::ExtState;

/// In-memory store used by tests.
#[derive(Debug, Default)]
pub struct MemoryExtState {
    data: Mutex<HashMap<(String, String), String>>,
}

#[async_trait]
impl ExtState for MemoryExtState {
    async fn get(&self, section: &str, key: &str) -> WorkerResult<Option<String>> {
        let data = self.data.lock().await;
        Ok(data.get(&(section.to_string(), key.to_string())).cloned())
    }

    async fn set(&self, section: &str, key: &str, value: &str) -> WorkerResult<()> {
        let mut data = self.data.lock().await;
        data.insert((section.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}
