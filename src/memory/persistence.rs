//! 目标记录文件持久化
//!
//! 将执行记录写入/从单个 JSON 文件加载，用于跨进程或跨会话恢复（可选使用）。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::memory::store::{GoalRecord, MemoryStore};

/// 简单的文件存储：单文件 JSON 数组，每次 store 重写整个文件
///
/// 记录量大或高频写入时应换外部存储；这里只服务于单机小规模使用。
pub struct JsonFileStore {
    path: PathBuf,
    /// 串行化写入；读-改-写必须原子
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// 从 JSON 文件加载全部记录；文件不存在时返回空 Vec
    fn load(&self) -> anyhow::Result<Vec<GoalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 将全部记录写回文件；父目录不存在时自动创建
    fn save(&self, records: &[GoalRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(records)?)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for JsonFileStore {
    async fn store(&self, record: GoalRecord) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().map_err(|e| e.to_string())?;
        records.push(record);
        self.save(&records).map_err(|e| e.to_string())
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<GoalRecord>, String> {
        let query = query.to_lowercase();
        let records = self.load().map_err(|e| e.to_string())?;
        Ok(records
            .into_iter()
            .rev()
            .filter(|r| r.goal.to_lowercase().contains(&query))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<GoalRecord>, String> {
        let records = self.load().map_err(|e| e.to_string())?;
        Ok(records.into_iter().find(|r| r.context_id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::goal::Stage;

    fn record(id: &str, goal: &str) -> GoalRecord {
        GoalRecord {
            context_id: id.to_string(),
            goal: goal.to_string(),
            stage: Stage::Late,
            tasks: vec![],
            results: vec![],
            completed_at: 42,
        }
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("goals.json"));
        assert!(store.retrieve("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/goals.json");

        let store = JsonFileStore::new(&path);
        store.store(record("goal_1", "survey")).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::new(&path);
        let found = reopened.get("goal_1").await.unwrap();
        assert_eq!(found.unwrap().completed_at, 42);
    }
}
