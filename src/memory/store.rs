//! 目标执行记录存储抽象
//!
//! 编排核心每次成功执行恰好写入一条 GoalRecord，且同一次调用内不回读自己的写入。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::goal::{Stage, Task};

/// 一次完成的目标执行的持久化记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRecord {
    pub context_id: String,
    pub goal: String,
    pub stage: Stage,
    pub tasks: Vec<Task>,
    pub results: Vec<Value>,
    /// 完成时间（毫秒时间戳）
    pub completed_at: i64,
}

/// 存储 trait：store / retrieve / get
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 追加一条记录
    async fn store(&self, record: GoalRecord) -> Result<(), String>;

    /// 按目标文本子串检索（不区分大小写），新记录在前
    async fn retrieve(&self, query: &str) -> Result<Vec<GoalRecord>, String>;

    /// 按上下文 id 精确查找
    async fn get(&self, id: &str) -> Result<Option<GoalRecord>, String>;
}

/// 内存存储：测试与内嵌场景用
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<GoalRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn store(&self, record: GoalRecord) -> Result<(), String> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<GoalRecord>, String> {
        let query = query.to_lowercase();
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.goal.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<GoalRecord>, String> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.context_id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, goal: &str) -> GoalRecord {
        GoalRecord {
            context_id: id.to_string(),
            goal: goal.to_string(),
            stage: Stage::Early,
            tasks: vec![],
            results: vec![],
            completed_at: 0,
        }
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let store = InMemoryStore::new();
        store.store(record("goal_1", "protein folding")).await.unwrap();

        let found = store.get("goal_1").await.unwrap();
        assert_eq!(found.unwrap().goal, "protein folding");
        assert!(store.get("goal_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retrieve_is_case_insensitive_newest_first() {
        let store = InMemoryStore::new();
        store.store(record("goal_1", "Protein folding")).await.unwrap();
        store.store(record("goal_2", "protein docking")).await.unwrap();
        store.store(record("goal_3", "galaxy surveys")).await.unwrap();

        let found = store.retrieve("PROTEIN").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].context_id, "goal_2");
        assert_eq!(found[1].context_id, "goal_1");
    }
}
