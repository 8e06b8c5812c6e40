//! 思考日志：追加式进度/审计记录与同步监听分发
//!
//! 单写者、严格追加顺序；emit 时同步通知所有监听者，单个监听者 panic 不影响
//! 其余监听者，也不会中断编排（派发点隔离）。监听者回调内不得阻塞或挂起。

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 思考步骤类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingKind {
    Decomposition,
    ToolSelection,
    Execution,
    Validation,
    Analysis,
}

/// 一条思考步骤；追加后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStep {
    /// 步骤类别
    pub kind: ThinkingKind,
    /// 描述
    pub description: String,
    /// 时间戳（毫秒）
    pub timestamp: i64,
    /// 相关工具名
    pub tool: Option<String>,
    /// 附加元数据
    pub metadata: Option<Value>,
}

impl ThinkingStep {
    pub fn new(kind: ThinkingKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            tool: None,
            metadata: None,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// 订阅 ID（unsubscribe 用）
pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&ThinkingStep) + Send + Sync>;

/// 追加式思考日志 + 监听者注册表
///
/// history/clear/subscribe/unsubscribe 可与进行中的目标执行并发调用。
#[derive(Default)]
pub struct ThinkingLog {
    steps: Mutex<Vec<ThinkingStep>>,
    listeners: Mutex<HashMap<SubscriptionId, Listener>>,
    next_id: AtomicU64,
}

impl ThinkingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条步骤并同步广播给所有监听者
    pub fn emit(&self, step: ThinkingStep) {
        self.steps.lock().unwrap().push(step.clone());

        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.values() {
            // 监听者隔离：panic 只丢弃该监听者本次通知
            let _ = catch_unwind(AssertUnwindSafe(|| listener(&step)));
        }
    }

    /// 注册监听者，返回可用于退订的 ID
    pub fn on_thinking<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ThinkingStep) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().insert(id, Box::new(callback));
        id
    }

    /// 退订；之后该监听者不再收到任何通知
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().unwrap().remove(&id);
    }

    /// 按发射顺序返回全部历史（拷贝）
    pub fn history(&self) -> Vec<ThinkingStep> {
        self.steps.lock().unwrap().clone()
    }

    /// 清空历史；监听者保留
    pub fn clear(&self) {
        self.steps.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_history_preserves_emission_order() {
        let log = ThinkingLog::new();
        log.emit(ThinkingStep::new(ThinkingKind::Decomposition, "first"));
        log.emit(ThinkingStep::new(ThinkingKind::Execution, "second"));
        log.emit(ThinkingStep::new(ThinkingKind::Validation, "third"));

        let history = log.history();
        let descriptions: Vec<_> = history.iter().map(|s| s.description.as_str()).collect();
        assert_eq!(descriptions, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_history_is_idempotent() {
        let log = ThinkingLog::new();
        log.emit(ThinkingStep::new(ThinkingKind::Analysis, "step"));
        assert_eq!(log.history(), log.history());
    }

    #[test]
    fn test_clear_then_read_is_empty() {
        let log = ThinkingLog::new();
        log.emit(ThinkingStep::new(ThinkingKind::Decomposition, "step"));
        log.clear();
        assert!(log.history().is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_callbacks() {
        let log = ThinkingLog::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let id = log.on_thinking(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        log.emit(ThinkingStep::new(ThinkingKind::Execution, "one"));
        log.unsubscribe(id);
        log.emit(ThinkingStep::new(ThinkingKind::Execution, "two"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_starve_others() {
        let log = ThinkingLog::new();
        let count = Arc::new(AtomicUsize::new(0));

        log.on_thinking(|_| panic!("bad listener"));
        let c = count.clone();
        log.on_thinking(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        log.emit(ThinkingStep::new(ThinkingKind::Execution, "step"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // 日志本身也不受影响
        assert_eq!(log.history().len(), 1);
    }
}
