//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找。
//! 工具本体由外部系统构造并注册；编排核心只按名解析并调用。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::goal::Stage;

/// 工具调用输入：目标文本、阶段与已完成依赖的结果
#[derive(Debug, Clone, Serialize)]
pub struct ToolInput {
    pub goal: String,
    pub stage: Stage,
    /// 已完成依赖任务的结果，按依赖声明顺序；失败/缺失的依赖直接略去
    pub previous_results: Vec<Value>,
}

/// 工具 trait：名称、描述、可选的输入校验、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（任务模板中引用的名字）
    fn name(&self) -> &str;

    /// 工具描述
    fn description(&self) -> &str;

    /// 输入校验；默认接受一切
    fn validate(&self, _input: &ToolInput) -> bool {
        true
    }

    /// 执行工具
    async fn execute(&self, input: &ToolInput) -> Result<Value, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / tool_names
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 返回 (name, description) 列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }

        fn description(&self) -> &str {
            "does nothing"
        }

        async fn execute(&self, _input: &ToolInput) -> Result<Value, String> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(NoopTool);
        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.tool_names(), vec!["noop".to_string()]);
    }
}
