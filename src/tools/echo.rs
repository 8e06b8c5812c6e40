//! Echo 工具（用于测试与本地联调，无副作用）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::{Tool, ToolInput};

/// 回显工具：把输入原样包进结果，便于跑通目标执行链路
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the goal and previous results back"
    }

    async fn execute(&self, input: &ToolInput) -> Result<Value, String> {
        Ok(json!({
            "goal": input.goal,
            "stage": input.stage,
            "previous_count": input.previous_results.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::goal::Stage;

    #[tokio::test]
    async fn test_echo_reports_previous_count() {
        let input = ToolInput {
            goal: "g".to_string(),
            stage: Stage::Early,
            previous_results: vec![Value::from(1), Value::from(2)],
        };
        let out = EchoTool.execute(&input).await.unwrap();
        assert_eq!(out["previous_count"], 2);
    }
}
