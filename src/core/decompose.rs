//! 目标分解：阶段固定任务模板
//!
//! 每个阶段对应一套手工定义的任务链，依赖按下标指向已构建的前序任务，
//! 不存在前向引用。工具名是外部注册表中的约定名；注册表缺失某工具时
//! 由执行器在运行时标记该任务失败，分解阶段不做校验。

use crate::core::goal::{Stage, Task};

/// 按阶段生成任务数组；任何阶段都至少返回一个任务
pub fn decompose(goal: &str, stage: Stage) -> Vec<Task> {
    match stage {
        Stage::Early => {
            let search = Task::new(format!("Search literature for: {}", goal), Some("literature_search"));
            let parse = Task::new("Parse and extract retrieved documents", Some("document_parser"))
                .with_dependencies(vec![search.id.clone()]);
            let embed = Task::new("Generate embeddings for parsed documents", Some("scibert_embedder"))
                .with_dependencies(vec![parse.id.clone()]);
            let themes = Task::new("Extract research themes from embeddings", Some("theme_extractor"))
                .with_dependencies(vec![embed.id.clone()]);
            vec![search, parse, embed, themes]
        }
        Stage::Middle => {
            let search = Task::new(format!("Analyze prior findings for: {}", goal), Some("literature_search"));
            let hypothesis = Task::new("Generate candidate hypotheses", Some("hypothesis_generator"))
                .with_dependencies(vec![search.id.clone()]);
            let graph = Task::new("Link findings into the knowledge graph", Some("knowledge_graph_linker"))
                .with_dependencies(vec![search.id.clone()]);
            vec![search, hypothesis, graph]
        }
        Stage::Late => {
            let synthesis = Task::new(format!("Synthesize results for: {}", goal), Some("research_synthesizer"));
            let document = Task::new("Generate thesis document sections", Some("document_generator"))
                .with_dependencies(vec![synthesis.id.clone()]);
            let report = Task::new("Generate summary report", Some("report_generator"))
                .with_dependencies(vec![synthesis.id.clone()]);
            vec![synthesis, document, report]
        }
    }
}
