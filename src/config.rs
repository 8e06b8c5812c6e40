//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SAGE__*` 覆盖（双下划线表示嵌套，如 `SAGE__PROVIDER__PREFERRED=ollama`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub probe: ProbeSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [agent] 段：工具超时与调度模式
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 是否启用拓扑并行调度器；默认 false，保持声明序逐个执行
    #[serde(default)]
    pub parallel_scheduler: bool,
    /// 并行调度器 worker 数上限
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_tool_timeout_secs() -> u64 {
    60
}

fn default_max_workers() -> usize {
    4
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            parallel_scheduler: false,
            max_workers: default_max_workers(),
        }
    }
}

/// [provider] 段：首选 Provider、调用超时与各后端设置
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    /// 首选 Provider 名（如 "ollama"）；未设置时按优先级回退
    pub preferred: Option<String>,
    /// 单次 complete/chat 调用超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub ollama: OllamaSection,
    #[serde(default)]
    pub openai: OpenAiSection,
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_probe_timeout_secs() -> u64 {
    5
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            preferred: None,
            request_timeout_secs: default_request_timeout_secs(),
            ollama: OllamaSection::default(),
            openai: OpenAiSection::default(),
        }
    }
}

/// [provider.ollama] 段：本地端点与默认模型
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaSection {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

/// [provider.openai] 段：OpenAI 兼容端点与默认模型
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OpenAiSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// [probe] 段：本地服务扫描端口与重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSection {
    /// 候选端口，按优先级顺序扫描
    #[serde(default = "default_probe_ports")]
    pub ports: Vec<u16>,
    /// 每个端口的最大尝试次数
    #[serde(default = "default_probe_attempts")]
    pub max_attempts: u32,
    /// 单次尝试超时（秒）
    #[serde(default = "default_probe_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_probe_ports() -> Vec<u16> {
    vec![1234, 1235, 8080, 5000, 8000]
}

fn default_probe_attempts() -> u32 {
    3
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            ports: default_probe_ports(),
            max_attempts: default_probe_attempts(),
            attempt_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            agent: AgentSection::default(),
            provider: ProviderSection::default(),
            probe: ProbeSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 SAGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SAGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SAGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert!(!cfg.agent.parallel_scheduler);
        assert_eq!(cfg.agent.tool_timeout_secs, 60);
        assert_eq!(cfg.provider.request_timeout_secs, 120);
        assert_eq!(cfg.probe.attempt_timeout_secs, 5);
        assert_eq!(cfg.probe.ports, vec![1234, 1235, 8080, 5000, 8000]);
        assert_eq!(cfg.probe.max_attempts, 3);
    }
}
