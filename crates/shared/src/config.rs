//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::observability::ObservabilityConfig;

/// 规则集配置
///
/// 按顺序引用已加载的规则 ID，运行时组装为顺序规则集
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RulesetConfig {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// 引擎配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    /// then/target 数量不一致时直接报错，而不是截断
    #[serde(default)]
    pub strict_arity: bool,
    /// 表格规则定义目录（*.json / *.yaml / *.yml）
    #[serde(default)]
    pub definitions_dir: Option<String>,
    #[serde(default)]
    pub rulesets: Vec<RulesetConfig>,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（RULEKIT_ 前缀，层级用双下划线，如 RULEKIT_ENGINE__STRICT_ARITY -> engine.strict_arity）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("RULEKIT_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录加载配置
    pub fn load_from(
        config_dir: &Path,
        environment: &str,
        service_name: &str,
    ) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", environment)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("RULEKIT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 规则定义目录，相对路径保持不变
    pub fn definitions_dir(&self) -> Option<PathBuf> {
        self.engine.definitions_dir.as_ref().map(PathBuf::from)
    }

    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
