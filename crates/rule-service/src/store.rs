//! 规则存储管理
//!
//! 存储后端通过 [`RuleStorage`] trait 抽象，[`RuleStore`] 持有显式注入的后端。
//! 内置的 [`MemoryStorage`] 使用 DashMap 缓存编译后的规则，表格规则定义在加载时编译一次。

use crate::error::{Result, ServiceError};
use dashmap::DashMap;
use parking_lot::RwLock;
use rule_engine::{RuleCompiler, SharedRule};
use rulekit_shared::config::EngineConfig;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 规则存储后端
#[cfg_attr(test, mockall::automock)]
pub trait RuleStorage: Send + Sync {
    /// 按 ID 获取规则
    fn get_rule(&self, id: &str) -> Result<SharedRule>;

    /// 按名称获取规则集，按执行顺序排列
    fn get_ruleset(&self, id: &str) -> Result<Vec<SharedRule>>;
}

/// 规则定义格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Yaml,
}

impl DefinitionFormat {
    /// 根据文件扩展名识别格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// 规则集成员及其优先级，优先级高的先执行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePosition {
    pub rule_id: String,
    pub priority: i32,
}

impl RulePosition {
    pub fn new(rule_id: impl Into<String>, priority: i32) -> Self {
        Self {
            rule_id: rule_id.into(),
            priority,
        }
    }
}

/// 内存规则存储
#[derive(Default)]
pub struct MemoryStorage {
    rules: DashMap<String, SharedRule>,
    /// 规则集名称 → 按执行顺序排列的规则 ID
    rulesets: RwLock<HashMap<String, Vec<String>>>,
    compiler: RuleCompiler,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用指定的编译器加载表格规则定义
    pub fn with_compiler(compiler: RuleCompiler) -> Self {
        Self {
            compiler,
            ..Self::default()
        }
    }

    /// 按引擎配置初始化：加载定义目录并组装规则集
    ///
    /// 配置中的规则集按列表顺序执行，第一个优先级最高。
    #[instrument(skip(config), fields(rulesets = config.rulesets.len()))]
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let storage =
            Self::with_compiler(RuleCompiler::new().with_strict_arity(config.strict_arity));

        if let Some(dir) = &config.definitions_dir {
            storage.load_dir(dir)?;
        }

        for ruleset in &config.rulesets {
            let count = ruleset.rules.len();
            let positions = ruleset
                .rules
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    listed_priority(&ruleset.name, count, i)
                        .map(|priority| RulePosition::new(id.clone(), priority))
                })
                .collect::<Result<Vec<_>>>()?;
            storage.define_ruleset(&ruleset.name, positions)?;
        }

        Ok(storage)
    }

    /// 注册一条已构建的规则，同 ID 覆盖
    #[instrument(skip(self, rule))]
    pub fn register(&self, id: &str, rule: SharedRule) {
        if self.rules.insert(id.to_string(), rule).is_some() {
            debug!("规则已覆盖: {}", id);
        }
        info!("规则已注册: {}", id);
    }

    /// 编译并注册表格规则定义
    #[instrument(skip(self, text))]
    pub fn load_definition(&self, id: &str, text: &str, format: DefinitionFormat) -> Result<()> {
        let rule = match format {
            DefinitionFormat::Json => self.compiler.compile_from_json(text)?,
            DefinitionFormat::Yaml => self.compiler.compile_from_yaml(text)?,
        };
        self.register(id, Arc::new(rule));
        Ok(())
    }

    pub fn load_json(&self, id: &str, json: &str) -> Result<()> {
        self.load_definition(id, json, DefinitionFormat::Json)
    }

    pub fn load_yaml(&self, id: &str, yaml: &str) -> Result<()> {
        self.load_definition(id, yaml, DefinitionFormat::Yaml)
    }

    /// 加载目录下的全部定义文件，规则 ID 为文件名（不含扩展名）
    ///
    /// 按文件名排序加载，任一文件失败即返回错误。
    #[instrument(skip(self, dir), fields(dir = %dir.as_ref().display()))]
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let format = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(DefinitionFormat::from_extension);
            let stem = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
            match (format, stem) {
                (Some(format), Some(stem)) => files.push((path, stem, format)),
                _ => debug!("跳过非规则文件: {}", path.display()),
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut loaded = Vec::with_capacity(files.len());
        for (path, id, format) in files {
            let text = std::fs::read_to_string(&path)?;
            self.load_definition(&id, &text, format).inspect_err(|e| {
                warn!("规则定义加载失败: {}: {}", path.display(), e);
            })?;
            loaded.push(id);
        }

        info!("目录加载完成: {} 条规则", loaded.len());
        Ok(loaded)
    }

    /// 定义规则集
    ///
    /// 优先级必须唯一，成员规则必须已存在；按优先级从高到低执行。
    #[instrument(skip(self, positions), fields(members = positions.len()))]
    pub fn define_ruleset(&self, name: &str, mut positions: Vec<RulePosition>) -> Result<()> {
        let mut seen = HashSet::new();
        for position in &positions {
            if !seen.insert(position.priority) {
                return Err(ServiceError::InvalidRuleset(format!(
                    "{}: 优先级 {} 重复",
                    name, position.priority
                )));
            }
            if !self.rules.contains_key(&position.rule_id) {
                return Err(ServiceError::RuleNotFound(position.rule_id.clone()));
            }
        }

        positions.sort_by(|a, b| b.priority.cmp(&a.priority));
        let ids = positions.into_iter().map(|p| p.rule_id).collect();
        self.rulesets.write().insert(name.to_string(), ids);

        info!("规则集已定义: {}", name);
        Ok(())
    }

    /// 删除规则，已定义的规则集在执行时会报告缺失成员
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) -> Result<()> {
        if self.rules.remove(id).is_some() {
            info!("规则已删除: {}", id);
            Ok(())
        } else {
            warn!("删除不存在的规则: {}", id);
            Err(ServiceError::RuleNotFound(id.to_string()))
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// 获取所有规则 ID（已排序）
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rules.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// 获取所有规则集名称（已排序）
    pub fn list_rulesets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rulesets.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 清空所有规则和规则集
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rules.len();
        self.rules.clear();
        self.rulesets.write().clear();
        info!("已清空 {} 条规则", count);
    }
}

impl RuleStorage for MemoryStorage {
    fn get_rule(&self, id: &str) -> Result<SharedRule> {
        self.rules
            .get(id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| ServiceError::RuleNotFound(id.to_string()))
    }

    fn get_ruleset(&self, id: &str) -> Result<Vec<SharedRule>> {
        let ids = self
            .rulesets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::RulesetNotFound(id.to_string()))?;
        ids.iter().map(|rule_id| self.get_rule(rule_id)).collect()
    }
}

/// 规则存储门面，后端由调用方显式注入
#[derive(Clone)]
pub struct RuleStore {
    backend: Arc<dyn RuleStorage>,
}

impl RuleStore {
    pub fn new(backend: Arc<dyn RuleStorage>) -> Self {
        Self { backend }
    }

    pub fn get_rule(&self, id: &str) -> Result<SharedRule> {
        self.backend.get_rule(id)
    }

    pub fn get_ruleset(&self, id: &str) -> Result<Vec<SharedRule>> {
        self.backend.get_ruleset(id)
    }
}

/// 按列出顺序换算优先级，第一条最高
fn listed_priority(ruleset: &str, count: usize, index: usize) -> Result<i32> {
    count
        .checked_sub(index)
        .and_then(|priority| i32::try_from(priority).ok())
        .ok_or_else(|| {
            ServiceError::InvalidRuleset(format!("{ruleset}: 第 {index} 条规则的优先级超出范围"))
        })
}
