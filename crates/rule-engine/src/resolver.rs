//! 字段解析器
//!
//! 按点号路径在命名空间中逐段取值，并在最后一段无法解析且为比较器名称时
//! 应用该比较器。

use crate::context::{Namespace, strip_namespace};
use crate::error::{Result, RuleError};
use crate::operators::Comparator;
use crate::values;
use serde_json::Value;

/// 路径分隔符
pub const PATH_SEPARATOR: char = '.';

/// 单段访问能力：先按结构字段访问，再按下标访问
pub trait FieldAccess {
    fn field(&self, name: &str) -> Option<&Value>;

    fn subscript(&self, key: &str) -> Option<&Value>;

    fn resolve(&self, segment: &str) -> Option<&Value> {
        self.field(segment).or_else(|| self.subscript(segment))
    }
}

impl FieldAccess for Value {
    fn field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(name))
    }

    /// 数组下标，负数从末尾计数
    fn subscript(&self, key: &str) -> Option<&Value> {
        let items = self.as_array()?;
        let index: i64 = key.trim().parse().ok()?;
        let index = if index < 0 {
            i64::try_from(items.len()).ok()? + index
        } else {
            index
        };
        usize::try_from(index).ok().and_then(|i| items.get(i))
    }
}

/// 字段解析器
pub struct FieldResolver;

impl FieldResolver {
    /// 解析路径并与期望值比较
    ///
    /// # Arguments
    /// * `path` - 点号分隔的字段路径，可带 `context.` 前缀和比较器后缀
    /// * `namespace` - 第一段在其中查找
    /// * `expected` - 期望值
    pub fn evaluate<N>(path: &str, namespace: &N, expected: &Value) -> Result<bool>
    where
        N: Namespace + ?Sized,
    {
        let path = strip_namespace(path);
        let mut segments = path.split(PATH_SEPARATOR).map(str::trim).peekable();

        let first = segments.next().unwrap_or_default();
        let mut current = namespace
            .lookup(first)
            .ok_or_else(|| Self::unresolved(path, first))?;

        while let Some(segment) = segments.next() {
            match current.resolve(segment) {
                Some(next) => current = next,
                None => {
                    let is_last = segments.peek().is_none();
                    return match Comparator::from_suffix(segment) {
                        Some(comparator) if is_last => comparator.apply(current, expected),
                        _ => Err(Self::unresolved(path, segment)),
                    };
                }
            }
        }

        Ok(values::loose_eq(current, expected))
    }

    /// 解析路径得到终值，不做比较器回退
    pub fn resolve<'a, N>(path: &str, namespace: &'a N) -> Result<&'a Value>
    where
        N: Namespace + ?Sized,
    {
        let path = strip_namespace(path);
        let mut segments = path.split(PATH_SEPARATOR).map(str::trim);

        let first = segments.next().unwrap_or_default();
        let mut current = namespace
            .lookup(first)
            .ok_or_else(|| Self::unresolved(path, first))?;

        for segment in segments {
            current = current
                .resolve(segment)
                .ok_or_else(|| Self::unresolved(path, segment))?;
        }

        Ok(current)
    }

    fn unresolved(path: &str, segment: &str) -> RuleError {
        RuleError::FieldResolution {
            path: path.to_string(),
            segment: segment.to_string(),
        }
    }
}
