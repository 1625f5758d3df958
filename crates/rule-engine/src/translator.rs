//! 词汇替换
//!
//! 让规则作者用接近自然语言的写法描述条件，如 `context.wetter ist "schön"`，
//! 在编译前按整词边界替换成规范记号。

use crate::error::{Result, RuleError};
use regex::{NoExpand, Regex};

#[derive(Debug, Clone)]
struct Translation {
    phrase: String,
    replacement: String,
    pattern: Regex,
}

/// 按声明顺序执行整词替换，后一条作用于前一条替换后的文本
#[derive(Debug, Clone, Default)]
pub struct Translator {
    translations: Vec<Translation>,
}

impl Translator {
    pub fn new<I, P, R>(translations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<String>,
    {
        let translations = translations
            .into_iter()
            .map(|(phrase, replacement)| Self::compile(phrase.into(), replacement.into()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { translations })
    }

    /// 只在短语首尾是单词字符的一侧加 `\b`，符号短语按原样匹配
    fn compile(phrase: String, replacement: String) -> Result<Translation> {
        if phrase.trim().is_empty() {
            return Err(RuleError::Definition("替换短语不能为空".to_string()));
        }
        let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
        let start = if is_word(phrase.chars().next()) { r"\b" } else { "" };
        let end = if is_word(phrase.chars().last()) { r"\b" } else { "" };
        let pattern = Regex::new(&format!("{start}{}{end}", regex::escape(&phrase)))
            .map_err(|e| RuleError::Definition(format!("替换短语 '{phrase}' 无效: {e}")))?;
        Ok(Translation {
            phrase,
            replacement,
            pattern,
        })
    }

    pub fn replace(&self, text: &str) -> String {
        self.translations
            .iter()
            .fold(text.to_string(), |acc, translation| {
                translation
                    .pattern
                    .replace_all(&acc, NoExpand(&translation.replacement))
                    .into_owned()
            })
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.translations
            .iter()
            .map(|t| (t.phrase.as_str(), t.replacement.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_only() {
        let translator = Translator::new([("foo", "bar")]).unwrap();
        assert_eq!(translator.replace("a foo here"), "a bar here");
        assert_eq!(translator.replace("foobar"), "foobar");
        assert_eq!(translator.replace("foo"), "bar");
        assert_eq!(translator.replace("(foo)"), "(bar)");
    }

    #[test]
    fn test_german_vocabulary() {
        let translator = Translator::new([
            ("ist", "=="),
            ("nicht", "not"),
            ("Fahrpreis", "fare"),
            ("und", "and"),
        ])
        .unwrap();
        assert_eq!(
            translator.replace("context.tag ist 'Sonntag' und nicht context.Fahrpreis"),
            "context.tag == 'Sonntag' and not context.fare"
        );
        // 不替换单词内部的 "ist"
        assert_eq!(translator.replace("context.List"), "context.List");
    }

    #[test]
    fn test_chained_substitutions_follow_declaration_order() {
        let forward = Translator::new([("a", "b"), ("b", "c")]).unwrap();
        assert_eq!(forward.replace("a b"), "c c");

        let backward = Translator::new([("b", "c"), ("a", "b")]).unwrap();
        assert_eq!(backward.replace("a b"), "b c");

        // 重叠短语：先声明的先生效
        let overlapping = Translator::new([("greater", "gt"), ("greater than", ">")]).unwrap();
        assert_eq!(overlapping.replace("x greater than 1"), "x gt than 1");
        let overlapping = Translator::new([("greater than", ">"), ("greater", "gt")]).unwrap();
        assert_eq!(overlapping.replace("x greater than 1"), "x > 1");
    }

    #[test]
    fn test_symbol_phrases() {
        let translator = Translator::new([("≥", ">="), ("$fare", "context.fare")]).unwrap();
        assert_eq!(translator.replace("$fare ≥ 10"), "context.fare >= 10");
    }

    #[test]
    fn test_empty_phrase_rejected() {
        assert_eq!(
            Translator::new([(" ", "x")]).unwrap_err().code(),
            "INVALID_DEFINITION"
        );
    }
}
