//! 紧凑逻辑串解析
//!
//! 语法：
//!
//! ```text
//! expr := term (('&'|'|'|'^') term)*
//! term := '~' term | INDEX | '(' expr ')'
//! ```
//!
//! 优先级从高到低为 `~`、`&`、`|`、`^`，二元操作符左结合。
//! 逻辑树高度不超过 [`MAX_DEPTH`]。

use crate::error::{Result, RuleError};
use crate::operators::LogicalOperator;
use std::fmt;

/// 逻辑树，叶子是从 1 开始的条件序号
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicTree {
    Ref(usize),
    Not(Box<LogicTree>),
    Binary {
        left: Box<LogicTree>,
        op: LogicalOperator,
        right: Box<LogicTree>,
    },
}

impl LogicTree {
    pub fn not(inner: LogicTree) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn binary(left: LogicTree, op: LogicalOperator, right: LogicTree) -> Self {
        Self::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// 按出现顺序收集引用的条件序号
    pub fn references(&self) -> Vec<usize> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs(&self, refs: &mut Vec<usize>) {
        match self {
            Self::Ref(index) => refs.push(*index),
            Self::Not(inner) => inner.collect_refs(refs),
            Self::Binary { left, right, .. } => {
                left.collect_refs(refs);
                right.collect_refs(refs);
            }
        }
    }
}

impl fmt::Display for LogicTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(index) => write!(f, "{index}"),
            Self::Not(inner) => write!(f, "~{inner}"),
            Self::Binary { left, op, right } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}

/// 解析逻辑串
pub fn parse(input: &str) -> Result<LogicTree> {
    let mut parser = LogicParser {
        input,
        chars: input.char_indices().collect(),
        pos: 0,
        depth: 0,
    };
    let tree = parser.parse_level(0)?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("无法识别的操作符 '{c}'")));
    }
    Ok(tree)
}

/// 逻辑树允许的最大高度（取反、括号和二元操作符各计一层）
pub const MAX_DEPTH: usize = 256;

// 二元操作符按绑定强度从弱到强排列
const LEVELS: [LogicalOperator; 3] = [
    LogicalOperator::Xor,
    LogicalOperator::Or,
    LogicalOperator::And,
];

struct LogicParser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    depth: usize,
}

impl LogicParser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.input.len(), |&(offset, _)| offset)
    }

    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("嵌套层数超过 {MAX_DEPTH}")));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_level(&mut self, level: usize) -> Result<LogicTree> {
        let Some(&op) = LEVELS.get(level) else {
            return self.parse_term();
        };
        let entry_depth = self.depth;
        let mut left = self.parse_level(level + 1)?;
        loop {
            self.skip_whitespace();
            if self.peek() != Some(op.symbol()) {
                self.depth = entry_depth;
                return Ok(left);
            }
            self.pos += 1;
            self.descend()?;
            let right = self.parse_level(level + 1)?;
            left = LogicTree::binary(left, op, right);
        }
    }

    fn parse_term(&mut self) -> Result<LogicTree> {
        self.skip_whitespace();
        match self.peek() {
            Some('~') => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_term()?;
                self.depth -= 1;
                Ok(LogicTree::not(inner))
            }
            Some('(') => {
                let open = self.position();
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_level(0)?;
                self.depth -= 1;
                self.skip_whitespace();
                if self.peek() != Some(')') {
                    return Err(RuleError::Parse {
                        input: self.input.to_string(),
                        position: open,
                        message: "括号未闭合".to_string(),
                    });
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.position();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits = &self.input[start..self.position()];
                digits
                    .parse()
                    .map(LogicTree::Ref)
                    .map_err(|_| self.error(format!("条件序号过大 '{digits}'")))
            }
            Some(c) => Err(self.error(format!("意外的字符 '{c}'"))),
            None => Err(self.error("缺少条件")),
        }
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::Parse {
            input: self.input.to_string(),
            position: self.position(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LogicalOperator::{And, Or, Xor};

    fn r(index: usize) -> LogicTree {
        LogicTree::Ref(index)
    }

    #[test]
    fn test_single_reference() {
        assert_eq!(parse("1").unwrap(), r(1));
        assert_eq!(parse("(1)").unwrap(), r(1));
        assert_eq!(parse(" ((12)) ").unwrap(), r(12));
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(
            parse("1 & 2 & 3").unwrap(),
            LogicTree::binary(LogicTree::binary(r(1), And, r(2)), And, r(3))
        );
        assert_eq!(parse("1&2&3").unwrap().to_string(), "((1 & 2) & 3)");
    }

    #[test]
    fn test_negation() {
        assert_eq!(
            parse("~(1|2)").unwrap(),
            LogicTree::not(LogicTree::binary(r(1), Or, r(2)))
        );
        assert_eq!(parse("~~1").unwrap(), LogicTree::not(LogicTree::not(r(1))));
        assert_eq!(
            parse("~1 & 2").unwrap(),
            LogicTree::binary(LogicTree::not(r(1)), And, r(2))
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse("1 | 2 & 3").unwrap().to_string(), "(1 | (2 & 3))");
        assert_eq!(parse("1 ^ 2 | 3").unwrap().to_string(), "(1 ^ (2 | 3))");
        assert_eq!(parse("1 & 2 ^ 3 | 4").unwrap().to_string(), "((1 & 2) ^ (3 | 4))");
        assert_eq!(
            parse("1 & (2|~3)").unwrap(),
            LogicTree::binary(r(1), And, LogicTree::binary(r(2), Or, LogicTree::not(r(3))))
        );
        assert_eq!(
            parse("1 ^ 2 ^ 3").unwrap(),
            LogicTree::binary(LogicTree::binary(r(1), Xor, r(2)), Xor, r(3))
        );
    }

    #[test]
    fn test_references() {
        assert_eq!(parse("3 & (1 | ~3)").unwrap().references(), vec![3, 1, 3]);
    }

    #[test]
    fn test_malformed_input() {
        for input in ["", "   ", "(1 & 2", "1 & 2)", "1 &", "& 1", "1 + 2", "()", "1 2", "a"] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.code(), "PARSE_ERROR", "input: {input:?}");
        }
    }

    #[test]
    fn test_error_position() {
        match parse("1 & (2 | 3").unwrap_err() {
            RuleError::Parse { position, .. } => assert_eq!(position, 4),
            other => panic!("unexpected error: {other}"),
        }
        match parse("1 & x").unwrap_err() {
            RuleError::Parse { position, .. } => assert_eq!(position, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let negations = format!("{}1", "~".repeat(200_000));
        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        let chain = vec!["1"; 100_000].join(" & ");
        for input in [negations, parens, chain] {
            match parse(&input).unwrap_err() {
                RuleError::Parse { message, .. } => assert!(message.contains("嵌套层数")),
                other => panic!("unexpected error: {other}"),
            }
        }

        let within = format!("{}1{}", "(~".repeat(100), ")".repeat(100));
        assert_eq!(parse(&within).unwrap().references(), vec![1]);
        assert!(parse(&vec!["1"; 200].join(" | ")).is_ok());
    }
}
