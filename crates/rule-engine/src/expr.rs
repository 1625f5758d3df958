//! 受限表达式语言
//!
//! 动作和字符串条件在构造时编译为语法树，执行时只在命名空间上求值，
//! 不执行任意代码。支持算术、比较、布尔运算和对上下文字段的引用：
//!
//! ```text
//! context.distance * 20
//! context.weather == "nice" and not context.weekend
//! "vip" in context.tags
//! ```

use crate::context::{Namespace, strip_namespace};
use crate::error::{Result, RuleError};
use crate::resolver::{FieldAccess, PATH_SEPARATOR};
use crate::values::{self, Numeric};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// 编译后的表达式
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Path { path: String, segments: Vec<String> },
    Not(Box<Node>),
    Negative(Box<Node>),
    Positive(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
        }
    }
}

impl Expression {
    /// 编译表达式
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("多余的输入 {:?}", token.kind)));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// 常量表达式
    pub fn literal(value: Value) -> Self {
        Self {
            source: value.to_string(),
            root: Node::Literal(value),
        }
    }

    /// 在命名空间上求值
    pub fn evaluate<N>(&self, namespace: &N) -> Result<Value>
    where
        N: Namespace + ?Sized,
    {
        Evaluator {
            source: &self.source,
            namespace,
        }
        .eval(&self.root)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 表达式仅为一个字段引用时返回去掉命名空间前缀后的路径
    pub fn as_path(&self) -> Option<&str> {
        match &self.root {
            Node::Path { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_path(&self) -> bool {
        self.as_path().is_some()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

// ==================== 词法分析 ====================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(Value),
    Str(String),
    Path(String),
    Keyword(&'static str),
    Op(&'static str),
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

const KEYWORDS: [&str; 10] = [
    "and", "or", "not", "in", "true", "True", "false", "False", "null", "None",
];

// 长符号在前，保证最长匹配
const OPERATORS: [&str; 17] = [
    "//", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!", "(", ")",
];

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(&(offset, c)) = self.chars.get(self.pos) {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let kind = if c.is_ascii_digit() {
                self.number()?
            } else if c == '\'' || c == '"' {
                self.string(c)?
            } else if is_ident_start(c) {
                self.word()
            } else {
                self.operator(offset)?
            };
            tokens.push(Token {
                kind,
                position: offset,
            });
        }
        Ok(tokens)
    }

    fn peek_char(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.source.len(), |&(offset, _)| offset)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let source = self.source;
        let start = self.offset();
        while self.peek_char(0).is_some_and(&pred) {
            self.pos += 1;
        }
        &source[start..self.offset()]
    }

    fn number(&mut self) -> Result<TokenKind> {
        let source = self.source;
        let start = self.offset();
        self.take_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek_char(0) == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        let text = &source[start..self.offset()];

        let value = if is_float {
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        } else {
            text.parse::<i64>().ok().map(Value::from)
        };
        value
            .map(TokenKind::Number)
            .ok_or_else(|| self.error(start, format!("无效的数字 '{text}'")))
    }

    fn string(&mut self, quote: char) -> Result<TokenKind> {
        let start = self.offset();
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek_char(0) {
                None => return Err(self.error(start, "字符串未闭合")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(TokenKind::Str(text));
                }
                Some('\\') => {
                    let escaped = match self.peek_char(1) {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(other) => other,
                        None => return Err(self.error(start, "字符串未闭合")),
                    };
                    text.push(escaped);
                    self.pos += 2;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    /// 标识符、关键字或带点号的字段路径
    fn word(&mut self) -> TokenKind {
        let source = self.source;
        let start = self.offset();
        self.take_while(is_ident_char);
        let mut dotted = false;
        while self.peek_char(0) == Some(PATH_SEPARATOR)
            && self.peek_char(1).is_some_and(is_ident_char)
        {
            dotted = true;
            self.pos += 1;
            self.take_while(is_ident_char);
        }
        let text = &source[start..self.offset()];

        if !dotted {
            if let Some(keyword) = KEYWORDS.iter().find(|k| **k == text) {
                return TokenKind::Keyword(keyword);
            }
        }
        TokenKind::Path(text.to_string())
    }

    fn operator(&mut self, offset: usize) -> Result<TokenKind> {
        let source = self.source;
        let rest = &source[offset..];
        let op = OPERATORS
            .iter()
            .find(|op| rest.starts_with(**op))
            .ok_or_else(|| {
                let c = rest.chars().next().unwrap_or_default();
                self.error(offset, format!("无法识别的字符 '{c}'"))
            })?;
        self.pos += op.chars().count();
        Ok(match *op {
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            other => TokenKind::Op(other),
        })
    }

    fn error(&self, position: usize, message: impl fmt::Display) -> RuleError {
        RuleError::Expression {
            expression: self.source.to_string(),
            message: format!("位置 {position}: {message}"),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ==================== 语法分析 ====================

/// 语法树允许的最大高度
pub const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, ahead: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek_kind(0), Some(TokenKind::Keyword(k)) if *k == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, candidates: &[&'static str]) -> Option<&'static str> {
        match self.peek_kind(0) {
            Some(TokenKind::Op(op)) if candidates.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    /// 进入下一层语法树，超过 [`MAX_DEPTH`] 时报错
    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("嵌套层数超过 {MAX_DEPTH}")));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Node> {
        let entry_depth = self.depth;
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") || self.eat_op(&["||"]).is_some() {
            self.descend()?;
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let entry_depth = self.depth;
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") || self.eat_op(&["&&"]).is_some() {
            self.descend()?;
            let right = self.parse_not()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Node> {
        if self.eat_keyword("not") || self.eat_op(&["!"]).is_some() {
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let left = self.parse_additive()?;
        let op = if let Some(op) = self.eat_op(&["==", "!=", "<=", ">=", "<", ">"]) {
            match op {
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::Ne,
                "<=" => BinaryOp::Le,
                ">=" => BinaryOp::Ge,
                "<" => BinaryOp::Lt,
                _ => BinaryOp::Gt,
            }
        } else if self.eat_keyword("in") {
            BinaryOp::In
        } else if matches!(self.peek_kind(0), Some(TokenKind::Keyword("not")))
            && matches!(self.peek_kind(1), Some(TokenKind::Keyword("in")))
        {
            self.pos += 2;
            BinaryOp::NotIn
        } else {
            return Ok(left);
        };
        let right = self.parse_additive()?;
        Ok(Node::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Node> {
        let entry_depth = self.depth;
        let mut left = self.parse_term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            self.descend()?;
            let right = self.parse_term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Node> {
        let entry_depth = self.depth;
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "//", "/", "%"]) {
            let op = match op {
                "*" => BinaryOp::Mul,
                "//" => BinaryOp::FloorDiv,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            self.descend()?;
            let right = self.parse_unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let Some(op) = self.eat_op(&["-", "+"]) else {
            return self.parse_primary();
        };
        self.descend()?;
        let inner = Box::new(self.parse_unary()?);
        self.depth -= 1;
        Ok(if op == "-" {
            Node::Negative(inner)
        } else {
            Node::Positive(inner)
        })
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error("表达式不完整"));
        };
        self.pos += 1;
        match token.kind {
            TokenKind::Number(value) => Ok(Node::Literal(value)),
            TokenKind::Str(text) => Ok(Node::Literal(Value::String(text))),
            TokenKind::Keyword("true" | "True") => Ok(Node::Literal(Value::Bool(true))),
            TokenKind::Keyword("false" | "False") => Ok(Node::Literal(Value::Bool(false))),
            TokenKind::Keyword("null" | "None") => Ok(Node::Literal(Value::Null)),
            TokenKind::Path(text) => {
                let path = strip_namespace(&text).to_string();
                let segments = path.split(PATH_SEPARATOR).map(str::to_string).collect();
                Ok(Node::Path { path, segments })
            }
            TokenKind::LParen => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.peek_kind(0) {
                    Some(TokenKind::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(self.error("缺少右括号")),
                }
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("意外的符号 {other:?}")))
            }
        }
    }

    fn error(&self, message: impl fmt::Display) -> RuleError {
        let position = self.peek().map_or(self.source.len(), |t| t.position);
        RuleError::Expression {
            expression: self.source.to_string(),
            message: format!("位置 {position}: {message}"),
        }
    }
}

// ==================== 求值 ====================

struct Evaluator<'a, N: ?Sized> {
    source: &'a str,
    namespace: &'a N,
}

impl<N> Evaluator<'_, N>
where
    N: Namespace + ?Sized,
{
    fn eval(&self, node: &Node) -> Result<Value> {
        match node {
            Node::Literal(value) => Ok(value.clone()),
            Node::Path { path, segments } => self.lookup(path, segments),
            Node::Not(inner) => Ok(Value::Bool(!values::truthy(&self.eval(inner)?))),
            Node::Negative(inner) => {
                let value = self.eval(inner)?;
                match Numeric::of(&value) {
                    Some(Numeric::Int(i)) => i
                        .checked_neg()
                        .map(Value::from)
                        .ok_or_else(|| RuleError::action(self.source, "整数溢出")),
                    Some(Numeric::Float(f)) => self.float(-f),
                    None => Err(self.mismatch("-", &value, &value)),
                }
            }
            Node::Positive(inner) => {
                let value = self.eval(inner)?;
                Numeric::of(&value)
                    .and_then(Numeric::into_value)
                    .ok_or_else(|| self.mismatch("+", &value, &value))
            }
            Node::And(left, right) => Ok(Value::Bool(
                values::truthy(&self.eval(left)?) && values::truthy(&self.eval(right)?),
            )),
            Node::Or(left, right) => Ok(Value::Bool(
                values::truthy(&self.eval(left)?) || values::truthy(&self.eval(right)?),
            )),
            Node::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, &left, &right)
            }
        }
    }

    /// 顶层名称不存在时为 null，嵌套段不存在时报字段解析错误
    fn lookup(&self, path: &str, segments: &[String]) -> Result<Value> {
        let unresolved = |segment: &str| RuleError::FieldResolution {
            path: path.to_string(),
            segment: segment.to_string(),
        };
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Value::Null);
        };
        let Some(mut current) = self.namespace.lookup(first) else {
            if rest.is_empty() {
                return Ok(Value::Null);
            }
            return Err(unresolved(first));
        };
        for segment in rest {
            current = current.resolve(segment).ok_or_else(|| unresolved(segment))?;
        }
        Ok(current.clone())
    }

    fn binary(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
        let symbol = op.symbol();
        match op {
            BinaryOp::Eq => Ok(Value::Bool(values::loose_eq(left, right))),
            BinaryOp::Ne => Ok(Value::Bool(!values::loose_eq(left, right))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = values::compare(left, right)
                    .ok_or_else(|| self.mismatch(symbol, left, right))?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            BinaryOp::In | BinaryOp::NotIn => {
                let found = values::contains(right, left)
                    .ok_or_else(|| self.mismatch(symbol, left, right))?;
                Ok(Value::Bool(found == (op == BinaryOp::In)))
            }
            BinaryOp::Add => {
                if let (Value::String(a), Value::String(b)) = (left, right) {
                    return Ok(Value::String(format!("{a}{b}")));
                }
                self.arithmetic(op, left, right, i64::checked_add, |a, b| a + b)
            }
            BinaryOp::Sub => self.arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
            BinaryOp::Mul => self.arithmetic(op, left, right, i64::checked_mul, |a, b| a * b),
            BinaryOp::Div => {
                let (a, b) = self.operands(op, left, right)?;
                if b.as_f64() == 0.0 {
                    return Err(RuleError::action(self.source, "除数为零"));
                }
                self.float(a.as_f64() / b.as_f64())
            }
            BinaryOp::FloorDiv => {
                let (a, b) = self.operands(op, left, right)?;
                if b.as_f64() == 0.0 {
                    return Err(RuleError::action(self.source, "除数为零"));
                }
                match (a, b) {
                    (Numeric::Int(a), Numeric::Int(b)) => {
                        let quotient = a
                            .checked_div(b)
                            .ok_or_else(|| RuleError::action(self.source, "整数溢出"))?;
                        let adjust = a % b != 0 && ((a < 0) != (b < 0));
                        Ok(Value::from(if adjust { quotient - 1 } else { quotient }))
                    }
                    _ => self.float((a.as_f64() / b.as_f64()).floor()),
                }
            }
            BinaryOp::Mod => {
                let (a, b) = self.operands(op, left, right)?;
                if b.as_f64() == 0.0 {
                    return Err(RuleError::action(self.source, "除数为零"));
                }
                match (a, b) {
                    (Numeric::Int(a), Numeric::Int(b)) => {
                        let remainder = a
                            .checked_rem(b)
                            .ok_or_else(|| RuleError::action(self.source, "整数溢出"))?;
                        // 余数与除数同号
                        let remainder = if remainder != 0 && ((remainder < 0) != (b < 0)) {
                            remainder + b
                        } else {
                            remainder
                        };
                        Ok(Value::from(remainder))
                    }
                    _ => {
                        let (a, b) = (a.as_f64(), b.as_f64());
                        self.float(a - b * (a / b).floor())
                    }
                }
            }
        }
    }

    fn arithmetic(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match self.operands(op, left, right)? {
            (Numeric::Int(a), Numeric::Int(b)) => int_op(a, b)
                .map(Value::from)
                .ok_or_else(|| RuleError::action(self.source, "整数溢出")),
            (a, b) => self.float(float_op(a.as_f64(), b.as_f64())),
        }
    }

    fn operands(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<(Numeric, Numeric)> {
        match (Numeric::of(left), Numeric::of(right)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(self.mismatch(op.symbol(), left, right)),
        }
    }

    fn float(&self, value: f64) -> Result<Value> {
        Numeric::Float(value)
            .into_value()
            .ok_or_else(|| RuleError::action(self.source, "结果不是有限数值"))
    }

    fn mismatch(&self, operator: &str, left: &Value, right: &Value) -> RuleError {
        RuleError::TypeMismatch {
            operator: operator.to_string(),
            left: values::type_name(left).to_string(),
            right: values::type_name(right).to_string(),
        }
    }
}
