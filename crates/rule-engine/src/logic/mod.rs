//! 紧凑逻辑串与两阶段求值

pub mod evaluator;
pub mod parser;

pub use evaluator::{CONDITION_PREFIX, LogicEvaluator};
pub use parser::{LogicTree, parse};
