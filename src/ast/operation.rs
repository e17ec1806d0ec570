//! Values, arithmetic, and samplers (spec §4.3).
//!
//! Modelled as a tagged sum type with a single evaluator pattern-matching
//! over it, per spec §9 ("Operation tree dispatch ... use tagged
//! variants over the operation kind and a single evaluator function").

use crate::quantity::{Quantity, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

/// Protected variables: read-only, always available (spec §4.3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedVar {
    YearAbsolute,
    YearsElapsed,
}

impl ProtectedVar {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "yearAbsolute" => Some(ProtectedVar::YearAbsolute),
            "yearsElapsed" => Some(ProtectedVar::YearsElapsed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProtectedVar::YearAbsolute => "yearAbsolute",
            ProtectedVar::YearsElapsed => "yearsElapsed",
        }
    }
}

/// A node of the expression tree. Every arm is a value-producing
/// operation; side-effecting [`crate::ast::command::Command`]s wrap an
/// `Expr` rather than being one.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Quantity),
    Var(String),
    Protected(ProtectedVar),
    StreamRead {
        stream: String,
        of_substance: Option<String>,
        as_unit: Option<Unit>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Limit {
        value: Box<Expr>,
        min: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    Conditional {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    SampleNormal {
        mean: Box<Expr>,
        std: Box<Expr>,
    },
    SampleUniform {
        low: Box<Expr>,
        high: Box<Expr>,
    },
}

impl Expr {
    pub fn literal(q: Quantity) -> Self {
        Expr::Literal(q)
    }
}
