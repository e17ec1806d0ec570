//! Crate-wide error taxonomy.
//!
//! Mirrors the teacher's `error.rs`: one top-level enum-of-enums composed
//! with `#[error(transparent)] #[from]` arms over per-concern enums.

use thiserror::Error;

pub type KigaliResult<T> = Result<T, KigaliError>;

#[derive(Debug, Error)]
pub enum KigaliError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Source location for a parse or evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised while lexing/parsing QubecTalk source.
#[derive(Debug, Error, Clone)]
pub enum ParseError {
    #[error("syntax error at {location}: unexpected token '{token}': {message}")]
    Syntax {
        location: SourceLocation,
        token: String,
        message: String,
    },

    #[error("unexpected end of input while parsing {context}")]
    UnexpectedEof { context: String },
}

/// Errors raised by the quantity & unit converter.
#[derive(Debug, Error, Clone)]
pub enum UnitError {
    #[error(
        "cannot convert {from} to {to} in scope {scope}: {reason}"
    )]
    Conversion {
        from: String,
        to: String,
        scope: String,
        reason: String,
    },

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
}

/// Errors raised while the pushdown machine evaluates an operation tree.
#[derive(Debug, Error, Clone)]
pub enum EvalError {
    #[error("division by zero while evaluating {context}")]
    DivisionByZero { context: String },

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("undefined substance referenced: '{0}'")]
    UndefinedSubstance(String),

    #[error("expected a boolean condition, found: {0}")]
    TypeMismatch(String),

    #[error("attempt to write protected variable '{0}'")]
    ProtectedVariable(String),
}

/// Errors raised by the engine / stream keeper / recalc strategies.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("write attempted before application and substance were selected")]
    Scope,

    #[error("non-zero write to disabled stream '{stream}' in scope {scope}")]
    Enablement { stream: String, scope: String },

    #[error("unknown substance '{0}'")]
    UnknownSubstance(String),

    #[error("unknown stream '{0}'")]
    UnknownStream(String),

    #[error("displacement target equals source stream '{0}' in scope {1}")]
    SelfDisplacement(String, String),

    #[error("replacement target equals source substance '{0}'")]
    SelfReplacement(String),

    #[error("domain error: {0}")]
    Domain(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),
}
