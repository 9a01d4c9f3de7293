use thiserror::Error;

/// Errors raised while parsing or evaluating a single cell's formula.
///
/// These never escape a recalculation pass: the pass stores them as the
/// cell's value and renders them as `#ERROR: <message>`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Syntax error: {message} (position {position})")]
    Syntax { message: String, position: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Circular reference to {0}")]
    CircularReference(String),

    #[error("Cell {0} is not a number")]
    NotANumber(String),

    #[error("Reference {0} is outside the grid")]
    OutOfRange(String),

    /// The chain of references being evaluated exceeded
    /// [`MAX_EVALUATION_DEPTH`](crate::domain::MAX_EVALUATION_DEPTH).
    #[error("References through {0} are nested too deeply")]
    TooDeep(String),
}

impl EvalError {
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        EvalError::Syntax {
            message: message.into(),
            position,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Errors surfaced to the caller by save/load.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is corrupt or has an invalid format: {0}")]
    CorruptFile(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
