use thiserror::Error;

/// Programming-contract violations raised by the board engine.
///
/// None of these are user conditions: each one means a caller asked for
/// something the engine never allows. The rejected call leaves all state
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("more than 4 lines cleared at once ({0})")]
    TooManyLines(u32),

    #[error("a T-spin cannot clear 4 lines")]
    SpinQuad,

    #[error("no falling piece")]
    NoFallingPiece,

    #[error("operation is only valid on the {expected} board")]
    WrongRole { expected: &'static str },

    #[error("lock position ({x}, {y}) is off the grid or overlaps the stack")]
    IllegalLock { x: i8, y: i8 },
}
