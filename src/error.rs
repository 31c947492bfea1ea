use thiserror::Error;

/// Raised by the decoder on a malformed binary. Decoding never recovers;
/// `offset` is the absolute byte position the cursor had reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode error at offset {offset:#06x}: {message}")]
pub struct DecodeError {
    pub offset: usize,
    pub message: String,
}

/// A WebAssembly-defined runtime error. Halts the current call with a typed
/// error rather than returning a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("memory address overflow")]
    AddressOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("undefined element")]
    UndefinedElement,
    #[error("indirect call signature mismatch")]
    SignatureMismatch,
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("cannot set immutable global")]
    ImmutableGlobal,
    #[error("cannot execute imported function {module}::{field}")]
    UnresolvedImport { module: String, field: String },
}

/// Anything `instantiate`/`call` can report.
///
/// `Interpreter` covers conditions a full validator would have rejected before
/// execution (unknown opcode, index out of range, typed pop mismatch, missing
/// memory); `Trap` is a defined WebAssembly runtime error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("trap: {0}")]
    Trap(#[from] Trap),
    #[error("interpreter error: {0}")]
    Interpreter(String),
}

impl RuntimeError {
    pub(crate) fn interpreter(message: impl Into<String>) -> Self {
        RuntimeError::Interpreter(message.into())
    }
}
