//! A stack-based interpreter for the WebAssembly MVP binary format, plus
//! saturating float-to-int conversions and a minimal WASI `fd_write`.
//!
//! `decode_module` turns bytes into a [`Module`]; [`Instance::instantiate`]
//! takes the module over, initializes memory, globals, and data, and runs the
//! start function; `Instance::call` dispatches exported functions.

pub mod core;
pub mod decode;
pub mod error;
pub mod execute;

pub use crate::core::{Module, Value};
pub use decode::decode_module;
pub use error::{DecodeError, RuntimeError, Trap};
pub use execute::Instance;
