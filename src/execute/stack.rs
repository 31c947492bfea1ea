use crate::core::{Value, ValueType};
use crate::error::RuntimeError;

/// The operand stack, shared across call frames: arguments flow down,
/// results flow up.
///
/// Typed pops assert the tag of the top value. A mismatch or underflow is an
/// interpreter error, never a trap: it means the module is malformed in a way
/// a validator would have rejected.
#[derive(Default, Debug)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn push_i32(&mut self, value: i32) {
        self.values.push(Value::I32(value));
    }

    pub fn push_i64(&mut self, value: i64) {
        self.values.push(Value::I64(value));
    }

    pub fn push_f32(&mut self, value: f32) {
        self.values.push(Value::F32(value));
    }

    pub fn push_f64(&mut self, value: f64) {
        self.values.push(Value::F64(value));
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values
            .pop()
            .ok_or_else(|| RuntimeError::interpreter("operand stack underflow"))
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        match self.pop()? {
            Value::I32(v) => Ok(v),
            other => Err(Self::type_mismatch(ValueType::I32, other)),
        }
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        match self.pop()? {
            Value::I64(v) => Ok(v),
            other => Err(Self::type_mismatch(ValueType::I64, other)),
        }
    }

    pub fn pop_f32(&mut self) -> Result<f32, RuntimeError> {
        match self.pop()? {
            Value::F32(v) => Ok(v),
            other => Err(Self::type_mismatch(ValueType::F32, other)),
        }
    }

    pub fn pop_f64(&mut self) -> Result<f64, RuntimeError> {
        match self.pop()? {
            Value::F64(v) => Ok(v),
            other => Err(Self::type_mismatch(ValueType::F64, other)),
        }
    }

    pub fn peek(&self) -> Result<Value, RuntimeError> {
        self.values
            .last()
            .copied()
            .ok_or_else(|| RuntimeError::interpreter("operand stack underflow"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Discards values above `len`; used when a branch unwinds the stack.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    fn type_mismatch(expected: ValueType, got: Value) -> RuntimeError {
        RuntimeError::interpreter(format!(
            "expected {expected} on stack, got {}",
            got.ty()
        ))
    }
}
