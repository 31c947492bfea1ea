use super::frame;
use crate::core::Value;
use crate::error::RuntimeError;

/// Evaluates a constant expression to a single value.
///
/// Global initializers, data-segment offsets, and element-segment offsets all
/// go through here. Only `*.const`, `global.get` of an already-initialized
/// global, and the terminating `end` are legal.
pub(crate) fn eval(expr: &[u8], globals: &[Value]) -> Result<Value, RuntimeError> {
    let mut pc = 0;
    let mut value = None;
    loop {
        let opcode = frame::read_byte(expr, &mut pc)?;
        match opcode {
            0x0b => break,
            0x41 => value = Some(Value::I32(frame::read_var_i32(expr, &mut pc)?)),
            0x42 => value = Some(Value::I64(frame::read_var_i64(expr, &mut pc)?)),
            0x43 => value = Some(Value::F32(frame::read_f32(expr, &mut pc)?)),
            0x44 => value = Some(Value::F64(frame::read_f64(expr, &mut pc)?)),
            0x23 => {
                let index = frame::read_var_u32(expr, &mut pc)? as usize;
                let global = globals.get(index).ok_or_else(|| {
                    RuntimeError::interpreter(format!(
                        "global index {index} out of range in constant expression"
                    ))
                })?;
                value = Some(*global);
            }
            _ => {
                return Err(RuntimeError::interpreter(format!(
                    "unsupported opcode {opcode:#04x} in constant expression"
                )))
            }
        }
    }
    value.ok_or_else(|| RuntimeError::interpreter("constant expression yields no value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_constants() {
        assert_eq!(eval(&[0x41, 0x2a, 0x0b], &[]).unwrap(), Value::I32(42));
        assert_eq!(eval(&[0x42, 0x7f, 0x0b], &[]).unwrap(), Value::I64(-1));
        let mut f32_expr = vec![0x43];
        f32_expr.extend_from_slice(&1.5f32.to_le_bytes());
        f32_expr.push(0x0b);
        assert_eq!(eval(&f32_expr, &[]).unwrap(), Value::F32(1.5));
        let mut f64_expr = vec![0x44];
        f64_expr.extend_from_slice(&(-2.5f64).to_le_bytes());
        f64_expr.push(0x0b);
        assert_eq!(eval(&f64_expr, &[]).unwrap(), Value::F64(-2.5));
    }

    #[test]
    fn reads_initialized_globals() {
        let globals = [Value::I32(7), Value::I64(9)];
        assert_eq!(eval(&[0x23, 0x01, 0x0b], &globals).unwrap(), Value::I64(9));
        assert!(eval(&[0x23, 0x02, 0x0b], &globals).is_err());
    }

    #[test]
    fn rejects_everything_else() {
        assert!(eval(&[0x6a, 0x0b], &[]).is_err()); // i32.add
        assert!(eval(&[0x0b], &[]).is_err()); // no value produced
        assert!(eval(&[0x41, 0x2a], &[]).is_err()); // unterminated
    }
}
