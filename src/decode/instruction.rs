use super::Cursor;
use crate::error::DecodeError;

/// Cap on constant-expression length, against pathological inputs.
const MAX_INIT_EXPR_LEN: usize = 1024;

impl<'a> Cursor<'a> {
    /// Reads a constant expression up to and including its terminating `end`.
    ///
    /// Immediates are skipped structurally, so an 0x0B byte inside a constant
    /// payload does not cut the expression short. Only the opcodes a constant
    /// expression may contain are accepted.
    pub fn read_init_expr(&mut self) -> Result<Vec<u8>, DecodeError> {
        let start = self.position();
        loop {
            let opcode = self.read_byte()?;
            match opcode {
                0x0b => break, // end
                0x41 => {
                    self.read_var_i32()?;
                }
                0x42 => {
                    self.read_var_i64()?;
                }
                0x43 => {
                    self.read_bytes(4)?;
                }
                0x44 => {
                    self.read_bytes(8)?;
                }
                0x23 => {
                    self.read_var_u32()?;
                }
                _ => {
                    return Err(self.error(format!(
                        "unsupported opcode {opcode:#04x} in constant expression"
                    )))
                }
            }
            if self.position() - start > MAX_INIT_EXPR_LEN {
                return Err(self.error("constant expression too long"));
            }
        }
        Ok(self.bytes_from(start).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_through_end() {
        let bytes = [0x41, 0x2a, 0x0b, 0xff];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_init_expr().unwrap(), vec![0x41, 0x2a, 0x0b]);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn end_byte_inside_payload_is_not_the_terminator() {
        // i32.const 11 encodes as 0x41 0x0B; the real end follows.
        let bytes = [0x41, 0x0b, 0x0b];
        assert_eq!(
            Cursor::new(&bytes).read_init_expr().unwrap(),
            vec![0x41, 0x0b, 0x0b]
        );
    }

    #[test]
    fn rejects_non_constant_opcodes() {
        // i32.add is not allowed in a constant expression
        assert!(Cursor::new(&[0x41, 0x01, 0x41, 0x02, 0x6a, 0x0b])
            .read_init_expr()
            .is_err());
    }

    #[test]
    fn rejects_unterminated_expressions() {
        assert!(Cursor::new(&[0x41, 0x2a]).read_init_expr().is_err());
    }
}
