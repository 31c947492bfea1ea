use super::{read_vec, Cursor};
use crate::core::{FuncType, GlobalType, Limits, MemoryType, RefType, TableType, ValueType};
use crate::error::DecodeError;

impl<'a> Cursor<'a> {
    /// A concrete value type. `Void` (0x40) only appears in block types,
    /// which the executor reads itself.
    pub fn read_value_type(&mut self) -> Result<ValueType, DecodeError> {
        let b = self.read_byte()?;
        match ValueType::from_byte(b) {
            Some(ValueType::Void) | None => Err(self.error(format!("invalid value type: {b:#04x}"))),
            Some(ty) => Ok(ty),
        }
    }

    pub fn read_ref_type(&mut self) -> Result<RefType, DecodeError> {
        let b = self.read_byte()?;
        match b {
            0x70 => Ok(RefType::Funcref),
            _ => Err(self.error(format!("invalid element type: {b:#04x}"))),
        }
    }

    pub fn read_func_type(&mut self) -> Result<FuncType, DecodeError> {
        self.expect_byte(0x60, "function type form")?;
        let params = read_vec!(self, self.read_value_type()?);
        let results = read_vec!(self, self.read_value_type()?);
        if results.len() > 1 {
            return Err(self.error("multiple function results are not supported"));
        }
        Ok(FuncType { params, results })
    }

    pub fn read_limits(&mut self) -> Result<Limits, DecodeError> {
        match self.read_byte()? {
            0x00 => Ok(Limits {
                min: self.read_var_u32()?,
                max: None,
            }),
            0x01 => {
                let min = self.read_var_u32()?;
                let max = self.read_var_u32()?;
                Ok(Limits {
                    min,
                    max: Some(max),
                })
            }
            flag => Err(self.error(format!("invalid limits flag: {flag:#04x}"))),
        }
    }

    pub fn read_table_type(&mut self) -> Result<TableType, DecodeError> {
        Ok(TableType {
            elem_type: self.read_ref_type()?,
            limits: self.read_limits()?,
        })
    }

    pub fn read_memory_type(&mut self) -> Result<MemoryType, DecodeError> {
        Ok(MemoryType {
            limits: self.read_limits()?,
        })
    }

    pub fn read_global_type(&mut self) -> Result<GlobalType, DecodeError> {
        let value_type = self.read_value_type()?;
        let mutable = match self.read_byte()? {
            0x00 => false,
            0x01 => true,
            b => return Err(self.error(format!("invalid mutability flag: {b:#04x}"))),
        };
        Ok(GlobalType {
            value_type,
            mutable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_types() {
        // (i32, i32) -> i32
        let bytes = [0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f];
        let ty = Cursor::new(&bytes).read_func_type().unwrap();
        assert_eq!(ty.params, vec![ValueType::I32, ValueType::I32]);
        assert_eq!(ty.results, vec![ValueType::I32]);

        // missing the 0x60 form byte
        assert!(Cursor::new(&[0x7f]).read_func_type().is_err());
        // two results
        assert!(Cursor::new(&[0x60, 0x00, 0x02, 0x7f, 0x7f])
            .read_func_type()
            .is_err());
    }

    #[test]
    fn limits() {
        assert_eq!(
            Cursor::new(&[0x00, 0x01]).read_limits().unwrap(),
            Limits { min: 1, max: None }
        );
        assert_eq!(
            Cursor::new(&[0x01, 0x01, 0x10]).read_limits().unwrap(),
            Limits {
                min: 1,
                max: Some(16)
            }
        );
        assert!(Cursor::new(&[0x02, 0x01]).read_limits().is_err());
    }

    #[test]
    fn global_types() {
        let ty = Cursor::new(&[0x7e, 0x01]).read_global_type().unwrap();
        assert_eq!(ty.value_type, ValueType::I64);
        assert!(ty.mutable);
        assert!(Cursor::new(&[0x7f, 0x02]).read_global_type().is_err());
        // void is not a value type
        assert!(Cursor::new(&[0x40, 0x00]).read_global_type().is_err());
    }
}
