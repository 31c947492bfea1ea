use super::Cursor;
use crate::error::DecodeError;

impl<'a> Cursor<'a> {
    /// Unsigned LEB128, at most 5 bytes.
    pub fn read_var_u32(&mut self) -> Result<u32, DecodeError> {
        let mut result: u32 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            result |= u32::from(byte & 0x7f).wrapping_shl(shift);
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(self.error("unsigned LEB128 longer than 5 bytes"));
            }
        }
        Ok(result)
    }

    /// Unsigned LEB128, at most 10 bytes.
    pub fn read_var_u64(&mut self) -> Result<u64, DecodeError> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            result |= u64::from(byte & 0x7f).wrapping_shl(shift);
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 70 {
                return Err(self.error("unsigned LEB128 longer than 10 bytes"));
            }
        }
        Ok(result)
    }

    /// Signed LEB128, at most 5 bytes. Bit 6 of the final byte extends the
    /// sign.
    pub fn read_var_i32(&mut self) -> Result<i32, DecodeError> {
        let mut result: i32 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            result |= i32::from(byte & 0x7f).wrapping_shl(shift);
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 32 && byte & 0x40 != 0 {
                    result |= -1i32 << shift;
                }
                break;
            }
            if shift >= 35 {
                return Err(self.error("signed LEB128 longer than 5 bytes"));
            }
        }
        Ok(result)
    }

    /// Signed LEB128, at most 10 bytes.
    pub fn read_var_i64(&mut self) -> Result<i64, DecodeError> {
        let mut result: i64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            result |= i64::from(byte & 0x7f).wrapping_shl(shift);
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                break;
            }
            if shift >= 70 {
                return Err(self.error("signed LEB128 longer than 10 bytes"));
            }
        }
        Ok(result)
    }

    /// A length-prefixed UTF-8 name.
    pub fn read_name(&mut self) -> Result<String, DecodeError> {
        let len = self.read_var_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| self.error("name is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_from(bytes: &[u8]) -> Result<u32, DecodeError> {
        Cursor::new(bytes).read_var_u32()
    }

    fn i32_from(bytes: &[u8]) -> Result<i32, DecodeError> {
        Cursor::new(bytes).read_var_i32()
    }

    fn i64_from(bytes: &[u8]) -> Result<i64, DecodeError> {
        Cursor::new(bytes).read_var_i64()
    }

    #[test]
    fn unsigned_leb128() {
        assert_eq!(u32_from(&[0x00]).unwrap(), 0);
        assert_eq!(u32_from(&[0x10]).unwrap(), 0x10);
        assert_eq!(u32_from(&[0x80, 0x02]).unwrap(), 0x100);
        assert_eq!(u32_from(&[0xe5, 0x8e, 0x26]).unwrap(), 624_485);
        assert_eq!(
            u32_from(&[0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap(),
            u32::MAX
        );
    }

    #[test]
    fn unsigned_leb128_rejects_over_length() {
        assert!(u32_from(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).is_err());
        assert!(u32_from(&[0x80]).is_err());
    }

    #[test]
    fn signed_leb128() {
        assert_eq!(i32_from(&[0x00]).unwrap(), 0);
        assert_eq!(i32_from(&[0x2a]).unwrap(), 42);
        assert_eq!(i32_from(&[0x7f]).unwrap(), -1);
        assert_eq!(i32_from(&[0x40]).unwrap(), -64);
        assert_eq!(i32_from(&[0x9b, 0xf1, 0x59]).unwrap(), -624_485);
        assert_eq!(
            i32_from(&[0x80, 0x80, 0x80, 0x80, 0x78]).unwrap(),
            i32::MIN
        );
        assert!(i32_from(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x78]).is_err());
    }

    #[test]
    fn signed_leb128_64() {
        assert_eq!(i64_from(&[0x7f]).unwrap(), -1);
        assert_eq!(
            i64_from(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x7f]).unwrap(),
            i64::MIN
        );
        assert_eq!(
            Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01])
                .read_var_u64()
                .unwrap(),
            u64::MAX
        );
    }

    fn encode_unsigned(mut n: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let mut byte = (n & 0x7f) as u8;
            n >>= 7;
            if n != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if n == 0 {
                return out;
            }
        }
    }

    fn encode_signed(mut n: i64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (n & 0x7f) as u8;
            n >>= 7;
            let done = (n == 0 && byte & 0x40 == 0) || (n == -1 && byte & 0x40 != 0);
            out.push(if done { byte } else { byte | 0x80 });
            if done {
                return out;
            }
        }
    }

    #[test]
    fn canonical_encodings_round_trip() {
        for n in [0u32, 1, 63, 64, 127, 128, 16_383, 16_384, 624_485, u32::MAX] {
            assert_eq!(u32_from(&encode_unsigned(n as u64)).unwrap(), n);
        }
        for n in [0u64, 127, 128, 1 << 32, u64::MAX] {
            assert_eq!(
                Cursor::new(&encode_unsigned(n)).read_var_u64().unwrap(),
                n
            );
        }
        for n in [0i32, 1, -1, 63, -64, 64, -65, 127, -128, i32::MAX, i32::MIN] {
            assert_eq!(i32_from(&encode_signed(n as i64)).unwrap(), n);
        }
        for n in [0i64, -1, 1 << 40, -(1 << 40), i64::MAX, i64::MIN] {
            assert_eq!(i64_from(&encode_signed(n)).unwrap(), n);
        }
    }

    #[test]
    fn names() {
        assert_eq!(
            Cursor::new(&[0x03, b'a', b'd', b'd']).read_name().unwrap(),
            "add"
        );
        assert!(Cursor::new(&[0x02, 0xff, 0xfe]).read_name().is_err());
        assert!(Cursor::new(&[0x05, b'a']).read_name().is_err());
    }
}
