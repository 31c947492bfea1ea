use crate::error::DecodeError;

/// A byte cursor over the raw module. Every failure reports the absolute
/// offset the cursor had reached.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Cursor<'a> {
        Cursor { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.bytes.len()
    }

    pub fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError {
            offset: self.pos,
            message: message.into(),
        }
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if count > self.remaining() {
            return Err(self.error(format!("unexpected end of input: wanted {count} more bytes")));
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn expect_byte(&mut self, want: u8, what: &str) -> Result<(), DecodeError> {
        let got = self.read_byte()?;
        if got != want {
            return Err(self.error(format!("invalid {what}: expected {want:#04x}, got {got:#04x}")));
        }
        Ok(())
    }

    /// Jumps to an absolute offset, used to skip custom-section content.
    pub fn seek(&mut self, pos: usize) -> Result<(), DecodeError> {
        if pos > self.bytes.len() {
            return Err(self.error("seek past end of input"));
        }
        self.pos = pos;
        Ok(())
    }

    /// The bytes consumed since `start`.
    pub(crate) fn bytes_from(&self, start: usize) -> &'a [u8] {
        &self.bytes[start..self.pos]
    }
}
