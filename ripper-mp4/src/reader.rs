use std::io::{Cursor, Error, ErrorKind, Read, Result};

/// Big endian reader over an owned box payload.
#[derive(Clone, Default)]
pub struct Reader {
    inner: Cursor<Vec<u8>>,
}

impl Reader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    pub fn has_more_data(&self) -> bool {
        self.inner.position() < (self.inner.get_ref().len() as u64)
    }

    pub fn get_length(&self) -> u64 {
        self.inner.get_ref().len() as u64
    }

    pub fn get_position(&self) -> u64 {
        self.inner.position()
    }

    pub fn remaining(&self) -> u64 {
        self.get_length().saturating_sub(self.get_position())
    }

    pub fn skip(&mut self, bytes: u64) -> Result<()> {
        let position = self.get_position() + bytes;

        if position > self.get_length() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                "Reader skips out of memory bounds.",
            ));
        }

        self.inner.set_position(position);
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0; 2];
        self.inner.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_bytes(&mut self, bytes: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; bytes];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Take the underlying payload without copying.
    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }

    /// Consume everything left in the payload.
    pub fn read_rest(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.remaining() as usize);
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let mut reader = Reader::new(vec![0, 1, 0, 0, 0, 2, 0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert!(!reader.has_more_data());
    }

    #[test]
    fn skip_past_end_fails() {
        let mut reader = Reader::new(vec![0; 4]);
        assert!(reader.skip(5).is_err());
        reader.skip(4).unwrap();
        assert_eq!(reader.remaining(), 0);
    }
}
