use crate::{Error, FourCC, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Big endian box writer.
///
/// Boxes are written by closures: the size field is left blank and filled in
/// once the closure returns, so nested boxes can not be closed out of order.
///
/// ```
/// use ripper_mp4::BoxWriter;
/// use std::io::Cursor;
///
/// let mut writer = BoxWriter::new(Cursor::new(vec![]));
/// writer.write_box(b"moov", |w| w.write_full_box(b"mvhd", 0, 0, |w| w.write_u32(1)))?;
///
/// assert_eq!(writer.into_inner().into_inner().len(), 8 + 8 + 4 + 4);
/// # Ok::<(), ripper_mp4::Error>(())
/// ```
pub struct BoxWriter<W> {
    inner: W,
}

/// Region written as zeros, to be overwritten later by [`BoxWriter::patch`].
#[must_use]
#[derive(Debug)]
pub struct Reservation {
    position: u64,
    len: u64,
}

impl Reservation {
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<W: Write + Seek> BoxWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Write a basic box whose payload is produced by `body`.
    pub fn write_box<T, F>(&mut self, name: &[u8; 4], body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let start = self.position()?;
        self.write_u32(0)?;
        self.write_bytes(name)?;

        let value = body(self)?;

        let end = self.position()?;
        let size = end - start;
        let size = u32::try_from(size).map_err(|_| Error::BoxTooLarge {
            name: FourCC::new(name),
            size,
        })?;

        self.inner.seek(SeekFrom::Start(start))?;
        self.write_u32(size)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(value)
    }

    /// Write a full box, `body` produces the payload after version and flags.
    pub fn write_full_box<T, F>(
        &mut self,
        name: &[u8; 4],
        version: u8,
        flags: u32,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.write_box(name, |w| {
            w.write_u32(((version as u32) << 24) | (flags & 0xFFFFFF))?;
            body(w)
        })
    }

    /// Write `len` zero bytes to be filled in later.
    pub fn reserve(&mut self, len: u64) -> Result<Reservation> {
        let position = self.position()?;
        self.write_zeros(len)?;
        Ok(Reservation { position, len })
    }

    /// Overwrite a reserved region and return to the current position.
    pub fn patch(&mut self, reservation: Reservation, bytes: &[u8]) -> Result<()> {
        if reservation.len != bytes.len() as u64 {
            return Err(Error::PatchLength {
                reserved: reservation.len,
                actual: bytes.len(),
            });
        }

        let current = self.position()?;
        self.inner.seek(SeekFrom::Start(reservation.position))?;
        self.write_bytes(bytes)?;
        self.inner.seek(SeekFrom::Start(current))?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_zeros(&mut self, len: u64) -> Result<()> {
        std::io::copy(&mut std::io::repeat(0).take(len), &mut self.inner)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn back_patches_nested_sizes() {
        let mut writer = BoxWriter::new(Cursor::new(vec![]));
        writer
            .write_box(b"moov", |w| {
                w.write_full_box(b"mvhd", 1, 0x7, |w| w.write_u8(9))?;
                w.write_box(b"free", |_| Ok(()))
            })
            .unwrap();

        let data = writer.into_inner().into_inner();
        assert_eq!(
            data,
            [
                &[0, 0, 0, 29][..],
                b"moov",
                &[0, 0, 0, 13],
                b"mvhd",
                &[1, 0, 0, 7, 9],
                &[0, 0, 0, 8],
                b"free",
            ]
            .concat()
        );
    }

    #[test]
    fn patches_reservation_in_place() {
        let mut writer = BoxWriter::new(Cursor::new(vec![]));
        let reservation = writer.reserve(4).unwrap();
        writer.write_u8(0xff).unwrap();
        writer.patch(reservation, &[1, 2, 3, 4]).unwrap();
        writer.write_u8(0xee).unwrap();

        assert_eq!(writer.into_inner().into_inner(), vec![1, 2, 3, 4, 0xff, 0xee]);
    }

    #[test]
    fn rejects_wrong_patch_length() {
        let mut writer = BoxWriter::new(Cursor::new(vec![]));
        let reservation = writer.reserve(8).unwrap();
        assert!(matches!(
            writer.patch(reservation, &[0; 4]),
            Err(Error::PatchLength { reserved: 8, actual: 4 })
        ));
    }
}
