use crate::{Error, FourCC, ParsedBox, Result};

/// A `mvhd`, `tkhd` or `mdhd` box kept byte for byte apart from its duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderBox {
    pub name: FourCC,
    pub version: u8,
    pub flags: u32,
    /// Everything after version and flags.
    pub payload: Vec<u8>,
}

impl HeaderBox {
    pub const MOVIE: FourCC = FourCC::new(b"mvhd");
    pub const TRACK: FourCC = FourCC::new(b"tkhd");
    pub const MEDIA: FourCC = FourCC::new(b"mdhd");

    /// Parses a MVHD, TKHD or MDHD Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let header = Self {
            name: box_.name,
            version: box_.version(),
            flags: box_.flags(),
            payload: box_.reader.read_rest()?,
        };

        header.duration()?;
        Ok(header)
    }

    /// Offset and width of the duration field inside the payload.
    fn duration_field(&self) -> Result<(usize, usize)> {
        let wide = self.version == 1;

        // creation time, modification time, then timescale or track id (+ reserved)
        let offset = match self.name {
            Self::MOVIE | Self::MEDIA if wide => 20,
            Self::MOVIE | Self::MEDIA => 12,
            Self::TRACK if wide => 24,
            Self::TRACK => 16,
            name => {
                return Err(Error::InvalidData(format!(
                    "`{}` is not a movie, track or media header",
                    name
                )));
            }
        };

        Ok((offset, if wide { 8 } else { 4 }))
    }

    pub fn duration(&self) -> Result<u64> {
        let (offset, width) = self.duration_field()?;
        let field = self
            .payload
            .get(offset..offset + width)
            .ok_or_else(|| self.short())?;

        Ok(if width == 8 {
            u64::from_be_bytes(field.try_into().map_err(|_| self.short())?)
        } else {
            u32::from_be_bytes(field.try_into().map_err(|_| self.short())?) as u64
        })
    }

    /// Time units per second, `None` for track headers which have none.
    pub fn timescale(&self) -> Option<u32> {
        let offset = match self.name {
            Self::MOVIE | Self::MEDIA if self.version == 1 => 16,
            Self::MOVIE | Self::MEDIA => 8,
            _ => return None,
        };

        self.payload
            .get(offset..offset + 4)
            .and_then(|x| x.try_into().ok())
            .map(u32::from_be_bytes)
    }

    /// Copy of the payload with the duration field replaced.
    pub fn with_duration(&self, duration: u64) -> Result<Vec<u8>> {
        let (offset, width) = self.duration_field()?;
        let mut payload = self.payload.clone();
        let field = payload
            .get_mut(offset..offset + width)
            .ok_or_else(|| self.short())?;

        if width == 8 {
            field.copy_from_slice(&duration.to_be_bytes());
        } else {
            let duration = u32::try_from(duration).map_err(|_| Error::DurationOverflow {
                name: self.name,
                duration,
            })?;
            field.copy_from_slice(&duration.to_be_bytes());
        }

        Ok(payload)
    }

    fn short(&self) -> Error {
        Error::InvalidData(format!("`{}` box is too short to hold a duration", self.name))
    }
}
