use crate::{ParsedBox, Result};

/// Track defaults used when a fragment leaves a sample value out.
pub struct TrexBox {
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
}

impl TrexBox {
    /// Parses a TREX Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let reader = &mut box_.reader;

        // Skip "track_ID" and "default_sample_description_index".
        reader.skip(8)?;

        Ok(Self {
            default_sample_duration: reader.read_u32()?,
            default_sample_size: reader.read_u32()?,
        })
    }
}
