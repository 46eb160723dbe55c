use crate::{ParsedBox, Result};

pub struct TfhdBox {
    /// If specified via flags, the 1-based index of the sample entry
    /// describing the samples of this fragment
    pub sample_description_index: Option<u32>,
    /// If specified via flags, this overrides the default sample
    /// duration in the Track Extends Box for this fragment
    pub default_sample_duration: Option<u32>,
    /// If specified via flags, this overrides the default sample
    /// size in the Track Extends Box for this fragment
    pub default_sample_size: Option<u32>,
}

impl TfhdBox {
    /// Parses a TFHD Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let flags = box_.flags();
        let reader = &mut box_.reader;

        let mut sample_description_index = None;
        let mut default_sample_duration = None;
        let mut default_sample_size = None;

        // Skip "track_ID", a single track is demuxed.
        reader.skip(4)?;

        // Skip "base_data_offset" if present.
        if (flags & 0x000001) != 0 {
            reader.skip(8)?;
        }

        // Read "sample_description_index" if present.
        if (flags & 0x000002) != 0 {
            sample_description_index = Some(reader.read_u32()?);
        }

        // Read "default_sample_duration" if present.
        if (flags & 0x000008) != 0 {
            default_sample_duration = Some(reader.read_u32()?);
        }

        // Read "default_sample_size" if present.
        if (flags & 0x000010) != 0 {
            default_sample_size = Some(reader.read_u32()?);
        }

        Ok(Self {
            sample_description_index,
            default_sample_duration,
            default_sample_size,
        })
    }

    /// Zero based index of the key protecting this fragment.
    pub fn key_index(&self) -> u32 {
        self.sample_description_index.unwrap_or(0).saturating_sub(1)
    }
}
