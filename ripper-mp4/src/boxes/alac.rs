/*
    REFERENCES
    ----------

    1. https://github.com/macosforge/alac/blob/master/ALACMagicCookieDescription.txt

*/

use crate::{Error, Reader, Result};

/// Payload of the `alac` codec config box (after version and flags).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlacConfig {
    pub frame_length: u32,
    pub compatible_version: u8,
    pub bit_depth: u8,
    pub pb: u8,
    pub mb: u8,
    pub kb: u8,
    pub num_channels: u8,
    pub max_run: u16,
    pub max_frame_bytes: u32,
    pub avg_bit_rate: u32,
    pub sample_rate: u32,
}

impl AlacConfig {
    pub const SIZE: usize = 24;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::SIZE {
            return Err(Error::InvalidData(format!(
                "alac config holds {} bytes, {} are required",
                payload.len(),
                Self::SIZE
            )));
        }

        let mut reader = Reader::new(payload[..Self::SIZE].to_vec());

        Ok(Self {
            frame_length: reader.read_u32()?,
            compatible_version: reader.read_u8()?,
            bit_depth: reader.read_u8()?,
            pb: reader.read_u8()?,
            mb: reader.read_u8()?,
            kb: reader.read_u8()?,
            num_channels: reader.read_u8()?,
            max_run: reader.read_u16()?,
            max_frame_bytes: reader.read_u32()?,
            avg_bit_rate: reader.read_u32()?,
            sample_rate: reader.read_u32()?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::SIZE);
        data.extend_from_slice(&self.frame_length.to_be_bytes());
        data.extend_from_slice(&[
            self.compatible_version,
            self.bit_depth,
            self.pb,
            self.mb,
            self.kb,
            self.num_channels,
        ]);
        data.extend_from_slice(&self.max_run.to_be_bytes());
        data.extend_from_slice(&self.max_frame_bytes.to_be_bytes());
        data.extend_from_slice(&self.avg_bit_rate.to_be_bytes());
        data.extend_from_slice(&self.sample_rate.to_be_bytes());
        data
    }
}
