use crate::{FourCC, Result, boxes::AlacConfig};

/// Audio properties mirrored from a codec config into the sample entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub bit_depth: u16,
    pub sample_rate: u32,
}

/// Describes where a codec lives inside `stsd` and how to read its config.
#[derive(Clone, Copy, Debug)]
pub struct CodecDescriptor {
    /// Codec tag as advertised by playlists, e.g. `alac`.
    pub name: &'static str,
    /// Sample entry written to the flat output.
    pub sample_entry: FourCC,
    /// Sample entry of the encrypted input.
    pub protected_entry: FourCC,
    /// Codec specific config box nested in the sample entry (always a full box).
    pub config_box: FourCC,
    /// Reads the audio format out of the config box payload.
    pub describe: fn(&[u8]) -> Result<AudioFormat>,
}

impl CodecDescriptor {
    pub const ALAC: Self = Self {
        name: "alac",
        sample_entry: FourCC::new(b"alac"),
        protected_entry: FourCC::new(b"enca"),
        config_box: FourCC::new(b"alac"),
        describe: describe_alac,
    };
}

fn describe_alac(payload: &[u8]) -> Result<AudioFormat> {
    let config = AlacConfig::parse(payload)?;

    Ok(AudioFormat {
        channels: config.num_channels as u16,
        bit_depth: config.bit_depth as u16,
        sample_rate: config.sample_rate,
    })
}

/// Set of codecs the demuxer and synthesizer know about.
///
/// The default registry only knows ALAC.
#[derive(Clone, Debug)]
pub struct CodecRegistry {
    codecs: Vec<CodecDescriptor>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self {
            codecs: vec![CodecDescriptor::ALAC],
        }
    }
}

impl CodecRegistry {
    pub fn empty() -> Self {
        Self { codecs: vec![] }
    }

    /// Add a codec, replacing any codec with the same name.
    pub fn register(mut self, codec: CodecDescriptor) -> Self {
        self.codecs.retain(|x| x.name != codec.name);
        self.codecs.push(codec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CodecDescriptor> {
        self.codecs.iter().find(|x| x.name == name)
    }
}
