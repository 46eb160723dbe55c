use crate::{rip::DEFAULT_CODEC, utils};
use anyhow::Result;
use clap::Args;
use kdam::term::Colorizer;
use ripper_mp4::{
    CodecRegistry, Demuxer, FragmentedTrack, Mp4Parser, Value, data, probe::FlatTrack,
};
use std::{fs, path::PathBuf};

/// Print a summary of a fragmented or flat audio file.
#[derive(Debug, Clone, Args)]
pub struct Inspect {
    /// Path of a downloaded stream (_m.mp4) or a ripped .m4a file.
    #[arg(required = true)]
    pub input: PathBuf,

    /// Print every metadata item and sample table entry.
    #[arg(long)]
    pub full: bool,
}

impl Inspect {
    pub fn execute(self) -> Result<()> {
        let data = fs::read(&self.input)?;

        println!(
            "{} {} ({})",
            "Inspecting".colorize("bold green"),
            self.input.to_string_lossy().colorize("cyan"),
            utils::format_bytes(data.len(), 2)
        );

        if is_fragmented(&data)? {
            let registry = CodecRegistry::default();
            let track = Demuxer::new(&registry, DEFAULT_CODEC)?.demux(&data)?;
            self.fragmented(&track);
        } else {
            self.flat(&FlatTrack::parse(&data)?)?;
        }

        Ok(())
    }

    fn fragmented(&self, track: &FragmentedTrack) {
        let codec = &track.codec;
        let timescale = track.source.mdhd.timescale().unwrap_or(1);

        println!("{:>16}: fragmented", "Layout");
        println!(
            "{:>16}: {} ({} channels, {} bit, {} Hz)",
            "Codec",
            codec.codec,
            codec.format.channels,
            codec.format.bit_depth,
            codec.format.sample_rate
        );
        println!("{:>16}: {}", "Config", hex::encode(&codec.config));
        println!("{:>16}: {}", "Duration", utils::format_duration(track.duration(), timescale));
        println!("{:>16}: {}", "Samples", track.samples.len());
        println!(
            "{:>16}: {} of {} sample descriptions",
            "Keys", track.required_keys(), track.sample_entries
        );

        if self.full {
            for (i, sample) in track.samples.iter().enumerate() {
                println!(
                    "{:>16}: {} bytes, {} ticks, key {}",
                    i, sample.data.len(), sample.duration, sample.key_index
                );
            }
        }
    }

    fn flat(&self, track: &FlatTrack) -> Result<()> {
        let samples = track.samples()?;
        let format = track.format;

        println!("{:>16}: flat", "Layout");

        if let Some(brand) = track.brand {
            println!("{:>16}: {}", "Brand", brand);
        }

        if let Some(entry) = track.sample_entry {
            println!(
                "{:>16}: {} ({} channels, {} bit, {} Hz)",
                "Codec", entry, format.channels, format.bit_depth, format.sample_rate
            );
        }

        if let (Some(duration), Some(timescale)) = (track.duration(), track.timescale()) {
            println!("{:>16}: {}", "Duration", utils::format_duration(duration, timescale));
        }

        println!("{:>16}: {}", "Samples", samples.len());
        println!("{:>16}: {}", "Chunks", track.chunk_offsets.len());

        for item in &track.items {
            let value = match item.data_type {
                Value::TYPE_UTF8 => String::from_utf8_lossy(&item.data).into_owned(),
                _ => hex::encode(&item.data),
            };

            println!("{:>16}: {}", item.name, value);
        }

        if self.full {
            for (i, sample) in samples.iter().enumerate() {
                println!(
                    "{:>16}: {} bytes at {}, {} ticks",
                    i, sample.size, sample.offset, sample.duration
                );
            }
        }

        Ok(())
    }
}

/// Whether the top level of `data` holds movie fragments.
fn is_fragmented(data: &[u8]) -> Result<bool> {
    let fragmented = data!(false);

    Mp4Parser::new()
        .base_box(b"moof", {
            let fragmented = fragmented.clone();
            move |_| {
                *fragmented.borrow_mut() = true;
                Ok(())
            }
        })
        .parse(data)?;

    Ok(fragmented.take())
}
