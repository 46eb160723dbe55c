//! Writes a demuxed track as a single flat `.m4a` file.

use crate::{
    BoxWriter, CodecDescriptor, Error, FragmentedTrack, Result, Tags,
    boxes::HeaderBox,
    tables::{self, DEFAULT_CHUNK_SIZE},
};
use std::io::{Seek, Write};

/// Flags of the written `tkhd`: enabled, in movie, in preview.
const TRACK_FLAGS: u32 = 0x7;

/// Lays samples out in fixed size chunks behind a single `moov`.
pub struct Synthesizer<'a> {
    codec: &'a CodecDescriptor,
    chunk_size: u32,
}

impl<'a> Synthesizer<'a> {
    pub fn new(codec: &'a CodecDescriptor) -> Self {
        Self {
            codec,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Samples per chunk, zero is treated as one.
    pub fn chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Write `track` with `tags` into `out` and hand `out` back.
    pub fn write<W: Write + Seek>(
        &self,
        out: W,
        track: &FragmentedTrack,
        tags: &Tags,
    ) -> Result<W> {
        if track.codec.config_box != self.codec.config_box {
            return Err(Error::InvalidData(format!(
                "track carries a `{}` config, not `{}`",
                track.codec.config_box, self.codec.config_box
            )));
        }

        let sample_count = u32::try_from(track.samples.len())
            .map_err(|_| Error::InvalidData("too many samples".to_owned()))?;
        let duration = track.duration();
        let chunks = tables::chunk_count(sample_count, self.chunk_size);
        let source = &track.source;
        let mut w = BoxWriter::new(out);

        w.write_box(b"ftyp", |w| {
            w.write_bytes(b"M4A ")?;
            w.write_u32(0)?;
            w.write_bytes(b"M4A ")?;
            w.write_bytes(b"mp42")?;
            w.write_bytes(b"isom")?;
            w.write_zeros(4)
        })?;

        let stco = w.write_box(b"moov", |w| {
            write_header(w, &source.mvhd, duration, source.mvhd.flags)?;

            let stco = w.write_box(b"trak", |w| {
                write_header(w, &source.tkhd, duration, TRACK_FLAGS)?;

                w.write_box(b"mdia", |w| {
                    write_header(w, &source.mdhd, duration, source.mdhd.flags)?;
                    w.write_bytes(&source.hdlr)?;

                    w.write_box(b"minf", |w| {
                        w.write_bytes(&source.smhd)?;
                        w.write_bytes(&source.dinf)?;

                        w.write_box(b"stbl", |w| {
                            self.write_stsd(w, track)?;

                            w.write_full_box(b"stts", 0, 0, |w| {
                                let runs = tables::time_to_sample(
                                    track.samples.iter().map(|x| x.duration),
                                );
                                w.write_u32(runs.len() as u32)?;
                                for run in runs {
                                    w.write_u32(run.count)?;
                                    w.write_u32(run.delta)?;
                                }
                                Ok(())
                            })?;

                            w.write_full_box(b"stsc", 0, 0, |w| {
                                let entries =
                                    tables::sample_to_chunk(sample_count, self.chunk_size);
                                w.write_u32(entries.len() as u32)?;
                                for entry in entries {
                                    w.write_u32(entry.first_chunk)?;
                                    w.write_u32(entry.samples_per_chunk)?;
                                    w.write_u32(entry.sample_description_index)?;
                                }
                                Ok(())
                            })?;

                            w.write_full_box(b"stsz", 0, 0, |w| {
                                // every sample has its own size
                                w.write_u32(0)?;
                                w.write_u32(sample_count)?;
                                for sample in &track.samples {
                                    w.write_u32(sample.data.len() as u32)?;
                                }
                                Ok(())
                            })?;

                            w.write_full_box(b"stco", 0, 0, |w| {
                                w.write_u32(chunks)?;
                                w.reserve(chunks as u64 * 4)
                            })
                        })
                    })
                })
            })?;

            tags.write_udta(w)?;
            Ok(stco)
        })?;

        let offsets = w.write_box(b"mdat", |w| {
            let mut offsets = Vec::with_capacity(chunks as usize);

            for (i, sample) in track.samples.iter().enumerate() {
                if i % self.chunk_size as usize == 0 {
                    offsets.push(w.position()?);
                }

                w.write_bytes(&sample.data)?;
            }

            Ok(offsets)
        })?;

        let mut table = Vec::with_capacity(offsets.len() * 4);

        for offset in offsets {
            let offset = u32::try_from(offset).map_err(|_| Error::ChunkOffsetOverflow(offset))?;
            table.extend_from_slice(&offset.to_be_bytes());
        }

        w.patch(stco, &table)?;
        Ok(w.into_inner())
    }

    fn write_stsd<W: Write + Seek>(
        &self,
        w: &mut BoxWriter<W>,
        track: &FragmentedTrack,
    ) -> Result<()> {
        let codec = &track.codec;
        let format = codec.format;

        w.write_full_box(b"stsd", 0, 0, |w| {
            w.write_u32(1)?;

            w.write_box(self.codec.sample_entry.as_bytes(), |w| {
                // reserved
                w.write_zeros(6)?;
                // data reference index
                w.write_u16(1)?;
                // version, revision level, vendor
                w.write_zeros(8)?;
                w.write_u16(format.channels)?;
                w.write_u16(format.bit_depth)?;
                // compression id, packet size
                w.write_u16(0)?;
                w.write_u16(0)?;
                // 16.16 fixed point, rates above 65535 only live in the config
                let sample_rate = if format.sample_rate <= u16::MAX as u32 {
                    format.sample_rate << 16
                } else {
                    0
                };
                w.write_u32(sample_rate)?;

                w.write_full_box(codec.config_box.as_bytes(), codec.version, codec.flags, |w| {
                    w.write_bytes(&codec.config)
                })
            })
        })
    }
}

fn write_header<W: Write + Seek>(
    w: &mut BoxWriter<W>,
    header: &HeaderBox,
    duration: u64,
    flags: u32,
) -> Result<()> {
    let payload = header.with_duration(duration)?;
    w.write_full_box(header.name.as_bytes(), header.version, flags, |w| {
        w.write_bytes(&payload)
    })
}
