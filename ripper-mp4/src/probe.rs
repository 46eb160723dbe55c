//! Reader for flat (non fragmented) single track files.

use crate::{
    Error, FourCC, Mp4Parser, Reader, Result,
    boxes::HeaderBox,
    data, parser,
    registry::AudioFormat,
    tables::{SampleToChunk, TimeToSample},
};

/// Where a sample lives in the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleLocation {
    pub offset: u64,
    pub size: u32,
    pub duration: u32,
}

/// A metadata item read back from `ilst`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    /// Four-cc for standard items, `name` for freeform ones.
    pub name: String,
    pub mean: Option<String>,
    pub data_type: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct FlatTrack {
    pub brand: Option<FourCC>,
    pub mvhd: Option<HeaderBox>,
    pub tkhd: Option<HeaderBox>,
    pub mdhd: Option<HeaderBox>,
    pub sample_entry: Option<FourCC>,
    pub format: AudioFormat,
    pub time_to_sample: Vec<TimeToSample>,
    pub sample_to_chunk: Vec<SampleToChunk>,
    pub sample_sizes: Vec<u32>,
    pub chunk_offsets: Vec<u64>,
    pub items: Vec<Item>,
}

impl FlatTrack {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let track = data!(FlatTrack::default());

        Mp4Parser::new()
            .base_box(b"ftyp", {
                let track = track.clone();
                move |mut box_| {
                    track.borrow_mut().brand = Some(FourCC::from(box_.reader.read_u32()?));
                    Ok(())
                }
            })
            .base_box(b"moov", parser::children)
            .base_box(b"trak", parser::children)
            .base_box(b"mdia", parser::children)
            .base_box(b"minf", parser::children)
            .base_box(b"stbl", parser::children)
            .full_box(b"mvhd", {
                let track = track.clone();
                move |mut box_| {
                    track.borrow_mut().mvhd = Some(HeaderBox::new(&mut box_)?);
                    Ok(())
                }
            })
            .full_box(b"tkhd", {
                let track = track.clone();
                move |mut box_| {
                    track.borrow_mut().tkhd = Some(HeaderBox::new(&mut box_)?);
                    Ok(())
                }
            })
            .full_box(b"mdhd", {
                let track = track.clone();
                move |mut box_| {
                    track.borrow_mut().mdhd = Some(HeaderBox::new(&mut box_)?);
                    Ok(())
                }
            })
            .full_box(b"stsd", {
                let track = track.clone();
                move |mut box_| {
                    let reader = &mut box_.reader;

                    if reader.read_u32()? == 0 {
                        return Ok(());
                    }

                    // size
                    reader.skip(4)?;
                    let name = FourCC::from(reader.read_u32()?);
                    // reserved, data reference index, version, revision, vendor
                    reader.skip(16)?;
                    let channels = reader.read_u16()?;
                    let bit_depth = reader.read_u16()?;
                    // compression id, packet size
                    reader.skip(4)?;
                    let sample_rate = reader.read_u32()? >> 16;

                    let mut track = track.borrow_mut();
                    track.sample_entry = Some(name);
                    track.format = AudioFormat {
                        channels,
                        bit_depth,
                        sample_rate,
                    };
                    Ok(())
                }
            })
            .full_box(b"stts", {
                let track = track.clone();
                move |mut box_| {
                    let reader = &mut box_.reader;
                    let count = reader.read_u32()?;
                    let mut runs = vec![];

                    for _ in 0..count {
                        runs.push(TimeToSample {
                            count: reader.read_u32()?,
                            delta: reader.read_u32()?,
                        });
                    }

                    track.borrow_mut().time_to_sample = runs;
                    Ok(())
                }
            })
            .full_box(b"stsc", {
                let track = track.clone();
                move |mut box_| {
                    let reader = &mut box_.reader;
                    let count = reader.read_u32()?;
                    let mut entries = vec![];

                    for _ in 0..count {
                        entries.push(SampleToChunk {
                            first_chunk: reader.read_u32()?,
                            samples_per_chunk: reader.read_u32()?,
                            sample_description_index: reader.read_u32()?,
                        });
                    }

                    track.borrow_mut().sample_to_chunk = entries;
                    Ok(())
                }
            })
            .full_box(b"stsz", {
                let track = track.clone();
                move |mut box_| {
                    let reader = &mut box_.reader;
                    let sample_size = reader.read_u32()?;
                    let count = reader.read_u32()?;
                    let mut sizes = vec![];

                    for _ in 0..count {
                        sizes.push(if sample_size == 0 {
                            reader.read_u32()?
                        } else {
                            sample_size
                        });
                    }

                    track.borrow_mut().sample_sizes = sizes;
                    Ok(())
                }
            })
            .full_box(b"stco", {
                let track = track.clone();
                move |mut box_| {
                    let reader = &mut box_.reader;
                    let count = reader.read_u32()?;
                    let mut offsets = vec![];

                    for _ in 0..count {
                        offsets.push(reader.read_u32()? as u64);
                    }

                    track.borrow_mut().chunk_offsets = offsets;
                    Ok(())
                }
            })
            .full_box(b"co64", {
                let track = track.clone();
                move |mut box_| {
                    let reader = &mut box_.reader;
                    let count = reader.read_u32()?;
                    let mut offsets = vec![];

                    for _ in 0..count {
                        offsets.push(reader.read_u64()?);
                    }

                    track.borrow_mut().chunk_offsets = offsets;
                    Ok(())
                }
            })
            .base_box(b"udta", parser::children)
            .full_box(b"meta", parser::children)
            .base_box(b"ilst", {
                let track = track.clone();
                move |mut box_| {
                    track.borrow_mut().items = parse_items(&mut box_.reader)?;
                    Ok(())
                }
            })
            .parse(data)?;

        Ok(track.take())
    }

    pub fn duration(&self) -> Option<u64> {
        self.mdhd.as_ref().and_then(|x| x.duration().ok())
    }

    pub fn timescale(&self) -> Option<u32> {
        self.mdhd.as_ref().and_then(|x| x.timescale())
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|x| x.name == name)
    }

    /// Rebuild the offset, size and duration of every sample.
    pub fn samples(&self) -> Result<Vec<SampleLocation>> {
        let durations = self
            .time_to_sample
            .iter()
            .flat_map(|x| std::iter::repeat_n(x.delta, x.count as usize))
            .collect::<Vec<_>>();

        if durations.len() != self.sample_sizes.len() {
            return Err(Error::InvalidData(format!(
                "{} durations for {} samples",
                durations.len(),
                self.sample_sizes.len()
            )));
        }

        let mut sizes = self.sample_sizes.iter().zip(durations);
        let mut samples = Vec::with_capacity(self.sample_sizes.len());

        for (index, chunk_offset) in self.chunk_offsets.iter().enumerate() {
            let chunk = index as u32 + 1;
            let per_chunk = self
                .sample_to_chunk
                .iter()
                .rev()
                .find(|x| x.first_chunk <= chunk)
                .map(|x| x.samples_per_chunk)
                .ok_or_else(|| Error::InvalidData(format!("chunk {} has no stsc entry", chunk)))?;

            let mut offset = *chunk_offset;

            for _ in 0..per_chunk {
                let (size, duration) = sizes.next().ok_or_else(|| {
                    Error::InvalidData("chunks hold more samples than stsz".to_owned())
                })?;

                samples.push(SampleLocation {
                    offset,
                    size: *size,
                    duration,
                });
                offset += *size as u64;
            }
        }

        if samples.len() != self.sample_sizes.len() {
            return Err(Error::InvalidData(format!(
                "chunks hold {} of {} samples",
                samples.len(),
                self.sample_sizes.len()
            )));
        }

        Ok(samples)
    }
}

fn parse_items(reader: &mut Reader) -> Result<Vec<Item>> {
    let mut items = vec![];

    while reader.has_more_data() {
        let (name, mut body) = child(reader)?;
        let mut item = Item {
            name: name.to_string(),
            mean: None,
            data_type: 0,
            data: vec![],
        };

        while body.has_more_data() {
            let (kind, mut payload) = child(&mut body)?;

            match kind.as_bytes() {
                b"mean" => {
                    payload.skip(4)?;
                    item.mean = Some(String::from_utf8_lossy(&payload.read_rest()?).into_owned());
                }
                b"name" => {
                    payload.skip(4)?;
                    item.name = String::from_utf8_lossy(&payload.read_rest()?).into_owned();
                }
                b"data" => {
                    item.data_type = payload.read_u32()?;
                    // locale
                    payload.skip(4)?;
                    item.data = payload.read_rest()?;
                }
                _ => (),
            }
        }

        items.push(item);
    }

    Ok(items)
}

/// Read the next child box, returning its name and payload.
fn child(reader: &mut Reader) -> Result<(FourCC, Reader)> {
    let start = reader.get_position();
    let size = reader.read_u32()? as u64;

    if size < 8 || size > reader.get_length() - start {
        return Err(Error::InvalidData(format!(
            "metadata box at {} declares {} bytes",
            start, size
        )));
    }

    let name = FourCC::from(reader.read_u32()?);
    let payload = reader.read_bytes(size as usize - 8)?;
    Ok((name, Reader::new(payload)))
}
