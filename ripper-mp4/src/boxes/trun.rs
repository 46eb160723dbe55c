use crate::{ParsedBox, Result};

pub struct TrunSample {
    /// The length of the sample in timescale units.
    pub sample_duration: Option<u32>,
    /// The size of the sample in bytes.
    pub sample_size: Option<u32>,
}

pub struct TrunBox {
    /// One entry per sample added by this run.
    pub sample_data: Vec<TrunSample>,
}

impl TrunBox {
    /// Parses a TRUN Box.
    pub fn new(box_: &mut ParsedBox) -> Result<Self> {
        let flags = box_.flags();
        let reader = &mut box_.reader;

        let sample_count = reader.read_u32()?;
        let mut sample_data = vec![];

        // Skip "data_offset" if present, samples are sliced from mdat in order.
        if (flags & 0x000001) != 0 {
            reader.skip(4)?;
        }

        // Skip "first_sample_flags" if present.
        if (flags & 0x000004) != 0 {
            reader.skip(4)?;
        }

        for _ in 0..sample_count {
            let mut sample = TrunSample {
                sample_duration: None,
                sample_size: None,
            };

            // Read "sample duration" if present.
            if (flags & 0x000100) != 0 {
                sample.sample_duration = Some(reader.read_u32()?);
            }

            // Read "sample_size" if present.
            if (flags & 0x000200) != 0 {
                sample.sample_size = Some(reader.read_u32()?);
            }

            // Skip "sample_flags" if present.
            if (flags & 0x000400) != 0 {
                reader.skip(4)?;
            }

            // Skip "sample_composition_time_offset" if present.
            if (flags & 0x000800) != 0 {
                reader.skip(4)?;
            }

            sample_data.push(sample);
        }

        Ok(Self { sample_data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mp4Parser, data};

    #[test]
    fn optional_fields_are_skipped() {
        let flags: u32 = 0x000001 | 0x000004 | 0x000100 | 0x000200 | 0x000400 | 0x000800;
        let mut data = vec![];
        data.extend(56_u32.to_be_bytes());
        data.extend(b"trun");
        data.extend(flags.to_be_bytes());
        // sample count, data offset, first sample flags
        for value in [2_u32, 120, 0x02000000] {
            data.extend(value.to_be_bytes());
        }
        // duration, size, flags, composition offset per sample
        for value in [4096_u32, 10, 0, 7, 1000, 20, 0, 9] {
            data.extend(value.to_be_bytes());
        }

        let samples = data!(Vec::<(Option<u32>, Option<u32>)>::new());

        Mp4Parser::new()
            .full_box(b"trun", {
                let samples = samples.clone();
                move |mut box_| {
                    let trun = TrunBox::new(&mut box_)?;
                    *samples.borrow_mut() = trun
                        .sample_data
                        .iter()
                        .map(|x| (x.sample_duration, x.sample_size))
                        .collect();
                    Ok(())
                }
            })
            .parse(&data)
            .unwrap();

        assert_eq!(
            samples.take(),
            vec![(Some(4096), Some(10)), (Some(1000), Some(20))]
        );
    }
}
