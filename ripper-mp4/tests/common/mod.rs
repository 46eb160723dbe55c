#![allow(dead_code)]

use ripper_mp4::{BoxWriter, Result, boxes::AlacConfig};
use std::io::{Cursor, Seek, Write};

pub const TIMESCALE: u32 = 44100;
pub const FRAME: u32 = 4096;

pub fn alac_config() -> AlacConfig {
    AlacConfig {
        frame_length: FRAME,
        compatible_version: 0,
        bit_depth: 24,
        pb: 40,
        mb: 10,
        kb: 14,
        num_channels: 2,
        max_run: 255,
        max_frame_bytes: 0,
        avg_bit_rate: 0,
        sample_rate: 96000,
    }
}

/// Distinct payloads of varying length.
pub fn payloads(seed: u8, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| vec![seed.wrapping_add(i as u8); 16 + (i * 7) % 23])
        .collect()
}

#[derive(Clone)]
pub struct FragmentLayout {
    pub sample_description_index: Option<u32>,
    pub samples: Vec<Vec<u8>>,
    /// Written to `trun` when set.
    pub durations: Option<Vec<u32>>,
    /// Write every sample size to `trun`.
    pub sizes_in_trun: bool,
    pub default_duration: Option<u32>,
    pub default_size: Option<u32>,
    /// Extra bytes at the end of `mdat`.
    pub trailing: Vec<u8>,
}

impl FragmentLayout {
    pub fn new(sample_description_index: Option<u32>, samples: Vec<Vec<u8>>) -> Self {
        Self {
            sample_description_index,
            samples,
            durations: None,
            sizes_in_trun: true,
            default_duration: None,
            default_size: None,
            trailing: vec![],
        }
    }

    pub fn durations(mut self, durations: Vec<u32>) -> Self {
        self.durations = Some(durations);
        self
    }
}

#[derive(Clone)]
pub struct FileLayout {
    pub fragments: Vec<FragmentLayout>,
    pub trex_duration: u32,
    pub trex_size: u32,
    pub entries: usize,
    pub drop_last_mdat: bool,
}

impl FileLayout {
    pub fn new(fragments: Vec<FragmentLayout>) -> Self {
        Self {
            fragments,
            trex_duration: FRAME,
            trex_size: 0,
            entries: 1,
            drop_last_mdat: false,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = BoxWriter::new(Cursor::new(vec![]));
        self.write(&mut writer).unwrap();
        writer.into_inner().into_inner()
    }

    fn write<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> Result<()> {
        w.write_box(b"ftyp", |w| {
            w.write_bytes(b"iso6")?;
            w.write_u32(0)?;
            w.write_bytes(b"iso6")?;
            w.write_bytes(b"mp41")
        })?;

        w.write_box(b"moov", |w| {
            w.write_full_box(b"mvhd", 0, 0, |w| {
                w.write_zeros(8)?;
                w.write_u32(TIMESCALE)?;
                w.write_u32(0)?;
                w.write_u32(0x00010000)?;
                w.write_u16(0x0100)?;
                w.write_zeros(10)?;
                write_matrix(w)?;
                w.write_zeros(24)?;
                w.write_u32(2)
            })?;

            w.write_box(b"trak", |w| {
                w.write_full_box(b"tkhd", 0, 0x3, |w| {
                    w.write_zeros(8)?;
                    w.write_u32(1)?;
                    w.write_zeros(4)?;
                    w.write_u32(0)?;
                    w.write_zeros(12)?;
                    w.write_u16(0x0100)?;
                    w.write_zeros(2)?;
                    write_matrix(w)?;
                    w.write_zeros(8)
                })?;

                w.write_box(b"mdia", |w| {
                    w.write_full_box(b"mdhd", 0, 0, |w| {
                        w.write_zeros(8)?;
                        w.write_u32(TIMESCALE)?;
                        w.write_u32(0)?;
                        w.write_u16(0x55c4)?;
                        w.write_u16(0)
                    })?;

                    w.write_full_box(b"hdlr", 0, 0, |w| {
                        w.write_u32(0)?;
                        w.write_bytes(b"soun")?;
                        w.write_zeros(12)?;
                        w.write_bytes(b"SoundHandler\0")
                    })?;

                    w.write_box(b"minf", |w| {
                        w.write_full_box(b"smhd", 0, 0, |w| w.write_u32(0))?;

                        w.write_box(b"dinf", |w| {
                            w.write_full_box(b"dref", 0, 0, |w| {
                                w.write_u32(1)?;
                                w.write_full_box(b"url ", 0, 1, |_| Ok(()))
                            })
                        })?;

                        w.write_box(b"stbl", |w| {
                            w.write_full_box(b"stsd", 0, 0, |w| {
                                w.write_u32(self.entries as u32)?;

                                for entry in 0..self.entries {
                                    write_enca(w, entry)?;
                                }

                                Ok(())
                            })?;

                            for name in [b"stts", b"stsc", b"stsz", b"stco"] {
                                w.write_full_box(name, 0, 0, |w| {
                                    if name == b"stsz" {
                                        w.write_u32(0)?;
                                    }
                                    w.write_u32(0)
                                })?;
                            }

                            Ok(())
                        })
                    })
                })
            })?;

            w.write_box(b"mvex", |w| {
                w.write_full_box(b"trex", 0, 0, |w| {
                    w.write_u32(1)?;
                    w.write_u32(1)?;
                    w.write_u32(self.trex_duration)?;
                    w.write_u32(self.trex_size)?;
                    w.write_u32(0)
                })
            })
        })?;

        for (number, fragment) in self.fragments.iter().enumerate() {
            write_fragment(w, number as u32 + 1, fragment)?;

            if !(self.drop_last_mdat && number + 1 == self.fragments.len()) {
                w.write_box(b"mdat", |w| {
                    for sample in &fragment.samples {
                        w.write_bytes(sample)?;
                    }
                    w.write_bytes(&fragment.trailing)
                })?;
            }
        }

        Ok(())
    }
}

fn write_matrix<W: Write + Seek>(w: &mut BoxWriter<W>) -> Result<()> {
    for value in [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000] {
        w.write_u32(value)?;
    }
    Ok(())
}

fn write_enca<W: Write + Seek>(w: &mut BoxWriter<W>, entry: usize) -> Result<()> {
    let mut config = alac_config();

    // later entries must never be picked up
    if entry > 0 {
        config.sample_rate = 48000;
    }

    w.write_box(b"enca", |w| {
        w.write_zeros(6)?;
        w.write_u16(1)?;
        w.write_zeros(8)?;
        w.write_u16(config.num_channels as u16)?;
        w.write_u16(config.bit_depth as u16)?;
        w.write_zeros(4)?;
        w.write_u32(0)?;

        w.write_full_box(b"alac", 0, 0, |w| w.write_bytes(&config.to_bytes()))?;

        w.write_box(b"sinf", |w| {
            w.write_box(b"frma", |w| w.write_bytes(b"alac"))?;
            w.write_full_box(b"schm", 0, 0, |w| {
                w.write_bytes(b"cbcs")?;
                w.write_u32(0x00010000)
            })
        })
    })
}

fn write_fragment<W: Write + Seek>(
    w: &mut BoxWriter<W>,
    sequence: u32,
    fragment: &FragmentLayout,
) -> Result<()> {
    w.write_box(b"moof", |w| {
        w.write_full_box(b"mfhd", 0, 0, |w| w.write_u32(sequence))?;

        w.write_box(b"traf", |w| {
            let mut flags = 0x020000;
            if fragment.sample_description_index.is_some() {
                flags |= 0x02;
            }
            if fragment.default_duration.is_some() {
                flags |= 0x08;
            }
            if fragment.default_size.is_some() {
                flags |= 0x10;
            }

            w.write_full_box(b"tfhd", 0, flags, |w| {
                w.write_u32(1)?;
                for value in [
                    fragment.sample_description_index,
                    fragment.default_duration,
                    fragment.default_size,
                ]
                .into_iter()
                .flatten()
                {
                    w.write_u32(value)?;
                }
                Ok(())
            })?;

            w.write_full_box(b"tfdt", 1, 0, |w| w.write_u64(0))?;

            let mut flags = 0;
            if fragment.durations.is_some() {
                flags |= 0x100;
            }
            if fragment.sizes_in_trun {
                flags |= 0x200;
            }

            w.write_full_box(b"trun", 0, flags, |w| {
                w.write_u32(fragment.samples.len() as u32)?;

                for (i, sample) in fragment.samples.iter().enumerate() {
                    if let Some(durations) = &fragment.durations {
                        w.write_u32(durations[i])?;
                    }
                    if fragment.sizes_in_trun {
                        w.write_u32(sample.len() as u32)?;
                    }
                }

                Ok(())
            })
        })
    })
}
