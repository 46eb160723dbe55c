//! Extraction of samples from a fragmented single track audio file.

use crate::{
    BoxType, CodecDescriptor, CodecRegistry, Error, FourCC, HandlerResult, Mp4Parser, ParsedBox,
    Result,
    boxes::{HeaderBox, TfhdBox, TrexBox, TrunBox},
    data,
    fallback::Field,
    parser,
    registry::AudioFormat,
};
use std::{cell::RefCell, collections::HashMap, ops::Range, rc::Rc};

type Shared = Rc<RefCell<Collected>>;

/// One encoded audio frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub data: Vec<u8>,
    /// Duration in media timescale units.
    pub duration: u32,
    /// Zero based index into the key list of the stream.
    pub key_index: u32,
}

/// Codec config box lifted out of the protected sample entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecParameters {
    pub codec: &'static str,
    pub config_box: FourCC,
    pub version: u8,
    pub flags: u32,
    /// Config box payload after version and flags, copied verbatim.
    pub config: Vec<u8>,
    pub format: AudioFormat,
}

/// Boxes of the input that are carried over to the flat file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceBoxes {
    pub mvhd: HeaderBox,
    pub tkhd: HeaderBox,
    pub mdhd: HeaderBox,
    /// Whole `hdlr` box of the media, header included.
    pub hdlr: Vec<u8>,
    /// Whole `smhd` box, header included.
    pub smhd: Vec<u8>,
    /// Whole `dinf` box, header included.
    pub dinf: Vec<u8>,
}

/// Everything needed to write the track out again.
#[derive(Clone, Debug)]
pub struct FragmentedTrack {
    pub samples: Vec<Sample>,
    pub codec: CodecParameters,
    pub source: SourceBoxes,
    /// Number of protected sample entries in `stsd`.
    pub sample_entries: usize,
}

impl FragmentedTrack {
    /// Sum of all sample durations.
    pub fn duration(&self) -> u64 {
        self.samples.iter().map(|x| x.duration as u64).sum()
    }

    /// Number of keys the samples refer to.
    pub fn required_keys(&self) -> usize {
        self.samples
            .iter()
            .map(|x| x.key_index as usize + 1)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Default)]
struct Fragment {
    tfhd: Vec<TfhdBox>,
    truns: Vec<TrunBox>,
}

#[derive(Default)]
struct Collected {
    trex: Vec<TrexBox>,
    stbl: usize,
    headers: HashMap<FourCC, Vec<HeaderBox>>,
    copied: HashMap<FourCC, Vec<Range<usize>>>,
    entries: usize,
    inside_entry: bool,
    configs: Vec<CodecParameters>,
    fragments: Vec<Fragment>,
    mdats: Vec<Vec<u8>>,
}

const HDLR: FourCC = FourCC::new(b"hdlr");
const SMHD: FourCC = FourCC::new(b"smhd");
const DINF: FourCC = FourCC::new(b"dinf");

/// Splits a fragmented file into samples and the boxes needed to remux it.
pub struct Demuxer<'a> {
    codec: &'a CodecDescriptor,
}

impl<'a> Demuxer<'a> {
    pub fn new(registry: &'a CodecRegistry, codec: &str) -> Result<Self> {
        let codec = registry
            .get(codec)
            .ok_or_else(|| Error::CodecNotRegistered(codec.to_owned()))?;
        Ok(Self { codec })
    }

    pub fn codec(&self) -> &'a CodecDescriptor {
        self.codec
    }

    pub fn demux(&self, data: &[u8]) -> Result<FragmentedTrack> {
        let state = data!(Collected::default());
        let codec = *self.codec;

        Mp4Parser::new()
            .base_box(b"moov", parser::children)
            .full_box(b"mvhd", record_header(&state))
            .base_box(b"trak", parser::children)
            .full_box(b"tkhd", record_header(&state))
            .base_box(b"mdia", parser::children)
            .full_box(b"mdhd", record_header(&state))
            .base_box(b"hdlr", record_span(&state))
            .base_box(b"minf", parser::children)
            .base_box(b"smhd", record_span(&state))
            .base_box(b"dinf", record_span(&state))
            .base_box(b"stbl", {
                let state = state.clone();
                move |box_| {
                    state.borrow_mut().stbl += 1;
                    parser::children(box_)
                }
            })
            .full_box(b"stsd", parser::sample_description)
            .define(codec.protected_entry, BoxType::BasicBox, {
                let state = state.clone();
                move |box_| {
                    {
                        let mut state = state.borrow_mut();
                        state.entries += 1;
                        state.inside_entry = true;
                    }

                    let result = parser::audio_sample_entry(box_);
                    state.borrow_mut().inside_entry = false;
                    result
                }
            })
            .define(codec.config_box, BoxType::FullBox, {
                let state = state.clone();
                move |mut box_| {
                    let mut state = state.borrow_mut();

                    // Only the first protected entry describes the stream.
                    if !state.inside_entry || state.entries != 1 {
                        return Ok(());
                    }

                    let config = box_.reader.read_rest()?;
                    state.configs.push(CodecParameters {
                        codec: codec.name,
                        config_box: box_.name,
                        version: box_.version(),
                        flags: box_.flags(),
                        format: (codec.describe)(&config)?,
                        config,
                    });
                    Ok(())
                }
            })
            .base_box(b"mvex", parser::children)
            .full_box(b"trex", {
                let state = state.clone();
                move |mut box_| {
                    state.borrow_mut().trex.push(TrexBox::new(&mut box_)?);
                    Ok(())
                }
            })
            .base_box(b"moof", {
                let state = state.clone();
                move |box_| {
                    state.borrow_mut().fragments.push(Fragment::default());
                    parser::children(box_)
                }
            })
            .base_box(b"traf", parser::children)
            .full_box(b"tfhd", {
                let state = state.clone();
                move |mut box_| {
                    let tfhd = TfhdBox::new(&mut box_)?;
                    if let Some(fragment) = state.borrow_mut().fragments.last_mut() {
                        fragment.tfhd.push(tfhd);
                    }
                    Ok(())
                }
            })
            .full_box(b"trun", {
                let state = state.clone();
                move |mut box_| {
                    let trun = TrunBox::new(&mut box_)?;
                    if let Some(fragment) = state.borrow_mut().fragments.last_mut() {
                        fragment.truns.push(trun);
                    }
                    Ok(())
                }
            })
            .base_box(b"mdat", {
                let state = state.clone();
                move |box_| {
                    state.borrow_mut().mdats.push(box_.reader.into_inner());
                    Ok(())
                }
            })
            .parse(data)?;

        let mut state = state.take();

        let trex = exactly_one(b"trex", state.trex)?;

        if state.stbl != 1 {
            return Err(Error::BoxCount {
                name: FourCC::new(b"stbl"),
                expected: "exactly one",
                found: state.stbl,
            });
        }

        if state.entries == 0 {
            return Err(Error::BoxCount {
                name: codec.protected_entry,
                expected: "at least one",
                found: 0,
            });
        }

        if state.configs.is_empty() {
            return Err(Error::CodecConfigMissing(codec.config_box));
        }

        let codec_parameters = exactly_one(codec.config_box.as_bytes(), state.configs)?;

        let mut header = |name: FourCC| {
            exactly_one(
                name.as_bytes(),
                state.headers.remove(&name).unwrap_or_default(),
            )
        };

        let mvhd = header(HeaderBox::MOVIE)?;
        let tkhd = header(HeaderBox::TRACK)?;
        let mdhd = header(HeaderBox::MEDIA)?;

        let mut copied = |name: FourCC| -> Result<Vec<u8>> {
            let span = exactly_one(
                name.as_bytes(),
                state.copied.remove(&name).unwrap_or_default(),
            )?;
            Ok(data[span].to_vec())
        };

        let source = SourceBoxes {
            mvhd,
            tkhd,
            mdhd,
            hdlr: copied(HDLR)?,
            smhd: copied(SMHD)?,
            dinf: copied(DINF)?,
        };

        if state.fragments.is_empty() {
            return Err(Error::BoxCount {
                name: FourCC::new(b"moof"),
                expected: "at least one",
                found: 0,
            });
        }

        if state.fragments.len() != state.mdats.len() {
            return Err(Error::FragmentDataMismatch {
                fragments: state.fragments.len(),
                data: state.mdats.len(),
            });
        }

        let mut samples = vec![];

        for (index, (fragment, mdat)) in state.fragments.into_iter().zip(state.mdats).enumerate() {
            let tfhd = exactly_one(b"tfhd", fragment.tfhd)?;

            if fragment.truns.is_empty() {
                return Err(Error::BoxCount {
                    name: FourCC::new(b"trun"),
                    expected: "at least one",
                    found: 0,
                });
            }

            let key_index = tfhd.key_index();
            let mut remaining = mdat.as_slice();

            for (number, entry) in fragment
                .truns
                .iter()
                .flat_map(|x| x.sample_data.iter())
                .enumerate()
            {
                let size = Field::Size.resolve(entry, &tfhd, &trex);
                let duration = Field::Duration.resolve(entry, &tfhd, &trex);

                if size as usize > remaining.len() {
                    return Err(Error::SampleOverrun {
                        fragment: index,
                        sample: number,
                        size,
                        remaining: remaining.len(),
                    });
                }

                let (sample, rest) = remaining.split_at(size as usize);
                samples.push(Sample {
                    data: sample.to_vec(),
                    duration,
                    key_index,
                });
                remaining = rest;
            }

            if !remaining.is_empty() {
                return Err(Error::OffsetMismatch {
                    fragment: index,
                    remaining: remaining.len(),
                });
            }
        }

        Ok(FragmentedTrack {
            samples,
            codec: codec_parameters,
            source,
            sample_entries: state.entries,
        })
    }
}

fn record_header(state: &Shared) -> impl Fn(ParsedBox) -> HandlerResult + 'static {
    let state = state.clone();
    move |mut box_| {
        let header = HeaderBox::new(&mut box_)?;
        state
            .borrow_mut()
            .headers
            .entry(header.name)
            .or_default()
            .push(header);
        Ok(())
    }
}

fn record_span(state: &Shared) -> impl Fn(ParsedBox) -> HandlerResult + 'static {
    let state = state.clone();
    move |box_| {
        state
            .borrow_mut()
            .copied
            .entry(box_.name)
            .or_default()
            .push(box_.span());
        Ok(())
    }
}

fn exactly_one<T>(name: &[u8; 4], mut items: Vec<T>) -> Result<T> {
    if items.len() != 1 {
        return Err(Error::BoxCount {
            name: FourCC::new(name),
            expected: "exactly one",
            found: items.len(),
        });
    }

    Ok(items.remove(0))
}
