//! This crate contains a callback driven mp4 parser ported from
//! [shaka-player](https://github.com/shaka-project/shaka-player), a demuxer for
//! fragmented lossless audio tracks and a writer that lays the demuxed samples
//! out again as a single flat `.m4a` file with iTunes style metadata.
//!
//! # Example
//!
//! ```no_run
//! use ripper_mp4::{CodecRegistry, Demuxer, Synthesizer, Tags};
//! use std::{fs, io::Cursor};
//!
//! let registry = CodecRegistry::default();
//! let data = fs::read("song_m.mp4")?;
//! let track = Demuxer::new(&registry, "alac")?.demux(&data)?;
//!
//! let mut tags = Tags::new();
//! tags.push_text(ripper_mp4::atoms::TITLE, "Song");
//!
//! let codec = registry.get("alac").unwrap();
//! let output = Synthesizer::new(codec).write(Cursor::new(vec![]), &track, &tags)?;
//! fs::write("song.m4a", output.into_inner())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod boxes;
pub mod demux;
pub mod fallback;
pub mod metadata;
pub mod probe;
pub mod synth;
pub mod tables;
pub mod writer;

mod error;
mod fourcc;
mod parser;
mod reader;
mod registry;

pub use demux::{CodecParameters, Demuxer, FragmentedTrack, Sample, SourceBoxes};
pub use error::{Error, ErrorKind, Result};
pub use fourcc::FourCC;
pub use metadata::{Atom, Tags, Value, atoms};
pub use parser::*;
pub use reader::Reader;
pub use registry::{AudioFormat, CodecDescriptor, CodecRegistry};
pub use synth::Synthesizer;
pub use writer::BoxWriter;

#[macro_export]
macro_rules! data {
    () => {
        std::rc::Rc::new(std::cell::RefCell::new(None))
    };
    ($val:expr) => {
        std::rc::Rc::new(std::cell::RefCell::new($val))
    };
}
