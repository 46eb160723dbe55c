//! Rip lossless albums from a music catalog.
//!
//! Every track goes through the same steps: resolve its master playlist to a
//! fragmented stream and its keys ([`manifest`]), demux the stream
//! ([`ripper_mp4::Demuxer`]), exchange every sample with a decryption service
//! ([`decrypt`]) and write a flat tagged `.m4a` file ([`ripper_mp4::Synthesizer`]).
//! [`rip::Ripper`] runs these steps for a whole album.

pub mod catalog;
pub mod decrypt;
pub mod error;
pub mod manifest;
pub mod rip;

mod commands;
mod logger;
mod utils;

#[doc(hidden)]
pub use commands::{Args, Commands};
#[doc(hidden)]
pub use logger::{Logger, level};
pub use error::{ErrorKind, Result, RipError, SkipReason, Stage};
pub use reqwest;
pub use ripper_mp4;
