//! Client side of the sample decryption protocol.
//!
//! Every frame is written in order on a single connection:
//!
//! ```text
//! announce   [len u8][track id][len u8][key uri]   before the first sample of a key run
//! boundary   [0; 4]                                 before every announcement but the first
//! sample     [len u32 le][encrypted bytes]          answered by len decrypted bytes
//! terminator [0; 5]                                 after the last sample
//! ```

use crate::{
    error::{Result, RipError},
    manifest::PREFETCH_KEY,
    rip::RUNNING,
};
use log::trace;
use ripper_mp4::Sample;
use std::{
    io::{Read, Write},
    net::TcpStream,
    sync::atomic::Ordering,
};

/// Track id announced together with the prefetch key.
pub const PREFETCH_ID: &str = "0";

pub struct DecryptSession<S: Read + Write> {
    stream: S,
    track_id: String,
    current_key: Option<u32>,
    sent: bool,
}

impl DecryptSession<TcpStream> {
    /// Open a session with the decryptor listening at `addr`.
    pub fn connect(addr: &str, track_id: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(RipError::DecryptionIo)?;
        stream.set_nodelay(true).map_err(RipError::DecryptionIo)?;
        Ok(Self::new(stream, track_id))
    }
}

impl<S: Read + Write> DecryptSession<S> {
    pub fn new(stream: S, track_id: &str) -> Self {
        Self {
            stream,
            track_id: track_id.to_owned(),
            current_key: None,
            sent: false,
        }
    }

    /// Exchange the bytes of `sample` for their decrypted counterpart.
    pub fn decrypt_sample(&mut self, sample: &mut Sample, keys: &[String]) -> Result<()> {
        if !RUNNING.load(Ordering::SeqCst) {
            return Err(RipError::Cancelled);
        }

        if self.current_key != Some(sample.key_index) {
            let key = keys
                .get(sample.key_index as usize)
                .ok_or(RipError::KeyIndexOutOfRange {
                    index: sample.key_index,
                    keys: keys.len(),
                })?;

            if self.sent {
                self.write(&[0; 4])?;
            }

            let id = if key == PREFETCH_KEY {
                PREFETCH_ID.to_owned()
            } else {
                self.track_id.clone()
            };

            trace!("switching to key {} ({})", sample.key_index, key);
            self.write_prefixed(id.as_bytes())?;
            self.write_prefixed(key.as_bytes())?;
            self.current_key = Some(sample.key_index);
        }

        let length = u32::try_from(sample.data.len())
            .map_err(|_| RipError::SampleTooLarge(sample.data.len()))?;
        self.write(&length.to_le_bytes())?;
        self.write(&sample.data)?;
        self.sent = true;

        // same length in, same length out
        self.stream
            .read_exact(&mut sample.data)
            .map_err(RipError::DecryptionIo)
    }

    /// Decrypt `samples` in order.
    pub fn decrypt(&mut self, samples: &mut [Sample], keys: &[String]) -> Result<()> {
        for sample in samples {
            self.decrypt_sample(sample, keys)?;
        }

        Ok(())
    }

    /// Write the terminator and hand the stream back.
    pub fn finish(mut self) -> Result<S> {
        self.write(&[0; 5])?;
        self.stream.flush().map_err(RipError::DecryptionIo)?;
        Ok(self.stream)
    }

    fn write_prefixed(&mut self, value: &[u8]) -> Result<()> {
        let length =
            u8::try_from(value.len()).map_err(|_| RipError::IdentifierTooLong(value.len()))?;
        self.write(&[length])?;
        self.write(value)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).map_err(RipError::DecryptionIo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Records writes and answers reads from a fixed buffer.
    struct Loopback {
        written: Vec<u8>,
        replies: Cursor<Vec<u8>>,
    }

    impl Loopback {
        fn new(replies: Vec<u8>) -> Self {
            Self {
                written: vec![],
                replies: Cursor::new(replies),
            }
        }
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sample(data: &[u8], key_index: u32) -> Sample {
        Sample {
            data: data.to_vec(),
            duration: 4096,
            key_index,
        }
    }

    fn keys() -> Vec<String> {
        vec![PREFETCH_KEY.to_owned(), "skd://a-c6".to_owned()]
    }

    #[test]
    fn frames_are_byte_exact() {
        let mut samples = vec![sample(&[1, 2], 0), sample(&[3], 1), sample(&[4, 5, 6], 1)];
        let mut session = DecryptSession::new(Loopback::new(vec![9, 9, 8, 7, 7, 7]), "1440");
        session.decrypt(&mut samples, &keys()).unwrap();
        let stream = session.finish().unwrap();

        let mut expected = vec![1, b'0', PREFETCH_KEY.len() as u8];
        expected.extend_from_slice(PREFETCH_KEY.as_bytes());
        expected.extend_from_slice(&[2, 0, 0, 0, 1, 2]);
        expected.extend_from_slice(&[0; 4]);
        expected.extend_from_slice(&[4, b'1', b'4', b'4', b'0', 10]);
        expected.extend_from_slice(b"skd://a-c6");
        expected.extend_from_slice(&[1, 0, 0, 0, 3]);
        expected.extend_from_slice(&[3, 0, 0, 0, 4, 5, 6]);
        expected.extend_from_slice(&[0; 5]);
        assert_eq!(stream.written, expected);

        let data = samples.iter().map(|x| x.data.clone()).collect::<Vec<_>>();
        assert_eq!(data, vec![vec![9, 9], vec![8], vec![7, 7, 7]]);
    }

    #[test]
    fn key_index_must_be_known() {
        let mut session = DecryptSession::new(Loopback::new(vec![]), "1");
        assert!(matches!(
            session.decrypt_sample(&mut sample(&[1], 2), &keys()),
            Err(RipError::KeyIndexOutOfRange { index: 2, keys: 2 })
        ));
    }

    #[test]
    fn short_reply_is_an_io_error() {
        let mut session = DecryptSession::new(Loopback::new(vec![1]), "1");
        let error = session
            .decrypt_sample(&mut sample(&[1, 2, 3], 0), &keys())
            .unwrap_err();
        assert!(matches!(error, RipError::DecryptionIo(_)));
        assert_eq!(error.kind(), crate::error::ErrorKind::Protocol);
    }

    #[test]
    fn long_identifiers_are_rejected() {
        let keys = vec![PREFETCH_KEY.to_owned(), format!("skd://{}c6", "x".repeat(300))];
        let mut session = DecryptSession::new(Loopback::new(vec![0]), "1");
        assert!(matches!(
            session.decrypt_sample(&mut sample(&[1], 1), &keys),
            Err(RipError::IdentifierTooLong(308))
        ));
    }
}
