/*
    REFERENCES
    ----------

    1. https://github.com/shaka-project/shaka-player/blob/7098f43f70119226bca2e5583833aaf27b498e33/lib/util/mp4_parser.js
    2. https://developer.apple.com/library/archive/documentation/QuickTime/QTFF/QTFFChap3/qtff3.html

*/

use crate::{Error, FourCC, Reader, Result};
use std::{collections::HashMap, ops::Range, rc::Rc};

/// `Result` type returned by box callbacks.
pub type HandlerResult = Result<()>;
/// Callback invoked with every parsed box of a declared type.
pub type CallbackType = Rc<dyn Fn(ParsedBox) -> HandlerResult>;

/// An enum used to track the type of box so that the correct values can be
/// read from the header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoxType {
    BasicBox,
    FullBox,
}

/// Mp4 box parser driven by per-type callbacks.
///
/// Boxes without a declared callback are skipped, so a parser only walks the
/// part of the tree it was told about.
#[derive(Clone, Default)]
pub struct Mp4Parser {
    definitions: Rc<HashMap<FourCC, (BoxType, CallbackType)>>,
}

impl Mp4Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a box type as a Basic Box.
    pub fn base_box<F>(self, name: &[u8; 4], definition: F) -> Self
    where
        F: Fn(ParsedBox) -> HandlerResult + 'static,
    {
        self.define(FourCC::new(name), BoxType::BasicBox, definition)
    }

    /// Declare a box type as a Full Box.
    pub fn full_box<F>(self, name: &[u8; 4], definition: F) -> Self
    where
        F: Fn(ParsedBox) -> HandlerResult + 'static,
    {
        self.define(FourCC::new(name), BoxType::FullBox, definition)
    }

    /// Declare a box type by its four-cc and header kind.
    pub fn define<F>(mut self, name: FourCC, box_type: BoxType, definition: F) -> Self
    where
        F: Fn(ParsedBox) -> HandlerResult + 'static,
    {
        let definition: CallbackType = Rc::new(definition);
        Rc::make_mut(&mut self.definitions).insert(name, (box_type, definition));
        self
    }

    /// Parse the given data using the declared callbacks.
    pub fn parse(&self, data: &[u8]) -> HandlerResult {
        let mut reader = Reader::new(data.to_vec());

        while reader.has_more_data() {
            self.parse_next(0, &mut reader)?;
        }

        Ok(())
    }

    /// Parse the next box on the current level.
    ///
    /// `abs_start` is the absolute position of `reader`'s first byte in the
    /// original data.
    fn parse_next(&self, abs_start: u64, reader: &mut Reader) -> HandlerResult {
        let start = reader.get_position();

        // size(4 bytes) + type(4 bytes) = 8 bytes
        let mut size = reader.read_u32()? as u64;
        let name = FourCC::from(reader.read_u32()?);
        let mut has_64_bit_size = false;

        match size {
            0 => size = reader.get_length() - start,
            1 => {
                size = reader.read_u64()?;
                has_64_bit_size = true;
            }
            _ => (),
        }

        let end = start.saturating_add(size);

        if end > reader.get_length() || end < reader.get_position() {
            return Err(Error::TruncatedBox {
                name,
                offset: abs_start + start,
                size,
                available: reader.get_length() - start,
            });
        }

        let Some((box_type, definition)) = self.definitions.get(&name) else {
            // Move the read head to be at the end of the box.
            reader.skip(end - reader.get_position())?;
            return Ok(());
        };

        let mut version = None;
        let mut flags = None;

        if *box_type == BoxType::FullBox {
            if reader.get_position() + 4 > end {
                return Err(Error::TruncatedBox {
                    name,
                    offset: abs_start + start,
                    size,
                    available: end - reader.get_position(),
                });
            }

            let version_and_flags = reader.read_u32()?;
            version = Some(version_and_flags >> 24);
            flags = Some(version_and_flags & 0xFFFFFF);
        }

        // Read the whole payload so that the current level can be safely read
        // regardless of how the payload is parsed.
        let payload = reader.read_bytes((end - reader.get_position()) as usize)?;

        definition(ParsedBox {
            name,
            parser: self.clone(),
            start: start + abs_start,
            size,
            version,
            flags,
            reader: Reader::new(payload),
            has_64_bit_size,
        })
    }
}

// CALLBACKS

/// A callback that tells the Mp4 parser to treat the body of a box as a series
/// of boxes. The number of boxes is limited by the size of the parent box.
pub fn children(mut box_: ParsedBox) -> HandlerResult {
    // The "reader" starts at the payload, so we need to add the header to the
    // start position.  The header size varies.
    let header_size = box_.header_size();

    while box_.reader.has_more_data() {
        box_.parser
            .parse_next(box_.start + header_size, &mut box_.reader)?;
    }

    Ok(())
}

/// A callback that tells the Mp4 parser to treat the body of a box as a sample
/// description. A sample description box has a fixed number of children. The
/// number of children is represented by a 4 byte unsigned integer. Each child
/// is a box.
pub fn sample_description(mut box_: ParsedBox) -> HandlerResult {
    let header_size = box_.header_size();
    let count = box_.reader.read_u32()?;

    for _ in 0..count {
        box_.parser
            .parse_next(box_.start + header_size, &mut box_.reader)?;
    }

    Ok(())
}

/// Number of bytes preceding the child boxes of an audio sample entry.
pub fn audio_sample_entry_size(reader: &mut Reader) -> Result<u64> {
    let start = reader.get_position();

    // 6 bytes reserved
    // 2 bytes data reference index
    reader.skip(8)?;

    // 2 bytes version
    let version = reader.read_u16()?;
    // 2 bytes revision (0, could be ignored)
    // 4 bytes reserved
    reader.skip(6)?;

    if version == 2 {
        // 16 bytes hard-coded values with no comments
        // 8 bytes sample rate
        // 4 bytes channel count
        // 4 bytes hard-coded values with no comments
        // 4 bytes bits per sample
        // 4 bytes lpcm flags
        // 4 bytes sample size
        // 4 bytes samples per packet
        reader.skip(48)?;
    } else {
        // 2 bytes channel count
        // 2 bytes bits per sample
        // 2 bytes compression ID
        // 2 bytes packet size
        // 4 bytes sample rate (16.16)
        reader.skip(12)?;
    }

    if version == 1 {
        // 4 bytes samples per packet
        // 4 bytes bytes per packet
        // 4 bytes bytes per frame
        // 4 bytes bytes per sample
        reader.skip(16)?;
    }

    Ok(reader.get_position() - start)
}

/// A callback that tells the Mp4 parser to treat the body of a box as a audio
/// sample entry. A audio sample entry has some fixed-sized fields
/// describing the audio codec parameters, followed by an arbitrary number of
/// appended children. Each child is a box.
pub fn audio_sample_entry(mut box_: ParsedBox) -> HandlerResult {
    let header_size = box_.header_size();
    audio_sample_entry_size(&mut box_.reader)?;

    while box_.reader.has_more_data() {
        box_.parser
            .parse_next(box_.start + header_size, &mut box_.reader)?;
    }

    Ok(())
}

/// Parsed mp4 box.
pub struct ParsedBox {
    /// The box name, a 4-character code.
    pub name: FourCC,
    /// The parser that parsed this box, used to parse child boxes with the
    /// same set of callbacks.
    pub parser: Mp4Parser,
    /// The start of this box (before the header) in the original buffer.
    pub start: u64,
    /// The size of this box (including the header).
    pub size: u64,
    /// The version for a full box, `None` for basic boxes.
    pub version: Option<u32>,
    /// The flags for a full box, `None` for basic boxes.
    pub flags: Option<u32>,
    /// The reader for this box is only for this box. Reading or not reading to
    /// the end will have no affect on the parser reading other sibling boxes.
    pub reader: Reader,
    /// If true, the box header had a 64-bit size field.
    pub has_64_bit_size: bool,
}

impl ParsedBox {
    /// Find the header size of the box.
    pub fn header_size(&self) -> u64 {
        let basic_header_size = 8;
        let _64_bit_field_size = if self.has_64_bit_size { 8 } else { 0 };
        let version_and_flags_size = if self.flags.is_some() { 4 } else { 0 };
        basic_header_size + _64_bit_field_size + version_and_flags_size
    }

    /// Byte range of the whole box (header included) in the original buffer.
    pub fn span(&self) -> Range<usize> {
        self.start as usize..(self.start + self.size) as usize
    }

    pub fn version(&self) -> u8 {
        self.version.unwrap_or(0) as u8
    }

    pub fn flags(&self) -> u32 {
        self.flags.unwrap_or(0)
    }
}
