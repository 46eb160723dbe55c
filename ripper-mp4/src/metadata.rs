//! iTunes style metadata items written under `moov/udta/meta/ilst`.

use crate::{BoxWriter, FourCC, Result};
use std::io::{Seek, Write};

/// Well known item names.
pub mod atoms {
    use crate::FourCC;

    pub const TITLE: FourCC = FourCC::new(b"\xa9nam");
    pub const ALBUM: FourCC = FourCC::new(b"\xa9alb");
    pub const ARTIST: FourCC = FourCC::new(b"\xa9ART");
    pub const COMPOSER: FourCC = FourCC::new(b"\xa9wrt");
    pub const YEAR: FourCC = FourCC::new(b"\xa9day");
    pub const GENRE: FourCC = FourCC::new(b"\xa9gen");
    pub const ALBUM_ARTIST: FourCC = FourCC::new(b"aART");
    pub const COPYRIGHT: FourCC = FourCC::new(b"cprt");
    pub const COMPILATION: FourCC = FourCC::new(b"cpil");
    pub const TRACK_NUMBER: FourCC = FourCC::new(b"trkn");
    pub const FREEFORM: FourCC = FourCC::new(b"----");

    /// Mean of every freeform item written by this crate.
    pub const ITUNES_MEAN: &str = "com.apple.iTunes";
    pub const ISRC: &str = "ISRC";
    pub const LABEL: &str = "LABEL";
    pub const UPC: &str = "UPC";
}

/// Typed payload of a `data` box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Byte(u8),
    Integer(i32),
    Binary(Vec<u8>),
}

impl Value {
    pub const TYPE_BINARY: u32 = 0;
    pub const TYPE_UTF8: u32 = 1;
    pub const TYPE_SIGNED_INT: u32 = 21;

    pub fn type_code(&self) -> u32 {
        match self {
            Self::Text(_) => Self::TYPE_UTF8,
            Self::Byte(_) | Self::Integer(_) => Self::TYPE_SIGNED_INT,
            Self::Binary(_) => Self::TYPE_BINARY,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(x) => x.as_bytes().to_vec(),
            Self::Byte(x) => vec![*x],
            Self::Integer(x) => x.to_be_bytes().to_vec(),
            Self::Binary(x) => x.clone(),
        }
    }

    fn write<W: Write + Seek>(&self, writer: &mut BoxWriter<W>) -> Result<()> {
        writer.write_box(b"data", |w| {
            w.write_u32(self.type_code())?;
            // locale
            w.write_u32(0)?;
            w.write_bytes(&self.to_bytes())
        })
    }
}

/// A single metadata item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Atom {
    Standard {
        name: FourCC,
        value: Value,
    },
    /// A `----` item identified by reverse domain `mean` and `name`.
    Freeform {
        mean: String,
        name: String,
        value: Value,
    },
}

impl Atom {
    pub fn write<W: Write + Seek>(&self, writer: &mut BoxWriter<W>) -> Result<()> {
        match self {
            Self::Standard { name, value } => writer.write_box(name.as_bytes(), |w| value.write(w)),
            Self::Freeform { mean, name, value } => {
                writer.write_box(atoms::FREEFORM.as_bytes(), |w| {
                    w.write_full_box(b"mean", 0, 0, |w| w.write_bytes(mean.as_bytes()))?;
                    w.write_full_box(b"name", 0, 0, |w| w.write_bytes(name.as_bytes()))?;
                    value.write(w)
                })
            }
        }
    }
}

/// Ordered list of metadata items.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags {
    atoms: Vec<Atom>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: FourCC, value: Value) -> &mut Self {
        self.atoms.push(Atom::Standard { name, value });
        self
    }

    /// Add a text item, empty text is left out.
    pub fn push_text<T: Into<String>>(&mut self, name: FourCC, text: T) -> &mut Self {
        let text = text.into();

        if !text.is_empty() {
            self.push(name, Value::Text(text));
        }

        self
    }

    /// Add a `com.apple.iTunes` freeform text item, empty text is left out.
    pub fn push_freeform<T: Into<String>>(&mut self, name: &str, text: T) -> &mut Self {
        let text = text.into();

        if !text.is_empty() {
            self.atoms.push(Atom::Freeform {
                mean: atoms::ITUNES_MEAN.to_owned(),
                name: name.to_owned(),
                value: Value::Text(text),
            });
        }

        self
    }

    /// Add `trkn` as `[0, number, total, 0]`.
    pub fn track_number(&mut self, number: u16, total: u16) -> &mut Self {
        let mut data = vec![0; 2];
        data.extend_from_slice(&number.to_be_bytes());
        data.extend_from_slice(&total.to_be_bytes());
        data.extend_from_slice(&[0; 2]);
        self.push(atoms::TRACK_NUMBER, Value::Binary(data))
    }

    pub fn compilation(&mut self, compilation: bool) -> &mut Self {
        self.push(atoms::COMPILATION, Value::Byte(compilation as u8))
    }

    pub fn get(&self, name: FourCC) -> Option<&Value> {
        self.atoms.iter().find_map(|x| match x {
            Atom::Standard { name: x, value } if *x == name => Some(value),
            _ => None,
        })
    }

    pub fn get_freeform(&self, name: &str) -> Option<&Value> {
        self.atoms.iter().find_map(|x| match x {
            Atom::Freeform { name: x, value, .. } if x == name => Some(value),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Write `udta/meta` holding every item.
    pub fn write_udta<W: Write + Seek>(&self, writer: &mut BoxWriter<W>) -> Result<()> {
        writer.write_box(b"udta", |w| {
            w.write_full_box(b"meta", 0, 0, |w| {
                w.write_full_box(b"hdlr", 0, 0, |w| {
                    // pre_defined
                    w.write_u32(0)?;
                    w.write_bytes(b"mdir")?;
                    // reserved
                    w.write_bytes(b"appl")?;
                    w.write_zeros(8)?;
                    // empty name
                    w.write_u8(0)
                })?;

                w.write_box(b"ilst", |w| {
                    for atom in &self.atoms {
                        atom.write(w)?;
                    }
                    Ok(())
                })
            })
        })
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Atom;
    type IntoIter = std::slice::Iter<'a, Atom>;

    fn into_iter(self) -> Self::IntoIter {
        self.atoms.iter()
    }
}
