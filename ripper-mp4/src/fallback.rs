//! Resolution of per-sample values that a fragment may leave out.
//!
//! A sample's size and duration are looked up in order: the value stored with
//! the sample in `trun`, the fragment default from `tfhd`, then the track
//! default from `trex`. The first present value wins.

use crate::boxes::{TfhdBox, TrexBox, TrunSample};

/// Where a resolved value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// `trun` sample table (flag 0x200 for size, 0x100 for duration).
    Sample,
    /// `tfhd` default (flag 0x10 for size, 0x08 for duration).
    Fragment,
    /// `trex` default, always present.
    Track,
}

/// Lookup order, first match wins.
pub const RULES: [Origin; 3] = [Origin::Sample, Origin::Fragment, Origin::Track];

/// A per-sample value that may be defaulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Size,
    Duration,
}

/// Values a single field can take at every level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Candidates {
    pub sample: Option<u32>,
    pub fragment: Option<u32>,
    pub track: u32,
}

impl Candidates {
    fn get(&self, origin: Origin) -> Option<u32> {
        match origin {
            Origin::Sample => self.sample,
            Origin::Fragment => self.fragment,
            Origin::Track => Some(self.track),
        }
    }

    pub fn resolve(&self) -> (u32, Origin) {
        RULES
            .iter()
            .find_map(|origin| self.get(*origin).map(|value| (value, *origin)))
            .unwrap_or((self.track, Origin::Track))
    }
}

impl Field {
    pub fn candidates(self, sample: &TrunSample, tfhd: &TfhdBox, trex: &TrexBox) -> Candidates {
        match self {
            Self::Size => Candidates {
                sample: sample.sample_size,
                fragment: tfhd.default_sample_size,
                track: trex.default_sample_size,
            },
            Self::Duration => Candidates {
                sample: sample.sample_duration,
                fragment: tfhd.default_sample_duration,
                track: trex.default_sample_duration,
            },
        }
    }

    pub fn resolve(self, sample: &TrunSample, tfhd: &TfhdBox, trex: &TrexBox) -> u32 {
        self.candidates(sample, tfhd, trex).resolve().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_value_wins() {
        let candidates = Candidates {
            sample: Some(10),
            fragment: Some(20),
            track: 30,
        };
        assert_eq!(candidates.resolve(), (10, Origin::Sample));
    }

    #[test]
    fn fragment_default_beats_track_default() {
        let candidates = Candidates {
            sample: None,
            fragment: Some(20),
            track: 30,
        };
        assert_eq!(candidates.resolve(), (20, Origin::Fragment));
    }

    #[test]
    fn falls_back_to_track_default() {
        let candidates = Candidates {
            sample: None,
            fragment: None,
            track: 30,
        };
        assert_eq!(candidates.resolve(), (30, Origin::Track));
    }

    #[test]
    fn picks_field_from_boxes() {
        let sample = TrunSample {
            sample_duration: None,
            sample_size: Some(7),
        };
        let tfhd = TfhdBox {
            sample_description_index: None,
            default_sample_duration: Some(4096),
            default_sample_size: Some(9),
        };
        let trex = TrexBox {
            default_sample_duration: 1024,
            default_sample_size: 11,
        };

        assert_eq!(Field::Size.resolve(&sample, &tfhd, &trex), 7);
        assert_eq!(Field::Duration.resolve(&sample, &tfhd, &trex), 4096);
    }
}
