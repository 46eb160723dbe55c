//! Sample tables of a flat file (`stts`, `stsc`, `stsz`).

/// Samples per chunk used when nothing else is asked for.
pub const DEFAULT_CHUNK_SIZE: u32 = 5;

/// One `stts` run: `count` consecutive samples lasting `delta` each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeToSample {
    pub count: u32,
    pub delta: u32,
}

/// One `stsc` entry: chunks from `first_chunk` (1-based) on hold
/// `samples_per_chunk` samples each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleToChunk {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Run-length encode sample durations.
pub fn time_to_sample<I>(durations: I) -> Vec<TimeToSample>
where
    I: IntoIterator<Item = u32>,
{
    let mut runs: Vec<TimeToSample> = vec![];

    for delta in durations {
        match runs.last_mut() {
            Some(run) if run.delta == delta => run.count += 1,
            _ => runs.push(TimeToSample { count: 1, delta }),
        }
    }

    runs
}

/// Number of chunks `sample_count` samples occupy.
pub fn chunk_count(sample_count: u32, chunk_size: u32) -> u32 {
    sample_count.div_ceil(chunk_size.max(1))
}

/// Layout of full chunks followed by at most one shorter chunk.
pub fn sample_to_chunk(sample_count: u32, chunk_size: u32) -> Vec<SampleToChunk> {
    let chunk_size = chunk_size.max(1);
    let full = sample_count / chunk_size;
    let rest = sample_count % chunk_size;
    let mut entries = vec![];

    if full > 0 {
        entries.push(SampleToChunk {
            first_chunk: 1,
            samples_per_chunk: chunk_size,
            sample_description_index: 1,
        });
    }

    if rest > 0 {
        entries.push(SampleToChunk {
            first_chunk: full + 1,
            samples_per_chunk: rest,
            sample_description_index: 1,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(sample_count: u32, chunk_size: u32) -> Vec<(u32, u32)> {
        sample_to_chunk(sample_count, chunk_size)
            .into_iter()
            .map(|x| (x.first_chunk, x.samples_per_chunk))
            .collect()
    }

    #[test]
    fn remainder_gets_its_own_entry() {
        assert_eq!(layout(13, 5), vec![(1, 5), (3, 3)]);
        assert_eq!(chunk_count(13, 5), 3);
    }

    #[test]
    fn exact_multiple_has_one_entry() {
        assert_eq!(layout(10, 5), vec![(1, 5)]);
        assert_eq!(chunk_count(10, 5), 2);
    }

    #[test]
    fn fewer_samples_than_chunk_size() {
        assert_eq!(layout(3, 5), vec![(1, 3)]);
        assert!(layout(0, 5).is_empty());
        assert_eq!(chunk_count(0, 5), 0);
    }

    #[test]
    fn run_length_encodes_durations() {
        let runs = time_to_sample([4096, 4096, 4096, 1024, 4096]);
        assert_eq!(
            runs,
            vec![
                TimeToSample { count: 3, delta: 4096 },
                TimeToSample { count: 1, delta: 1024 },
                TimeToSample { count: 1, delta: 4096 },
            ]
        );
    }
}
