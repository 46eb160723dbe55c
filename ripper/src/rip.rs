use crate::{
    catalog::{Album, Catalog},
    decrypt::DecryptSession,
    error::{Result, RipError, SkipReason, Stage},
    manifest::{self, StreamManifest},
    utils,
};
use kdam::{BarExt, Column, RichProgress, term::Colorizer, tqdm};
use log::{debug, info, warn};
use rayon::prelude::*;
use ripper_mp4::{CodecRegistry, Demuxer, FragmentedTrack, Synthesizer, tables::DEFAULT_CHUNK_SIZE};
use std::{
    fs::{self, File},
    io::{BufWriter, IsTerminal, Write, stderr},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

/// Cleared on Ctrl+C, checked before every decrypted sample.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

pub const DEFAULT_CODEC: &str = "alac";
pub const DEFAULT_COVER_SIZE: u32 = 1200;

#[derive(Clone, Debug)]
pub struct RipOptions {
    pub output: PathBuf,
    /// Decryptor addresses, one worker is started per address.
    pub decryptors: Vec<String>,
    pub codec: String,
    pub cover_size: u32,
    pub chunk_size: u32,
}

impl Default for RipOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("."),
            decryptors: vec!["127.0.0.1:10020".to_owned()],
            codec: DEFAULT_CODEC.to_owned(),
            cover_size: DEFAULT_COVER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What happened to every track of an album.
#[derive(Debug, Default)]
pub struct RipSummary {
    pub directory: PathBuf,
    pub ripped: Vec<PathBuf>,
    /// Output files that were already present.
    pub existing: Vec<PathBuf>,
    /// Track title and why it was skipped.
    pub skipped: Vec<(String, SkipReason)>,
}

enum Outcome {
    Ripped(PathBuf),
    Existing(PathBuf),
}

pub struct Ripper {
    catalog: Catalog,
    registry: CodecRegistry,
    options: RipOptions,
}

impl Ripper {
    /// Fails when `options` names no decryptor to run workers against.
    pub fn new(catalog: Catalog, mut options: RipOptions) -> Result<Self> {
        options.decryptors.retain(|x| !x.trim().is_empty());

        if options.decryptors.is_empty() {
            return Err(RipError::NoDecryptors);
        }

        Ok(Self {
            catalog,
            registry: CodecRegistry::default(),
            options,
        })
    }

    /// Rip every track of album `id`, skipping the ones that fail.
    pub fn rip(&self, id: &str) -> Result<RipSummary> {
        let demuxer = Demuxer::new(&self.registry, &self.options.codec)?;
        let album = self.catalog.album(id)?;
        let directory = self
            .options
            .output
            .join(utils::sanitize(&album.folder_name()));

        info!(
            "{} {} ({} tracks)",
            "Ripping".colorize("bold green"),
            album.folder_name().colorize("cyan"),
            album.tracks.len()
        );

        fs::create_dir_all(&directory).map_err(RipError::filesystem(&directory))?;
        self.write_cover(&album, &directory);

        let workers = self.options.decryptors.len();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|x| format!("ripper-{}", x))
            .build()?;

        let outcomes = pool.install(|| {
            (0..album.tracks.len())
                .into_par_iter()
                .map(|index| self.rip_track(&demuxer, &album, index, &directory))
                .collect::<Vec<_>>()
        });

        let mut summary = RipSummary {
            directory,
            ..Default::default()
        };

        for (track, outcome) in album.tracks.iter().zip(outcomes) {
            match outcome {
                Ok(Outcome::Ripped(path)) => summary.ripped.push(path),
                Ok(Outcome::Existing(path)) => summary.existing.push(path),
                Err(SkipReason::Failed {
                    source: RipError::Cancelled,
                    ..
                }) => return Err(RipError::Cancelled),
                Err(reason) => {
                    warn!("skipped {}: {}", track.attributes.name, reason);
                    summary.skipped.push((track.attributes.name.clone(), reason));
                }
            }
        }

        Ok(summary)
    }

    fn write_cover(&self, album: &Album, directory: &Path) {
        let path = directory.join("cover.jpg");

        if path.exists() {
            debug!("{} already exists", path.display());
            return;
        }

        let result = self
            .catalog
            .artwork(&album.attributes.artwork, self.options.cover_size)
            .and_then(|x| fs::write(&path, x).map_err(RipError::filesystem(&path)));

        if let Err(e) = result {
            warn!("couldn't save cover: {}", e);
        }
    }

    fn rip_track(
        &self,
        demuxer: &Demuxer,
        album: &Album,
        index: usize,
        directory: &Path,
    ) -> std::result::Result<Outcome, SkipReason> {
        if !RUNNING.load(Ordering::SeqCst) {
            return Err(failed(Stage::Asset)(RipError::Cancelled));
        }

        let track = &album.tracks[index];
        let title = &track.attributes.name;
        let path = directory.join(format!("{:02}. {}.m4a", index + 1, utils::sanitize(title)));

        if path.exists() {
            debug!("{} already exists", path.display());
            return Ok(Outcome::Existing(path));
        }

        let master = self
            .catalog
            .asset(&track.id)
            .map_err(failed(Stage::Asset))?
            .ok_or(SkipReason::AssetUnavailable)?;

        let manifest = manifest::resolve(self.catalog.client(), &master, &self.options.codec)
            .map_err(failed(Stage::Manifest))?;
        let data = self.download(&manifest).map_err(failed(Stage::Download))?;
        let mut fragmented = demuxer
            .demux(&data)
            .map_err(|x| failed(Stage::Demux)(x.into()))?;
        drop(data);

        check_keys(
            fragmented.required_keys(),
            fragmented.sample_entries,
            manifest.keys.len(),
        )?;
        self.decrypt(&track.id, title, &mut fragmented, &manifest)
            .map_err(failed(Stage::Decrypt))?;

        let tags = album.tags(index);
        let synthesizer = Synthesizer::new(demuxer.codec()).chunk_size(self.options.chunk_size);
        let written = File::create(&path)
            .map_err(RipError::filesystem(&path))
            .and_then(|file| Ok(synthesizer.write(BufWriter::new(file), &fragmented, &tags)?))
            .and_then(|mut writer| writer.flush().map_err(RipError::filesystem(&path)));

        if let Err(e) = written {
            // a truncated file would be mistaken for a finished track next time
            let _ = fs::remove_file(&path);
            return Err(failed(Stage::Write)(e));
        }

        info!(
            "{} {}",
            "Ripped".colorize("bold green"),
            path.display().to_string().colorize("cyan")
        );
        Ok(Outcome::Ripped(path))
    }

    fn download(&self, manifest: &StreamManifest) -> Result<Vec<u8>> {
        debug!("downloading {}", manifest.url);
        let response = self.catalog.client().get(manifest.url.as_str()).send()?;

        if !response.status().is_success() {
            return Err(RipError::Status {
                url: manifest.url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let data = response.bytes()?.to_vec();
        debug!("downloaded {}", utils::format_bytes(data.len(), 2));
        Ok(data)
    }

    fn decrypt(
        &self,
        track_id: &str,
        title: &str,
        track: &mut FragmentedTrack,
        manifest: &StreamManifest,
    ) -> Result<()> {
        // every worker owns one decryptor
        let worker = rayon::current_thread_index().unwrap_or(0);
        let decryptors = &self.options.decryptors;
        let endpoint = decryptors
            .get(worker % decryptors.len().max(1))
            .ok_or(RipError::NoDecryptors)?;

        debug!("decrypting {} on {}", title, endpoint);
        let mut session = DecryptSession::connect(endpoint, track_id)?;
        let mut pb = RichProgress::new(
            tqdm!(
                total = track.samples.len(),
                unit = " samples".to_owned(),
                dynamic_ncols = true,
                leave = false,
                position = worker as u16,
                disable = !stderr().is_terminal()
            ),
            vec![
                Column::Text(format!("[bold blue]{}", title)),
                Column::Animation,
                Column::Percentage(1),
                Column::Text("•".to_owned()),
                Column::CountTotal,
                Column::Text("•".to_owned()),
                Column::RemainingTime,
            ],
        );

        for sample in &mut track.samples {
            session.decrypt_sample(sample, &manifest.keys)?;
            let _ = pb.update(1);
        }

        let _ = pb.clear();
        session.finish()?;
        Ok(())
    }
}

/// Make sure every sample has a key before talking to the decryptor.
fn check_keys(required: usize, entries: usize, keys: usize) -> std::result::Result<(), SkipReason> {
    if required > entries {
        return Err(SkipReason::CodecMismatch { required, entries });
    }

    if required > keys {
        return Err(SkipReason::KeysMissing {
            required,
            available: keys,
        });
    }

    Ok(())
}

fn failed(stage: Stage) -> impl FnOnce(RipError) -> SkipReason {
    move |source| SkipReason::Failed { stage, source }
}
