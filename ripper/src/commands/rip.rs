use crate::{
    catalog::{AlbumRef, Catalog, DEFAULT_API},
    rip::{DEFAULT_CODEC, DEFAULT_COVER_SIZE, RUNNING, RipOptions, Ripper},
};
use anyhow::Result;
use clap::Args;
use kdam::term::Colorizer;
use log::{error, warn};
use reqwest::{
    Proxy,
    blocking::Client,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use std::{path::PathBuf, process, sync::atomic::Ordering};

/// Rip every track of an album.
#[derive(Debug, Clone, Args)]
pub struct Rip {
    /// Album url (https://music.apple.com/us/album/...) or numeric album id.
    #[arg(required = true)]
    pub input: String,

    /// Storefront (two letter country code) used when the input is an album id.
    #[arg(short, long, default_value = "us")]
    pub storefront: String,

    /// Directory in which album directories are created.
    #[arg(short, long, env = "RIPPER_OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Size of the saved cover.jpg in pixels.
    #[arg(long, default_value_t = DEFAULT_COVER_SIZE)]
    pub cover_size: u32,

    /// Number of samples per chunk in written files.
    #[arg(
        long,
        default_value_t = ripper_mp4::tables::DEFAULT_CHUNK_SIZE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub chunk_size: u32,

    /// Bearer token for catalog requests.
    #[arg(long, help_heading = "Catalog Options", env = "RIPPER_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Base url of the catalog api.
    #[arg(long, help_heading = "Catalog Options", env = "RIPPER_API", default_value = DEFAULT_API)]
    pub api: String,

    /// Addresses of decryption services.
    /// One track is ripped in parallel per address.
    #[arg(
        short,
        long,
        help_heading = "Decrypt Options",
        env = "RIPPER_DECRYPTORS",
        value_delimiter = ',',
        default_value = "127.0.0.1:10020"
    )]
    pub decryptor: Vec<String>,

    /// Custom headers for requests.
    /// This option can be used multiple times.
    #[arg(long, help_heading = "Client Options", num_args = 2, value_names = &["KEY", "VALUE"])]
    pub header: Vec<String>, // Vec<(String, String)> not supported

    /// Set http(s) / socks proxy address for requests.
    #[arg(long, help_heading = "Client Options", value_parser = proxy_address_parser)]
    pub proxy: Option<Proxy>,

    /// Update and set user agent header for requests.
    #[arg(
        long,
        help_heading = "Client Options",
        default_value = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36"
    )]
    pub user_agent: String,
}

impl Rip {
    fn client(&self) -> Result<Client> {
        let mut client_builder = Client::builder().user_agent(&self.user_agent);

        if !self.header.is_empty() {
            let mut headers = HeaderMap::new();

            for pair in self.header.chunks_exact(2) {
                headers.insert(
                    pair[0].parse::<HeaderName>()?,
                    pair[1].parse::<HeaderValue>()?,
                );
            }

            client_builder = client_builder.default_headers(headers);
        }

        if let Some(proxy) = &self.proxy {
            client_builder = client_builder.proxy(proxy.clone());
        }

        Ok(client_builder.build()?)
    }

    pub fn execute(self) -> Result<()> {
        ctrlc::set_handler(|| {
            if RUNNING.load(Ordering::SeqCst) {
                warn!("Ctrl+C received, stopping after the current samples.");
                RUNNING.store(false, Ordering::SeqCst);
            } else {
                error!("Ctrl+C received, force exiting.");
                process::exit(1);
            }
        })?;

        let album = self.input.parse::<AlbumRef>()?;
        let storefront = album.storefront.as_deref().unwrap_or(&self.storefront);
        let catalog = Catalog::new(self.client()?, &self.api, storefront, &self.token);

        let ripper = Ripper::new(
            catalog,
            RipOptions {
                output: self.output,
                decryptors: self.decryptor,
                codec: DEFAULT_CODEC.to_owned(),
                cover_size: self.cover_size,
                chunk_size: self.chunk_size,
            },
        )?;

        let summary = ripper.rip(&album.id)?;

        println!(
            "{} {} ripped, {} existing, {} skipped in {}",
            "Done".colorize("bold green"),
            summary.ripped.len(),
            summary.existing.len(),
            summary.skipped.len(),
            summary.directory.to_string_lossy().colorize("cyan")
        );

        for (title, reason) in &summary.skipped {
            println!(
                "  {} {} ({}{})",
                "Skipped".colorize("bold yellow"),
                title,
                reason,
                if reason.is_retryable() {
                    ", retry later"
                } else {
                    ""
                }
            );
        }

        Ok(())
    }
}

fn proxy_address_parser(s: &str) -> Result<Proxy, String> {
    Proxy::all(s).map_err(|x| x.to_string())
}
