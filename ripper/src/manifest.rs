use crate::error::{Result, RipError};
use log::debug;
use regex::Regex;
use reqwest::{Url, blocking::Client};
use std::sync::LazyLock;

/// Key used for samples that don't need real key material yet.
pub const PREFETCH_KEY: &str = "skd://itunes.apple.com/P000000000/s1/e1";

static KEY_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(skd?://[^"]*)""#).expect("valid key uri pattern"));

/// Container url and keys of a single track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamManifest {
    pub url: Url,
    /// Index 0 is always [`PREFETCH_KEY`].
    pub keys: Vec<String>,
}

/// Fetch a master playlist and pick the best `codec` stream out of it.
///
/// Variant uris are resolved against `master_url` even when the request was
/// redirected.
pub fn resolve(client: &Client, master_url: &str, codec: &str) -> Result<StreamManifest> {
    let base = Url::parse(master_url).map_err(|e| {
        RipError::ManifestFormat(format!("invalid manifest url {}: {}", master_url, e))
    })?;
    let response = client.get(base.clone()).send()?;

    if !response.status().is_success() {
        return Err(RipError::ManifestFetch {
            url: master_url.to_owned(),
            status: response.status().as_u16(),
        });
    }

    let text = response.text()?;
    select_stream(&text, &base, codec)
}

/// Select the highest average bandwidth variant encoded with `codec` and
/// collect the key uris of the playlist.
pub fn select_stream(text: &str, master_url: &Url, codec: &str) -> Result<StreamManifest> {
    let master = match m3u8_rs::parse_playlist_res(text.as_bytes()) {
        Ok(m3u8_rs::Playlist::MasterPlaylist(m3u8)) => m3u8,
        Ok(m3u8_rs::Playlist::MediaPlaylist(_)) => {
            return Err(RipError::ManifestFormat("got a media playlist".to_owned()));
        }
        Err(e) => return Err(RipError::ManifestFormat(e.to_string())),
    };

    let mut variants = master.variants.iter().collect::<Vec<_>>();
    // sort_by_key is stable
    variants.sort_by_key(|x| std::cmp::Reverse(x.average_bandwidth.unwrap_or(0)));

    let variant = variants
        .into_iter()
        .find(|x| x.codecs.as_deref() == Some(codec))
        .ok_or_else(|| RipError::CodecNotAvailable(codec.to_owned()))?;

    debug!(
        "selected variant {} ({} average bandwidth)",
        variant.uri,
        variant.average_bandwidth.unwrap_or(0)
    );

    let mut url = master_url.join(&variant.uri).map_err(|e| {
        RipError::ManifestFormat(format!("invalid variant uri {}: {}", variant.uri, e))
    })?;
    let path = url.path().strip_suffix(".m3u8").unwrap_or(url.path()).to_owned();
    url.set_path(&format!("{}_m.mp4", path));

    let mut keys = vec![PREFETCH_KEY.to_owned()];

    for capture in KEY_URI.captures_iter(text) {
        let uri = &capture[1];

        if uri.ends_with("c23") || uri.ends_with("c6") {
            keys.push(uri.to_owned());
        }
    }

    Ok(StreamManifest { url, keys })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = r#"#EXTM3U
#EXT-X-VERSION:7
#EXT-X-INDEPENDENT-SEGMENTS
#EXT-X-SESSION-KEY:METHOD=SAMPLE-AES,URI="skd://itunes.apple.com/P000000000/s1/e1",KEYFORMAT="com.apple.streamingkeydelivery",KEYFORMATVERSIONS="1"
#EXT-X-SESSION-KEY:METHOD=SAMPLE-AES,URI="skd://key-a-c23",KEYFORMAT="com.apple.streamingkeydelivery",KEYFORMATVERSIONS="1"
#EXT-X-SESSION-KEY:METHOD=SAMPLE-AES,URI="skd://key-b-c6",KEYFORMAT="com.apple.streamingkeydelivery",KEYFORMATVERSIONS="1"
#EXT-X-SESSION-KEY:METHOD=SAMPLE-AES,URI="skd://key-c-c11",KEYFORMAT="com.apple.streamingkeydelivery",KEYFORMATVERSIONS="1"
#EXT-X-STREAM-INF:BANDWIDTH=600,AVERAGE-BANDWIDTH=500,CODECS="alac"
audio/alac_500.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=400,AVERAGE-BANDWIDTH=300,CODECS="alac"
audio/alac_300.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1000,AVERAGE-BANDWIDTH=900,CODECS="alac"
audio/alac_900.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2000,AVERAGE-BANDWIDTH=1900,CODECS="ec-3"
audio/atmos.m3u8
"#;

    fn master_url() -> Url {
        Url::parse("https://aod.example.com/itunes-assets/album/P1/master.m3u8?a=1").unwrap()
    }

    #[test]
    fn picks_highest_average_bandwidth() {
        let manifest = select_stream(MASTER, &master_url(), "alac").unwrap();
        assert_eq!(
            manifest.url.as_str(),
            "https://aod.example.com/itunes-assets/album/P1/audio/alac_900_m.mp4"
        );
    }

    #[test]
    fn keeps_protection_keys_after_prefetch() {
        let manifest = select_stream(MASTER, &master_url(), "alac").unwrap();
        assert_eq!(
            manifest.keys,
            vec![PREFETCH_KEY, "skd://key-a-c23", "skd://key-b-c6"]
        );
    }

    #[test]
    fn equal_bandwidth_keeps_playlist_order() {
        let text = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1,AVERAGE-BANDWIDTH=10,CODECS=\"alac\"\nfirst.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=1,AVERAGE-BANDWIDTH=10,CODECS=\"alac\"\nsecond.m3u8\n";
        let manifest = select_stream(text, &master_url(), "alac").unwrap();
        assert!(manifest.url.path().ends_with("/first_m.mp4"));
        assert_eq!(manifest.keys, vec![PREFETCH_KEY]);
    }

    #[test]
    fn missing_codec() {
        assert!(matches!(
            select_stream(MASTER, &master_url(), "mp4a.40.2"),
            Err(RipError::CodecNotAvailable(_))
        ));
    }

    #[test]
    fn media_playlist_is_rejected() {
        let text = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:9.0,\nsegment.mp4\n#EXT-X-ENDLIST\n";
        assert!(matches!(
            select_stream(text, &master_url(), "alac"),
            Err(RipError::ManifestFormat(_))
        ));
    }
}
