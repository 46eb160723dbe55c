use crate::error::{Result, RipError};
use log::debug;
use regex::Regex;
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::{AUTHORIZATION, ORIGIN, USER_AGENT},
};
use ripper_mp4::{Tags, atoms};
use serde::{Deserialize, de::DeserializeOwned};
use std::{str::FromStr, sync::LazyLock};

pub const DEFAULT_API: &str = "https://amp-api.music.apple.com";
const ORIGIN_URL: &str = "https://music.apple.com";
/// Asset urls are only handed out to the desktop client.
const ASSET_USER_AGENT: &str = "iTunes/12.11.3 (Windows; Microsoft Windows 10 x64 Professional Edition (Build 19041); x64) AppleWebKit/7611.1022.4001.1 (dt:2)";

static ALBUM_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?:beta\.music|music)\.apple\.com/(\w{2})(?:/album|/album/.+)/(?:id)?(\d+)(?:$|\?)")
        .expect("valid album url pattern")
});

/// Album given on the command line, either as an url or as a bare id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlbumRef {
    /// Present when parsed from an url.
    pub storefront: Option<String>,
    pub id: String,
}

impl FromStr for AlbumRef {
    type Err = RipError;

    fn from_str(s: &str) -> Result<Self> {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self {
                storefront: None,
                id: s.to_owned(),
            });
        }

        ALBUM_URL
            .captures(s)
            .map(|x| Self {
                storefront: Some(x[1].to_owned()),
                id: x[2].to_owned(),
            })
            .ok_or_else(|| RipError::InvalidAlbum(s.to_owned()))
    }
}

#[derive(Debug, Deserialize)]
struct Response<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Artwork {
    /// Template with `{w}` and `{h}` placeholders.
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Artwork {
    pub fn url(&self, size: u32) -> String {
        self.url
            .replace("{w}", &size.to_string())
            .replace("{h}", &size.to_string())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlbumAttributes {
    pub artist_name: String,
    pub artwork: Artwork,
    pub copyright: String,
    pub genre_names: Vec<String>,
    pub is_compilation: bool,
    pub name: String,
    pub record_label: String,
    pub release_date: String,
    pub track_count: u32,
    pub upc: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackAttributes {
    pub album_name: String,
    pub artist_name: String,
    pub composer_name: String,
    pub disc_number: u32,
    pub genre_names: Vec<String>,
    pub isrc: String,
    pub name: String,
    pub release_date: String,
    pub track_number: u32,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Track {
    pub id: String,
    pub attributes: TrackAttributes,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct Relationship<T> {
    data: Vec<T>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct AlbumRelationships {
    tracks: Relationship<Track>,
}

#[derive(Clone, Debug, Deserialize)]
struct AlbumData {
    id: String,
    #[serde(default)]
    attributes: AlbumAttributes,
    #[serde(default)]
    relationships: AlbumRelationships,
}

/// An album with its tracks in playback order.
#[derive(Clone, Debug)]
pub struct Album {
    pub id: String,
    pub attributes: AlbumAttributes,
    pub tracks: Vec<Track>,
}

impl Album {
    /// Directory name of the album, not yet sanitized.
    pub fn folder_name(&self) -> String {
        format!("{} - {}", self.attributes.artist_name, self.attributes.name)
    }

    /// Metadata of the track at `index`, numbered by its position in the album.
    pub fn tags(&self, index: usize) -> Tags {
        let mut tags = Tags::new();
        let album = &self.attributes;

        let Some(track) = self.tracks.get(index) else {
            return tags;
        };
        let attributes = &track.attributes;

        tags.push_text(atoms::TITLE, attributes.name.as_str())
            .push_text(atoms::ALBUM, album.name.as_str())
            .push_text(atoms::ARTIST, attributes.artist_name.as_str())
            .push_text(atoms::COMPOSER, attributes.composer_name.as_str())
            .push_text(atoms::YEAR, album.release_date.split('-').next().unwrap_or_default())
            .push_freeform(atoms::ISRC, attributes.isrc.as_str());

        if let Some(genre) = attributes.genre_names.first() {
            tags.push_text(atoms::GENRE, genre.as_str());
        }

        tags.push_text(atoms::ALBUM_ARTIST, album.artist_name.as_str())
            .push_text(atoms::COPYRIGHT, album.copyright.as_str())
            .compilation(album.is_compilation)
            .push_freeform(atoms::LABEL, album.record_label.as_str())
            .push_freeform(atoms::UPC, album.upc.as_str())
            .track_number(
                u16::try_from(index + 1).unwrap_or(u16::MAX),
                u16::try_from(self.tracks.len()).unwrap_or(u16::MAX),
            );

        tags
    }
}

impl From<AlbumData> for Album {
    fn from(data: AlbumData) -> Self {
        Self {
            id: data.id,
            attributes: data.attributes,
            tracks: data.relationships.tracks.data,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ExtendedAssetUrls {
    enhanced_hls: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SongAttributes {
    extended_asset_urls: ExtendedAssetUrls,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct Song {
    id: String,
    attributes: SongAttributes,
}

/// Authenticated client of the catalog api.
#[derive(Clone, Debug)]
pub struct Catalog {
    client: Client,
    api: String,
    storefront: String,
    token: String,
}

impl Catalog {
    pub fn new(client: Client, api: &str, storefront: &str, token: &str) -> Self {
        Self {
            client,
            api: api.trim_end_matches('/').to_owned(),
            storefront: storefront.to_owned(),
            token: token.to_owned(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn album(&self, id: &str) -> Result<Album> {
        let url = format!("{}/v1/catalog/{}/albums/{}", self.api, self.storefront, id);
        let request = self.client.get(&url).query(&[
            ("omit[resource]", "autos"),
            ("include", "tracks,artists,record-labels"),
            ("include[songs]", "artists"),
        ]);

        let response = self.send::<AlbumData>(request, &url)?;
        let album = response
            .data
            .into_iter()
            .next()
            .map(Album::from)
            .ok_or_else(|| RipError::AlbumNotFound(id.to_owned()))?;

        debug!("fetched album {} with {} tracks", album.id, album.tracks.len());
        Ok(album)
    }

    /// Master playlist url of a song, `None` when no lossless asset exists.
    pub fn asset(&self, song_id: &str) -> Result<Option<String>> {
        let url = format!("{}/v1/catalog/{}/songs/{}", self.api, self.storefront, song_id);
        let request = self
            .client
            .get(&url)
            .query(&[("extend", "extendedAssetUrls"), ("include", "albums")])
            .header(USER_AGENT, ASSET_USER_AGENT);

        Ok(self
            .send::<Song>(request, &url)?
            .data
            .into_iter()
            .find(|x| x.id == song_id)
            .and_then(|x| x.attributes.extended_asset_urls.enhanced_hls)
            .filter(|x| !x.is_empty()))
    }

    /// Download the artwork scaled to `size` x `size`.
    pub fn artwork(&self, artwork: &Artwork, size: u32) -> Result<Vec<u8>> {
        let url = artwork.url(size);
        let response = self.client.get(&url).send()?;

        if !response.status().is_success() {
            return Err(RipError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<Response<T>> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ORIGIN, ORIGIN_URL)
            .send()?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(RipError::Status {
                url: url.to_owned(),
                status: response.status().as_u16(),
            });
        }

        Ok(serde_json::from_slice(&response.bytes()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripper_mp4::Value;

    const ALBUM: &str = r#"{
        "data": [{
            "id": "1440857781",
            "type": "albums",
            "attributes": {
                "artistName": "Various Artists",
                "artwork": { "url": "https://is1.example.com/image/{w}x{h}bb.jpg", "width": 3000, "height": 3000 },
                "copyright": "℗ 2018 Label",
                "genreNames": ["Pop", "Music"],
                "isCompilation": true,
                "name": "Hits: Vol. 1",
                "recordLabel": "Label",
                "releaseDate": "2018-11-02",
                "trackCount": 2,
                "upc": "00602567890123"
            },
            "relationships": {
                "tracks": {
                    "href": "/v1/catalog/us/albums/1440857781/tracks",
                    "data": [
                        {
                            "id": "1440857782",
                            "type": "songs",
                            "attributes": {
                                "artistName": "First Artist",
                                "composerName": "Someone",
                                "discNumber": 1,
                                "genreNames": ["Dance", "Music"],
                                "isrc": "USUM71812345",
                                "name": "Intro",
                                "trackNumber": 1
                            }
                        },
                        {
                            "id": "1440857783",
                            "type": "songs",
                            "attributes": { "artistName": "Second Artist", "name": "Outro", "trackNumber": 2 }
                        }
                    ]
                }
            }
        }]
    }"#;

    fn album() -> Album {
        let response = serde_json::from_str::<Response<AlbumData>>(ALBUM).unwrap();
        response.data.into_iter().next().unwrap().into()
    }

    #[test]
    fn album_reference_from_url_or_id() {
        let album = "https://music.apple.com/gb/album/hits-vol-1/1440857781?i=1440857782"
            .parse::<AlbumRef>()
            .unwrap();
        assert_eq!(album.storefront.as_deref(), Some("gb"));
        assert_eq!(album.id, "1440857781");

        assert_eq!("1440857781".parse::<AlbumRef>().unwrap().storefront, None);
        assert!("https://example.com/album/1".parse::<AlbumRef>().is_err());
        assert!("".parse::<AlbumRef>().is_err());
    }

    #[test]
    fn deserializes_album_with_tracks() {
        let album = album();
        assert_eq!(album.folder_name(), "Various Artists - Hits: Vol. 1");
        assert_eq!(album.tracks.len(), 2);
        assert_eq!(album.tracks[1].attributes.composer_name, "");
        assert_eq!(
            album.attributes.artwork.url(1200),
            "https://is1.example.com/image/1200x1200bb.jpg"
        );
    }

    #[test]
    fn track_tags() {
        let tags = album().tags(0);
        let text = |name| match tags.get(name) {
            Some(Value::Text(x)) => x.as_str(),
            _ => "",
        };

        assert_eq!(text(atoms::TITLE), "Intro");
        assert_eq!(text(atoms::ARTIST), "First Artist");
        assert_eq!(text(atoms::ALBUM_ARTIST), "Various Artists");
        assert_eq!(text(atoms::YEAR), "2018");
        assert_eq!(text(atoms::GENRE), "Dance");
        assert_eq!(tags.get(atoms::COMPILATION), Some(&Value::Byte(1)));
        assert_eq!(
            tags.get(atoms::TRACK_NUMBER),
            Some(&Value::Binary(vec![0, 0, 0, 1, 0, 2, 0, 0]))
        );
        assert_eq!(
            tags.get_freeform(atoms::UPC),
            Some(&Value::Text("00602567890123".to_owned()))
        );
    }

    #[test]
    fn empty_fields_are_left_out() {
        let tags = album().tags(1);
        assert!(tags.get(atoms::COMPOSER).is_none());
        assert!(tags.get(atoms::GENRE).is_none());
        assert!(tags.get_freeform(atoms::ISRC).is_none());
    }
}
