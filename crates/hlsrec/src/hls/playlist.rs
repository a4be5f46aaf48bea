use std::{sync::Arc, time::Duration};

use m3u8_rs::KeyMethod;
use reqwest::Url;

use crate::{
    error::{HlsError, HlsResult},
    hls::segment::EncryptionDescriptor,
    util::http::HttpClient,
};

#[derive(Debug, Clone)]
pub enum Playlist {
    Media(MediaPlaylist),
    Master(MasterPlaylist),
}

#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    pub segments: Vec<PlaylistSegment>,
    /// `EXT-X-MEDIA-SEQUENCE` of the first segment
    pub media_sequence: u64,
    /// `EXT-X-ENDLIST` present, no further polling needed
    pub closed: bool,
    pub target_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct PlaylistSegment {
    /// URI exactly as written in the playlist
    pub uri: String,
    pub duration: Duration,
    /// Key currently applicable to this segment
    pub key: Option<Arc<EncryptionDescriptor>>,
}

#[derive(Debug, Clone)]
pub struct MasterPlaylist {
    /// Variant stream URIs in document order
    pub variants: Vec<String>,
}

/// Result of a single playlist request.
///
/// Network failures are not fatal for a live recording, so they are reported as
/// [`PlaylistFetch::Transient`] and left to the caller to retry.
#[derive(Debug)]
pub enum PlaylistFetch {
    Loaded(Playlist),
    Transient(HlsError),
}

impl Playlist {
    /// Parses a playlist document fetched from `url`.
    pub fn parse(data: &[u8], url: &Url) -> HlsResult<Self> {
        let parsed = m3u8_rs::parse_playlist_res(data).map_err(|_| {
            HlsError::M3u8ParseError(format!("{url} is not a valid media or master playlist"))
        })?;

        Ok(match parsed {
            m3u8_rs::Playlist::MasterPlaylist(pl) => Playlist::Master(MasterPlaylist {
                variants: pl
                    .variants
                    .into_iter()
                    .filter(|v| !v.is_i_frame)
                    .map(|v| v.uri)
                    .collect(),
            }),
            m3u8_rs::Playlist::MediaPlaylist(pl) => {
                let mut key = None;
                let mut segments = Vec::with_capacity(pl.segments.len());
                for segment in pl.segments {
                    if let Some(k) = &segment.key {
                        key = encryption_descriptor(k, url).map(Arc::new);
                    }

                    segments.push(PlaylistSegment {
                        uri: segment.uri,
                        duration: Duration::try_from_secs_f32(segment.duration)
                            .unwrap_or_default(),
                        key: key.clone(),
                    });
                }

                Playlist::Media(MediaPlaylist {
                    segments,
                    media_sequence: pl.media_sequence,
                    closed: pl.end_list,
                    target_duration: Duration::try_from_secs_f64(pl.target_duration as f64)
                        .unwrap_or_default(),
                })
            }
        })
    }
}

/// Fetches and parses the playlist at `url`.
///
/// Transport failures and non-success responses are transient; a body that is not a
/// playlist is fatal.
pub async fn load_playlist(client: &HttpClient, url: &Url) -> HlsResult<PlaylistFetch> {
    tracing::debug!("Fetching playlist {url}");

    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return Ok(PlaylistFetch::Transient(e.into())),
    };
    if !response.status().is_success() {
        return Ok(PlaylistFetch::Transient(HlsError::HttpError(
            response.status(),
        )));
    }
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(PlaylistFetch::Transient(e.into())),
    };

    Playlist::parse(&bytes, url).map(PlaylistFetch::Loaded)
}

fn method_name(method: &KeyMethod) -> String {
    match method {
        KeyMethod::None => "NONE".to_string(),
        KeyMethod::AES128 => "AES-128".to_string(),
        KeyMethod::SampleAES => "SAMPLE-AES".to_string(),
        KeyMethod::Other(name) => name.clone(),
    }
}

fn encryption_descriptor(key: &m3u8_rs::Key, playlist_url: &Url) -> Option<EncryptionDescriptor> {
    if key.method == KeyMethod::None {
        return None;
    }

    let uri = key.uri.clone().unwrap_or_default();
    let uri = match playlist_url.join(&uri) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            tracing::warn!("Failed to resolve key uri {uri}: {e}");
            uri
        }
    };

    Some(EncryptionDescriptor {
        method: method_name(&key.method),
        uri,
        iv: key.iv.as_deref().and_then(|iv| {
            let parsed = parse_iv(iv);
            if parsed.is_none() {
                tracing::warn!("Ignored invalid IV {iv}");
            }
            parsed
        }),
    })
}

/// Decodes a hexadecimal IV attribute into one AES block, left padding short values.
pub(crate) fn parse_iv(iv: &str) -> Option<[u8; 16]> {
    let iv = iv
        .strip_prefix("0x")
        .or_else(|| iv.strip_prefix("0X"))
        .unwrap_or(iv);
    let iv = if iv.len() % 2 == 1 {
        format!("0{iv}")
    } else {
        iv.to_string()
    };

    let bytes = hex::decode(iv).ok()?;
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }

    let mut block = [0u8; 16];
    block[16 - bytes.len()..].copy_from_slice(&bytes);
    Some(block)
}
