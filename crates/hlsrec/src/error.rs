use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HlsError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Media playlist url must begin with http/https: {0}")]
    InvalidPlaylistUrl(String),

    #[error("Invalid m3u8 file: {0}")]
    M3u8ParseError(String),

    #[error("Invalid segment uri: {0}")]
    InvalidSegmentUri(String),

    #[error("Master playlist does not contain any variant")]
    EmptyMasterPlaylist,

    #[error("Invalid AES-128 key length: {0} bytes")]
    InvalidAes128Key(usize),

    #[error("Ciphertext of {0} bytes is not aligned to the AES block size")]
    UnalignedCiphertext(usize),

    #[error("Failed to open output {path}: {source}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    OutputWrite(#[source] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type HlsResult<T> = Result<T, HlsError>;
