use std::{path::PathBuf, pin::Pin, time::Duration};

use reqwest::Url;
use tokio::io::AsyncWrite;

use crate::{
    error::{HlsError, HlsResult},
    hls::poller::{DurationMode, DEFAULT_RETRY_BACKOFF},
    util::http::{HttpClient, DEFAULT_USER_AGENT},
};

pub type RecordWriter = Pin<Box<dyn AsyncWrite + Send + 'static>>;

/// Where the recorded stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutput {
    File(PathBuf),
    Stdout,
}

impl RecordOutput {
    /// `-` selects stdout, anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// Opens the output, truncating an existing file.
    pub async fn open(&self) -> HlsResult<RecordWriter> {
        Ok(match self {
            Self::File(path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .map_err(|source| HlsError::OutputOpen {
                        path: path.clone(),
                        source,
                    })?;
                Box::pin(file)
            }
            Self::Stdout => Box::pin(tokio::io::stdout()),
        })
    }
}

pub fn is_full_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[derive(Debug, Clone)]
pub struct RecordConfig {
    pub playlist_url: Url,
    pub output: RecordOutput,
    /// `None` records until the playlist ends.
    pub duration: Option<Duration>,
    pub duration_mode: DurationMode,

    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub cookies: Vec<String>,
    pub retry_backoff: Duration,
}

impl RecordConfig {
    pub fn new(playlist_url: &str, output: RecordOutput) -> HlsResult<Self> {
        if !is_full_url(playlist_url) {
            return Err(HlsError::InvalidPlaylistUrl(playlist_url.to_string()));
        }

        Ok(Self {
            playlist_url: Url::parse(playlist_url)?,
            output,
            duration: None,
            duration_mode: DurationMode::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            cookies: Vec::new(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Zero is treated as unbounded.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration).filter(|d| !d.is_zero());
        self
    }

    pub fn with_local_time(mut self, use_local_time: bool) -> Self {
        self.duration_mode = if use_local_time {
            DurationMode::LocalTime
        } else {
            DurationMode::Metadata
        };
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<String>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn client(&self) -> HlsResult<HttpClient> {
        let client = HttpClient::with_user_agent(&self.user_agent, self.timeout)?;
        if !self.cookies.is_empty() {
            client.add_cookies(self.cookies.clone(), self.playlist_url.clone())?;
        }
        Ok(client)
    }
}
