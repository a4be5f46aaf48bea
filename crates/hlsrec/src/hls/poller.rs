use std::{sync::Arc, time::Duration};

use reqwest::Url;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{HlsError, HlsResult},
    hls::{
        dedup::DedupWindow,
        playlist::{load_playlist, MasterPlaylist, MediaPlaylist, Playlist, PlaylistFetch},
        segment::SegmentDescriptor,
    },
    progress::Progress,
    util::http::HttpClient,
};

/// Delay before retrying a playlist request that failed in transit.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Lower bound of the re-poll interval, for playlists advertising a zero target duration.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How recorded duration is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationMode {
    /// Sum of `EXTINF` durations of the queued segments.
    #[default]
    Metadata,
    /// Wall-clock time since the first poll.
    LocalTime,
}

/// Why the poller stopped producing segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    DurationReached,
    PlaylistClosed,
    /// The fetcher dropped its end of the queue.
    QueueClosed,
    Cancelled,
}

/// What to do after one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCycle {
    /// Poll again after the given delay.
    Wait(Duration),
    /// The playlist redirected to a media playlist, poll it immediately.
    Redirected,
    Done(PollOutcome),
}

pub struct PlaylistPoller {
    client: HttpClient,
    /// Current polling target. Replaced once if the first response is a master playlist.
    url: Url,
    redirected: bool,

    limit: Option<Duration>,
    mode: DurationMode,
    retry_backoff: Duration,

    window: DedupWindow,
    recorded: Duration,
    started_at: Instant,
    progress: Arc<Progress>,
}

impl PlaylistPoller {
    pub fn new(client: HttpClient, url: Url) -> Self {
        Self {
            client,
            url,
            redirected: false,
            limit: None,
            mode: DurationMode::default(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            window: DedupWindow::default(),
            recorded: Duration::ZERO,
            started_at: Instant::now(),
            progress: Arc::new(Progress::new()),
        }
    }

    /// Stops after this much media has been queued. Zero means unbounded.
    pub fn with_limit(mut self, limit: Option<Duration>) -> Self {
        self.limit = limit.filter(|l| !l.is_zero());
        self
    }

    pub fn with_mode(mut self, mode: DurationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn recorded(&self) -> Duration {
        self.recorded
    }

    /// Polls until the recording is complete, the queue is closed or `token` is cancelled.
    ///
    /// Dropping `sender` on return closes the queue for the fetcher.
    pub async fn run(
        mut self,
        sender: mpsc::Sender<SegmentDescriptor>,
        token: CancellationToken,
    ) -> HlsResult<PollOutcome> {
        self.started_at = Instant::now();

        loop {
            let wait = match self.poll_once(&sender, &token).await? {
                PollCycle::Done(outcome) => {
                    tracing::info!("Playlist polling finished: {outcome:?}");
                    return Ok(outcome);
                }
                PollCycle::Redirected => continue,
                PollCycle::Wait(wait) => wait,
            };

            tokio::select! {
                _ = token.cancelled() => return Ok(PollOutcome::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Runs a single cycle: fetch the playlist and queue every segment not seen before.
    pub async fn poll_once(
        &mut self,
        sender: &mpsc::Sender<SegmentDescriptor>,
        token: &CancellationToken,
    ) -> HlsResult<PollCycle> {
        if token.is_cancelled() {
            return Ok(PollCycle::Done(PollOutcome::Cancelled));
        }

        match load_playlist(&self.client, &self.url).await? {
            PlaylistFetch::Transient(e) => {
                tracing::warn!(
                    "Failed to fetch playlist {}: {e}, retry in {:?}",
                    self.url,
                    self.retry_backoff
                );
                Ok(PollCycle::Wait(self.retry_backoff))
            }
            PlaylistFetch::Loaded(Playlist::Master(master)) => {
                self.follow_variant(master)?;
                Ok(PollCycle::Redirected)
            }
            PlaylistFetch::Loaded(Playlist::Media(media)) => {
                let closed = media.closed;
                let target_duration = media.target_duration;

                if let Some(outcome) = self.enqueue_segments(media, sender, token).await {
                    return Ok(PollCycle::Done(outcome));
                }
                if closed {
                    return Ok(PollCycle::Done(PollOutcome::PlaylistClosed));
                }
                Ok(PollCycle::Wait(target_duration.max(MIN_POLL_INTERVAL)))
            }
        }
    }

    fn follow_variant(&mut self, master: MasterPlaylist) -> HlsResult<()> {
        if self.redirected {
            return Err(HlsError::M3u8ParseError(format!(
                "{} is a master playlist referenced by another master playlist",
                self.url
            )));
        }

        let variant = master
            .variants
            .first()
            .ok_or(HlsError::EmptyMasterPlaylist)?;
        let url = self.url.join(variant)?;
        tracing::info!("Master playlist detected, switching to variant {url}");

        self.url = url;
        self.redirected = true;
        Ok(())
    }

    async fn enqueue_segments(
        &mut self,
        media: MediaPlaylist,
        sender: &mpsc::Sender<SegmentDescriptor>,
        token: &CancellationToken,
    ) -> Option<PollOutcome> {
        let mut queued = 0;
        for (index, segment) in media.segments.into_iter().enumerate() {
            let uri = match resolve_segment_uri(&self.url, &segment.uri) {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::warn!("Skipped segment {}: {e}", segment.uri);
                    continue;
                }
            };
            if !self.window.insert(&uri) {
                continue;
            }

            self.recorded = match self.mode {
                DurationMode::Metadata => self.recorded.saturating_add(segment.duration),
                DurationMode::LocalTime => self.started_at.elapsed().max(self.recorded),
            };
            // media sequence numbers wrap at u64::MAX
            let descriptor = SegmentDescriptor {
                uri,
                sequence: media.media_sequence.wrapping_add(index as u64),
                key: segment.key,
                recorded: self.recorded,
            };

            // count first, the fetcher may append the segment as soon as it is sent
            self.progress.queued();
            tokio::select! {
                _ = token.cancelled() => {
                    self.progress.unqueued();
                    return Some(PollOutcome::Cancelled);
                }
                sent = sender.send(descriptor) => {
                    if sent.is_err() {
                        self.progress.unqueued();
                        return Some(PollOutcome::QueueClosed);
                    }
                }
            }
            queued += 1;

            if self.limit.is_some_and(|limit| self.recorded >= limit) {
                tracing::info!("{queued} new segments were added to queue.");
                return Some(PollOutcome::DurationReached);
            }
        }

        if queued > 0 {
            tracing::info!("{queued} new segments were added to queue.");
        }
        None
    }
}

/// Resolves a segment URI against its playlist and percent-decodes the result.
pub fn resolve_segment_uri(playlist_url: &Url, uri: &str) -> HlsResult<String> {
    let resolved = playlist_url.join(uri)?;
    let decoded = urlencoding::decode(resolved.as_str())
        .map_err(|_| HlsError::InvalidSegmentUri(resolved.to_string()))?;
    Ok(decoded.into_owned())
}
