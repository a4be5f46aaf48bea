use std::sync::Arc;

use tokio::{io::AsyncWrite, sync::mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    config::RecordConfig,
    error::{HlsError, HlsResult},
    fetch::SegmentWriter,
    hls::poller::{PlaylistPoller, PollOutcome},
    progress::Progress,
    util::http::HttpClient,
};

/// Capacity of the queue between the poller and the writer. A full queue blocks the poller.
pub const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    DurationReached,
    PlaylistClosed,
    Cancelled,
}

impl From<PollOutcome> for RecordOutcome {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::DurationReached => Self::DurationReached,
            PollOutcome::PlaylistClosed => Self::PlaylistClosed,
            PollOutcome::QueueClosed | PollOutcome::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSummary {
    pub outcome: RecordOutcome,
    /// Segments queued by the poller
    pub total: usize,
    /// Segments appended to the output
    pub finished: usize,
    pub skipped: usize,
}

/// ┌──────────────────┐   SegmentDescriptor   ┌──────────────────┐
/// │                  │  ───────────────────► │                  │   fetch, decrypt
/// │  PlaylistPoller  │   bounded MPSC queue  │  SegmentWriter   ├──────────────────► output
/// │                  │  ───────────────────► │                  │
/// └──────────────────┘                       └──────────────────┘
///
/// The poller is the only producer and the writer the only consumer, so segments reach
/// the output in the order they were discovered.
pub struct Recorder {
    config: RecordConfig,
    progress: Arc<Progress>,
}

impl Recorder {
    pub fn new(config: RecordConfig) -> Self {
        Self {
            config,
            progress: Arc::new(Progress::new()),
        }
    }

    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    /// Opens the configured output and records into it.
    pub async fn run(self, token: CancellationToken) -> HlsResult<RecordSummary> {
        let client = self.config.client()?;
        let output = self.config.output.open().await?;
        self.run_with_output(client, output, token).await
    }

    /// Records into `output` until the playlist is exhausted, the duration limit is reached,
    /// a fatal error occurs or `token` is cancelled.
    ///
    /// Cancellation is not an error. The writer finishes the segment it is working on,
    /// flushes the output and drops everything still queued.
    pub async fn run_with_output<W>(
        self,
        client: HttpClient,
        output: W,
        token: CancellationToken,
    ) -> HlsResult<RecordSummary>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let config = &self.config;
        tracing::info!("Start recording {}", config.playlist_url);

        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let stages = token.child_token();

        let poller = PlaylistPoller::new(client.clone(), config.playlist_url.clone())
            .with_limit(config.duration)
            .with_mode(config.duration_mode)
            .with_retry_backoff(config.retry_backoff)
            .with_progress(self.progress.clone());
        let writer = SegmentWriter::new(client, output)
            .with_limit(config.duration)
            .with_progress(self.progress.clone());

        let mut poller = tokio::spawn(poller.run(sender, stages.clone()));
        let mut writer = tokio::spawn(writer.run(receiver, stages.clone()));

        let mut poll_result: Option<HlsResult<PollOutcome>> = None;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!("Recording cancelled, stopping.");
                    match writer.await {
                        Ok(Err(e)) => tracing::warn!("Writer stopped with error after cancellation: {e}"),
                        Err(e) => tracing::warn!("Writer task failed after cancellation: {e}"),
                        Ok(Ok(_)) => {}
                    }
                    poller.abort();
                    return Ok(self.summary(RecordOutcome::Cancelled));
                }
                result = &mut poller, if poll_result.is_none() => {
                    // the queue sender is gone with the task, the writer drains what is left
                    let result = result.map_err(HlsError::from).and_then(|r| r);
                    if let Err(e) = &result {
                        tracing::error!("Playlist polling failed: {e}");
                    }
                    poll_result = Some(result);
                }
                result = &mut writer => {
                    let written = result.map_err(HlsError::from).and_then(|r| r);
                    if let Err(e) = written {
                        tracing::error!("Segment writer failed: {e}");
                        stages.cancel();
                        poller.abort();
                        return match poll_result {
                            Some(Err(first)) => Err(first),
                            _ => Err(e),
                        };
                    }

                    let outcome = match poll_result {
                        Some(result) => result?,
                        None => poller.await.map_err(HlsError::from).and_then(|r| r)?,
                    };
                    let summary = self.summary(outcome.into());
                    tracing::info!(
                        "Recording finished: {:?}, {}/{} segments written.",
                        summary.outcome,
                        summary.finished,
                        summary.total
                    );
                    return Ok(summary);
                }
            }
        }
    }

    fn summary(&self, outcome: RecordOutcome) -> RecordSummary {
        RecordSummary {
            outcome,
            total: self.progress.total(),
            finished: self.progress.finished(),
            skipped: self.progress.skipped(),
        }
    }
}
