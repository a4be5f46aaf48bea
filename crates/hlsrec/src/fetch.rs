use std::{sync::Arc, time::Duration};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    decrypt::SegmentDecryptor,
    error::{HlsError, HlsResult},
    hls::segment::SegmentDescriptor,
    progress::Progress,
    util::http::HttpClient,
};

#[derive(Debug)]
pub enum SkipReason {
    Status(reqwest::StatusCode),
    Transport(reqwest::Error),
}

/// Result of handling one queued segment.
#[derive(Debug)]
pub enum SegmentOutcome {
    Appended {
        bytes: usize,
        /// The segment was written without successful decryption.
        degraded: bool,
    },
    /// Download failed. Nothing was written.
    Skipped(SkipReason),
    /// Cancelled while downloading. Nothing was written.
    Discarded,
}

/// Downloads queued segments and appends them to `output` in queue order.
pub struct SegmentWriter<W> {
    client: HttpClient,
    decryptor: SegmentDecryptor,
    output: W,

    limit: Option<Duration>,
    progress: Arc<Progress>,
}

impl<W> SegmentWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(client: HttpClient, output: W) -> Self {
        Self {
            decryptor: SegmentDecryptor::new(client.clone()),
            client,
            output,
            limit: None,
            progress: Arc::new(Progress::new()),
        }
    }

    /// Recording limit, only used for progress messages.
    pub fn with_limit(mut self, limit: Option<Duration>) -> Self {
        self.limit = limit.filter(|l| !l.is_zero());
        self
    }

    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Consumes the queue until it is closed and drained, or until `token` is cancelled.
    /// Returns the output after flushing it.
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<SegmentDescriptor>,
        token: CancellationToken,
    ) -> HlsResult<W> {
        loop {
            let segment = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                segment = receiver.recv() => match segment {
                    Some(segment) => segment,
                    None => break,
                },
            };

            self.consume(&segment, &token).await?;
        }

        self.output.flush().await.map_err(HlsError::OutputWrite)?;
        Ok(self.output)
    }

    /// Downloads, decrypts and appends a single segment.
    ///
    /// Only output failures are returned as errors, download failures skip the segment.
    pub async fn consume(
        &mut self,
        segment: &SegmentDescriptor,
        token: &CancellationToken,
    ) -> HlsResult<SegmentOutcome> {
        let response = match self.client.get(&segment.uri).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to download {}: {e}", segment.uri);
                self.progress.skip();
                return Ok(SegmentOutcome::Skipped(SkipReason::Transport(e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Received HTTP {status} for {}", segment.uri);
            self.progress.skip();
            return Ok(SegmentOutcome::Skipped(SkipReason::Status(status)));
        }

        let data = match response.bytes().await {
            Ok(data) => data.to_vec(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", segment.uri);
                self.progress.skip();
                return Ok(SegmentOutcome::Skipped(SkipReason::Transport(e)));
            }
        };

        if token.is_cancelled() {
            return Ok(SegmentOutcome::Discarded);
        }

        let decrypted = self.decryptor.decrypt(data, segment).await;
        let degraded = decrypted.is_degraded();
        let data = decrypted.into_bytes();

        self.output
            .write_all(&data)
            .await
            .map_err(HlsError::OutputWrite)?;
        self.output.flush().await.map_err(HlsError::OutputWrite)?;

        let finished = self.progress.appended();
        let total = self.progress.total();
        tracing::info!("Downloaded {}", segment.uri);
        match self.limit {
            Some(limit) => tracing::info!(
                "Recorded {:?} of {limit:?} ({finished}/{total} segments)",
                segment.recorded
            ),
            None => tracing::info!(
                "Recorded {:?} ({finished}/{total} segments)",
                segment.recorded
            ),
        }

        Ok(SegmentOutcome::Appended {
            bytes: data.len(),
            degraded,
        })
    }
}
