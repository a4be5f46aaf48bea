mod duration;

use std::time::Duration;

use clap::Parser;
use duration::RecordDuration;
use hlsrec::{util::http::DEFAULT_USER_AGENT, RecordConfig, RecordOutput, Recorder};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// HTTP Live Streaming (HLS) recorder
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct RecordArgs {
    /// Recording duration, e.g. "90", "45s" or "1h30m". 0 records until the playlist ends.
    #[clap(short = 't', long, default_value = "0")]
    duration: RecordDuration,

    /// Use local time to track duration instead of supplied metadata
    #[clap(short = 'l', long)]
    local_time: bool,

    /// User-Agent for HTTP client
    #[clap(long = "ua", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Timeout seconds for each playlist/key/segment request
    #[clap(long)]
    timeout: Option<u64>,

    /// Cookies sent to the playlist host, separated by ";"
    #[clap(long)]
    cookies: Option<String>,

    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Media playlist url, must begin with http/https
    playlist_url: String,

    /// Output file path, "-" writes to stdout
    output: String,
}

impl RecordArgs {
    fn config(&self) -> anyhow::Result<RecordConfig> {
        let cookies = self
            .cookies
            .as_deref()
            .map(|c| c.split(';').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(
            RecordConfig::new(&self.playlist_url, RecordOutput::from_arg(&self.output))?
                .with_duration(self.duration.0)
                .with_local_time(self.local_time)
                .with_user_agent(self.user_agent.clone())
                .with_timeout(self.timeout.map(Duration::from_secs))
                .with_cookies(cookies),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = RecordArgs::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .try_from_env()
                .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into())),
        )
        .with_writer(std::io::stderr)
        .init();

    eprintln!(
        "hlsrec {} - HTTP Live Streaming (HLS) recorder",
        env!("CARGO_PKG_VERSION")
    );

    let config = args.config()?;
    let token = CancellationToken::new();

    let ctrlc_token = token.clone();
    tokio::spawn(async move {
        // wait for the first ctrl-c to stop recording
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Ctrl-C received, stopping recorder.");
        ctrlc_token.cancel();

        // wait for the second ctrl-c to force exit
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received again, force exit.");
            std::process::exit(1);
        }
    });

    let summary = Recorder::new(config).run(token).await?;
    tracing::info!(
        "Done: {:?}, {} of {} segments written, {} skipped.",
        summary.outcome,
        summary.finished,
        summary.total,
        summary.skipped
    );

    Ok(())
}
