pub mod config;
pub mod decrypt;
pub mod error;
pub mod fetch;
pub mod hls;
pub mod pipeline;
pub mod progress;
pub mod util;

pub use config::{RecordConfig, RecordOutput};
pub use error::{HlsError, HlsResult};
pub use pipeline::{RecordOutcome, RecordSummary, Recorder};
pub use progress::Progress;
pub use util::http::HttpClient;
