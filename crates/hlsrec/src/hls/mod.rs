pub mod dedup;
pub mod playlist;
pub mod poller;
pub mod segment;

pub use dedup::DedupWindow;
pub use m3u8_rs;
pub use playlist::{load_playlist, MasterPlaylist, MediaPlaylist, Playlist, PlaylistFetch};
pub use poller::{DurationMode, PlaylistPoller, PollCycle, PollOutcome};
pub use segment::{EncryptionDescriptor, SegmentDescriptor};
