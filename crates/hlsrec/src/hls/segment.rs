use std::{sync::Arc, time::Duration};

/// Method text identifying AES-128 CBC encrypted segments.
pub const AES_128: &str = "AES-128";

/// Encryption parameters of a segment, shared by every segment the key applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionDescriptor {
    /// Raw `METHOD` attribute. Compared case-insensitively.
    pub method: String,
    /// Absolute URI of the key file.
    pub uri: String,
    /// Explicit initialization vector, if the playlist declares one.
    pub iv: Option<[u8; 16]>,
}

impl EncryptionDescriptor {
    pub fn is_aes128(&self) -> bool {
        self.method.eq_ignore_ascii_case(AES_128)
    }
}

/// A segment discovered by the poller, waiting to be fetched.
#[derive(Debug, Clone)]
pub struct SegmentDescriptor {
    pub uri: String,
    /// Media sequence number: playlist base sequence plus the segment position.
    pub sequence: u64,
    pub key: Option<Arc<EncryptionDescriptor>>,
    /// Recorded duration once this segment is included.
    pub recorded: Duration,
}
