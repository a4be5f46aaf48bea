use std::{collections::HashMap, sync::Arc};

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};

use crate::{
    error::{HlsError, HlsResult},
    hls::segment::SegmentDescriptor,
    util::http::HttpClient,
};

const BLOCK_SIZE: usize = 16;

/// Keys fetched so far, by key URI. Entries live for the whole recording.
///
/// Only the segment fetcher owns a cache, so no locking is involved. Failed fetches are
/// not cached and will be retried by the next segment using the same key.
pub struct KeyCache {
    client: HttpClient,
    keys: HashMap<String, Arc<[u8]>>,
}

impl KeyCache {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            keys: HashMap::new(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> HlsResult<Arc<[u8]>> {
        if let Some(key) = self.keys.get(uri) {
            return Ok(key.clone());
        }

        tracing::debug!("Fetching key {uri}");
        let response = self.client.get(uri).send().await?;
        if !response.status().is_success() {
            return Err(HlsError::HttpError(response.status()));
        }
        let key: Arc<[u8]> = response.bytes().await?.to_vec().into();

        self.keys.insert(uri.to_string(), key.clone());
        Ok(key)
    }

    pub fn insert(&mut self, uri: impl Into<String>, key: impl Into<Arc<[u8]>>) {
        self.keys.insert(uri.into(), key.into());
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Segment payload after the decryption step.
#[derive(Debug)]
pub enum Decrypted {
    /// The segment was not AES-128 encrypted and is passed through.
    Clear(Vec<u8>),
    Decrypted(Vec<u8>),
    /// Decryption was impossible. `data` holds the bytes exactly as downloaded.
    Degraded { data: Vec<u8>, reason: HlsError },
}

impl Decrypted {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Clear(data) | Self::Decrypted(data) | Self::Degraded { data, .. } => data,
        }
    }
}

pub struct SegmentDecryptor {
    keys: KeyCache,
}

impl SegmentDecryptor {
    pub fn new(client: HttpClient) -> Self {
        Self::with_cache(KeyCache::new(client))
    }

    pub fn with_cache(keys: KeyCache) -> Self {
        Self { keys }
    }

    pub async fn decrypt(&mut self, mut data: Vec<u8>, segment: &SegmentDescriptor) -> Decrypted {
        let Some(key) = segment.key.as_ref().filter(|k| k.is_aes128()) else {
            return Decrypted::Clear(data);
        };

        let key_bytes = match self.keys.get(&key.uri).await {
            Ok(key_bytes) => key_bytes,
            Err(reason) => {
                tracing::warn!("Failed to fetch key {}: {reason}", key.uri);
                return Decrypted::Degraded { data, reason };
            }
        };

        let iv = key.iv.unwrap_or_else(|| derive_iv(segment.sequence));
        match decrypt_aes128_cbc(&mut data, &key_bytes, &iv) {
            Ok(()) => Decrypted::Decrypted(data),
            Err(reason) => {
                tracing::warn!("Failed to decrypt {}: {reason}", segment.uri);
                Decrypted::Degraded { data, reason }
            }
        }
    }
}

/// IV used when the playlist does not declare one: eight zero bytes followed by the
/// media sequence number in big-endian order.
pub fn derive_iv(sequence: u64) -> [u8; 16] {
    let mut iv = [0u8; BLOCK_SIZE];
    iv[8..].copy_from_slice(&sequence.to_be_bytes());
    iv
}

/// Decrypts `data` in place. Padding is left untouched.
///
/// `data` is not modified when an error is returned.
pub fn decrypt_aes128_cbc(data: &mut [u8], key: &[u8], iv: &[u8; 16]) -> HlsResult<()> {
    let key: &[u8; 16] = key
        .try_into()
        .map_err(|_| HlsError::InvalidAes128Key(key.len()))?;
    if data.len() % BLOCK_SIZE != 0 {
        return Err(HlsError::UnalignedCiphertext(data.len()));
    }

    let len = data.len();
    cbc::Decryptor::<aes::Aes128>::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| HlsError::UnalignedCiphertext(len))?;
    Ok(())
}
