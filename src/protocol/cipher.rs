//! Rotating XOR frame cipher
//!
//! Outbound frames are ciphered with the session's encryption key, which
//! advances after every send. Inbound frames are deciphered with the
//! server-issued key folded with the client version; that key never rotates.

use crate::protocol::constants::cipher::{KEY_SEED, MIX_MULTIPLIER, PREFIX_LEN, ROTATION_XOR};

/// XOR every byte past the opcode with the key byte for its position
///
/// The transform is its own inverse for a fixed key.
pub fn transform(buffer: &[u8], key: i32) -> Vec<u8> {
    let key = key as u32;
    buffer
        .iter()
        .enumerate()
        .map(|(i, &byte)| {
            if i < PREFIX_LEN {
                byte
            } else {
                byte ^ (key >> ((i % 4) * 8)) as u8
            }
        })
        .collect()
}

/// Advance an encryption key by one step
pub fn rotate_key(key: i32) -> i32 {
    let mut key = (key as u32).wrapping_mul(MIX_MULTIPLIER);
    key = ((key >> 24) ^ key).wrapping_mul(MIX_MULTIPLIER) ^ ROTATION_XOR;
    key = ((key >> 13) ^ key).wrapping_mul(MIX_MULTIPLIER);
    ((key >> 15) ^ key) as i32
}

/// MurmurHash2, 32-bit
pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    let m = MIX_MULTIPLIER;
    let mut h = seed ^ data.len() as u32;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(m);
        k ^= k >> 24;
        k = k.wrapping_mul(m);
        h = h.wrapping_mul(m) ^ k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(m);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(m);
    h ^ (h >> 15)
}

/// Extract the host fragment mixed into the encryption key
///
/// Arena urls look like `wss://live-arena-xyz.agar.io:443`; when that
/// pattern is present it wins, otherwise the plain url host is used.
pub fn host_fragment(url: &str) -> &str {
    if let Some(start) = url.find("live-arena-") {
        let rest = &url[start..];
        let word_end = rest["live-arena-".len()..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .map_or(rest.len(), |i| i + "live-arena-".len());
        if rest[word_end..].starts_with(".agar.io") {
            return &rest[..word_end + ".agar.io".len()];
        }
    }

    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host_end = without_scheme
        .find(|c: char| c == '/' || c == ':' || c == '?')
        .unwrap_or(without_scheme.len());
    &without_scheme[..host_end]
}

/// Derive the outbound key from the server nonce
pub fn derive_encryption_key(host_fragment: &str, nonce: &str) -> i32 {
    let mut material = Vec::with_capacity(host_fragment.len() + nonce.len());
    material.extend_from_slice(host_fragment.as_bytes());
    material.extend_from_slice(nonce.as_bytes());
    murmur2(&material, KEY_SEED) as i32
}

/// Per-session key state
///
/// A zero key means the exchange has not happened yet and frames pass
/// through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCipher {
    encryption_key: i32,
    decryption_key: i32,
    client_version: u32,
}

impl SessionCipher {
    pub fn new(client_version: u32) -> Self {
        Self {
            client_version,
            ..Default::default()
        }
    }

    /// Install keys from a key-exchange frame
    pub fn install(&mut self, server_key: i32, host_fragment: &str, nonce: &str) {
        self.decryption_key = server_key;
        self.encryption_key = derive_encryption_key(host_fragment, nonce);
    }

    /// Cipher an outbound frame and advance the key
    pub fn encrypt(&mut self, frame: &[u8]) -> Vec<u8> {
        if self.encryption_key == 0 {
            return frame.to_vec();
        }
        let out = transform(frame, self.encryption_key);
        self.encryption_key = rotate_key(self.encryption_key);
        out
    }

    /// Decipher an inbound frame
    pub fn decrypt(&self, frame: &[u8]) -> Vec<u8> {
        if self.decryption_key == 0 {
            return frame.to_vec();
        }
        transform(frame, self.inbound_key())
    }

    /// Key applied to inbound frames
    pub fn inbound_key(&self) -> i32 {
        self.decryption_key ^ self.client_version as i32
    }

    /// Raw server-issued key (echoed in move frames)
    pub fn decryption_key(&self) -> i32 {
        self.decryption_key
    }

    pub fn encryption_key(&self) -> i32 {
        self.encryption_key
    }

    pub fn reset(&mut self) {
        self.encryption_key = 0;
        self.decryption_key = 0;
    }
}
