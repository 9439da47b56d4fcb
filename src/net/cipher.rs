//! Per-session AEAD state.
//!
//! A [`SessionCipher`] couples the ChaCha20-Poly1305 key with the 12-byte
//! write nonce so the increment-then-encrypt sequence cannot be bypassed:
//! [`seal`](SessionCipher::seal) advances the nonce before every encryption
//! and there is no other way to encrypt. Decryption takes the nonce from
//! the incoming frame and never touches the local counter, so one cipher
//! value serves both directions of a session.
//!
//! On-wire sealed layout: `nonce (12) || tag (16) || ciphertext`.

use crate::net::NetError;
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag};

/// Session key length in bytes.
pub const KEY_LEN: usize = 32;
/// AEAD nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// ChaCha20-Poly1305 state bound to one session.
#[derive(Clone)]
pub struct SessionCipher {
    cipher: ChaCha20Poly1305,
    nonce: [u8; NONCE_LEN],
}

impl SessionCipher {
    /// Builds cipher state from a raw key and the initial write nonce.
    pub fn new(key: &[u8; KEY_LEN], nonce: [u8; NONCE_LEN]) -> Self {
        SessionCipher {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
            nonce,
        }
    }

    /// Little-endian increment with carry, starting from the last byte.
    /// Wrap-around is permitted; the counter width outlives any session.
    fn increment_nonce(&mut self) {
        for b in self.nonce.iter_mut().rev() {
            let (v, carry) = b.overflowing_add(1);
            *b = v;
            if !carry {
                break;
            }
        }
    }

    /// Encrypts `plaintext` with an empty AAD, advancing the nonce first.
    /// Returns the sealed wire blob `nonce || tag || ciphertext`.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, NetError> {
        self.increment_nonce();
        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&self.nonce), b"", &mut buffer)
            .map_err(|_| NetError::CipherFail)?;

        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&tag);
        out.extend_from_slice(&buffer);
        Ok(out)
    }

    /// Opens a sealed wire blob. Frames shorter than `nonce + tag` and any
    /// authentication failure report [`NetError::DecryptionFail`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, NetError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(NetError::DecryptionFail);
        }
        let (nonce, rest) = sealed.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| NetError::DecryptionFail)?;
        Ok(buffer)
    }
}
