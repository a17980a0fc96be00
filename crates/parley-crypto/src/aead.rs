//! Authenticated encryption with XChaCha20-Poly1305.
//!
//! The nonce comes from the message key itself. Message keys are single-use,
//! so a (key, nonce) pair is never repeated.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{error::CryptoError, kdf::MessageKey};

/// Poly1305 tag size appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under a message key, binding `associated_data`.
pub fn seal(
    message_key: &MessageKey,
    associated_data: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(message_key.cipher_key()));
    let payload = Payload { msg: plaintext, aad: associated_data };
    cipher
        .encrypt(XNonce::from_slice(message_key.nonce()), payload)
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt and authenticate `ciphertext` under a message key.
///
/// Any tag mismatch, including one caused by altered associated data, fails
/// with [`CryptoError::AuthenticationFailed`].
pub fn open(
    message_key: &MessageKey,
    associated_data: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(message_key.cipher_key()));
    let payload = Payload { msg: ciphertext, aad: associated_data };
    cipher
        .decrypt(XNonce::from_slice(message_key.nonce()), payload)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
