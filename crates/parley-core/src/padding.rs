//! Plaintext padding.
//!
//! Hides exact message lengths by rounding plaintexts up to a block
//! multiple: the plaintext, one `0x80` marker byte, then zeros.

use crate::error::SessionError;

/// Padded plaintexts are a multiple of this many bytes.
pub const PADDING_BLOCK_SIZE: usize = 160;

const MARKER: u8 = 0x80;

/// Pad `plaintext` to the next block multiple. Always adds at least the
/// marker byte.
pub fn pad(plaintext: &[u8]) -> Vec<u8> {
    let padded_len = (plaintext.len() + 1).div_ceil(PADDING_BLOCK_SIZE) * PADDING_BLOCK_SIZE;
    let mut padded = Vec::with_capacity(padded_len);
    padded.extend_from_slice(plaintext);
    padded.push(MARKER);
    padded.resize(padded_len, 0);
    padded
}

/// Strip padding added by [`pad`].
pub fn unpad(padded: &[u8]) -> Result<&[u8], SessionError> {
    let marker = padded.iter().rposition(|&b| b != 0).ok_or(SessionError::InvalidPadding)?;
    if padded[marker] != MARKER {
        return Err(SessionError::InvalidPadding);
    }
    Ok(&padded[..marker])
}
