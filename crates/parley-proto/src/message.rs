//! Session messages and their envelope encoding.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use zerocopy::IntoBytes;

use crate::{
    error::ProtocolError,
    header::{EnvelopeHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE, MessageKind},
};

/// Ordinary ratchet message.
///
/// `counter` is the index within the sender's current sending chain and
/// `previous_counter` the length of the sender's previous sending chain, which
/// lets the receiver buffer keys of the old chain before ratcheting.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetMessage {
    /// Sender's current ratchet public key.
    pub ratchet_key: [u8; 32],
    /// Chain index used for this message.
    pub counter: u32,
    /// Length of the sender's previous sending chain.
    pub previous_counter: u32,
    /// AEAD ciphertext including the tag.
    pub ciphertext: Vec<u8>,
}

impl fmt::Debug for RatchetMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatchetMessage")
            .field("ratchet_key", &format_args!("{:02x?}..", &self.ratchet_key[..4]))
            .field("counter", &self.counter)
            .field("previous_counter", &self.previous_counter)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Initial message carrying everything the responder needs to build a
/// session, plus the first ratchet message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyMessage {
    /// Sender's identity public key.
    pub identity_key: [u8; 32],
    /// Sender's ephemeral (base) public key.
    pub base_key: [u8; 32],
    /// Identifier of the responder's signed pre-key that was used.
    pub signed_pre_key_id: u32,
    /// Identifier of the responder's one-time pre-key, if one was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_key_id: Option<u32>,
    /// Encrypted payload.
    pub message: RatchetMessage,
}

impl fmt::Debug for PreKeyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreKeyMessage")
            .field("identity_key", &format_args!("{:02x?}..", &self.identity_key[..4]))
            .field("base_key", &format_args!("{:02x?}..", &self.base_key[..4]))
            .field("signed_pre_key_id", &self.signed_pre_key_id)
            .field("pre_key_id", &self.pre_key_id)
            .field("message", &self.message)
            .finish()
    }
}

/// Any message a session cipher produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiphertextMessage {
    /// Ordinary ratchet message.
    Ratchet(RatchetMessage),
    /// Initial message.
    PreKey(PreKeyMessage),
}

impl CiphertextMessage {
    /// Envelope kind for this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Ratchet(_) => MessageKind::Ratchet,
            Self::PreKey(_) => MessageKind::PreKey,
        }
    }

    /// The ratchet message, unwrapping an initial message if needed.
    pub fn ratchet_message(&self) -> &RatchetMessage {
        match self {
            Self::Ratchet(message) => message,
            Self::PreKey(message) => &message.message,
        }
    }

    /// Encode into an envelope.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut body = Vec::new();
        match self {
            Self::Ratchet(message) => ciborium::ser::into_writer(message, &mut body),
            Self::PreKey(message) => ciborium::ser::into_writer(message, &mut body),
        }
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

        if body.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: body.len(), max: MAX_PAYLOAD_SIZE });
        }
        let len = u32::try_from(body.len()).map_err(|_| ProtocolError::PayloadTooLarge {
            size: body.len(),
            max: MAX_PAYLOAD_SIZE,
        })?;

        let header = EnvelopeHeader::new(self.kind(), len);
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        buf.put_slice(header.as_bytes());
        buf.put_slice(&body);
        Ok(buf.freeze())
    }

    /// Decode an envelope.
    ///
    /// The input must hold exactly one envelope: missing payload bytes are
    /// [`ProtocolError::Truncated`], extra bytes after the envelope or after
    /// the CBOR body are [`ProtocolError::TrailingBytes`]. Bodies that decode
    /// but differ from their canonical encoding are rejected, so
    /// `encode(decode(bytes)) == bytes` whenever decoding succeeds.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (header, rest) = EnvelopeHeader::parse(bytes)?;
        let len = header.payload_len();

        if rest.len() < len {
            return Err(ProtocolError::Truncated {
                expected: HEADER_SIZE + len,
                actual: bytes.len(),
            });
        }
        if rest.len() > len {
            return Err(ProtocolError::TrailingBytes(rest.len() - len));
        }

        match header.kind()? {
            MessageKind::Ratchet => decode_body(rest).map(Self::Ratchet),
            MessageKind::PreKey => decode_body(rest).map(Self::PreKey),
        }
    }
}

/// Decode exactly one CBOR item spanning the whole payload.
///
/// The body must be the encoding this crate produces, so every message has a
/// single accepted byte form.
fn decode_body<T>(payload: &[u8]) -> Result<T, ProtocolError>
where
    T: Serialize + DeserializeOwned,
{
    let mut cursor = payload;
    let value: T = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
    if !cursor.is_empty() {
        return Err(ProtocolError::TrailingBytes(cursor.len()));
    }

    let mut canonical = Vec::with_capacity(payload.len());
    ciborium::ser::into_writer(&value, &mut canonical)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;
    if canonical != payload {
        return Err(ProtocolError::Decode("non-canonical encoding".to_string()));
    }
    Ok(value)
}

impl From<RatchetMessage> for CiphertextMessage {
    fn from(message: RatchetMessage) -> Self {
        Self::Ratchet(message)
    }
}

impl From<PreKeyMessage> for CiphertextMessage {
    fn from(message: PreKeyMessage) -> Self {
        Self::PreKey(message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::header::MAGIC;

    fn ratchet(counter: u32) -> RatchetMessage {
        RatchetMessage {
            ratchet_key: [7u8; 32],
            counter,
            previous_counter: 3,
            ciphertext: vec![0xAA; 21],
        }
    }

    #[test]
    fn ratchet_message_roundtrip() {
        let message = CiphertextMessage::Ratchet(ratchet(5));
        let encoded = message.encode().unwrap();

        assert_eq!(&encoded[..2], &MAGIC);
        assert_eq!(encoded[3], MessageKind::Ratchet as u8);
        assert_eq!(CiphertextMessage::decode(&encoded).unwrap(), message);
    }

    #[test]
    fn prekey_message_without_one_time_key() {
        let message = CiphertextMessage::PreKey(PreKeyMessage {
            identity_key: [1u8; 32],
            base_key: [2u8; 32],
            signed_pre_key_id: 9,
            pre_key_id: None,
            message: ratchet(0),
        });
        let encoded = message.encode().unwrap();
        let decoded = CiphertextMessage::decode(&encoded).unwrap();

        assert_eq!(decoded, message);
        assert_eq!(decoded.kind(), MessageKind::PreKey);
        assert_eq!(decoded.ratchet_message().counter, 0);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut encoded = CiphertextMessage::Ratchet(ratchet(1)).encode().unwrap().to_vec();
        encoded.push(0);

        assert_eq!(CiphertextMessage::decode(&encoded), Err(ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn bytes_after_body_inside_payload_rejected() {
        let mut encoded = CiphertextMessage::Ratchet(ratchet(1)).encode().unwrap().to_vec();
        let len = u32::from_be_bytes(encoded[4..8].try_into().unwrap()) + 3;
        encoded[4..8].copy_from_slice(&len.to_be_bytes());
        encoded.extend_from_slice(&hex!("deadbe"));

        assert_eq!(CiphertextMessage::decode(&encoded), Err(ProtocolError::TrailingBytes(3)));
    }

    #[test]
    fn non_minimal_integer_rejected() {
        let encoded = CiphertextMessage::Ratchet(ratchet(1)).encode().unwrap().to_vec();
        // Text key "counter" followed by the one-byte integer 1.
        let field = [&[0x67u8][..], &b"counter"[..], &[0x01u8][..]].concat();
        let at = encoded.windows(field.len()).position(|w| w == field).unwrap() + field.len() - 1;

        // Same value, spelled with a trailing one-byte argument (0x18 0x01).
        let mut widened = [&encoded[..at], &[0x18, 0x01][..], &encoded[at + 1..]].concat();
        let len = u32::from_be_bytes(widened[4..8].try_into().unwrap()) + 1;
        widened[4..8].copy_from_slice(&len.to_be_bytes());

        assert!(matches!(CiphertextMessage::decode(&widened), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn truncated_payload_rejected() {
        let encoded = CiphertextMessage::Ratchet(ratchet(1)).encode().unwrap();
        let cut = &encoded[..encoded.len() - 1];

        assert!(matches!(
            CiphertextMessage::decode(cut),
            Err(ProtocolError::Truncated { actual, .. }) if actual == encoded.len() - 1
        ));
    }

    #[test]
    fn kind_mismatch_fails_to_decode() {
        let mut encoded = CiphertextMessage::Ratchet(ratchet(1)).encode().unwrap().to_vec();
        encoded[3] = MessageKind::PreKey as u8;

        assert!(matches!(CiphertextMessage::decode(&encoded), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn debug_hides_ciphertext() {
        let debug = format!("{:?}", ratchet(1));
        assert!(debug.contains("ciphertext_len: 21"));
        assert!(!debug.contains("170"));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            if let Ok(message) = CiphertextMessage::decode(&bytes) {
                prop_assert_eq!(&message.encode().unwrap()[..], &bytes[..]);
            }
        }

        #[test]
        fn encoded_ratchet_messages_decode(
            counter in any::<u32>(),
            previous_counter in any::<u32>(),
            ciphertext in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let message = CiphertextMessage::Ratchet(RatchetMessage {
                ratchet_key: [counter.to_le_bytes()[0]; 32],
                counter,
                previous_counter,
                ciphertext,
            });
            let encoded = message.encode().unwrap();
            prop_assert_eq!(CiphertextMessage::decode(&encoded).unwrap(), message);
        }
    }
}
