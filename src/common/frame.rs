use bytes::{BufMut, Bytes, BytesMut};

use crate::common::error::{ControllerError, ControllerResult};

const SEPARATOR: u8 = b' ';

/// One control-bus message: `topic SP verb SP payload`.
///
/// Topic and verb are non-empty and whitespace free; the payload is every
/// byte after the second separator and may itself contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub verb: String,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(topic: impl Into<String>, verb: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            verb: verb.into(),
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> ControllerResult<Bytes> {
        encode_parts(&self.topic, &self.verb, &self.payload)
    }

    pub fn decode(raw: Bytes) -> ControllerResult<Self> {
        let first = raw
            .iter()
            .position(|b| *b == SEPARATOR)
            .ok_or_else(|| ControllerError::InvalidFrame("missing verb".to_string()))?;
        let topic = field_str(&raw[..first], "topic")?;

        let rest = &raw[first + 1..];
        let (verb, payload) = match rest.iter().position(|b| *b == SEPARATOR) {
            Some(second) => (
                field_str(&rest[..second], "verb")?,
                raw.slice(first + 1 + second + 1..),
            ),
            None => (field_str(rest, "verb")?, Bytes::new()),
        };

        Ok(Self { topic, verb, payload })
    }
}

/// Encode a frame without building an owned [`Frame`] first.
pub fn encode_parts(topic: &str, verb: &str, payload: &[u8]) -> ControllerResult<Bytes> {
    check_token(topic, "topic")?;
    check_token(verb, "verb")?;

    let mut buf = BytesMut::with_capacity(topic.len() + verb.len() + payload.len() + 2);
    buf.put_slice(topic.as_bytes());
    buf.put_u8(SEPARATOR);
    buf.put_slice(verb.as_bytes());
    buf.put_u8(SEPARATOR);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

fn check_token(value: &str, what: &str) -> ControllerResult<()> {
    if value.is_empty() {
        return Err(ControllerError::InvalidFrame(format!("empty {}", what)));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ControllerError::InvalidFrame(format!(
            "{} {:?} contains whitespace",
            what, value
        )));
    }
    Ok(())
}

fn field_str(raw: &[u8], what: &str) -> ControllerResult<String> {
    let value = std::str::from_utf8(raw)
        .map_err(|_| ControllerError::InvalidFrame(format!("{} is not valid utf-8", what)))?;
    check_token(value, what)?;
    Ok(value.to_string())
}
