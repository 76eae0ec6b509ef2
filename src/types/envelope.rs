//! Message envelope: one decoded server push.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::snapshot::{StatisticsSnapshot, json_kind, lookup};
use crate::{FeedError, Result};

/// Servers differ on padding, so accept both.
const FRAME_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Opaque encoded image bytes (JPEG in every known deployment).
///
/// The core never inspects these bytes; they are passed unmodified to an
/// [`ImageDecoder`](crate::projectors::ImageDecoder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: Arc<[u8]>,
}

impl EncodedFrame {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Decode the wire form: base64, optionally prefixed with a
    /// `data:image/jpeg;base64,` URL header.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let payload = match encoded.strip_prefix("data:") {
            Some(rest) => match rest.split_once("base64,") {
                Some((_, data)) => data,
                None => return Err(FeedError::frame_decode("data URL without a base64 payload")),
            },
            None => encoded,
        };

        let decoded = if payload.bytes().any(|b| b.is_ascii_whitespace()) {
            let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            FRAME_BASE64.decode(compact)
        } else {
            FRAME_BASE64.decode(payload)
        };
        let bytes =
            decoded.map_err(|e| FeedError::frame_decode(format!("invalid base64: {}", e)))?;

        Ok(Self::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One decoded inbound message.
///
/// Cheap to clone: both payloads are reference counted, so every subscriber
/// sees the same allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    /// Encoded video frame, absent on stats-only pushes.
    pub frame: Option<EncodedFrame>,

    /// Normalized statistics, absent on frame-only pushes.
    pub stats: Option<Arc<StatisticsSnapshot>>,
}

impl Envelope {
    /// Decode a raw transport payload.
    ///
    /// Only unparseable JSON or a non-object document fails. A bad `frame` or
    /// `stats` field is dropped with a warning and the rest of the envelope is kept.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| FeedError::decode("envelope", e.to_string()))?;
        Self::from_value(&value)
    }

    /// Decode from an already-parsed JSON document.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            FeedError::decode("envelope", format!("expected an object, found {}", json_kind(value)))
        })?;

        let frame = match lookup(object, &["frame"]) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => match EncodedFrame::from_base64(s) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable frame field");
                    None
                }
            },
            Some(other) => {
                warn!(kind = json_kind(other), "Dropping frame field of unexpected type");
                None
            }
        };

        let stats = match lookup(object, &["stats"]) {
            None | Some(Value::Null) => None,
            Some(raw) => match StatisticsSnapshot::from_json(raw) {
                Ok(snapshot) => Some(Arc::new(snapshot)),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed stats field");
                    None
                }
            },
        };

        Ok(Self { frame, stats })
    }

    /// An inert envelope changes no subscriber state.
    pub fn is_inert(&self) -> bool {
        self.frame.is_none() && self.stats.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassCounts, StatsShape};

    #[test]
    fn decodes_frame_and_stats() {
        let payload = br#"{"frame":"AQID","stats":{"ActiveVehicleCounts":{"Car":5,"Bus":0,"Truck":2},"TotalActiveVehicles":9}}"#;
        let envelope = Envelope::decode(payload).unwrap();

        assert_eq!(envelope.frame.as_ref().map(EncodedFrame::as_bytes), Some(&[1u8, 2, 3][..]));
        let stats = envelope.stats.expect("stats present");
        assert_eq!(stats.vehicle_counts, ClassCounts::new(5, 0, 2));
        assert_eq!(stats.total_vehicles, 9);
        assert_eq!(stats.shape, StatsShape::Flat);
    }

    #[test]
    fn empty_object_is_inert() {
        let envelope = Envelope::decode(b"{}").unwrap();
        assert!(envelope.is_inert());

        let envelope = Envelope::decode(br#"{"frame":null,"stats":null,"extra":1}"#).unwrap();
        assert!(envelope.is_inert());
    }

    #[test]
    fn malformed_json_fails() {
        assert!(matches!(Envelope::decode(b"not json"), Err(FeedError::Decode { .. })));
        assert!(matches!(Envelope::decode(b"[1,2]"), Err(FeedError::Decode { .. })));
        assert!(matches!(Envelope::decode(b""), Err(FeedError::Decode { .. })));
    }

    #[test]
    fn bad_frame_keeps_stats() {
        let payload = br#"{"frame":"***not base64***","stats":{"TotalVehicles":3}}"#;
        let envelope = Envelope::decode(payload).unwrap();

        assert!(envelope.frame.is_none());
        assert_eq!(envelope.stats.unwrap().total_vehicles, 3);
    }

    #[test]
    fn bad_stats_keeps_frame() {
        let payload = br#"{"frame":"AQID","stats":"oops"}"#;
        let envelope = Envelope::decode(payload).unwrap();

        assert!(envelope.stats.is_none());
        assert_eq!(envelope.frame.unwrap().len(), 3);
    }

    #[test]
    fn frame_accepts_data_url_and_unpadded_input() {
        let frame = EncodedFrame::from_base64("data:image/jpeg;base64,AQIDBA==").unwrap();
        assert_eq!(frame.as_bytes(), &[1, 2, 3, 4]);

        let frame = EncodedFrame::from_base64("AQIDBA").unwrap();
        assert_eq!(frame.as_bytes(), &[1, 2, 3, 4]);

        let frame = EncodedFrame::from_base64("AQID\nBA==").unwrap();
        assert_eq!(frame.as_bytes(), &[1, 2, 3, 4]);

        assert!(EncodedFrame::from_base64("data:image/jpeg,raw").is_err());
    }
}
