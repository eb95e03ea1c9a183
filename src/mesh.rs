//! The on-mesh envelope format.
//!
//! Every packet crossing the broker is wrapped in a small JSON object with a
//! sender identifier and the raw DNS bytes. The byte field is base64-encoded,
//! which is what Go's `encoding/json` emits for `[]byte`, so bridges written
//! in either language share a mesh.

use serde::{Deserialize, Serialize};

/// A packet as published to and read from the broker topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshEnvelope {
    /// Identifier of the bridge that captured the packet.
    #[serde(rename = "Sender")]
    pub sender: String,
    /// The original DNS message bytes, unmodified.
    #[serde(rename = "Data", with = "base64_bytes")]
    pub data: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let envelope = MeshEnvelope {
            sender: "bridge-a".to_string(),
            data: vec![0x00, 0x01, 0xff, 0x80],
        };

        let json = serde_json::to_vec(&envelope).unwrap();
        let decoded: MeshEnvelope = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn wire_format_matches_go_encoding() {
        let envelope = MeshEnvelope {
            sender: "bridge-a".to_string(),
            data: b"hello".to_vec(),
        };

        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["Sender"], "bridge-a");
        // base64("hello")
        assert_eq!(value["Data"], "aGVsbG8=");
    }

    #[test]
    fn decodes_go_produced_payload() {
        let payload = br#"{"Sender":"host-7","Data":"AAEC"}"#;
        let envelope: MeshEnvelope = serde_json::from_slice(payload).unwrap();
        assert_eq!(envelope.sender, "host-7");
        assert_eq!(envelope.data, vec![0x00, 0x01, 0x02]);
    }

    #[test]
    fn rejects_invalid_base64() {
        let payload = br#"{"Sender":"x","Data":"!!!not-base64!!!"}"#;
        assert!(serde_json::from_slice::<MeshEnvelope>(payload).is_err());
    }

    #[test]
    fn data_bytes_are_preserved_exactly() {
        let data: Vec<u8> = (0..=255).collect();
        let envelope = MeshEnvelope {
            sender: "b".to_string(),
            data: data.clone(),
        };
        let json = serde_json::to_vec(&envelope).unwrap();
        let decoded: MeshEnvelope = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded.data, data);
    }
}
