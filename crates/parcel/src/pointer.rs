//! Attachment pointers as received from the persistence layer.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(String);

impl AttachmentId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for AttachmentId {
    fn from(id: &str) -> Self { Self(id.to_owned()) }
}

impl From<String> for AttachmentId {
    fn from(id: String) -> Self { Self(id) }
}

/// Remote location and key material for one encrypted attachment.
///
/// Binary fields are base64 in serialized form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPointer {
    pub id:           AttachmentId,
    /// Server-side key of the ciphertext.
    pub remote_key:   String,
    /// Pre-signed resource path; takes precedence over `remote_key` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_key:   Option<String>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub key:          Option<Vec<u8>>,
    #[serde(with = "base64_bytes")]
    pub digest:       Vec<u8>,
    /// Declared plaintext size; doubles as the download size estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size:         Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name:    Option<String>,
}

impl AttachmentPointer {
    pub fn new(id: impl Into<String>, remote_key: impl Into<String>, digest: Vec<u8>) -> Self {
        Self {
            id: AttachmentId::new(id),
            remote_key: remote_key.into(),
            signed_key: None,
            key: None,
            digest,
            size: None,
            content_type: None,
            file_name: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_signed_key(mut self, signed_key: impl Into<String>) -> Self {
        self.signed_key = Some(signed_key.into());
        self
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> { serde_json::from_str(json) }

    pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string_pretty(self) }
}

impl fmt::Debug for AttachmentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentPointer")
            .field("id", &self.id)
            .field("remote_key", &self.remote_key)
            .field("signed_key", &self.signed_key.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("digest", &self.digest.len())
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish()
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_keeps_binary_fields() {
        let pointer = AttachmentPointer::new("att-1", "4711", vec![0xde, 0xad])
            .with_key(vec![1, 2, 3])
            .with_size(42);
        let json = pointer.to_json().unwrap();
        assert!(json.contains("\"3q0=\""));
        assert_eq!(AttachmentPointer::from_json(&json).unwrap(), pointer);
    }

    #[test]
    fn test_missing_optional_fields() {
        let pointer = AttachmentPointer::from_json(r#"{"id":"a","remote_key":"9","digest":"AA=="}"#).unwrap();
        assert_eq!(pointer.key, None);
        assert_eq!(pointer.size, None);
        assert_eq!(pointer.digest, vec![0]);
    }

    #[test]
    fn test_rejects_bad_base64() {
        assert!(AttachmentPointer::from_json(r#"{"id":"a","remote_key":"9","digest":"!!"}"#).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let pointer = AttachmentPointer::new("a", "9", vec![]).with_key(vec![0x41; 64]);
        let debug = format!("{pointer:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("65, 65"));
    }
}
