//! Inbound message shape as delivered by the Baileys socket layer.
//!
//! Only the fields the pipeline reads are typed; everything else stays in
//! the original JSON which travels along as `raw_message`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protobuf `Long` values arrive as numbers, strings, or `{low, high}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LongValue {
    /// Plain JSON number
    Number(u64),
    /// Decimal string
    Text(String),
    /// long.js object
    Long {
        /// Low 32 bits
        low: i64,
        /// High 32 bits
        high: i64,
    },
}

impl LongValue {
    /// Numeric value, if it can be represented
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            LongValue::Number(n) => Some(*n),
            LongValue::Text(s) => s.trim().parse().ok(),
            LongValue::Long { low, high } => {
                let low = (*low as u64) & 0xFFFF_FFFF;
                let high = (*high as u64) & 0xFFFF_FFFF;
                Some((high << 32) | low)
            }
        }
    }
}

/// A single upserted message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Addressing key
    #[serde(default)]
    pub key: Option<MessageKey>,
    /// Payload; exactly one content variant is expected
    #[serde(default)]
    pub message: Option<MessageContent>,
    /// Seconds since epoch
    #[serde(default)]
    pub message_timestamp: Option<LongValue>,
    /// Sender display name
    #[serde(default)]
    pub push_name: Option<String>,
}

impl RawMessage {
    /// Remote conversation JID
    #[must_use]
    pub fn remote_jid(&self) -> Option<&str> {
        self.key.as_ref()?.remote_jid.as_deref()
    }

    /// Whether this account sent the message
    #[must_use]
    pub fn from_me(&self) -> bool {
        self.key.as_ref().is_some_and(|k| k.from_me)
    }

    /// Message id assigned by the network
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.key.as_ref()?.id.as_deref()
    }

    /// Timestamp in seconds, when present and sane
    #[must_use]
    pub fn timestamp_secs(&self) -> Option<i64> {
        self.message_timestamp
            .as_ref()
            .and_then(LongValue::as_u64)
            .filter(|t| *t > 0)
            .and_then(|t| i64::try_from(t).ok())
    }
}

/// Message addressing key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Chat JID
    #[serde(default)]
    pub remote_jid: Option<String>,
    /// Sent by this account
    #[serde(default)]
    pub from_me: bool,
    /// Message id
    #[serde(default)]
    pub id: Option<String>,
    /// Author inside a group or broadcast
    #[serde(default)]
    pub participant: Option<String>,
}

/// Content variants. Unknown variants land in `other`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    /// Plain text
    #[serde(default)]
    pub conversation: Option<String>,
    /// Text with link preview / quote
    #[serde(default)]
    pub extended_text_message: Option<ExtendedText>,
    /// Image
    #[serde(default)]
    pub image_message: Option<MediaPayload>,
    /// Video
    #[serde(default)]
    pub video_message: Option<MediaPayload>,
    /// Audio or voice note
    #[serde(default)]
    pub audio_message: Option<MediaPayload>,
    /// Sticker
    #[serde(default)]
    pub sticker_message: Option<MediaPayload>,
    /// Document
    #[serde(default)]
    pub document_message: Option<MediaPayload>,
    /// Contact card
    #[serde(default)]
    pub contact_message: Option<ContactPayload>,
    /// Location pin
    #[serde(default)]
    pub location_message: Option<LocationPayload>,
    /// Handshake / history-sync control
    #[serde(default)]
    pub protocol_message: Option<Value>,
    /// Group key distribution
    #[serde(default)]
    pub sender_key_distribution_message: Option<Value>,
    /// Device sync of messages sent from another device
    #[serde(default)]
    pub device_sent_message: Option<Value>,
    /// Per-message context metadata
    #[serde(default)]
    pub message_context_info: Option<Value>,
    /// Anything not modelled above
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl MessageContent {
    /// Whether one of the nine recognised variants is present
    #[must_use]
    pub fn has_known_payload(&self) -> bool {
        self.conversation.is_some()
            || self.extended_text_message.is_some()
            || self.image_message.is_some()
            || self.video_message.is_some()
            || self.audio_message.is_some()
            || self.sticker_message.is_some()
            || self.document_message.is_some()
            || self.contact_message.is_some()
            || self.location_message.is_some()
    }

    /// Whether the only recognised variants are text and none of it has
    /// anything but whitespace
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        let has_text = self.conversation.is_some() || self.extended_text_message.is_some();
        let has_other = self.image_message.is_some()
            || self.video_message.is_some()
            || self.audio_message.is_some()
            || self.sticker_message.is_some()
            || self.document_message.is_some()
            || self.contact_message.is_some()
            || self.location_message.is_some();
        has_text
            && !has_other
            && [
                self.conversation.as_deref(),
                self.extended_text_message
                    .as_ref()
                    .and_then(|e| e.text.as_deref()),
            ]
            .into_iter()
            .flatten()
            .all(|text| text.trim().is_empty())
    }

    /// Variant names outside the recognised set, excluding null entries
    pub fn unknown_variants(&self) -> impl Iterator<Item = &str> {
        self.other
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.as_str())
    }
}

/// `extendedTextMessage`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedText {
    /// Body text
    #[serde(default)]
    pub text: Option<String>,
    /// Link preview URL
    #[serde(default)]
    pub matched_text: Option<String>,
}

/// Fields shared by image/video/audio/sticker/document payloads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    /// CDN URL
    #[serde(default)]
    pub url: Option<String>,
    /// Path usable with the media key when no URL is present
    #[serde(default)]
    pub direct_path: Option<String>,
    /// MIME type
    #[serde(default)]
    pub mimetype: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub file_length: Option<LongValue>,
    /// Base64 SHA-256 of the plaintext
    #[serde(default)]
    pub file_sha256: Option<String>,
    /// Base64 media key
    #[serde(default)]
    pub media_key: Option<String>,
    /// Pixel width
    #[serde(default)]
    pub width: Option<u32>,
    /// Pixel height
    #[serde(default)]
    pub height: Option<u32>,
    /// Duration in seconds
    #[serde(default)]
    pub seconds: Option<u32>,
    /// Caption
    #[serde(default)]
    pub caption: Option<String>,
    /// Original file name (documents)
    #[serde(default)]
    pub file_name: Option<String>,
    /// Document title
    #[serde(default)]
    pub title: Option<String>,
    /// Page count (documents)
    #[serde(default)]
    pub page_count: Option<u32>,
    /// Push-to-talk voice note (audio)
    #[serde(default)]
    pub ptt: Option<bool>,
    /// Animated sticker
    #[serde(default)]
    pub is_animated: Option<bool>,
    /// Base64 JPEG thumbnail
    #[serde(default)]
    pub jpeg_thumbnail: Option<String>,
}

impl MediaPayload {
    /// File length in bytes
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        self.file_length.as_ref().and_then(LongValue::as_u64)
    }
}

/// `contactMessage`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPayload {
    /// Name shown on the card
    #[serde(default)]
    pub display_name: Option<String>,
    /// vCard body
    #[serde(default)]
    pub vcard: Option<String>,
}

impl ContactPayload {
    /// Phone number from the vCard (`waid=` first, then the first TEL line)
    #[must_use]
    pub fn phone_number(&self) -> Option<String> {
        let vcard = self.vcard.as_deref()?;
        if let Some(idx) = vcard.find("waid=") {
            let digits: String = vcard[idx + 5..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if !digits.is_empty() {
                return Some(digits);
            }
        }
        vcard
            .lines()
            .find(|line| line.to_ascii_uppercase().starts_with("TEL"))
            .and_then(|line| line.rsplit(':').next())
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    }
}

/// `locationMessage`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    /// Latitude
    #[serde(default)]
    pub degrees_latitude: Option<f64>,
    /// Longitude
    #[serde(default)]
    pub degrees_longitude: Option<f64>,
    /// Place name
    #[serde(default)]
    pub name: Option<String>,
    /// Street address
    #[serde(default)]
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_long_value_forms() {
        assert_eq!(LongValue::Number(42).as_u64(), Some(42));
        assert_eq!(LongValue::Text("1700000000".into()).as_u64(), Some(1_700_000_000));
        assert_eq!(LongValue::Long { low: 5, high: 1 }.as_u64(), Some((1 << 32) + 5));
        assert_eq!(LongValue::Text("abc".into()).as_u64(), None);
    }

    #[test]
    fn test_deserialize_with_unknown_variant() {
        let raw: RawMessage = serde_json::from_value(json!({
            "key": {"remoteJid": "5491100000000@s.whatsapp.net", "fromMe": false, "id": "ABC"},
            "message": {"pollCreationMessage": {"name": "Lunch?"}},
            "messageTimestamp": "1700000000"
        }))
        .unwrap();

        let content = raw.message.as_ref().unwrap();
        assert!(!content.has_known_payload());
        assert_eq!(content.unknown_variants().collect::<Vec<_>>(), vec!["pollCreationMessage"]);
        assert_eq!(raw.timestamp_secs(), Some(1_700_000_000));
        assert_eq!(raw.id(), Some("ABC"));
    }

    #[test]
    fn test_contact_phone_from_vcard() {
        let contact = ContactPayload {
            display_name: Some("Ana".into()),
            vcard: Some(
                "BEGIN:VCARD\nVERSION:3.0\nFN:Ana\nTEL;type=CELL;waid=5491122334455:+54 9 11 2233-4455\nEND:VCARD"
                    .into(),
            ),
        };
        assert_eq!(contact.phone_number().as_deref(), Some("5491122334455"));

        let plain = ContactPayload {
            display_name: None,
            vcard: Some("BEGIN:VCARD\nTEL:+1 555 0100\nEND:VCARD".into()),
        };
        assert_eq!(plain.phone_number().as_deref(), Some("+1 555 0100"));
    }
}
