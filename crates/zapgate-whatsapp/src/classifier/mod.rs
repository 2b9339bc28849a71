//! Media classifier
//!
//! `classify` turns the payload of a processable message into display text,
//! a type tag and normalized media metadata. It is pure; the only I/O in the
//! pipeline is `transcode::enrich_image`, which runs afterwards for images.

pub mod mime;
pub mod transcode;

pub use transcode::{enrich_image, transcode_image, TranscodeOptions, TranscodedImage};

use crate::raw::{ContactPayload, LocationPayload, MediaPayload, RawMessage};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use zapgate_core::Result;

/// Fetches the decrypted bytes of a media message
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download the media referenced by the raw message
    async fn download_media(&self, raw: &Value) -> Result<Vec<u8>>;
}

/// Normalized message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain or extended text
    Text,
    /// Image
    Image,
    /// Video
    Video,
    /// Audio / voice note
    Audio,
    /// Sticker
    Sticker,
    /// Document
    Document,
    /// Contact card
    Contact,
    /// Location pin
    Location,
    /// Anything else
    Unknown,
}

impl MessageType {
    /// Wire tag
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Sticker => "sticker",
            Self::Document => "document",
            Self::Contact => "contact",
            Self::Location => "location",
            Self::Unknown => "unknown",
        }
    }

    /// Types whose asset can be fetched later
    #[must_use]
    pub fn is_downloadable(&self) -> bool {
        matches!(
            self,
            Self::Image | Self::Video | Self::Audio | Self::Sticker | Self::Document
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which retrieval path is viable for a media asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMethod {
    /// Direct CDN URL
    Url,
    /// Media key plus direct path through the socket
    MediaKey,
    /// Nothing to download with
    None,
}

/// Normalized, type-specific media metadata. Empty for text messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_voice_note: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_animated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_download: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_method: Option<DownloadMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_compressed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcard: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Unrecognised payload kept for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// What a downstream consumer needs to fetch a media asset later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadInfo {
    /// Media type
    #[serde(rename = "type")]
    pub media_type: MessageType,
    /// CDN URL
    pub url: Option<String>,
    /// Base64 media key
    pub media_key: Option<String>,
    /// Direct path paired with the media key
    pub direct_path: Option<String>,
    /// MIME type
    pub mimetype: Option<String>,
    /// Size in bytes
    pub file_length: Option<u64>,
    /// Generated file name
    pub filename: String,
}

/// Classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    /// Human-readable text or bracketed placeholder
    pub content: String,
    /// Type tag
    pub message_type: MessageType,
    /// Type-specific metadata
    pub media_info: MediaInfo,
    /// Present for downloadable types
    pub download_info: Option<DownloadInfo>,
}

impl Classified {
    fn text(content: String) -> Self {
        Self {
            content,
            message_type: MessageType::Text,
            media_info: MediaInfo::default(),
            download_info: None,
        }
    }
}

/// Classify a processable message. Variants are checked in a fixed order;
/// by protocol convention only one is present.
#[must_use]
pub fn classify(raw: &RawMessage) -> Classified {
    let timestamp = raw
        .timestamp_secs()
        .unwrap_or_else(|| Utc::now().timestamp());

    let Some(content) = raw.message.as_ref() else {
        return unknown(Value::Null);
    };

    if let Some(text) = &content.conversation {
        return Classified::text(text.clone());
    }
    if let Some(ext) = &content.extended_text_message {
        return Classified::text(ext.text.clone().unwrap_or_default());
    }
    if let Some(media) = &content.image_message {
        return media_message(MessageType::Image, media, "[Image]".to_string(), timestamp);
    }
    if let Some(media) = &content.video_message {
        return media_message(MessageType::Video, media, "[Video]".to_string(), timestamp);
    }
    if let Some(media) = &content.audio_message {
        let placeholder = if media.ptt == Some(true) {
            "[Voice note]"
        } else {
            "[Audio]"
        };
        return media_message(MessageType::Audio, media, placeholder.to_string(), timestamp);
    }
    if let Some(media) = &content.sticker_message {
        return media_message(MessageType::Sticker, media, "[Sticker]".to_string(), timestamp);
    }
    if let Some(media) = &content.document_message {
        let name = media
            .file_name
            .as_deref()
            .or(media.title.as_deref())
            .unwrap_or("file");
        return media_message(
            MessageType::Document,
            media,
            format!("[Document: {name}]"),
            timestamp,
        );
    }
    if let Some(contact) = &content.contact_message {
        return contact_message(contact);
    }
    if let Some(location) = &content.location_message {
        return location_message(location);
    }

    let payload = serde_json::to_value(&content.other).unwrap_or(Value::Null);
    unknown(payload)
}

fn unknown(payload: Value) -> Classified {
    Classified {
        content: "[Unsupported message]".to_string(),
        message_type: MessageType::Unknown,
        media_info: MediaInfo {
            raw: Some(payload),
            ..MediaInfo::default()
        },
        download_info: None,
    }
}

fn media_message(
    message_type: MessageType,
    media: &MediaPayload,
    placeholder: String,
    timestamp: i64,
) -> Classified {
    let content = media
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or(placeholder);

    let download_method = if media.url.is_some() {
        DownloadMethod::Url
    } else if media.media_key.is_some() && media.direct_path.is_some() {
        DownloadMethod::MediaKey
    } else {
        DownloadMethod::None
    };

    let media_info = MediaInfo {
        url: media.url.clone(),
        direct_path: media.direct_path.clone(),
        mimetype: media.mimetype.clone(),
        file_length: media.length(),
        file_sha256: media.file_sha256.clone(),
        media_key: media.media_key.clone(),
        width: media.width,
        height: media.height,
        seconds: media.seconds,
        caption: media.caption.clone(),
        file_name: media.file_name.clone(),
        page_count: media.page_count,
        is_voice_note: (message_type == MessageType::Audio).then(|| media.ptt == Some(true)),
        is_animated: media.is_animated,
        can_download: Some(download_method != DownloadMethod::None),
        download_method: Some(download_method),
        ..MediaInfo::default()
    };

    let download_info = DownloadInfo {
        media_type: message_type,
        url: media.url.clone(),
        media_key: media.media_key.clone(),
        direct_path: media.direct_path.clone(),
        mimetype: media.mimetype.clone(),
        file_length: media.length(),
        filename: format!(
            "{}_{}.{}",
            message_type,
            timestamp,
            mime::extension_for(media.mimetype.as_deref())
        ),
    };

    Classified {
        content,
        message_type,
        media_info,
        download_info: Some(download_info),
    }
}

fn contact_message(contact: &ContactPayload) -> Classified {
    let name = contact.display_name.as_deref().unwrap_or("Unknown");
    Classified {
        content: format!("[Contact: {name}]"),
        message_type: MessageType::Contact,
        media_info: MediaInfo {
            contact_name: contact.display_name.clone(),
            contact_phone: contact.phone_number(),
            vcard: contact.vcard.clone(),
            ..MediaInfo::default()
        },
        download_info: None,
    }
}

fn location_message(location: &LocationPayload) -> Classified {
    let lat = location.degrees_latitude.unwrap_or_default();
    let lng = location.degrees_longitude.unwrap_or_default();
    let content = match location.name.as_deref() {
        Some(name) if !name.is_empty() => format!("[Location: {name} ({lat}, {lng})]"),
        _ => format!("[Location: {lat}, {lng}]"),
    };
    Classified {
        content,
        message_type: MessageType::Location,
        media_info: MediaInfo {
            latitude: location.degrees_latitude,
            longitude: location.degrees_longitude,
            location_name: location.name.clone(),
            address: location.address.clone(),
            ..MediaInfo::default()
        },
        download_info: None,
    }
}

#[cfg(test)]
mod tests;
