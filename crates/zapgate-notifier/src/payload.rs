//! Request bodies, one per backend endpoint

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use zapgate_whatsapp::{DownloadInfo, MediaInfo, MessageType, NormalizedMessage, SessionSnapshot};

/// `status-update`
pub const STATUS_UPDATE: &str = "status-update";
/// `messages/received`
pub const MESSAGE_RECEIVED: &str = "messages/received";
/// `sessions/qr-update`
pub const QR_UPDATE: &str = "sessions/qr-update";
/// `whatsapp_sessions/new-session-connected`
pub const NEW_SESSION_CONNECTED: &str = "whatsapp_sessions/new-session-connected";
/// `metrics`
pub const METRICS: &str = "metrics";

/// Status change body
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate<'a> {
    pub session_id: &'a str,
    pub status: &'a str,
    pub error_message: Option<&'a str>,
    pub timestamp: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Image fields; the compressed preview wins over the CDN url
#[derive(Debug, Clone, Serialize)]
pub struct ImageFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_compressed: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<&'a str>,
    pub image_caption: Option<&'a str>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub image_mimetype: Option<&'a str>,
}

impl<'a> ImageFields<'a> {
    fn from_media(info: &'a MediaInfo) -> Self {
        let compressed = info.image_compressed.as_deref();
        Self {
            image_compressed: compressed,
            image_url: if compressed.is_some() {
                None
            } else {
                info.url.as_deref()
            },
            image_caption: info.caption.as_deref(),
            image_width: info.image_width.or(info.width),
            image_height: info.image_height.or(info.height),
            image_mimetype: info.image_mimetype.as_deref().or(info.mimetype.as_deref()),
        }
    }
}

/// Non-image media fields
#[derive(Debug, Clone, Serialize)]
pub struct MediaFields<'a> {
    pub media_info: &'a MediaInfo,
    pub download_info: Option<&'a DownloadInfo>,
}

/// Message body
#[derive(Debug, Clone, Serialize)]
pub struct MessageReceived<'a> {
    pub session_id: &'a str,
    pub message_id: &'a str,
    pub from_me: bool,
    pub sender_name: Option<&'a str>,
    pub sender_phone: Option<&'a str>,
    pub sender_type: &'static str,
    pub sender_jid: Option<&'a str>,
    pub recipient_name: Option<&'a str>,
    pub recipient_phone: Option<&'a str>,
    pub recipient_type: &'static str,
    pub recipient_jid: Option<&'a str>,
    pub chat_jid: &'a str,
    pub message_content: &'a str,
    pub message_type: MessageType,
    pub raw_message: &'a Value,
    pub received_at: DateTime<Utc>,
    pub phone_number_session: Option<&'a str>,
    #[serde(flatten)]
    pub image: Option<ImageFields<'a>>,
    #[serde(flatten)]
    pub media: Option<MediaFields<'a>>,
}

impl<'a> MessageReceived<'a> {
    /// Flatten a normalized message into the backend's field set
    #[must_use]
    pub fn from_message(message: &'a NormalizedMessage) -> Self {
        let session_side = if message.from_me {
            &message.sender
        } else {
            &message.recipient
        };

        let (image, media) = match message.message_type {
            MessageType::Image => (Some(ImageFields::from_media(&message.media_info)), None),
            t if t.is_downloadable() => (
                None,
                Some(MediaFields {
                    media_info: &message.media_info,
                    download_info: message.download_info.as_ref(),
                }),
            ),
            _ => (None, None),
        };

        Self {
            session_id: &message.session_id,
            message_id: &message.message_id,
            from_me: message.from_me,
            sender_name: message.sender.name.as_deref(),
            sender_phone: message.sender.id.as_deref(),
            sender_type: message.sender.account_type.as_str(),
            sender_jid: message.sender.participant.as_deref(),
            recipient_name: message.recipient.name.as_deref(),
            recipient_phone: message.recipient.id.as_deref(),
            recipient_type: message.recipient.account_type.as_str(),
            recipient_jid: message.recipient.participant.as_deref(),
            chat_jid: &message.chat_id,
            message_content: &message.content,
            message_type: message.message_type,
            raw_message: &message.raw_message,
            received_at: message.timestamp,
            phone_number_session: session_side.id.as_deref(),
            image,
            media,
        }
    }
}

/// QR body
#[derive(Debug, Clone, Serialize)]
pub struct QrUpdate<'a> {
    pub session_id: &'a str,
    pub qr_data: &'a str,
    pub generated_at: DateTime<Utc>,
}

/// First-connect body
#[derive(Debug, Clone, Serialize)]
pub struct NewSessionConnected<'a> {
    pub session_id: &'a str,
    pub phone_number: &'a str,
    pub status: &'static str,
    pub last_seen: Option<DateTime<Utc>>,
    pub auth_folder_path: &'a str,
    pub server_port: Option<u16>,
    pub whatsapp_user_id: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> NewSessionConnected<'a> {
    /// `None` when the snapshot carries no phone number
    #[must_use]
    pub fn from_snapshot(snapshot: &'a SessionSnapshot) -> Option<Self> {
        let phone_number = snapshot
            .connected_user_phone_number
            .as_deref()
            .or(snapshot.phone_number.as_deref())
            .filter(|p| !p.is_empty())?;

        Some(Self {
            session_id: &snapshot.session_id,
            phone_number,
            status: "connected",
            last_seen: snapshot.last_seen,
            auth_folder_path: &snapshot.auth_folder_path,
            server_port: snapshot.server_port,
            whatsapp_user_id: snapshot.whatsapp_user_id.as_deref(),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }
}
