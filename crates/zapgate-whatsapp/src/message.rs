//! Normalized message forwarded to the backend.

use crate::classifier::{Classified, DownloadInfo, MediaInfo, MessageType};
use crate::jid::{self, AccountType};
use crate::raw::RawMessage;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One side of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// Display name, when known
    pub name: Option<String>,
    /// Phone number, or the opaque id for LID accounts
    pub id: Option<String>,
    /// Account kind
    pub account_type: AccountType,
    /// Raw participant JID as seen on the wire
    pub participant: Option<String>,
    /// Owning session, set when this side is the managed account
    pub session_id: Option<String>,
}

/// Identity of the managed account, as known when the message is built
#[derive(Debug, Clone, Copy)]
pub struct SessionIdentity<'a> {
    /// Session id
    pub session_id: &'a str,
    /// Confirmed or configured phone number
    pub phone_number: Option<&'a str>,
    /// Full user JID confirmed by the network
    pub user_jid: Option<&'a str>,
}

impl SessionIdentity<'_> {
    fn party(&self) -> Party {
        Party {
            name: None,
            id: self.phone_number.map(str::to_string),
            account_type: AccountType::Session,
            participant: self.user_jid.map(str::to_string),
            session_id: Some(self.session_id.to_string()),
        }
    }
}

/// Canonical message event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Network message id (dedup key)
    pub message_id: String,
    /// Session that saw the message
    pub session_id: String,
    /// Sent by the managed account
    pub from_me: bool,
    /// Author
    pub sender: Party,
    /// Addressee
    pub recipient: Party,
    /// Conversation JID
    pub chat_id: String,
    /// Display text
    pub content: String,
    /// Type tag
    pub message_type: MessageType,
    /// Type-specific metadata
    pub media_info: MediaInfo,
    /// Retrieval data for downloadable media
    pub download_info: Option<DownloadInfo>,
    /// Message time
    pub timestamp: DateTime<Utc>,
    /// Original payload
    pub raw_message: Value,
}

impl NormalizedMessage {
    /// Build from a classified inbound (or echoed) message.
    ///
    /// Returns `None` when the message has no id or chat JID.
    #[must_use]
    pub fn from_raw(
        raw: &RawMessage,
        raw_value: Value,
        classified: Classified,
        session: SessionIdentity<'_>,
    ) -> Option<Self> {
        let key = raw.key.as_ref()?;
        let chat_id = key.remote_jid.clone()?;
        let message_id = key.id.clone()?;

        let remote_jid = key.participant.clone().unwrap_or_else(|| chat_id.clone());
        let remote = Party {
            name: if key.from_me { None } else { raw.push_name.clone() },
            id: Some(jid::extract_number(&remote_jid)),
            account_type: jid::account_type(&remote_jid),
            participant: Some(remote_jid),
            session_id: None,
        };

        let (sender, recipient) = if key.from_me {
            (session.party(), remote)
        } else {
            (remote, session.party())
        };

        let timestamp = raw
            .timestamp_secs()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);

        Some(Self {
            message_id,
            session_id: session.session_id.to_string(),
            from_me: key.from_me,
            sender,
            recipient,
            chat_id,
            content: classified.content,
            message_type: classified.message_type,
            media_info: classified.media_info,
            download_info: classified.download_info,
            timestamp,
            raw_message: raw_value,
        })
    }

    /// Locally built record of a text message this session just sent
    #[must_use]
    pub fn outgoing_text(
        message_id: String,
        recipient_jid: &str,
        text: &str,
        timestamp: DateTime<Utc>,
        session: SessionIdentity<'_>,
    ) -> Self {
        let raw_message = serde_json::json!({
            "key": {"remoteJid": recipient_jid, "fromMe": true, "id": message_id},
            "message": {"conversation": text},
            "messageTimestamp": timestamp.timestamp(),
        });
        Self {
            message_id,
            session_id: session.session_id.to_string(),
            from_me: true,
            sender: session.party(),
            recipient: Party {
                name: None,
                id: Some(jid::extract_number(recipient_jid)),
                account_type: jid::account_type(recipient_jid),
                participant: Some(recipient_jid.to_string()),
                session_id: None,
            },
            chat_id: recipient_jid.to_string(),
            content: text.to_string(),
            message_type: MessageType::Text,
            media_info: MediaInfo::default(),
            download_info: None,
            timestamp,
            raw_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use serde_json::json;

    const SESSION: SessionIdentity<'static> = SessionIdentity {
        session_id: "s1",
        phone_number: Some("5491100000000"),
        user_jid: Some("5491100000000:3@s.whatsapp.net"),
    };

    fn build(value: Value) -> NormalizedMessage {
        let raw: RawMessage = serde_json::from_value(value.clone()).unwrap();
        let classified = classify(&raw);
        NormalizedMessage::from_raw(&raw, value, classified, SESSION).unwrap()
    }

    #[test]
    fn test_inbound_sender_is_remote() {
        let msg = build(json!({
            "key": {"remoteJid": "5491112223333@s.whatsapp.net", "fromMe": false, "id": "A1"},
            "message": {"conversation": "hola"},
            "messageTimestamp": 1700000000,
            "pushName": "Carla"
        }));

        assert!(!msg.from_me);
        assert_eq!(msg.sender.name.as_deref(), Some("Carla"));
        assert_eq!(msg.sender.id.as_deref(), Some("5491112223333"));
        assert_eq!(msg.sender.account_type, AccountType::Personal);
        assert_eq!(msg.recipient.account_type, AccountType::Session);
        assert_eq!(msg.recipient.session_id.as_deref(), Some("s1"));
        assert_eq!(msg.recipient.id.as_deref(), Some("5491100000000"));
        assert_eq!(msg.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(msg.content, "hola");
    }

    #[test]
    fn test_self_sent_swaps_parties() {
        let msg = build(json!({
            "key": {"remoteJid": "5491112223333@s.whatsapp.net", "fromMe": true, "id": "A2"},
            "message": {"conversation": "ok"}
        }));

        assert!(msg.from_me);
        assert_eq!(msg.sender.account_type, AccountType::Session);
        assert_eq!(msg.recipient.id.as_deref(), Some("5491112223333"));
    }

    #[test]
    fn test_lid_sender_kept_opaque() {
        let msg = build(json!({
            "key": {"remoteJid": "112233445566@lid", "id": "A3"},
            "message": {"conversation": "hey"}
        }));

        assert_eq!(msg.sender.id.as_deref(), Some("112233445566@lid"));
        assert_eq!(msg.sender.account_type, AccountType::LidAccount);
    }

    #[test]
    fn test_missing_id_yields_none() {
        let value = json!({"key": {"remoteJid": "1@s.whatsapp.net"}, "message": {"conversation": "x"}});
        let raw: RawMessage = serde_json::from_value(value.clone()).unwrap();
        let classified = classify(&raw);
        assert!(NormalizedMessage::from_raw(&raw, value, classified, SESSION).is_none());
    }

    #[test]
    fn test_outgoing_text() {
        let msg = NormalizedMessage::outgoing_text(
            "OUT1".to_string(),
            "5491112223333@s.whatsapp.net",
            "gracias",
            Utc::now(),
            SESSION,
        );
        assert!(msg.from_me);
        assert_eq!(msg.chat_id, "5491112223333@s.whatsapp.net");
        assert_eq!(msg.raw_message["key"]["fromMe"], json!(true));
        assert_eq!(msg.recipient.id.as_deref(), Some("5491112223333"));
    }
}
