//! Inbound message filter.
//!
//! Runs before classification: only individual inbound messages with content
//! reach the classifier. Self-sent messages are dropped because the send path
//! already publishes its own locally built event.

use crate::jid;
use crate::raw::RawMessage;

/// Why a message was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// Missing key, remote JID or message body
    Malformed,
    /// Sent by this account
    FromMe,
    /// `status@broadcast`
    StatusBroadcast,
    /// Group conversation
    Group,
    /// Broadcast list
    Broadcast,
    /// Newsletter channel
    Newsletter,
    /// Key distribution, handshake or device sync
    ProtocolControl,
    /// Body present but carries nothing
    EmptyContent,
}

/// First rule that rejects the message, or `None` when it is processable
#[must_use]
pub fn rejection_reason(raw: &RawMessage) -> Option<FilterReason> {
    let Some(remote_jid) = raw.remote_jid().filter(|j| !j.is_empty()) else {
        return Some(FilterReason::Malformed);
    };
    let Some(content) = raw.message.as_ref() else {
        return Some(FilterReason::Malformed);
    };

    if raw.from_me() {
        return Some(FilterReason::FromMe);
    }
    if remote_jid == jid::STATUS_BROADCAST {
        return Some(FilterReason::StatusBroadcast);
    }
    if jid::is_group(remote_jid) {
        return Some(FilterReason::Group);
    }
    if jid::is_broadcast(remote_jid) {
        return Some(FilterReason::Broadcast);
    }
    if jid::is_newsletter(remote_jid) {
        return Some(FilterReason::Newsletter);
    }

    let known = content.has_known_payload();
    let has_unknown = content.unknown_variants().next().is_some();

    if content.protocol_message.is_some() || content.device_sent_message.is_some() {
        return Some(FilterReason::ProtocolControl);
    }
    if content.sender_key_distribution_message.is_some() && !known {
        return Some(FilterReason::ProtocolControl);
    }
    if content.message_context_info.is_some() && !known && !has_unknown {
        return Some(FilterReason::ProtocolControl);
    }
    if !has_unknown && (!known || content.is_blank_text()) {
        return Some(FilterReason::EmptyContent);
    }

    None
}

/// Whether the message should go through classification and notification
#[must_use]
pub fn is_processable(raw: &RawMessage) -> bool {
    rejection_reason(raw).is_none()
}
