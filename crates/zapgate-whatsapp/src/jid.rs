//! JID helpers: classification of conversation targets and phone extraction.

use serde::{Deserialize, Serialize};

/// Server suffix for personal accounts
pub const USER_SERVER: &str = "s.whatsapp.net";
/// Legacy personal server suffix
pub const LEGACY_USER_SERVER: &str = "c.us";
/// Group server suffix
pub const GROUP_SERVER: &str = "g.us";
/// Linked-identity (LID) server suffix; the user part is not a phone number
pub const LID_SERVER: &str = "lid";
/// Status broadcast pseudo-chat
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Kind of account behind a JID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Phone-number account
    Personal,
    /// Group chat
    Group,
    /// Linked identity, opaque id
    LidAccount,
    /// The managed session itself
    Session,
    /// Broadcast, newsletter or anything unrecognised
    Other,
}

impl AccountType {
    /// Wire tag
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Group => "group",
            Self::LidAccount => "lid_account",
            Self::Session => "session",
            Self::Other => "other",
        }
    }
}

fn server(jid: &str) -> Option<&str> {
    jid.rsplit_once('@').map(|(_, s)| s)
}

/// `@g.us`
#[must_use]
pub fn is_group(jid: &str) -> bool {
    server(jid) == Some(GROUP_SERVER)
}

/// `status@broadcast` or any `@broadcast` list
#[must_use]
pub fn is_broadcast(jid: &str) -> bool {
    jid == STATUS_BROADCAST || server(jid) == Some("broadcast")
}

/// `@newsletter` channel
#[must_use]
pub fn is_newsletter(jid: &str) -> bool {
    server(jid) == Some("newsletter")
}

/// `@lid` linked identity
#[must_use]
pub fn is_lid(jid: &str) -> bool {
    server(jid) == Some(LID_SERVER)
}

/// Classify the account behind a JID
#[must_use]
pub fn account_type(jid: &str) -> AccountType {
    match server(jid) {
        Some(USER_SERVER) | Some(LEGACY_USER_SERVER) => AccountType::Personal,
        Some(GROUP_SERVER) => AccountType::Group,
        Some(LID_SERVER) => AccountType::LidAccount,
        _ => AccountType::Other,
    }
}

/// Phone number (or opaque id) from a JID.
///
/// `5491112223333:12@s.whatsapp.net` → `5491112223333`. LID identifiers are
/// not phone numbers and are returned verbatim.
#[must_use]
pub fn extract_number(jid: &str) -> String {
    if is_lid(jid) {
        return jid.to_string();
    }
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user).to_string()
}

/// Recipient JID for a phone number. Values that already carry a server are
/// kept as they are.
#[must_use]
pub fn to_user_jid(number: &str) -> String {
    if number.contains('@') {
        return number.to_string();
    }
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    format!("{digits}@{USER_SERVER}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_number_strips_device_and_domain() {
        assert_eq!(extract_number("5491112223333:12@s.whatsapp.net"), "5491112223333");
        assert_eq!(extract_number("5491112223333@s.whatsapp.net"), "5491112223333");
        assert_eq!(extract_number("5491112223333"), "5491112223333");
    }

    #[test]
    fn test_extract_number_keeps_lid_verbatim() {
        assert_eq!(extract_number("123456789012345@lid"), "123456789012345@lid");
    }

    #[test]
    fn test_account_types() {
        assert_eq!(account_type("1@s.whatsapp.net"), AccountType::Personal);
        assert_eq!(account_type("1@c.us"), AccountType::Personal);
        assert_eq!(account_type("1203630@g.us"), AccountType::Group);
        assert_eq!(account_type("99@lid"), AccountType::LidAccount);
        assert_eq!(account_type("status@broadcast"), AccountType::Other);
        assert_eq!(AccountType::LidAccount.as_str(), "lid_account");
    }

    #[test]
    fn test_target_predicates() {
        assert!(is_group("1203630@g.us"));
        assert!(is_broadcast(STATUS_BROADCAST));
        assert!(is_broadcast("12345@broadcast"));
        assert!(is_newsletter("120363@newsletter"));
        assert!(!is_group("5491112223333@s.whatsapp.net"));
    }

    #[test]
    fn test_to_user_jid() {
        assert_eq!(to_user_jid("+54 9 11 1222-3333"), "5491112223333@s.whatsapp.net");
        assert_eq!(to_user_jid("1203630@g.us"), "1203630@g.us");
    }
}
