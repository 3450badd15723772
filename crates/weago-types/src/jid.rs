use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Server part of a personal chat address.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Server part of a group chat address.
pub const GROUP_SERVER: &str = "g.us";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JidError {
    #[error("address {0:?} has no '@'")]
    MissingServer(String),
    #[error("address {0:?} has an empty user part")]
    EmptyUser(String),
    #[error("address {0:?} has an empty server part")]
    EmptyServer(String),
}

/// A chat-network address of the form `user@server`.
///
/// Parsing drops a `:device` suffix from the user part, so every device of
/// one account maps to the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    user: String,
    server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    pub fn is_user(&self) -> bool {
        self.server == USER_SERVER
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, server) = s
            .split_once('@')
            .ok_or_else(|| JidError::MissingServer(s.to_string()))?;
        let user = user.split(':').next().unwrap_or_default();
        if user.is_empty() {
            return Err(JidError::EmptyUser(s.to_string()));
        }
        if server.is_empty() {
            return Err(JidError::EmptyServer(s.to_string()));
        }
        Ok(Self::new(user, server))
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_suffix_is_dropped() {
        let jid: Jid = "62811:12@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.user(), "62811");
        assert_eq!(jid.to_string(), "62811@s.whatsapp.net");
        assert!(jid.is_user());
    }

    #[test]
    fn group_addresses_parse() {
        let jid: Jid = "1203630@g.us".parse().unwrap();
        assert!(jid.is_group());
    }

    #[test]
    fn malformed_addresses_fail() {
        assert!(matches!("62811".parse::<Jid>(), Err(JidError::MissingServer(_))));
        assert!(matches!("@g.us".parse::<Jid>(), Err(JidError::EmptyUser(_))));
        assert!(matches!(":3@g.us".parse::<Jid>(), Err(JidError::EmptyUser(_))));
        assert!(matches!("62811@".parse::<Jid>(), Err(JidError::EmptyServer(_))));
    }
}
