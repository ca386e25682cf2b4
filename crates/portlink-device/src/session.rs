/*!
 * Session ownership tokens.
 *
 * A protocol session mints one token and stamps it on every port it
 * deserializes. Cached-state mutators require the token back, so only
 * the owning session can write port state; presenting a foreign token
 * is a programming error and panics.
 */
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque capability token identifying the protocol session that
/// owns a set of ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Mint a fresh token
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(SessionToken::new(), SessionToken::new());
    }

    #[test]
    fn test_token_equality_is_by_value() {
        let token = SessionToken::new();
        assert_eq!(token.clone(), token);
    }
}
