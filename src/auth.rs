//! Authorization gate.
//!
//! The ledger core consumes identity as a capability: an opaque token is
//! resolved to an account and a role by an [`IdentityGate`]. Credential
//! storage, hashing and token issuance live in the session service, not
//! here — the gate is the only source of truth for roles, and no engine
//! operation accepts a caller-asserted role.

use thiserror::Error;

use crate::model::AccountId;

/// Role attached to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

/// An authenticated caller: the account behind a token plus its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub account: AccountId,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Error resolving a token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthenticated: token '{0}' did not resolve")]
    Unauthenticated(String),
}

/// Resolves an opaque credential to an authenticated caller.
pub trait IdentityGate: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Caller, AuthError>;
}

/// Gate that decodes `user:<id>` / `admin:<id>` tokens.
///
/// Stand-in for the session service: a production gate would verify a
/// signed token before trusting its claims. The replay binary and the
/// test suites authenticate through this one.
#[derive(Debug, Default)]
pub struct TokenGate;

impl IdentityGate for TokenGate {
    fn resolve(&self, token: &str) -> Result<Caller, AuthError> {
        let (role, id) = token
            .split_once(':')
            .ok_or_else(|| AuthError::Unauthenticated(token.to_string()))?;

        let role = match role {
            "user" => Role::User,
            "admin" => Role::Admin,
            _ => return Err(AuthError::Unauthenticated(token.to_string())),
        };

        let account = id
            .parse::<AccountId>()
            .map_err(|_| AuthError::Unauthenticated(token.to_string()))?;

        Ok(Caller { account, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_user_token() {
        let caller = TokenGate.resolve("user:7").unwrap();
        assert_eq!(caller.account, 7);
        assert_eq!(caller.role, Role::User);
        assert!(!caller.is_admin());
    }

    #[test]
    fn resolves_admin_token() {
        let caller = TokenGate.resolve("admin:1").unwrap();
        assert_eq!(caller.account, 1);
        assert!(caller.is_admin());
    }

    #[test]
    fn rejects_unknown_role() {
        let result = TokenGate.resolve("moderator:3");
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(TokenGate.resolve("user").is_err());
        assert!(TokenGate.resolve("user:abc").is_err());
        assert!(TokenGate.resolve("").is_err());
    }
}
