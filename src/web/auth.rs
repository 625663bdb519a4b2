//! Login decision against a credential source.

use authd_shared::{AuthDecision, CredentialSource, LoginContent};

pub const EMPTY_CREDENTIALS_REASON: &str = "user or meta password can not be empty";

/// Decide one login attempt.
///
/// Passwords are compared as plain strings, matching the credential file
/// format. The comparison is not constant-time.
pub fn decide(login: &LoginContent, credentials: &dyn CredentialSource) -> AuthDecision {
    let user = login.user.as_str();
    let password = login.password();
    if user.is_empty() || password.is_empty() {
        return AuthDecision::Reject(EMPTY_CREDENTIALS_REASON.to_string());
    }
    match credentials.lookup(user) {
        Some(stored) if stored == password => AuthDecision::Unchanged,
        _ => AuthDecision::Reject(format!("user: `{user}` invalid password")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authd_shared::{CredentialMapping, CredentialStore};
    use std::collections::HashMap;

    fn store() -> CredentialStore {
        CredentialStore::new([("alice", "secret")].into_iter().collect::<CredentialMapping>())
    }

    fn login(user: &str, password: Option<&str>) -> LoginContent {
        let mut metas = HashMap::new();
        if let Some(pw) = password {
            metas.insert("password".to_string(), Some(pw.to_string()));
        }
        LoginContent {
            user: user.to_string(),
            metas,
            ..LoginContent::default()
        }
    }

    #[test]
    fn test_matching_password_is_unchanged() {
        assert_eq!(decide(&login("alice", Some("secret")), &store()), AuthDecision::Unchanged);
    }

    #[test]
    fn test_wrong_password_names_user() {
        match decide(&login("alice", Some("wrong")), &store()) {
            AuthDecision::Reject(reason) => {
                assert!(reason.contains("alice"));
                assert_eq!(reason, "user: `alice` invalid password");
            }
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_user_is_rejected() {
        assert!(!decide(&login("mallory", Some("secret")), &store()).is_allowed());
    }

    #[test]
    fn test_empty_fields_are_rejected() {
        let expected = AuthDecision::Reject(EMPTY_CREDENTIALS_REASON.to_string());
        assert_eq!(decide(&login("", Some("secret")), &store()), expected);
        assert_eq!(decide(&login("alice", Some("")), &store()), expected);
        assert_eq!(decide(&login("alice", None), &store()), expected);
    }

    #[test]
    fn test_empty_key_in_store_is_unreachable() {
        let mapping: CredentialMapping = [("", "orphan")].into_iter().collect();
        let store = CredentialStore::new(mapping);
        assert!(!decide(&login("", Some("orphan")), &store).is_allowed());
    }
}
