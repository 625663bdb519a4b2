//! Request and response envelopes of the tunnel host's login plugin protocol.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Metadata key carrying the client's password.
pub const PASSWORD_META_KEY: &str = "password";

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Envelope posted by the host for each login attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PluginRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub op: String,
    #[serde(default)]
    pub content: Option<LoginContent>,
}

impl PluginRequest {
    pub fn login(&self) -> LoginContent {
        self.content.clone().unwrap_or_default()
    }
}

/// Login payload. Only `user` and the `password` meta are interpreted here;
/// the rest is carried as the host sends it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LoginContent {
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hostname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub os: String,
    #[serde(deserialize_with = "null_as_default")]
    pub arch: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(deserialize_with = "null_as_default")]
    pub privilege_key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub run_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pool_count: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub metas: HashMap<String, Option<String>>,
    #[serde(deserialize_with = "null_as_default")]
    pub client_address: String,
}

impl LoginContent {
    pub fn password(&self) -> &str {
        self.metas
            .get(PASSWORD_META_KEY)
            .and_then(Option::as_deref)
            .unwrap_or("")
    }
}

/// Outcome of one login check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Let the login through untouched.
    Unchanged,
    Reject(String),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Unchanged)
    }
}

/// Envelope returned to the host.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PluginResponse {
    #[serde(default)]
    pub reject: bool,
    #[serde(default)]
    pub reject_reason: String,
    #[serde(default)]
    pub unchange: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

impl From<AuthDecision> for PluginResponse {
    fn from(decision: AuthDecision) -> Self {
        match decision {
            AuthDecision::Unchanged => Self {
                unchange: true,
                ..Self::default()
            },
            AuthDecision::Reject(reason) => Self {
                reject: true,
                reject_reason: reason,
                ..Self::default()
            },
        }
    }
}
