// authd_shared: credential table and plugin envelope types shared by the daemon and its tests

pub mod credentials;
pub mod credential_store;
pub mod plugin_models;

pub use credential_store::{CredentialSource, CredentialStore};
pub use credentials::{CredentialError, CredentialMapping, load_credentials, parse_credentials};
pub use plugin_models::{AuthDecision, LoginContent, PluginRequest, PluginResponse};
