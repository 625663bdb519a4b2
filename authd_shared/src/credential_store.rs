//! Shared, swappable credential table.

use std::sync::{Arc, PoisonError, RwLock};

use crate::credentials::CredentialMapping;

/// Anything that can answer "what is this user's password".
pub trait CredentialSource: Send + Sync + 'static {
    fn lookup(&self, username: &str) -> Option<String>;
}

/// Holds exactly one `CredentialMapping` at a time.
///
/// Readers take the read lock only long enough to clone the `Arc`, so a
/// lookup never waits on anything but a pointer swap. Writers replace the
/// whole mapping; entries are never edited in place.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Arc<CredentialMapping>>,
}

impl CredentialStore {
    pub fn new(initial: CredentialMapping) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The mapping in effect right now.
    pub fn snapshot(&self) -> Arc<CredentialMapping> {
        // a poisoned lock still guards a complete Arc
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lookup(&self, username: &str) -> Option<String> {
        self.snapshot().get(username).map(str::to_string)
    }

    /// Plain equality check against the stored password.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.snapshot().get(username) == Some(password)
    }

    /// Install `mapping` in place of the current one.
    pub fn replace(&self, mapping: CredentialMapping) {
        let next = Arc::new(mapping);
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };
        drop(previous);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl CredentialSource for CredentialStore {
    fn lookup(&self, username: &str) -> Option<String> {
        CredentialStore::lookup(self, username)
    }
}
