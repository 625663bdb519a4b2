//! Flat credential file parsing.
//!
//! The file holds one `user = password` entry per line. Lines without `=`,
//! blank lines and entries whose password trims to nothing are skipped, so a
//! malformed line never fails a load. Only I/O can.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credential file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Username to password table. Built once per load and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialMapping {
    entries: HashMap<String, String>,
}

impl CredentialMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.entries.get(username).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for CredentialMapping
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Parse credential file content. Later duplicates of a key replace earlier ones.
pub fn parse_credentials(content: &str) -> CredentialMapping {
    let mut entries = HashMap::new();
    for line in content.trim_end_matches('\r').split('\n') {
        // split at the first '=' only; the password may contain '='
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        entries.insert(key.trim().to_string(), value.to_string());
    }
    CredentialMapping { entries }
}

/// Read and parse the credential file at `path`.
pub async fn load_credentials(
    path: impl AsRef<Path>,
) -> Result<CredentialMapping, CredentialError> {
    let path = path.as_ref();
    let bytes = fs::read(path).await.map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mapping = parse_credentials(&String::from_utf8_lossy(&bytes));
    tracing::debug!(path = %path.display(), entries = mapping.len(), "parsed credential file");
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_simple_entry() {
        let mapping = parse_credentials("key=value\n");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("key"), Some("value"));
    }

    #[test]
    fn test_value_keeps_later_separators() {
        let mapping = parse_credentials("a=b=c\n");
        assert_eq!(mapping.get("a"), Some("b=c"));
    }

    #[test]
    fn test_empty_value_is_skipped() {
        assert!(parse_credentials("novalue=\n").is_empty());
        assert!(parse_credentials("novalue =   \n").is_empty());
    }

    #[test]
    fn test_line_without_separator_is_skipped() {
        assert!(parse_credentials("noequals\n").is_empty());
        assert!(parse_credentials("\n\n\n").is_empty());
        assert!(parse_credentials("").is_empty());
    }

    #[test]
    fn test_whitespace_and_crlf_are_trimmed() {
        let mapping = parse_credentials("  alice =  secret \r\nbob=pw\r\n");
        assert_eq!(mapping.get("alice"), Some("secret"));
        assert_eq!(mapping.get("bob"), Some("pw"));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let mapping = parse_credentials("u=first\nu=second\n");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("u"), Some("second"));
    }

    #[test]
    fn test_empty_key_is_accepted() {
        let mapping = parse_credentials("=orphan\n");
        assert_eq!(mapping.get(""), Some("orphan"));
    }

    #[test]
    fn test_mixed_file() {
        let content = "# comment line\nalice = secret\nbroken line\nempty=\nbob = p=w\n";
        let mapping = parse_credentials(content);
        let expected: CredentialMapping =
            [("alice", "secret"), ("bob", "p=w")].into_iter().collect();
        assert_eq!(mapping, expected);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "u = p").unwrap();
        file.flush().unwrap();
        let mapping = load_credentials(&path).await.unwrap();
        assert_eq!(mapping.get("u"), Some("p"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_credentials(dir.path().join("missing")).await;
        assert!(matches!(result, Err(CredentialError::Io { .. })));
    }
}
