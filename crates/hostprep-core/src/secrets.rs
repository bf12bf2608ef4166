//! Secret store: the single commit point for secret fields
//!
//! `commit()` is the only way the wizard writes secrets. The first commit
//! appends plaintext to a 0600 document and seals it immediately; every later
//! commit goes through [`Vault::append_sealed`]. Either way the document on
//! disk is sealed exactly once per commit and is never sealed twice over.

use std::path::{Path, PathBuf};

use crate::document::{DocumentWriter, Entry};
use crate::error::Result;
use crate::vault::{self, Vault};

/// Permission-restricted, encrypted-at-rest document
#[derive(Debug)]
pub struct SecretStore {
    writer: DocumentWriter,
    vault: Vault,
}

impl SecretStore {
    /// Secret store at `path`, sealed with `vault`
    pub fn new(path: impl Into<PathBuf>, vault: Vault) -> Self {
        Self {
            writer: DocumentWriter::restricted(path),
            vault,
        }
    }

    /// Document path
    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Vault used to seal the document
    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Add `entries` and leave the document sealed
    pub async fn commit(&self, entries: &[Entry]) -> Result<()> {
        if vault::is_sealed(self.path()).await? {
            tracing::debug!(path = %self.path().display(), "Document sealed, merging in memory");
            self.vault.append_sealed(self.path(), entries).await
        } else {
            self.writer.append(entries).await?;
            self.vault.seal(self.path()).await
        }
    }

    /// Decrypt and parse the current entries
    pub async fn entries(&self) -> Result<Vec<Entry>> {
        let text = self.vault.unseal(self.path()).await?;
        crate::document::read_entries(&text)
    }

    /// Remove a document left by a previous run
    pub async fn reset(&self) -> Result<()> {
        self.writer.reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::Passphrase;
    use tempfile::tempdir;

    fn store(path: PathBuf) -> SecretStore {
        let vault = Vault::new(Passphrase::new("vault-pass").unwrap());
        SecretStore::new(path, vault)
    }

    #[tokio::test]
    async fn test_first_commit_seals() {
        let dir = tempdir().unwrap();
        let store = store(dir.path().join("secret.yml"));

        store
            .commit(&[Entry::text("user_password", "hunter22")])
            .await
            .unwrap();

        assert!(vault::is_sealed(store.path()).await.unwrap());
        assert_eq!(
            store.entries().await.unwrap(),
            vec![Entry::text("user_password", "hunter22")]
        );
    }

    #[tokio::test]
    async fn test_second_commit_is_one_coherent_document() {
        let dir = tempdir().unwrap();
        let store = store(dir.path().join("secret.yml"));

        store
            .commit(&[Entry::text("user_password", "hunter22")])
            .await
            .unwrap();
        store
            .commit(&[
                Entry::text("email_login", "me@example.com"),
                Entry::text("email_password", "smtp-pass"),
            ])
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.matches(vault::VAULT_HEADER).count(), 1);

        assert_eq!(
            store.entries().await.unwrap(),
            vec![
                Entry::text("user_password", "hunter22"),
                Entry::text("email_login", "me@example.com"),
                Entry::text("email_password", "smtp-pass"),
            ]
        );
    }
}
