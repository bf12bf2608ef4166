// # Configuration Documents
//
// Line-oriented `key: "value"` documents consumed by the deployment engine.
//
// ## File Format
//
// ```text
// # Generated by hostprep on 2026-10-18T12:00:00+00:00
// username: "alice"
// enable_adguard_unbound_doh: false
// root_host: "vpn.example.com"
// ```
//
// Text values are double-quoted with `\`, `"` and newlines escaped; booleans
// are bare. Entries keep insertion order and are never deduplicated: a key
// appended twice appears twice and the consumer decides which one wins.
//
// ## Permissions
//
// A restricted writer creates its file with mode 0600 and re-applies 0600
// after every write, so the document is never readable by other users once it
// holds data.

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Owner read/write only
pub const RESTRICTED_MODE: u32 = 0o600;

/// Document value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Rendered double-quoted
    Text(String),
    /// Rendered bare (`true` / `false`)
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => write!(f, "\"{}\"", escape(text)),
            Value::Bool(flag) => write!(f, "{}", flag),
        }
    }
}

/// One `key: value` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Setting name
    pub key: String,
    /// Setting value
    pub value: Value,
}

impl Entry {
    /// Text entry
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::Text(value.into()),
        }
    }

    /// Boolean entry
    pub fn flag(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: Value::Bool(value),
        }
    }

    /// Render as a single line (without newline)
    pub fn render(&self) -> String {
        format!("{}: {}", self.key, self.value)
    }
}

/// Keys are `[A-Za-z0-9_]+`
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Comment line written at the top of a fresh document
pub fn header_line() -> String {
    format!("# Generated by hostprep on {}", chrono::Utc::now().to_rfc3339())
}

/// Render entries, one per line, each newline-terminated
pub fn render_entries(entries: &[Entry]) -> String {
    entries.iter().fold(String::new(), |mut out, entry| {
        out.push_str(&entry.render());
        out.push('\n');
        out
    })
}

/// Parse document text back into entries
///
/// Blank lines and `#` comments are skipped. Duplicate keys are preserved.
pub fn read_entries(text: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let (key, raw) = line.split_once(": ").ok_or_else(|| {
            Error::invalid_input(format!("line {}: expected `key: value`", index + 1))
        })?;

        if !is_valid_key(key) {
            return Err(Error::invalid_input(format!(
                "line {}: invalid key '{}'",
                index + 1,
                key
            )));
        }

        let value = match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            quoted if quoted.len() >= 2 && quoted.starts_with('"') && quoted.ends_with('"') => {
                Value::Text(unescape(&quoted[1..quoted.len() - 1]).map_err(|e| {
                    Error::invalid_input(format!("line {}: {}", index + 1, e))
                })?)
            }
            other => {
                return Err(Error::invalid_input(format!(
                    "line {}: unquoted value '{}'",
                    index + 1,
                    other
                )));
            }
        };

        entries.push(Entry {
            key: key.to_string(),
            value,
        });
    }

    Ok(entries)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(text: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some(other) => return Err(format!("unknown escape '\\{}'", other)),
            None => return Err("dangling escape".to_string()),
        }
    }
    Ok(out)
}

/// Appends entries to one document on disk
#[derive(Debug, Clone)]
pub struct DocumentWriter {
    path: PathBuf,
    restricted: bool,
}

impl DocumentWriter {
    /// Writer for a document with default permissions
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            restricted: false,
        }
    }

    /// Writer that keeps the document at mode 0600
    pub fn restricted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            restricted: true,
        }
    }

    /// Document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether writes re-apply 0600
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Append entries in order, creating the document if needed
    ///
    /// Fails with [`Error::SealedDocument`] if the document is already sealed.
    pub async fn append(&self, entries: &[Entry]) -> Result<()> {
        if crate::vault::is_sealed(&self.path).await? {
            return Err(Error::SealedDocument(self.path.display().to_string()));
        }

        for entry in entries {
            if !is_valid_key(&entry.key) {
                return Err(Error::invalid_input(format!(
                    "invalid document key '{}'",
                    entry.key
                )));
            }
        }

        let fresh = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let mut buffer = String::new();
        if fresh {
            buffer.push_str(&header_line());
            buffer.push('\n');
        }
        buffer.push_str(&render_entries(entries));

        let mut options = fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            if self.restricted {
                options.mode(RESTRICTED_MODE);
            }
        }

        let mut file = options.open(&self.path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {}: {}", self.path.display(), e),
            ))
        })?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        if self.restricted {
            restrict_permissions(&self.path).await?;
        }

        tracing::debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "Appended entries"
        );
        Ok(())
    }

    /// Remove the document so the run starts from empty
    pub async fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Discarded document left by a previous run"
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and parse the (plaintext) document
    pub async fn read(&self) -> Result<Vec<Entry>> {
        let text = fs::read_to_string(&self.path).await?;
        read_entries(&text)
    }
}

/// Set mode 0600 on `path`
pub async fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(RESTRICTED_MODE)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_render_text_and_bool() {
        assert_eq!(Entry::text("username", "alice").render(), "username: \"alice\"");
        assert_eq!(Entry::flag("feature", false).render(), "feature: false");
        assert_eq!(
            Entry::text("quote", "say \"hi\" \\o/").render(),
            r#"quote: "say \"hi\" \\o/""#
        );
    }

    #[test]
    fn test_read_entries_round_trips_escapes() {
        let entries = vec![
            Entry::text("password", "p\"a\\ss\nword"),
            Entry::flag("enabled", true),
        ];
        let text = format!("# comment\n\n{}", render_entries(&entries));
        assert_eq!(read_entries(&text).unwrap(), entries);
    }

    #[test]
    fn test_read_entries_keeps_duplicates() {
        let text = "a: \"1\"\na: \"2\"\n";
        let entries = read_entries(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], Entry::text("a", "2"));
    }

    #[test]
    fn test_read_entries_rejects_garbage() {
        assert!(read_entries("no separator here").is_err());
        assert!(read_entries("bad key: \"x\"").is_err());
        assert!(read_entries("key: unquoted").is_err());
        assert!(read_entries("key: \"bad \\q escape\"").is_err());
    }

    #[tokio::test]
    async fn test_append_preserves_order_and_duplicates() {
        let dir = tempdir().unwrap();
        let writer = DocumentWriter::new(dir.path().join("custom.yml"));

        writer
            .append(&[Entry::text("username", "alice"), Entry::flag("x", false)])
            .await
            .unwrap();
        writer.append(&[Entry::text("username", "bob")]).await.unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert!(text.starts_with("# Generated by hostprep on "));
        assert_eq!(text.matches("# Generated").count(), 1);

        let entries = writer.read().await.unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::text("username", "alice"),
                Entry::flag("x", false),
                Entry::text("username", "bob"),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restricted_writer_keeps_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("secret.yml");
        let writer = DocumentWriter::restricted(&path);

        writer.append(&[Entry::text("user_password", "hunter22")]).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        // Loosened by someone else, restored on the next write
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        writer.append(&[Entry::text("email_login", "me")]).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn test_reset_removes_document() {
        let dir = tempdir().unwrap();
        let writer = DocumentWriter::new(dir.path().join("custom.yml"));

        writer.reset().await.unwrap();
        writer.append(&[Entry::text("a", "b")]).await.unwrap();
        assert!(writer.path().exists());

        writer.reset().await.unwrap();
        assert!(!writer.path().exists());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let dir = tempdir().unwrap();
        let writer = DocumentWriter::new(dir.path().join("custom.yml"));
        assert!(writer.append(&[Entry::text("bad key", "x")]).await.is_err());
    }
}
