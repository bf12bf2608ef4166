// # Vault (Encryptor)
//
// Password-based encryption of whole documents, in the Ansible Vault 1.1
// format so `ansible-playbook --ask-vault-pass` reads the sealed files.
//
// ## Envelope Format
//
// ```text
// $ANSIBLE_VAULT;1.1;AES256
// 30303031303230333034303530363037303830393061306230633064306530663130313131323133
// ...
// ```
//
// The lines after the header are the hex encoding (80 columns) of
// `hex(salt) "\n" hex(hmac) "\n" hex(ciphertext)`.
//
// - PBKDF2-HMAC-SHA256, 10000 rounds over a 32-byte salt, yields 80 bytes:
//   AES key, HMAC key and initial counter block.
// - The plaintext is PKCS#7 padded to the AES block size and encrypted with
//   AES-256-CTR.
// - HMAC-SHA256 covers the ciphertext and is checked in constant time before
//   anything is decrypted.
//
// ## Commit Discipline
//
// - `seal()` refuses a document that is already sealed, so bytes are never
//   encrypted twice.
// - `append_sealed()` decrypts in memory, appends and re-seals; plaintext
//   never goes back to disk.
// - Every write goes to a 0600 temp file that is then renamed over the target.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use zeroize::Zeroizing;

use crate::document::{self, Entry};
use crate::error::{Error, Result};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// First line of every sealed document
pub const VAULT_HEADER: &str = "$ANSIBLE_VAULT;1.1;AES256";

const FORMAT_MARKER: &str = "$ANSIBLE_VAULT";
const SUPPORTED_VERSIONS: &[&str] = &["1.1", "1.2"];
const CIPHER_NAME: &str = "AES256";

const SALT_LEN: usize = 32;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const DERIVED_LEN: usize = 2 * KEY_LEN + IV_LEN;
const PBKDF2_ROUNDS: u32 = 10_000;
const LINE_WIDTH: usize = 80;

/// Vault passphrase, never empty
#[derive(Debug)]
pub struct Passphrase(SecretString);

impl Passphrase {
    /// Wrap a passphrase, rejecting empty input
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::invalid_input("Vault passphrase cannot be empty"));
        }
        Ok(Self(SecretString::from(value)))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }
}

/// PBKDF2 output, wiped on drop
struct DerivedKeys(Zeroizing<[u8; DERIVED_LEN]>);

impl DerivedKeys {
    fn cipher(&self) -> Result<Aes256Ctr> {
        Aes256Ctr::new_from_slices(&self.0[..KEY_LEN], &self.0[2 * KEY_LEN..])
            .map_err(|e| Error::encryption(format!("cipher setup failed: {}", e)))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.0[KEY_LEN..2 * KEY_LEN])
            .map_err(|e| Error::encryption(format!("HMAC setup failed: {}", e)))
    }
}

/// Whether `text` is a sealed envelope
pub fn is_envelope(text: &str) -> bool {
    text.starts_with(FORMAT_MARKER) && text[FORMAT_MARKER.len()..].starts_with(';')
}

/// Whether the document at `path` is sealed (`false` if it does not exist)
pub async fn is_sealed(path: &Path) -> Result<bool> {
    match fs::read(path).await {
        Ok(bytes) => Ok(bytes.starts_with(FORMAT_MARKER.as_bytes())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Check the `$ANSIBLE_VAULT;<version>;<cipher>[;<vault id>]` header
fn check_header(header: &str) -> Result<()> {
    let fields: Vec<&str> = header.trim().split(';').collect();
    match fields.as_slice() {
        [marker, version, cipher, ..]
            if *marker == FORMAT_MARKER
                && SUPPORTED_VERSIONS.contains(version)
                && *cipher == CIPHER_NAME =>
        {
            Ok(())
        }
        [marker, ..] if *marker == FORMAT_MARKER => Err(Error::decryption(format!(
            "unsupported vault format: {}",
            header.trim()
        ))),
        _ => Err(Error::decryption("missing vault header")),
    }
}

fn pad(plaintext: &[u8]) -> Zeroizing<Vec<u8>> {
    let fill = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
    let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + fill));
    padded.extend_from_slice(plaintext);
    // fill is 1..=16, always fits a byte
    padded.resize(plaintext.len() + fill, fill as u8);
    padded
}

fn unpad(padded: &[u8]) -> Result<&[u8]> {
    let malformed = || Error::decryption("plaintext padding is malformed");
    let fill = usize::from(*padded.last().ok_or_else(malformed)?);
    if fill == 0 || fill > BLOCK_LEN || fill > padded.len() {
        return Err(malformed());
    }
    let (body, tail) = padded.split_at(padded.len() - fill);
    if tail.iter().any(|&b| usize::from(b) != fill) {
        return Err(malformed());
    }
    Ok(body)
}

fn decode_hex(name: &str, value: &[u8]) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| Error::decryption(format!("{} is not valid hex: {}", name, e)))
}

/// Password-based document encryptor
#[derive(Debug)]
pub struct Vault {
    passphrase: Passphrase,
}

impl Vault {
    pub fn new(passphrase: Passphrase) -> Self {
        Self { passphrase }
    }

    /// Encrypt `plaintext` into envelope text
    pub fn seal_bytes(&self, plaintext: &[u8]) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        self.seal_with_salt(plaintext, &salt)
    }

    fn seal_with_salt(&self, plaintext: &[u8], salt: &[u8]) -> Result<String> {
        let keys = self.derive_keys(salt);

        let mut ciphertext = pad(plaintext);
        keys.cipher()?.apply_keystream(&mut ciphertext);

        let mut mac = keys.mac()?;
        mac.update(&ciphertext);
        let tag = mac.finalize().into_bytes();

        let inner = format!(
            "{}\n{}\n{}",
            hex::encode(salt),
            hex::encode(tag),
            hex::encode(&*ciphertext)
        );
        let encoded = hex::encode(inner);

        let mut out = String::with_capacity(VAULT_HEADER.len() + encoded.len() * 2);
        out.push_str(VAULT_HEADER);
        out.push('\n');
        for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
            // hex output is ASCII
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }
        Ok(out)
    }

    /// Decrypt envelope text
    pub fn unseal_text(&self, envelope: &str) -> Result<String> {
        let mut lines = envelope.lines();
        check_header(lines.next().unwrap_or_default())?;

        let encoded: String = lines.map(str::trim).collect();
        let inner = decode_hex("envelope", encoded.as_bytes())?;

        let mut parts = inner.split(|&b| b == b'\n');
        let (Some(salt), Some(tag), Some(ciphertext), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::decryption("envelope body is malformed"));
        };
        let salt = decode_hex("salt", salt)?;
        let tag = decode_hex("hmac", tag)?;
        let ciphertext = decode_hex("ciphertext", ciphertext)?;

        let keys = self.derive_keys(&salt);

        let mut mac = keys.mac()?;
        mac.update(&ciphertext);
        mac.verify_slice(&tag)
            .map_err(|_| Error::decryption("wrong passphrase or tampered document"))?;

        let mut padded = Zeroizing::new(ciphertext);
        keys.cipher()?.apply_keystream(&mut padded);

        String::from_utf8(unpad(&padded)?.to_vec())
            .map_err(|e| Error::decryption(format!("plaintext is not UTF-8: {}", e)))
    }
    /// Seal the plaintext document at `path` in place
    pub async fn seal(&self, path: &Path) -> Result<()> {
        let plaintext = fs::read(path).await?;
        if plaintext.starts_with(FORMAT_MARKER.as_bytes()) {
            return Err(Error::AlreadySealed(path.display().to_string()));
        }

        let envelope = self.seal_bytes(&plaintext)?;
        write_atomic(path, envelope.as_bytes()).await?;

        tracing::info!(path = %path.display(), "Sealed document");
        Ok(())
    }

    /// Decrypt the sealed document at `path`
    pub async fn unseal(&self, path: &Path) -> Result<String> {
        let envelope = fs::read_to_string(path).await?;
        self.unseal_text(&envelope)
    }

    /// Decrypt, append `entries` and re-seal, without plaintext touching disk
    pub async fn append_sealed(&self, path: &Path, entries: &[Entry]) -> Result<()> {
        let mut plaintext = Zeroizing::new(self.unseal(path).await?);

        // Refuse to merge into something that is not a document
        document::read_entries(&plaintext)?;

        if !plaintext.is_empty() && !plaintext.ends_with('\n') {
            plaintext.push('\n');
        }
        plaintext.push_str(&document::render_entries(entries));

        let envelope = self.seal_bytes(plaintext.as_bytes())?;
        write_atomic(path, envelope.as_bytes()).await?;

        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            "Re-sealed document with new entries"
        );
        Ok(())
    }

    fn derive_keys(&self, salt: &[u8]) -> DerivedKeys {
        let mut material = Zeroizing::new([0u8; DERIVED_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.passphrase.as_bytes(),
            salt,
            PBKDF2_ROUNDS,
            &mut material[..],
        );
        DerivedKeys(material)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write-then-rename with the temp file restricted to 0600
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp = temp_path(path);

    {
        let mut options = fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            options.mode(document::RESTRICTED_MODE);
        }

        let mut file = options.open(&temp).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create temp file {}: {}", temp.display(), e),
            ))
        })?;
        file.write_all(contents).await?;
        file.flush().await?;
        file.sync_all().await?;
    }

    document::restrict_permissions(&temp).await?;

    fs::rename(&temp, path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to rename {} to {}: {}",
                temp.display(),
                path.display(),
                e
            ),
        ))
    })?;

    tracing::trace!(path = %path.display(), "Envelope written");
    Ok(())
}
