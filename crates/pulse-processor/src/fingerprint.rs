use pulse_core::CleanRecord;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// SHA-256 digest of a record's canonical text.
///
/// Case, punctuation and spacing do not contribute, so
/// `"Nifty50 Breaking Out, BUY NOW!!"` and `"nifty50 breaking out buy now"`
/// share a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentFingerprint([u8; 32]);

impl ContentFingerprint {
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        Self::digest(&canonical_key(text))
    }

    /// Fingerprint of a record's normalized text, optionally prefixed by the
    /// lowercased author so that two authors posting the same text differ.
    #[must_use]
    pub fn of_record(record: &CleanRecord, scope_by_author: bool) -> Self {
        let key = canonical_key(&record.normalized_text);
        if scope_by_author {
            let author: String = record
                .raw
                .author
                .nfc()
                .collect::<String>()
                .to_lowercase();
            Self::digest(&format!("{author}\u{1f}{key}"))
        } else {
            Self::digest(&key)
        }
    }

    fn digest(key: &str) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&Sha256::digest(key.as_bytes()));
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// NFC, lowercase, every non-alphanumeric run replaced by a single space.
#[must_use]
pub fn canonical_key(text: &str) -> String {
    let folded: String = text
        .nfc()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
