//! Catalog record and its canonical/fingerprint forms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::canonical_identity;

/// Field holding the raw record key (catalog number).
pub const IDENTITY_FIELD: &str = "Number";

/// Field holding the link to the record's detail page.
pub const DETAIL_URL_FIELD: &str = "Number URL";

/// The canonical column set. Order matters only for presentation; the
/// canonical form and fingerprint sort by field name regardless.
pub const COLUMNS: &[&str] = &[
    "Status",
    "Number URL",
    "Number",
    "Company",
    "Product",
    "Class",
    "Schedule",
    "Ingredient",
    "Strength",
    "Current status date",
    "Original market date",
    "Dosage form",
    "Route of administration",
];

/// One catalog record: a mapping of named string fields.
///
/// Records are immutable once inserted into the accumulator; later strategies
/// re-discovering the same identity are ignored (first-seen wins).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Record {
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from field pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a field value, empty string when missing.
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Set a field only when it is currently empty.
    pub fn set_if_empty(&mut self, name: &str, value: impl Into<String>) {
        if self.get(name).is_empty() {
            self.fields.insert(name.to_string(), value.into());
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Raw identity as extracted from the listing.
    pub fn raw_identity(&self) -> &str {
        self.get(IDENTITY_FIELD)
    }

    /// Canonical identity: digits only, empty when unresolvable.
    pub fn identity(&self) -> String {
        canonical_identity(self.raw_identity())
    }

    /// Canonical form for diffing: exactly the canonical column set, missing
    /// fields as empty strings, line endings normalized to LF, trimmed. The
    /// identity field is reduced to its canonical digits so punctuation and
    /// spacing variants of the same number fingerprint identically.
    pub fn canonicalized(&self) -> Record {
        let fields = COLUMNS
            .iter()
            .map(|&col| {
                let value = if col == IDENTITY_FIELD {
                    self.identity()
                } else {
                    self.get(col)
                        .replace("\r\n", "\n")
                        .replace('\r', "\n")
                        .trim()
                        .to_string()
                };
                (col.to_string(), value)
            })
            .collect();
        Record { fields }
    }

    /// Deterministic content hash over the canonical form.
    ///
    /// `BTreeMap` serializes sorted by field name, so the fingerprint is
    /// stable under field order, insignificant whitespace at value edges, and
    /// line-ending variants.
    pub fn fingerprint(&self) -> String {
        let canon = self.canonicalized();
        let serialized =
            serde_json::to_string(&canon.fields).expect("string map serialization cannot fail");
        let digest = Sha256::digest(serialized.as_bytes());
        hex::encode(digest)
    }
}
