//! Class label registry and field-name aliases.
//!
//! The registry is the single source of the label ↔ class index mapping. The
//! same registry must be used when label files are written and when they are
//! read back; its [`fingerprint`](LabelRegistry::fingerprint) is recorded in
//! `data.yaml` so a reordered or edited list is caught instead of silently
//! mapping boxes to the wrong labels.

use std::collections::{BTreeMap, HashMap};

use crate::error::FieldboxError;

/// Labels used when neither the command line nor a recorded `data.yaml`
/// supplies a registry.
pub const DEFAULT_RECEIPT_LABELS: [&str; 7] = [
    "SellerName",
    "SellerVAT",
    "DocumentDate",
    "ProductDescription",
    "Quantity",
    "Price",
    "TotalDue",
];

/// Ordered, duplicate-free list of class labels. Class index = position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelRegistry {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelRegistry {
    /// Builds a registry, rejecting empty and duplicate labels.
    pub fn new<I, S>(labels: I) -> Result<Self, FieldboxError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(labels.len());

        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(FieldboxError::InvalidLabelRegistry {
                    message: format!("label at index {} is empty", i),
                });
            }
            if let Some(first) = index.insert(label.clone(), i) {
                return Err(FieldboxError::InvalidLabelRegistry {
                    message: format!(
                        "label '{}' appears at both index {} and index {}",
                        label, first, i
                    ),
                });
            }
        }

        Ok(Self { labels, index })
    }

    pub fn receipt_default() -> Self {
        let labels: Vec<String> = DEFAULT_RECEIPT_LABELS.iter().map(|s| s.to_string()).collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self { labels, index }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn label_for(&self, class_index: usize) -> Option<&str> {
        self.labels.get(class_index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// CRC32C over the newline-joined labels, e.g. `crc32c:1a2b3c4d`.
    ///
    /// Order-sensitive: swapping two labels changes the fingerprint.
    pub fn fingerprint(&self) -> String {
        let joined = self.labels.join("\n");
        format!("crc32c:{:08x}", crc32c::crc32c(joined.as_bytes()))
    }

    /// Fails with `LabelRegistryMismatch` unless `recorded` equals this
    /// registry's fingerprint.
    pub fn verify_fingerprint(&self, recorded: &str) -> Result<(), FieldboxError> {
        let found = self.fingerprint();
        if found == recorded.trim() {
            Ok(())
        } else {
            Err(FieldboxError::LabelRegistryMismatch {
                expected: recorded.trim().to_string(),
                found,
            })
        }
    }
}

/// Maps analysis-service field names to registry labels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasMap {
    aliases: BTreeMap<String, String>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, label: impl Into<String>) {
        self.aliases.insert(field.into(), label.into());
    }

    /// Parses `FIELD=LABEL` entries as given on the command line.
    pub fn from_assignments<S: AsRef<str>>(entries: &[S]) -> Result<Self, FieldboxError> {
        let mut map = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            let Some((field, label)) = entry.split_once('=') else {
                return Err(FieldboxError::InvalidLabelRegistry {
                    message: format!("alias '{}' is not of the form FIELD=LABEL", entry),
                });
            };
            let (field, label) = (field.trim(), label.trim());
            if field.is_empty() || label.is_empty() {
                return Err(FieldboxError::InvalidLabelRegistry {
                    message: format!("alias '{}' has an empty side", entry),
                });
            }
            map.insert(field, label);
        }
        Ok(map)
    }

    /// Returns the aliased label, or `name` itself when no alias exists.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}
