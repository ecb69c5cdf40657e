// Form data model: field values, attachments, and the record trait the engine mutates through

use super::error::FieldError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reference to a file the applicant attached. The engine never holds file contents, only
/// enough to identify the upload later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub path: PathBuf,
}

impl FileRef {
    /// Build a reference by reading and fingerprinting the file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Attachment is not readable: {:?}", path))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("Attachment path has no file name: {:?}", path))?;

        Ok(Self {
            file_name,
            size_bytes: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(&bytes)),
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Flag(bool),
    Text(String),
    File(FileRef),
    Nested(FormMap),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRef> {
        match self {
            FieldValue::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<FileRef> for FieldValue {
    fn from(value: FileRef) -> Self {
        FieldValue::File(value)
    }
}

impl From<Option<FileRef>> for FieldValue {
    fn from(value: Option<FileRef>) -> Self {
        value.map(FieldValue::File).unwrap_or(FieldValue::Null)
    }
}

/// A form the wizard engine can write fields into.
///
/// Typed application forms implement this with a fixed key set; `FormMap` implements it as
/// an open string-keyed bag.
pub trait FormRecord: Clone + Serialize + Send + Sync {
    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<(), FieldError>;

    fn field(&self, key: &str) -> Option<FieldValue>;
}

/// Open string-keyed form data. Writing `Null` clears the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormMap(BTreeMap<String, FieldValue>);

impl FormMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        let key = key.into();
        if value.is_null() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(FieldValue::as_flag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FormRecord for FormMap {
    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<(), FieldError> {
        if value.is_null() {
            self.0.remove(key);
        } else {
            self.0.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        self.0.get(key).cloned()
    }
}

// Helpers for typed records: coerce an incoming value into the field's declared kind.
// `Null` clears text to empty, flags to false, and attachments to none.

pub fn expect_text(key: &str, value: FieldValue) -> Result<String, FieldError> {
    match value {
        FieldValue::Text(s) => Ok(s),
        FieldValue::Null => Ok(String::new()),
        _ => Err(FieldError::TypeMismatch {
            key: key.to_string(),
            expected: "text",
        }),
    }
}

pub fn expect_flag(key: &str, value: FieldValue) -> Result<bool, FieldError> {
    match value {
        FieldValue::Flag(b) => Ok(b),
        FieldValue::Null => Ok(false),
        _ => Err(FieldError::TypeMismatch {
            key: key.to_string(),
            expected: "boolean",
        }),
    }
}

/// Whole number typed as text; blank text or `Null` clears it.
pub fn expect_count(key: &str, value: FieldValue) -> Result<Option<u32>, FieldError> {
    let mismatch = || FieldError::TypeMismatch {
        key: key.to_string(),
        expected: "whole number",
    };
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Text(s) if s.trim().is_empty() => Ok(None),
        FieldValue::Text(s) => s.trim().parse::<u32>().map(Some).map_err(|_| mismatch()),
        _ => Err(mismatch()),
    }
}

pub fn expect_file(key: &str, value: FieldValue) -> Result<Option<FileRef>, FieldError> {
    match value {
        FieldValue::File(f) => Ok(Some(f)),
        FieldValue::Null => Ok(None),
        _ => Err(FieldError::TypeMismatch {
            key: key.to_string(),
            expected: "file",
        }),
    }
}
