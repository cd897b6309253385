//src/types.rs

use ahash::AHashMap;

use crate::error::{Result, UmiError};

/// The view of an aligned read the UMI machinery needs: a name for error
/// messages and string-valued tags.
pub trait TaggedRecord {
    fn name(&self) -> &str;
    fn get_tag(&self, tag: &str) -> Option<&str>;
    fn set_tag(&mut self, tag: &str, value: String);
    fn remove_tag(&mut self, tag: &str);

    /// The tag's value, treating an empty string the same as an absent tag.
    fn umi(&self, tag: &str) -> Option<&str> {
        self.get_tag(tag).filter(|umi| !umi.is_empty())
    }
}

/// A minimal in-memory read: a name plus its string tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Read {
    pub name: String,
    pub tags: AHashMap<String, String>,
}

impl Read {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), tags: AHashMap::new() }
    }

    pub fn with_tag(mut self, tag: &str, value: impl Into<String>) -> Self {
        self.tags.insert(tag.to_string(), value.into());
        self
    }
}

impl TaggedRecord for Read {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_tag(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    fn set_tag(&mut self, tag: &str, value: String) {
        self.tags.insert(tag.to_string(), value);
    }

    fn remove_tag(&mut self, tag: &str) {
        self.tags.remove(tag);
    }
}

/// Reads judged to be duplicates of each other, with one of them designated
/// as the representative.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateSet<R> {
    records: Vec<R>,
    representative: usize,
}

impl<R> DuplicateSet<R> {
    /// Builds a set whose representative is the first record.
    pub fn new(records: Vec<R>) -> Result<Self> {
        Self::with_representative(records, 0)
    }

    pub fn with_representative(records: Vec<R>, representative: usize) -> Result<Self> {
        if records.is_empty() {
            return Err(UmiError::EmptyDuplicateSet);
        }
        if representative >= records.len() {
            return Err(UmiError::InvalidParameter {
                parameter: "representative".to_string(),
                reason: format!(
                    "index {representative} out of range for {} records",
                    records.len()
                ),
            });
        }
        Ok(Self { records, representative })
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn representative(&self) -> &R {
        &self.records[self.representative]
    }

    pub fn representative_index(&self) -> usize {
        self.representative
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}
