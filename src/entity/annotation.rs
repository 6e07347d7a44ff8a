use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Ordered map of string attributes attached to an annotation (e.g. `TYPE=DOCTOR`). A missing
/// key is read as the empty string, so `{}` and `{"TYPE": ""}` are equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Value of `key`, or `""` when the key is missing.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Do both maps hold the same value for `key`?
    #[inline]
    pub fn agrees_on(&self, other: &Properties, key: &str) -> bool {
        self.get(key) == other.get(key)
    }

    /// Keys, present on either side, whose values differ.
    pub fn differing_keys<'a>(&'a self, other: &'a Properties) -> BTreeSet<&'a str> {
        self.keys()
            .chain(other.keys())
            .filter(|k| !self.agrees_on(other, k))
            .collect()
    }

    /// Equality where a missing key equals the empty string.
    pub fn equivalent(&self, other: &Properties) -> bool {
        self.differing_keys(other).is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A span tagged by a human annotator. The `label` is the tag name of the markup element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotatedSpan {
    #[serde(alias = "name")]
    pub label: String,
    #[serde(default)]
    pub text: String,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub properties: Properties,
}

impl AnnotatedSpan {
    pub fn new<L: Into<String>, T: Into<String>>(
        label: L,
        text: T,
        start: usize,
        end: usize,
    ) -> Self {
        AnnotatedSpan {
            label: label.into(),
            text: text.into(),
            start,
            end,
            properties: Properties::default(),
        }
    }

    pub fn with_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Same offsets, text, label and (equivalent) properties.
    pub(crate) fn same_annotation(&self, other: &AnnotatedSpan) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.text == other.text
            && self.label == other.label
            && self.properties.equivalent(&other.properties)
    }
}

impl Display for AnnotatedSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.label, self.start, self.end)
    }
}

/// The annotations of one annotator on one file. `source_id` identifies the annotator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnnotatedDocument {
    #[serde(alias = "sourceId")]
    pub source_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<AnnotatedSpan>,
}

impl AnnotatedDocument {
    pub fn new<S: Into<String>, T: Into<String>>(
        source_id: S,
        text: T,
        spans: Vec<AnnotatedSpan>,
    ) -> Self {
        AnnotatedDocument {
            source_id: source_id.into(),
            text: text.into(),
            spans,
        }
    }

    pub fn labels(&self) -> BTreeSet<&str> {
        self.spans.iter().map(|s| s.label.as_str()).collect()
    }
}

/// Every annotator's document for one file of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileAnnotations {
    #[serde(alias = "fileId")]
    pub file_id: String,
    pub documents: Vec<AnnotatedDocument>,
}

impl FileAnnotations {
    pub fn new<S: Into<String>>(file_id: S, documents: Vec<AnnotatedDocument>) -> Self {
        FileAnnotations {
            file_id: file_id.into(),
            documents,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_property_equals_empty_string() {
        let left: Properties = [("TYPE", "DOCTOR"), ("COMMENT", "")].into_iter().collect();
        let right: Properties = [("TYPE", "DOCTOR")].into_iter().collect();
        assert!(left.equivalent(&right));
        assert!(left.agrees_on(&right, "COMMENT"));
        assert!(left.agrees_on(&right, "UNKNOWN"));
        assert_ne!(left, right);
    }

    #[test]
    fn test_differing_keys_sees_both_sides() {
        let left: Properties = [("TYPE", "DOCTOR"), ("RISK", "fall")].into_iter().collect();
        let right: Properties = [("TYPE", "NURSE"), ("EXTRA", "x")].into_iter().collect();
        let keys: Vec<&str> = left.differing_keys(&right).into_iter().collect();
        assert_eq!(keys, vec!["EXTRA", "RISK", "TYPE"]);
    }

    #[test]
    fn test_document_deserializes_markup_parser_output() {
        let json = r#"{
            "sourceId": "grader_a.xml",
            "text": "Seen by Dr. Smith.",
            "spans": [{"name": "DOCTOR", "text": "Smith", "start": 12, "end": 17,
                       "properties": {"TYPE": "DOCTOR"}}]
        }"#;
        let document: AnnotatedDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.source_id, "grader_a.xml");
        assert_eq!(document.spans[0].label, "DOCTOR");
        assert_eq!(document.spans[0].properties.get("TYPE"), "DOCTOR");
        assert_eq!(document.labels().into_iter().collect::<Vec<_>>(), vec!["DOCTOR"]);
    }
}
