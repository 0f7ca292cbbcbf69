//! Citation store (C10): typed citation collection with invariants, stable
//! (de)serialization, and `cite_NNN` id allocation.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("citation {0} failed validation: {1}")]
    InvalidCitation(String, String),
    #[error("duplicate citation id: {0}")]
    DuplicateId(String),
    #[error("citation {0} not found")]
    NotFound(String),
    #[error("failed to serialize citation database: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to read citation database file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Journal,
    Conference,
    Book,
    Report,
    Website,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CitationStyle {
    #[serde(rename = "APA7")]
    Apa7,
    #[serde(rename = "IEEE")]
    Ieee,
    #[serde(rename = "Chicago")]
    Chicago,
    #[serde(rename = "MLA")]
    Mla,
}

/// A single bibliographic record. Fields beyond the required core are
/// optional and omitted from serialization when empty, matching the
/// sparse `to_dict()` the source format uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub authors: Vec<String>,
    pub year: i32,
    pub title: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Citation {
    /// Number of optional fields populated, used by the deduplicator to pick
    /// the richest record among duplicates.
    pub fn completeness_score(&self) -> u32 {
        let mut score = 0;
        if self.doi.is_some() {
            score += 1;
        }
        if self.url.is_some() {
            score += 1;
        }
        if !self.authors.is_empty() {
            score += 1;
        }
        score += 1; // year is always present
        if self.journal.is_some() {
            score += 1;
        }
        if self.title.len() > 10 {
            score += 1;
        }
        if self.api_source.as_deref() != Some("grounded-web") {
            score += 1; // prefer academic sources, mirrors the original's bonus
        }
        score
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.id.starts_with("cite_") {
            return Err(format!("id '{}' must start with 'cite_'", self.id));
        }
        if self.authors.is_empty() {
            return Err("must have at least one author".to_string());
        }
        let current_year = Utc::now().year();
        if self.year < 1900 || self.year > current_year + 2 {
            return Err(format!(
                "year {} outside valid range 1900..={}",
                self.year,
                current_year + 2
            ));
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if matches!(self.source_type, SourceType::Journal) && self.journal.is_none() {
            // Strongly preferred, not fatal: surfaced by the quality filter instead.
        }
        if let Some(doi) = &self.doi {
            if !doi.starts_with("10.") {
                return Err(format!("doi '{doi}' must start with '10.'"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub total_citations: usize,
    pub citation_style: CitationStyle,
    pub draft_language: String,
    pub extracted_date: String,
}

/// Serializes the citation map as a plain array, matching the documented
/// `{citations: [<Citation>], metadata: {...}}` artifact layout rather than
/// exposing the internal `id -> Citation` map shape.
mod citations_as_vec {
    use super::Citation;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(map: &BTreeMap<String, Citation>, s: S) -> Result<S::Ok, S::Error> {
        let values: Vec<&Citation> = map.values().collect();
        values.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, Citation>, D::Error> {
        let values: Vec<Citation> = Vec::deserialize(d)?;
        Ok(values.into_iter().map(|c| (c.id.clone(), c)).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationDatabase {
    #[serde(with = "citations_as_vec")]
    citations: BTreeMap<String, Citation>,
    pub metadata: DatabaseMetadata,
}

impl CitationDatabase {
    pub fn new(citation_style: CitationStyle, draft_language: impl Into<String>) -> Self {
        CitationDatabase {
            citations: BTreeMap::new(),
            metadata: DatabaseMetadata {
                total_citations: 0,
                citation_style,
                draft_language: draft_language.into(),
                extracted_date: Utc::now().to_rfc3339(),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Citation> {
        self.citations.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Citation> {
        self.citations.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.citations.keys()
    }

    /// Next id of the form `cite_{max+1:03}`, or `cite_001` when empty.
    pub fn next_id(&self) -> String {
        let max = self
            .citations
            .keys()
            .filter_map(|id| id.strip_prefix("cite_"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("cite_{:03}", max + 1)
    }

    /// Insert a citation, allocating an id if it doesn't already have one
    /// ending with the sentinel empty string. Returns the final id.
    pub fn insert(&mut self, mut citation: Citation) -> Result<String, StoreError> {
        if citation.id.is_empty() {
            citation.id = self.next_id();
        }
        citation
            .validate()
            .map_err(|e| StoreError::InvalidCitation(citation.id.clone(), e))?;
        if self.citations.contains_key(&citation.id) {
            return Err(StoreError::DuplicateId(citation.id));
        }
        let id = citation.id.clone();
        self.citations.insert(id.clone(), citation);
        self.metadata.total_citations = self.citations.len();
        Ok(id)
    }

    /// Replace a citation in place, keeping its id. Used by the deduplicator
    /// and enricher for field updates.
    pub fn replace(&mut self, citation: Citation) -> Result<(), StoreError> {
        citation
            .validate()
            .map_err(|e| StoreError::InvalidCitation(citation.id.clone(), e))?;
        if !self.citations.contains_key(&citation.id) {
            return Err(StoreError::NotFound(citation.id));
        }
        self.citations.insert(citation.id.clone(), citation);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Citation> {
        let removed = self.citations.remove(id);
        self.metadata.total_citations = self.citations.len();
        removed
    }

    pub fn remove_by<F>(&mut self, mut predicate: F) -> Vec<Citation>
    where
        F: FnMut(&Citation) -> bool,
    {
        let ids_to_remove: Vec<String> = self
            .citations
            .iter()
            .filter(|(_, c)| predicate(c))
            .map(|(id, _)| id.clone())
            .collect();
        let removed = ids_to_remove
            .into_iter()
            .filter_map(|id| self.citations.remove(&id))
            .collect();
        self.metadata.total_citations = self.citations.len();
        removed
    }

    /// Validates every stored citation and the `total_citations` invariant,
    /// auto-correcting the latter with a warning rather than failing.
    pub fn validate_all(&mut self) -> Result<Vec<String>, StoreError> {
        let mut warnings = Vec::new();
        for (id, citation) in self.citations.iter() {
            citation
                .validate()
                .map_err(|e| StoreError::InvalidCitation(id.clone(), e))?;
        }
        if self.metadata.total_citations != self.citations.len() {
            warnings.push(format!(
                "total_citations metadata ({}) did not match stored count ({}); corrected",
                self.metadata.total_citations,
                self.citations.len()
            ));
            self.metadata.total_citations = self.citations.len();
        }
        Ok(warnings)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, StoreError> {
        let mut db: CitationDatabase = serde_json::from_str(data)?;
        db.validate_all()?;
        Ok(db)
    }

    pub fn save(&self, path: &std::path::Path) -> Result<(), StoreError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &std::path::Path) -> Result<Self, StoreError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, year: i32) -> Citation {
        Citation {
            id: id.to_string(),
            authors: vec!["Doe, J".to_string()],
            year,
            title: "A study of things".to_string(),
            source_type: SourceType::Journal,
            journal: Some("Journal of Things".to_string()),
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi: None,
            url: None,
            access_date: None,
            abstract_text: None,
            api_source: Some("crossref".to_string()),
            language: None,
        }
    }

    #[test]
    fn allocates_sequential_ids() {
        let mut db = CitationDatabase::new(CitationStyle::Apa7, "en");
        let mut c = sample("", 2020);
        c.id = String::new();
        let id1 = db.insert(c.clone()).unwrap();
        let id2 = db.insert(c).unwrap();
        assert_eq!(id1, "cite_001");
        assert_eq!(id2, "cite_002");
    }

    #[test]
    fn rejects_doi_without_prefix() {
        let mut c = sample("cite_001", 2020);
        c.doi = Some("not-a-doi".to_string());
        assert!(c.validate().is_err());
    }

    #[test]
    fn boundary_year_current_plus_two_accepted() {
        let current = Utc::now().year();
        let mut c = sample("cite_001", current + 2);
        assert!(c.validate().is_ok());
        c.year = current + 3;
        assert!(c.validate().is_err());
    }

    #[test]
    fn total_citations_autocorrects_on_mismatch() {
        let mut db = CitationDatabase::new(CitationStyle::Apa7, "en");
        db.insert(sample("cite_001", 2020)).unwrap();
        db.metadata.total_citations = 99;
        let warnings = db.validate_all().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(db.metadata.total_citations, 1);
    }

    #[test]
    fn serialize_roundtrip_preserves_contents() {
        let mut db = CitationDatabase::new(CitationStyle::Ieee, "en");
        db.insert(sample("cite_001", 2020)).unwrap();
        let json = db.to_json().unwrap();
        let db2 = CitationDatabase::from_json(&json).unwrap();
        assert_eq!(db2.len(), 1);
        assert_eq!(db2.get("cite_001").unwrap().title, "A study of things");
    }
}
