//! Static diagnostic knowledge: the problem records and the component map.
//!
//! Both are loaded once and shared read-only by every session.

use motodiag_types::{record_from_value, KnowledgeRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

const FALLBACK_JSON: &str = include_str!("../data/knowledge_fallback.json");

static BUILTIN_RECORDS: Lazy<Vec<KnowledgeRecord>> =
    Lazy::new(|| match parse_records(FALLBACK_JSON, Path::new("<builtin>")) {
        Ok(records) => records,
        Err(e) => {
            error!(error = %e, "built-in knowledge base is unusable");
            Vec::new()
        }
    });

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("read knowledge base at {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse knowledge base at {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("knowledge base at {path:?} must be a JSON array of records")]
    NotAnArray { path: PathBuf },
    #[error("knowledge base at {path:?} has no usable records")]
    Empty { path: PathBuf },
}

/// Ordered, immutable collection of problem records.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    records: Vec<KnowledgeRecord>,
}

impl KnowledgeBase {
    pub fn new(records: Vec<KnowledgeRecord>) -> Self {
        Self { records }
    }

    /// The small default set embedded in the library.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_RECORDS.clone())
    }

    /// Read a JSON array of records. Invalid records are skipped; a file with
    /// no usable records at all is an error.
    pub fn from_path(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = fs::read_to_string(path).map_err(|source| KnowledgeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let records = parse_records(&raw, path)?;
        info!(path = ?path, records = records.len(), "loaded knowledge base");
        Ok(Self::new(records))
    }

    /// Like [`KnowledgeBase::from_path`] but degrades to the built-in set.
    pub fn load_or_fallback(path: &Path) -> Self {
        match Self::from_path(path) {
            Ok(kb) => kb,
            Err(e) => {
                warn!(error = %e, "falling back to built-in knowledge base");
                Self::builtin()
            }
        }
    }

    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_records(raw: &str, origin: &Path) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|source| KnowledgeError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
    let serde_json::Value::Array(items) = value else {
        return Err(KnowledgeError::NotAnArray {
            path: origin.to_path_buf(),
        });
    };

    let mut seen_ids = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match record_from_value(item) {
            Ok(record) => {
                if !seen_ids.insert(record.id.clone()) {
                    warn!(index, id = %record.id, "skipping duplicate knowledge record id");
                    continue;
                }
                records.push(record);
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(index, %reason, "skipping invalid knowledge record");
            }
        }
    }

    if records.is_empty() {
        return Err(KnowledgeError::Empty {
            path: origin.to_path_buf(),
        });
    }
    Ok(records)
}

// ── Component map ───────────────────────────────────────────────────────

/// A physical part the user can inspect, with the words that name it.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub keywords: Vec<String>,
    pub related_problems: Vec<String>,
    pub typical_solutions: Vec<String>,
    mention: Regex,
}

impl Component {
    /// Keywords match at the start of a word, so "akinya" names the aki but
    /// "tapi" does not name the busi.
    pub fn new(
        name: impl Into<String>,
        keywords: Vec<String>,
        related_problems: Vec<String>,
        typical_solutions: Vec<String>,
    ) -> Result<Self, regex::Error> {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(&k.to_lowercase()))
            .collect::<Vec<_>>()
            .join("|");
        let mention = Regex::new(&format!(r"\b(?:{alternation})"))?;
        Ok(Self {
            name: name.into(),
            keywords,
            related_problems,
            typical_solutions,
            mention,
        })
    }

    /// `text` must already be lowercase.
    pub fn mentioned_in(&self, text: &str) -> bool {
        !self.keywords.is_empty() && self.mention.is_match(text)
    }
}

type ComponentRow = (&'static str, &'static [&'static str], &'static [&'static str], &'static [&'static str]);

const BUILTIN_COMPONENTS: &[ComponentRow] = &[
    (
        "aki",
        &["aki", "battery", "accu", "baterai", "listrik"],
        &["susah hidup", "lampu redup", "starter lemah"],
        &["charge aki", "ganti aki", "cek terminal"],
    ),
    (
        "busi",
        &["busi", "spark plug", "pengapian", "api"],
        &["susah hidup", "brebet", "tenaga kurang"],
        &["ganti busi", "bersihkan busi", "setel gap"],
    ),
    (
        "cdi",
        &["cdi", "ecu", "modul", "pengapian"],
        &["susah hidup", "mati mendadak", "tidak ada api"],
        &["ganti cdi", "cek kabel cdi"],
    ),
    (
        "koil",
        &["koil", "coil", "ignition", "pengapian"],
        &["tidak ada api", "api lemah", "susah hidup"],
        &["ganti koil", "cek resistansi koil"],
    ),
    (
        "karburator",
        &["karbu", "karburator", "carburetor", "bensin"],
        &["susah hidup", "boros bensin", "brebet"],
        &["bersihkan karbu", "setel karbu", "ganti jet"],
    ),
    (
        "filter_udara",
        &["filter", "saringan", "udara", "air filter"],
        &["tenaga kurang", "boros bensin", "suara kasar"],
        &["bersihkan filter", "ganti filter"],
    ),
];

/// Ordered component table. Order drives "check this next" suggestions.
#[derive(Debug, Clone)]
pub struct ComponentMap {
    components: Vec<Component>,
}

impl ComponentMap {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn builtin() -> Result<Self, regex::Error> {
        let to_owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        let components = BUILTIN_COMPONENTS
            .iter()
            .map(|(name, keywords, related, solutions)| {
                Component::new(*name, to_owned(keywords), to_owned(related), to_owned(solutions))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(components))
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_set_is_valid_and_covers_brakes() {
        let kb = KnowledgeBase::builtin();
        assert!(kb.len() >= 5);
        for record in kb.records() {
            record.validate().unwrap();
        }
        assert!(kb
            .records()
            .iter()
            .any(|r| r.category.to_lowercase().contains("rem")));
    }

    #[test]
    fn loads_file_and_skips_invalid_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = serde_json::json!([
            {
                "id": "ok_1",
                "category": "Mesin",
                "problem": "Mesin mati mendadak",
                "possible_causes": [{ "cause": "CDI rusak", "estimated_cost": "100000-250000" }]
            },
            { "id": "bad_1", "category": "Mesin", "problem": "Tanpa penyebab", "possible_causes": [] },
            { "id": "ok_1", "category": "Mesin", "problem": "Duplikat", "possible_causes": [{ "cause": "x" }] },
            "not a record"
        ]);
        write!(file, "{body}").unwrap();

        let kb = KnowledgeBase::from_path(file.path()).unwrap();
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.records()[0].problem, "Mesin mati mendadak");
    }

    #[test]
    fn missing_file_is_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KnowledgeBase::from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, KnowledgeError::Read { .. }));
    }

    #[test]
    fn object_instead_of_array_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"records\": []}}").unwrap();
        let err = KnowledgeBase::from_path(file.path()).unwrap_err();
        assert!(matches!(err, KnowledgeError::NotAnArray { .. }));
    }

    #[test]
    fn corrupt_source_falls_back_to_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{{ this is not json").unwrap();
        let kb = KnowledgeBase::load_or_fallback(file.path());
        assert_eq!(kb.len(), KnowledgeBase::builtin().len());
    }

    #[test]
    fn component_map_keeps_order_and_matches_keywords() {
        let map = ComponentMap::builtin().unwrap();
        let names: Vec<_> = map.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names[..3], ["aki", "busi", "cdi"]);
        assert!(map.get("aki").unwrap().mentioned_in("accu saya baru"));
        assert!(!map.get("koil").unwrap().mentioned_in("rem blong"));
    }

    #[test]
    fn keywords_match_at_word_start_only() {
        let map = ComponentMap::builtin().unwrap();
        let busi = map.get("busi").unwrap();
        assert!(!busi.mentioned_in("udah dicek tapi masih mogok"));
        assert!(busi.mentioned_in("api di busi kecil"));
        assert!(map.get("aki").unwrap().mentioned_in("akinya soak"));
        assert!(map.get("filter_udara").unwrap().mentioned_in("air filter kotor"));
    }

    #[test]
    fn component_without_keywords_is_never_mentioned() {
        let part = Component::new("rantai", vec![], vec![], vec![]).unwrap();
        assert!(!part.mentioned_in("rantai kendor"));
    }
}
