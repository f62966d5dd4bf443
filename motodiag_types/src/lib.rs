use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Tiers ───────────────────────────────────────────────────────────────
//
// Datasets label tiers with free text. Parsing is lenient: unknown labels
// land on the middle tier so a sloppy record never drops out of matching.
// Variant order is the tie-break order (lowest first).

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Light,
    #[default]
    Moderate,
    Severe,
}

impl Severity {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ringan" | "light" | "minor" | "rendah" => Severity::Light,
            "berat" | "severe" | "serius" | "tinggi" | "sangat tinggi" => Severity::Severe,
            _ => Severity::Moderate,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Light => "ringan",
            Severity::Moderate => "sedang",
            Severity::Severe => "berat",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Probability {
    Low,
    #[default]
    Medium,
    High,
}

impl Probability {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "rendah" | "low" | "kecil" => Probability::Low,
            "tinggi" | "high" | "besar" | "sangat tinggi" => Probability::High,
            _ => Probability::Medium,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Probability::Low => "rendah",
            Probability::Medium => "sedang",
            Probability::High => "tinggi",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "mudah" | "easy" | "gampang" => Difficulty::Easy,
            "sulit" | "hard" | "susah" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "mudah",
            Difficulty::Medium => "sedang",
            Difficulty::Hard => "sulit",
        }
    }
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

impl From<Severity> for String {
    fn from(tier: Severity) -> Self {
        tier.label().to_string()
    }
}

impl From<String> for Probability {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

impl From<Probability> for String {
    fn from(tier: Probability) -> Self {
        tier.label().to_string()
    }
}

impl From<String> for Difficulty {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

impl From<Difficulty> for String {
    fn from(tier: Difficulty) -> Self {
        tier.label().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Records ─────────────────────────────────────────────────────────────

/// Repair cost in rupiah.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: u64,
    pub max: u64,
}

impl CostRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Parse `"50000-300000"`, `"Rp 50.000 - 300.000"` or a single amount.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split('-').map(parse_amount);
        let min = parts
            .next()
            .flatten()
            .with_context(|| format!("cost {raw:?} has no leading amount"))?;
        let max = match parts.next() {
            Some(amount) => amount.with_context(|| format!("cost {raw:?} has no upper amount"))?,
            None => min,
        };
        ensure!(parts.next().is_none(), "cost {raw:?} has too many parts");
        Ok(Self { min, max })
    }

    pub fn is_free(&self) -> bool {
        self.max == 0
    }
}

fn parse_amount(part: &str) -> Option<u64> {
    let digits: String = part.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// One candidate root cause of a problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCause")]
pub struct PossibleCause {
    pub cause: String,
    pub probability: Probability,
    pub difficulty: Difficulty,
    pub cost: CostRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools_needed: Vec<String>,
}

/// Wire shape of a cause. Datasets disagree on how cost and time are
/// spelled, so every known spelling is accepted here and normalised.
#[derive(Deserialize)]
struct RawCause {
    cause: String,
    #[serde(default)]
    probability: Probability,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    cost: Option<CostRange>,
    #[serde(default)]
    estimated_cost: Option<serde_json::Value>,
    #[serde(default)]
    cost_min: Option<u64>,
    #[serde(default)]
    cost_max: Option<u64>,
    #[serde(default, alias = "time_estimate")]
    repair_time: Option<String>,
    #[serde(default)]
    solution: Option<String>,
    #[serde(default)]
    tools_needed: Vec<String>,
}

impl TryFrom<RawCause> for PossibleCause {
    type Error = anyhow::Error;

    fn try_from(raw: RawCause) -> Result<Self> {
        let cost = if let Some(cost) = raw.cost {
            cost
        } else if let Some(estimated) = raw.estimated_cost {
            match estimated {
                serde_json::Value::String(s) => CostRange::parse(&s)?,
                serde_json::Value::Number(n) => {
                    let amount = n
                        .as_u64()
                        .ok_or_else(|| anyhow!("estimated_cost {n} is not a whole amount"))?;
                    CostRange::new(amount, amount)
                }
                other => return Err(anyhow!("estimated_cost has unsupported shape: {other}")),
            }
        } else {
            match (raw.cost_min, raw.cost_max) {
                (Some(min), Some(max)) => CostRange::new(min, max),
                (Some(only), None) | (None, Some(only)) => CostRange::new(only, only),
                (None, None) => CostRange::default(),
            }
        };

        Ok(Self {
            cause: raw.cause,
            probability: raw.probability,
            difficulty: raw.difficulty,
            cost,
            repair_time: raw.repair_time.filter(|t| !t.trim().is_empty()),
            solution: raw.solution.filter(|s| !s.trim().is_empty()),
            tools_needed: raw.tools_needed,
        })
    }
}

/// A single diagnosable problem from the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub category: String,
    pub problem: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub possible_causes: Vec<PossibleCause>,
    #[serde(default)]
    pub solutions: Vec<String>,
    #[serde(default)]
    pub tools_needed: Vec<String>,
}

impl KnowledgeRecord {
    pub fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.id, "id")?;
        ensure_non_empty(&self.category, "category")?;
        ensure_non_empty(&self.problem, "problem")?;
        ensure!(
            !self.possible_causes.is_empty(),
            "record {} has no possible_causes",
            self.id
        );
        for cause in &self.possible_causes {
            ensure_non_empty(&cause.cause, "possible_causes[].cause")?;
            ensure!(
                cause.cost.min <= cause.cost.max,
                "record {}: cause {:?} has cost min {} above max {}",
                self.id,
                cause.cause,
                cause.cost.min,
                cause.cost.max
            );
        }
        Ok(())
    }
}

/// Deserialize and validate one record from an already-parsed JSON value.
pub fn record_from_value(value: serde_json::Value) -> Result<KnowledgeRecord> {
    let record: KnowledgeRecord =
        serde_json::from_value(value).context("record does not match the knowledge schema")?;
    record.validate()?;
    Ok(record)
}

fn ensure_non_empty(value: &str, field: &str) -> Result<()> {
    ensure!(!value.trim().is_empty(), "{field} missing or empty");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset_record() -> serde_json::Value {
        json!({
            "id": "rem_001",
            "category": "Pengereman",
            "problem": "Rem blong",
            "symptoms": ["rem blong", "tuas rem dalam"],
            "keywords": ["rem", "blong"],
            "severity": "berat",
            "possible_causes": [{
                "cause": "Kampas rem habis",
                "probability": "tinggi",
                "difficulty": "mudah",
                "estimated_cost": "50000-150000",
                "repair_time": "30-60 menit"
            }],
            "solutions": ["Ganti kampas rem"],
            "tools_needed": ["kunci 12"]
        })
    }

    #[test]
    fn accepts_dataset_shaped_record() -> Result<()> {
        let record = record_from_value(dataset_record())?;
        assert_eq!(record.severity, Severity::Severe);
        let cause = &record.possible_causes[0];
        assert_eq!(cause.probability, Probability::High);
        assert_eq!(cause.difficulty, Difficulty::Easy);
        assert_eq!(cause.cost, CostRange::new(50_000, 150_000));
        assert_eq!(cause.repair_time.as_deref(), Some("30-60 menit"));
        Ok(())
    }

    #[test]
    fn accepts_split_cost_fields_and_time_estimate() -> Result<()> {
        let value = json!({
            "id": "smart_001",
            "category": "Starter",
            "problem": "Motor susah hidup",
            "possible_causes": [{
                "cause": "Sistem pengapian bermasalah",
                "cost_min": 50000,
                "cost_max": 300000,
                "time_estimate": "45-90 menit",
                "tools_needed": ["multimeter"]
            }]
        });
        let record = record_from_value(value)?;
        let cause = &record.possible_causes[0];
        assert_eq!(cause.cost, CostRange::new(50_000, 300_000));
        assert_eq!(cause.repair_time.as_deref(), Some("45-90 menit"));
        assert_eq!(cause.probability, Probability::Medium);
        assert_eq!(record.severity, Severity::Moderate);
        Ok(())
    }

    #[test]
    fn rejects_inverted_cost_range() {
        let mut value = dataset_record();
        value["possible_causes"][0]["estimated_cost"] = json!("300000-50000");
        assert!(record_from_value(value).is_err());
    }

    #[test]
    fn rejects_record_without_causes() {
        let mut value = dataset_record();
        value["possible_causes"] = json!([]);
        assert!(record_from_value(value).is_err());
    }

    #[test]
    fn rejects_blank_problem() {
        let mut value = dataset_record();
        value["problem"] = json!("  ");
        assert!(record_from_value(value).is_err());
    }

    #[test]
    fn parses_formatted_and_single_costs() -> Result<()> {
        assert_eq!(
            CostRange::parse("Rp 50.000 - 300.000")?,
            CostRange::new(50_000, 300_000)
        );
        assert_eq!(CostRange::parse("75000")?, CostRange::new(75_000, 75_000));
        assert!(CostRange::parse("gratis").is_err());
        assert!(CostRange::parse("1-2-3").is_err());
        Ok(())
    }

    #[test]
    fn tier_labels_are_lenient_and_ordered() {
        assert_eq!(Severity::parse_lenient("Sangat Tinggi"), Severity::Severe);
        assert_eq!(Severity::parse_lenient("??"), Severity::Moderate);
        assert_eq!(Probability::parse_lenient("LOW"), Probability::Low);
        assert_eq!(Difficulty::parse_lenient("susah"), Difficulty::Hard);
        assert!(Severity::Light < Severity::Moderate && Severity::Moderate < Severity::Severe);
        assert!(Probability::High > Probability::Low);
    }

    #[test]
    fn serializes_tiers_with_dataset_labels() -> Result<()> {
        let record = record_from_value(dataset_record())?;
        let value = serde_json::to_value(&record)?;
        assert_eq!(value["severity"], "berat");
        assert_eq!(value["possible_causes"][0]["probability"], "tinggi");
        assert_eq!(value["possible_causes"][0]["cost"]["max"], 150_000);

        let back = record_from_value(value)?;
        assert_eq!(back, record);
        Ok(())
    }
}
