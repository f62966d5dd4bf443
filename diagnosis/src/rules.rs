use crate::classifier::UserIntent;
use regex::Regex;

// ── Plain word lists ────────────────────────────────────────────────────

pub const KEYBOARD_MASHING: &[&str] = &["qwerty", "asdfgh", "zxcvbn", "hjkl;", "qwertyuiop", "asdfghjkl", "zxcvbnm"];

pub const CORRECTION_MARKERS: &[&str] = &[
    "bukan",
    "salah",
    "maksud saya",
    "kok jadi",
    "kan gw bahas",
    "yang gw maksud",
    "maksud gw",
    "harusnya",
    "sebenarnya",
    "tapi kan",
    "lho kok",
];

pub const POSITIVE_STATE_WORDS: &[&str] = &["bagus", "oke", "normal", "baik"];
pub const REPLACEMENT_WORDS: &[&str] = &["ganti", "baru"];

pub const DANGER_WORDS: &[&str] = &["bahaya", "urgent", "penting", "serius"];
pub const RIDE_WORDS: &[&str] = &["masih bisa", "aman ga", "boleh"];
pub const COST_TIME_WORDS: &[&str] = &["berapa", "kapan", "lama"];

pub const TECHNICAL_TERMS: &[&str] = &[
    "kompresi",
    "resistansi",
    "voltase",
    "ampere",
    "ohm",
    "timing",
    "klep",
    "spuyer",
    "bleeding",
    "multimeter",
];

pub const KNOWN_TOOLS: &[&str] = &[
    "multimeter",
    "obeng",
    "kunci busi",
    "kunci ring",
    "kunci pas",
    "kunci set",
    "tang",
    "kompresor",
    "feeler gauge",
    "tespen",
];

// ── Regex families ──────────────────────────────────────────────────────

const FOLLOW_UP: &[&str] = &[
    r"terus\s+(gimana|bagaimana|apa|dong)",
    r"lalu\s+(gimana|bagaimana|apa)",
    r"kalau\s+gitu",
    r"setelah\s+itu",
    r"masih\s+(gimana|bagaimana)",
    r"udah\s+gitu\s+masih",
    r"abis\s+itu",
    r"habis\s+itu",
    r"trus\s+(gimana|apa)",
    r"selanjutnya\s+(gimana|apa)",
];

const CONFIRMATION: &[&str] = &[
    r"udah\s+(cek|ganti|bersih|service)",
    r"sudah\s+(cek|ganti|bersih|service)",
    r"(udah|sudah)\s+di(cek|ganti|bersihin|servis)",
    r"baru\s+(ganti|beli|service)",
    r"masih\s+(bagus|oke|normal)",
    r"kondisi\s+(baik|bagus|normal)",
];

const PROBLEM_INDICATORS: &[&str] = &[
    r"(susah|sulit|ga|gak|tidak)\s+(hidup|nyala|start|idup)",
    r"(brebet|ngempos|lemah|loyo)",
    r"(berisik|kasar|aneh)",
    r"(panas|overheat|mendidih)",
    r"(boros|banyak|habis)\s+(bensin|bbm)",
];

const NATURAL_FOLLOW_UP: &[&str] = &[
    r"\b(bahaya|urgent|penting|serius)\b.*\b(banget|sekali|ga|tidak|kah)\b",
    r"\b(gimana|bagaimana)\b.*\b(dong|sih|nih)\b",
    r"\b(terus|lalu|abis itu)\b.*\b(gimana|apa)\b",
    r"\b(masih|udah|sudah)\b.*\b(bisa|boleh|aman)\b",
    r"\b(berapa|kapan)\b.*\b(lama|waktu|hari)\b",
    r"\b(iya|ya|oh|wah|waduh)\b.*\b(banget|sekali|parah)\b",
    r"\b(emang|memang|beneran)\b.*\b(segitu|separah|seburuk)\b",
    r"\b(masih bisa|aman ga|boleh)\b.*\b(dipake|dipakai|jalan)\b",
];

const THANKS: &[&str] = &[
    r"\b(terima kasih|makasih|thanks|thx|tengkyu|thank you)\b",
    r"\b(makasih|thanks)\b.*\b(banget|banyak|ya|bro|gan)\b",
    r"^(oke|ok|baik)\s+(makasih|terima kasih|thanks)\b",
    r"^(mantap|keren|bagus)\s+(banget|sekali)\s*(makasih|thanks)?\s*(bro|gan)?$",
    r"\b(udah|sudah)\s+(jelas|paham|ngerti)\s*(makasih|thanks|terima kasih)\b",
    r"\b(siap|oke|ok)\s+(bro|gan)?\s*(makasih|thanks|terima kasih)\b",
];

const QUESTION_MARKERS: &[&str] = &[
    r"\?",
    r"\b(gimana|bagaimana|kenapa|mengapa|kapan|berapa)\b",
    r"\b(masih|belum|tidak|ga|gak)\b.*\b(bisa|boleh|jalan|hidup)\b",
    r"\b(susah|sulit|masalah|rusak|error)\b",
];

const INTENT_DIAGNOSIS: &[&str] = &[r"kenapa", r"mengapa", r"apa penyebab", r"masalah", r"gejala"];
const INTENT_SOLUTION: &[&str] = &[r"bagaimana", r"gimana", r"cara", r"solusi", r"perbaiki", r"atasi"];
const INTENT_COST: &[&str] = &[r"berapa", r"biaya", r"harga", r"mahal", r"murah"];
const INTENT_PREVENTION: &[&str] = &[r"mencegah", r"hindari", r"perawatan", r"maintenance", r"biar ga"];

const VEHICLE_BRAND: &str =
    r"\b(honda|yamaha|suzuki|kawasaki|vespa|piaggio|tvs|ktm|benelli|bajaj)\b";
const VEHICLE_YEAR: &str = r"\b(19[89]\d|20[0-4]\d)\b";

/// A family of patterns, each kept with its source text as a label.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<(&'static str, Regex)>,
}

impl PatternSet {
    fn compile(sources: &[&'static str]) -> Result<Self, regex::Error> {
        let patterns = sources
            .iter()
            .map(|src| Regex::new(src).map(|re| (*src, re)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|(_, re)| re.is_match(text))
    }

    /// Label of the first pattern (in table order) that matches.
    pub fn first_match(&self, text: &str) -> Option<&'static str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(label, _)| *label)
    }

    /// First matched span of every matching pattern, in table order.
    pub fn matched_spans<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.patterns
            .iter()
            .filter_map(|(_, re)| re.find(text).map(|m| m.as_str()))
            .collect()
    }

    /// Total number of non-overlapping hits across the family.
    pub fn hit_count(&self, text: &str) -> usize {
        self.patterns
            .iter()
            .map(|(_, re)| re.find_iter(text).count())
            .sum()
    }
}

/// Every regex table the engine consults, compiled once at startup.
/// All inputs are expected to be lowercase.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub follow_up: PatternSet,
    pub confirmation: PatternSet,
    pub problem_indicators: PatternSet,
    pub natural_follow_up: PatternSet,
    pub thanks: PatternSet,
    pub question_markers: PatternSet,
    pub intents: Vec<(UserIntent, PatternSet)>,
    pub vehicle_brand: Regex,
    pub vehicle_year: Regex,
}

impl RuleSet {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            follow_up: PatternSet::compile(FOLLOW_UP)?,
            confirmation: PatternSet::compile(CONFIRMATION)?,
            problem_indicators: PatternSet::compile(PROBLEM_INDICATORS)?,
            natural_follow_up: PatternSet::compile(NATURAL_FOLLOW_UP)?,
            thanks: PatternSet::compile(THANKS)?,
            question_markers: PatternSet::compile(QUESTION_MARKERS)?,
            intents: vec![
                (UserIntent::Diagnosis, PatternSet::compile(INTENT_DIAGNOSIS)?),
                (UserIntent::Solution, PatternSet::compile(INTENT_SOLUTION)?),
                (UserIntent::Cost, PatternSet::compile(INTENT_COST)?),
                (UserIntent::Prevention, PatternSet::compile(INTENT_PREVENTION)?),
            ],
            vehicle_brand: Regex::new(VEHICLE_BRAND)?,
            vehicle_year: Regex::new(VEHICLE_YEAR)?,
        })
    }
}

pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::new().unwrap()
    }

    #[test]
    fn all_tables_compile() {
        let rules = rules();
        assert_eq!(rules.intents.len(), 4);
    }

    #[test]
    fn follow_up_table_matches_casual_phrasing() {
        let rules = rules();
        assert!(rules.follow_up.is_match("terus gimana dong?"));
        assert!(rules.follow_up.is_match("kalau gitu harus apa"));
        assert!(!rules.follow_up.is_match("motor saya remnya blong"));
    }

    #[test]
    fn confirmation_table_accepts_prefixed_verbs() {
        let rules = rules();
        assert!(rules.confirmation.is_match("aki udah dicek, masih bagus"));
        assert!(rules.confirmation.is_match("busi juga udah ganti baru"));
        assert_eq!(
            rules.confirmation.first_match("busi sudah diganti"),
            Some(r"(udah|sudah)\s+di(cek|ganti|bersihin|servis)")
        );
    }

    #[test]
    fn problem_spans_are_extracted_in_table_order() {
        let rules = rules();
        let spans = rules
            .problem_indicators
            .matched_spans("motor susah hidup dan kadang brebet");
        assert_eq!(spans, vec!["susah hidup", "brebet"]);
    }

    #[test]
    fn question_markers_catch_negated_capability() {
        let rules = rules();
        assert!(rules.question_markers.is_match("makasih tapi masih ga bisa jalan"));
        assert!(!rules.question_markers.is_match("makasih banyak bro"));
    }

    #[test]
    fn intent_hits_are_counted() {
        let rules = rules();
        let (_, cost) = &rules.intents[2];
        assert_eq!(cost.hit_count("berapa biaya dan harga kampas"), 3);
    }

    #[test]
    fn vehicle_patterns() {
        let rules = rules();
        assert!(rules.vehicle_brand.is_match("honda beat 2015"));
        assert_eq!(
            rules.vehicle_year.find("beat 2015 karbu").map(|m| m.as_str()),
            Some("2015")
        );
        assert!(rules.vehicle_year.find("servis 3000 km").is_none());
    }
}
