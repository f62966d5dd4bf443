//! Response text. Every builder is a pure function of the session view and
//! the ranked matches handed to it.

use crate::classifier::Classification;
use crate::knowledge::ComponentMap;
use crate::matcher::{filter_causes, FilteredCause};
use crate::scorer::ScoredMatch;
use crate::session::{SessionContext, TechnicalLevel};
use chrono::SecondsFormat;
use motodiag_types::{CostRange, Difficulty, KnowledgeRecord, Probability, Severity};

pub const APOLOGY: &str = "**Waduh maaf bro, salah paham gue!**";

const FOLLOW_UP_CAUSE_LIMIT: usize = 2;
const NEXT_COMPONENT_LIMIT: usize = 3;
const PREVENTION_TIP_LIMIT: usize = 6;
const SUMMARY_RECENT_TURNS: usize = 3;
const SUMMARY_UTTERANCE_CHARS: usize = 50;

// ── Branches ────────────────────────────────────────────────────────────

/// Acknowledge confirmed components and point at the ones still unchecked.
/// Expects the confirmation to be absorbed into `session` already.
pub fn confirmation(
    classification: &Classification,
    session: &SessionContext,
    components: &ComponentMap,
) -> String {
    let mut out = String::new();
    out.push_str("**Oke, gue catat nih info komponennya**\n\n");
    if classification.extracted.is_empty() {
        out.push_str("Komponennya yang mana nih bro? Sebutin aja, misal aki, busi, atau karbu.\n");
    }
    for (name, status) in &classification.extracted {
        out.push_str(&format!("- {}: {} ya\n", name.to_uppercase(), status.label()));
    }

    let remaining: Vec<_> = components
        .iter()
        .filter(|c| !session.problem.checked_components.contains(&c.name))
        .take(NEXT_COMPONENT_LIMIT)
        .collect();
    if !remaining.is_empty() {
        out.push_str("\n**Berdasarkan info ini, fokus ke:**\n");
        for (idx, component) in remaining.iter().enumerate() {
            let hints: Vec<&str> = component
                .typical_solutions
                .iter()
                .take(2)
                .map(String::as_str)
                .collect();
            out.push_str(&format!(
                "{}. **{}** - {}\n",
                idx + 1,
                component.name.to_uppercase(),
                hints.join(", ")
            ));
        }
    } else {
        out.push_str("\nSemua komponen dasar udah dicek. Mending bawa ke bengkel buat dicek lebih dalam.\n");
    }
    out.trim_end().to_string()
}

/// Next steps for a follow-up: the best match's causes that survive the
/// session's exclusions, or a workshop referral when none do.
pub fn follow_up(best: &ScoredMatch<'_>, session: &SessionContext, components: &ComponentMap) -> String {
    let mut out = String::new();
    out.push_str("**LANGKAH SELANJUTNYA BERDASARKAN KONTEKS**\n\n");

    if !session.problem.checked_components.is_empty() {
        out.push_str("**YANG SUDAH DICEK:**\n");
        for name in &session.problem.checked_components {
            out.push_str(&format!("- {}\n", name.to_uppercase()));
        }
        out.push('\n');
    }

    let remaining = filter_causes(best.record, &session.problem, components);
    if remaining.is_empty() {
        out.push_str("**REKOMENDASI: BAWA KE BENGKEL**\n");
        out.push_str("Berdasarkan yang sudah dicek, kemungkinan perlu diagnosis profesional.\n");
        return out.trim_end().to_string();
    }

    out.push_str("**KEMUNGKINAN PENYEBAB YANG TERSISA:**\n\n");
    for (idx, filtered) in remaining.iter().take(FOLLOW_UP_CAUSE_LIMIT).enumerate() {
        let cause = &filtered.cause;
        out.push_str(&format!("**{}. {}**\n", idx + 1, cause.cause));
        if let Some(component) = &filtered.already_checked {
            out.push_str(&format!("   (Udah dicek {component}nya)\n"));
        }
        out.push_str(&format!(
            "   Solusi: {}\n",
            solution_text(best.record, cause.solution.as_deref())
        ));
        out.push_str(&format!("   Biaya: {}\n", format_cost(&cause.cost)));
        out.push_str(&format!(
            "   Waktu: {}\n\n",
            cause.repair_time.as_deref().unwrap_or("N/A")
        ));
    }
    out.trim_end().to_string()
}

/// The full report for a new or continued diagnosis.
pub fn full_diagnosis(
    best: &ScoredMatch<'_>,
    session: &SessionContext,
    continuing: bool,
    components: &ComponentMap,
) -> String {
    let record = best.record;
    let confidence = best.score;
    let mut out = String::new();

    out.push_str(opening_line(record.severity, confidence, continuing));
    out.push('\n');
    out.push_str(&format!("**Kategori:** {}\n", record.category));
    out.push_str(&format!("**Masalah:** {}\n", record.problem));
    if !record.symptoms.is_empty() {
        out.push_str(&format!("**Gejala yang kamu alami:** {}\n", record.symptoms.join(", ")));
    }
    out.push_str(severity_explanation(record.severity));
    out.push('\n');
    if session.has_history() {
        out.push_str(&format!("Udah ngobrol {} kali nih\n", session.turns.len() + 1));
    }
    out.push('\n');

    if continuing {
        out.push_str("**Oke, jadi gini nih kemungkinannya:**\n\n");
    } else {
        out.push_str("**Analisis masalahnya:**\n\n");
    }
    let causes = filter_causes(record, &session.problem, components);
    for (idx, filtered) in causes.iter().enumerate() {
        push_cause(&mut out, idx + 1, filtered, record);
    }
    if causes.is_empty() {
        out.push_str("Semua kemungkinan penyebab udah dicoret, mending langsung ke bengkel.\n\n");
    }

    out.push_str("**Saran gue:**\n");
    if session.turns.len() > 3 {
        out.push_str("- Udah lama ngobrolnya nih, mending langsung bawa ke bengkel aja deh biar pasti\n");
    }
    if session.problem.checked_components.len() > 2 {
        out.push_str("- Udah banyak yang dicek tapi masih bermasalah, kayaknya emang ribet nih masalahnya\n");
    }
    if record.severity == Severity::Severe {
        out.push_str("- Serius nih bahaya banget, jangan dipake dulu motornya! Bisa celaka nanti\n");
    }
    if confidence < 0.5 {
        out.push_str("- Gue masih ragu-ragu nih, coba kasih info lebih detail lagi dong biar gue bisa bantu lebih akurat\n");
    }
    if session.user.technical_level >= TechnicalLevel::Intermediate {
        out.push_str("- Kayaknya lo udah ngerti teknis, langkah di atas bisa dicoba sendiri dulu\n");
    }
    out.push('\n');

    out.push_str("**Penjelasan Teknis:**\n");
    out.push_str(technical_explanation(&record.category));
    out.push_str("\n\n");

    out.push_str("**Tips Pencegahan Biar Ga Kejadian Lagi:**\n");
    for tip in prevention_tips(&record.category, record.severity) {
        out.push_str(&format!("- {tip}\n"));
    }
    out.push('\n');

    out.push_str("**Kapan Harus ke Bengkel:**\n");
    out.push_str(match record.severity {
        Severity::Severe => "- SEKARANG JUGA! Jangan tunda lagi, bahaya!\n",
        Severity::Moderate => "- Dalam 1-2 hari ini, jangan sampai lebih parah\n",
        Severity::Light => "- Kalau ada waktu luang, tapi jangan lama-lama\n",
    });
    if confidence < 0.6 {
        out.push_str("- Kalau masih bingung, mending langsung konsultasi ke mekanik\n");
    }
    out.trim_end().to_string()
}

/// Nothing matched: ask for what would let the next turn match.
pub fn clarification_request(session: &SessionContext) -> String {
    let mut out = String::new();
    if session.has_history() {
        out.push_str("**Eh, gue butuh klarifikasi nih**\n\n");
        out.push_str("Dari obrolan kita tadi:\n");
        if !session.problem.checked_components.is_empty() {
            let checked: Vec<&str> = session
                .problem
                .checked_components
                .iter()
                .map(String::as_str)
                .collect();
            out.push_str(&format!("- Yang udah dibahas: {}\n", checked.join(", ")));
        }
        if let Some(main) = &session.problem.main_problem {
            out.push_str(&format!("- Masalah utamanya: {main}\n"));
        }
        out.push_str("\nCoba jelasin lagi dong, lebih spesifik apa yang mau ditanyain?");
        return out;
    }

    out.push_str("**Gue butuh info lebih nih**\n\n");
    out.push_str("Biar gue bisa bantu lo dengan akurat, kasih tau dong:\n\n");
    out.push_str("**Info yang gue butuhin:**\n");
    out.push_str("- Gejalanya gimana sih detailnya?\n");
    out.push_str("- Kapan mulai bermasalah gini?\n");
    out.push_str("- Sering kejadian atau cuma kadang-kadang?\n");
    if !session.vehicle.is_known() {
        out.push_str("- Motor apa dan tahun berapa?\n");
    }
    out.push_str("- Baru-baru ini ada ganti part atau servis ga?");
    out
}

pub fn summary(session: &SessionContext) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "**RINGKASAN PERCAKAPAN** (Session: {})\n",
        session.session_id
    ));
    out.push_str(&format!("Total interaksi: {}\n", session.turns.len()));
    if let Some(average) = session.average_confidence() {
        out.push_str(&format!("Rata-rata confidence: {}\n", percent(average)));
    }
    if let Some(vehicle) = vehicle_line(session) {
        out.push_str(&format!("Kendaraan: {vehicle}\n"));
    }
    if let Some(last) = session.turns.last() {
        out.push_str(&format!(
            "Intent terakhir: {} ({})\n",
            last.intent.label(),
            percent(last.intent_confidence)
        ));
    }
    out.push('\n');

    if let Some(main) = &session.problem.main_problem {
        out.push_str(&format!("**MASALAH UTAMA:** {main}\n\n"));
    }
    if !session.problem.checked_components.is_empty() {
        out.push_str("**KOMPONEN YANG SUDAH DICEK:**\n");
        for name in &session.problem.checked_components {
            out.push_str(&format!("- {}\n", name.to_uppercase()));
        }
        out.push('\n');
    }
    if !session.problem.excluded_causes.is_empty() {
        out.push_str("**PENYEBAB YANG SUDAH DI-EXCLUDE:**\n");
        for cause in &session.problem.excluded_causes {
            out.push_str(&format!("- {cause}\n"));
        }
        out.push('\n');
    }
    if let Some(diagnosis) = &session.current_diagnosis {
        out.push_str(&format!("**DIAGNOSIS TERKINI:** {}\n", diagnosis.problem));
        out.push_str(&format!("Kategori: {}\n\n", diagnosis.category));
    }

    out.push_str("**RIWAYAT PERCAKAPAN TERAKHIR:**\n");
    let skip = session.turns.len().saturating_sub(SUMMARY_RECENT_TURNS);
    for (idx, turn) in session.turns.iter().skip(skip).enumerate() {
        let marker = if turn.corrected { " (dikoreksi)" } else { "" };
        out.push_str(&format!(
            "**{}. {}**{marker}\n",
            idx + 1,
            turn.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        out.push_str(&format!(
            "   User: {}\n",
            truncate_chars(&turn.utterance, SUMMARY_UTTERANCE_CHARS)
        ));
        out.push_str(&format!("   Confidence: {}\n", percent(turn.confidence)));
    }
    out.trim_end().to_string()
}

// ── Pieces ──────────────────────────────────────────────────────────────

fn opening_line(severity: Severity, confidence: f32, continuing: bool) -> &'static str {
    if continuing {
        return if confidence < 0.6 {
            "Hmm, masih agak bingung nih tapi coba deh..."
        } else {
            "Oke bro, gue yakin banget nih masalahnya!"
        };
    }
    match (severity, confidence) {
        (Severity::Severe, c) if c > 0.8 => "[!!] **Wah, gue yakin banget nih masalahnya!**",
        (Severity::Severe, c) if c > 0.6 => "[!!] **Kayaknya sih ini masalahnya...**",
        (Severity::Severe, _) => "[!!] **Agak ragu sih, tapi coba aja dulu...**",
        (_, c) if c > 0.8 => "**Wah, gue yakin banget nih masalahnya!**",
        (_, c) if c > 0.6 => "**Kayaknya sih ini masalahnya...**",
        _ => "**Agak ragu sih, tapi coba aja dulu...**",
    }
}

fn severity_explanation(severity: Severity) -> &'static str {
    match severity {
        Severity::Severe => {
            "**BAHAYA TINGGI!** Ini masalah serius yang bisa bikin celaka. Stop pake motor sekarang juga!\nDampak: Bisa rusak parah, kecelakaan, atau bahaya nyawa"
        }
        Severity::Moderate => {
            "**Perlu Perhatian** - Lumayan serius, tapi masih bisa dihandle dengan hati-hati\nDampak: Performa menurun, bisa jadi masalah besar kalau diabaikan"
        }
        Severity::Light => {
            "**Masalah Ringan** - Santai aja, ga terlalu parah tapi tetep perlu diperbaiki\nDampak: Gangguan kecil, masih aman dipake dengan hati-hati"
        }
    }
}

fn push_cause(out: &mut String, number: usize, filtered: &FilteredCause, record: &KnowledgeRecord) {
    let cause = &filtered.cause;
    out.push_str(&format!("**{number}. {}**\n", cause.cause));
    if let Some(component) = &filtered.already_checked {
        out.push_str(&format!("   (Udah dicek {component}nya)\n"));
    }
    out.push_str(match cause.probability {
        Probability::High => "   Hmm ini kemungkinan besar sih bro\n",
        Probability::Medium => "   Bisa jadi nih, lumayan mungkin\n",
        Probability::Low => "   Kecil kemungkinannya sih\n",
    });
    out.push_str(match cause.difficulty {
        Difficulty::Easy => "   Gampang kok ini mah\n",
        Difficulty::Medium => "   Lumayan ribet dikit\n",
        Difficulty::Hard => "   Waduh susah nih, mending ke bengkel\n",
    });
    if cause.cost.is_free() {
        out.push_str("   Gratis kok ini\n");
    } else {
        out.push_str(&format!("   Kira-kira abis: {}\n", format_cost(&cause.cost)));
    }
    out.push_str(&format!(
        "   Yang perlu dilakuin: {}\n",
        solution_text(record, cause.solution.as_deref())
    ));

    let mut tools: Vec<&str> = cause.tools_needed.iter().map(String::as_str).collect();
    for tool in &record.tools_needed {
        if !tools.contains(&tool.as_str()) {
            tools.push(tool);
        }
    }
    if !tools.is_empty() {
        out.push_str(&format!("   Alat yang dibutuhin: {}\n", tools.join(", ")));
    }
    out.push_str(&format!(
        "   Kira-kira butuh waktu: {}\n\n",
        cause.repair_time.as_deref().unwrap_or("N/A")
    ));
}

fn solution_text(record: &KnowledgeRecord, specific: Option<&str>) -> String {
    let general = record.solutions.join(", ");
    match (specific, general.is_empty()) {
        (Some(specific), true) => specific.to_string(),
        (Some(specific), false) => format!("{specific} ({general})"),
        (None, false) => general,
        (None, true) => "Perlu diagnosis lebih lanjut nih".to_string(),
    }
}

fn technical_explanation(category: &str) -> &'static str {
    const EXPLANATIONS: &[(&str, &str)] = &[
        ("mesin", "Mesin motor itu jantungnya kendaraan bro. Kalau ada masalah di sini, bisa ganggu performa keseluruhan. Biasanya karena komponen aus, pelumasan kurang, atau pembakaran ga sempurna."),
        ("bahan bakar", "Sistem bahan bakar tugasnya nyupply bensin ke mesin dengan takaran yang pas. Kalau bermasalah, motor bisa boros, tenaga kurang, atau susah hidup."),
        ("kelistrikan", "Sistem kelistrikan ngatur semua komponen elektronik motor. Dari pengapian, lampu, sampai ECU. Kalau ada yang short atau putus, bisa bikin motor mogok total."),
        ("rem", "Sistem rem adalah safety utama motor. Kalau bermasalah, bisa bahaya banget karena ga bisa berhenti dengan baik. Jangan main-main sama rem!"),
        ("transmisi", "Transmisi tugasnya nyalurin tenaga dari mesin ke roda. Kalau bermasalah, motor bisa ga mau jalan atau tenaga hilang."),
        ("suspensi", "Suspensi bikin motor nyaman dan stabil. Kalau rusak, motor jadi ga nyaman dan susah dikontrol, terutama di jalan jelek."),
        ("pendingin", "Sistem pendingin jaga suhu mesin biar ga overheat. Kalau ga kerja, mesin bisa panas berlebihan dan rusak parah."),
    ];
    let category = category.to_lowercase();
    EXPLANATIONS
        .iter()
        .find(|(key, _)| category.contains(key))
        .map(|(_, text)| *text)
        .unwrap_or("Ini masalah yang butuh perhatian khusus. Setiap komponen motor punya fungsi penting, jadi kalau ada yang bermasalah harus segera ditangani.")
}

fn prevention_tips(category: &str, severity: Severity) -> Vec<&'static str> {
    const BASE: &[&str] = &[
        "Service rutin setiap 3000-5000 km",
        "Ganti oli mesin secara teratur",
        "Bersihin motor minimal seminggu sekali",
        "Jangan biarkan mesin overheat",
        "Pake bensin yang berkualitas baik",
    ];
    const BY_CATEGORY: &[(&str, &[&str])] = &[
        ("mesin", &["Panaskan mesin sebelum berkendara", "Jangan gas pol dari awal", "Matikan mesin kalau macet lama"]),
        ("bahan bakar", &["Jangan sampai tangki kosong total", "Bersihin filter bensin berkala", "Hindari bensin oplosan"]),
        ("kelistrikan", &["Cek aki secara rutin", "Matikan lampu kalau ga dipake", "Hindari terendam air"]),
        ("rem", &["Cek ketebalan kampas rem", "Ganti minyak rem berkala", "Jangan rem mendadak kalau ga darurat"]),
    ];

    let category = category.to_lowercase();
    let mut tips: Vec<&'static str> = BASE.to_vec();
    if let Some((_, specific)) = BY_CATEGORY.iter().find(|(key, _)| category.contains(key)) {
        tips.extend_from_slice(specific);
    }
    if severity == Severity::Severe {
        tips.push("Segera bawa ke bengkel resmi untuk penanganan profesional");
    }
    tips.truncate(PREVENTION_TIP_LIMIT);
    tips
}

fn vehicle_line(session: &SessionContext) -> Option<String> {
    let vehicle = &session.vehicle;
    match (&vehicle.brand, vehicle.year) {
        (Some(brand), Some(year)) => Some(format!("{brand} {year}")),
        (Some(brand), None) => Some(brand.clone()),
        (None, Some(year)) => Some(format!("tahun {year}")),
        (None, None) => None,
    }
}

fn percent(value: f32) -> String {
    format!("{:.1}%", value * 100.0)
}

/// "Rp 1.250.000"
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("Rp {grouped}")
}

pub fn format_cost(cost: &CostRange) -> String {
    if cost.min == cost.max {
        format_rupiah(cost.min)
    } else {
        format!("{} - {}", format_rupiah(cost.min), format_rupiah(cost.max))
    }
}

/// At most `max` chars, with "..." appended when something was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}
