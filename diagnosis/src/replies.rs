//! Canned reply pools and the injectable random source that picks from them.

use crate::classifier::FollowUpIntent;
use motodiag_types::{KnowledgeRecord, Severity};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Mutex, PoisonError};

pub const GIBBERISH: &[&str] = &[
    "Waduh kenapa nih bos, kepencet ya keyboardnya? Soalnya ga jelas ni maksudnya.",
    "Eh bro, kayaknya ada yang salah deh sama inputnya. Keyboard error kah?",
    "Wah ini mah kayak kucing jalan di atas keyboard ya bro. Coba ketik ulang dong.",
    "Hmm... ini bahasa planet mana ya? Bisa pake bahasa bumi ga bro?",
    "Kayaknya lagi stress ya sampe ngetik ngawur gini. Santai aja, coba jelasin pelan-pelan.",
];

pub const GIBBERISH_TIP: &str =
    "**Tips:** Coba jelasin masalah motornya dengan kata-kata yang jelas ya bro.";

pub const THANKS: &[&str] = &[
    "Sama-sama bro! Senang banget bisa bantu. Semoga motornya cepet sembuh ya!",
    "Siap bro! Gue seneng bisa bantu. Jangan lupa ke bengkel yang terpercaya ya!",
    "Sama-sama dong! Kapan-kapan kalo ada masalah motor lagi, langsung tanya aja ke gue.",
    "Gue seneng banget bisa bantu! Semoga motornya jadi kenceng lagi setelah diperbaiki.",
    "Siap siap! Senang hati bisa bantu sesama bikers. Ride safe ya bro!",
    "Sama-sama bro! Gue harap diagnosis gue bisa membantu. Jaga motornya baik-baik ya!",
];

const DANGER_SEVERE: &[&str] = &[
    "Iya bro, ini serius banget! Jangan dipake dulu motornya, bisa bahaya. Langsung ke bengkel aja ya!",
    "Waduh iya dong, bahaya banget ini! Motor jangan dipake dulu, nanti malah tambah rusak atau bahkan celaka.",
    "Serius banget nih bro! Ini bukan main-main, safety first ya. Langsung bawa ke bengkel yang terpercaya.",
];

const DANGER_MODERATE: &[&str] = &[
    "Lumayan serius sih bro, tapi masih bisa ditangani. Tapi jangan dibiarkan lama-lama ya!",
    "Iya agak serius nih, tapi ga separah yang gue kira. Tetep harus segera diperbaiki sih.",
    "Serius sih, tapi masih dalam batas wajar. Yang penting jangan ditunda-tunda perbaikannya.",
];

const DANGER_LIGHT: &[&str] = &[
    "Santai aja bro, ga terlalu bahaya kok. Tapi tetep harus diperbaiki ya biar ga tambah parah.",
    "Ga bahaya-bahaya amat sih, masih aman. Cuma ya tetep harus dibenerin biar motor tetep prima.",
    "Tenang bro, ini masih kategori ringan. Tapi jangan diabaikan ya, nanti malah jadi masalah besar.",
];

pub const NO_DIAGNOSIS_YET: &str =
    "Hmm, belum ada diagnosis sebelumnya nih bro. Coba jelasin masalahnya dulu dong!";

const COST_TIME_KNOWN: &str = "Dari diagnosis tadi, estimasi biaya dan waktunya udah gue kasih tau kok bro. Tapi ya tergantung bengkelnya juga sih.";
const COST_TIME_UNKNOWN: &str = "Untuk waktu dan biaya, tergantung tingkat kerusakannya bro. Dari yang gue analisis tadi, kira-kira segitu deh.";

fn ride_answer(severity: Severity) -> &'static str {
    match severity {
        Severity::Severe => {
            "Waduh jangan bro! Bahaya banget kalo dipake. Mending jalan kaki atau naik ojek dulu deh."
        }
        Severity::Moderate => {
            "Hmm, kalo buat jarak deket sih masih bisa. Tapi pelan-pelan ya, dan segera ke bengkel!"
        }
        Severity::Light => "Masih bisa dipake kok bro, tapi hati-hati ya. Jangan lupa segera diperbaiki.",
    }
}

fn danger_pool(severity: Severity) -> &'static [&'static str] {
    match severity {
        Severity::Severe => DANGER_SEVERE,
        Severity::Moderate => DANGER_MODERATE,
        Severity::Light => DANGER_LIGHT,
    }
}

/// Picks canned replies. Seed it for reproducible conversations.
#[derive(Debug)]
pub struct ReplyPicker {
    rng: Mutex<StdRng>,
}

impl ReplyPicker {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn pick(&self, pool: &[&'static str]) -> &'static str {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pool.choose(&mut *rng).copied().unwrap_or_default()
    }

    pub fn gibberish(&self) -> String {
        format!("{}\n\n{}", self.pick(GIBBERISH), GIBBERISH_TIP)
    }

    pub fn thanks(&self) -> String {
        self.pick(THANKS).to_string()
    }

    /// Answer a "is it dangerous / can I ride / how much" question about
    /// the diagnosis already given.
    pub fn follow_up_answer(&self, intent: FollowUpIntent, diagnosis: &KnowledgeRecord) -> String {
        match intent {
            FollowUpIntent::Danger => self.pick(danger_pool(diagnosis.severity)).to_string(),
            FollowUpIntent::CanRide => ride_answer(diagnosis.severity).to_string(),
            FollowUpIntent::CostOrTime if diagnosis.possible_causes.is_empty() => {
                COST_TIME_UNKNOWN.to_string()
            }
            FollowUpIntent::CostOrTime => COST_TIME_KNOWN.to_string(),
        }
    }
}

impl Default for ReplyPicker {
    fn default() -> Self {
        Self::from_entropy()
    }
}
