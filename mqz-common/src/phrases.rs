//! Fixed narration lines
//!
//! Every phrase has a packaged recording named after its list and index
//! (`encourage_en_US_0.mp3`, `wrong_ar_SA_2.mp3`, ...). The text doubles as
//! the synthesized-speech fallback and as the text-derived cache key.

use rand::seq::SliceRandom;
use rand::Rng;

/// A fixed narration line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub text: &'static str,
    pub lang: &'static str,
    pub static_id: String,
}

const EN_CELEBRATION: [&str; 4] = [
    "Great Alwaleed!",
    "Bravo Alwaleed!",
    "Excellent work!",
    "You are amazing Alwaleed!",
];

const AR_CELEBRATION: [&str; 4] = [
    "الله عليك يا الوليد!",
    "شاطر يا بطل!",
    "ممتاز يا عبقري!",
    "إجابة روعة يا مليونير!",
];

const AR_WRONG: [&str; 3] = [
    "ولا يهمك يا الوليد، فكر تاني",
    "قريب جداً، تعال نشوف الحل الصح",
    "حاول مرة تانية يا بطل",
];

const SPECIAL: &str = "يا الوليد، أنت مبدع حقاً";

const GENERIC_INTRO: &str = "أهلاً بك في من سيربح المليون! هيا نبدأ";

fn indexed(list: &[&'static str], lang: &'static str, prefix: &str) -> Vec<Phrase> {
    list.iter()
        .enumerate()
        .map(|(i, text)| Phrase {
            text,
            lang,
            static_id: format!("{}_{}.mp3", prefix, i),
        })
        .collect()
}

/// English praise lines
pub fn english_celebration() -> Vec<Phrase> {
    indexed(&EN_CELEBRATION, "en-US", "encourage_en_US")
}

/// Arabic praise lines
pub fn arabic_celebration() -> Vec<Phrase> {
    indexed(&AR_CELEBRATION, "ar-SA", "encourage_ar_SA")
}

/// Arabic consolation lines for a wrong answer
pub fn arabic_wrong() -> Vec<Phrase> {
    indexed(&AR_WRONG, "ar-SA", "wrong_ar_SA")
}

pub fn special() -> Phrase {
    Phrase {
        text: SPECIAL,
        lang: "ar-SA",
        static_id: "encourage_special_1.mp3".to_string(),
    }
}

pub fn generic_intro() -> Phrase {
    Phrase {
        text: GENERIC_INTRO,
        lang: "ar-SA",
        static_id: "intro_generic.mp3".to_string(),
    }
}

/// Every fixed phrase, in packaging order
pub fn all() -> Vec<Phrase> {
    let mut phrases = english_celebration();
    phrases.extend(arabic_celebration());
    phrases.push(special());
    phrases.extend(arabic_wrong());
    phrases.push(generic_intro());
    phrases
}

/// Pick a reaction to an answer.
///
/// Correct answers draw evenly from English praise, Arabic praise and the
/// special line; wrong answers draw from the consolation list.
pub fn pick_encouragement<R: Rng + ?Sized>(correct: bool, rng: &mut R) -> Phrase {
    let pool = if correct {
        match rng.gen_range(0..3) {
            0 => english_celebration(),
            1 => arabic_celebration(),
            _ => vec![special()],
        }
    } else {
        arabic_wrong()
    };

    pool.choose(rng).cloned().unwrap_or_else(generic_intro)
}
