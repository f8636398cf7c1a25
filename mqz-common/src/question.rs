//! Question model and generator
//!
//! Questions are opaque to the audio layer except for two derived values:
//! the spoken wording ([`Question::audio_text`]) and the packaged asset name
//! ([`Question::static_asset_id`]). Only multiplication and division facts have
//! packaged recordings; addition and subtraction are unbounded.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

/// Prize ladder, one rung per question
pub const LEVELS: [u32; 15] = [
    100, 200, 300, 500, 1000, 2000, 4000, 8000, 16000, 32000, 64000, 125000, 250000, 500000,
    1000000,
];

/// Arithmetic operation of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Multiplication,
    Division,
    Addition,
    Subtraction,
}

impl Operation {
    /// Display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Multiplication => "×",
            Operation::Division => "÷",
            Operation::Addition => "+",
            Operation::Subtraction => "-",
        }
    }

    /// Spoken English verb phrase
    pub fn spoken(&self) -> &'static str {
        match self {
            Operation::Multiplication => "times",
            Operation::Division => "divided by",
            Operation::Addition => "plus",
            Operation::Subtraction => "minus",
        }
    }

    fn apply(&self, a: u32, b: u32) -> u32 {
        match self {
            Operation::Multiplication => a * b,
            Operation::Division => a / b,
            Operation::Addition => a + b,
            Operation::Subtraction => a - b,
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "multiplication" | "mul" => Ok(Operation::Multiplication),
            "division" | "div" => Ok(Operation::Division),
            "addition" | "add" => Ok(Operation::Addition),
            "subtraction" | "sub" => Ok(Operation::Subtraction),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown operation: {}",
                other
            ))),
        }
    }
}

/// Difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::str::FromStr for Difficulty {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown difficulty: {}",
                other
            ))),
        }
    }
}

/// One quiz question
///
/// For missing-operand questions (`? × b = r`) `operand_a` holds the hidden
/// value, which is also the correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub operation: Operation,
    pub operand_a: u32,
    pub operand_b: u32,
    /// Value to the right of the equals sign
    pub result: u32,
    pub correct_answer: u32,
    /// Four distinct choices, shuffled
    pub answers: Vec<u32>,
    pub missing_operand: bool,
}

impl Question {
    /// Build a standard `a ∘ b = ?` question with generated choices.
    pub fn standard<R: Rng + ?Sized>(operation: Operation, a: u32, b: u32, rng: &mut R) -> Self {
        let result = operation.apply(a, b);
        Self {
            operation,
            operand_a: a,
            operand_b: b,
            result,
            correct_answer: result,
            answers: make_choices(result, 5, rng),
            missing_operand: false,
        }
    }

    /// Build a `? ∘ b = r` question where the hidden operand is `a`.
    pub fn missing_first<R: Rng + ?Sized>(
        operation: Operation,
        a: u32,
        b: u32,
        rng: &mut R,
    ) -> Self {
        let result = operation.apply(a, b);
        let spread = if a > 10 { 10 } else { 5 };
        Self {
            operation,
            operand_a: a,
            operand_b: b,
            result,
            correct_answer: a,
            answers: make_choices(a, spread, rng),
            missing_operand: true,
        }
    }

    /// Displayed question text, e.g. `3 × 4 = ؟`
    pub fn text(&self) -> String {
        let sym = self.operation.symbol();
        if self.missing_operand {
            format!("؟ {} {} = {}", sym, self.operand_b, self.result)
        } else {
            format!("{} {} {} = ؟", self.operand_a, sym, self.operand_b)
        }
    }

    /// Wording handed to narration (numbers spelled out below 1000)
    pub fn audio_text(&self) -> String {
        let verb = self.operation.spoken();
        if self.missing_operand {
            format!(
                "What number {} {} equals {}?",
                verb,
                number_to_words(self.operand_b),
                number_to_words(self.result)
            )
        } else {
            format!(
                "{} {} {} equals ?",
                number_to_words(self.operand_a),
                verb,
                number_to_words(self.operand_b)
            )
        }
    }

    /// Packaged asset name, when this question has a pre-recorded narration
    pub fn static_asset_id(&self) -> Option<String> {
        if self.missing_operand {
            return None;
        }
        match self.operation {
            Operation::Multiplication => Some(format!(
                "math_mul_{}_{}.mp3",
                self.operand_a, self.operand_b
            )),
            Operation::Division => Some(format!(
                "math_div_{}_{}.mp3",
                self.operand_a, self.operand_b
            )),
            Operation::Addition | Operation::Subtraction => None,
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Anything that can hand out the next question of a session
pub trait QuestionSource: Send {
    fn next_question(&mut self) -> Question;
}

/// Stateless random question generator
#[derive(Debug, Clone)]
pub struct QuestionGenerator {
    pub operation: Operation,
    pub difficulty: Difficulty,
    /// Restrict multiplication/division to one times table
    pub table: Option<u32>,
}

impl QuestionGenerator {
    pub fn new(operation: Operation, difficulty: Difficulty) -> Self {
        Self {
            operation,
            difficulty,
            table: None,
        }
    }

    pub fn with_table(mut self, table: u32) -> Self {
        self.table = Some(table.max(1));
        self
    }

    /// Generate one question using the supplied RNG.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let missing = self.table.is_none()
            && self.difficulty != Difficulty::Easy
            && rng.gen_bool(0.2);

        let (a, b) = self.operands(rng);
        if missing {
            Question::missing_first(self.operation, a, b, rng)
        } else {
            Question::standard(self.operation, a, b, rng)
        }
    }

    fn operands<R: Rng + ?Sized>(&self, rng: &mut R) -> (u32, u32) {
        use Difficulty::*;

        match self.operation {
            Operation::Multiplication => {
                if let Some(table) = self.table {
                    let other = rng.gen_range(1..=10);
                    return if rng.gen_bool(0.5) {
                        (table, other)
                    } else {
                        (other, table)
                    };
                }
                match self.difficulty {
                    Easy => (rng.gen_range(2..=5), rng.gen_range(2..=5)),
                    Medium => (rng.gen_range(3..=9), rng.gen_range(3..=9)),
                    Hard => (rng.gen_range(6..=12), rng.gen_range(4..=9)),
                }
            }
            Operation::Division => {
                // (quotient, divisor); dividend is their product
                let (quotient, divisor) = if let Some(table) = self.table {
                    (rng.gen_range(1..=10), table)
                } else {
                    match self.difficulty {
                        Easy => (rng.gen_range(2..=5), rng.gen_range(2..=5)),
                        Medium => (rng.gen_range(3..=9), rng.gen_range(3..=9)),
                        Hard => (rng.gen_range(4..=9), rng.gen_range(6..=12)),
                    }
                };
                (quotient * divisor, divisor)
            }
            Operation::Addition => match self.difficulty {
                Easy => (rng.gen_range(5..=20), rng.gen_range(5..=20)),
                Medium => (rng.gen_range(20..=100), rng.gen_range(20..=100)),
                Hard => (rng.gen_range(100..=500), rng.gen_range(100..=500)),
            },
            Operation::Subtraction => match self.difficulty {
                Easy => {
                    let a = rng.gen_range(10..=30);
                    (a, rng.gen_range(1..a))
                }
                Medium => {
                    let a = rng.gen_range(50..=150);
                    (a, rng.gen_range(10..=a - 10))
                }
                Hard => {
                    let a = rng.gen_range(200..=1000);
                    (a, rng.gen_range(50..=a - 50))
                }
            },
        }
    }
}

impl QuestionSource for QuestionGenerator {
    fn next_question(&mut self) -> Question {
        self.generate(&mut rand::thread_rng())
    }
}

/// Four distinct choices around `answer`, shuffled.
fn make_choices<R: Rng + ?Sized>(answer: u32, spread: u32, rng: &mut R) -> Vec<u32> {
    let mut choices = BTreeSet::new();
    choices.insert(answer);

    while choices.len() < 4 {
        let offset = rng.gen_range(1..=spread) as i64;
        let signed = if rng.gen_bool(0.5) { offset } else { -offset };
        let mut fake = (answer as i64 + signed).unsigned_abs() as u32;
        if fake == answer {
            fake = answer + 1;
        }
        choices.insert(fake);
    }

    let mut choices: Vec<u32> = choices.into_iter().collect();
    choices.shuffle(rng);
    choices
}

/// Spell out a number in English for narration.
///
/// Numbers of 1000 and above are returned as digits.
pub fn number_to_words(num: u32) -> String {
    const ONES: [&str; 20] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
        "eighteen", "nineteen",
    ];
    const TENS: [&str; 10] = [
        "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    ];

    match num {
        0..=19 => ONES[num as usize].to_string(),
        20..=99 => {
            let (ten, one) = (num / 10, num % 10);
            if one == 0 {
                TENS[ten as usize].to_string()
            } else {
                format!("{} {}", TENS[ten as usize], ONES[one as usize])
            }
        }
        100..=999 => {
            let (hundred, rest) = (num / 100, num % 100);
            if rest == 0 {
                format!("{} hundred", ONES[hundred as usize])
            } else {
                format!("{} hundred {}", ONES[hundred as usize], number_to_words(rest))
            }
        }
        _ => num.to_string(),
    }
}
