//! # MQZ Common Library
//!
//! Shared code for the MQZ quiz crates:
//! - Bootstrap configuration (TOML) and data folder resolution
//! - Question model, generator and spoken wording
//! - Fixed narration phrases with their packaged asset names

pub mod config;
pub mod error;
pub mod phrases;
pub mod question;

pub use error::{Error, Result};
pub use phrases::Phrase;
pub use question::{Difficulty, Operation, Question, QuestionGenerator};
