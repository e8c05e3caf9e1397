pub mod ai_helper;
pub mod categories;
pub mod grade;
pub mod parser;
pub mod prompt;
pub mod session;

use std::fmt;
use std::str::FromStr;

pub use session::{GameState, GameSummary, QuizError, QuizSession, SessionStats, SubmitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

impl AnswerLabel {
    pub const ALL: [AnswerLabel; 4] = [AnswerLabel::A, AnswerLabel::B, AnswerLabel::C, AnswerLabel::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerLabel::A => "A",
            AnswerLabel::B => "B",
            AnswerLabel::C => "C",
            AnswerLabel::D => "D",
        }
    }
}

impl fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerLabel {
    type Err = ();

    /// Accepts a bare label in any case ("b") or a rendered option ("B) 4").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.split(')').next().unwrap_or_default().trim();
        match label.to_uppercase().as_str() {
            "A" => Ok(AnswerLabel::A),
            "B" => Ok(AnswerLabel::B),
            "C" => Ok(AnswerLabel::C),
            "D" => Ok(AnswerLabel::D),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub text: String,
    /// Rendered as "A) ...", "B) ..." in label order.
    pub options: [String; 4],
    pub correct: AnswerLabel,
    pub explanation: String,
    pub category: String,
}

impl Question {
    pub fn correct_option(&self) -> &str {
        let idx = AnswerLabel::ALL
            .iter()
            .position(|l| *l == self.correct)
            .unwrap_or_default();
        &self.options[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("b".parse(), Ok(AnswerLabel::B));
        assert_eq!(" D ".parse(), Ok(AnswerLabel::D));
        assert_eq!("C) Jupiter".parse(), Ok(AnswerLabel::C));
        assert_eq!("E".parse::<AnswerLabel>(), Err(()));
        assert_eq!("".parse::<AnswerLabel>(), Err(()));
        assert_eq!("AB".parse::<AnswerLabel>(), Err(()));
    }
}
