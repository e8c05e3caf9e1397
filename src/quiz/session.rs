use std::fmt;

use log::{info, warn};
use rand::Rng;

use crate::quiz::ai_helper::{GenerationError, QuizHelper, TextBackend};
use crate::quiz::categories::CategoryPool;
use crate::quiz::grade::{is_valid_grade, DEFAULT_GRADE};
use crate::quiz::parser::{parse_question, ParseFailure};
use crate::quiz::prompt::build_prompt;
use crate::quiz::{AnswerLabel, Question};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GameState {
    #[default]
    AwaitingQuestion,
    QuestionLoading,
    QuestionActive,
    Answered,
    GameOver,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::AwaitingQuestion => "waiting for a question",
            GameState::QuestionLoading => "loading a question",
            GameState::QuestionActive => "answering a question",
            GameState::Answered => "question answered",
            GameState::GameOver => "game over",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionStats {
    pub score: u32,
    /// Questions answered correctly, whatever the number of attempts.
    pub total_questions: u32,
    pub total_attempts: u32,
    pub current_attempts: u32,
}

impl SessionStats {
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.score) / f64::from(self.total_questions)
    }

    pub fn average_attempts(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.total_attempts) / f64::from(self.total_questions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Correct { attempts: u32, explanation: String },
    Incorrect { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub score: u32,
    pub total_questions: u32,
    pub average_attempts: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("the game is over")]
    GameOver,
    #[error("a question is already being generated")]
    AlreadyLoading,
    #[error("no question is being generated")]
    NotLoading,
    #[error("answers are not accepted while {0}")]
    NotAcceptingAnswers(GameState),
    #[error("{0:?} is not one of A, B, C or D")]
    InvalidLabel(String),
    #[error("grade must be between 1 and 12, got {0}")]
    InvalidGrade(u8),
    #[error("could not generate a question: {0}")]
    Generation(#[from] GenerationError),
    #[error("could not read the generated question: {0}")]
    Parse(#[from] ParseFailure),
}

impl QuizError {
    /// True for the "could not produce a question" condition, which the user
    /// may simply retry.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, QuizError::Generation(_) | QuizError::Parse(_))
    }
}

/// Everything one player's game needs. Each chat owns its own session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    state: GameState,
    stats: SessionStats,
    grade: u8,
    categories: CategoryPool,
    history: Vec<String>,
    question: Option<Question>,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new(DEFAULT_GRADE, CategoryPool::default())
    }
}

impl QuizSession {
    pub fn new(grade: u8, categories: CategoryPool) -> Self {
        Self {
            state: GameState::AwaitingQuestion,
            stats: SessionStats::default(),
            grade,
            categories,
            history: Vec::new(),
            question: None,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn grade(&self) -> u8 {
        self.grade
    }

    pub fn categories(&self) -> &CategoryPool {
        &self.categories
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// Whether the player has already missed the current question.
    pub fn is_retrying(&self) -> bool {
        self.state == GameState::QuestionActive && self.stats.current_attempts > 0
    }

    /// Generates, validates and installs the next question.
    pub async fn request_new_question<B, R>(
        &mut self,
        helper: &QuizHelper<B>,
        rng: &mut R,
    ) -> Result<&Question, QuizError>
    where
        B: TextBackend,
        R: Rng + ?Sized,
    {
        let prompt = self.begin_loading(rng)?;
        let outcome = helper.generate(&prompt).await;
        self.finish_loading(outcome)
    }

    /// Enters `QuestionLoading` and returns the prompt to send.
    pub fn begin_loading<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<String, QuizError> {
        match self.state {
            GameState::GameOver => return Err(QuizError::GameOver),
            GameState::QuestionLoading => return Err(QuizError::AlreadyLoading),
            _ => {}
        }

        self.state = GameState::QuestionLoading;
        self.stats.current_attempts = 0;
        self.question = None;

        let category = self.categories.pick(rng);
        info!("Generating a grade {} question about {}", self.grade, category);
        Ok(build_prompt(&category, self.grade, &self.history))
    }

    /// Leaves `QuestionLoading` with either a parsed question or an error.
    /// On error the session goes back to `AwaitingQuestion` untouched.
    pub fn finish_loading(
        &mut self,
        outcome: Result<String, GenerationError>,
    ) -> Result<&Question, QuizError> {
        if self.state != GameState::QuestionLoading {
            return Err(QuizError::NotLoading);
        }

        let parsed = outcome
            .map_err(QuizError::from)
            .and_then(|raw| parse_question(&raw).map_err(QuizError::from));
        let question = match parsed {
            Ok(question) => question,
            Err(e) => {
                warn!("Question generation failed: {}", e);
                self.state = GameState::AwaitingQuestion;
                return Err(e);
            }
        };

        self.history.push(question.text.clone());
        self.state = GameState::QuestionActive;
        Ok(&*self.question.insert(question))
    }

    pub fn submit_answer(&mut self, selected: &str) -> Result<SubmitOutcome, QuizError> {
        let question = match (&self.state, &self.question) {
            (GameState::QuestionActive, Some(question)) => question,
            _ => return Err(QuizError::NotAcceptingAnswers(self.state)),
        };
        let label: AnswerLabel = selected
            .parse()
            .map_err(|_| QuizError::InvalidLabel(selected.to_string()))?;

        self.stats.current_attempts += 1;
        self.stats.total_attempts += 1;
        let attempts = self.stats.current_attempts;

        if label != question.correct {
            return Ok(SubmitOutcome::Incorrect { attempts });
        }

        let explanation = question.explanation.clone();
        self.stats.score += 1;
        self.stats.total_questions += 1;
        self.state = GameState::Answered;
        info!("Correct answer submitted after {} attempts", attempts);
        Ok(SubmitOutcome::Correct {
            attempts,
            explanation,
        })
    }

    /// Changing the grade drops the current question so the next one fits it.
    pub fn set_grade(&mut self, grade: u8) -> Result<(), QuizError> {
        if !is_valid_grade(grade) {
            return Err(QuizError::InvalidGrade(grade));
        }
        match self.state {
            GameState::GameOver => return Err(QuizError::GameOver),
            GameState::QuestionLoading => return Err(QuizError::AlreadyLoading),
            _ => {}
        }
        if grade == self.grade {
            return Ok(());
        }

        info!("Grade level changed to {}", grade);
        self.grade = grade;
        self.question = None;
        self.stats.current_attempts = 0;
        self.state = GameState::AwaitingQuestion;
        Ok(())
    }

    pub fn end_game(&mut self) -> Result<GameSummary, QuizError> {
        if self.state == GameState::GameOver {
            return Err(QuizError::GameOver);
        }
        self.state = GameState::GameOver;
        info!("Game end requested");
        Ok(self.summary())
    }

    pub fn reset(&mut self) {
        self.state = GameState::AwaitingQuestion;
        self.stats = SessionStats::default();
        self.categories.reset();
        self.history.clear();
        self.question = None;
        info!("Game reset");
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            score: self.stats.score,
            total_questions: self.stats.total_questions,
            average_attempts: self.stats.average_attempts(),
        }
    }
}
