//! The question bank: a read-only pool that each new game draws from.

use std::sync::Arc;

use quizforge_protocol::QuestionPayload;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One multiple-choice question.
///
/// The JSON shape (`question`, `answers`, `correct`) is also the format
/// [`QuestionBank::from_json`] accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The question text.
    #[serde(rename = "question")]
    pub text: String,
    /// Answer labels in display order.
    pub answers: Vec<String>,
    /// Index into `answers` of the right answer.
    pub correct: usize,
}

impl Question {
    /// Builds the wire form. `with_answer_key` is `true` only for the host.
    pub fn to_payload(&self, with_answer_key: bool) -> QuestionPayload {
        QuestionPayload {
            question: self.text.clone(),
            answers: self.answers.clone(),
            correct: with_answer_key.then_some(self.correct),
        }
    }

    fn check(&self, index: usize) -> Result<(), BankError> {
        let invalid = |reason: &'static str| BankError::InvalidQuestion {
            index,
            reason,
        };
        if self.text.trim().is_empty() {
            return Err(invalid("question text is empty"));
        }
        if self.answers.len() < 2 {
            return Err(invalid("needs at least two answers"));
        }
        if self.correct >= self.answers.len() {
            return Err(invalid("correct index is out of range"));
        }
        Ok(())
    }
}

/// Errors from loading a question bank.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    /// The JSON couldn't be parsed as a list of questions.
    #[error("failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),

    /// The bank has no questions.
    #[error("question bank is empty")]
    Empty,

    /// A question is unusable.
    #[error("question {index} is invalid: {reason}")]
    InvalidQuestion { index: usize, reason: &'static str },
}

/// An immutable pool of questions.
///
/// Cheap to clone; the questions live behind an `Arc`.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Arc<[Question]>,
}

impl QuestionBank {
    /// Builds a bank after checking every question.
    ///
    /// # Errors
    /// [`BankError::Empty`] or [`BankError::InvalidQuestion`].
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::Empty);
        }
        for (index, q) in questions.iter().enumerate() {
            q.check(index)?;
        }
        Ok(Self {
            questions: questions.into(),
        })
    }

    /// Parses a JSON array of `{question, answers, correct}` objects.
    ///
    /// ```rust
    /// use quizforge_session::QuestionBank;
    ///
    /// let bank = QuestionBank::from_json(
    ///     r#"[{"question":"2 + 2?","answers":["3","4"],"correct":1}]"#,
    /// ).unwrap();
    /// assert_eq!(bank.len(), 1);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let questions: Vec<Question> = serde_json::from_str(json)?;
        Self::new(questions)
    }

    /// Number of questions in the bank.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always `false` for a constructed bank.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// All questions in bank order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Draws `count` distinct questions in random order.
    ///
    /// Returns the whole bank, shuffled, if it holds fewer than `count`.
    pub fn draw(&self, count: usize) -> Vec<Question> {
        let mut drawn = self.questions.to_vec();
        drawn.shuffle(&mut rand::rng());
        drawn.truncate(count);
        drawn
    }
}

impl Default for QuestionBank {
    /// The built-in road-safety quiz.
    fn default() -> Self {
        Self {
            questions: builtin_questions().into(),
        }
    }
}

fn q(text: &str, answers: [&str; 4], correct: usize) -> Question {
    Question {
        text: text.to_string(),
        answers: answers.iter().map(|a| a.to_string()).collect(),
        correct,
    }
}

fn builtin_questions() -> Vec<Question> {
    vec![
        q(
            "What is the maximum speed allowed on urban roads in Brazil?",
            ["40 km/h", "50 km/h", "60 km/h", "70 km/h"],
            2,
        ),
        q(
            "What does a traffic sign with a blue background and a white symbol mean?",
            ["Prohibition", "Warning", "Regulation", "Information"],
            3,
        ),
        q(
            "How many points on a licence lead to suspension of the right to drive?",
            ["15 points", "20 points", "25 points", "30 points"],
            1,
        ),
        q(
            "What is the minimum distance for parking before a corner?",
            ["3 metres", "5 metres", "8 metres", "10 metres"],
            1,
        ),
        q(
            "What should you do when approaching a crossing with an amber light?",
            ["Speed up to get through", "Stop if possible", "Sound the horn", "Ignore it"],
            1,
        ),
        q(
            "What is the minimum age for a category B licence?",
            ["16 years", "17 years", "18 years", "21 years"],
            2,
        ),
        q(
            "What does a solid yellow line in the middle of the road mean?",
            ["You may overtake", "No overtaking", "Caution", "Parking"],
            1,
        ),
        q(
            "How long after expiry do you have to renew your licence?",
            ["30 days", "60 days", "90 days", "1 year"],
            0,
        ),
        q(
            "Who has right of way at a roundabout?",
            ["Whoever is entering", "Whoever is already on it", "The largest vehicle", "Nobody"],
            1,
        ),
        q(
            "How serious is the offence of driving without a licence?",
            ["Minor", "Medium", "Serious", "Very serious"],
            3,
        ),
        q(
            "What must you use when driving at night?",
            ["Dipped headlights", "Full beam", "Hazard lights", "Side lights"],
            0,
        ),
        q(
            "What is the maximum speed on dual carriageway highways?",
            ["100 km/h", "110 km/h", "120 km/h", "130 km/h"],
            1,
        ),
        q(
            "What does sign R-1 mean?",
            ["Stop", "Give way", "No left turn", "No entry"],
            0,
        ),
        q(
            "How long must you have held a licence to drive professionally?",
            ["1 year", "2 years", "3 years", "5 years"],
            1,
        ),
        q(
            "What should you do when you see an ambulance with its siren on?",
            ["Speed up", "Make way", "Stop in the middle of the road", "Ignore it"],
            1,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_builtin_bank_is_valid() {
        let questions = builtin_questions();
        assert_eq!(questions.len(), 15);
        assert!(QuestionBank::new(questions).is_ok());
    }

    #[test]
    fn test_draw_returns_distinct_questions() {
        let bank = QuestionBank::default();
        let drawn = bank.draw(10);

        assert_eq!(drawn.len(), 10);
        let texts: HashSet<_> = drawn.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts.len(), 10, "no question drawn twice");
    }

    #[test]
    fn test_draw_more_than_bank_returns_whole_bank() {
        let bank = QuestionBank::from_json(
            r#"[{"question":"a?","answers":["x","y"],"correct":0},
                {"question":"b?","answers":["x","y"],"correct":1}]"#,
        )
        .unwrap();
        assert_eq!(bank.draw(10).len(), 2);
    }

    #[test]
    fn test_from_json_rejects_empty_bank() {
        assert!(matches!(
            QuestionBank::from_json("[]"),
            Err(BankError::Empty)
        ));
    }

    #[test]
    fn test_from_json_rejects_out_of_range_correct_index() {
        let result = QuestionBank::from_json(
            r#"[{"question":"a?","answers":["x","y"],"correct":2}]"#,
        );
        assert!(matches!(
            result,
            Err(BankError::InvalidQuestion { index: 0, .. })
        ));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            QuestionBank::from_json("{not json"),
            Err(BankError::Parse(_))
        ));
    }

    #[test]
    fn test_to_payload_hides_answer_key_for_players() {
        let question = q("a?", ["w", "x", "y", "z"], 2);
        assert_eq!(question.to_payload(true).correct, Some(2));
        assert_eq!(question.to_payload(false).correct, None);
        assert_eq!(question.to_payload(false).answers.len(), 4);
    }
}
