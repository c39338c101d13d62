//! The normalized question model and the loose shape generators return.

use std::collections::{BTreeSet, HashSet};

use quizduel_protocol::{QuestionView, RevealedQuestion};
use serde::Deserialize;

/// Canonical form used for every comparison: trimmed and lowercased.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// A validated, normalized question.
///
/// The kind is implied by the data:
///
/// | `options` | `correct.len()` | kind            |
/// |-----------|-----------------|-----------------|
/// | `Some`    | any             | multiple choice |
/// | `None`    | 1               | single answer   |
/// | `None`    | > 1             | list N items    |
///
/// All three are scored by [`Question::score`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    prompt: String,
    correct: BTreeSet<String>,
    options: Option<Vec<String>>,
}

impl Question {
    /// Builds a question from already-normalized parts.
    ///
    /// Prefer [`RawQuestion::validate`] for anything that came from outside.
    pub fn new(prompt: impl Into<String>, correct: impl IntoIterator<Item = String>, options: Option<Vec<String>>) -> Self {
        Self {
            prompt: prompt.into(),
            correct: correct.into_iter().map(|c| normalize(&c)).collect(),
            options: options.map(|opts| opts.iter().map(|o| normalize(o)).collect()),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn correct(&self) -> &BTreeSet<String> {
        &self.correct
    }

    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }

    /// Checks the shape of a submission before it is scored.
    ///
    /// A submission may hold at most as many distinct values as the
    /// question expects answers, and on a multiple-choice question every
    /// value must be one of the options. Blank values are ignored.
    ///
    /// # Errors
    /// A message naming the rule that was broken.
    pub fn check_submission(&self, submitted: &[String]) -> Result<(), String> {
        let distinct = distinct_values(submitted);
        if distinct.len() > self.correct.len() {
            return Err(format!(
                "{} answers given, at most {} allowed",
                distinct.len(),
                self.correct.len()
            ));
        }
        if let Some(options) = &self.options {
            if let Some(stray) = distinct.iter().find(|v| !options.contains(*v)) {
                return Err(format!("{stray:?} is not one of the options"));
            }
        }
        Ok(())
    }

    /// Points earned by a submission: the number of distinct normalized
    /// submitted values that are correct. Repeating a correct value earns
    /// nothing extra; wrong values cost nothing. Callers run
    /// [`Question::check_submission`] first.
    pub fn score(&self, submitted: &[String]) -> u32 {
        let hits = distinct_values(submitted)
            .iter()
            .filter(|v| self.correct.contains(*v))
            .count();
        u32::try_from(hits).unwrap_or(u32::MAX)
    }

    /// What players see while the round is running. No answers.
    pub fn view(&self) -> QuestionView {
        QuestionView {
            prompt: self.prompt.clone(),
            options: self.options.clone(),
            expected_answers: self.correct.len(),
        }
    }

    /// The question with its answers, for the end-of-game results.
    pub fn reveal(&self) -> RevealedQuestion {
        RevealedQuestion {
            prompt: self.prompt.clone(),
            correct_answers: self.correct.iter().cloned().collect(),
        }
    }
}

fn distinct_values(submitted: &[String]) -> HashSet<String> {
    submitted
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// A single value or a list, as generators tend to mix both.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// A question exactly as a generator produced it.
///
/// Deliberately loose: the answer field is accepted under several names
/// and as either a string or a list. [`RawQuestion::validate`] repairs
/// what it can and rejects the rest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(alias = "prompt")]
    pub question: String,
    #[serde(alias = "correctAnswers", alias = "answer", alias = "answers")]
    pub correct_answer: OneOrMany,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// Shape rules applied during validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationRules {
    /// Required number of options on multiple-choice questions.
    /// `None` accepts any count of two or more.
    pub option_count: Option<usize>,
}

impl RawQuestion {
    /// Convenience constructor for a single-answer question.
    pub fn single(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            correct_answer: OneOrMany::One(answer.into()),
            options: None,
        }
    }

    /// Normalizes and checks this question.
    ///
    /// # Errors
    /// A short reason string when the question is unusable. Invalid items
    /// are dropped by the provider, so the reason only ends up in logs.
    pub fn validate(self, rules: ValidationRules) -> Result<Question, String> {
        let prompt = self.question.trim().to_string();
        if prompt.is_empty() {
            return Err("empty prompt".into());
        }

        let correct: BTreeSet<String> = self
            .correct_answer
            .into_vec()
            .iter()
            .map(|c| normalize(c))
            .filter(|c| !c.is_empty())
            .collect();
        if correct.is_empty() {
            return Err("no correct answer".into());
        }

        let options = match self.options {
            None => None,
            Some(raw) => {
                let options: Vec<String> = raw.iter().map(|o| normalize(o)).collect();
                let distinct: HashSet<&String> = options.iter().collect();
                if distinct.len() != options.len() {
                    return Err("duplicate options".into());
                }
                if options.iter().any(String::is_empty) {
                    return Err("empty option".into());
                }
                if options.len() < 2 {
                    return Err("fewer than two options".into());
                }
                if let Some(expected) = rules.option_count {
                    if options.len() != expected {
                        return Err(format!("expected {expected} options, got {}", options.len()));
                    }
                }
                if let Some(missing) = correct.iter().find(|c| !distinct.contains(c)) {
                    return Err(format!("correct answer {missing:?} is not an option"));
                }
                Some(options)
            }
        };

        Ok(Question {
            prompt,
            correct,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    // =====================================================================
    // score()
    // =====================================================================

    #[test]
    fn test_score_counts_distinct_correct_values() {
        let q = Question::new("Name two primes", strings(&["2", "3", "5", "7"]), None);

        assert_eq!(q.score(&strings(&["2", "3"])), 2);
        assert_eq!(q.score(&strings(&["2", "2", " 2 "])), 1);
        assert_eq!(q.score(&strings(&["4", "9"])), 0);
        assert_eq!(q.score(&[]), 0);
    }

    #[test]
    fn test_check_submission_rejects_every_option() {
        let q = Question::new(
            "Capital of France?",
            strings(&["Paris"]),
            Some(strings(&["Paris", "Rome", "Berlin", "Madrid"])),
        );

        let err = q.check_submission(&strings(&["paris", "rome", "berlin", "madrid"])).unwrap_err();
        assert!(err.contains("at most 1"), "{err}");
        assert!(q.check_submission(&strings(&["Rome"])).is_ok());
        assert!(q.check_submission(&strings(&[" PARIS ", "paris"])).is_ok());
    }

    #[test]
    fn test_check_submission_rejects_value_outside_options() {
        let q = Question::new("Pick a fruit", strings(&["apple"]), Some(strings(&["apple", "stone"])));
        assert!(q.check_submission(&strings(&["banana"])).is_err());
    }

    #[test]
    fn test_check_submission_caps_list_guesses() {
        let q = Question::new("Name two primary colours", strings(&["red", "blue"]), None);

        assert!(q.check_submission(&strings(&["red", "green"])).is_ok());
        assert!(q.check_submission(&strings(&["red", "green", "blue"])).is_err());
        // Blanks do not count toward the limit.
        assert!(q.check_submission(&strings(&["red", "", "  ", "blue"])).is_ok());
        assert_eq!(q.score(&strings(&["red", "", "blue"])), 2);
    }

    #[test]
    fn test_score_is_case_and_whitespace_insensitive() {
        let q = Question::new("Capital of France?", strings(&["Paris"]), None);
        assert_eq!(q.score(&strings(&["  PARIS "])), 1);
    }

    #[test]
    fn test_view_hides_answers_and_reports_expected_count() {
        let q = Question::new("Name three colors", strings(&["red", "green", "blue"]), None);
        let view = q.view();
        assert_eq!(view.expected_answers, 3);
        assert!(view.options.is_none());
        assert_eq!(q.reveal().correct_answers.len(), 3);
    }

    // =====================================================================
    // validate()
    // =====================================================================

    #[test]
    fn test_validate_normalizes_answers() {
        let q = RawQuestion::single("  Capital of Spain? ", " Madrid ")
            .validate(ValidationRules::default())
            .unwrap();
        assert_eq!(q.prompt(), "Capital of Spain?");
        assert!(q.correct().contains("madrid"));
    }

    #[test]
    fn test_validate_rejects_empty_prompt() {
        let raw = RawQuestion::single("   ", "x");
        assert!(raw.validate(ValidationRules::default()).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_answers() {
        let raw = RawQuestion {
            question: "q".into(),
            correct_answer: OneOrMany::Many(strings(&["", "  "])),
            options: None,
        };
        assert!(raw.validate(ValidationRules::default()).is_err());
    }

    #[test]
    fn test_validate_rejects_answer_missing_from_options() {
        let raw = RawQuestion {
            question: "2 + 2?".into(),
            correct_answer: OneOrMany::One("4".into()),
            options: Some(strings(&["1", "2", "3"])),
        };
        assert!(raw.validate(ValidationRules::default()).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_options_after_normalization() {
        let raw = RawQuestion {
            question: "Pick".into(),
            correct_answer: OneOrMany::One("a".into()),
            options: Some(strings(&["a", " A", "b"])),
        };
        assert!(raw.validate(ValidationRules::default()).is_err());
    }

    #[test]
    fn test_validate_enforces_option_count() {
        let raw = RawQuestion {
            question: "Pick".into(),
            correct_answer: OneOrMany::One("a".into()),
            options: Some(strings(&["a", "b", "c"])),
        };
        let rules = ValidationRules {
            option_count: Some(4),
        };
        assert!(raw.clone().validate(rules).is_err());
        assert!(raw.validate(ValidationRules::default()).is_ok());
    }

    #[test]
    fn test_raw_question_accepts_aliases_and_lists() {
        let json = r#"{"prompt": "Name two oceans", "answers": ["Atlantic", "Pacific"]}"#;
        let raw: RawQuestion = serde_json::from_str(json).unwrap();
        let q = raw.validate(ValidationRules::default()).unwrap();
        assert_eq!(q.correct().len(), 2);
    }

    #[test]
    fn test_raw_question_accepts_camel_case_answer() {
        let json = r#"{"question": "2+2", "correctAnswer": "4", "options": ["3","4"]}"#;
        let raw: RawQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(raw.correct_answer, OneOrMany::One("4".into()));
    }
}
