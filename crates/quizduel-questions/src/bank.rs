//! Built-in question set, for running without a remote generator.

use quizduel_protocol::Difficulty;
use rand::seq::IndexedRandom;

use crate::GenerationError;
use crate::provider::QuestionSource;
use crate::question::{OneOrMany, RawQuestion};

struct Entry {
    prompt: &'static str,
    answers: &'static [&'static str],
    options: Option<&'static [&'static str]>,
}

impl Entry {
    fn to_raw(&self) -> RawQuestion {
        RawQuestion {
            question: self.prompt.to_string(),
            correct_answer: OneOrMany::Many(self.answers.iter().map(|a| a.to_string()).collect()),
            options: self.options.map(|opts| opts.iter().map(|o| o.to_string()).collect()),
        }
    }
}

const fn single(prompt: &'static str, answers: &'static [&'static str]) -> Entry {
    Entry {
        prompt,
        answers,
        options: None,
    }
}

const fn choice(prompt: &'static str, answer: &'static [&'static str], options: &'static [&'static str]) -> Entry {
    Entry {
        prompt,
        answers: answer,
        options: Some(options),
    }
}

const EASY: &[Entry] = &[
    single("What is the capital of France?", &["Paris"]),
    single("How many legs does a spider have?", &["8"]),
    choice("Which planet is known as the Red Planet?", &["Mars"], &["Venus", "Mars", "Jupiter", "Saturn"]),
    single("Name two primary colors.", &["red", "blue", "yellow"]),
    choice("What do bees make?", &["Honey"], &["Milk", "Honey", "Silk", "Wax paper"]),
    single("What is 7 times 6?", &["42"]),
    choice("Which animal is the largest mammal?", &["Blue whale"], &["Elephant", "Blue whale", "Giraffe", "Hippo"]),
    single("Name two of the continents.", &["Africa", "Antarctica", "Asia", "Australia", "Europe", "North America", "South America"]),
];

const MEDIUM: &[Entry] = &[
    single("What is the chemical symbol for gold?", &["Au"]),
    choice("Who painted the Mona Lisa?", &["Leonardo da Vinci"], &["Michelangelo", "Raphael", "Leonardo da Vinci", "Donatello"]),
    single("Name two noble gases.", &["helium", "neon", "argon", "krypton", "xenon", "radon"]),
    single("In which year did the Berlin Wall fall?", &["1989"]),
    choice("Which ocean is the largest?", &["Pacific"], &["Atlantic", "Indian", "Arctic", "Pacific"]),
    single("What is the longest river in Africa?", &["Nile"]),
    single("Name two of the Beatles by surname.", &["Lennon", "McCartney", "Harrison", "Starr"]),
    choice("What is the hardest natural substance?", &["Diamond"], &["Quartz", "Diamond", "Granite", "Topaz"]),
];

const HARD: &[Entry] = &[
    single("What is the smallest prime number greater than 100?", &["101"]),
    choice("Which element has atomic number 74?", &["Tungsten"], &["Tantalum", "Tungsten", "Rhenium", "Osmium"]),
    single("Name three of the seven wonders of the ancient world.", &[
        "Great Pyramid of Giza",
        "Hanging Gardens of Babylon",
        "Statue of Zeus at Olympia",
        "Temple of Artemis at Ephesus",
        "Mausoleum at Halicarnassus",
        "Colossus of Rhodes",
        "Lighthouse of Alexandria",
    ]),
    single("Who wrote 'One Hundred Years of Solitude'?", &["Gabriel Garcia Marquez"]),
    choice("What is the capital of Mongolia?", &["Ulaanbaatar"], &["Astana", "Ulaanbaatar", "Bishkek", "Tashkent"]),
    single("In which year was the Treaty of Westphalia signed?", &["1648"]),
    choice("Which composer wrote 'The Rite of Spring'?", &["Stravinsky"], &["Debussy", "Ravel", "Stravinsky", "Prokofiev"]),
    single("What is the SI unit of magnetic flux?", &["weber"]),
];

/// A fixed pool of questions per difficulty, sampled without repetition.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuestionBank;

impl QuestionBank {
    pub fn new() -> Self {
        Self
    }

    /// How many distinct questions exist for a difficulty.
    pub fn capacity(difficulty: Difficulty) -> usize {
        entries(difficulty).len()
    }
}

fn entries(difficulty: Difficulty) -> &'static [Entry] {
    match difficulty {
        Difficulty::Easy => EASY,
        Difficulty::Medium => MEDIUM,
        Difficulty::Hard => HARD,
    }
}

impl QuestionSource for QuestionBank {
    async fn generate(&self, difficulty: Difficulty, count: usize) -> Result<Vec<RawQuestion>, GenerationError> {
        let pool = entries(difficulty);
        let picked: Vec<RawQuestion> = pool
            .choose_multiple(&mut rand::rng(), count)
            .map(Entry::to_raw)
            .collect();

        if picked.len() < count {
            return Err(GenerationError::TooFewQuestions {
                wanted: count,
                got: picked.len(),
            });
        }
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::ValidationRules;

    #[test]
    fn test_every_bank_entry_validates() {
        for difficulty in Difficulty::ALL {
            for e in entries(difficulty) {
                let raw = e.to_raw();
                let rules = ValidationRules {
                    option_count: e.options.map(|_| 4),
                };
                assert!(raw.validate(rules).is_ok(), "bad bank entry: {}", e.prompt);
            }
        }
    }

    #[tokio::test]
    async fn test_generate_returns_distinct_questions() {
        let qs = QuestionBank.generate(Difficulty::Medium, 5).await.unwrap();
        assert_eq!(qs.len(), 5);
        let mut prompts: Vec<_> = qs.iter().map(|q| q.question.clone()).collect();
        prompts.sort();
        prompts.dedup();
        assert_eq!(prompts.len(), 5);
    }

    #[tokio::test]
    async fn test_generate_more_than_capacity_fails() {
        let wanted = QuestionBank::capacity(Difficulty::Hard) + 1;
        let err = QuestionBank.generate(Difficulty::Hard, wanted).await.unwrap_err();
        assert!(matches!(err, GenerationError::TooFewQuestions { .. }));
    }
}
