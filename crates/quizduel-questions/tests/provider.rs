//! Provider behaviour against scripted generators.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use quizduel_protocol::Difficulty;
use quizduel_questions::{
    GenerationError, OneOrMany, ProviderConfig, QuestionSetProvider, QuestionSource, RawQuestion,
};

/// Replays one canned result per call and counts calls.
struct Scripted {
    replies: Mutex<VecDeque<Result<Vec<RawQuestion>, GenerationError>>>,
    calls: AtomicU32,
}

impl Scripted {
    fn new(replies: Vec<Result<Vec<RawQuestion>, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QuestionSource for Scripted {
    async fn generate(&self, _difficulty: Difficulty, _count: usize) -> Result<Vec<RawQuestion>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::Upstream("script exhausted".into())))
    }
}

fn good(n: usize) -> Vec<RawQuestion> {
    (0..n)
        .map(|i| RawQuestion::single(format!("Question {i}?"), format!("answer {i}")))
        .collect()
}

#[tokio::test]
async fn fetch_returns_exactly_count_questions() {
    let provider = QuestionSetProvider::new(Scripted::new(vec![Ok(good(7))]));

    let qs = provider.fetch(Difficulty::Easy, 5).await.unwrap();

    assert_eq!(qs.len(), 5);
    assert_eq!(qs[0].prompt(), "Question 0?");
    assert!(qs[0].correct().contains("answer 0"));
}

#[tokio::test]
async fn fetch_drops_invalid_items() {
    let mut batch = good(3);
    batch.insert(1, RawQuestion::single("", "orphan answer"));
    batch.push(RawQuestion {
        question: "Pick one".into(),
        correct_answer: OneOrMany::One("z".into()),
        options: Some(vec!["a".into(), "b".into()]),
    });
    let provider = QuestionSetProvider::new(Scripted::new(vec![Ok(batch)]));

    let qs = provider.fetch(Difficulty::Easy, 3).await.unwrap();

    assert_eq!(qs.len(), 3);
    assert!(qs.iter().all(|q| !q.prompt().is_empty()));
}

#[tokio::test]
async fn fetch_retries_short_batch_then_succeeds() {
    let provider = QuestionSetProvider::new(Scripted::new(vec![Ok(good(2)), Ok(good(5))]));

    let qs = provider.fetch(Difficulty::Medium, 5).await.unwrap();

    assert_eq!(qs.len(), 5);
    assert_eq!(provider.source().calls(), 2);
}

#[tokio::test]
async fn fetch_gives_up_after_max_attempts() {
    let provider = QuestionSetProvider::with_config(
        Scripted::new(vec![
            Err(GenerationError::Upstream("503".into())),
            Err(GenerationError::Malformed("prose".into())),
            Ok(good(10)),
        ]),
        ProviderConfig {
            max_attempts: 2,
            ..ProviderConfig::default()
        },
    );

    let err = provider.fetch(Difficulty::Hard, 5).await.unwrap_err();

    assert!(matches!(err, GenerationError::Malformed(_)));
    assert_eq!(provider.source().calls(), 2);
}

#[tokio::test]
async fn fetch_does_not_retry_missing_credential() {
    let provider = QuestionSetProvider::new(Scripted::new(vec![Err(GenerationError::MissingCredential)]));

    let err = provider.fetch(Difficulty::Easy, 1).await.unwrap_err();

    assert!(matches!(err, GenerationError::MissingCredential));
    assert_eq!(provider.source().calls(), 1);
}

#[tokio::test]
async fn fetch_reports_too_few_questions() {
    let provider = QuestionSetProvider::with_config(
        Scripted::new(vec![Ok(good(1))]),
        ProviderConfig {
            max_attempts: 1,
            ..ProviderConfig::default()
        },
    );

    let err = provider.fetch(Difficulty::Easy, 4).await.unwrap_err();

    assert!(matches!(err, GenerationError::TooFewQuestions { wanted: 4, got: 1 }));
}

#[tokio::test]
async fn zero_max_attempts_is_clamped_to_one() {
    let provider = QuestionSetProvider::with_config(
        Scripted::new(vec![Ok(good(1))]),
        ProviderConfig {
            max_attempts: 0,
            ..ProviderConfig::default()
        },
    );

    assert_eq!(provider.fetch(Difficulty::Easy, 1).await.unwrap().len(), 1);
}

/// Never answers.
struct Stalled {
    calls: AtomicU32,
}

impl QuestionSource for Stalled {
    async fn generate(&self, _difficulty: Difficulty, _count: usize) -> Result<Vec<RawQuestion>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn fetch_from_stalled_generator_times_out_each_attempt() {
    let provider = QuestionSetProvider::with_config(
        Stalled { calls: AtomicU32::new(0) },
        ProviderConfig {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(10),
            ..ProviderConfig::default()
        },
    );

    let started = tokio::time::Instant::now();
    let err = provider.fetch(Difficulty::Easy, 5).await.unwrap_err();

    assert!(matches!(err, GenerationError::Upstream(_)), "{err:?}");
    assert!(err.is_retryable());
    assert_eq!(provider.source().calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn fetch_retries_after_timeout_then_succeeds() {
    struct SlowThenFast {
        calls: AtomicU32,
    }

    impl QuestionSource for SlowThenFast {
        async fn generate(&self, _difficulty: Difficulty, count: usize) -> Result<Vec<RawQuestion>, GenerationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(good(count))
        }
    }

    let provider = QuestionSetProvider::new(SlowThenFast { calls: AtomicU32::new(0) });

    let qs = provider.fetch(Difficulty::Medium, 3).await.unwrap();

    assert_eq!(qs.len(), 3);
    assert_eq!(provider.source().calls.load(Ordering::SeqCst), 2);
}
