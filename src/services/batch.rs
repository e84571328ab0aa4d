//! Batch AI classification stage.

use std::collections::HashMap;

use super::classifier::SenderClassifier;
use crate::domain::{Category, CategoryOutcome, ClassificationResult, SenderEvidence, User};

/// Classifies all senders in a single engine round-trip.
///
/// Returns exactly one result per input sender, in input order. Senders the
/// engine does not answer for are unresolved. Engine errors leave the whole
/// batch unresolved instead of failing the run.
pub async fn classify_batch<C>(
    classifier: &C,
    user: &User,
    senders: &[SenderEvidence],
    categories: &[Category],
) -> Vec<ClassificationResult>
where
    C: SenderClassifier + ?Sized,
{
    if senders.is_empty() {
        return Vec::new();
    }

    let answers = match classifier.classify_batch(user, senders, categories).await {
        Ok(answers) => answers,
        Err(e) => {
            tracing::warn!(
                user_id = %user.id,
                senders = senders.len(),
                error = %e,
                "batch classification failed; senders left unresolved"
            );
            return senders
                .iter()
                .map(|s| ClassificationResult::unresolved(&s.sender))
                .collect();
        }
    };

    let mut by_sender: HashMap<String, Option<CategoryOutcome>> = HashMap::new();
    // First usable answer per sender wins; an empty answer never shadows a later one.
    for answer in answers {
        let slot = by_sender.entry(answer.sender.to_lowercase()).or_default();
        if slot.is_none() {
            *slot = answer.outcome;
        }
    }

    let results: Vec<ClassificationResult> = senders
        .iter()
        .map(|s| {
            let outcome = by_sender
                .get(&s.sender.to_lowercase())
                .cloned()
                .flatten();
            ClassificationResult::new(&s.sender, outcome)
        })
        .collect();

    tracing::debug!(
        user_id = %user.id,
        senders = senders.len(),
        resolved = results.iter().filter(|r| !r.needs_fallback()).count(),
        "batch classification complete"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::providers::ai::{LlmError, LlmResult};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct MockClassifier {
        answers: LlmResult<Vec<ClassificationResult>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl MockClassifier {
        fn answering(answers: Vec<ClassificationResult>) -> Self {
            Self {
                answers: Ok(answers),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answers: Err(LlmError::Unavailable("down".to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SenderClassifier for MockClassifier {
        async fn classify_batch(
            &self,
            _user: &User,
            senders: &[SenderEvidence],
            _categories: &[Category],
        ) -> LlmResult<Vec<ClassificationResult>> {
            self.calls
                .lock()
                .unwrap()
                .push(senders.iter().map(|s| s.sender.clone()).collect());
            match &self.answers {
                Ok(answers) => Ok(answers.clone()),
                Err(_) => Err(LlmError::Unavailable("down".to_string())),
            }
        }

        async fn classify_single(
            &self,
            _user: &User,
            _sender: &SenderEvidence,
            _categories: &[Category],
        ) -> LlmResult<Option<CategoryOutcome>> {
            unreachable!("batch stage never classifies single senders")
        }
    }

    fn user() -> User {
        User::new("user-1", "me@example.com")
    }

    fn categories() -> Vec<Category> {
        vec![Category::new(UserId::from("user-1"), "Personal", None)]
    }

    fn evidence(senders: &[&str]) -> Vec<SenderEvidence> {
        senders.iter().map(|s| SenderEvidence::bare(*s)).collect()
    }

    #[tokio::test]
    async fn empty_input_makes_no_call() {
        let classifier = MockClassifier::answering(Vec::new());
        let results = classify_batch(&classifier, &user(), &[], &categories()).await;
        assert!(results.is_empty());
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn one_call_for_whole_batch() {
        let classifier = MockClassifier::answering(vec![
            ClassificationResult::new("b@x.com", Some(CategoryOutcome::Deferred)),
            ClassificationResult::new("a@x.com", Some(CategoryOutcome::resolved("Personal"))),
        ]);
        let input = evidence(&["a@x.com", "b@x.com", "c@x.com"]);

        let results = classify_batch(&classifier, &user(), &input, &categories()).await;

        assert_eq!(classifier.call_count(), 1);
        assert_eq!(
            results,
            vec![
                ClassificationResult::new("a@x.com", Some(CategoryOutcome::resolved("Personal"))),
                ClassificationResult::new("b@x.com", Some(CategoryOutcome::Deferred)),
                ClassificationResult::unresolved("c@x.com"),
            ]
        );
    }

    #[tokio::test]
    async fn extra_and_duplicate_answers_ignored() {
        let classifier = MockClassifier::answering(vec![
            ClassificationResult::new("a@x.com", Some(CategoryOutcome::resolved("Personal"))),
            ClassificationResult::new("a@x.com", Some(CategoryOutcome::Deferred)),
            ClassificationResult::new("stranger@x.com", Some(CategoryOutcome::Deferred)),
        ]);
        let input = evidence(&["a@x.com"]);

        let results = classify_batch(&classifier, &user(), &input, &categories()).await;

        assert_eq!(
            results,
            vec![ClassificationResult::new(
                "a@x.com",
                Some(CategoryOutcome::resolved("Personal"))
            )]
        );
    }

    #[tokio::test]
    async fn empty_duplicate_does_not_shadow_later_answer() {
        let classifier = MockClassifier::answering(vec![
            ClassificationResult::unresolved("A@x.com"),
            ClassificationResult::new("a@x.com", Some(CategoryOutcome::resolved("Personal"))),
            ClassificationResult::new("a@x.com", Some(CategoryOutcome::Deferred)),
        ]);
        let input = evidence(&["a@x.com"]);

        let results = classify_batch(&classifier, &user(), &input, &categories()).await;

        assert_eq!(
            results,
            vec![ClassificationResult::new(
                "a@x.com",
                Some(CategoryOutcome::resolved("Personal"))
            )]
        );
    }

    #[tokio::test]
    async fn engine_error_leaves_batch_unresolved() {
        let classifier = MockClassifier::failing();
        let input = evidence(&["a@x.com", "b@x.com"]);

        let results = classify_batch(&classifier, &user(), &input, &categories()).await;

        assert_eq!(classifier.call_count(), 1);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome.is_none()));
    }
}
