//! AI classification engine seam.
//!
//! The pipeline only talks to the engine through [`SenderClassifier`]. The
//! bundled [`LlmSenderClassifier`] renders prompts for any [`LlmProvider`]
//! and maps the model's JSON answer back onto the user's category catalog.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{Category, CategoryOutcome, ClassificationResult, SenderEvidence, User};
use crate::providers::ai::{CompletionRequest, LlmError, LlmProvider, LlmResult, Message};

/// Answer the model gives when the sender could be anyone.
pub const UNKNOWN_SENDER: &str = "UNKNOWN_SENDER";

/// Answer the model gives when it wants more message history.
pub const REQUEST_MORE_INFORMATION: &str = "REQUEST_MORE_INFORMATION";

/// AI classification engine.
#[async_trait]
pub trait SenderClassifier: Send + Sync {
    /// Classifies many senders in one round-trip.
    ///
    /// The response may omit senders or name unknown ones; callers align it
    /// with their input.
    async fn classify_batch(
        &self,
        user: &User,
        senders: &[SenderEvidence],
        categories: &[Category],
    ) -> LlmResult<Vec<ClassificationResult>>;

    /// Classifies one sender from its message history.
    async fn classify_single(
        &self,
        user: &User,
        sender: &SenderEvidence,
        categories: &[Category],
    ) -> LlmResult<Option<CategoryOutcome>>;
}

#[derive(Debug, Deserialize)]
struct BatchAnswer {
    #[serde(default)]
    senders: Vec<SenderAnswer>,
}

#[derive(Debug, Deserialize)]
struct SenderAnswer {
    sender: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SingleAnswer {
    #[serde(default)]
    category: Option<String>,
}

/// Settings for LLM requests made by the classifier.
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: Option<usize>,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(2048),
        }
    }
}

/// [`SenderClassifier`] backed by a chat completion model.
pub struct LlmSenderClassifier<P: LlmProvider> {
    provider: P,
    options: ClassifierOptions,
}

impl<P: LlmProvider> LlmSenderClassifier<P> {
    /// Creates a classifier with default options.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            options: ClassifierOptions::default(),
        }
    }

    /// Overrides request options.
    pub fn with_options(mut self, options: ClassifierOptions) -> Self {
        self.options = options;
        self
    }

    fn request(&self, system: String, user: String) -> CompletionRequest {
        let mut request = CompletionRequest::new(vec![Message::user(user)])
            .with_system_prompt(system)
            .with_temperature(self.options.temperature)
            .with_json_output();
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

fn system_prompt(user: &User, categories: &[Category], shape: &str) -> String {
    let mut prompt = String::from(
        "You sort email senders into the user's categories.\n\
         Use only the category names listed below, spelled exactly as given.\n",
    );
    prompt.push_str(&format!(
        "Answer {UNKNOWN_SENDER} when the sender could be anyone, or \
         {REQUEST_MORE_INFORMATION} when the snippets are not enough to decide.\n\n"
    ));

    prompt.push_str(&format!("The user's address is {}.\n", user.email));
    if let Some(about) = user.about.as_deref().filter(|a| !a.trim().is_empty()) {
        prompt.push_str(&format!("About the user: {}\n", about.trim()));
    }

    prompt.push_str("\nCategories:\n");
    for category in categories {
        match category.description.as_deref() {
            Some(description) => {
                prompt.push_str(&format!("- {}: {}\n", category.name, description))
            }
            None => prompt.push_str(&format!("- {}\n", category.name)),
        }
    }

    prompt.push_str("\nRespond with JSON only, shaped like ");
    prompt.push_str(shape);
    prompt.push('\n');
    prompt
}

fn describe_sender(evidence: &SenderEvidence) -> String {
    let mut text = format!("Sender: {}\n", evidence.sender);
    if let Some(name) = &evidence.display_name {
        text.push_str(&format!("Name: {}\n", name));
    }
    if evidence.snippets.is_empty() {
        text.push_str("(no messages available)\n");
    }
    for snippet in &evidence.snippets {
        text.push_str(&format!("> {}\n", snippet));
    }
    text
}

/// Extracts the outermost JSON object from model output.
///
/// Tolerates markdown fences and prose around the object.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_answer<T: for<'de> Deserialize<'de>>(text: &str) -> LlmResult<T> {
    let json = extract_json(text)
        .ok_or_else(|| LlmError::InvalidResponse("no JSON object in answer".to_string()))?;
    serde_json::from_str(json)
        .map_err(|e| LlmError::InvalidResponse(format!("malformed answer: {}", e)))
}

/// Maps a model answer onto the catalog.
///
/// Catalog names win over reserved answers so a user category spelled like
/// a reserved token is still reachable. Anything else is unresolved.
pub fn resolve_answer(answer: &str, categories: &[Category]) -> Option<CategoryOutcome> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }

    if let Some(category) = categories.iter().find(|c| c.name == answer) {
        return Some(CategoryOutcome::resolved(&category.name));
    }

    match answer {
        UNKNOWN_SENDER => return Some(CategoryOutcome::Deferred),
        REQUEST_MORE_INFORMATION => return Some(CategoryOutcome::InsufficientEvidence),
        _ => {}
    }

    categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(answer))
        .map(|c| CategoryOutcome::resolved(&c.name))
}

#[async_trait]
impl<P: LlmProvider> SenderClassifier for LlmSenderClassifier<P> {
    async fn classify_batch(
        &self,
        user: &User,
        senders: &[SenderEvidence],
        categories: &[Category],
    ) -> LlmResult<Vec<ClassificationResult>> {
        let system = system_prompt(
            user,
            categories,
            r#"{"senders":[{"sender":"<address>","category":"<name>"}]}"#,
        );
        let body = senders
            .iter()
            .map(describe_sender)
            .collect::<Vec<_>>()
            .join("\n");

        let response = self.provider.complete(&self.request(system, body)).await?;
        tracing::debug!(
            provider = self.provider.name(),
            model = self.provider.model(),
            senders = senders.len(),
            finish_reason = ?response.finish_reason,
            "batch answer received"
        );
        let answer: BatchAnswer = parse_answer(&response.text)?;

        Ok(answer
            .senders
            .into_iter()
            .map(|a| {
                let outcome = a
                    .category
                    .as_deref()
                    .and_then(|c| resolve_answer(c, categories));
                ClassificationResult::new(a.sender.trim().to_lowercase(), outcome)
            })
            .collect())
    }

    async fn classify_single(
        &self,
        user: &User,
        sender: &SenderEvidence,
        categories: &[Category],
    ) -> LlmResult<Option<CategoryOutcome>> {
        let system = system_prompt(user, categories, r#"{"category":"<name>"}"#);
        let response = self
            .provider
            .complete(&self.request(system, describe_sender(sender)))
            .await?;

        let answer: SingleAnswer = parse_answer(&response.text)?;
        Ok(answer
            .category
            .as_deref()
            .and_then(|c| resolve_answer(c, categories)))
    }
}
