//! sortbox - Command-line entry point for sender categorization

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use sortbox::config::Settings;
use sortbox::domain::{DiscoveryWindow, PageToken, ScanDirection, User, UserId};
use sortbox::providers::ai::OpenAiCompatibleProvider;
use sortbox::providers::email::GmailSenderReader;
use sortbox::services::{
    AssignmentService, CategorizeRequest, CategorizeService, ClassifierOptions,
    LlmSenderClassifier,
};
use sortbox::storage::{KeychainAccess, StorageLayer};

const USAGE: &str = "usage:
  sortbox categorize <user-id> [--newer]
  sortbox categorize <user-id> --page-token <token> [--after <rfc3339>] [--before <rfc3339>]
  sortbox add-user <user-id> <email> [about]
  sortbox set-token <user-id> <access-token>
  sortbox clear-token <user-id>
  sortbox set-api-key <keychain-id> <api-key>";

/// Parsed arguments for `categorize`.
#[derive(Debug, Default, PartialEq)]
struct CategorizeArgs {
    user_id: String,
    direction: ScanDirection,
    page_token: Option<PageToken>,
    window: DiscoveryWindow,
}

impl CategorizeArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut iter = args.iter();
        let Some(user_id) = iter.next() else {
            bail!(USAGE);
        };
        let mut parsed = Self {
            user_id: user_id.clone(),
            ..Self::default()
        };

        while let Some(flag) = iter.next() {
            match flag.as_str() {
                "--newer" => parsed.direction = ScanDirection::Newer,
                "--page-token" => {
                    parsed.page_token = Some(PageToken::new(value_for(flag, iter.next())?));
                }
                "--after" => {
                    parsed.window.after = Some(parse_time(value_for(flag, iter.next())?)?);
                }
                "--before" => {
                    parsed.window.before = Some(parse_time(value_for(flag, iter.next())?)?);
                }
                other => bail!("unknown argument {}\n{}", other, USAGE),
            }
        }

        if parsed.page_token.is_none() && parsed.window != DiscoveryWindow::default() {
            bail!("--after/--before only apply when continuing with --page-token");
        }
        Ok(parsed)
    }
}

fn value_for<'a>(flag: &str, value: Option<&'a String>) -> Result<&'a str> {
    value
        .map(String::as_str)
        .with_context(|| format!("{} needs a value", flag))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid timestamp {}", value))?
        .with_timezone(&Utc))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("sortbox failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let settings_path = Settings::default_path()?;
    let settings = Settings::load_or_default(&settings_path)
        .with_context(|| format!("loading {}", settings_path.display()))?;

    let db_path = settings.database_path()?;
    let storage = StorageLayer::new(&db_path, settings.storage.keychain_service.as_deref())
        .await
        .with_context(|| format!("opening database at {}", db_path.display()))?;

    match args.first().map(String::as_str) {
        Some("categorize") => {
            let parsed = CategorizeArgs::parse(&args[1..])?;
            categorize(&settings, &storage, parsed).await
        }
        Some("add-user") => {
            let (Some(user_id), Some(email)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            let mut user = User::new(user_id.as_str(), email.as_str());
            if let Some(about) = args.get(3) {
                user = user.with_about(about.as_str());
            }
            add_user(&storage, user).await
        }
        Some("set-token") => {
            let (Some(user_id), Some(token)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            let key = KeychainAccess::oauth_access_token_key(user_id);
            storage.keychain().store(&key, token).await?;
            tracing::info!(user_id = %user_id, "mailbox token stored");
            Ok(())
        }
        Some("clear-token") => {
            let Some(user_id) = args.get(1) else {
                bail!(USAGE);
            };
            let key = KeychainAccess::oauth_access_token_key(user_id);
            storage.keychain().delete(&key).await?;
            tracing::info!(user_id = %user_id, "mailbox token removed");
            Ok(())
        }
        Some("set-api-key") => {
            let (Some(id), Some(api_key)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            storage
                .keychain()
                .store(&KeychainAccess::ai_api_key(id), api_key)
                .await?;
            tracing::info!(keychain_id = %id, "API key stored");
            Ok(())
        }
        _ => bail!(USAGE),
    }
}

async fn add_user(storage: &StorageLayer, user: User) -> Result<()> {
    let store = Arc::new(storage.category_store());
    store.create_user(&user).await?;

    let seeded = AssignmentService::new(store)
        .seed_default_categories(&user.id)
        .await?;
    tracing::info!(user_id = %user.id, categories = ?seeded, "user created");
    Ok(())
}

async fn categorize(
    settings: &Settings,
    storage: &StorageLayer,
    args: CategorizeArgs,
) -> Result<()> {
    let ai = &settings.ai;
    let api_key = match &ai.api_key_keychain_id {
        Some(id) => Some(
            storage
                .keychain()
                .retrieve(&KeychainAccess::ai_api_key(id))
                .await?
                .with_context(|| format!("no API key stored for {}", id))?,
        ),
        None => None,
    };

    let mut provider =
        OpenAiCompatibleProvider::new(ai.base_url.clone(), api_key, ai.model.clone());
    if let Some(length) = ai.context_length {
        provider = provider.with_context_length(length);
    }
    let classifier = LlmSenderClassifier::new(provider).with_options(ClassifierOptions {
        temperature: ai.temperature,
        max_tokens: ai.max_tokens,
    });

    let service = CategorizeService::new(
        Arc::new(storage.category_store()),
        GmailSenderReader::new(),
        classifier,
        storage.keychain().clone(),
        settings.pipeline.clone(),
    );

    // A continuation reuses the window of the run that issued the token;
    // a fresh run starts past the range already categorized.
    let request = match args.page_token {
        Some(token) => CategorizeRequest::new(UserId::from(args.user_id))
            .page_token(Some(token))
            .window(args.window),
        None => service.fresh_request(args.user_id, args.direction).await?,
    };
    let outcome = service.categorize_senders(request).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
