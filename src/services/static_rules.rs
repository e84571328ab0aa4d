//! Deterministic sender rules applied before any AI call.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. Large consumer mail providers are deferred. Anyone can have a Gmail
//!    address, so the domain alone says nothing about the sender.
//! 2. Newsletter signals in the address, platform domain or display name.
//! 3. Receipt and transactional signals in the address or display name.

use crate::domain::{CategoryOutcome, ClassificationResult, SenderEvidence};

/// Category assigned to newsletter-like senders.
pub const NEWSLETTER: &str = "Newsletter";

/// Category assigned to receipt-like senders.
pub const RECEIPT: &str = "Receipt";

const CONSUMER_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "proton.me",
    "protonmail.com",
    "zoho.com",
    "mail.com",
    "fastmail.com",
];

/// Providers with many country domains (`yahoo.co.uk`, `gmx.de`, ...).
const CONSUMER_DOMAIN_FAMILIES: &[&str] = &["yahoo", "hotmail", "gmx", "yandex"];

const NEWSLETTER_LOCAL_PARTS: &[&str] = &["newsletter", "digest", "bulletin", "weekly"];

const NEWSLETTER_PLATFORMS: &[&str] = &[
    "substack.com",
    "beehiiv.com",
    "ghost.io",
    "buttondown.email",
    "convertkit.com",
    "convertkit-mail.com",
    "list-manage.com",
    "mailchimpapp.com",
    "mcsv.net",
];

const NEWSLETTER_NAMES: &[&str] = &["newsletter", "digest"];

const RECEIPT_LOCAL_PARTS: &[&str] = &[
    "receipt",
    "invoice",
    "billing",
    "order",
    "payment",
    "statement",
    "purchase",
    "transaction",
];

const RECEIPT_NAMES: &[&str] = &["receipt", "invoice"];

/// Splits an address into lower-case local part and domain.
fn split_address(sender: &str) -> (String, String) {
    let sender = sender.trim().to_lowercase();
    match sender.rsplit_once('@') {
        Some((local, domain)) => (local.to_string(), domain.to_string()),
        None => (sender, String::new()),
    }
}

/// Whether `domain` is `base` or a subdomain of it.
fn domain_matches(domain: &str, base: &str) -> bool {
    domain == base
        || domain
            .strip_suffix(base)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn is_consumer_domain(domain: &str) -> bool {
    if CONSUMER_DOMAINS.contains(&domain) {
        return true;
    }
    CONSUMER_DOMAIN_FAMILIES.iter().any(|family| {
        domain
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with('.'))
    })
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn is_newsletter(local: &str, domain: &str, name: &str) -> bool {
    contains_any(local, NEWSLETTER_LOCAL_PARTS)
        || NEWSLETTER_PLATFORMS
            .iter()
            .any(|platform| domain_matches(domain, platform))
        || contains_any(name, NEWSLETTER_NAMES)
}

fn is_receipt(local: &str, name: &str) -> bool {
    contains_any(local, RECEIPT_LOCAL_PARTS) || contains_any(name, RECEIPT_NAMES)
}

/// Classifies a sender by address and display name alone.
///
/// Returns `None` when no rule applies.
pub fn classify(sender: &str, display_name: Option<&str>) -> Option<CategoryOutcome> {
    let (local, domain) = split_address(sender);
    let name = display_name.unwrap_or_default().to_lowercase();

    if is_consumer_domain(&domain) {
        return Some(CategoryOutcome::Deferred);
    }
    if is_newsletter(&local, &domain, &name) {
        return Some(CategoryOutcome::resolved(NEWSLETTER));
    }
    if is_receipt(&local, &name) {
        return Some(CategoryOutcome::resolved(RECEIPT));
    }
    None
}

/// Applies [`classify`] to each sender, preserving input order.
pub fn classify_all(evidence: &[SenderEvidence]) -> Vec<ClassificationResult> {
    evidence
        .iter()
        .map(|e| {
            let outcome = classify(&e.sender, e.display_name.as_deref());
            ClassificationResult::new(&e.sender, outcome)
        })
        .collect()
}
