//! Company and region canonicalization
//!
//! Fixed synonym tables mapping the naming variants vendors actually
//! submit ("aws", "Amazon Web Services", "amzn") onto one canonical key.
//! Unrecognized strings pass through verbatim (regions uppercased) with a
//! low-confidence tag rather than being dropped — the pipeline never
//! discards a vendor because of a spelling it has not seen.
//!
//! The tables are process-wide immutable data, consulted by the Executor.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static COMPANY_SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    // Amazon
    m.insert("aws", "Amazon Web Services");
    m.insert("amazon", "Amazon Web Services");
    m.insert("amzn", "Amazon Web Services");
    m.insert("amazon web services", "Amazon Web Services");
    // Google
    m.insert("google", "Google");
    m.insert("gcp", "Google");
    m.insert("google cloud", "Google");
    m.insert("google cloud platform", "Google");
    m.insert("alphabet", "Google");
    // Microsoft
    m.insert("microsoft", "Microsoft");
    m.insert("azure", "Microsoft");
    m.insert("msft", "Microsoft");
    m.insert("microsoft azure", "Microsoft");
    // Others seen in vendor feeds
    m.insert("openai", "OpenAI");
    m.insert("anthropic", "Anthropic");
    m.insert("meta", "Meta");
    m.insert("facebook", "Meta");
    m
});

static REGION_SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("us-east", "US-EAST");
    m.insert("us-east-1", "US-EAST");
    m.insert("useast", "US-EAST");
    m.insert("virginia", "US-EAST");
    m.insert("us-west", "US-WEST");
    m.insert("us-west-2", "US-WEST");
    m.insert("uswest", "US-WEST");
    m.insert("oregon", "US-WEST");
    m.insert("ca-qc", "CA-QC");
    m.insert("quebec", "CA-QC");
    m.insert("eu-nl", "EU-NL");
    m.insert("netherlands", "EU-NL");
    m.insert("amsterdam", "EU-NL");
    m.insert("eu-no", "EU-NO");
    m.insert("norway", "EU-NO");
    m.insert("ap-sg", "AP-SG");
    m.insert("singapore", "AP-SG");
    m.insert("ap-au", "AP-AU");
    m.insert("australia", "AP-AU");
    m.insert("sydney", "AP-AU");
    m.insert("unknown", "UNKNOWN");
    m.insert("n/a", "UNKNOWN");
    m
});

/// Canonical company key for a raw vendor name.
///
/// Returns the canonical key and whether the name was recognized; an
/// unrecognized name passes through trimmed verbatim.
pub fn canonical_company(raw: &str) -> (String, bool) {
    let trimmed = raw.trim();
    match COMPANY_SYNONYMS.get(trimmed.to_lowercase().as_str()) {
        Some(canonical) => ((*canonical).to_string(), true),
        None => (trimmed.to_string(), false),
    }
}

/// Canonical uppercase region code for a raw region string.
///
/// Spaces and underscores are treated as dashes before lookup; an
/// unrecognized region passes through uppercased.
pub fn canonical_region(raw: &str) -> (String, bool) {
    let key = raw.trim().to_lowercase().replace([' ', '_'], "-");
    match REGION_SYNONYMS.get(key.as_str()) {
        Some(canonical) => ((*canonical).to_string(), true),
        None => (raw.trim().to_uppercase(), false),
    }
}
