//! Maps a foundation (local deployment identifier) to the context the remote
//! org metadata service partitions its data by.
//!
//! Foundations look like `pcf-npe01-east`: the first three characters of the
//! second segment select the tier.
use std::fmt;

const CONTEXT_MAP: &[(&str, &str)] = &[("npe", "PCF_NPE"), ("prd", "PCF_PRD"), ("cde", "PCF_CDE")];

// Tiers that exist locally but have no counterpart in the remote service.
const UNMAPPED_TIERS: &[&str] = &["stg"];

const TIER_CODE_LEN: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchContext {
    Remote(String),
    /// The deployment has no remote context. The cache stays empty.
    Disabled,
}

impl FetchContext {
    pub fn name(&self) -> Option<&str> {
        match self {
            FetchContext::Remote(name) => Some(name),
            FetchContext::Disabled => None,
        }
    }
}

impl fmt::Display for FetchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchContext::Remote(name) => write!(f, "{name}"),
            FetchContext::Disabled => write!(f, "none"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ContextError {
    #[error("can't map foundation {foundation} (tier code {tier:?}) to a context")]
    InvalidFoundation { foundation: String, tier: String },
}

/// Resolves the fetch context. An explicit context wins over the foundation.
pub fn resolve_context(
    foundation: &str,
    explicit: Option<&str>,
) -> Result<FetchContext, ContextError> {
    if let Some(context) = explicit.filter(|c| !c.is_empty()) {
        return Ok(FetchContext::Remote(context.to_string()));
    }

    let tier: String = foundation
        .split('-')
        .nth(1)
        .map(|segment| segment.chars().take(TIER_CODE_LEN).collect())
        .unwrap_or_default();

    if let Some((_, context)) = CONTEXT_MAP.iter().find(|(code, _)| *code == tier) {
        return Ok(FetchContext::Remote((*context).to_string()));
    }

    if UNMAPPED_TIERS.contains(&tier.as_str()) {
        tracing::info!(%foundation, %tier, "Foundation has no org metadata context");
        return Ok(FetchContext::Disabled);
    }

    tracing::error!(%foundation, %tier, "Can't map foundation to an org metadata context");
    Err(ContextError::InvalidFoundation {
        foundation: foundation.to_string(),
        tier,
    })
}
