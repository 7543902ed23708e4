use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

/// Hint attached to every exhausted-candidates error.
pub const REAUTH_HINT: &str =
    "Reconnect the account to re-authorize the integration and grant the required scopes";

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every candidate failed and at least one failure was an authorization rejection.
    #[error(
        "{resource}: all {attempts} endpoint variants failed, likely missing OAuth scope (last: {last}). {hint}"
    )]
    MissingScope {
        resource: String,
        attempts: usize,
        last: String,
        hint: String,
    },

    #[error("{resource}: all {attempts} endpoint variants failed (last: {last}). {hint}")]
    EndpointsExhausted {
        resource: String,
        attempts: usize,
        last: String,
        hint: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    pub fn is_missing_scope(&self) -> bool {
        matches!(self, CampaignError::MissingScope { .. })
    }

    /// True for the errors produced when a fallback cascade ran dry.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            CampaignError::MissingScope { .. } | CampaignError::EndpointsExhausted { .. }
        )
    }
}
