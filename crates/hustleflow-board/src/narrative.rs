use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hustleflow_types::models::{DurationDays, ExchangeKind, ExchangeRequest, Urgency};

/// Public fields of a freshly created request, as handed to the narrator
/// service. Only the owner's token crosses the boundary, never the
/// private profile fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub request_id: Uuid,
    pub amount: i64,
    pub currency: String,
    #[serde(rename = "cashOrDigital")]
    pub kind: ExchangeKind,
    pub urgency: Urgency,
    pub duration: DurationDays,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_preferences: Option<String>,
    pub user: SummaryUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryUser {
    pub token: String,
}

impl RequestSummary {
    pub fn from_request(request: &ExchangeRequest, preferences: Option<String>) -> Self {
        Self {
            request_id: request.id,
            amount: request.amount,
            currency: request.currency.clone(),
            kind: request.kind,
            urgency: request.urgency,
            duration: request.duration_days,
            user_preferences: preferences,
            user: SummaryUser {
                token: request.owner.token.clone(),
            },
        }
    }
}

/// What the narrator returns: free-text reasoning plus an advisory list of
/// candidate counterparty tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchNarrative {
    pub reasoning: String,
    #[serde(default, rename = "matchedUserIds")]
    pub candidate_tokens: Vec<String>,
}

/// External match-suggestion capability. Advisory only: its output is
/// surfaced to the creator as text and never gates or mutates request or
/// offer state; callers treat failures and timeouts as non-fatal.
#[async_trait]
pub trait MatchNarrator: Send + Sync {
    async fn narrate(&self, summary: &RequestSummary) -> Result<MatchNarrative>;
}

/// Stand-in narrator for deployments without a narrative service.
pub struct NoopNarrator;

#[async_trait]
impl MatchNarrator for NoopNarrator {
    async fn narrate(&self, _summary: &RequestSummary) -> Result<MatchNarrative> {
        Ok(MatchNarrative {
            reasoning: "Your request has been successfully created and is now visible to others."
                .to_string(),
            candidate_tokens: Vec::new(),
        })
    }
}

/// Narrator backed by an HTTP text-generation service: POSTs the summary
/// as JSON and expects a `{reasoning, matchedUserIds}` reply.
pub struct HttpNarrator {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpNarrator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MatchNarrator for HttpNarrator {
    async fn narrate(&self, summary: &RequestSummary) -> Result<MatchNarrative> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(summary)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<MatchNarrative>().await?)
    }
}
