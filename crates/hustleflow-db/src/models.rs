//! Database row types mapping directly to SQLite rows, kept distinct from
//! the domain models so the storage layout can evolve independently.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use hustleflow_types::models::{
    DurationDays, ExchangeRequest, MatchState, PartySnapshot, TransactionOffer,
};

pub struct RequestRow {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub kind: String,
    pub urgency: String,
    pub duration_days: i64,
    pub matched: bool,
    pub created_at: String,
    pub owner_token: String,
    pub owner_alias: String,
    pub owner_name: String,
    pub owner_room: String,
    pub owner_contact: Option<String>,
}

pub struct OfferRow {
    pub id: String,
    pub request_id: String,
    pub amount: i64,
    pub status: String,
    pub created_at: String,
    pub offerer_token: String,
    pub offerer_alias: String,
    pub offerer_name: String,
    pub offerer_room: String,
    pub offerer_contact: Option<String>,
}

impl RequestRow {
    pub fn into_request(self, offers: Vec<TransactionOffer>) -> Result<ExchangeRequest> {
        let duration = u8::try_from(self.duration_days)
            .map_err(|_| anyhow!("corrupt duration_days: {}", self.duration_days))
            .and_then(|d| DurationDays::try_from(d).map_err(|e| anyhow!(e)))?;

        Ok(ExchangeRequest {
            id: self.id.parse()?,
            amount: self.amount,
            currency: self.currency,
            kind: self.kind.parse().map_err(|e: String| anyhow!(e))?,
            urgency: self.urgency.parse().map_err(|e: String| anyhow!(e))?,
            duration_days: duration,
            match_state: if self.matched {
                MatchState::FullyMatched
            } else {
                MatchState::Open
            },
            created_at: parse_timestamp(&self.created_at)?,
            owner: PartySnapshot {
                token: self.owner_token,
                display_alias: self.owner_alias,
                real_name: self.owner_name,
                room: self.owner_room,
                contact: self.owner_contact,
            },
            offers,
        })
    }
}

impl OfferRow {
    pub fn into_offer(self) -> Result<TransactionOffer> {
        Ok(TransactionOffer {
            id: self.id.parse()?,
            offerer: PartySnapshot {
                token: self.offerer_token,
                display_alias: self.offerer_alias,
                real_name: self.offerer_name,
                room: self.offerer_room,
                contact: self.offerer_contact,
            },
            amount: self.amount,
            status: self.status.parse().map_err(|e: String| anyhow!(e))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| anyhow!("corrupt timestamp '{}': {}", raw, e))?
        .with_timezone(&Utc))
}
