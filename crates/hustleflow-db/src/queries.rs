use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use uuid::Uuid;

use hustleflow_types::models::{ExchangeRequest, RequestTerms, TransactionOffer};
use hustleflow_types::store::{
    AppendOutcome, RequestStore, TransitionOutcome, WriteOutcome,
};

use crate::models::{parse_timestamp, OfferRow, RequestRow};
use crate::Database;

const REQUEST_COLUMNS: &str = "id, amount, currency, kind, urgency, duration_days, matched, \
     created_at, owner_token, owner_alias, owner_name, owner_room, owner_contact";

const OFFER_COLUMNS: &str = "id, request_id, amount, status, created_at, offerer_token, \
     offerer_alias, offerer_name, offerer_room, offerer_contact";

impl RequestStore for Database {
    fn insert(&self, request: &ExchangeRequest) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO requests (id, amount, currency, kind, urgency, duration_days, \
                 matched, created_at, owner_token, owner_alias, owner_name, owner_room, owner_contact) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    request.id.to_string(),
                    request.amount,
                    request.currency,
                    request.kind.as_str(),
                    request.urgency.as_str(),
                    i64::from(u8::from(request.duration_days)),
                    request.match_state == hustleflow_types::models::MatchState::FullyMatched,
                    request.created_at.to_rfc3339(),
                    request.owner.token,
                    request.owner.display_alias,
                    request.owner.real_name,
                    request.owner.room,
                    request.owner.contact,
                ],
            )?;
            for offer in &request.offers {
                insert_offer(&tx, request.id, offer)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn get(&self, id: Uuid) -> Result<Option<ExchangeRequest>> {
        self.with_conn(|conn| {
            let Some(row) = query_request_row(conn, id)? else {
                return Ok(None);
            };
            let offers = query_offers(conn, id)?;
            Ok(Some(row.into_request(offers)?))
        })
    }

    fn list(&self) -> Result<Vec<ExchangeRequest>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {REQUEST_COLUMNS} FROM requests"))?;
            let rows = stmt
                .query_map([], request_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {OFFER_COLUMNS} FROM offers ORDER BY created_at, id"
            ))?;
            let offer_rows = stmt
                .query_map([], offer_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut grouped: HashMap<String, Vec<TransactionOffer>> = HashMap::new();
            for row in offer_rows {
                let request_id = row.request_id.clone();
                grouped.entry(request_id).or_default().push(row.into_offer()?);
            }

            rows.into_iter()
                .map(|row| {
                    let offers = grouped.remove(&row.id).unwrap_or_default();
                    row.into_request(offers)
                })
                .collect()
        })
    }

    fn update_terms(&self, id: Uuid, terms: &RequestTerms) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE requests SET amount = ?2, kind = ?3, urgency = ?4, duration_days = ?5 \
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    terms.amount,
                    terms.kind.as_str(),
                    terms.urgency.as_str(),
                    i64::from(u8::from(terms.duration_days)),
                ],
            )?;
            Ok(if changed == 0 {
                WriteOutcome::RequestMissing
            } else {
                WriteOutcome::Applied
            })
        })
    }

    fn remove(&self, id: Uuid) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            // offers go with the request (ON DELETE CASCADE)
            let removed = conn.execute(
                "DELETE FROM requests WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(if removed == 0 {
                WriteOutcome::RequestMissing
            } else {
                WriteOutcome::Applied
            })
        })
    }

    fn append_offer(&self, request_id: Uuid, offer: &TransactionOffer) -> Result<AppendOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let request_exists = tx
                .query_row(
                    "SELECT 1 FROM requests WHERE id = ?1",
                    [request_id.to_string()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !request_exists {
                return Ok(AppendOutcome::RequestMissing);
            }
            // UNIQUE(request_id, offerer_token) closes the duplicate race
            // inside the same transaction as the append.
            match insert_offer(&tx, request_id, offer) {
                Ok(()) => {
                    tx.commit()?;
                    Ok(AppendOutcome::Appended)
                }
                Err(e) if is_constraint_violation(&e) => Ok(AppendOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn accept_offer(&self, request_id: Uuid, offer_id: Uuid) -> Result<TransitionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let rid = request_id.to_string();
            let oid = offer_id.to_string();

            // The pending guard decides the race: of two concurrent accepts
            // only one UPDATE finds the offer still pending.
            let won = tx.execute(
                "UPDATE offers SET status = 'accepted' \
                 WHERE request_id = ?1 AND id = ?2 AND status = 'pending'",
                params![rid, oid],
            )?;
            if won == 0 {
                return probe_transition_failure(&tx, &rid, &oid);
            }

            tx.execute(
                "UPDATE offers SET status = 'rejected' \
                 WHERE request_id = ?1 AND id <> ?2 AND status = 'pending'",
                params![rid, oid],
            )?;
            tx.execute("UPDATE requests SET matched = 1 WHERE id = ?1", [&rid])?;
            tx.commit()?;
            Ok(TransitionOutcome::Applied)
        })
    }

    fn reject_offer(&self, request_id: Uuid, offer_id: Uuid) -> Result<TransitionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let rid = request_id.to_string();
            let oid = offer_id.to_string();

            let changed = tx.execute(
                "UPDATE offers SET status = 'rejected' \
                 WHERE request_id = ?1 AND id = ?2 AND status = 'pending'",
                params![rid, oid],
            )?;
            if changed == 0 {
                return probe_transition_failure(&tx, &rid, &oid);
            }
            tx.commit()?;
            Ok(TransitionOutcome::Applied)
        })
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        // RFC 3339 strings don't do date math in SQL; select candidates and
        // filter here, then delete one by one.
        let candidates: Vec<(String, String, i64)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, duration_days FROM requests WHERE matched = 0",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut pruned = 0;
        for (id, created_at, duration_days) in candidates {
            let created = parse_timestamp(&created_at)?;
            if now >= created + Duration::days(duration_days) {
                pruned += self.with_conn_mut(|conn| {
                    Ok(conn.execute(
                        "DELETE FROM requests WHERE id = ?1 AND matched = 0",
                        [&id],
                    )?)
                })?;
            }
        }
        Ok(pruned)
    }
}

fn insert_offer(
    tx: &Transaction<'_>,
    request_id: Uuid,
    offer: &TransactionOffer,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO offers (id, request_id, amount, status, created_at, offerer_token, \
         offerer_alias, offerer_name, offerer_room, offerer_contact) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            offer.id.to_string(),
            request_id.to_string(),
            offer.amount,
            offer.status.as_str(),
            offer.created_at.to_rfc3339(),
            offer.offerer.token,
            offer.offerer.display_alias,
            offer.offerer.real_name,
            offer.offerer.room,
            offer.offerer.contact,
        ],
    )?;
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// A status UPDATE found no pending row; work out which failure that was.
fn probe_transition_failure(
    tx: &Transaction<'_>,
    request_id: &str,
    offer_id: &str,
) -> Result<TransitionOutcome> {
    let status: Option<String> = tx
        .query_row(
            "SELECT status FROM offers WHERE request_id = ?1 AND id = ?2",
            params![request_id, offer_id],
            |row| row.get(0),
        )
        .optional()?;
    if status.is_some() {
        return Ok(TransitionOutcome::NotPending);
    }
    let request_exists = tx
        .query_row("SELECT 1 FROM requests WHERE id = ?1", [request_id], |_| {
            Ok(())
        })
        .optional()?
        .is_some();
    Ok(if request_exists {
        TransitionOutcome::OfferMissing
    } else {
        TransitionOutcome::RequestMissing
    })
}

fn query_request_row(conn: &Connection, id: Uuid) -> Result<Option<RequestRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"
    ))?;
    let row = stmt
        .query_row([id.to_string()], request_from_row)
        .optional()?;
    Ok(row)
}

fn query_offers(conn: &Connection, request_id: Uuid) -> Result<Vec<TransactionOffer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE request_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt
        .query_map([request_id.to_string()], offer_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(OfferRow::into_offer).collect()
}

fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        amount: row.get(1)?,
        currency: row.get(2)?,
        kind: row.get(3)?,
        urgency: row.get(4)?,
        duration_days: row.get(5)?,
        matched: row.get(6)?,
        created_at: row.get(7)?,
        owner_token: row.get(8)?,
        owner_alias: row.get(9)?,
        owner_name: row.get(10)?,
        owner_room: row.get(11)?,
        owner_contact: row.get(12)?,
    })
}

fn offer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OfferRow> {
    Ok(OfferRow {
        id: row.get(0)?,
        request_id: row.get(1)?,
        amount: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        offerer_token: row.get(5)?,
        offerer_alias: row.get(6)?,
        offerer_name: row.get(7)?,
        offerer_room: row.get(8)?,
        offerer_contact: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hustleflow_types::models::{
        DurationDays, ExchangeKind, MatchState, OfferStatus, PartySnapshot, Urgency,
    };

    fn party(token: &str) -> PartySnapshot {
        PartySnapshot {
            token: token.to_string(),
            display_alias: "Meerkat".to_string(),
            real_name: "Name".to_string(),
            room: "R-1".to_string(),
            contact: Some("c".to_string()),
        }
    }

    fn request(created_at: DateTime<Utc>) -> ExchangeRequest {
        ExchangeRequest {
            id: Uuid::new_v4(),
            amount: 1200,
            currency: "INR".to_string(),
            kind: ExchangeKind::Digital,
            urgency: Urgency::Flexible,
            duration_days: DurationDays::One,
            match_state: MatchState::Open,
            created_at,
            owner: party("tok-owner"),
            offers: vec![],
        }
    }

    fn offer(token: &str, at: DateTime<Utc>) -> TransactionOffer {
        TransactionOffer {
            id: Uuid::new_v4(),
            offerer: party(token),
            amount: 1100,
            status: OfferStatus::Pending,
            created_at: at,
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let mut r = request(now);
        r.offers.push(offer("tok-a", now));

        db.insert(&r).unwrap();
        let loaded = db.get(r.id).unwrap().unwrap();
        assert_eq!(loaded.amount, r.amount);
        assert_eq!(loaded.owner, r.owner);
        assert_eq!(loaded.offers.len(), 1);
        assert_eq!(loaded.offers[0].offerer.token, "tok-a");
        assert_eq!(loaded.match_state, MatchState::Open);
    }

    #[test]
    fn duplicate_offer_is_refused_by_the_unique_guard() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let r = request(now);
        db.insert(&r).unwrap();

        assert_eq!(
            db.append_offer(r.id, &offer("tok-a", now)).unwrap(),
            AppendOutcome::Appended
        );
        assert_eq!(
            db.append_offer(r.id, &offer("tok-a", now)).unwrap(),
            AppendOutcome::Duplicate
        );
        assert_eq!(
            db.append_offer(Uuid::new_v4(), &offer("tok-b", now)).unwrap(),
            AppendOutcome::RequestMissing
        );
    }

    #[test]
    fn accept_is_one_transaction_over_the_whole_offer_set() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let r = request(now);
        db.insert(&r).unwrap();
        let o1 = offer("tok-a", now);
        let o2 = offer("tok-b", now);
        db.append_offer(r.id, &o1).unwrap();
        db.append_offer(r.id, &o2).unwrap();

        assert_eq!(
            db.accept_offer(r.id, o1.id).unwrap(),
            TransitionOutcome::Applied
        );

        let loaded = db.get(r.id).unwrap().unwrap();
        assert_eq!(loaded.match_state, MatchState::FullyMatched);
        assert_eq!(loaded.offer(o1.id).unwrap().status, OfferStatus::Accepted);
        assert_eq!(loaded.offer(o2.id).unwrap().status, OfferStatus::Rejected);

        // The losing accept finds the pending guard already spent.
        assert_eq!(
            db.accept_offer(r.id, o2.id).unwrap(),
            TransitionOutcome::NotPending
        );
        assert_eq!(
            db.accept_offer(r.id, Uuid::new_v4()).unwrap(),
            TransitionOutcome::OfferMissing
        );
        assert_eq!(
            db.accept_offer(Uuid::new_v4(), o1.id).unwrap(),
            TransitionOutcome::RequestMissing
        );
    }

    #[test]
    fn reject_settles_only_the_target_offer() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let r = request(now);
        db.insert(&r).unwrap();
        let o1 = offer("tok-a", now);
        let o2 = offer("tok-b", now);
        db.append_offer(r.id, &o1).unwrap();
        db.append_offer(r.id, &o2).unwrap();

        assert_eq!(
            db.reject_offer(r.id, o1.id).unwrap(),
            TransitionOutcome::Applied
        );
        let loaded = db.get(r.id).unwrap().unwrap();
        assert_eq!(loaded.match_state, MatchState::Open);
        assert_eq!(loaded.offer(o1.id).unwrap().status, OfferStatus::Rejected);
        assert_eq!(loaded.offer(o2.id).unwrap().status, OfferStatus::Pending);

        assert_eq!(
            db.reject_offer(r.id, o1.id).unwrap(),
            TransitionOutcome::NotPending
        );
    }

    #[test]
    fn remove_cascades_to_offers() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let r = request(now);
        db.insert(&r).unwrap();
        let o = offer("tok-a", now);
        db.append_offer(r.id, &o).unwrap();

        assert_eq!(db.remove(r.id).unwrap(), WriteOutcome::Applied);
        assert!(db.get(r.id).unwrap().is_none());

        // A fresh request with the same offerer must not trip the old
        // unique row.
        let r2 = request(now);
        db.insert(&r2).unwrap();
        assert_eq!(
            db.append_offer(r2.id, &offer("tok-a", now)).unwrap(),
            AppendOutcome::Appended
        );
    }

    #[test]
    fn update_terms_leaves_the_rest_alone() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let r = request(now);
        db.insert(&r).unwrap();

        let terms = RequestTerms {
            amount: 9999,
            kind: ExchangeKind::Cash,
            urgency: Urgency::Urgent,
            duration_days: DurationDays::Seven,
        };
        assert_eq!(db.update_terms(r.id, &terms).unwrap(), WriteOutcome::Applied);

        let loaded = db.get(r.id).unwrap().unwrap();
        assert_eq!(loaded.amount, 9999);
        assert_eq!(loaded.urgency, Urgency::Urgent);
        assert_eq!(loaded.created_at, r.created_at);
        assert_eq!(loaded.owner, r.owner);
    }

    #[test]
    fn prune_removes_expired_unmatched_rows_only() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let stale = request(now - Duration::days(3));
        let mut stale_matched = request(now - Duration::days(3));
        stale_matched.match_state = MatchState::FullyMatched;
        let fresh = request(now);
        db.insert(&stale).unwrap();
        db.insert(&stale_matched).unwrap();
        db.insert(&fresh).unwrap();

        assert_eq!(db.prune_expired(now).unwrap(), 1);
        assert!(db.get(stale.id).unwrap().is_none());
        assert!(db.get(stale_matched.id).unwrap().is_some());
        assert!(db.get(fresh.id).unwrap().is_some());
    }
}
