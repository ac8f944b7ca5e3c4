use crate::errors::{AppError, AppResult};
use crate::models::{RequestRecord, ShortlistOutcome};
use crate::requests::{canonical_request_id, display_request_id, same_request_id};
use crate::store::Store;
use serde_json::Value;

pub use crate::store::LEGACY_SHORTLIST_ACTOR;

const LEGACY_FLAG_KEYS: &[&str] = &["shortlisted", "is_shortlisted", "favorite", "is_favorite"];
const LEGACY_LIST_KEYS: &[&str] = &["shortlisted_by", "favorites", "shortlist"];
const LEGACY_COUNT_KEYS: &[&str] = &["shortlistCount", "shortlist_count"];

/// Compatibility-only detection of records marked by the historical
/// shortlist writers, checked in priority order: boolean flags, a
/// `"shortlisted"` status, then any non-empty membership list or
/// comma-separated string. New code never produces these fields.
pub fn has_legacy_shortlist_signal(record: &RequestRecord) -> bool {
    for key in LEGACY_FLAG_KEYS {
        if matches!(record.legacy.get(*key), Some(Value::Bool(true))) {
            return true;
        }
    }
    if record.status.trim().eq_ignore_ascii_case("shortlisted") {
        return true;
    }
    for key in LEGACY_LIST_KEYS {
        match record.legacy.get(*key) {
            Some(Value::Array(items)) if !items.is_empty() => return true,
            Some(Value::String(raw)) if !raw.trim().is_empty() => return true,
            _ => {}
        }
    }
    false
}

/// Actors named by the legacy membership fields; first key with a non-empty
/// value wins, mirroring how the old readers chained them.
fn legacy_shortlist_actors(record: &RequestRecord) -> Vec<String> {
    for key in LEGACY_LIST_KEYS {
        match record.legacy.get(*key) {
            Some(Value::Array(items)) if !items.is_empty() => {
                return items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|actor| actor.trim().to_string())
                    .filter(|actor| !actor.is_empty())
                    .collect();
            }
            Some(Value::String(raw)) if !raw.trim().is_empty() => {
                return raw
                    .split(',')
                    .map(str::trim)
                    .filter(|actor| !actor.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

/// Idempotent save. The request must exist; saving an id the actor already
/// holds reports [`ShortlistOutcome::AlreadySaved`] and leaves the ledger
/// unchanged.
pub fn shortlist_save(store: &Store, actor: &str, id: &str) -> AppResult<ShortlistOutcome> {
    let actor = required_actor(actor)?;
    let id = required_id(id)?;

    let records = store.load_requests()?;
    if !records
        .iter()
        .any(|record| same_request_id(&record.id, id))
    {
        return Err(AppError::NotFound(format!(
            "Request with ID '{id}' not found."
        )));
    }

    let _guard = store.lock_shortlists()?;
    let mut ledger = store.load_shortlists()?;
    let entry = ledger.entry(actor.to_string()).or_default();
    if entry
        .iter()
        .any(|existing| same_request_id(existing, id))
    {
        return Ok(ShortlistOutcome::AlreadySaved);
    }
    entry.push(display_request_id(id));
    store.save_shortlists(&ledger)?;
    tracing::debug!(actor = %actor, request_id = %display_request_id(id), "request shortlisted");
    Ok(ShortlistOutcome::Saved)
}

/// Idempotent removal; an absent id is [`ShortlistOutcome::NotShortlisted`],
/// never an error.
pub fn shortlist_remove(store: &Store, actor: &str, id: &str) -> AppResult<ShortlistOutcome> {
    let actor = required_actor(actor)?;
    let id = required_id(id)?;

    let _guard = store.lock_shortlists()?;
    let mut ledger = store.load_shortlists()?;
    let Some(entry) = ledger.get_mut(actor) else {
        return Ok(ShortlistOutcome::NotShortlisted);
    };
    let before = entry.len();
    entry.retain(|existing| !same_request_id(existing, id));
    if entry.len() == before {
        return Ok(ShortlistOutcome::NotShortlisted);
    }
    store.save_shortlists(&ledger)?;
    Ok(ShortlistOutcome::Removed)
}

/// The actor's shortlist resolved to full records, in ledger order. Ids
/// whose request no longer exists are dropped silently.
pub fn shortlist_for(store: &Store, actor: &str) -> AppResult<Vec<RequestRecord>> {
    let ledger = store.load_shortlists()?;
    let Some(ids) = ledger.get(actor) else {
        return Ok(Vec::new());
    };
    let records = store.load_requests()?;
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        match records
            .iter()
            .find(|record| same_request_id(&record.id, id))
        {
            Some(record) => resolved.push(record.clone()),
            None => {
                tracing::debug!(request_id = %id, actor = %actor, "shortlisted id no longer resolves; dropped");
            }
        }
    }
    Ok(resolved)
}

/// Legacy display view: every record shortlisted by anyone, whether a ledger
/// actor, or a legacy signal on the record itself.
pub fn shortlisted_requests(store: &Store) -> AppResult<Vec<RequestRecord>> {
    let ledger = store.load_shortlists()?;
    let all_ids: std::collections::HashSet<String> = ledger
        .values()
        .flatten()
        .map(|id| canonical_request_id(id))
        .collect();
    let mut records = store.load_requests()?;
    records.retain(|record| {
        all_ids.contains(&canonical_request_id(&record.id)) || has_legacy_shortlist_signal(record)
    });
    Ok(records)
}

/// True when the actor holds the record: in the ledger, or named by a
/// legacy membership field.
pub fn is_shortlisted_by(store: &Store, actor: &str, record: &RequestRecord) -> AppResult<bool> {
    let ledger = store.load_shortlists()?;
    if ledger
        .get(actor)
        .is_some_and(|ids| ids.iter().any(|id| same_request_id(id, &record.id)))
    {
        return Ok(true);
    }
    Ok(legacy_shortlist_actors(record)
        .iter()
        .any(|named| named == actor))
}

/// How many actors hold the record. The ledger is authoritative; records
/// untouched by the per-actor writers fall back to the denormalized legacy
/// fields (explicit count first, then membership list length).
pub fn shortlist_count(store: &Store, id: &str) -> AppResult<u64> {
    let records = store.load_requests()?;
    let Some(record) = records
        .iter()
        .find(|record| same_request_id(&record.id, id))
    else {
        return Err(AppError::NotFound(format!(
            "Request with ID '{id}' not found."
        )));
    };

    let ledger = store.load_shortlists()?;
    let ledger_count = ledger
        .values()
        .filter(|ids| ids.iter().any(|held| same_request_id(held, id)))
        .count() as u64;
    if ledger_count > 0 {
        return Ok(ledger_count);
    }
    Ok(legacy_shortlist_count(record))
}

fn legacy_shortlist_count(record: &RequestRecord) -> u64 {
    for key in LEGACY_COUNT_KEYS {
        match record.legacy.get(*key) {
            Some(Value::Number(number)) => return number.as_u64().unwrap_or(0),
            Some(Value::String(raw)) => {
                if let Ok(count) = raw.trim().parse::<u64>() {
                    return count;
                }
            }
            _ => {}
        }
    }
    legacy_shortlist_actors(record).len() as u64
}

fn required_actor(actor: &str) -> AppResult<&str> {
    let trimmed = actor.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Actor identity is required.".to_string()));
    }
    Ok(trimmed)
}

fn required_id(id: &str) -> AppResult<&str> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Request ID is required.".to_string()));
    }
    Ok(trimmed)
}
