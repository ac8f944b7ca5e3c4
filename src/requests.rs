use crate::errors::{AppError, AppResult};
use crate::models::{CreateRequestPayload, RequestRecord, RequestStatus, UpdateRequestPatch};
use crate::store::{now_iso, Store};
use chrono::{NaiveDate, NaiveTime};
use serde_json::Map;

/// Ids compare prefix-insensitively: `"REQ-123"` and `"123"` name the same
/// record. This is the one canonicalization point; nothing else compares
/// raw id strings.
pub fn canonical_request_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(prefix) = trimmed.get(..4) {
        if prefix.eq_ignore_ascii_case("req-") {
            return trimmed[4..].to_string();
        }
    }
    trimmed.to_string()
}

pub fn display_request_id(raw: &str) -> String {
    format!("REQ-{}", canonical_request_id(raw))
}

pub fn same_request_id(stored: &str, query: &str) -> bool {
    canonical_request_id(stored) == canonical_request_id(query)
}

fn validate_date(raw: &str) -> AppResult<()> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| AppError::Validation("Invalid date format. Please use YYYY-MM-DD.".to_string()))
}

fn validate_time(raw: &str) -> AppResult<()> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|_| ())
        .map_err(|_| AppError::Validation("Invalid time format. Please use HH:MM.".to_string()))
}

fn parse_status(raw: &str) -> AppResult<RequestStatus> {
    RequestStatus::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown request status '{}'.", raw.trim())))
}

fn required<'a>(value: &'a str, label: &str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("Request {label} is required.")));
    }
    Ok(trimmed)
}

pub fn request_create(store: &Store, payload: CreateRequestPayload) -> AppResult<RequestRecord> {
    let title = required(&payload.title, "title")?.to_string();
    let description = required(&payload.description, "description")?.to_string();
    let category = required(&payload.category, "category")?.to_string();
    let date = required(&payload.date, "date")?.to_string();
    let location = required(&payload.location, "location")?.to_string();

    let _guard = store.lock_requests()?;
    let mut records = store.load_requests()?;

    // Caller-supplied ids are kept verbatim; generated ones continue the
    // simple non-reclaimed counter the data files already use.
    let id = match payload.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("REQ-{}", records.len() + 100),
    };

    let record = RequestRecord {
        id,
        title,
        category,
        description,
        location,
        date,
        time: payload.time.unwrap_or_default(),
        status: RequestStatus::Pending.as_str().to_string(),
        owner: payload.owner.unwrap_or_default(),
        assigned_to: None,
        assigned_at: None,
        created: Some(now_iso()),
        last_updated: None,
        completed_at: None,
        view_count: None,
        last_viewed_at: None,
        legacy: Map::new(),
    };

    records.push(record.clone());
    store.save_requests(&records)?;
    tracing::debug!(request_id = %record.id, owner = %record.owner, "request created");
    Ok(record)
}

pub fn requests_list(store: &Store) -> AppResult<Vec<RequestRecord>> {
    store.load_requests()
}

pub fn requests_owned_by(store: &Store, owner: &str) -> AppResult<Vec<RequestRecord>> {
    let mut records = store.load_requests()?;
    records.retain(|record| record.owner.trim().eq_ignore_ascii_case(owner.trim()));
    Ok(records)
}

pub fn request_get(store: &Store, id: &str) -> AppResult<Option<RequestRecord>> {
    let records = store.load_requests()?;
    Ok(records
        .into_iter()
        .find(|record| same_request_id(&record.id, id)))
}

/// Partial update. All supplied values are validated before anything is
/// applied, so a malformed date or time leaves the stored record untouched.
pub fn request_update(
    store: &Store,
    id: &str,
    patch: UpdateRequestPatch,
) -> AppResult<RequestRecord> {
    if let Some(date) = patch.date.as_deref() {
        validate_date(date)?;
    }
    if let Some(time) = patch.time.as_deref() {
        validate_time(time)?;
    }
    let status = match patch.status.as_deref() {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };

    let _guard = store.lock_requests()?;
    let mut records = store.load_requests()?;
    let Some(record) = records
        .iter_mut()
        .find(|record| same_request_id(&record.id, id))
    else {
        return Err(not_found(id));
    };

    if let Some(title) = patch.title {
        record.title = title;
    }
    if let Some(category) = patch.category {
        record.category = category;
    }
    if let Some(description) = patch.description {
        record.description = description;
    }
    if let Some(date) = patch.date {
        record.date = date.trim().to_string();
    }
    if let Some(location) = patch.location {
        record.location = location;
    }
    if let Some(time) = patch.time {
        record.time = time.trim().to_string();
    }
    if let Some(status) = status {
        record.status = status.as_str().to_string();
    }
    record.last_updated = Some(now_iso());

    let updated = record.clone();
    store.save_requests(&records)?;
    Ok(updated)
}

pub fn request_delete(store: &Store, id: &str) -> AppResult<RequestRecord> {
    let _guard = store.lock_requests()?;
    let mut records = store.load_requests()?;
    let Some(index) = records
        .iter()
        .position(|record| same_request_id(&record.id, id))
    else {
        return Err(not_found(id));
    };
    let removed = records.remove(index);
    store.save_requests(&records)?;
    tracing::debug!(request_id = %removed.id, "request deleted");
    Ok(removed)
}

/// Sets the assignment pair. A record already assigned to someone else is a
/// conflict; re-assigning to the same identity just refreshes the stamp.
/// Status moves to In Progress unless the record is Completed, since completion
/// is never downgraded from here.
pub fn request_assign(store: &Store, id: &str, assignee: &str) -> AppResult<RequestRecord> {
    let assignee = required(assignee, "assignee")?;

    let _guard = store.lock_requests()?;
    let mut records = store.load_requests()?;
    let Some(record) = records
        .iter_mut()
        .find(|record| same_request_id(&record.id, id))
    else {
        return Err(not_found(id));
    };

    if let Some(current) = record.assigned_to.as_deref() {
        if !current.is_empty() && current != assignee {
            return Err(AppError::Conflict(format!(
                "Request '{}' is already assigned to {current}.",
                record.id
            )));
        }
    }

    record.assigned_to = Some(assignee.to_string());
    record.assigned_at = Some(now_iso());
    if RequestStatus::parse(&record.status) != Some(RequestStatus::Completed) {
        record.status = RequestStatus::InProgress.as_str().to_string();
    }

    let updated = record.clone();
    store.save_requests(&records)?;
    Ok(updated)
}

/// Clears the assignment pair. Status falls back to Pending unless the
/// record is Completed.
pub fn request_unassign(store: &Store, id: &str) -> AppResult<RequestRecord> {
    let _guard = store.lock_requests()?;
    let mut records = store.load_requests()?;
    let Some(record) = records
        .iter_mut()
        .find(|record| same_request_id(&record.id, id))
    else {
        return Err(not_found(id));
    };

    record.assigned_to = None;
    record.assigned_at = None;
    if RequestStatus::parse(&record.status) != Some(RequestStatus::Completed) {
        record.status = RequestStatus::Pending.as_str().to_string();
    }

    let updated = record.clone();
    store.save_requests(&records)?;
    Ok(updated)
}

/// Terminal transition. Completing an unassigned record backfills the
/// acting identity as the assignee so the pair invariant holds.
pub fn request_complete(store: &Store, id: &str, actor: &str) -> AppResult<RequestRecord> {
    let _guard = store.lock_requests()?;
    let mut records = store.load_requests()?;
    let Some(record) = records
        .iter_mut()
        .find(|record| same_request_id(&record.id, id))
    else {
        return Err(not_found(id));
    };

    let now = now_iso();
    record.status = RequestStatus::Completed.as_str().to_string();
    record.completed_at = Some(now.clone());
    if record
        .assigned_to
        .as_deref()
        .map_or(true, |current| current.trim().is_empty())
    {
        record.assigned_to = Some(actor.to_string());
        record.assigned_at = Some(now);
    }

    let updated = record.clone();
    store.save_requests(&records)?;
    tracing::debug!(request_id = %updated.id, actor = %actor, "request completed");
    Ok(updated)
}

/// Increments the view counter and returns the new value, or `None` when
/// the id resolves to nothing, which keeps it distinguishable from a real zero.
/// Boundaries that want the historical ambiguous behavior can flatten with
/// `unwrap_or(0)`.
pub fn record_view(store: &Store, id: &str) -> AppResult<Option<u64>> {
    let _guard = store.lock_requests()?;
    let mut records = store.load_requests()?;
    let Some(record) = records
        .iter_mut()
        .find(|record| same_request_id(&record.id, id))
    else {
        return Ok(None);
    };

    let next = record.view_count.unwrap_or(0) + 1;
    record.view_count = Some(next);
    record.last_viewed_at = Some(now_iso());
    store.save_requests(&records)?;
    Ok(Some(next))
}

/// Read-only counter lookup; a missing record is an error here, unlike
/// [`record_view`].
pub fn view_count(store: &Store, id: &str) -> AppResult<u64> {
    let records = store.load_requests()?;
    let Some(record) = records
        .iter()
        .find(|record| same_request_id(&record.id, id))
    else {
        return Err(not_found(id));
    };
    Ok(record.view_count.unwrap_or(0))
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Request with ID '{id}' not found."))
}
