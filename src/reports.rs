use crate::errors::AppResult;
use crate::models::{ActivityReport, ReportPeriod, ReportRow, RequestRecord, RequestStatus};
use crate::store::{now_iso, Store};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Platform-manager activity summary. A request is counted when its most
/// relevant timestamp (`last_updated`, else `created`, else the request
/// `date`) falls inside the period, inclusive on both ends.
pub fn generate_report(store: &Store, period: ReportPeriod) -> AppResult<ActivityReport> {
    let today = Utc::now().date_naive();
    let start = today - Duration::days(period.lookback_days());

    let categories = store.load_categories()?.len();
    let user_profiles: usize = store
        .load_users()?
        .values()
        .map(|bucket| bucket.len())
        .sum();

    let mut pending = Vec::new();
    let mut assigned = Vec::new();
    let mut completed = Vec::new();

    for record in store.load_requests()? {
        let Some(date) = report_date(&record) else {
            continue;
        };
        if date < start || date > today {
            continue;
        }
        let status = bucket_status(&record.status);
        let row = ReportRow {
            request_id: record.id.clone(),
            request_date: date.format("%Y-%m-%d").to_string(),
            request_status: status.to_string(),
        };
        match status {
            "Assigned" => assigned.push(row),
            "Completed" => completed.push(row),
            _ => pending.push(row),
        }
    }

    Ok(ActivityReport {
        period,
        generated_at: now_iso(),
        categories,
        user_profiles,
        pending,
        assigned,
        completed,
    })
}

fn report_date(record: &RequestRecord) -> Option<NaiveDate> {
    for candidate in [
        record.last_updated.as_deref(),
        record.created.as_deref(),
        Some(record.date.as_str()),
    ]
    .into_iter()
    .flatten()
    {
        if let Some(date) = parse_report_date(candidate) {
            return Some(date);
        }
    }
    None
}

/// The files hold plain dates, RFC 3339 stamps, and naive `isoformat()`
/// strings with or without fractions; accept all of them.
fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    let head = raw.trim_end_matches('Z');
    let head = head.split('.').next().unwrap_or(head);
    NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|stamp| stamp.date())
}

/// Report buckets label In Progress as "Assigned"; anything unrecognized
/// counts as Pending, which is how the legacy rows were tallied.
fn bucket_status(raw: &str) -> &'static str {
    match RequestStatus::parse(raw) {
        Some(RequestStatus::Completed) => "Completed",
        Some(RequestStatus::InProgress) => "Assigned",
        _ => "Pending",
    }
}
