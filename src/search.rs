use crate::errors::AppResult;
use crate::models::{RequestRecord, RequestStatus, SearchCriteria};
use crate::requests::{canonical_request_id, same_request_id};
use crate::shortlist::has_legacy_shortlist_signal;
use crate::store::Store;
use serde_json::{Map, Value};
use std::collections::HashSet;

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

fn matches_criteria(record: &RequestRecord, criteria: &SearchCriteria) -> bool {
    if let Some(id) = criteria.id.as_deref() {
        if !same_request_id(&record.id, id) {
            return false;
        }
    }
    if let Some(title) = criteria.title.as_deref() {
        if !contains_ci(&record.title, title) {
            return false;
        }
    }
    if let Some(category) = criteria.category.as_deref() {
        if !contains_ci(&record.category, category) {
            return false;
        }
    }
    if let Some(date) = criteria.date.as_deref() {
        if !contains_ci(&record.date, date) {
            return false;
        }
    }
    if let Some(status) = criteria.status.as_deref() {
        if !contains_ci(&record.status, status) {
            return false;
        }
    }
    if let Some(keyword) = criteria.keyword.as_deref() {
        if !contains_ci(&record.title, keyword)
            && !contains_ci(&record.description, keyword)
            && !contains_ci(&record.category, keyword)
        {
            return false;
        }
    }
    true
}

/// Keeps only the records matching every supplied criterion. Empty criteria
/// keep everything; input order is preserved either way.
pub fn apply_criteria(records: &mut Vec<RequestRecord>, criteria: &SearchCriteria) {
    if criteria.is_empty() {
        return;
    }
    records.retain(|record| matches_criteria(record, criteria));
}

pub fn search_requests(store: &Store, criteria: &SearchCriteria) -> AppResult<Vec<RequestRecord>> {
    let mut records = store.load_requests()?;
    apply_criteria(&mut records, criteria);
    Ok(records)
}

/// Shortlist-restricted search: candidates are the actor's ledger entries,
/// plus records still carrying a legacy shortlist signal (old data has no
/// actor attribution, so it stays visible rather than silently vanishing).
pub fn search_shortlist(
    store: &Store,
    actor: &str,
    criteria: &SearchCriteria,
) -> AppResult<Vec<RequestRecord>> {
    let ledger = store.load_shortlists()?;
    let mine: HashSet<String> = ledger
        .get(actor)
        .map(|ids| ids.iter().map(|id| canonical_request_id(id)).collect())
        .unwrap_or_default();

    let mut records = store.load_requests()?;
    records.retain(|record| {
        mine.contains(&canonical_request_id(&record.id)) || has_legacy_shortlist_signal(record)
    });
    apply_criteria(&mut records, criteria);
    Ok(records)
}

/// Previous-request search. Unlike the general engine, the status gate is
/// exact (case-insensitive) equality, and the keyword looks at location
/// instead of category. `field_filters` matches arbitrary record keys
/// against the record's JSON projection: string expectations are substring
/// matches, anything else must be equal.
pub fn search_previous(
    store: &Store,
    target_status: Option<&str>,
    field_filters: &Map<String, Value>,
    criteria: &SearchCriteria,
) -> AppResult<Vec<RequestRecord>> {
    let target = match target_status.map(str::trim) {
        Some(status) if !status.is_empty() => status.to_string(),
        _ => RequestStatus::Completed.as_str().to_string(),
    };

    let mut records = store.load_requests()?;
    records.retain(|record| {
        if !record.status.trim().eq_ignore_ascii_case(&target) {
            return false;
        }
        if !matches_field_filters(record, field_filters) {
            return false;
        }
        if let Some(keyword) = criteria.keyword.as_deref() {
            if !contains_ci(&record.title, keyword)
                && !contains_ci(&record.description, keyword)
                && !contains_ci(&record.location, keyword)
            {
                return false;
            }
        }
        if let Some(category) = criteria.category.as_deref() {
            if !contains_ci(&record.category, category) {
                return false;
            }
        }
        if let Some(date) = criteria.date.as_deref() {
            if !contains_ci(&record.date, date) {
                return false;
            }
        }
        true
    });
    Ok(records)
}

fn matches_field_filters(record: &RequestRecord, filters: &Map<String, Value>) -> bool {
    if filters.is_empty() {
        return true;
    }
    let projection = match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => return false,
    };
    for (key, expected) in filters {
        let actual = projection.get(key);
        match expected {
            Value::String(wanted) => {
                let haystack = match actual {
                    Some(Value::String(text)) => text.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                if !contains_ci(&haystack, wanted) {
                    return false;
                }
            }
            other => {
                if actual != Some(other) {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateRequestPayload, UpdateRequestPatch};
    use crate::requests::{request_complete, request_create, request_update};
    use crate::shortlist::shortlist_save;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("temp store root");
        let store = Store::open(dir.path()).expect("store opens");
        (dir, store)
    }

    fn seed(store: &Store, title: &str, category: &str, date: &str, owner: &str) -> RequestRecord {
        request_create(
            store,
            CreateRequestPayload {
                title: title.to_string(),
                description: format!("{title} details"),
                category: category.to_string(),
                date: date.to_string(),
                location: "Block 5".to_string(),
                owner: Some(owner.to_string()),
                ..CreateRequestPayload::default()
            },
        )
        .expect("seed request")
    }

    #[test]
    fn empty_criteria_returns_everything_in_order() {
        let (_dir, store) = temp_store();
        seed(&store, "Ride to clinic", "transport", "2025-06-01", "pin_tan");
        seed(&store, "Fix leaking tap", "home repair", "2025-06-02", "pin_lee");

        let results = search_requests(&store, &SearchCriteria::default()).expect("search");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Ride to clinic");
        assert_eq!(results[1].title, "Fix leaking tap");
    }

    #[test]
    fn category_filter_is_case_insensitive_substring() {
        let (_dir, store) = temp_store();
        seed(&store, "Health screening", "Healthcare", "2025-06-01", "pin_tan");
        seed(&store, "Ride to clinic", "transport", "2025-06-02", "pin_tan");

        let results = search_requests(
            &store,
            &SearchCriteria {
                category: Some("health".to_string()),
                ..SearchCriteria::default()
            },
        )
        .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, "Healthcare");
    }

    #[test]
    fn all_criteria_are_anded() {
        let (_dir, store) = temp_store();
        seed(&store, "Health screening", "Healthcare", "2025-06-01", "pin_tan");
        seed(&store, "Health talk", "Education", "2025-06-01", "pin_tan");

        let results = search_requests(
            &store,
            &SearchCriteria {
                keyword: Some("health".to_string()),
                category: Some("education".to_string()),
                ..SearchCriteria::default()
            },
        )
        .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Health talk");
    }

    #[test]
    fn date_and_status_match_on_substrings() {
        let (_dir, store) = temp_store();
        seed(&store, "Ride to clinic", "transport", "2025-11-20", "pin_tan");
        seed(&store, "Fix leaking tap", "home repair", "2025-06-02", "pin_tan");

        let by_month = search_requests(
            &store,
            &SearchCriteria {
                date: Some("2025-11".to_string()),
                ..SearchCriteria::default()
            },
        )
        .expect("search");
        assert_eq!(by_month.len(), 1);

        let by_status = search_requests(
            &store,
            &SearchCriteria {
                status: Some("pend".to_string()),
                ..SearchCriteria::default()
            },
        )
        .expect("search");
        assert_eq!(by_status.len(), 2);
    }

    #[test]
    fn id_criterion_ignores_the_prefix() {
        let (_dir, store) = temp_store();
        let record = seed(&store, "Ride to clinic", "transport", "2025-06-01", "pin_tan");

        let results = search_requests(
            &store,
            &SearchCriteria {
                id: Some(canonical_request_id(&record.id)),
                ..SearchCriteria::default()
            },
        )
        .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, record.id);
    }

    #[test]
    fn shortlist_search_sees_only_the_actors_entries() {
        let (_dir, store) = temp_store();
        let saved = seed(&store, "Ride to clinic", "transport", "2025-06-01", "pin_tan");
        seed(&store, "Fix leaking tap", "home repair", "2025-06-02", "pin_lee");
        shortlist_save(&store, "csr_alice", &saved.id).expect("shortlist");

        let mine = search_shortlist(&store, "csr_alice", &SearchCriteria::default())
            .expect("search shortlist");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, saved.id);

        let theirs = search_shortlist(&store, "csr_bob", &SearchCriteria::default())
            .expect("search shortlist");
        assert!(theirs.is_empty());
    }

    #[test]
    fn previous_search_requires_exact_status() {
        let (_dir, store) = temp_store();
        let done = seed(&store, "Ride to clinic", "transport", "2025-06-01", "pin_tan");
        request_complete(&store, &done.id, "csr_alice").expect("complete");
        let open = seed(&store, "Pending errand", "transport", "2025-06-02", "pin_tan");
        request_update(&store, &open.id, UpdateRequestPatch::status_only("in progress"))
            .expect("update");

        let results = search_previous(&store, None, &Map::new(), &SearchCriteria::default())
            .expect("search previous");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, done.id);

        // Exact gate, not substring: "complete" does not match "Completed".
        let results = search_previous(
            &store,
            Some("complete"),
            &Map::new(),
            &SearchCriteria::default(),
        )
        .expect("search previous");
        assert!(results.is_empty());
    }

    #[test]
    fn previous_search_field_filters_distinguish_string_and_exact() {
        let (_dir, store) = temp_store();
        let done = seed(&store, "Ride to clinic", "transport", "2025-06-01", "pin_tan");
        request_complete(&store, &done.id, "csr_alice").expect("complete");

        let mut filters = Map::new();
        filters.insert("owner".to_string(), json!("PIN_TAN"));
        let results =
            search_previous(&store, None, &filters, &SearchCriteria::default()).expect("search");
        assert_eq!(results.len(), 1);

        let mut exact = Map::new();
        exact.insert("viewCount".to_string(), json!(5));
        let results =
            search_previous(&store, None, &exact, &SearchCriteria::default()).expect("search");
        assert!(results.is_empty());
    }

    #[test]
    fn previous_search_keyword_covers_location() {
        let (_dir, store) = temp_store();
        let done = seed(&store, "Ride to clinic", "transport", "2025-06-01", "pin_tan");
        request_complete(&store, &done.id, "csr_alice").expect("complete");

        let results = search_previous(
            &store,
            Some("completed"),
            &Map::new(),
            &SearchCriteria {
                keyword: Some("block 5".to_string()),
                ..SearchCriteria::default()
            },
        )
        .expect("search previous");
        assert_eq!(results.len(), 1);
    }
}
