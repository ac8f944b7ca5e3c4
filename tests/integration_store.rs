use request_center::accounts::{account_create, account_set_status, is_suspended};
use request_center::categories::{category_create, category_delete, ensure_seed_categories};
use request_center::requests::{
    record_view, request_complete, request_create, request_delete, request_get, view_count,
};
use request_center::search::{search_previous, search_requests, search_shortlist};
use request_center::shortlist::{shortlist_count, shortlist_for, shortlist_remove, shortlist_save};
use request_center::{
    AccountStatus, AppError, CreateAccountPayload, CreateCategoryPayload, CreateRequestPayload,
    ReportPeriod, SearchCriteria, ShortlistOutcome, Store,
};
use serde_json::Map;
use std::fs;

fn open_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().expect("temp data dir");
    let store = Store::open(dir.path()).expect("store opens");
    (dir, store)
}

fn request_payload(title: &str, category: &str, owner: &str) -> CreateRequestPayload {
    CreateRequestPayload {
        title: title.to_string(),
        description: format!("{title}, full details"),
        category: category.to_string(),
        date: "2025-06-01".to_string(),
        location: "Block 5".to_string(),
        owner: Some(owner.to_string()),
        ..CreateRequestPayload::default()
    }
}

#[test]
fn request_lifecycle_end_to_end() {
    let (_dir, store) = open_store();

    let record = request_create(&store, request_payload("Ride to clinic", "transport", "pin_tan"))
        .expect("create");
    assert_eq!(record.id, "REQ-100");
    assert_eq!(record.status, "Pending");

    // Lookup tolerates either id form.
    assert!(request_get(&store, "100").expect("get").is_some());
    assert!(request_get(&store, "req-100").expect("get").is_some());

    // Views accumulate and survive reloads.
    assert_eq!(record_view(&store, "REQ-100").expect("view"), Some(1));
    assert_eq!(record_view(&store, "100").expect("view"), Some(2));
    assert_eq!(view_count(&store, "REQ-100").expect("count"), 2);

    // A CSR shortlists it, completes it, and the previous-request search
    // picks it up.
    assert_eq!(
        shortlist_save(&store, "csr_alice", "100").expect("shortlist"),
        ShortlistOutcome::Saved
    );
    assert_eq!(shortlist_count(&store, "REQ-100").expect("count"), 1);

    let completed = request_complete(&store, "REQ-100", "csr_alice").expect("complete");
    assert_eq!(completed.status, "Completed");
    assert_eq!(completed.assigned_to.as_deref(), Some("csr_alice"));

    let previous = search_previous(&store, None, &Map::new(), &SearchCriteria::default())
        .expect("previous search");
    assert_eq!(previous.len(), 1);
    assert_eq!(previous[0].id, "REQ-100");

    // Deleting the request leaves a dangling ledger id that listings drop.
    request_delete(&store, "REQ-100").expect("delete");
    assert!(shortlist_for(&store, "csr_alice").expect("list").is_empty());
    assert_eq!(
        shortlist_remove(&store, "csr_alice", "REQ-100").expect("cleanup"),
        ShortlistOutcome::Removed
    );
}

#[test]
fn search_and_shortlist_are_scoped() {
    let (_dir, store) = open_store();
    request_create(&store, request_payload("Health screening", "Healthcare", "pin_tan"))
        .expect("create");
    request_create(&store, request_payload("Fix leaking tap", "Home Repair", "pin_lee"))
        .expect("create");

    let health = search_requests(
        &store,
        &SearchCriteria {
            category: Some("health".to_string()),
            ..SearchCriteria::default()
        },
    )
    .expect("search");
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].category, "Healthcare");

    shortlist_save(&store, "csr_alice", "REQ-100").expect("shortlist");
    let mine =
        search_shortlist(&store, "csr_alice", &SearchCriteria::default()).expect("shortlist search");
    assert_eq!(mine.len(), 1);
    let nobody =
        search_shortlist(&store, "csr_bob", &SearchCriteria::default()).expect("shortlist search");
    assert!(nobody.is_empty());
}

#[test]
fn categories_guard_deletion_and_reports_tally() {
    let (_dir, store) = open_store();
    ensure_seed_categories(&store).expect("seed");
    let category = category_create(
        &store,
        CreateCategoryPayload {
            name: "Transport".to_string(),
            desc: "Rides".to_string(),
            ..CreateCategoryPayload::default()
        },
    )
    .expect("create category");

    request_create(&store, request_payload("Ride to clinic", "transport", "pin_tan"))
        .expect("create request");

    let error = category_delete(&store, &category.id).expect_err("in use");
    match error {
        AppError::Conflict(message) => assert!(message.contains("usageCount: 1")),
        other => panic!("expected conflict, got {other}"),
    }

    let report =
        request_center::reports::generate_report(&store, ReportPeriod::Weekly).expect("report");
    assert_eq!(report.categories, 4);
    assert_eq!(report.pending.len(), 1);
    assert!(report.summary().contains("Requests Pending: 1"));
}

#[test]
fn suspended_accounts_are_flagged_for_login_gates() {
    let (_dir, store) = open_store();
    let account = account_create(
        &store,
        CreateAccountPayload {
            full_name: "Alice L.".to_string(),
            email: "alice@example.org".to_string(),
            username: "alice".to_string(),
            password: "pbkdf2:sha256$x$y".to_string(),
            role: "CSR Representative".to_string(),
        },
    )
    .expect("create account");

    assert!(!is_suspended(&store, "csr", "alice").expect("check"));
    account_set_status(&store, account.id, AccountStatus::Suspended).expect("suspend");
    assert!(is_suspended(&store, "csr", "alice").expect("check"));
}

#[test]
fn legacy_files_are_ingested_without_rewriting_history() {
    let (dir, store) = open_store();

    // Data as three generations of writers left it: a flat shortlist file,
    // per-record legacy flags, and mixed-case statuses.
    fs::write(dir.path().join("shortlists.json"), r#"["REQ-101"]"#).expect("write flat shortlist");
    fs::write(
        dir.path().join("requests.json"),
        r#"[
            {"id": "REQ-101", "title": "Grocery run", "category": "transport",
             "description": "weekly", "location": "Block 2", "date": "2025-05-01",
             "status": "pending", "owner": "pin_lee", "viewCount": "7"},
            {"id": "102", "title": "Wheelchair repair", "category": "repair",
             "description": "left wheel", "location": "Block 3", "date": "2025-05-02",
             "status": "Shortlisted", "owner": "pin_tan", "shortlisted_by": ["CSR_Rep"]}
        ]"#,
    )
    .expect("write legacy requests");

    // The flat ledger folds under the legacy actor.
    let migrated = shortlist_for(&store, "CSR_Rep").expect("list");
    assert_eq!(migrated.len(), 1);
    assert_eq!(migrated[0].id, "REQ-101");

    // Legacy-flagged records stay visible to shortlist search.
    let visible =
        search_shortlist(&store, "CSR_Rep", &SearchCriteria::default()).expect("search");
    assert_eq!(visible.len(), 2);

    // String counters are coerced, and incrementing continues from them.
    assert_eq!(view_count(&store, "101").expect("count"), 7);
    assert_eq!(record_view(&store, "REQ-101").expect("view"), Some(8));

    // The denormalized membership cache still answers counts.
    assert_eq!(shortlist_count(&store, "102").expect("count"), 1);
}
