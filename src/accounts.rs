use crate::errors::{AppError, AppResult};
use crate::models::{
    AccountPatch, AccountRecord, AccountStatus, AccountSummary, CreateAccountPayload,
    UserDirectory,
};
use crate::store::{now_iso, Store};

/// UI labels collapse onto the four role buckets of `users.json`.
pub fn normalize_role(raw: &str) -> String {
    let role = raw.trim().to_lowercase();
    match role.as_str() {
        "user" => "pin".to_string(),
        "csr representative" | "csr rep" => "csr".to_string(),
        _ => role,
    }
}

fn required<'a>(value: &'a str, label: &str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{label} is required.")));
    }
    Ok(trimmed)
}

fn uid_for(id: u64) -> String {
    format!("U-{id:03}")
}

fn max_account_id(users: &UserDirectory) -> u64 {
    users
        .values()
        .flat_map(|bucket| bucket.values())
        .map(|record| record.id)
        .max()
        .unwrap_or(0)
}

fn locate(users: &UserDirectory, user_id: u64) -> Option<(String, String)> {
    for (role, bucket) in users {
        for (username, record) in bucket {
            if record.id == user_id {
                return Some((role.clone(), username.clone()));
            }
        }
    }
    None
}

pub fn account_create(store: &Store, payload: CreateAccountPayload) -> AppResult<AccountRecord> {
    let username = required(&payload.username, "Username")?.to_string();
    let password = required(&payload.password, "Password")?.to_string();
    let role = normalize_role(required(&payload.role, "Role")?);

    let _guard = store.lock_users()?;
    let mut users = store.load_users()?;
    if users
        .get(&role)
        .is_some_and(|bucket| bucket.contains_key(&username))
    {
        return Err(AppError::Conflict(
            "Username already exists for this role.".to_string(),
        ));
    }

    let next_id = max_account_id(&users) + 1;
    let now = now_iso();
    let record = AccountRecord {
        id: next_id,
        uid: Some(uid_for(next_id)),
        full_name: payload.full_name.trim().to_string(),
        email: payload.email.trim().to_string(),
        username: username.clone(),
        password,
        role: role.clone(),
        status: AccountStatus::Active.as_str().to_string(),
        created_at: Some(now.clone()),
        updated_at: Some(now),
    };
    users
        .entry(role)
        .or_default()
        .insert(username, record.clone());
    store.save_users(&users)?;
    tracing::debug!(user_id = record.id, role = %record.role, "account created");
    Ok(record)
}

pub fn account_get(store: &Store, user_id: u64) -> AppResult<Option<AccountRecord>> {
    let users = store.load_users()?;
    Ok(locate(&users, user_id)
        .and_then(|(role, username)| users.get(&role)?.get(&username).cloned()))
}

pub fn account_find(store: &Store, role: &str, username: &str) -> AppResult<Option<AccountRecord>> {
    let users = store.load_users()?;
    Ok(users
        .get(&normalize_role(role))
        .and_then(|bucket| bucket.get(username.trim()))
        .cloned())
}

/// Flattened dashboard listing, id-sorted. The query matches name, email or
/// username as a substring, or id/uid/role exactly. Rows without a
/// backfilled id (pre-migration) are skipped, as the original listing did.
pub fn accounts_flat(store: &Store, query: Option<&str>) -> AppResult<Vec<AccountSummary>> {
    let users = store.load_users()?;
    let mut rows: Vec<AccountSummary> = Vec::new();
    for (role_bucket, bucket) in &users {
        for (username, record) in bucket {
            if record.id == 0 {
                continue;
            }
            let display_name = if record.full_name.is_empty() {
                username.clone()
            } else {
                record.full_name.clone()
            };
            let role = if record.role.is_empty() {
                role_bucket.clone()
            } else {
                record.role.clone()
            };
            rows.push(AccountSummary {
                id: record.id,
                uid: record.uid.clone(),
                full_name: display_name,
                email: record.email.clone(),
                username: if record.username.is_empty() {
                    username.clone()
                } else {
                    record.username.clone()
                },
                role: role.to_lowercase(),
                status: match AccountStatus::parse(&record.status) {
                    Some(AccountStatus::Suspended) => "inactive".to_string(),
                    _ => "active".to_string(),
                },
                created_at: record.created_at.clone(),
                updated_at: record.updated_at.clone(),
            });
        }
    }
    rows.sort_by_key(|row| row.id);

    if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
        let needle = query.to_lowercase();
        rows.retain(|row| {
            row.full_name.to_lowercase().contains(&needle)
                || row.email.to_lowercase().contains(&needle)
                || row.username.to_lowercase().contains(&needle)
                || row.id.to_string() == needle
                || row
                    .uid
                    .as_deref()
                    .is_some_and(|uid| uid.to_lowercase() == needle)
                || row.role == needle
        });
    }
    Ok(rows)
}

/// Partial update. Username and role changes move the record between map
/// keys/buckets; a collision in the target slot is a conflict.
pub fn account_update(store: &Store, user_id: u64, patch: AccountPatch) -> AppResult<AccountRecord> {
    let new_status = match patch.status.as_deref() {
        Some(raw) => Some(AccountStatus::parse(raw).ok_or_else(|| {
            AppError::Validation(format!("Unknown account status '{}'.", raw.trim()))
        })?),
        None => None,
    };

    let _guard = store.lock_users()?;
    let mut users = store.load_users()?;
    let Some((mut role, mut username)) = locate(&users, user_id) else {
        return Err(not_found(user_id));
    };

    let mut record = users
        .get_mut(&role)
        .and_then(|bucket| bucket.remove(&username))
        .ok_or_else(|| AppError::Internal("user directory entry vanished".to_string()))?;

    if let Some(full_name) = patch.full_name {
        record.full_name = full_name.trim().to_string();
    }
    if let Some(email) = patch.email {
        record.email = email.trim().to_string();
    }
    if let Some(new_username) = patch
        .username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
    {
        username = new_username.clone();
        record.username = new_username;
    }
    if let Some(password) = patch.password.filter(|value| !value.is_empty()) {
        record.password = password;
    }
    if let Some(new_role) = patch
        .role
        .map(|value| normalize_role(&value))
        .filter(|value| !value.is_empty())
    {
        role = new_role;
    }
    record.role = role.clone();
    if let Some(status) = new_status {
        record.status = status.as_str().to_string();
    }
    record.updated_at = Some(now_iso());

    let target = users.entry(role).or_default();
    if target
        .get(&username)
        .is_some_and(|existing| existing.id != user_id)
    {
        return Err(AppError::Conflict(
            "Username already exists in target role.".to_string(),
        ));
    }
    let updated = record.clone();
    target.insert(username, record);
    store.save_users(&users)?;
    Ok(updated)
}

pub fn account_set_status(
    store: &Store,
    user_id: u64,
    status: AccountStatus,
) -> AppResult<AccountRecord> {
    let _guard = store.lock_users()?;
    let mut users = store.load_users()?;
    let Some((role, username)) = locate(&users, user_id) else {
        return Err(not_found(user_id));
    };
    let record = users
        .get_mut(&role)
        .and_then(|bucket| bucket.get_mut(&username))
        .ok_or_else(|| AppError::Internal("user directory entry vanished".to_string()))?;
    record.status = status.as_str().to_string();
    record.updated_at = Some(now_iso());
    let updated = record.clone();
    store.save_users(&users)?;
    tracing::debug!(user_id, status = %updated.status, "account status changed");
    Ok(updated)
}

/// Suspension gate consulted by login paths. Unknown users are not
/// suspended; the credential check rejects them on its own.
pub fn is_suspended(store: &Store, role: &str, username: &str) -> AppResult<bool> {
    let users = store.load_users()?;
    Ok(users
        .get(&normalize_role(role))
        .and_then(|bucket| bucket.get(username.trim()))
        .is_some_and(|record| {
            AccountStatus::parse(&record.status) == Some(AccountStatus::Suspended)
        }))
}

/// Backfills `id`/`uid` and the descriptive defaults on rows written before
/// those fields existed. Saves only when something changed; returns whether
/// it did.
pub fn migrate_accounts(store: &Store) -> AppResult<bool> {
    let _guard = store.lock_users()?;
    let mut users = store.load_users()?;
    let mut next_id = max_account_id(&users) + 1;
    let mut changed = false;

    for (role_bucket, bucket) in users.iter_mut() {
        for (username, record) in bucket.iter_mut() {
            if record.id != 0 {
                continue;
            }
            record.id = next_id;
            record.uid = Some(uid_for(next_id));
            if record.full_name.is_empty() {
                record.full_name = username.clone();
            }
            if record.username.is_empty() {
                record.username = username.clone();
            }
            if record.role.is_empty() {
                record.role = role_bucket.clone();
            }
            if record.created_at.is_none() {
                record.created_at = Some(now_iso());
            }
            record.updated_at = Some(now_iso());
            next_id += 1;
            changed = true;
        }
    }

    if changed {
        store.save_users(&users)?;
        tracing::info!("backfilled legacy account rows");
    }
    Ok(changed)
}

fn not_found(user_id: u64) -> AppError {
    AppError::NotFound(format!("User with ID '{user_id}' not found."))
}
