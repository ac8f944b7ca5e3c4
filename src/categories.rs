use crate::errors::{AppError, AppResult};
use crate::models::{
    CategoryPatch, CategoryRecord, CategoryVisibility, CreateCategoryPayload, RequestRecord,
};
use crate::store::{now_iso, Store};
use serde_json::Value;

/// Starter rows written the first time an empty catalog is opened.
pub fn ensure_seed_categories(store: &Store) -> AppResult<Vec<CategoryRecord>> {
    let _guard = store.lock_categories()?;
    let categories = store.load_categories()?;
    if !categories.is_empty() {
        return Ok(categories);
    }
    let seed = vec![
        seed_row("CAT-001", "Transportation", "Rides to appointments and errands", CategoryVisibility::Public),
        seed_row("CAT-002", "Home Repair", "Minor household maintenance and repairs", CategoryVisibility::Public),
        seed_row("CAT-003", "Check-in / Companionship", "Calls or visits to check on wellbeing", CategoryVisibility::Hidden),
    ];
    store.save_categories(&seed)?;
    tracing::info!(count = seed.len(), "seeded starter categories");
    Ok(seed)
}

fn seed_row(id: &str, name: &str, desc: &str, visibility: CategoryVisibility) -> CategoryRecord {
    CategoryRecord {
        id: id.to_string(),
        name: name.to_string(),
        desc: desc.to_string(),
        visibility,
        created_at: Some(now_iso()),
        updated_at: None,
    }
}

pub fn categories_list(
    store: &Store,
    query: Option<&str>,
    visibility: Option<CategoryVisibility>,
) -> AppResult<Vec<CategoryRecord>> {
    let mut categories = store.load_categories()?;
    if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
        let needle = query.to_lowercase();
        categories.retain(|category| {
            category.name.to_lowercase().contains(&needle)
                || category.desc.to_lowercase().contains(&needle)
        });
    }
    if let Some(visibility) = visibility {
        categories.retain(|category| category.visibility == visibility);
    }
    Ok(categories)
}

pub fn category_get(store: &Store, id: &str) -> AppResult<Option<CategoryRecord>> {
    let categories = store.load_categories()?;
    Ok(categories
        .into_iter()
        .find(|category| category.id == id.trim()))
}

pub fn category_create(store: &Store, payload: CreateCategoryPayload) -> AppResult<CategoryRecord> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Category name is required.".to_string()));
    }
    // Invalid visibility text falls back to public, as the old writer did.
    let visibility = payload
        .visibility
        .as_deref()
        .and_then(CategoryVisibility::parse)
        .unwrap_or_default();

    let _guard = store.lock_categories()?;
    let mut categories = store.load_categories()?;
    if categories
        .iter()
        .any(|category| category.name.eq_ignore_ascii_case(name))
    {
        return Err(AppError::Conflict(format!(
            "Duplicate category name '{name}'."
        )));
    }

    let record = CategoryRecord {
        id: next_category_id(&categories),
        name: name.to_string(),
        desc: payload.desc.trim().to_string(),
        visibility,
        created_at: Some(now_iso()),
        updated_at: None,
    };
    categories.push(record.clone());
    store.save_categories(&categories)?;
    tracing::debug!(category_id = %record.id, name = %record.name, "category created");
    Ok(record)
}

fn next_category_id(categories: &[CategoryRecord]) -> String {
    let max = categories
        .iter()
        .filter_map(|category| {
            category
                .id
                .rsplit('-')
                .next()
                .and_then(|part| part.parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0);
    format!("CAT-{:03}", max + 1)
}

pub fn category_update(store: &Store, id: &str, patch: CategoryPatch) -> AppResult<CategoryRecord> {
    let visibility = match patch.visibility.as_deref() {
        Some(raw) => Some(CategoryVisibility::parse(raw).ok_or_else(|| {
            AppError::Validation(format!("Unknown visibility '{}'.", raw.trim()))
        })?),
        None => None,
    };

    let _guard = store.lock_categories()?;
    let mut categories = store.load_categories()?;
    let Some(index) = categories
        .iter()
        .position(|category| category.id == id.trim())
    else {
        return Err(not_found(id));
    };

    let new_name = patch
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    if let Some(name) = new_name.as_deref() {
        let taken = categories.iter().enumerate().any(|(other, category)| {
            other != index && category.name.eq_ignore_ascii_case(name)
        });
        if taken {
            return Err(AppError::Conflict(format!(
                "Duplicate category name '{name}'."
            )));
        }
    }

    let category = &mut categories[index];
    if let Some(name) = new_name {
        category.name = name;
    }
    if let Some(desc) = patch.desc {
        category.desc = desc.trim().to_string();
    }
    if let Some(visibility) = visibility {
        category.visibility = visibility;
    }
    category.updated_at = Some(now_iso());

    let updated = category.clone();
    store.save_categories(&categories)?;
    Ok(updated)
}

/// Deletion is refused while any request still references the category, and
/// the conflict reports how many do.
pub fn category_delete(store: &Store, id: &str) -> AppResult<CategoryRecord> {
    let _guard = store.lock_categories()?;
    let mut categories = store.load_categories()?;
    let Some(index) = categories
        .iter()
        .position(|category| category.id == id.trim())
    else {
        return Err(not_found(id));
    };

    let usage = category_usage(store, &categories[index])?;
    if usage > 0 {
        return Err(AppError::Conflict(format!(
            "Category '{}' is in use by existing requests (usageCount: {usage}).",
            categories[index].id
        )));
    }

    let removed = categories.remove(index);
    store.save_categories(&categories)?;
    tracing::debug!(category_id = %removed.id, "category deleted");
    Ok(removed)
}

/// Number of requests referencing the category: by name on the current
/// record shape, or by the old `categoryId` linkage.
pub fn category_usage(store: &Store, category: &CategoryRecord) -> AppResult<usize> {
    let records = store.load_requests()?;
    Ok(records
        .iter()
        .filter(|record| references_category(record, category))
        .count())
}

fn references_category(record: &RequestRecord, category: &CategoryRecord) -> bool {
    if !record.category.trim().is_empty()
        && record.category.trim().eq_ignore_ascii_case(&category.name)
    {
        return true;
    }
    match record.legacy.get("categoryId") {
        Some(Value::String(id)) => id == &category.id,
        Some(Value::Number(number)) => number.to_string() == category.id,
        _ => false,
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Category with ID '{id}' not found."))
}
