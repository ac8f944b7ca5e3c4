use crate::errors::{AppError, AppResult};
use crate::models::{CategoryRecord, RequestRecord, UserDirectory};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const REQUESTS_FILE: &str = "requests.json";
pub const USERS_FILE: &str = "users.json";
pub const CATEGORIES_FILE: &str = "categories.json";
pub const SHORTLISTS_FILE: &str = "shortlists.json";

/// Actor the flat (pre-per-actor) shortlist entries are folded under: the
/// identity the legacy writer stamped into `shortlisted_by`.
pub const LEGACY_SHORTLIST_ACTOR: &str = "CSR_Rep";

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The persistence seam. Collections are named documents; swapping the
/// backing store (directory of files, embedded KV, a real database) means
/// providing another implementation; call sites only see [`Store`].
pub trait StorageBackend: Send + Sync {
    fn read(&self, name: &str) -> AppResult<Option<String>>;
    fn write(&self, name: &str, contents: &str) -> AppResult<()>;
}

#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, name: &str) -> AppResult<Option<String>> {
        match fs::read_to_string(self.root.join(name)) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(AppError::Persistence(error.to_string())),
        }
    }

    fn write(&self, name: &str, contents: &str) -> AppResult<()> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| AppError::Persistence(error.to_string()))?;
        }
        // Write-to-temp-then-rename so readers never observe a partial file.
        let tmp = path.with_file_name(format!(".{name}.tmp"));
        fs::write(&tmp, contents).map_err(|error| AppError::Persistence(error.to_string()))?;
        fs::rename(&tmp, &path).map_err(|error| AppError::Persistence(error.to_string()))?;
        Ok(())
    }
}

/// File-backed record store. Each collection is reloaded whole on every
/// operation and written back whole; the per-collection mutexes serialize
/// load-mutate-save cycles inside this process. Writers in other processes
/// still race last-writer-wins, a known hazard of the format and not
/// something this layer can fix.
pub struct Store {
    backend: Box<dyn StorageBackend>,
    requests_lock: Mutex<()>,
    users_lock: Mutex<()>,
    categories_lock: Mutex<()>,
    shortlists_lock: Mutex<()>,
}

impl Store {
    pub fn open(root: &Path) -> AppResult<Self> {
        fs::create_dir_all(root).map_err(|error| AppError::Persistence(error.to_string()))?;
        let store = Self::with_backend(Box::new(FileBackend::new(root)));
        store.ensure_defaults()?;
        Ok(store)
    }

    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            requests_lock: Mutex::new(()),
            users_lock: Mutex::new(()),
            categories_lock: Mutex::new(()),
            shortlists_lock: Mutex::new(()),
        }
    }

    fn ensure_defaults(&self) -> AppResult<()> {
        self.ensure_file(REQUESTS_FILE, Value::Array(Vec::new()))?;
        self.ensure_file(USERS_FILE, Value::Object(Map::new()))?;
        self.ensure_file(CATEGORIES_FILE, Value::Array(Vec::new()))?;
        self.ensure_file(SHORTLISTS_FILE, Value::Object(Map::new()))?;
        Ok(())
    }

    fn ensure_file(&self, name: &str, default: Value) -> AppResult<()> {
        if self.backend.read(name)?.is_none() {
            self.save_value(name, &default)?;
        }
        Ok(())
    }

    pub fn lock_requests(&self) -> AppResult<MutexGuard<'_, ()>> {
        lock(&self.requests_lock)
    }

    pub fn lock_users(&self) -> AppResult<MutexGuard<'_, ()>> {
        lock(&self.users_lock)
    }

    pub fn lock_categories(&self) -> AppResult<MutexGuard<'_, ()>> {
        lock(&self.categories_lock)
    }

    pub fn lock_shortlists(&self) -> AppResult<MutexGuard<'_, ()>> {
        lock(&self.shortlists_lock)
    }

    /// Missing file: the default is written and returned. Unparseable file:
    /// the default is returned as-is. This layer is a dumb transport and
    /// never turns bad content into an error.
    fn load_value(&self, name: &str, default: Value) -> AppResult<Value> {
        let raw = match self.backend.read(name)? {
            Some(raw) => raw,
            None => {
                self.save_value(name, &default)?;
                return Ok(default);
            }
        };
        if raw.trim().is_empty() {
            return Ok(default);
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::warn!(file = name, error = %error, "malformed store file; using default");
                Ok(default)
            }
        }
    }

    fn save_value<T: Serialize>(&self, name: &str, value: &T) -> AppResult<()> {
        let rendered = serde_json::to_string_pretty(value)?;
        self.backend.write(name, &rendered)
    }

    pub fn load_requests(&self) -> AppResult<Vec<RequestRecord>> {
        let value = self.load_value(REQUESTS_FILE, Value::Array(Vec::new()))?;
        let rows = match value {
            Value::Array(rows) => rows,
            other => {
                tracing::warn!(
                    file = REQUESTS_FILE,
                    found = %value_kind(&other),
                    "expected an array; using empty collection"
                );
                Vec::new()
            }
        };
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<RequestRecord>(row) {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(file = REQUESTS_FILE, error = %error, "skipping malformed request record");
                }
            }
        }
        Ok(records)
    }

    pub fn save_requests(&self, records: &[RequestRecord]) -> AppResult<()> {
        self.save_value(REQUESTS_FILE, &records)
    }

    pub fn load_users(&self) -> AppResult<UserDirectory> {
        let value = self.load_value(USERS_FILE, Value::Object(Map::new()))?;
        match serde_json::from_value(value) {
            Ok(directory) => Ok(directory),
            Err(error) => {
                tracing::warn!(file = USERS_FILE, error = %error, "malformed user directory; using empty");
                Ok(UserDirectory::new())
            }
        }
    }

    pub fn save_users(&self, users: &UserDirectory) -> AppResult<()> {
        self.save_value(USERS_FILE, users)
    }

    pub fn load_categories(&self) -> AppResult<Vec<CategoryRecord>> {
        let value = self.load_value(CATEGORIES_FILE, Value::Array(Vec::new()))?;
        match serde_json::from_value(value) {
            Ok(categories) => Ok(categories),
            Err(error) => {
                tracing::warn!(file = CATEGORIES_FILE, error = %error, "malformed category list; using empty");
                Ok(Vec::new())
            }
        }
    }

    pub fn save_categories(&self, categories: &[CategoryRecord]) -> AppResult<()> {
        self.save_value(CATEGORIES_FILE, &categories)
    }

    /// Loads the per-actor shortlist ledger. The older flat-array layout
    /// (ids with no actor attribution) is migrated under
    /// [`LEGACY_SHORTLIST_ACTOR`] and persisted in the per-actor form.
    pub fn load_shortlists(&self) -> AppResult<BTreeMap<String, Vec<String>>> {
        let value = self.load_value(SHORTLISTS_FILE, Value::Object(Map::new()))?;
        match value {
            Value::Object(entries) => {
                let mut ledger = BTreeMap::new();
                for (actor, ids) in entries {
                    match ids {
                        Value::Array(items) => {
                            ledger.insert(actor, string_items(items));
                        }
                        other => {
                            tracing::warn!(
                                file = SHORTLISTS_FILE,
                                actor = %actor,
                                found = %value_kind(&other),
                                "skipping shortlist entry that is not an id array"
                            );
                        }
                    }
                }
                Ok(ledger)
            }
            Value::Array(items) => {
                let mut ledger = BTreeMap::new();
                ledger.insert(LEGACY_SHORTLIST_ACTOR.to_string(), string_items(items));
                tracing::info!(
                    file = SHORTLISTS_FILE,
                    actor = LEGACY_SHORTLIST_ACTOR,
                    "migrated flat shortlist file to the per-actor layout"
                );
                self.save_shortlists(&ledger)?;
                Ok(ledger)
            }
            other => {
                tracing::warn!(
                    file = SHORTLISTS_FILE,
                    found = %value_kind(&other),
                    "unexpected shortlist layout; using empty ledger"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    pub fn save_shortlists(&self, ledger: &BTreeMap<String, Vec<String>>) -> AppResult<()> {
        self.save_value(SHORTLISTS_FILE, ledger)
    }
}

fn lock(mutex: &Mutex<()>) -> AppResult<MutexGuard<'_, ()>> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal("store mutex poisoned".to_string()))
}

fn string_items(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(id) => Some(id),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
