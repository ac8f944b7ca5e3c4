use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    /// Accepts the spellings historical writers produced. Unknown text is
    /// rejected rather than coerced; write paths surface that as a
    /// validation failure.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in progress" | "in_progress" | "inprogress" | "in prog" | "assigned" => {
                Some(Self::InProgress)
            }
            "completed" | "complete" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A persisted service request. `status` stays a raw string so records
/// written by older code paths (`"pending"`, `"Shortlisted"`, mixed case)
/// survive a read/save cycle; every write path goes through
/// [`RequestStatus`]. Unrecognized keys (legacy shortlist flags, the old
/// `categoryId` linkage) are carried in `legacy` and never produced by new
/// code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default = "default_request_status")]
    pub status: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(
        default,
        rename = "last_updated",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(
        default,
        alias = "view_count",
        alias = "views",
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed_at: Option<String>,
    #[serde(flatten)]
    pub legacy: Map<String, Value>,
}

fn default_request_status() -> String {
    RequestStatus::Pending.as_str().to_string()
}

/// Old files hold counters as numbers or numeric strings; anything else
/// reads as "no count yet".
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(raw)) => raw.trim().parse::<u64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRequestPayload {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub date: String,
    pub location: String,
    pub time: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRequestPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
}

impl UpdateRequestPatch {
    pub fn status_only(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Self::default()
        }
    }
}

/// Sparse search filter. Absent fields are not filtered on; an entirely
/// empty criteria set matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    pub id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub keyword: Option<String>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.title.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.status.is_none()
            && self.keyword.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortlistOutcome {
    Saved,
    AlreadySaved,
    Removed,
    NotShortlisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryVisibility {
    #[default]
    Public,
    Hidden,
}

impl CategoryVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Hidden => "hidden",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "public" => Some(Self::Public),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub visibility: CategoryVisibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCategoryPayload {
    pub name: String,
    pub desc: String,
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Suspended => "Suspended",
        }
    }

    /// Maps both file terms and the UI terms (`inactive` meant suspended).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "suspended" | "inactive" => Some(Self::Suspended),
            _ => None,
        }
    }

    pub fn from_action(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "activate" => Some(Self::Active),
            "suspend" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// `users.json` record. `id == 0` marks rows written before ids existed;
/// the account migration backfills them. `password` is opaque here; it may
/// be a hash or legacy plaintext, and this crate never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(default)]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_account_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_account_status() -> String {
    AccountStatus::Active.as_str().to_string()
}

/// Role bucket → username → account, the shape of `users.json`.
pub type UserDirectory = BTreeMap<String, BTreeMap<String, AccountRecord>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAccountPayload {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountPatch {
    #[serde(alias = "name")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

/// Flattened dashboard row: role and status use the lowercase UI terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: u64,
    pub uid: Option<String>,
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub status: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl ReportPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Days looked back from today, inclusive on both ends.
    pub fn lookback_days(self) -> i64 {
        match self {
            Self::Daily => 0,
            Self::Weekly => 6,
            Self::Monthly => 29,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub request_id: String,
    pub request_date: String,
    pub request_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub period: ReportPeriod,
    pub generated_at: String,
    pub categories: usize,
    pub user_profiles: usize,
    pub pending: Vec<ReportRow>,
    pub assigned: Vec<ReportRow>,
    pub completed: Vec<ReportRow>,
}

impl ActivityReport {
    pub fn summary(&self) -> String {
        format!(
            "Report ({})\nCategories: {}\nUserProfiles: {}\nRequests Pending: {}\nRequests Assigned: {}\nRequests Completed: {}",
            self.period.as_str(),
            self.categories,
            self.user_profiles,
            self.pending.len(),
            self.assigned.len(),
            self.completed.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parse_accepts_historical_spellings() {
        assert_eq!(RequestStatus::parse("PENDING"), Some(RequestStatus::Pending));
        assert_eq!(
            RequestStatus::parse("in progress"),
            Some(RequestStatus::InProgress)
        );
        assert_eq!(
            RequestStatus::parse("assigned"),
            Some(RequestStatus::InProgress)
        );
        assert_eq!(
            RequestStatus::parse("complete"),
            Some(RequestStatus::Completed)
        );
        assert_eq!(RequestStatus::parse("shortlisted"), None);
    }

    #[test]
    fn request_record_round_trips_legacy_keys() {
        let raw = json!({
            "id": "REQ-101",
            "title": "Ride to clinic",
            "status": "Shortlisted",
            "shortlisted": true,
            "shortlisted_by": ["CSR_Rep"],
            "viewCount": "3"
        });
        let record: RequestRecord = serde_json::from_value(raw).expect("record parses");
        assert_eq!(record.status, "Shortlisted");
        assert_eq!(record.view_count, Some(3));
        assert_eq!(record.legacy.get("shortlisted"), Some(&json!(true)));

        let rendered = serde_json::to_value(&record).expect("record serializes");
        assert_eq!(rendered.get("shortlisted_by"), Some(&json!(["CSR_Rep"])));
    }

    #[test]
    fn account_status_maps_ui_terms() {
        assert_eq!(AccountStatus::parse("inactive"), Some(AccountStatus::Suspended));
        assert_eq!(AccountStatus::from_action("suspend"), Some(AccountStatus::Suspended));
        assert_eq!(AccountStatus::from_action("activate"), Some(AccountStatus::Active));
    }
}
