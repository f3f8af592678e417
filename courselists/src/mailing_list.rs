//! Mailing-list data model: lists, members, and the roster sync.
//!
//! A course site has zero or one mailing list. Members are never hard-deleted;
//! leaving the roster sets `deleted_at`, rejoining clears it again, so the
//! welcome-email log can report past members.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::canvas::{Course, RosterEntry};

static LIST_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_.-]*[a-z0-9]$")
        .unwrap_or_else(|e| panic!("list name regex must be valid: {e}"))
});

const LIST_NAME_MAX: usize = 50;
const SLUG_MAX: usize = 45;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingList {
    pub id: String,
    pub canvas_site_id: String,
    pub name: String,
    /// Domain the list address lives under, e.g. `lists.example.edu`.
    pub domain: String,
    /// Active (non-deleted) member count as of the last populate.
    pub members_count: usize,
    pub created_at: DateTime<Utc>,
    pub populated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingListMember {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    /// When the welcome message went out; set by the welcome-email sender.
    pub welcomed_at: Option<DateTime<Utc>>,
    /// Soft-delete marker; set when the member leaves the roster.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MailingListMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// What a populate run changed, as member email addresses.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateSummary {
    pub added: Vec<String>,
    pub restored: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl PopulateSummary {
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.restored.len() + self.updated.len() + self.removed.len()
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("A mailing list already exists for course site {0}.")]
    AlreadyExists(String),
    #[error("The name \"{0}\" is already in use by another mailing list.")]
    NameTaken(String),
    #[error("\"{0}\" is not a valid mailing list name. Use 2-50 lowercase letters and digits, optionally separated by '.', '_' or '-'.")]
    InvalidName(String),
}

/// In-memory store of mailing lists and their members.
///
/// Lists are keyed by course site ID, members by list ID. Cheap to clone;
/// clones share the underlying maps.
#[derive(Debug, Clone, Default)]
pub struct ListStore {
    inner: Arc<ListStoreInner>,
}

#[derive(Debug, Default)]
struct ListStoreInner {
    lists: DashMap<String, MailingList>,
    members: DashMap<String, Vec<MailingListMember>>,
}

impl ListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lists.is_empty()
    }

    pub fn find_by_site_id(&self, site_id: &str) -> Option<MailingList> {
        self.inner.lists.get(site_id).map(|list| list.value().clone())
    }

    /// Creates the mailing list for a course site. A `None` name means "use
    /// the suggested name"; an explicit name must already be normalized
    /// (trimmed, non-empty) by the caller.
    pub fn create(
        &self,
        course: &Course,
        name: Option<&str>,
        domain: &str,
    ) -> Result<MailingList, ListError> {
        let name = match name {
            Some(name) => validate_list_name(name)?,
            None => suggested_name(course),
        };

        if self.inner.lists.contains_key(&course.id) {
            return Err(ListError::AlreadyExists(course.id.clone()));
        }
        if self
            .inner
            .lists
            .iter()
            .any(|entry| entry.value().name == name)
        {
            return Err(ListError::NameTaken(name));
        }

        let list = MailingList {
            id: Uuid::new_v4().to_string(),
            canvas_site_id: course.id.clone(),
            name,
            domain: domain.to_string(),
            members_count: 0,
            created_at: Utc::now(),
            populated_at: None,
        };
        self.inner.members.insert(list.id.clone(), Vec::new());
        self.inner.lists.insert(course.id.clone(), list.clone());
        info!(site_id = %course.id, name = %list.name, "mailing list created");
        Ok(list)
    }

    /// All members of a list, soft-deleted ones included.
    pub fn members_of(&self, list_id: &str) -> Vec<MailingListMember> {
        self.inner
            .members
            .get(list_id)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    /// Records that a welcome message went out to a member. Used by the
    /// welcome-email sender; populate never touches `welcomed_at`.
    pub fn mark_welcomed(&self, list_id: &str, email: &str, at: DateTime<Utc>) -> bool {
        let Some(mut members) = self.inner.members.get_mut(list_id) else {
            return false;
        };
        match members
            .iter_mut()
            .find(|member| member.email_address == email)
        {
            Some(member) => {
                member.welcomed_at = Some(at);
                true
            }
            None => false,
        }
    }

    /// Reconciles a list's membership against the course roster.
    ///
    /// Roster entries are keyed by lowercased email. New addresses join,
    /// soft-deleted ones that reappear are restored, name changes are taken
    /// over, and active members missing from the roster are soft-deleted.
    /// Returns `None` when the site has no mailing list.
    pub fn populate(
        &self,
        site_id: &str,
        roster: &[RosterEntry],
    ) -> Option<(MailingList, PopulateSummary)> {
        let list_id = self.inner.lists.get(site_id)?.id.clone();
        let now = Utc::now();
        let mut summary = PopulateSummary::default();

        let active_count;
        {
            let mut members = self.inner.members.get_mut(&list_id)?;

            for entry in roster {
                let email = entry.email_address.to_ascii_lowercase();
                match members
                    .iter_mut()
                    .find(|member| member.email_address == email)
                {
                    Some(member) => {
                        let name_changed = member.first_name != entry.first_name
                            || member.last_name != entry.last_name;
                        if member.deleted_at.is_some() {
                            member.deleted_at = None;
                            member.first_name = entry.first_name.clone();
                            member.last_name = entry.last_name.clone();
                            summary.restored.push(email);
                        } else if name_changed {
                            member.first_name = entry.first_name.clone();
                            member.last_name = entry.last_name.clone();
                            summary.updated.push(email);
                        }
                    }
                    None => {
                        members.push(MailingListMember {
                            id: Uuid::new_v4().to_string(),
                            first_name: entry.first_name.clone(),
                            last_name: entry.last_name.clone(),
                            email_address: email.clone(),
                            welcomed_at: None,
                            deleted_at: None,
                        });
                        summary.added.push(email);
                    }
                }
            }

            for member in members.iter_mut() {
                if member.deleted_at.is_none()
                    && !roster.iter().any(|entry| {
                        entry.email_address.eq_ignore_ascii_case(&member.email_address)
                    })
                {
                    member.deleted_at = Some(now);
                    summary.removed.push(member.email_address.clone());
                }
            }

            active_count = members
                .iter()
                .filter(|member| member.deleted_at.is_none())
                .count();
        }

        let mut list = self.inner.lists.get_mut(site_id)?;
        list.members_count = active_count;
        list.populated_at = Some(now);
        debug!(
            site_id,
            added = summary.added.len(),
            restored = summary.restored.len(),
            updated = summary.updated.len(),
            removed = summary.removed.len(),
            "mailing list populated"
        );
        Some((list.clone(), summary))
    }
}

/// Suggested list name for a course: slug of the course name plus a term
/// suffix ("Fall 2026" becomes `-fa26`; term-less sites get `-list`).
pub fn suggested_name(course: &Course) -> String {
    let mut base = slugify(&course.name, SLUG_MAX);
    if base.is_empty() {
        base = slugify(&course.course_code, SLUG_MAX);
    }
    if base.is_empty() {
        base = String::from("course");
    }
    match course.term.as_deref().and_then(term_suffix) {
        Some(suffix) => format!("{base}-{suffix}"),
        None => format!("{base}-list"),
    }
}

fn validate_list_name(name: &str) -> Result<String, ListError> {
    if name.len() < 2 || name.len() > LIST_NAME_MAX || !LIST_NAME_RE.is_match(name) {
        return Err(ListError::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}

/// Lowercases and collapses every non-alphanumeric run into a single dash.
fn slugify(raw: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(raw.len().min(max_len));
    let mut pending_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= max_len {
            break;
        }
    }
    slug.truncate(max_len);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// "Fall 2026" -> "fa26", "Spring 2027" -> "sp27". `None` when the term
/// string has no recognizable season or year.
fn term_suffix(term: &str) -> Option<String> {
    let mut season = None;
    let mut year = None;
    for word in term.split_whitespace() {
        match word.to_ascii_lowercase().as_str() {
            "fall" | "autumn" => season = Some("fa"),
            "spring" => season = Some("sp"),
            "summer" => season = Some("su"),
            "winter" => season = Some("wi"),
            other => {
                if other.len() == 4 && other.chars().all(|c| c.is_ascii_digit()) {
                    year = Some(other[2..].to_string());
                }
            }
        }
    }
    Some(format!("{}{}", season?, year?))
}
