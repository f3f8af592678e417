//! Course-system (LMS) client: course lookup, enrollment roles, and rosters.
//!
//! The portal's course data lives in an external Canvas-style LMS. Everything
//! this service needs from it goes through the [`CourseApi`] trait so the HTTP
//! layer can be tested against a stub; [`CanvasClient`] is the real
//! implementation over the LMS REST API.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// A course site in the external LMS.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub course_code: String,
    /// Term display name, e.g. "Fall 2026". Absent for term-less sites.
    pub term: Option<String>,
}

/// Enrollment role of a user on a course site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseRole {
    Teacher,
    Ta,
    LeadTa,
    Reader,
    Student,
    Observer,
}

impl CourseRole {
    /// Maps LMS enrollment type / custom role strings to a role.
    pub fn from_enrollment(raw: &str) -> Option<Self> {
        match raw {
            "TeacherEnrollment" => Some(Self::Teacher),
            "TaEnrollment" => Some(Self::Ta),
            "Lead TA" => Some(Self::LeadTa),
            "Reader" => Some(Self::Reader),
            "StudentEnrollment" => Some(Self::Student),
            "ObserverEnrollment" => Some(Self::Observer),
            _ => None,
        }
    }

    /// Roles allowed to manage a course mailing list.
    pub fn can_manage_mailing_lists(self) -> bool {
        matches!(
            self,
            Self::Teacher | Self::Ta | Self::LeadTa | Self::Reader
        )
    }
}

/// One roster row used to populate a mailing list.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("course system request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Read access to the external course system.
#[async_trait]
pub trait CourseApi: Send + Sync {
    /// Looks up a course site by its opaque ID. `None` if the site does not exist.
    async fn get_course(&self, site_id: &str) -> Result<Option<Course>, CanvasError>;

    /// The caller's role on the given site, `None` when not enrolled.
    async fn get_user_role(
        &self,
        site_id: &str,
        uid: &str,
    ) -> Result<Option<CourseRole>, CanvasError>;

    /// Active roster of the site, without entries that lack an email address.
    async fn get_roster(&self, site_id: &str) -> Result<Vec<RosterEntry>, CanvasError>;
}

/// LMS REST client authenticated with a service token.
#[derive(Debug, Clone)]
pub struct CanvasClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl CanvasClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
    }
}

#[derive(Debug, Deserialize)]
struct WireCourse {
    name: String,
    course_code: String,
    #[serde(default)]
    term: Option<WireTerm>,
}

#[derive(Debug, Deserialize)]
struct WireTerm {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireEnrollment {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sortable_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[async_trait]
impl CourseApi for CanvasClient {
    async fn get_course(&self, site_id: &str) -> Result<Option<Course>, CanvasError> {
        let response = self.get(&format!("/api/v1/courses/{site_id}")).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let wire: WireCourse = response.error_for_status()?.json().await?;
        Ok(Some(Course {
            id: site_id.to_string(),
            name: wire.name,
            course_code: wire.course_code,
            term: wire.term.map(|term| term.name),
        }))
    }

    async fn get_user_role(
        &self,
        site_id: &str,
        uid: &str,
    ) -> Result<Option<CourseRole>, CanvasError> {
        let response = self
            .get(&format!("/api/v1/courses/{site_id}/enrollments"))
            .query(&[("user_id", uid), ("state[]", "active")])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let enrollments: Vec<WireEnrollment> = response.error_for_status()?.json().await?;

        // Custom roles ("Lead TA", "Reader") ride in `role`; base enrollments
        // only carry `type`.
        let role = enrollments.iter().find_map(|enrollment| {
            enrollment
                .role
                .as_deref()
                .and_then(CourseRole::from_enrollment)
                .or_else(|| CourseRole::from_enrollment(&enrollment.kind))
        });
        Ok(role)
    }

    async fn get_roster(&self, site_id: &str) -> Result<Vec<RosterEntry>, CanvasError> {
        let response = self
            .get(&format!("/api/v1/courses/{site_id}/users"))
            .query(&[
                ("enrollment_state[]", "active"),
                ("per_page", "200"),
            ])
            .send()
            .await?;
        let users: Vec<WireUser> = response.error_for_status()?.json().await?;

        let mut roster = Vec::with_capacity(users.len());
        for user in users {
            let Some(email) = user.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
            else {
                debug!(site_id, "skipping roster user without email");
                continue;
            };
            let (first_name, last_name) =
                split_name(user.sortable_name.as_deref(), user.name.as_deref());
            roster.push(RosterEntry {
                first_name,
                last_name,
                email_address: email.to_ascii_lowercase(),
            });
        }
        Ok(roster)
    }
}

/// Splits a user's name into (first, last). Prefers the LMS `sortable_name`
/// ("Last, First"); falls back to splitting the display name on its final space.
pub(crate) fn split_name(sortable: Option<&str>, display: Option<&str>) -> (String, String) {
    if let Some((last, first)) = sortable.and_then(|name| name.split_once(',')) {
        return (first.trim().to_string(), last.trim().to_string());
    }
    match display.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => match name.rsplit_once(' ') {
            Some((first, last)) => (first.trim().to_string(), last.to_string()),
            None => (name.to_string(), String::new()),
        },
        None => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::{split_name, CourseRole};

    #[test]
    fn role_mapping_covers_custom_roles() {
        assert_eq!(
            CourseRole::from_enrollment("TeacherEnrollment"),
            Some(CourseRole::Teacher)
        );
        assert_eq!(CourseRole::from_enrollment("Lead TA"), Some(CourseRole::LeadTa));
        assert_eq!(CourseRole::from_enrollment("Reader"), Some(CourseRole::Reader));
        assert_eq!(CourseRole::from_enrollment("DesignerEnrollment"), None);
    }

    #[test]
    fn mailing_list_roles_exclude_students_and_observers() {
        assert!(CourseRole::Teacher.can_manage_mailing_lists());
        assert!(CourseRole::Ta.can_manage_mailing_lists());
        assert!(CourseRole::LeadTa.can_manage_mailing_lists());
        assert!(CourseRole::Reader.can_manage_mailing_lists());
        assert!(!CourseRole::Student.can_manage_mailing_lists());
        assert!(!CourseRole::Observer.can_manage_mailing_lists());
    }

    #[test]
    fn split_name_prefers_sortable_name() {
        assert_eq!(
            split_name(Some("Doe, Jane"), Some("Jane Doe")),
            (String::from("Jane"), String::from("Doe"))
        );
    }

    #[test]
    fn split_name_falls_back_to_display_name() {
        assert_eq!(
            split_name(None, Some("Jane van Dyke")),
            (String::from("Jane van"), String::from("Dyke"))
        );
        assert_eq!(
            split_name(None, Some("Prince")),
            (String::from("Prince"), String::new())
        );
        assert_eq!(split_name(None, None), (String::new(), String::new()));
    }
}
