use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::Response;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::mailing_list::{MailingList, MailingListMember, PopulateSummary};

use super::error::ApiError;

pub const WELCOME_LOG_COLUMNS: [&str; 4] =
    ["Name", "Email address", "Message sent", "Current member"];

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mailing_lists: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateListRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateResponse {
    pub mailing_list: MailingList,
    pub summary: PopulateSummary,
}

/// Attachment filename for the welcome-email log of a site, stamped with the
/// local download time.
pub fn welcome_log_filename(site_id: &str, now: DateTime<Local>) -> String {
    let stamp = now.format("%Y-%m-%d_%H-%M-%S");
    format!("{}-welcome-messages-log-{stamp}.csv", sanitize_for_filename(site_id))
}

/// Renders the welcome-email log: one row per member, soft-deleted members
/// flagged `N` under "Current member", everyone else `Y`.
pub fn welcome_log_csv(members: &[MailingListMember]) -> String {
    let mut out = String::new();
    push_csv_row(&mut out, WELCOME_LOG_COLUMNS.iter().copied());
    for member in members {
        let message_sent = member
            .welcomed_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let current = if member.deleted_at.is_some() { "N" } else { "Y" };
        push_csv_row(
            &mut out,
            [
                member.full_name().as_str(),
                member.email_address.as_str(),
                message_sent.as_str(),
                current,
            ]
            .into_iter(),
        );
    }
    out
}

/// Wraps a CSV body as a downloadable attachment response.
pub fn csv_attachment(filename: &str, body: String) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|_| ApiError::Internal)?;
    Response::builder()
        .header(CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"))
        .header(CONTENT_DISPOSITION, disposition)
        .body(body.into())
        .map_err(|_| ApiError::Internal)
}

fn push_csv_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        push_csv_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_csv_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        for ch in field.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Site IDs are opaque strings; keep the attachment filename header-safe.
fn sanitize_for_filename(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::mailing_list::MailingListMember;

    use super::{sanitize_for_filename, welcome_log_csv};

    fn member(first: &str, last: &str, email: &str) -> MailingListMember {
        MailingListMember {
            id: String::from("m-1"),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email_address: email.to_string(),
            welcomed_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn csv_quotes_fields_with_commas_and_quotes() {
        let mut row = member("Jane \"JD\"", "Doe, Jr", "jane@test.edu");
        row.welcomed_at = Some(Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap());
        let csv = welcome_log_csv(&[row]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Name,Email address,Message sent,Current member")
        );
        assert_eq!(
            lines.next(),
            Some("\"Jane \"\"JD\"\" Doe, Jr\",jane@test.edu,2026-08-30 12:00:00,Y")
        );
    }

    #[test]
    fn csv_marks_deleted_members_as_not_current() {
        let mut gone = member("Jane", "Doe", "jane@test.edu");
        gone.deleted_at = Some(Utc::now());
        let active = member("Ada", "King", "ada@test.edu");
        let csv = welcome_log_csv(&[gone, active]);
        assert!(csv.contains("jane@test.edu,,N"));
        assert!(csv.contains("ada@test.edu,,Y"));
    }

    #[test]
    fn filenames_stay_header_safe() {
        assert_eq!(sanitize_for_filename("course 12/34"), "course-12-34");
        assert_eq!(sanitize_for_filename("1234"), "1234");
    }
}
