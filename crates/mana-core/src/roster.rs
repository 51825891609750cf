//! # Roster Management
//!
//! Registering participants (one at a time or from a roster file) and
//! seeding an assessment's workshop catalog.
//!
//! ## Roster Formats
//!
//! CSV with a header row:
//!
//! ```text
//! email,first_name,last_name,stakeholder_type,organization,province
//! amina@example.org,Amina,Usman,women_leader,Women's Cooperative,Sulu
//! ```
//!
//! `office_business_name` is accepted in place of `organization`. Quoted
//! fields may contain commas and line breaks; `""` inside quotes is a
//! literal quote.
//!
//! JSON: an array of objects with the same keys.
//!
//! Rows without an email, with an invalid email, or with an email already
//! registered in the assessment are skipped. Unknown stakeholder tokens
//! become `other`.

use crate::access::WorkshopAccessManager;
use crate::primitives::{MAX_ROSTER_ROWS, MAX_USERNAME_LENGTH};
use crate::records::{NewActivity, NewParticipant, Participant};
use crate::repository::Store;
use crate::sequence::WorkshopSequence;
use crate::{Actor, AssessmentId, ManaError, StakeholderType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A participant as entered by a facilitator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Email, used as the login name.
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub stakeholder_type: StakeholderType,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub province: Option<String>,
}

/// One roster line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterRow {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub stakeholder_type: String,
    pub organization: String,
    pub office_business_name: String,
    pub province: String,
}

impl RosterRow {
    fn into_registration(self) -> Registration {
        let full_name = format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string();
        let organization = if self.office_business_name.trim().is_empty() {
            self.organization.trim().to_string()
        } else {
            self.office_business_name.trim().to_string()
        };
        let province = self.province.trim();

        Registration {
            username: self.email.trim().to_string(),
            full_name: if full_name.is_empty() {
                "Participant".to_string()
            } else {
                full_name
            },
            stakeholder_type: StakeholderType::parse_or_other(&self.stakeholder_type),
            organization,
            province: (!province.is_empty()).then(|| province.to_string()),
        }
    }
}

/// Outcome of a roster import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub skipped: usize,
}

fn validate_username(username: &str) -> Result<(), ManaError> {
    if username.is_empty() {
        return Err(ManaError::InvalidInput("email is required".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ManaError::InvalidInput(format!(
            "email exceeds {} bytes",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username.contains('@') || username.chars().any(char::is_whitespace) {
        return Err(ManaError::InvalidInput(format!(
            "not an email address: {}",
            username
        )));
    }
    Ok(())
}

/// Register one participant at the opening stage.
///
/// # Errors
///
/// - `InvalidInput` for a missing or malformed email
/// - `Duplicate` if the email is already registered in the assessment
pub fn register_participant<S: Store + ?Sized>(
    store: &mut S,
    manager: &WorkshopAccessManager,
    registration: Registration,
    actor: &Actor,
) -> Result<Participant, ManaError> {
    let username = registration.username.trim().to_string();
    validate_username(&username)?;

    let participant = store.insert_participant(NewParticipant {
        assessment: manager.assessment(),
        username,
        full_name: registration.full_name.trim().to_string(),
        stakeholder_type: registration.stakeholder_type,
        organization: registration.organization,
        province: registration.province,
        created_by: actor.clone(),
        initial_stage: manager.sequence().first(),
    })?;

    debug!(participant = %participant.id, username = %participant.username, "participant registered");
    Ok(participant)
}

/// Register every new row; skip the rest.
///
/// Each row is its own insert, not one batch. A storage error part-way
/// through returns `Err` with the earlier rows already registered. Running
/// the same roster again is safe: registered emails are skipped, so a retry
/// creates only the rows that were missing.
pub fn import_roster<S: Store + ?Sized>(
    store: &mut S,
    manager: &WorkshopAccessManager,
    rows: Vec<RosterRow>,
    actor: &Actor,
) -> Result<ImportReport, ManaError> {
    if rows.len() > MAX_ROSTER_ROWS {
        return Err(ManaError::InvalidInput(format!(
            "roster has {} rows (max {})",
            rows.len(),
            MAX_ROSTER_ROWS
        )));
    }

    let mut report = ImportReport::default();
    for row in rows {
        let registration = row.into_registration();
        if validate_username(&registration.username).is_err()
            || store
                .find_participant(manager.assessment(), &registration.username)?
                .is_some()
        {
            report.skipped += 1;
            continue;
        }
        register_participant(store, manager, registration, actor)?;
        report.created += 1;
    }

    info!(
        assessment = %manager.assessment(),
        created = report.created,
        skipped = report.skipped,
        "roster imported"
    );
    Ok(report)
}

/// Parse and import a CSV roster.
pub fn import_roster_csv<S: Store + ?Sized>(
    store: &mut S,
    manager: &WorkshopAccessManager,
    text: &str,
    actor: &Actor,
) -> Result<ImportReport, ManaError> {
    import_roster(store, manager, parse_roster_csv(text)?, actor)
}

/// Parse and import a JSON roster (an array of row objects).
pub fn import_roster_json<S: Store + ?Sized>(
    store: &mut S,
    manager: &WorkshopAccessManager,
    text: &str,
    actor: &Actor,
) -> Result<ImportReport, ManaError> {
    let rows: Vec<RosterRow> = serde_json::from_str(text)
        .map_err(|e| ManaError::InvalidInput(format!("roster JSON: {}", e)))?;
    import_roster(store, manager, rows, actor)
}

/// Parse CSV roster text into rows.
///
/// Unknown columns are ignored; blank lines are skipped.
pub fn parse_roster_csv(text: &str) -> Result<Vec<RosterRow>, ManaError> {
    let mut records = split_csv_records(text.trim_start_matches('\u{feff}'))?.into_iter();

    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = header
        .into_iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();
    if !columns.iter().any(|c| c == "email") {
        return Err(ManaError::InvalidInput(
            "roster header has no email column".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in records {
        if rows.len() >= MAX_ROSTER_ROWS {
            return Err(ManaError::InvalidInput(format!(
                "roster exceeds {} rows",
                MAX_ROSTER_ROWS
            )));
        }
        let fields: BTreeMap<&str, String> =
            columns.iter().map(String::as_str).zip(record).collect();
        let field = |name: &str| fields.get(name).cloned().unwrap_or_default();

        rows.push(RosterRow {
            email: field("email"),
            first_name: field("first_name"),
            last_name: field("last_name"),
            stakeholder_type: field("stakeholder_type"),
            organization: field("organization"),
            office_business_name: field("office_business_name"),
            province: field("province"),
        });
    }
    Ok(rows)
}

/// Split CSV text into records, honouring double quotes.
///
/// A quoted field may span line breaks. `\r\n` and `\n` both end a record
/// outside quotes. Lines holding nothing but whitespace are dropped.
fn split_csv_records(text: &str) -> Result<Vec<Vec<String>>, ManaError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            (',', false) => fields.push(std::mem::take(&mut current)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => {
                line += 1;
                fields.push(std::mem::take(&mut current));
                push_record(&mut records, std::mem::take(&mut fields));
                record_line = line;
            }
            (c, _) => {
                if c == '\n' {
                    line += 1;
                }
                current.push(c);
            }
        }
    }
    if in_quotes {
        return Err(ManaError::InvalidInput(format!(
            "unterminated quote in roster record starting on line {}",
            record_line
        )));
    }
    fields.push(current);
    push_record(&mut records, fields);
    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, fields: Vec<String>) {
    let blank = matches!(fields.as_slice(), [only] if only.trim().is_empty());
    if !blank {
        records.push(fields);
    }
}

/// Create the catalog rows of `sequence` that the assessment lacks.
///
/// Returns the number of rows created.
pub fn seed_catalog<S: Store + ?Sized>(
    store: &mut S,
    assessment: AssessmentId,
    sequence: &WorkshopSequence,
) -> Result<usize, ManaError> {
    let mut created = 0;
    for workshop_type in sequence.iter() {
        if store.find_activity(assessment, workshop_type)?.is_some() {
            continue;
        }
        store.insert_activity(NewActivity::canonical(assessment, workshop_type))?;
        created += 1;
    }
    info!(assessment = %assessment, created, "workshop catalog seeded");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_maps_columns() {
        let text = "Email,First_Name,Last_Name,Stakeholder_Type,Office_Business_Name,Province\n\
                    amina@example.org,Amina,Usman,women_leader,Co-op,Sulu\n\
                    \n\
                    ,No,Email,farmer,,\n";
        let rows = parse_roster_csv(text).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].email, "amina@example.org");
        assert_eq!(rows[0].office_business_name, "Co-op");
        assert_eq!(rows[1].email, "");
    }

    #[test]
    fn csv_quotes_protect_commas() {
        let records = split_csv_records(r#"a@b.org,"Usman, Jr.","say ""hi""""#).expect("split");
        assert_eq!(records, vec![vec!["a@b.org", "Usman, Jr.", r#"say "hi""#]]);
        assert!(split_csv_records(r#""open"#).is_err());
    }

    #[test]
    fn csv_quoted_field_spans_lines() {
        let text = "email,first_name,organization\r\na@x.org,Amina,\"Line one\nLine two\"\r\nb@x.org,Bai,Solo\n";
        let rows = parse_roster_csv(text).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].organization, "Line one\nLine two");
        assert_eq!(rows[1].email, "b@x.org");
        assert_eq!(rows[1].organization, "Solo");

        let err = parse_roster_csv("email\nok@x.org\n\"never closed\n").expect_err("unterminated");
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn csv_without_email_column_rejected() {
        assert!(parse_roster_csv("name,province\nA,B\n").is_err());
        assert!(parse_roster_csv("").expect("empty").is_empty());
    }

    #[test]
    fn row_registration_defaults() {
        let registration = RosterRow {
            email: " p@example.org ".to_string(),
            stakeholder_type: "astronaut".to_string(),
            organization: "Org".to_string(),
            ..RosterRow::default()
        }
        .into_registration();
        assert_eq!(registration.username, "p@example.org");
        assert_eq!(registration.full_name, "Participant");
        assert_eq!(registration.stakeholder_type, StakeholderType::Other);
        assert_eq!(registration.organization, "Org");
        assert_eq!(registration.province, None);
    }

    #[test]
    fn username_validation() {
        assert!(validate_username("a@b.org").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("no-at-sign").is_err());
        assert!(validate_username("a b@c.org").is_err());
    }
}
