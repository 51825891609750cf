//! # CLI Command Implementations
//!
//! Every command opens the configured workspace, runs one engine operation
//! and, for the file backend, saves the snapshot afterwards.

use crate::api::{self, AppState};
use crate::config::ManaConfig;
use mana_core::{
    Actor, AssessmentId, ManaError, Participant, ParticipantId, Registration, Store,
    WorkshopAccessManager, WorkshopType, Workspace, import_roster_csv, import_roster_json,
    register_participant, seed_catalog,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum roster file size (16 MB).
const MAX_ROSTER_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Resolve a roster path and check that it is a regular file within limits.
fn validate_roster_path(path: &Path) -> Result<PathBuf, ManaError> {
    let canonical = path.canonicalize().map_err(|e| {
        ManaError::Io(format!("invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(ManaError::Io(format!(
            "path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| ManaError::Io(format!("cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_ROSTER_FILE_SIZE {
        return Err(ManaError::InvalidInput(format!(
            "file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_ROSTER_FILE_SIZE
        )));
    }
    Ok(canonical)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the workspace the configuration points at.
pub fn open_workspace(config: &ManaConfig) -> Result<Workspace, ManaError> {
    config.storage.open(config.workshops.sequence())
}

fn assessment_manager(
    workspace: &Workspace,
    id: u64,
) -> Result<WorkshopAccessManager, ManaError> {
    let assessment = AssessmentId(id);
    if workspace.store().get_assessment(assessment)?.is_none() {
        return Err(ManaError::NotFound {
            kind: "assessment",
            id: id.to_string(),
        });
    }
    Ok(workspace.access(assessment))
}

fn load_participant(store: &dyn Store, id: u64) -> Result<Participant, ManaError> {
    store
        .get_participant(ParticipantId(id))?
        .ok_or_else(|| ManaError::NotFound {
            kind: "participant",
            id: id.to_string(),
        })
}

fn print_json(value: &impl Serialize) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print a yes/no outcome of a command that may be a no-op.
fn report_changed(json_mode: bool, changed: bool, message: &str) {
    if json_mode {
        print_json(&serde_json::json!({ "changed": changed }));
    } else if changed {
        println!("{}", message);
    } else {
        println!("No change.");
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &ManaConfig) -> Result<(), ManaError> {
    let workspace = open_workspace(config)?;

    println!("MANA Workshop Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {:?}", config.storage.backend);
    println!("  Database: {:?}", config.storage.path);
    println!("  Stages:   {}", config.workshops.stages);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::persisted(workspace, config.storage.clone());
    api::run_server(state, &config.server).await
}

// =============================================================================
// ASSESSMENT COMMANDS
// =============================================================================

/// Create an assessment with its workshop catalog.
pub fn cmd_init(config: &ManaConfig, json_mode: bool, title: &str) -> Result<(), ManaError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ManaError::InvalidInput("title is required".to_string()));
    }

    let mut workspace = open_workspace(config)?;
    let sequence = workspace.sequence().clone();
    let store = workspace.store_mut();
    let assessment = store.create_assessment(title)?;
    let seeded = seed_catalog(store, assessment.id, &sequence)?;
    config.storage.persist(&workspace)?;

    if json_mode {
        print_json(&serde_json::json!({
            "assessment": assessment,
            "workshops": seeded,
        }));
    } else {
        println!(
            "Created assessment {} \"{}\" with {} workshops at {:?}",
            assessment.id, assessment.title, seeded, config.storage.path
        );
    }
    Ok(())
}

/// List assessments.
pub fn cmd_assessments(config: &ManaConfig, json_mode: bool) -> Result<(), ManaError> {
    let workspace = open_workspace(config)?;
    let assessments = workspace.store().list_assessments()?;

    if json_mode {
        print_json(&assessments);
        return Ok(());
    }

    println!("MANA Assessments");
    println!("================");
    println!("Database: {:?}", config.storage.path);
    println!();
    if assessments.is_empty() {
        println!("(none; create one with `mana init`)");
    }
    for assessment in assessments {
        let participants = workspace.store().participants_in(assessment.id)?.len();
        println!(
            "{:>4}  {}  ({} participants)",
            assessment.id, assessment.title, participants
        );
    }
    Ok(())
}

/// Cohort progress for one assessment.
pub fn cmd_summary(config: &ManaConfig, json_mode: bool, assessment: u64) -> Result<(), ManaError> {
    let workspace = open_workspace(config)?;
    let manager = assessment_manager(&workspace, assessment)?;
    let summary = manager.get_assessment_progress_summary(workspace.store())?;

    if json_mode {
        print_json(&summary);
        return Ok(());
    }

    println!("Assessment {} Progress", assessment);
    println!("=======================");
    println!("Participants:     {}", summary.total_participants);
    println!("Fully completed:  {}", summary.fully_completed);
    println!();
    println!("{:<12} {:>10} {:>12}", "Workshop", "Completed", "In progress");
    for row in &summary.by_workshop {
        println!(
            "{:<12} {:>10} {:>12}",
            row.workshop_type.as_str(),
            row.completed,
            row.in_progress
        );
    }
    Ok(())
}

// =============================================================================
// ROSTER COMMANDS
// =============================================================================

/// Register one participant.
pub fn cmd_register(
    config: &ManaConfig,
    json_mode: bool,
    assessment: u64,
    registration: Registration,
) -> Result<(), ManaError> {
    let mut workspace = open_workspace(config)?;
    let manager = assessment_manager(&workspace, assessment)?;
    let participant = register_participant(
        workspace.store_mut(),
        &manager,
        registration,
        &Actor::new("cli"),
    )?;
    config.storage.persist(&workspace)?;

    if json_mode {
        print_json(&participant);
    } else {
        println!(
            "Registered participant {} ({})",
            participant.id, participant.username
        );
    }
    Ok(())
}

/// Import a roster file.
pub fn cmd_import(
    config: &ManaConfig,
    json_mode: bool,
    assessment: u64,
    input: &Path,
    format: Option<&str>,
) -> Result<(), ManaError> {
    let path = validate_roster_path(input)?;
    let format = match format {
        Some(format) => format.to_ascii_lowercase(),
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("csv")
            .to_ascii_lowercase(),
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ManaError::Io(format!("cannot read roster: {}", e)))?;

    let mut workspace = open_workspace(config)?;
    let manager = assessment_manager(&workspace, assessment)?;
    let actor = Actor::new("cli");
    let report = match format.as_str() {
        "csv" => import_roster_csv(workspace.store_mut(), &manager, &content, &actor)?,
        "json" => import_roster_json(workspace.store_mut(), &manager, &content, &actor)?,
        other => {
            return Err(ManaError::InvalidInput(format!(
                "unknown roster format '{}' (expected csv or json)",
                other
            )));
        }
    };
    config.storage.persist(&workspace)?;

    if json_mode {
        print_json(&report);
    } else {
        println!(
            "Imported roster: {} created, {} skipped",
            report.created, report.skipped
        );
    }
    Ok(())
}

// =============================================================================
// PROGRESSION COMMANDS
// =============================================================================

/// Advance the whole cohort.
pub fn cmd_advance(
    config: &ManaConfig,
    json_mode: bool,
    assessment: u64,
    workshop: &str,
    actor: &str,
) -> Result<(), ManaError> {
    let mut workspace = open_workspace(config)?;
    let manager = assessment_manager(&workspace, assessment)?;

    let report = match WorkshopType::parse(workshop) {
        Some(workshop_type) => {
            manager.advance_cohort(workspace.store_mut(), workshop_type, &Actor::new(actor))?
        }
        None => mana_core::AdvanceReport::default(),
    };
    if report.advanced > 0 {
        config.storage.persist(&workspace)?;
    }

    if json_mode {
        print_json(&report);
    } else if report.advanced == 0 {
        println!("No change: '{}' is not a stage of this assessment or the cohort is empty.", workshop);
    } else {
        println!(
            "Advanced {} participants to {} ({} moved)",
            report.advanced, workshop, report.moved
        );
    }
    Ok(())
}

/// Reconciliation pass.
pub fn cmd_reconcile(
    config: &ManaConfig,
    json_mode: bool,
    assessment: u64,
) -> Result<(), ManaError> {
    let mut workspace = open_workspace(config)?;
    let manager = assessment_manager(&workspace, assessment)?;
    let unlocked = manager.auto_unlock_due_workshops(workspace.store_mut())?;
    if unlocked > 0 {
        config.storage.persist(&workspace)?;
    }

    if json_mode {
        print_json(&serde_json::json!({ "unlocked": unlocked }));
    } else {
        println!("Moved {} participants up to the cohort ceiling", unlocked);
    }
    Ok(())
}

pub fn cmd_complete(
    config: &ManaConfig,
    json_mode: bool,
    participant: u64,
    workshop: &str,
) -> Result<(), ManaError> {
    let mut workspace = open_workspace(config)?;
    let mut participant = load_participant(workspace.store(), participant)?;
    let manager = workspace.access(participant.assessment);

    let changed = match WorkshopType::parse(workshop) {
        Some(workshop_type) => manager.mark_workshop_complete(
            workspace.store_mut(),
            &mut participant,
            workshop_type,
            None,
        )?,
        None => false,
    };
    if changed {
        config.storage.persist(&workspace)?;
    }
    report_changed(json_mode, changed, &format!("Marked {} complete", workshop));
    Ok(())
}

pub fn cmd_unlock(
    config: &ManaConfig,
    json_mode: bool,
    participant: u64,
    workshop: &str,
    actor: &str,
) -> Result<(), ManaError> {
    let mut workspace = open_workspace(config)?;
    let mut participant = load_participant(workspace.store(), participant)?;
    let manager = workspace.access(participant.assessment);

    let changed = match WorkshopType::parse(workshop) {
        Some(workshop_type) => manager.unlock_workshop(
            workspace.store_mut(),
            &mut participant,
            workshop_type,
            &Actor::new(actor),
        )?,
        None => false,
    };
    if changed {
        config.storage.persist(&workspace)?;
    }
    report_changed(json_mode, changed, &format!("Unlocked {}", workshop));
    Ok(())
}

pub fn cmd_reset(
    config: &ManaConfig,
    json_mode: bool,
    participant: u64,
    actor: &str,
) -> Result<(), ManaError> {
    let mut workspace = open_workspace(config)?;
    let mut participant = load_participant(workspace.store(), participant)?;
    let manager = workspace.access(participant.assessment);

    let changed =
        manager.reset_participant_progress(workspace.store_mut(), &mut participant, &Actor::new(actor))?;
    config.storage.persist(&workspace)?;
    report_changed(json_mode, changed, "Progress reset to the first workshop");
    Ok(())
}

// =============================================================================
// PARTICIPANT READS
// =============================================================================

pub fn cmd_progress(
    config: &ManaConfig,
    json_mode: bool,
    participant: u64,
) -> Result<(), ManaError> {
    let workspace = open_workspace(config)?;
    let participant = load_participant(workspace.store(), participant)?;
    let manager = workspace.access(participant.assessment);
    let summary = manager.get_progress_summary(&participant);
    let navigation = manager.workshop_navigation(workspace.store(), &participant)?;

    if json_mode {
        print_json(&serde_json::json!({
            "participant": participant.id,
            "summary": summary,
            "allowed_workshops": manager.get_allowed_workshops(&participant),
            "navigation": navigation,
        }));
        return Ok(());
    }

    println!("{} <{}>", participant.full_name, participant.username);
    println!(
        "Completed {}/{} ({}%)",
        summary.completed_count, summary.total_workshops, summary.completion_percentage
    );
    println!("Current:   {}", summary.current_workshop);
    if let Some(next) = summary.next_workshop {
        println!("Next:      {}", next);
    }
    println!();
    for item in navigation {
        let marker = match (item.completed, item.accessible) {
            (true, _) => "done",
            (false, true) => "open",
            (false, false) => "locked",
        };
        let current = if item.is_current { " <- current" } else { "" };
        println!("  [{:<6}] {}{}", marker, item.title, current);
    }
    Ok(())
}

pub fn cmd_logs(config: &ManaConfig, json_mode: bool, participant: u64) -> Result<(), ManaError> {
    let workspace = open_workspace(config)?;
    let participant = load_participant(workspace.store(), participant)?;
    let store = workspace.store();
    let entries = store.logs_of(participant.id)?;

    if json_mode {
        print_json(&entries);
        return Ok(());
    }

    for entry in entries {
        let title = store
            .find_activity(participant.assessment, entry.workshop_type)?
            .map_or_else(|| entry.workshop_type.to_string(), |a| a.title);
        println!(
            "{}  {:<8} {}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            title,
            entry.metadata.as_str()
        );
    }
    Ok(())
}
