//! # Progression Scenario Tests (T0-T5)
//!
//! End-to-end scenarios over the public API, run against both stores
//! where the storage layer matters.
//!
//! ## Tiers
//! - T0: Access Rules
//! - T1: Cohort Advancement
//! - T2: Completion and Reset
//! - T3: Response Workflow
//! - T4: Onboarding and Roster
//! - T5: Synthesis Lifecycle

use mana_core::{
    AccessAction, Actor, LogRepository, ManaError, MemoryStore, NotificationKind,
    NotificationRepository, Participant, ParticipantRepository, RedbStore, Registration, ResponseFilter, ResponseService,
    ResponseStatus, SaveAction, StakeholderType, Store, WorkshopAccessManager, WorkshopSequence,
    WorkshopType, register_participant, seed_catalog,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn facilitator() -> Actor {
    Actor::new("facilitator@example.org")
}

/// Assessment with a seeded catalog and `size` registered participants.
fn cohort<S: Store + ?Sized>(
    store: &mut S,
    size: usize,
) -> (WorkshopAccessManager, Vec<Participant>) {
    let assessment = store.create_assessment("Cotabato 2026").expect("assessment");
    let manager = WorkshopAccessManager::new(assessment.id, WorkshopSequence::default());
    seed_catalog(store, assessment.id, manager.sequence()).expect("seed");

    let participants = (0..size)
        .map(|i| {
            register_participant(
                store,
                &manager,
                Registration {
                    username: format!("p{i}@example.org"),
                    full_name: format!("Participant {i}"),
                    stakeholder_type: StakeholderType::Farmer,
                    organization: String::new(),
                    province: Some(if i % 2 == 0 { "Maguindanao" } else { "Sulu" }.to_string()),
                },
                &facilitator(),
            )
            .expect("register")
        })
        .collect();
    (manager, participants)
}

fn reload<S: Store + ?Sized>(store: &S, participant: &Participant) -> Participant {
    store
        .get_participant(participant.id)
        .expect("get")
        .expect("exists")
}

fn answers(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

// =============================================================================
// TIER T0: ACCESS RULES
// =============================================================================

mod t0_access_rules {
    use super::*;

    /// T0.1: A fresh participant sees only the first stage.
    #[test]
    fn fresh_participant_sees_first_stage() {
        let mut store = MemoryStore::new();
        let (manager, participants) = cohort(&mut store, 1);
        let p = &participants[0];

        assert_eq!(manager.get_allowed_workshops(p), vec![WorkshopType::Workshop1]);
        assert_eq!(p.current_workshop, Some(WorkshopType::Workshop1));
        assert!(p.completed_workshops.is_empty());
        assert!(!p.can_access_dashboard());
    }

    /// T0.2: Completion does not widen access.
    #[test]
    fn completion_does_not_unlock_next() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];

        manager
            .mark_workshop_complete(&mut store, p, WorkshopType::Workshop1, None)
            .expect("complete");
        assert!(!manager.is_workshop_accessible(p, WorkshopType::Workshop2));
    }

    /// T0.3: A ceiling outside a shortened sequence falls back to the first stage.
    #[test]
    fn ceiling_outside_sequence_falls_back() {
        let mut store = MemoryStore::new();
        let (_, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        p.facilitator_advanced_to = Some(WorkshopType::Workshop4);

        let short = WorkshopAccessManager::new(p.assessment, WorkshopSequence::with_len(3));
        assert_eq!(short.get_allowed_workshops(p), vec![WorkshopType::Workshop1]);
    }
}

// =============================================================================
// TIER T1: COHORT ADVANCEMENT
// =============================================================================

mod t1_cohort_advancement {
    use super::*;

    fn three_participant_advance<S: Store + ?Sized>(store: &mut S) {
        let (manager, mut participants) = cohort(store, 3);
        manager
            .mark_workshop_complete(store, &mut participants[0], WorkshopType::Workshop1, None)
            .expect("complete");
        let logs_before = store.log_count().expect("count");

        let report = manager
            .advance_cohort(store, WorkshopType::Workshop2, &facilitator())
            .expect("advance");
        assert_eq!(report.advanced, 3);
        assert_eq!(report.moved, 1);

        let a = reload(&*store, &participants[0]);
        let b = reload(&*store, &participants[1]);
        let c = reload(&*store, &participants[2]);
        assert_eq!(a.current_workshop, Some(WorkshopType::Workshop2));
        assert_eq!(b.current_workshop, Some(WorkshopType::Workshop1));
        assert_eq!(c.current_workshop, Some(WorkshopType::Workshop1));
        for p in [&a, &b, &c] {
            assert_eq!(p.facilitator_advanced_to, Some(WorkshopType::Workshop2));
        }

        assert_eq!(store.log_count().expect("count"), logs_before + 3);
        for p in [&a, &b, &c] {
            let last = store.logs_of(p.id).expect("logs").pop().expect("entry");
            assert_eq!(last.action, AccessAction::Unlock);
            assert_eq!(last.workshop_type, WorkshopType::Workshop2);
            assert!(last.workshop.is_some());
            let meta = last.metadata.value();
            assert_eq!(meta["reason"], "facilitator_advance");
            assert_eq!(meta["bulk_advancement"], true);
            assert_eq!(meta["unlocked_by"], "facilitator@example.org");

            let notes = store.notifications_of(p.id).expect("notifications");
            assert_eq!(notes.len(), 1);
            assert_eq!(notes[0].kind, NotificationKind::WorkshopAdvanced);
            assert_eq!(notes[0].workshop, last.workshop);
            assert!(!notes[0].is_read);
        }
    }

    /// T1.1: Only participants who finished the previous stage move (memory).
    #[test]
    fn advance_moves_only_finishers_memory() {
        three_participant_advance(&mut MemoryStore::new());
    }

    /// T1.2: Same scenario on redb.
    #[test]
    fn advance_moves_only_finishers_redb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RedbStore::open(dir.path().join("mana.redb")).expect("open");
        three_participant_advance(&mut store);
    }

    /// T1.3: Advancing to the first stage moves everyone.
    #[test]
    fn advance_to_first_stage_moves_everyone() {
        let mut store = MemoryStore::new();
        let (manager, participants) = cohort(&mut store, 2);
        let count = manager
            .advance_all_participants(&mut store, WorkshopType::Workshop1, &facilitator())
            .expect("advance");
        assert_eq!(count, 2);
        for p in &participants {
            assert_eq!(
                reload(&store, p).current_workshop,
                Some(WorkshopType::Workshop1)
            );
        }
    }

    /// T1.4: An empty cohort reports zero and writes nothing.
    #[test]
    fn empty_cohort_advances_nobody() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 0);
        let report = manager
            .advance_cohort(&mut store, WorkshopType::Workshop3, &facilitator())
            .expect("advance");
        assert_eq!(report.advanced, 0);
        assert_eq!(store.log_count().expect("count"), 0);
    }

    fn backward_advance<S: Store + ?Sized>(store: &mut S) {
        let (manager, mut participants) = cohort(store, 2);
        manager
            .mark_workshop_complete(store, &mut participants[0], WorkshopType::Workshop1, None)
            .expect("complete");
        manager
            .advance_cohort(store, WorkshopType::Workshop2, &facilitator())
            .expect("advance");

        let report = manager
            .advance_cohort(store, WorkshopType::Workshop1, &facilitator())
            .expect("advance back");
        assert_eq!(report.advanced, 2);
        assert_eq!(report.moved, 1);

        for p in &participants {
            let stored = reload(&*store, p);
            assert_eq!(stored.facilitator_advanced_to, Some(WorkshopType::Workshop1));
            assert_eq!(stored.current_workshop, Some(WorkshopType::Workshop1));
            assert_eq!(manager.get_allowed_workshops(&stored), vec![WorkshopType::Workshop1]);
        }
        let finisher = reload(&*store, &participants[0]);
        assert_eq!(finisher.completed_workshops, vec![WorkshopType::Workshop1]);
        assert_eq!(store.notifications_of(finisher.id).expect("notifications").len(), 2);
    }

    /// T1.5: Moving the cohort back pulls everyone to the lowered ceiling (memory).
    #[test]
    fn backward_advance_lowers_position_memory() {
        backward_advance(&mut MemoryStore::new());
    }

    /// T1.6: Same scenario on redb.
    #[test]
    fn backward_advance_lowers_position_redb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RedbStore::open(dir.path().join("mana.redb")).expect("open");
        backward_advance(&mut store);
    }

    /// T1.7: A forward advance also pulls back a participant unlocked past it.
    #[test]
    fn advance_pulls_back_manual_unlock() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        manager
            .unlock_workshop(&mut store, p, WorkshopType::Workshop4, &facilitator())
            .expect("unlock");

        let report = manager
            .advance_cohort(&mut store, WorkshopType::Workshop2, &facilitator())
            .expect("advance");
        assert_eq!(report.moved, 1);
        assert_eq!(reload(&store, p).current_workshop, Some(WorkshopType::Workshop2));
    }

    /// T1.8: Stragglers catch up through the reconciliation pass.
    #[test]
    fn reconciliation_catches_up_stragglers() {
        let mut store = MemoryStore::new();
        let (manager, participants) = cohort(&mut store, 2);
        manager
            .advance_all_participants(&mut store, WorkshopType::Workshop3, &facilitator())
            .expect("advance");

        assert_eq!(manager.auto_unlock_due_workshops(&mut store).expect("pass"), 2);
        let p = reload(&store, &participants[0]);
        assert_eq!(p.current_workshop, Some(WorkshopType::Workshop3));
        let last = store.logs_of(p.id).expect("logs").pop().expect("entry");
        assert_eq!(last.metadata.value()["reason"], "scheduled_unlock");
        assert_eq!(last.metadata.value()["unlocked_by"], "system");
    }
}

// =============================================================================
// TIER T2: COMPLETION AND RESET
// =============================================================================

mod t2_completion_and_reset {
    use super::*;

    /// T2.1: Completion is idempotent and recorded once.
    #[test]
    fn completion_true_then_false() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        let meta = mana_core::JsonPayload::from_value(&json!({"note": "paper form"}));

        assert!(
            manager
                .mark_workshop_complete(&mut store, p, WorkshopType::Workshop1, Some(meta))
                .expect("first")
        );
        assert!(
            !manager
                .mark_workshop_complete(&mut store, p, WorkshopType::Workshop1, None)
                .expect("second")
        );

        let stored = reload(&store, p);
        assert_eq!(stored.completed_workshops, vec![WorkshopType::Workshop1]);
        let logs = store.logs_of(p.id).expect("logs");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AccessAction::Complete);
        assert_eq!(logs[0].metadata.value()["note"], "paper form");
    }

    /// T2.2: Reset clears completions from any state.
    #[test]
    fn reset_always_returns_to_first_stage() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        let actor = facilitator();

        manager
            .mark_workshop_complete(&mut store, p, WorkshopType::Workshop1, None)
            .expect("complete");
        manager
            .advance_all_participants(&mut store, WorkshopType::Workshop2, &actor)
            .expect("advance");
        *p = reload(&store, p);
        assert_eq!(p.current_workshop, Some(WorkshopType::Workshop2));

        assert!(manager.reset_participant_progress(&mut store, p, &actor).expect("reset"));
        assert!(manager.reset_participant_progress(&mut store, p, &actor).expect("again"));

        let stored = reload(&store, p);
        assert!(stored.completed_workshops.is_empty());
        assert_eq!(stored.current_workshop, Some(WorkshopType::Workshop1));
        assert_eq!(stored.facilitator_advanced_to, Some(WorkshopType::Workshop2));
        let last = store.logs_of(p.id).expect("logs").pop().expect("entry");
        assert_eq!(last.metadata.value()["reason"], "progress_reset");
        assert_eq!(last.metadata.value()["reset_by"], "facilitator@example.org");
    }

    /// T2.3: Cohort aggregate counts in sequence order.
    #[test]
    fn assessment_summary_counts() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 2);
        for stage in manager.sequence().iter() {
            manager
                .mark_workshop_complete(&mut store, &mut participants[0], stage, None)
                .expect("complete");
        }

        let summary = manager.get_assessment_progress_summary(&store).expect("summary");
        assert_eq!(summary.total_participants, 2);
        assert_eq!(summary.fully_completed, 1);
        assert_eq!(summary.by_workshop.len(), 5);
        assert_eq!(summary.by_workshop[0].workshop_type, WorkshopType::Workshop1);
        assert_eq!(summary.by_workshop[0].completed, 1);
        assert_eq!(summary.by_workshop[0].in_progress, 2);
        assert_eq!(summary.by_workshop[4].in_progress, 0);

        let p = reload(&store, &participants[0]);
        assert_eq!(manager.get_progress_summary(&p).completion_percentage, 100.0);
    }
}

// =============================================================================
// TIER T3: RESPONSE WORKFLOW
// =============================================================================

mod t3_response_workflow {
    use super::*;

    fn draft_then_submit<S: Store + ?Sized>(store: &mut S) {
        let (manager, mut participants) = cohort(store, 1);
        let p = &mut participants[0];
        let service = ResponseService::new(&manager);

        service.record_view(store, p, WorkshopType::Workshop1).expect("view");
        let draft = service
            .save(
                store,
                p,
                WorkshopType::Workshop1,
                &answers(&[("q1", json!("first thoughts"))]),
                SaveAction::Draft,
            )
            .expect("draft");
        assert_eq!(draft.status, ResponseStatus::Draft);
        assert!(!draft.completed);
        let draft_row = service
            .responses_for(&*store, p, WorkshopType::Workshop1)
            .expect("rows")
            .pop()
            .expect("row");

        let submit = service
            .save(
                store,
                p,
                WorkshopType::Workshop1,
                &answers(&[("q1", json!("final answer")), ("q2", json!(["a", "b"]))]),
                SaveAction::Submit,
            )
            .expect("submit");
        assert!(submit.completed);
        assert_eq!(submit.saved, 2);

        let rows = service
            .responses_for(&*store, p, WorkshopType::Workshop1)
            .expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].question_id, "q1");
        assert_eq!(rows[0].id, draft_row.id);
        assert_eq!(rows[0].created_at, draft_row.created_at);
        assert_eq!(rows[0].status, ResponseStatus::Submitted);
        assert_eq!(rows[0].response_data.value(), json!("final answer"));
        assert!(rows[0].submitted_at.is_some());

        assert!(p.has_completed(WorkshopType::Workshop1));
        assert_eq!(p.current_workshop, Some(WorkshopType::Workshop1));
        assert!(!manager.is_advanced_past(p, WorkshopType::Workshop1));

        let actions: Vec<AccessAction> = store
            .logs_of(p.id)
            .expect("logs")
            .into_iter()
            .map(|l| l.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                AccessAction::View,
                AccessAction::Update,
                AccessAction::Complete,
                AccessAction::Submit
            ]
        );

        let again = service.save(
            store,
            p,
            WorkshopType::Workshop1,
            &answers(&[("q1", json!("too late"))]),
            SaveAction::Draft,
        );
        assert!(matches!(again, Err(ManaError::AlreadySubmitted(WorkshopType::Workshop1))));
    }

    /// T3.1: Draft then submit keeps identity (memory).
    #[test]
    fn draft_then_submit_memory() {
        draft_then_submit(&mut MemoryStore::new());
    }

    /// T3.2: Draft then submit keeps identity (redb).
    #[test]
    fn draft_then_submit_redb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = RedbStore::open(dir.path().join("mana.redb")).expect("open");
        draft_then_submit(&mut store);
    }

    /// T3.3: Locked workshops reject views and saves without writing.
    #[test]
    fn locked_workshop_rejected() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        let service = ResponseService::new(&manager);

        assert!(matches!(
            service.record_view(&mut store, p, WorkshopType::Workshop2),
            Err(ManaError::WorkshopLocked(WorkshopType::Workshop2))
        ));
        assert!(matches!(
            service.save(
                &mut store,
                p,
                WorkshopType::Workshop2,
                &answers(&[("q1", json!("x"))]),
                SaveAction::Submit
            ),
            Err(ManaError::WorkshopLocked(_))
        ));
        assert_eq!(store.log_count().expect("count"), 0);
    }

    /// T3.4: Submitting with no answers is rejected and completes nothing.
    #[test]
    fn empty_submit_rejected() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        let service = ResponseService::new(&manager);

        let result = service.save(
            &mut store,
            p,
            WorkshopType::Workshop1,
            &BTreeMap::new(),
            SaveAction::Submit,
        );
        assert!(matches!(result, Err(ManaError::InvalidInput(_))));

        let stored = reload(&store, p);
        assert!(!stored.has_completed(WorkshopType::Workshop1));
        assert_eq!(store.log_count().expect("count"), 0);

        // An empty draft is still allowed and the workshop stays open.
        let draft = service
            .save(&mut store, p, WorkshopType::Workshop1, &BTreeMap::new(), SaveAction::Draft)
            .expect("draft");
        assert_eq!(draft.saved, 0);
        assert!(!draft.completed);
    }

    /// T3.5: Facilitator reads filter by province and track submissions.
    #[test]
    fn facilitator_reads_and_stats() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 3);
        let service = ResponseService::new(&manager);
        for p in participants.iter_mut().take(2) {
            service
                .save(
                    &mut store,
                    p,
                    WorkshopType::Workshop1,
                    &answers(&[("q1", json!("yes"))]),
                    SaveAction::Submit,
                )
                .expect("submit");
        }

        let sulu = ResponseFilter {
            province: Some("Sulu".to_string()),
            stakeholder_type: None,
        };
        let rows = service
            .responses_for_workshop(&store, WorkshopType::Workshop1, &sulu)
            .expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].participant, participants[1].id);

        let stats = manager
            .submission_stats(&store, WorkshopType::Workshop1)
            .expect("stats");
        assert_eq!(stats.total_participants, 3);
        assert_eq!(stats.submitted_participants, 2);
    }
}

// =============================================================================
// TIER T4: ONBOARDING AND ROSTER
// =============================================================================

mod t4_onboarding_and_roster {
    use super::*;
    use mana_core::{ProfileUpdate, complete_onboarding, import_roster_csv, import_roster_json};

    /// T4.1: Onboarding opens the dashboard once.
    #[test]
    fn onboarding_opens_dashboard() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        let update = ProfileUpdate {
            stakeholder_type: StakeholderType::YouthLeader,
            organization: "Youth Council".to_string(),
            province: Some("Basilan".to_string()),
            consent: true,
        };

        assert!(complete_onboarding(&mut store, &manager, p, update.clone()).expect("onboard"));
        let stored = reload(&store, p);
        assert!(stored.can_access_dashboard());
        assert!(stored.consent_date.is_some());
        assert_eq!(stored.province.as_deref(), Some("Basilan"));

        assert!(!complete_onboarding(&mut store, &manager, p, update).expect("again"));
        assert_eq!(reload(&store, p).consent_date, stored.consent_date);
    }

    /// T4.2: Onboarding without consent keeps the dashboard closed.
    #[test]
    fn onboarding_without_consent() {
        let mut store = MemoryStore::new();
        let (manager, mut participants) = cohort(&mut store, 1);
        let p = &mut participants[0];
        let update = ProfileUpdate {
            consent: false,
            ..ProfileUpdate::default()
        };
        assert!(complete_onboarding(&mut store, &manager, p, update).expect("onboard"));
        assert!(p.profile_completed);
        assert!(!p.can_access_dashboard());
    }

    /// T4.3: Duplicate registrations are rejected.
    #[test]
    fn duplicate_username_rejected() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 1);
        let result = register_participant(
            &mut store,
            &manager,
            Registration {
                username: "p0@example.org".to_string(),
                full_name: "Again".to_string(),
                stakeholder_type: StakeholderType::Other,
                organization: String::new(),
                province: None,
            },
            &facilitator(),
        );
        assert!(matches!(result, Err(ManaError::Duplicate { .. })));
    }

    /// T4.4: CSV import skips blanks and existing emails.
    #[test]
    fn csv_import_skips_known_rows() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 1);
        let csv = "email,first_name,last_name,stakeholder_type,office_business_name,province\n\
                   p0@example.org,Existing,User,farmer,,Sulu\n\
                   new@example.org,Noor,Hassan,religious_leader,\"Masjid, Jolo\",Sulu\n\
                   ,Blank,Email,elder,,\n";
        let report = import_roster_csv(&mut store, &manager, csv, &facilitator()).expect("import");
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 2);

        let noor = store
            .find_participant(manager.assessment(), "new@example.org")
            .expect("find")
            .expect("exists");
        assert_eq!(noor.full_name, "Noor Hassan");
        assert_eq!(noor.stakeholder_type, StakeholderType::ReligiousLeader);
        assert_eq!(noor.organization, "Masjid, Jolo");
        assert_eq!(noor.current_workshop, Some(WorkshopType::Workshop1));
        assert!(!noor.consent_given);
    }

    /// T4.5: JSON import behaves like CSV import.
    #[test]
    fn json_import() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 0);
        let rows = r#"[
            {"email": "a@example.org", "first_name": "A", "stakeholder_type": "unknown"},
            {"email": "a@example.org", "first_name": "A again"}
        ]"#;
        let report = import_roster_json(&mut store, &manager, rows, &facilitator()).expect("import");
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert!(import_roster_json(&mut store, &manager, "{", &facilitator()).is_err());
    }

    /// T4.6: Re-running a roster registers only the rows still missing.
    #[test]
    fn reimport_completes_partial_roster() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 0);
        let header = "email,first_name,province\n";
        let first = "a@example.org,A,Sulu\n";
        let rest = "b@example.org,B,Sulu\nc@example.org,C,Basilan\n";

        let partial =
            import_roster_csv(&mut store, &manager, &format!("{header}{first}"), &facilitator())
                .expect("partial");
        assert_eq!(partial.created, 1);

        let full = import_roster_csv(
            &mut store,
            &manager,
            &format!("{header}{first}{rest}"),
            &facilitator(),
        )
        .expect("full");
        assert_eq!(full.created, 2);
        assert_eq!(full.skipped, 1);
        assert_eq!(
            store.participants_in(manager.assessment()).expect("list").len(),
            3
        );
    }

    /// T4.7: Seeding the catalog twice creates nothing the second time.
    #[test]
    fn seed_catalog_is_idempotent() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 0);
        let created = seed_catalog(&mut store, manager.assessment(), &WorkshopSequence::extended())
            .expect("seed");
        assert_eq!(created, 1);
        assert_eq!(
            seed_catalog(&mut store, manager.assessment(), manager.sequence()).expect("again"),
            0
        );
    }
}

// =============================================================================
// TIER T5: SYNTHESIS LIFECYCLE
// =============================================================================

mod t5_synthesis {
    use super::*;
    use mana_core::{
        NO_SUBMISSIONS, ProviderError, SynthesisInput, SynthesisOutput, SynthesisProvider,
        SynthesisStatus, Synthesizer,
    };

    struct Echo;

    impl SynthesisProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn summarize(&self, input: &SynthesisInput) -> Result<SynthesisOutput, ProviderError> {
            Ok(SynthesisOutput {
                summary: format!("{} answers for {}", input.answers.len(), input.workshop_title),
                key_themes: vec!["access".to_string()],
            })
        }
    }

    struct Down;

    impl SynthesisProvider for Down {
        fn name(&self) -> &str {
            "down"
        }

        fn summarize(&self, _: &SynthesisInput) -> Result<SynthesisOutput, ProviderError> {
            Err(ProviderError("service unavailable".to_string()))
        }
    }

    fn submitted_cohort(store: &mut MemoryStore) -> WorkshopAccessManager {
        let (manager, mut participants) = cohort(store, 2);
        let service = ResponseService::new(&manager);
        service
            .save(
                store,
                &mut participants[0],
                WorkshopType::Workshop1,
                &answers(&[("q1", json!("roads")), ("q2", json!("schools"))]),
                SaveAction::Submit,
            )
            .expect("submit");
        service
            .save(
                store,
                &mut participants[1],
                WorkshopType::Workshop1,
                &answers(&[("q1", json!("draft only"))]),
                SaveAction::Draft,
            )
            .expect("draft");
        manager
    }

    /// T5.1: No submissions yields a failed record.
    #[test]
    fn no_submissions_fails() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 1);
        let record = Synthesizer::new(&manager)
            .synthesize(
                &mut store,
                &Echo,
                WorkshopType::Workshop1,
                ResponseFilter::default(),
                &facilitator(),
            )
            .expect("synthesize");
        assert_eq!(record.status, SynthesisStatus::Failed);
        assert_eq!(record.error_message, NO_SUBMISSIONS);
    }

    /// T5.2: Only submitted answers reach the provider; approval follows.
    #[test]
    fn completed_then_approved() {
        let mut store = MemoryStore::new();
        let manager = submitted_cohort(&mut store);
        let synthesizer = Synthesizer::new(&manager);

        let record = synthesizer
            .synthesize(
                &mut store,
                &Echo,
                WorkshopType::Workshop1,
                ResponseFilter::default(),
                &facilitator(),
            )
            .expect("synthesize");
        assert_eq!(record.status, SynthesisStatus::Completed);
        assert_eq!(record.response_count, 2);
        assert!(record.summary.starts_with("2 answers for Workshop 1"));
        assert_eq!(record.provider, "echo");

        let approved = synthesizer
            .approve(&mut store, record.id, &Actor::new("reviewer"))
            .expect("approve");
        assert_eq!(approved.status, SynthesisStatus::Approved);
        assert_eq!(approved.approved_by, Some(Actor::new("reviewer")));

        assert!(matches!(
            synthesizer.approve(&mut store, record.id, &Actor::new("reviewer")),
            Err(ManaError::InvalidInput(_))
        ));
    }

    /// T5.3: Provider errors are captured; regenerate keeps the filters.
    #[test]
    fn provider_failure_then_regenerate() {
        let mut store = MemoryStore::new();
        let manager = submitted_cohort(&mut store);
        let synthesizer = Synthesizer::new(&manager);
        let filters = ResponseFilter {
            province: Some("Maguindanao".to_string()),
            stakeholder_type: None,
        };

        let failed = synthesizer
            .synthesize(
                &mut store,
                &Down,
                WorkshopType::Workshop1,
                filters.clone(),
                &facilitator(),
            )
            .expect("synthesize");
        assert_eq!(failed.status, SynthesisStatus::Failed);
        assert_eq!(failed.error_message, "service unavailable");
        assert!(synthesizer.approve(&mut store, failed.id, &facilitator()).is_err());

        let retried = synthesizer
            .regenerate(&mut store, &Echo, failed.id, &facilitator())
            .expect("regenerate");
        assert_ne!(retried.id, failed.id);
        assert_eq!(retried.filters, filters);
        assert_eq!(retried.status, SynthesisStatus::Completed);
    }

    /// T5.4: Unknown workshops and records are NotFound.
    #[test]
    fn missing_entities() {
        let mut store = MemoryStore::new();
        let (manager, _) = cohort(&mut store, 1);
        let synthesizer = Synthesizer::new(&manager);
        assert!(matches!(
            synthesizer.synthesize(
                &mut store,
                &Echo,
                WorkshopType::Workshop6,
                ResponseFilter::default(),
                &facilitator()
            ),
            Err(ManaError::NotFound { .. })
        ));
        assert!(matches!(
            synthesizer.approve(&mut store, mana_core::SynthesisId(99), &facilitator()),
            Err(ManaError::NotFound { .. })
        ));
    }
}
