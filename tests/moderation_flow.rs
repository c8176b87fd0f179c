use civicfix_core::capabilities::{StorageKey, StorageOutput};
use civicfix_core::model::{
    Coordinate, Location, Report, ReportId, ReportStatus, ReportType, Secret, UnixTimeMs, UserId,
    UserRecord, UserRole, WithdrawalReason,
};
use civicfix_core::{App, Effect, Event, Model};
use crux_core::testing::AppTester;
use crux_core::App as _;

fn record(id: &str, email: &str, role: UserRole) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        name: id.to_uppercase(),
        email: email.into(),
        role,
        password: Secret::new("pw"),
    }
}

fn report(id: &str, user: &str, status: ReportStatus) -> Report {
    Report {
        id: ReportId::new(id),
        user_id: UserId::new(user),
        report_type: ReportType::StreetLight,
        description: format!("street light out near {id}"),
        location: Location::from_coordinate(Coordinate::new(43.65, -79.38).unwrap()),
        status,
        images: vec![],
        created_at: UnixTimeMs(1_000),
        updated_at: UnixTimeMs(1_000),
        withdrawal: None,
    }
}

/// Seed the model by replaying shell load responses, the same path real
/// hydration takes.
fn seed(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    users: &[UserRecord],
    reports: &[Report],
) {
    for (key, bytes) in [
        (StorageKey::Users, serde_json::to_vec(users).unwrap()),
        (StorageKey::Reports, serde_json::to_vec(reports).unwrap()),
    ] {
        app.update(
            Event::StorageLoaded {
                key,
                result: Ok(StorageOutput::Loaded(Some(bytes))),
            },
            model,
        );
    }
}

fn login(app: &AppTester<App, Effect>, model: &mut Model, email: &str, role_hint: UserRole) {
    app.update(
        Event::LoginRequested {
            email: email.into(),
            password: Secret::new("pw"),
            role_hint,
        },
        model,
    );
}

fn find<'a>(model: &'a Model, id: &str) -> &'a Report {
    model
        .reports
        .get(&ReportId::new(id))
        .expect("seeded report")
}

#[test]
fn admin_marks_a_report_as_duplicate() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    seed(
        &app,
        &mut model,
        &[record("admin", "admin@city.gov", UserRole::Admin)],
        &[
            report("r1", "u1", ReportStatus::Pending),
            report("r2", "u2", ReportStatus::InProgress),
        ],
    );
    login(&app, &mut model, "admin@city.gov", UserRole::Admin);
    assert!(App.view(&model).is_admin);

    let update = app.update(
        Event::MarkDuplicateRequested {
            id: ReportId::new("r1"),
            original_id: ReportId::new("r2"),
        },
        &mut model,
    );
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Storage(_))));

    let r1 = find(&model, "r1");
    assert_eq!(r1.status, ReportStatus::Withdrawn);
    assert_eq!(
        r1.withdrawal,
        Some(WithdrawalReason::Duplicate {
            original: ReportId::new("r2")
        })
    );
    // The original is untouched.
    assert_eq!(find(&model, "r2").status, ReportStatus::InProgress);

    let view = App.view(&model);
    assert_eq!(view.active_toast.unwrap().title, "Report Marked as Duplicate");
    let r1_item = view.reports.iter().find(|r| r.id == "r1").unwrap();
    assert!(r1_item.is_duplicate);
    assert_eq!(r1_item.original_report_id.as_deref(), Some("r2"));
}

#[test]
fn duplicate_links_never_chain() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    seed(
        &app,
        &mut model,
        &[record("admin", "admin@city.gov", UserRole::Admin)],
        &[
            report("r1", "u1", ReportStatus::Pending),
            report("r2", "u2", ReportStatus::Pending),
            report("r3", "u3", ReportStatus::Pending),
        ],
    );
    login(&app, &mut model, "admin@city.gov", UserRole::Admin);

    // Self-links are rejected outright.
    app.update(
        Event::MarkDuplicateRequested {
            id: ReportId::new("r1"),
            original_id: ReportId::new("r1"),
        },
        &mut model,
    );
    assert_eq!(App.view(&model).active_toast.unwrap().title, "Operation Failed");
    assert_eq!(find(&model, "r1").status, ReportStatus::Pending);

    app.update(
        Event::MarkDuplicateRequested {
            id: ReportId::new("r1"),
            original_id: ReportId::new("r2"),
        },
        &mut model,
    );
    assert_eq!(find(&model, "r1").status, ReportStatus::Withdrawn);

    // r1 is itself a duplicate now, so it cannot serve as an original.
    app.update(
        Event::MarkDuplicateRequested {
            id: ReportId::new("r3"),
            original_id: ReportId::new("r1"),
        },
        &mut model,
    );
    assert_eq!(App.view(&model).active_toast.unwrap().title, "Operation Failed");
    assert_eq!(find(&model, "r3").status, ReportStatus::Pending);
}

#[test]
fn admin_marks_a_report_as_false() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    seed(
        &app,
        &mut model,
        &[record("admin", "admin@city.gov", UserRole::Admin)],
        &[report("r1", "u1", ReportStatus::Resolved)],
    );
    login(&app, &mut model, "admin@city.gov", UserRole::Admin);

    app.update(
        Event::MarkFalseRequested {
            id: ReportId::new("r1"),
        },
        &mut model,
    );

    let r1 = find(&model, "r1");
    assert_eq!(r1.status, ReportStatus::Withdrawn);
    assert_eq!(r1.withdrawal, Some(WithdrawalReason::FalseReport));
    assert_eq!(
        App.view(&model).active_toast.unwrap().title,
        "Report Marked as False"
    );

    // Withdrawn is terminal even for admins.
    app.update(
        Event::SetStatusRequested {
            id: ReportId::new("r1"),
            status: ReportStatus::Pending,
        },
        &mut model,
    );
    assert_eq!(find(&model, "r1").status, ReportStatus::Withdrawn);
    assert_eq!(
        App.view(&model).active_toast.unwrap().title,
        "Status Update Failed"
    );
}

#[test]
fn citizens_cannot_moderate_or_change_status() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    seed(
        &app,
        &mut model,
        &[record("u1", "u1@example.com", UserRole::Citizen)],
        &[
            report("r1", "u1", ReportStatus::Pending),
            report("r2", "u2", ReportStatus::Pending),
        ],
    );
    login(&app, &mut model, "u1@example.com", UserRole::Citizen);

    app.update(
        Event::MarkFalseRequested {
            id: ReportId::new("r2"),
        },
        &mut model,
    );
    assert_eq!(App.view(&model).active_toast.unwrap().title, "Operation Failed");
    assert_eq!(find(&model, "r2").status, ReportStatus::Pending);

    // Status changes are admin-only, even on the citizen's own report.
    app.update(
        Event::SetStatusRequested {
            id: ReportId::new("r1"),
            status: ReportStatus::Resolved,
        },
        &mut model,
    );
    assert_eq!(find(&model, "r1").status, ReportStatus::Pending);
    assert_eq!(
        App.view(&model).active_toast.unwrap().title,
        "Status Update Failed"
    );
}

#[test]
fn admin_drives_the_status_lifecycle() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    seed(
        &app,
        &mut model,
        &[record("admin", "admin@city.gov", UserRole::Admin)],
        &[report("r1", "u1", ReportStatus::Pending)],
    );
    login(&app, &mut model, "admin@city.gov", UserRole::Admin);

    for (status, expected) in [
        (ReportStatus::InProgress, ReportStatus::InProgress),
        (ReportStatus::Resolved, ReportStatus::Resolved),
        // Resolved can be reopened.
        (ReportStatus::Pending, ReportStatus::Pending),
    ] {
        app.update(
            Event::SetStatusRequested {
                id: ReportId::new("r1"),
                status,
            },
            &mut model,
        );
        assert_eq!(find(&model, "r1").status, expected);
    }

    // Withdrawn is never reachable through a plain status change.
    app.update(
        Event::SetStatusRequested {
            id: ReportId::new("r1"),
            status: ReportStatus::Withdrawn,
        },
        &mut model,
    );
    assert_eq!(find(&model, "r1").status, ReportStatus::Pending);
}

#[test]
fn admin_role_hint_against_citizen_record_is_rejected() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    seed(
        &app,
        &mut model,
        &[record("u1", "u1@example.com", UserRole::Citizen)],
        &[],
    );

    login(&app, &mut model, "u1@example.com", UserRole::Admin);

    let view = App.view(&model);
    assert!(!view.is_authenticated);
    assert_eq!(view.active_toast.unwrap().title, "Login Failed");
}
