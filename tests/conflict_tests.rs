use chrono::NaiveDateTime;
use taskboard::conflict::{check_conflict, Booking, Candidate, Conflict, Window};

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
}

fn window(from: &str, to: &str) -> Window {
    Window::new(at(from), at(to)).unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_inverted_window_is_rejected() {
    let err = Window::new(at("2024-01-10T12:00"), at("2024-01-10T11:00")).unwrap_err();
    assert!(matches!(err, taskboard::Error::InvalidWindow { .. }));
}

#[test]
fn test_overlap_is_symmetric() {
    let a = window("2024-01-10T09:00", "2024-01-10T11:00");
    let b = window("2024-01-10T10:00", "2024-01-10T12:00");
    let c = window("2024-01-10T13:00", "2024-01-10T14:00");
    assert!(a.overlaps(&b) && b.overlaps(&a));
    assert!(!a.overlaps(&c) && !c.overlaps(&a));
}

#[test]
fn test_zero_length_window_overlaps_at_its_instant() {
    let point = window("2024-01-10T10:00", "2024-01-10T10:00");
    assert!(point.overlaps(&window("2024-01-10T09:00", "2024-01-10T10:00")));
    assert!(!point.overlaps(&window("2024-01-10T10:01", "2024-01-10T11:00")));
}

#[test]
fn test_excluded_task_never_conflicts_with_itself() {
    let alice = names(&["Alice"]);
    let w = window("2024-01-10T09:00", "2024-01-10T11:00");
    let existing = vec![Booking { id: 7, assignees: &alice, window: w }];
    let candidate = Candidate { assignees: &alice, window: w, exclude_task_id: Some(7) };
    assert_eq!(check_conflict(&candidate, existing, None), Ok(()));
}

#[test]
fn test_empty_assignees_never_conflict() {
    let alice = names(&["Alice"]);
    let nobody: Vec<String> = Vec::new();
    let w = window("2024-01-10T09:00", "2024-01-10T11:00");
    let existing = vec![
        Booking { id: 1, assignees: &alice, window: w },
        Booking { id: 2, assignees: &nobody, window: w },
    ];
    let candidate = Candidate { assignees: &nobody, window: w, exclude_task_id: None };
    assert_eq!(check_conflict(&candidate, existing, None), Ok(()));
}

#[test]
fn test_touching_endpoints_overlap() {
    let alice = names(&["Alice"]);
    let existing = vec![Booking { id: 1, assignees: &alice, window: window("2024-01-10T11:00", "2024-01-10T12:00") }];
    let candidate = Candidate {
        assignees: &alice,
        window: window("2024-01-10T10:00", "2024-01-10T11:00"),
        exclude_task_id: None,
    };
    assert!(matches!(
        check_conflict(&candidate, existing, None),
        Err(Conflict::Overlap { with_task: 1, .. })
    ));
}

#[test]
fn test_disjoint_windows_pass() {
    let alice = names(&["Alice"]);
    let existing = vec![Booking { id: 1, assignees: &alice, window: window("2024-01-10T10:00", "2024-01-10T11:00") }];
    let candidate = Candidate {
        assignees: &alice,
        window: window("2024-01-10T09:00", "2024-01-10T09:30"),
        exclude_task_id: None,
    };
    assert_eq!(check_conflict(&candidate, existing, None), Ok(()));
}

#[test]
fn test_overlap_without_shared_assignee_passes() {
    let alice = names(&["Alice"]);
    let bob = names(&["Bob"]);
    let w = window("2024-01-10T09:00", "2024-01-10T11:00");
    let existing = vec![Booking { id: 1, assignees: &alice, window: w }];
    let candidate = Candidate { assignees: &bob, window: w, exclude_task_id: None };
    assert_eq!(check_conflict(&candidate, existing, None), Ok(()));
}

#[test]
fn test_range_rejection_precedes_overlap_check() {
    let alice = names(&["Alice"]);
    let range = window("2024-01-01T00:00", "2024-01-31T23:59");
    let requested = window("2024-02-01T00:00", "2024-02-02T00:00");
    // Overlaps Alice's booking too, but only the range is reported.
    let existing = vec![Booking { id: 1, assignees: &alice, window: requested }];
    let candidate = Candidate { assignees: &alice, window: requested, exclude_task_id: None };
    assert_eq!(
        check_conflict(&candidate, existing, Some(range)),
        Err(Conflict::OutOfRange { allowed: range, requested })
    );

    let nobody_booked: Vec<Booking> = Vec::new();
    assert!(matches!(
        check_conflict(&candidate, nobody_booked, Some(range)),
        Err(Conflict::OutOfRange { .. })
    ));
}

#[test]
fn test_range_bounds_are_inclusive() {
    let alice = names(&["Alice"]);
    let range = window("2024-01-01T00:00", "2024-01-31T23:59");
    let candidate = Candidate { assignees: &alice, window: range, exclude_task_id: None };
    assert_eq!(check_conflict(&candidate, Vec::new(), Some(range)), Ok(()));
}

#[test]
fn test_first_conflicting_task_in_order_wins() {
    let alice = names(&["Alice"]);
    let w = window("2024-01-10T09:00", "2024-01-10T11:00");
    let candidate = Candidate { assignees: &alice, window: w, exclude_task_id: None };

    let first = Booking { id: 1, assignees: &alice, window: w };
    let second = Booking { id: 2, assignees: &alice, window: window("2024-01-10T10:00", "2024-01-10T10:30") };

    let forward = check_conflict(&candidate, vec![first.clone(), second.clone()], None);
    assert!(matches!(forward, Err(Conflict::Overlap { with_task: 1, .. })));

    let reversed = check_conflict(&candidate, vec![second, first], None);
    assert!(matches!(reversed, Err(Conflict::Overlap { with_task: 2, .. })));
}

#[test]
fn test_reported_assignee_follows_candidate_order() {
    let existing_people = names(&["Alice", "Bob"]);
    let candidate_people = names(&["Bob", "Alice"]);
    let w = window("2024-01-10T09:00", "2024-01-10T11:00");
    let existing = vec![Booking { id: 3, assignees: &existing_people, window: w }];
    let candidate = Candidate { assignees: &candidate_people, window: w, exclude_task_id: None };
    match check_conflict(&candidate, existing, None) {
        Err(Conflict::Overlap { assignee, .. }) => assert_eq!(assignee, "Bob"),
        other => panic!("expected overlap, got {:?}", other),
    }
}

#[test]
fn test_removing_conflicting_assignee_resolves_conflict() {
    let alice = names(&["Alice"]);
    let alice_bob = names(&["Alice", "Bob"]);
    let bob = names(&["Bob"]);
    let w = window("2024-01-10T09:00", "2024-01-10T11:00");

    let existing = vec![Booking { id: 1, assignees: &alice, window: w }];
    let before = Candidate { assignees: &alice_bob, window: w, exclude_task_id: None };
    assert!(check_conflict(&before, existing.clone(), None).is_err());

    let after = Candidate { assignees: &bob, window: w, exclude_task_id: None };
    assert_eq!(check_conflict(&after, existing, None), Ok(()));
}

#[test]
fn test_january_scenario() {
    let range = window("2024-01-01T00:00", "2024-01-31T23:59");
    let alice = names(&["Alice"]);
    let t1_window = window("2024-01-10T09:00", "2024-01-10T11:00");
    let existing = vec![Booking { id: 1, assignees: &alice, window: t1_window }];

    let check = |from: &str, to: &str| {
        let candidate = Candidate { assignees: &alice, window: window(from, to), exclude_task_id: None };
        check_conflict(&candidate, existing.clone(), Some(range))
    };

    assert_eq!(
        check("2024-01-10T10:00", "2024-01-10T12:00"),
        Err(Conflict::Overlap {
            with_task: 1,
            assignee: "Alice".into(),
            existing: t1_window,
            requested: window("2024-01-10T10:00", "2024-01-10T12:00"),
        })
    );
    assert!(matches!(
        check("2024-01-10T11:00", "2024-01-10T12:00"),
        Err(Conflict::Overlap { with_task: 1, .. })
    ));
    assert_eq!(check("2024-01-10T11:01", "2024-01-10T12:00"), Ok(()));
    assert!(matches!(
        check("2024-02-01T00:00", "2024-02-02T00:00"),
        Err(Conflict::OutOfRange { .. })
    ));
}

#[test]
fn test_conflict_messages() {
    let range = window("2024-01-01T00:00", "2024-01-31T23:59");
    let out = Conflict::OutOfRange { allowed: range, requested: window("2024-02-01T00:00", "2024-02-02T00:00") };
    assert_eq!(
        out.to_string(),
        "task deadline must be within the project's date range (from 2024-01-01 00:00 to 2024-01-31 23:59)"
    );

    let overlap = Conflict::Overlap {
        with_task: 4,
        assignee: "Alice".into(),
        existing: window("2024-01-10T09:00", "2024-01-10T11:00"),
        requested: window("2024-01-10T10:00", "2024-01-10T12:00"),
    };
    assert_eq!(
        overlap.to_string(),
        "Alice is already scheduled in task 4 from 2024-01-10 09:00 to 2024-01-10 11:00; \
         the new schedule (from 2024-01-10 10:00 to 2024-01-10 12:00) conflicts with it"
    );
}
