use super::*;
use chrono::Duration;

#[test]
fn test_state_machine_edges() {
    use OperationState::*;

    assert!(Running.can_transition_to(Finished));
    assert!(Running.can_transition_to(Error));
    assert!(Running.can_transition_to(ActionRequired));
    assert!(ActionRequired.can_transition_to(Running));
    assert!(Error.can_transition_to(Running));
    assert!(Error.can_transition_to(Aborted));

    assert!(!Finished.can_transition_to(Running));
    assert!(!Aborted.can_transition_to(Running));
    assert!(!Error.can_transition_to(Finished));
    assert!(!ActionRequired.can_transition_to(Error));
}

#[test]
fn test_every_non_final_state_can_abort() {
    for state in OperationState::non_final_states() {
        assert!(state.can_transition_to(OperationState::Aborted), "{state} should abort");
    }
    for state in OperationState::final_states() {
        assert!(!state.can_transition_to(OperationState::Aborted));
    }
}

#[test]
fn test_error_is_not_final() {
    assert!(!OperationState::Error.is_final());
    assert!(OperationState::Finished.is_final());
    assert!(OperationState::Aborted.is_final());
    assert_eq!(OperationState::initial(), OperationState::Running);
}

#[test]
fn test_state_string_round_trip() {
    assert_eq!("ACTION_REQUIRED".parse::<OperationState>().unwrap(), OperationState::ActionRequired);
    assert_eq!(OperationState::Aborted.to_string(), "ABORTED");
    assert!("PAUSED".parse::<OperationState>().is_err());

    let json = serde_json::to_string(&OperationState::ActionRequired).unwrap();
    assert_eq!(json, "\"ACTION_REQUIRED\"");
}

#[test]
fn test_process_type_definition_keys() {
    assert_eq!(ProcessType::Deploy.definition_key(), "xs2-deploy");
    assert_eq!(ProcessType::from_definition_key("xs2-undeploy"), Some(ProcessType::Undeploy));
    assert_eq!(ProcessType::from_definition_key("unknown"), None);
    assert_eq!("BLUE_GREEN_DEPLOY".parse::<ProcessType>().unwrap(), ProcessType::BlueGreenDeploy);
}

#[test]
fn test_operation_new_defaults() {
    let op = Operation::new("p1", ProcessType::Deploy, "space", "alice");
    assert_eq!(op.state, OperationState::Running);
    assert!(!op.has_acquired_lock);
    assert!(!op.cleaned_up);
    assert!(op.ended_at.is_none());
}

#[test]
fn test_targets_same_mta() {
    let a = Operation::new("p1", ProcessType::Deploy, "space", "u").with_mta_id("shop");
    let b = Operation::new("p2", ProcessType::Undeploy, "space", "u").with_mta_id("shop");
    let c = b.clone().with_namespace("dev");
    let d = Operation::new("p3", ProcessType::Deploy, "space", "u");

    assert!(a.targets_same_mta(&b));
    assert!(!a.targets_same_mta(&c));
    assert!(!d.targets_same_mta(&d.clone()));
}

#[test]
fn test_filter_matches() {
    let now = Utc::now();
    let op = Operation::new("p1", ProcessType::Deploy, "space", "alice")
        .with_started_at(now - Duration::days(10));

    assert!(OperationFilter::new().matches(&op));
    assert!(OperationFilter::new().in_non_final_state().matches(&op));
    assert!(!OperationFilter::new().in_final_state().matches(&op));
    assert!(OperationFilter::new().started_before(now - Duration::days(7)).matches(&op));
    assert!(!OperationFilter::new().started_after(now - Duration::days(7)).matches(&op));
    assert!(!OperationFilter::new().mta_id("shop").matches(&op));
    assert!(!OperationFilter::new().ended_before(now).matches(&op));
    assert!(OperationFilter::new().user("alice").cleaned_up(false).matches(&op));
}

#[test]
fn test_filter_order_and_paging() {
    let now = Utc::now();
    let ops: Vec<Operation> = ["c", "a", "b"]
        .iter()
        .enumerate()
        .map(|(i, id)| {
            Operation::new(*id, ProcessType::Deploy, "s", "u")
                .with_started_at(now - Duration::minutes(i as i64))
        })
        .collect();

    let by_id = OperationFilter::new().apply_order_and_paging(ops.clone());
    assert_eq!(by_id.iter().map(|o| o.process_id.as_str()).collect::<Vec<_>>(), ["a", "b", "c"]);

    let newest_first = OperationFilter::new()
        .order(OperationOrder::StartedAtDesc)
        .apply_order_and_paging(ops.clone());
    assert_eq!(newest_first[0].process_id, "c");

    let page = OperationFilter::new().offset(1).limit(1).apply_order_and_paging(ops);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].process_id, "b");
}
