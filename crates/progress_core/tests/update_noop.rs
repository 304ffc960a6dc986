use progress_core::{update, MonitorState, Msg, ReconcileSettings};

#[test]
fn update_is_noop() {
    let state = MonitorState::new(ReconcileSettings::default());
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
