use super::*;

fn objects(n: usize) -> Vec<ObjectId> {
    let mut map: SlotMap<ObjectId, ()> = SlotMap::with_key();
    (0..n).map(|_| map.insert(())).collect()
}

fn ev(kind: HostEventKind, object: ObjectId) -> HostEvent {
    HostEvent { kind, object }
}

#[test]
fn handlers_only_see_their_own_object() {
    let o = objects(2);
    let mut reg = EventRegistry::default();
    let mine = reg.register(o[0]);
    let theirs = reg.register(o[1]);

    reg.dispatch(&[
        ev(HostEventKind::Pre, o[0]),
        ev(HostEventKind::Complete, o[1]),
    ]);
    assert_eq!(reg.state(mine), Some(HandlerState::Pre));
    assert_eq!(reg.state(theirs), Some(HandlerState::Complete));

    reg.dispatch(&[ev(HostEventKind::Complete, ObjectId::default())]);
    assert_eq!(reg.state(mine), Some(HandlerState::Pre));
}

#[test]
fn terminal_states_stick() {
    let o = objects(1);
    let mut reg = EventRegistry::default();
    let key = reg.register(o[0]);
    reg.dispatch(&[
        ev(HostEventKind::Pre, o[0]),
        ev(HostEventKind::Cancel, o[0]),
        ev(HostEventKind::Pre, o[0]),
        ev(HostEventKind::Complete, o[0]),
    ]);
    assert_eq!(reg.state(key), Some(HandlerState::Canceled));
}

#[test]
fn deregistration_is_explicit_and_reported() {
    let o = objects(1);
    let mut reg = EventRegistry::default();
    let key = reg.register(o[0]);
    assert_eq!(reg.len(), 1);
    assert!(reg.deregister(key));
    assert!(!reg.deregister(key));
    assert!(reg.is_empty());
    assert_eq!(reg.state(key), None);

    reg.dispatch(&[ev(HostEventKind::Complete, o[0])]);
    assert!(reg.is_empty());
}
