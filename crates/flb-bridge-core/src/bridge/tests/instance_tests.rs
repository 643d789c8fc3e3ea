#![cfg(test)]

use crate::bridge::instance::{Instance, InstanceHandle, InstanceTable, LifecycleState};

#[test]
fn test_handle_never_encodes_to_null() {
    let table = InstanceTable::new();
    let handle = table.insert(Instance::new("first")).unwrap();
    assert_eq!(handle.index(), 0);
    assert_ne!(handle.to_raw(), 0);
    assert!(!handle.into_context().is_null());
}

#[test]
fn test_handle_raw_round_trip() {
    let table = InstanceTable::new();
    let handle = table.insert(Instance::new(1u8)).unwrap();
    assert_eq!(InstanceHandle::from_raw(handle.to_raw()), Some(handle));
    assert_eq!(InstanceHandle::from_context(handle.into_context()), Some(handle));
    assert_eq!(InstanceHandle::from_raw(0), None);
    assert_eq!(InstanceHandle::from_context(std::ptr::null_mut()), None);
    assert_eq!(handle.to_string(), "#0.0");
}

#[test]
fn test_primary_passes_to_next_live_instance() {
    let table = InstanceTable::new();
    assert!(table.is_empty());
    assert_eq!(table.primary(), None);

    let first = table.insert(Instance::new("a")).unwrap();
    let second = table.insert(Instance::new("b")).unwrap();
    assert_eq!(table.primary(), Some(first));
    assert_eq!(table.len(), 2);

    table.remove(first).unwrap();
    assert_eq!(table.primary(), Some(second));

    // Reuses slot 0 but does not take the role back
    let third = table.insert(Instance::new("c")).unwrap();
    assert_eq!(third.index(), 0);
    assert_eq!(table.primary(), Some(second));

    table.remove(second).unwrap();
    assert_eq!(table.primary(), Some(third));
    table.remove(third).unwrap();
    assert_eq!(table.primary(), None);

    let fourth = table.insert(Instance::new("d")).unwrap();
    assert_eq!(table.primary(), Some(fourth));
}

#[test]
fn test_released_slot_is_reused_with_new_generation() {
    let table = InstanceTable::new();
    let old = table.insert(Instance::new("old")).unwrap();
    assert!(table.remove(old).is_some());

    let new = table.insert(Instance::new("new")).unwrap();
    assert_eq!(new.index(), old.index());
    assert_ne!(new.generation(), old.generation());
    assert_ne!(new.to_raw(), old.to_raw());

    // The stale handle reaches nothing, including the reused slot
    assert!(!table.contains(old));
    assert!(table.get(old).is_none());
    assert!(table.remove(old).is_none());
    assert!(table.contains(new));
}

#[test]
fn test_remove_twice() {
    let table = InstanceTable::new();
    let handle = table.insert(Instance::new(())).unwrap();
    assert!(table.remove(handle).is_some());
    assert!(table.remove(handle).is_none());
    assert!(table.is_empty());
}

#[test]
fn test_unknown_index_is_not_found() {
    let table: InstanceTable<()> = InstanceTable::default();
    let forged = InstanceHandle::from_raw(41).unwrap();
    assert!(table.get(forged).is_none());
}

#[test]
fn test_new_instance_starts_registered() {
    let instance = Instance::new(());
    assert_eq!(instance.state, LifecycleState::Registered);
    assert_eq!(instance.record_flush(), 1);
    assert_eq!(instance.record_flush(), 2);
    assert_eq!(LifecycleState::InitFailed.to_string(), "init-failed");
}
