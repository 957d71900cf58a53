use tether::prelude::*;

fn filled(config: Config, len: usize) -> ManagedVec<usize> {
    let vec = ManagedVec::with_config(config);
    for value in 0..len {
        vec.push(value);
    }
    vec
}

fn values(vec: &ManagedVec<usize>) -> Vec<usize> {
    vec.borrow().iter().map(|h| **h).collect()
}

fn indices(vec: &ManagedVec<usize>) -> Vec<usize> {
    vec.borrow().iter().map(Managed::index).collect()
}

#[test]
fn removing_any_position_preserves_order() {
    let len = 6;
    for k in 0..len {
        let vec = filled(Config::default(), len);
        vec.with(k, |handle| handle.remove());

        let expected = (0..len).filter(|v| *v != k).collect::<Vec<_>>();
        assert_eq!(values(&vec), expected);
        assert_eq!(indices(&vec), (0..len - 1).collect::<Vec<_>>());
    }
}

#[test]
fn insert_then_remove_round_trip() {
    let vec = filled(Config::default(), 4);
    let before = values(&vec);

    vec.insert(2, 99);
    vec.with(2, |handle| {
        assert_eq!(**handle, 99);
        handle.remove();
    });

    assert_eq!(values(&vec), before);
    assert_eq!(indices(&vec), vec![0, 1, 2, 3]);
}

#[test]
fn successor_removes_itself_after_eager_renumber() {
    let vec = filled(Config::default(), 4);
    vec.with(1, |handle| handle.remove());

    // Value 2 moved from slot 2 to slot 1
    vec.with(1, |handle| {
        assert_eq!(handle.index(), 1);
        handle.remove();
    });
    assert_eq!(values(&vec), vec![0, 3]);
}

#[test]
fn checked_out_handle_removes_itself_after_sibling_erased() {
    let vec = filled(Config::default(), 4);
    let outer = vec.clone();
    vec.with(2, |handle| {
        outer.remove(0).unwrap();
        handle.remove();
    });

    assert_eq!(values(&vec), vec![1, 3]);
    assert_eq!(indices(&vec), vec![0, 1]);
}

#[test]
fn overwritten_handle_removes_its_own_slot() {
    for policy in [IndexPolicy::Source, IndexPolicy::Slot] {
        let vec = filled(Config::default().index_policy(policy), 4);
        vec.overwrite(0, 2).unwrap();
        vec.with(0, |handle| handle.remove());
        assert_eq!(values(&vec), vec![1, 3]);
    }
}

#[test]
fn never_renumber_needs_reindex() {
    let vec = filled(Config::default().renumber(Renumber::Never), 4);
    vec.with(1, |handle| handle.remove());
    assert_eq!(indices(&vec), vec![0, 2, 3]);

    vec.reindex();
    vec.with(1, |handle| handle.remove());
    assert_eq!(values(&vec), vec![0, 3]);
}

#[test]
fn config_is_kept() {
    let config = Config::default().index_policy(IndexPolicy::Slot).renumber(Renumber::Never);
    let vec = ManagedVec::<u8>::with_config(config);
    assert_eq!(vec.config(), config);
}
