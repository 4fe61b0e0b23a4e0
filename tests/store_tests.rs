//! Integration tests for the rule store and its deletion protocol.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hostguard::{Action, Category, Error, Rule, RuleStore};

fn rule(category: Category, target: &str) -> Rule {
    Rule::new(category, Action::Block, 0, target, "")
}

#[test]
fn test_ids_never_reused_after_delete() {
    let store = RuleStore::new(0);
    let a = store.add(rule(Category::Exec, "/bin/a")).unwrap();
    store.remove(a).unwrap();
    let b = store.add(rule(Category::Exec, "/bin/b")).unwrap();
    assert!(b > a);
}

#[test]
fn test_get_copies_without_holding() {
    let store = RuleStore::new(0);
    let id = store.add(rule(Category::Dns, "evil.example")).unwrap();
    let copy = store.get(id).unwrap();
    assert_eq!(copy.target, "evil.example");

    // a plain get must not delay removal
    let started = Instant::now();
    store.remove(id).unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_remove_waits_for_live_guard() {
    let store = Arc::new(RuleStore::new(0));
    let id = store.add(rule(Category::Exec, "/usr/bin/nc")).unwrap();

    let guard = store.match_rule(Category::Exec, "/usr/bin/nc").unwrap();
    assert_eq!(guard.id, id);

    let released = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let remover = {
        let store = Arc::clone(&store);
        let released = Arc::clone(&released);
        std::thread::spawn(move || {
            store.remove(id).unwrap();
            // the guard was dropped before remove could finish draining
            assert!(released.load(std::sync::atomic::Ordering::SeqCst));
        })
    };

    // hold the match briefly, then release; remove returns only after this
    std::thread::sleep(Duration::from_millis(100));
    released.store(true, std::sync::atomic::Ordering::SeqCst);
    drop(guard);

    remover.join().unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_remove_deadline_defers_free_to_holder() {
    let store = Arc::new(RuleStore::new(0));
    let id = store.add(rule(Category::Exec, "/usr/bin/nc")).unwrap();

    // never released until after remove gives up
    let guard = store.match_rule(Category::Exec, "/usr/bin/nc").unwrap();

    let started = Instant::now();
    store.remove(id).unwrap();
    let waited = started.elapsed();

    // bounded: returned around the drain deadline, not hung forever
    assert!(waited >= Duration::from_millis(400));
    assert!(waited < Duration::from_secs(5));

    // the unlinked rule is gone from the store but the guard still reads
    assert!(matches!(store.get(id), Err(Error::NotFound(_))));
    assert_eq!(guard.target, "/usr/bin/nc");
    drop(guard);
}

#[test]
fn test_clear_all_then_snapshot_empty() {
    let store = RuleStore::new(0);
    for i in 0..10 {
        store.add(rule(Category::Network, &format!("10.0.0.{i}:80"))).unwrap();
    }
    assert_eq!(store.snapshot().len(), 10);
    store.clear_all();
    assert!(store.snapshot().is_empty());
}

#[test]
fn test_snapshot_orders_by_category_then_insertion() {
    let store = RuleStore::new(0);
    store.add(rule(Category::Network, "10.0.0.1:80")).unwrap();
    store.add(rule(Category::Exec, "/bin/a")).unwrap();
    store.add(rule(Category::Dns, "a.example")).unwrap();
    store.add(rule(Category::Exec, "/bin/b")).unwrap();

    let targets: Vec<String> = store.snapshot().into_iter().map(|r| r.target).collect();
    assert_eq!(targets, vec!["/bin/a", "/bin/b", "a.example", "10.0.0.1:80"]);
}

#[test]
fn test_capacity_zero_is_unlimited() {
    let store = RuleStore::new(0);
    for i in 0..2000 {
        store.add(rule(Category::Exec, &format!("/bin/tool{i}"))).unwrap();
    }
    assert_eq!(store.len(), 2000);
}

#[test]
fn test_capacity_applies_across_categories() {
    let store = RuleStore::new(3);
    store.add(rule(Category::Exec, "/bin/a")).unwrap();
    store.add(rule(Category::Dns, "a.example")).unwrap();
    store.add(rule(Category::Network, "10.0.0.1:80")).unwrap();
    assert!(matches!(
        store.add(rule(Category::Exec, "/bin/b")),
        Err(Error::Capacity(3))
    ));
}

#[test]
fn test_invalid_rules_rejected() {
    let store = RuleStore::new(0);
    assert!(matches!(
        store.add(rule(Category::Exec, "")),
        Err(Error::Invalid(_))
    ));
    let long = "x".repeat(300);
    assert!(matches!(
        store.add(rule(Category::Exec, &long)),
        Err(Error::Invalid(_))
    ));
    assert_eq!(store.len(), 0);
}
