use sharestore::core::config::{RetryPolicy, Settings};
use sharestore::core::identity::Identity;
use sharestore::core::store::Store;
use sharestore::plugins::access::{Decision, request_access, resolve_request};
use sharestore::plugins::catalog::{EntryMetadata, register_or_touch};
use sharestore::plugins::permissions::{is_owner, owns, pending_count_for};
use tempfile::{TempDir, tempdir};

fn test_store(tmp: &TempDir) -> Store {
    let settings = Settings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        ..Settings::default()
    };
    Store::with_settings(tmp.path(), settings)
}

fn who(name: &str) -> Identity {
    Identity::parse(name).unwrap()
}

#[test]
fn test_is_owner_is_case_insensitive() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry =
        register_or_touch(&store, "/u/beto/m.db", &who("Beto"), &EntryMetadata::default()).unwrap();

    assert!(owns(&entry, &who("BETO")));
    assert!(is_owner(&store, "/u/beto/m.db", &who("beto")).unwrap());
    assert!(!is_owner(&store, "/u/beto/m.db", &who("carla")).unwrap());
}

#[test]
fn test_unknown_location_is_owned_by_nobody() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    assert!(!is_owner(&store, "/u/nobody/x.db", &who("beto")).unwrap());
}

#[test]
fn test_pending_count_visible_only_to_owner() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let beto = who("beto");
    let entry =
        register_or_touch(&store, "/u/beto/m.db", &beto, &EntryMetadata::default()).unwrap();

    assert_eq!(pending_count_for(&store, "/u/beto/m.db", &beto).unwrap(), 0);

    request_access(&store, &entry.id, &who("carla")).unwrap();
    let dana_req = request_access(&store, &entry.id, &who("dana")).unwrap();
    assert_eq!(pending_count_for(&store, "/u/beto/m.db", &who("BETO")).unwrap(), 2);
    assert_eq!(pending_count_for(&store, "/u/beto/m.db", &who("carla")).unwrap(), 0);
    assert_eq!(pending_count_for(&store, "/u/beto/none.db", &beto).unwrap(), 0);

    resolve_request(&store, &dana_req, Decision::Reject, &beto).unwrap();
    assert_eq!(pending_count_for(&store, "/u/beto/m.db", &beto).unwrap(), 1);
}
