use sharestore::core::config::{RetryPolicy, Settings};
use sharestore::core::error::ShareError;
use sharestore::core::identity::Identity;
use sharestore::core::store::Store;
use sharestore::plugins::access::{
    Availability, Decision, RequestStatus, get_request, list_available_for_requester,
    list_pending_for_owner, list_shared_by_owner, request_access, resolve_request, revoke_approval,
};
use sharestore::plugins::catalog::{CatalogEntry, EntryMetadata, register_or_touch, soft_delete};
use std::thread::sleep;
use std::time::Duration;
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

fn register(store: &Store, location: &str, owner: &str) -> CatalogEntry {
    register_or_touch(store, location, &who(owner), &EntryMetadata::default()).unwrap()
}

fn status_for(store: &Store, requester: &str, entry_id: &str) -> Availability {
    list_available_for_requester(store, &who(requester))
        .unwrap()
        .into_iter()
        .find(|a| a.entry.id == entry_id)
        .map(|a| a.status)
        .expect("entry listed")
}

#[test]
fn test_request_approve_lifecycle() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    let carla = who("carla");

    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Available);

    let req = request_access(&store, &entry.id, &carla).unwrap();
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Pending);

    let pending = list_pending_for_owner(&store, &who("beto")).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, req);
    assert_eq!(pending[0].requester_identity, "carla");

    resolve_request(&store, &req, Decision::Approve, &who("BETO")).unwrap();
    let row = get_request(&store, &carla, &req).unwrap().unwrap();
    assert_eq!(row.status, RequestStatus::Approved);
    assert!(row.resolved_at.is_some());
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Approved);
    assert!(list_pending_for_owner(&store, &who("beto")).unwrap().is_empty());
}

#[test]
fn test_duplicate_pending_request_inserts_nothing() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");

    request_access(&store, &entry.id, &who("carla")).unwrap();
    let err = request_access(&store, &entry.id, &who("CARLA")).unwrap_err();
    assert!(matches!(err, ShareError::DuplicateRequest { .. }));
    assert_eq!(list_pending_for_owner(&store, &who("beto")).unwrap().len(), 1);
}

#[test]
fn test_pending_uniqueness_is_enforced_by_schema() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    request_access(&store, &entry.id, &who("carla")).unwrap();

    let conn = rusqlite::Connection::open(store.master_db_path()).unwrap();
    let res = conn.execute(
        "INSERT INTO access_requests(id, entry_id, requester_identity, requester_key, requested_at, status) \
         VALUES('manual', ?1, 'Carla', 'carla', 0, 'pending')",
        [&entry.id],
    );
    assert!(res.is_err(), "second pending row must violate the partial unique index");
}

#[test]
fn test_request_validation() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");

    let err = request_access(&store, &entry.id, &who("Beto")).unwrap_err();
    assert!(matches!(err, ShareError::ValidationError(_)));

    let err = request_access(&store, "no-such-entry", &who("carla")).unwrap_err();
    assert!(matches!(err, ShareError::NotFound(_)));

    assert!(soft_delete(&store, "/u/beto/m.db", &who("beto")).unwrap());
    let err = request_access(&store, &entry.id, &who("carla")).unwrap_err();
    assert!(matches!(err, ShareError::NotFound(_)));
}

#[test]
fn test_resolve_request_requires_owner() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    let req = request_access(&store, &entry.id, &who("carla")).unwrap();

    let err = resolve_request(&store, &req, Decision::Approve, &who("dana")).unwrap_err();
    assert!(matches!(err, ShareError::PermissionDenied(_)));
    // The requester cannot approve their own request either.
    let err = resolve_request(&store, &req, Decision::Approve, &who("carla")).unwrap_err();
    assert!(matches!(err, ShareError::PermissionDenied(_)));

    let row = get_request(&store, &who("beto"), &req).unwrap().unwrap();
    assert_eq!(row.status, RequestStatus::Pending);
    assert_eq!(row.resolved_at, None);
}

#[test]
fn test_resolved_request_is_immutable() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    let beto = who("beto");
    let req = request_access(&store, &entry.id, &who("carla")).unwrap();
    resolve_request(&store, &req, Decision::Reject, &beto).unwrap();
    let before = get_request(&store, &beto, &req).unwrap().unwrap();

    for decision in [Decision::Approve, Decision::Reject] {
        let err = resolve_request(&store, &req, decision, &beto).unwrap_err();
        assert!(matches!(err, ShareError::AlreadyResolved(_)));
    }
    let after = get_request(&store, &beto, &req).unwrap().unwrap();
    assert_eq!(before, after);

    let err = resolve_request(&store, "missing", Decision::Approve, &beto).unwrap_err();
    assert!(matches!(err, ShareError::NotFound(_)));
}

#[test]
fn test_retry_after_rejection_needs_new_request() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    let beto = who("beto");
    let carla = who("carla");

    let first = request_access(&store, &entry.id, &carla).unwrap();
    resolve_request(&store, &first, Decision::Reject, &beto).unwrap();
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Rejected);

    sleep(Duration::from_millis(3));
    let second = request_access(&store, &entry.id, &carla).unwrap();
    assert_ne!(first, second);
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Pending);

    sleep(Duration::from_millis(3));
    resolve_request(&store, &second, Decision::Approve, &beto).unwrap();
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Approved);
}

#[test]
fn test_available_excludes_own_and_deleted_entries() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let mine = register(&store, "/u/carla/mine.db", "carla");
    let gone = register(&store, "/u/beto/gone.db", "beto");
    let live = register(&store, "/u/beto/live.db", "beto");
    assert!(soft_delete(&store, &gone.location, &who("beto")).unwrap());

    let ids: Vec<String> = list_available_for_requester(&store, &who("Carla"))
        .unwrap()
        .into_iter()
        .map(|a| a.entry.id)
        .collect();
    assert_eq!(ids, vec![live.id]);
    assert!(!ids.contains(&mine.id));
}

#[test]
fn test_pending_for_owner_ordering_and_scope() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let m = register(&store, "/u/beto/m.db", "beto");
    let n = register(&store, "/u/beto/n.db", "beto");
    let other = register(&store, "/u/dana/o.db", "dana");

    let r1 = request_access(&store, &m.id, &who("carla")).unwrap();
    sleep(Duration::from_millis(3));
    let r2 = request_access(&store, &n.id, &who("ana")).unwrap();
    sleep(Duration::from_millis(3));
    request_access(&store, &other.id, &who("carla")).unwrap();

    let ids: Vec<String> = list_pending_for_owner(&store, &who("beto"))
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![r2, r1]);
}

#[test]
fn test_revoke_approval() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    let beto = who("beto");
    let carla = who("carla");

    // Nothing approved yet.
    assert!(!revoke_approval(&store, &entry.id, &carla, &beto).unwrap());

    let req = request_access(&store, &entry.id, &carla).unwrap();
    resolve_request(&store, &req, Decision::Approve, &beto).unwrap();

    assert!(!revoke_approval(&store, &entry.id, &carla, &who("dana")).unwrap());
    assert!(!revoke_approval(&store, "missing", &carla, &beto).unwrap());
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Approved);

    assert!(revoke_approval(&store, &entry.id, &who("CARLA"), &beto).unwrap());
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Rejected);
    let row = get_request(&store, &beto, &req).unwrap().unwrap();
    assert_eq!(row.status, RequestStatus::Rejected);

    assert!(!revoke_approval(&store, &entry.id, &carla, &beto).unwrap());
}

#[test]
fn test_shared_by_owner_lists_current_approvals() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let beto = who("beto");
    let m = register(&store, "/u/beto/m.db", "beto");
    let n = register(&store, "/u/beto/n.db", "beto");

    let r1 = request_access(&store, &m.id, &who("carla")).unwrap();
    let r2 = request_access(&store, &n.id, &who("ana")).unwrap();
    let r3 = request_access(&store, &m.id, &who("dana")).unwrap();
    resolve_request(&store, &r1, Decision::Approve, &beto).unwrap();
    resolve_request(&store, &r2, Decision::Approve, &beto).unwrap();
    resolve_request(&store, &r3, Decision::Reject, &beto).unwrap();

    let grants = list_shared_by_owner(&store, &beto).unwrap();
    assert_eq!(grants.len(), 2);
    assert!(grants.iter().all(|g| g.request_id != r3));

    assert!(soft_delete(&store, &n.location, &beto).unwrap());
    let grants = list_shared_by_owner(&store, &beto).unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].requester_identity, "carla");
    assert_eq!(grants[0].location, "/u/beto/m.db");
}

#[test]
fn test_approved_requester_cannot_request_again() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    let beto = who("beto");
    let carla = who("carla");

    let req = request_access(&store, &entry.id, &carla).unwrap();
    resolve_request(&store, &req, Decision::Approve, &beto).unwrap();

    let err = request_access(&store, &entry.id, &who("Carla")).unwrap_err();
    assert!(matches!(err, ShareError::ValidationError(_)));
    assert!(list_pending_for_owner(&store, &beto).unwrap().is_empty());

    // Both read models still agree on the grant.
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Approved);
    let grants = list_shared_by_owner(&store, &beto).unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].requester_identity, "carla");
}

#[test]
fn test_request_after_revoke_shows_pending() {
    let tmp = tempdir().unwrap();
    let store = test_store(&tmp);
    let entry = register(&store, "/u/beto/m.db", "beto");
    let beto = who("beto");
    let carla = who("carla");

    let req = request_access(&store, &entry.id, &carla).unwrap();
    resolve_request(&store, &req, Decision::Approve, &beto).unwrap();
    sleep(Duration::from_millis(3));
    assert!(revoke_approval(&store, &entry.id, &carla, &beto).unwrap());
    assert!(list_shared_by_owner(&store, &beto).unwrap().is_empty());

    sleep(Duration::from_millis(3));
    let again = request_access(&store, &entry.id, &carla).unwrap();
    assert_eq!(status_for(&store, "carla", &entry.id), Availability::Pending);
    let pending = list_pending_for_owner(&store, &beto).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, again);
}
