//! Schema engine (C4) end-to-end coverage: driving the real migration chain
//! against a database seeded partway through it, rather than only unit-testing
//! the chain's bookkeeping in isolation.

mod common;

use skcd::backend::connect;
use skcd::config::{BackendDescriptor, PoolConfig};
use skcd::schema::{self, SchemaVersion};
use pretty_assertions::assert_eq;

/// A case file "authored" at schema (8,6) — built by running the full chain
/// to `CURRENT` and then rewinding just the stored-version bookkeeping, so
/// every table the (8,6)→(9,6) steps expect to find already exists exactly
/// as those steps would have left it. Opening it must walk the remaining
/// steps (8,6)→(9,0)→...→(9,6) and land on `CURRENT`, exercising
/// `open_and_upgrade` starting partway through the chain rather than from a
/// brand-new database.
#[tokio::test]
async fn case_authored_at_8_6_upgrades_to_current() {
    let dir = tempfile::tempdir().expect("create scratch dir");
    let path = dir.path().join("legacy.db");
    let descriptor = BackendDescriptor::Embedded { path: path.clone() };
    let pool_cfg = PoolConfig::default();

    let backend = connect(&descriptor, &pool_cfg).await.expect("connect embedded backend");
    schema::migrations::create_fresh(&backend, backend.kind())
        .await
        .expect("build schema at CURRENT");
    schema::write_stored_version(&backend, SchemaVersion::new(8, 6))
        .await
        .expect("rewind stored version to 8.6");

    let stored = schema::read_stored_version(&backend)
        .await
        .expect("read stored version")
        .expect("case has a schema");
    assert_eq!(stored, SchemaVersion::new(8, 6));

    let upgraded = schema::open_and_upgrade(&backend, Some(&path))
        .await
        .expect("upgrade legacy case");
    assert_eq!(upgraded, schema::CURRENT);
    assert_eq!(upgraded, SchemaVersion::new(9, 6));

    let final_stored = schema::read_stored_version(&backend)
        .await
        .expect("read final stored version")
        .expect("case has a schema");
    assert_eq!(final_stored, SchemaVersion::new(9, 6));
}

/// Opening an already-`CURRENT` case is a no-op: the version comparison
/// short-circuits before any migration step runs.
#[tokio::test]
async fn case_already_at_current_is_untouched() {
    let dir = tempfile::tempdir().expect("create scratch dir");
    let path = dir.path().join("current.db");
    let descriptor = BackendDescriptor::Embedded { path: path.clone() };
    let pool_cfg = PoolConfig::default();

    let backend = connect(&descriptor, &pool_cfg).await.expect("connect embedded backend");
    schema::migrations::create_fresh(&backend, backend.kind())
        .await
        .expect("build schema at CURRENT");

    let upgraded = schema::open_and_upgrade(&backend, Some(&path))
        .await
        .expect("open already-current case");
    assert_eq!(upgraded, schema::CURRENT);
}
