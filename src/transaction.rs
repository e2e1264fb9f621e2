//! Transaction façade (C10): owns the write lock, one engine transaction,
//! and a per-transaction deferred-event buffer; fires the buffer through
//! the event bus (C12) on commit and discards it on rollback (§4.10).
//!
//! Grounded on the teacher's `LibraryManager` pattern of pairing an
//! `Arc<RwLock<..>>` guard with a unit of work and releasing it on every
//! exit path, generalized here to additionally carry an engine-level
//! `sqlx::Transaction` and a buffer of domain events instead of a library
//! handle.

use std::collections::HashMap;

use sqlx::{Postgres, Sqlite};
use tracing::warn;

use crate::error::{Result, SkcdError};
use crate::events::{CaseEvent, EventBus};
use crate::lock::{CaseLock, LockGuard};

/// The engine-level transaction, one variant per backend. Borrows the
/// pool for the transaction's lifetime, matching `crate::backend::Backend`.
enum EngineTxn<'a> {
    Sqlite(sqlx::Transaction<'a, Sqlite>),
    Postgres(sqlx::Transaction<'a, Postgres>),
}

/// Deferred events collected while a transaction is open, flushed through
/// the event bus only on a successful commit (§4.10 step 3-4).
#[derive(Default)]
struct DeferredEvents {
    /// Score changes deduplicated by `obj_id` — a transaction that touches
    /// the same object's score twice still fires one event for it.
    score_changes: HashMap<i64, i64>,
    rest: Vec<CaseEvent>,
}

impl DeferredEvents {
    fn register(&mut self, event: CaseEvent) {
        if let CaseEvent::ScoreChanged { obj_id, data_source_obj_id } = event {
            self.score_changes.insert(obj_id, data_source_obj_id);
            return;
        }
        self.rest.push(event);
    }

    fn drain_in_order(self) -> Vec<CaseEvent> {
        let mut out: Vec<CaseEvent> = self
            .score_changes
            .into_iter()
            .map(|(obj_id, data_source_obj_id)| CaseEvent::ScoreChanged { obj_id, data_source_obj_id })
            .collect();
        out.extend(self.rest);
        out
    }
}

/// A single client-visible write transaction. Holds the write lock (a
/// no-op on the networked backend) for its entire lifetime; every store
/// operation performed against `connection()` runs against the same
/// engine transaction and so either all commit together or all roll back
/// together.
pub struct CaseTransaction<'a> {
    engine: Option<EngineTxn<'a>>,
    _lock_guard: LockGuard,
    lock: &'a CaseLock,
    events: DeferredEvents,
    bus: &'a EventBus,
    finished: bool,
}

impl<'a> CaseTransaction<'a> {
    /// `begin()` (§4.10 step 1): refuses to open a second write
    /// transaction on a thread that already holds one, rather than
    /// silently deadlocking through the fair lock.
    pub async fn begin_sqlite(pool: &'a sqlx::Pool<Sqlite>, lock: &'a CaseLock, bus: &'a EventBus) -> Result<Self> {
        if lock.current_thread_holds_write() {
            warn!("re-entrant write transaction attempted on a thread that already holds one");
            return Err(SkcdError::InvalidArgument(
                "a write transaction is already open on this thread".to_string(),
            ));
        }
        let guard = lock.acquire_write().await;
        let txn = pool.begin().await?;
        Ok(Self { engine: Some(EngineTxn::Sqlite(txn)), _lock_guard: guard, lock, events: DeferredEvents::default(), bus, finished: false })
    }

    pub async fn begin_postgres(pool: &'a sqlx::Pool<Postgres>, lock: &'a CaseLock, bus: &'a EventBus) -> Result<Self> {
        if lock.current_thread_holds_write() {
            warn!("re-entrant write transaction attempted on a thread that already holds one");
            return Err(SkcdError::InvalidArgument(
                "a write transaction is already open on this thread".to_string(),
            ));
        }
        let guard = lock.acquire_write().await;
        let txn = pool.begin().await?;
        Ok(Self { engine: Some(EngineTxn::Postgres(txn)), _lock_guard: guard, lock, events: DeferredEvents::default(), bus, finished: false })
    }

    /// Queue a domain event; fired only if this transaction commits
    /// (§4.10 step 3).
    pub fn register_event(&mut self, event: CaseEvent) {
        self.events.register(event);
    }

    /// Run a closure against the raw SQLite connection inside this
    /// transaction. Store operations that need transactional grouping
    /// call through here instead of taking their own pooled connection.
    pub async fn with_sqlite<F, T>(&mut self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut sqlx::SqliteConnection) -> futures::future::BoxFuture<'c, Result<T>>,
    {
        match self.engine.as_mut() {
            Some(EngineTxn::Sqlite(txn)) => f(txn.as_mut()).await,
            _ => Err(SkcdError::InvalidArgument("transaction is not backed by sqlite".to_string())),
        }
    }

    pub async fn with_postgres<F, T>(&mut self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut sqlx::PgConnection) -> futures::future::BoxFuture<'c, Result<T>>,
    {
        match self.engine.as_mut() {
            Some(EngineTxn::Postgres(txn)) => f(txn.as_mut()).await,
            _ => Err(SkcdError::InvalidArgument("transaction is not backed by postgres".to_string())),
        }
    }

    /// `commit()` (§4.10 step 4): commits the engine transaction first,
    /// then fires the buffered events. Event delivery is best-effort —
    /// `EventBus::emit` cannot fail — so nothing here can turn a
    /// successful commit back into a failure.
    pub async fn commit(mut self) -> Result<()> {
        self.finished = true;
        let result = match self.engine.take() {
            Some(EngineTxn::Sqlite(txn)) => txn.commit().await,
            Some(EngineTxn::Postgres(txn)) => txn.commit().await,
            None => Ok(()),
        };
        self.lock.release_write_thread_marker();
        result?;
        for event in std::mem::take(&mut self.events).drain_in_order() {
            self.bus.emit(event);
        }
        Ok(())
    }

    /// `rollback()` (§4.10 step 5): throws on engine failure; the
    /// deferred buffer is simply dropped, never fired.
    pub async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        let result = match self.engine.take() {
            Some(EngineTxn::Sqlite(txn)) => txn.rollback().await,
            Some(EngineTxn::Postgres(txn)) => txn.rollback().await,
            None => Ok(()),
        };
        self.lock.release_write_thread_marker();
        result?;
        Ok(())
    }
}

/// If a `CaseTransaction` is dropped without an explicit `commit()` or
/// `rollback()` — e.g. an early `?` return — the engine transaction rolls
/// back implicitly (sqlx's own drop behavior) and the write-lock thread
/// marker is cleared regardless (§4.10 step 6, "every exit path").
impl<'a> Drop for CaseTransaction<'a> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("case transaction dropped without explicit commit or rollback; rolling back");
            self.lock.release_write_thread_marker();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::CaseLock;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> sqlx::Pool<Sqlite> {
        SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn commit_fires_deduplicated_score_events() {
        let pool = memory_pool().await;
        let lock = CaseLock::embedded();
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let mut txn = CaseTransaction::begin_sqlite(&pool, &lock, &bus).await.unwrap();
        txn.register_event(CaseEvent::ScoreChanged { obj_id: 1, data_source_obj_id: 1 });
        txn.register_event(CaseEvent::ScoreChanged { obj_id: 1, data_source_obj_id: 1 });
        txn.register_event(CaseEvent::HostAdded { host_id: 7 });
        txn.commit().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 2);
        assert!(!lock.current_thread_holds_write());
    }

    #[tokio::test]
    async fn rollback_discards_buffered_events() {
        let pool = memory_pool().await;
        let lock = CaseLock::embedded();
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let mut txn = CaseTransaction::begin_sqlite(&pool, &lock, &bus).await.unwrap();
        txn.register_event(CaseEvent::HostAdded { host_id: 1 });
        txn.rollback().await.unwrap();

        assert!(rx.try_recv().is_err());
        assert!(!lock.current_thread_holds_write());
    }

    #[tokio::test]
    async fn reentrant_begin_on_same_thread_is_refused() {
        let pool = memory_pool().await;
        let lock = CaseLock::embedded();
        let bus = EventBus::default();

        let _txn = CaseTransaction::begin_sqlite(&pool, &lock, &bus).await.unwrap();
        let second = CaseTransaction::begin_sqlite(&pool, &lock, &bus).await;
        assert!(second.is_err());
    }
}
