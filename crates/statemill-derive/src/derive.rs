use serde::{Deserialize, Serialize};
use statemill_core::{
    observe, CommitInfo, DeleteTracker, DeriveConfig, Result, Revision, RwTable, StateError,
    StateStore, Table, TrackerGuard, WriteTxn,
};
use statemill_job::{one_shot, CancelToken, HealthReporter, JobError, JobRegistry, Lifecycle};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::progress::DeriveProgress;

/// What to do with the object produced by a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeriveResult {
    /// Write the object, replacing any object with the same key
    Insert,
    /// Replace the object with the same key only if one exists
    Update,
    /// Remove the object with the same key, if present
    Delete,
    /// Leave the output untouched
    Skip,
}

/// Keeps an output table in sync with an input table
///
/// Every change to the input, tombstones included, is passed through the
/// transform and the resulting [`DeriveResult`] is applied to the output.
/// A batch of changes is applied inside a single output transaction.
///
/// `transform` receives the input object and whether it was deleted. It
/// should be deterministic: a batch that failed may be seen again after the
/// job restarts.
pub struct Derive<S, I, O, F> {
    job_name: String,
    db: Arc<S>,
    input: I,
    output: O,
    transform: F,
    config: DeriveConfig,
    progress: watch::Sender<Revision>,
}

impl<S, I, O, F> Derive<S, I, O, F>
where
    S: StateStore,
    I: Table<Txn = S::Txn> + 'static,
    O: RwTable<Txn = S::Txn> + 'static,
    F: FnMut(I::Object, bool) -> (O::Object, DeriveResult) + Send + 'static,
{
    /// `job_name` doubles as the name of the delete tracker on `input`
    pub fn new(job_name: impl Into<String>, db: Arc<S>, input: I, output: O, transform: F) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            job_name: job_name.into(),
            db,
            input,
            output,
            transform,
            config: DeriveConfig::default(),
            progress,
        }
    }

    pub fn with_config(mut self, config: DeriveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn progress(&self) -> DeriveProgress {
        DeriveProgress::new(self.progress.subscribe())
    }

    fn validate(&self) -> Result<()> {
        if self.job_name.is_empty() {
            return Err(StateError::Config("derivation job name is empty".into()));
        }
        if self.input.name() == self.output.name() {
            return Err(StateError::Config(format!(
                "derivation {} reads and writes table {}",
                self.job_name,
                self.input.name()
            )));
        }
        Ok(())
    }

    /// Add this derivation as a job of a new group under `scope` and append
    /// the group to `lifecycle`
    pub fn register(
        self,
        jobs: &JobRegistry,
        scope: impl Into<String>,
        lifecycle: &mut Lifecycle,
    ) -> std::result::Result<DeriveProgress, JobError> {
        self.validate()?;
        let progress = self.progress();
        let group = jobs.new_group(scope);
        let name = self.job_name.clone();

        group.add(one_shot(name, move |cancel, health| async move {
            self.run(cancel, health).await?;
            Ok(())
        }))?;
        lifecycle.append(group);

        Ok(progress)
    }

    /// Run until cancelled or until a batch fails
    ///
    /// Registers the delete tracker, then repeatedly applies every change
    /// after the cursor and waits for the input to move. Cancellation is
    /// only observed between batches and ends the run with `Ok(())`.
    pub async fn run(self, cancel: CancelToken, health: HealthReporter) -> Result<()> {
        self.validate()?;
        let Derive {
            job_name,
            db,
            input,
            output,
            mut transform,
            config,
            progress,
        } = self;

        let mut tracker = match register_tracker(db.as_ref(), &input, &job_name).await {
            Ok(tracker) => TrackerGuard::new(tracker),
            Err(e) => {
                tracing::error!(
                    job = %job_name,
                    "Failed to register delete tracker on {}: {}",
                    input.name(),
                    e
                );
                return Err(e);
            }
        };

        let mut cursor = config
            .initial_revision
            .unwrap_or_else(|| tracker.start_revision());
        progress.send_replace(cursor);
        health.ok("delete tracker registered");
        tracing::info!(
            job = %job_name,
            "Deriving {} from {} starting after revision {}",
            output.name(),
            input.name(),
            cursor
        );

        let out_name = output.name().to_string();

        loop {
            let started = Instant::now();
            let mut txn = db.write_txn(&[out_name.as_str()]).await?;

            let outcome = tracker.process(&mut txn, cursor, |txn, change| {
                let (obj, effect) = transform(change.object, change.deleted);
                apply_effect(&output, txn, obj, effect)
            });

            let committed = if outcome.is_err() && !config.commit_on_error {
                txn.abort();
                CommitInfo::default()
            } else {
                txn.commit()?
            };

            let processed = match outcome {
                Ok(processed) => processed,
                Err(e) => {
                    observe::record_batch(started.elapsed(), e.processed, false);
                    if config.commit_on_error {
                        cursor = cursor.max(e.revision);
                        progress.send_replace(cursor);
                    }
                    tracing::error!(
                        job = %job_name,
                        "Derivation failed after revision {}: {}",
                        e.revision,
                        e.source
                    );
                    return Err(e.into_source());
                }
            };

            observe::record_batch(started.elapsed(), processed.processed, true);
            cursor = cursor.max(processed.revision);
            progress.send_replace(cursor);

            if processed.processed > 0 {
                tracing::debug!(
                    job = %job_name,
                    output_changed = !committed.is_empty(),
                    "Applied {} changes up to revision {} in {:?}",
                    processed.processed,
                    cursor,
                    started.elapsed()
                );
                health.ok("processed changes");
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(job = %job_name, "Derivation stopped at revision {}", cursor);
                    return Ok(());
                }
                ready = processed.watch.ready() => {
                    ready?;
                }
            }
        }
    }
}

async fn register_tracker<S, I>(db: &S, input: &I, name: &str) -> Result<I::Tracker>
where
    S: StateStore,
    I: Table<Txn = S::Txn>,
{
    let mut txn = db.write_txn(&[input.name()]).await?;
    match input.delete_tracker(&mut txn, name) {
        Ok(tracker) => {
            txn.commit()?;
            Ok(tracker)
        }
        Err(e) => {
            txn.abort();
            Err(e)
        }
    }
}

fn apply_effect<O: RwTable>(
    output: &O,
    txn: &mut O::Txn,
    obj: O::Object,
    effect: DeriveResult,
) -> Result<()> {
    match effect {
        DeriveResult::Insert => {
            output.insert(txn, obj)?;
        }
        DeriveResult::Update => {
            let query = output.primary_indexer().query_from_object(&obj);
            if output.first(txn, &query).is_some() {
                output.insert(txn, obj)?;
            }
        }
        DeriveResult::Delete => {
            output.delete(txn, &obj)?;
        }
        DeriveResult::Skip => {}
    }
    Ok(())
}

/// Inputs of the registrar returned by [`derive`]
pub struct DeriveParams<S, I, O> {
    pub jobs: JobRegistry,
    /// Health scope of the job group
    pub scope: String,
    pub db: Arc<S>,
    pub in_table: I,
    pub out_table: O,
    pub config: DeriveConfig,
}

/// Build a registrar for a derivation named `job_name`
///
/// The returned closure wires a [`Derive`] over the given tables into a new
/// job group and appends it to the lifecycle, so a derivation can be
/// declared once and installed wherever the tables are available.
pub fn derive<S, I, O, F>(
    job_name: impl Into<String>,
    transform: F,
) -> impl FnOnce(DeriveParams<S, I, O>, &mut Lifecycle) -> std::result::Result<DeriveProgress, JobError>
where
    S: StateStore,
    I: Table<Txn = S::Txn> + 'static,
    O: RwTable<Txn = S::Txn> + 'static,
    F: FnMut(I::Object, bool) -> (O::Object, DeriveResult) + Send + 'static,
{
    let job_name = job_name.into();
    move |params, lifecycle| {
        Derive::new(
            job_name,
            params.db,
            params.in_table,
            params.out_table,
            transform,
        )
        .with_config(params.config)
        .register(&params.jobs, params.scope, lifecycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemill_core::PrimaryIndexer;
    use statemill_memdb::{MemDb, MemTable};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        label: String,
    }

    fn item(id: u32, label: &str) -> Item {
        Item {
            id,
            label: label.to_string(),
        }
    }

    fn table(db: &MemDb, name: &str) -> MemTable<Item, u32> {
        db.table(name, PrimaryIndexer::new("id", |i: &Item| i.id))
            .create()
            .unwrap()
    }

    #[tokio::test]
    async fn test_apply_effects() {
        let db = MemDb::default();
        let out = table(&db, "out");
        let mut txn = db.write_txn(&["out"]).await.unwrap();

        apply_effect(&out, &mut txn, item(1, "a"), DeriveResult::Update).unwrap();
        assert!(out.first(&txn, &out.primary_indexer().query(1)).is_none());

        apply_effect(&out, &mut txn, item(1, "a"), DeriveResult::Insert).unwrap();
        apply_effect(&out, &mut txn, item(1, "b"), DeriveResult::Update).unwrap();
        let (found, _) = out.first(&txn, &out.primary_indexer().query(1)).unwrap();
        assert_eq!(found.label, "b");

        apply_effect(&out, &mut txn, item(1, "b"), DeriveResult::Skip).unwrap();
        apply_effect(&out, &mut txn, item(1, "b"), DeriveResult::Delete).unwrap();
        apply_effect(&out, &mut txn, item(1, "b"), DeriveResult::Delete).unwrap();
        txn.commit().unwrap();

        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_registration_failure_is_returned() {
        let db = Arc::new(MemDb::default());
        let input = table(&db, "in");
        let output = table(&db, "out");
        db.drop_table("in").unwrap();

        let derive = Derive::new("copy", db.clone(), input, output, |i: Item, _: bool| {
            (i, DeriveResult::Insert)
        });
        let health = statemill_job::Health::new();
        let err = derive
            .run(CancelToken::new(), health.reporter("test/copy"))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::TableUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rejects_self_feeding_derivation() {
        let db = Arc::new(MemDb::default());
        let items = table(&db, "items");
        let passthrough = |i: Item, _: bool| (i, DeriveResult::Insert);

        let mut lifecycle = Lifecycle::new();
        let derive = Derive::new("loop", db.clone(), items.clone(), items.clone(), passthrough);
        let err = derive
            .register(&JobRegistry::default(), "test", &mut lifecycle)
            .unwrap_err();
        assert!(matches!(err, JobError::State(StateError::Config(_))));
        assert!(lifecycle.is_empty());

        let derive = Derive::new("", db.clone(), items.clone(), table(&db, "out"), passthrough);
        let health = statemill_job::Health::new();
        let err = derive
            .run(CancelToken::new(), health.reporter("test/unnamed"))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Config(_)));
        assert_eq!(items.tracker_cursor(""), None);
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let db = Arc::new(MemDb::default());
        let input = table(&db, "in");
        let output = table(&db, "out");

        let mut txn = db.write_txn(&["in"]).await.unwrap();
        input.insert(&mut txn, item(1, "a")).unwrap();
        txn.commit().unwrap();

        let copy = |i: Item, deleted: bool| {
            let effect = if deleted {
                DeriveResult::Delete
            } else {
                DeriveResult::Insert
            };
            (i, effect)
        };
        let derive = Derive::new("copy", db.clone(), input.clone(), output.clone(), copy);
        let progress = derive.progress();
        let cancel = CancelToken::new();
        let health = statemill_job::Health::new();
        let handle = tokio::spawn(derive.run(cancel.clone(), health.reporter("test/copy")));

        let reached = tokio::time::timeout(Duration::from_secs(1), progress.wait_for(1))
            .await
            .unwrap();
        assert_eq!(reached, Some(1));
        assert_eq!(output.get(&1), Some(item(1, "a")));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(input.tracker_cursor("copy"), None);
    }
}
