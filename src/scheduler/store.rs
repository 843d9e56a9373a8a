use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::PipelineConfig;
use crate::scheduler::job::{JobId, JobRecord};
use crate::worker::checkout::{GitCli, VersionControl};
use crate::worker::executor::{ProcessRunner, ShellRunner};
use crate::worker::pipeline::Pipeline;

/// Owns every job record and starts a pipeline task for each submission.
///
/// Cloning a `JobStore` yields another handle to the same jobs. Separate
/// stores built with [`JobStore::new`] are fully independent.
///
/// Records are never removed. Readers always get clones; the only writer of a
/// record after insertion is the pipeline task running that job, which
/// replaces the record wholesale through [`JobStore::publish`].
#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
    pipeline: Arc<Pipeline>,
}

impl JobStore {
    /// Store that clones with `git` and runs commands through `sh`.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(GitCli::new()),
            Arc::new(ShellRunner::new()),
        )
    }

    pub fn with_collaborators(
        config: PipelineConfig,
        vcs: Arc<dyn VersionControl>,
        process: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            pipeline: Arc::new(Pipeline::new(config, vcs, process)),
        }
    }

    /// Record a new `pending` job and start running it in the background.
    ///
    /// Returns as soon as the record is inserted; must be called from within
    /// a tokio runtime.
    pub async fn submit(&self, repo_uri: &str, commit: &str, command: &str) -> JobId {
        let record = JobRecord::new(
            repo_uri.to_string(),
            commit.to_string(),
            command.to_string(),
        );
        let job_id = record.id.clone();

        self.jobs
            .write()
            .await
            .insert(job_id.clone(), record.clone());
        tracing::info!(job_id = %job_id, repo_uri, commit, command, "Job submitted");

        let pipeline = self.pipeline.clone();
        let store = self.clone();
        tokio::spawn(async move {
            pipeline.run(store, record).await;
        });

        job_id
    }

    /// Every known job id, in no particular order.
    pub async fn list(&self) -> Vec<JobId> {
        self.jobs.read().await.keys().cloned().collect()
    }

    /// A copy of every known record, taken under a single read lock.
    pub async fn list_detail(&self) -> Vec<JobRecord> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// A copy of the job's record. Unknown ids come back as a failed job
    /// carrying only the requested id.
    pub async fn get_detail(&self, id: &JobId) -> JobRecord {
        match self.jobs.read().await.get(id) {
            Some(record) => record.clone(),
            None => JobRecord::unknown(id.clone()),
        }
    }

    /// A copy of the job's log lines, or nothing for an unknown id.
    pub async fn get_logs(&self, id: &JobId) -> Vec<String> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|record| record.logs.clone())
            .unwrap_or_default()
    }

    /// Replace a job's record with a newer snapshot.
    ///
    /// Snapshots for unknown ids, or that would move the status backwards or
    /// rewrite existing log lines, are dropped. Returns whether the snapshot
    /// was stored.
    pub(crate) async fn publish(&self, snapshot: JobRecord) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(current) = jobs.get_mut(&snapshot.id) else {
            tracing::warn!(job_id = %snapshot.id, "Dropping snapshot for unknown job");
            return false;
        };

        if !current.status.can_become(snapshot.status) || !snapshot.logs.starts_with(&current.logs)
        {
            tracing::warn!(
                job_id = %snapshot.id,
                from = %current.status,
                to = %snapshot.status,
                "Dropping out-of-order job snapshot"
            );
            return false;
        }

        if current.status != snapshot.status {
            tracing::info!(job_id = %snapshot.id, status = %snapshot.status, "Job status changed");
        }
        *current = snapshot;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::JobStatus;
    use crate::worker::testing::{FakeProcess, FakeVcs};
    use std::time::Duration;

    fn fake_store() -> JobStore {
        JobStore::with_collaborators(
            PipelineConfig::default(),
            Arc::new(FakeVcs::default()),
            Arc::new(FakeProcess::succeeding("ok")),
        )
    }

    /// Insert a record directly, without starting a pipeline.
    async fn insert(store: &JobStore, record: JobRecord) {
        store.jobs.write().await.insert(record.id.clone(), record);
    }

    async fn wait_terminal(store: &JobStore, id: &JobId) -> JobRecord {
        for _ in 0..200 {
            let record = store.get_detail(id).await;
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    #[tokio::test]
    async fn submit_returns_listed_ids() {
        let store = fake_store();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(store.submit("/repo", "HEAD", "true").await);
        }

        let mut listed = store.list().await;
        listed.sort();
        ids.sort();
        assert_eq!(listed, ids);
        assert_eq!(store.list_detail().await.len(), 5);
    }

    #[tokio::test]
    async fn stores_are_independent() {
        let a = fake_store();
        let b = fake_store();
        a.submit("/repo", "HEAD", "true").await;

        assert_eq!(a.list().await.len(), 1);
        assert!(b.list().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_data() {
        let store = fake_store();
        let id = JobId::from("nope");

        let detail = store.get_detail(&id).await;
        assert_eq!(detail.id, id);
        assert_eq!(detail.status, JobStatus::Failure);
        assert!(detail.command.is_empty());

        assert!(store.get_logs(&id).await.is_empty());
    }

    #[tokio::test]
    async fn publish_rejects_backwards_status() {
        let store = fake_store();
        let mut record = JobRecord::new("/r".into(), "HEAD".into(), "true".into());
        record.status = JobStatus::Success;
        insert(&store, record.clone()).await;

        let mut stale = record.clone();
        stale.status = JobStatus::Running;
        assert!(!store.publish(stale).await);
        assert_eq!(store.get_detail(&record.id).await.status, JobStatus::Success);
    }

    #[tokio::test]
    async fn publish_rejects_finishing_without_running() {
        let store = fake_store();
        let record = JobRecord::new("/r".into(), "HEAD".into(), "true".into());
        insert(&store, record.clone()).await;

        for status in [JobStatus::Success, JobStatus::Failure] {
            let mut skipped = record.clone();
            skipped.status = status;
            skipped.logs.push("Command executed successfully".into());
            assert!(!store.publish(skipped).await);
        }
        assert_eq!(store.get_detail(&record.id).await.status, JobStatus::Pending);

        let mut running = record.clone();
        running.status = JobStatus::Running;
        assert!(store.publish(running.clone()).await);
        running.status = JobStatus::Failure;
        assert!(store.publish(running).await);
        assert_eq!(store.get_detail(&record.id).await.status, JobStatus::Failure);
    }

    #[tokio::test]
    async fn publish_rejects_rewritten_logs() {
        let store = fake_store();
        let mut record = JobRecord::new("/r".into(), "HEAD".into(), "true".into());
        record.status = JobStatus::Running;
        record.logs = vec!["a".into(), "b".into()];
        insert(&store, record.clone()).await;

        let mut rewritten = record.clone();
        rewritten.logs = vec!["a".into(), "c".into(), "d".into()];
        assert!(!store.publish(rewritten).await);

        let mut extended = record.clone();
        extended.logs.push("c".into());
        assert!(store.publish(extended).await);
        assert_eq!(store.get_logs(&record.id).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn publish_ignores_unknown_job() {
        let store = fake_store();
        let record = JobRecord::new("/r".into(), "HEAD".into(), "true".into());
        assert!(!store.publish(record.clone()).await);
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn list_detail_returns_copies() {
        let store = fake_store();
        let id = store.submit("/repo", "HEAD", "true").await;
        wait_terminal(&store, &id).await;

        let mut details = store.list_detail().await;
        assert_eq!(details.len(), 1);
        details[0].logs.clear();
        details[0].status = JobStatus::Pending;

        let stored = store.get_detail(&id).await;
        assert_eq!(stored.status, JobStatus::Success);
        assert!(!stored.logs.is_empty());
    }
}
