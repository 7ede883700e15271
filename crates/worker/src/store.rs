//! In-process job registry

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::job::Job;

/// Jobs started by this process, retained until it exits
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Arc<Job>>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Arc<Job>) {
        self.jobs.write().insert(job.id(), job);
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Job>> {
        self.jobs.read().get(id).cloned()
    }

    /// Looks up a job by its textual id; malformed ids are simply unknown.
    pub fn find(&self, id: &str) -> Option<Arc<Job>> {
        Uuid::parse_str(id).ok().and_then(|id| self.get(&id))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Jobs still running
    pub fn running(&self) -> Vec<Arc<Job>> {
        self.jobs
            .read()
            .values()
            .filter(|job| !job.status().is_terminal())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, JobStatus};
    use chatbench_domain::SuiteMeta;

    fn job() -> Arc<Job> {
        Arc::new(Job::new(
            JobSpec {
                suite_path: "s.yaml".to_string(),
                base_url: "http://localhost:1234/v1".to_string(),
                models: vec!["m".to_string()],
                runs: 1,
                warmup: 0,
                timeout: 60,
                use_llm_judge: false,
                judge_model: None,
            },
            SuiteMeta::default(),
            1,
        ))
    }

    #[test]
    fn test_insert_and_find() {
        let store = JobStore::new();
        let job = job();
        store.insert(job.clone());

        assert_eq!(store.len(), 1);
        assert!(store.find(&job.id().to_string()).is_some());
        assert!(store.find("not-a-uuid").is_none());
        assert!(store.find(&Uuid::new_v4().to_string()).is_none());
    }

    #[test]
    fn test_running_excludes_finished() {
        let store = JobStore::new();
        let finished = job();
        finished.finish(JobStatus::Done);
        store.insert(finished);
        store.insert(job());

        assert_eq!(store.running().len(), 1);
    }
}
