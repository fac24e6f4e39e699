//! Shared test harness: a scripted job client and snapshot builders.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use assetforge_events::EventBus;
use assetforge_pipeline::{MemoryStore, PipelineRunner};
use assetforge_tripo::task::{JobType, ModelRef, PbrModelRef, RemoteJob, TaskOutput, TaskStatus};
use assetforge_tripo::{JobClient, JobRequest, PollOptions, TripoApiError};

/// A job client that serves pre-scripted status sequences.
///
/// Each call to [`ScriptedClient::script`] queues one job's worth of
/// status snapshots for a job type; each `submit` of that type consumes
/// the next queued script and mints a fresh task id. `get_status` steps
/// through the task's snapshots, repeating the last one forever.
pub struct ScriptedClient {
    scripts: Mutex<HashMap<&'static str, VecDeque<Vec<RemoteJob>>>>,
    tasks: Mutex<HashMap<String, VecDeque<RemoteJob>>>,
    submits: Mutex<HashMap<&'static str, usize>>,
    next_task: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            submits: Mutex::new(HashMap::new()),
            next_task: AtomicUsize::new(1),
        }
    }

    /// Queue the status snapshots the next job of `job_type` will serve.
    pub fn script(&self, job_type: JobType, snapshots: Vec<RemoteJob>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(job_type.as_str())
            .or_default()
            .push_back(snapshots);
    }

    /// How many jobs of `job_type` have been submitted.
    pub fn submit_count(&self, job_type: JobType) -> usize {
        self.submits
            .lock()
            .unwrap()
            .get(job_type.as_str())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl JobClient for ScriptedClient {
    async fn submit(
        &self,
        _credential: &str,
        request: &JobRequest,
    ) -> Result<RemoteJob, TripoApiError> {
        let job_type = request.job_type();
        *self
            .submits
            .lock()
            .unwrap()
            .entry(job_type.as_str())
            .or_insert(0) += 1;

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(job_type.as_str())
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| panic!("no script queued for {}", job_type.as_str()));

        let n = self.next_task.fetch_add(1, Ordering::SeqCst);
        let task_id = format!("task-{}-{n}", job_type.as_str());
        let snapshots = script
            .into_iter()
            .map(|mut job| {
                job.task_id = task_id.clone();
                job.job_type = job_type;
                job
            })
            .collect();
        self.tasks.lock().unwrap().insert(task_id.clone(), snapshots);
        Ok(RemoteJob::queued(task_id, job_type))
    }

    async fn get_status(
        &self,
        _credential: &str,
        task_id: &str,
    ) -> Result<RemoteJob, TripoApiError> {
        let mut tasks = self.tasks.lock().unwrap();
        let snapshots = tasks
            .get_mut(task_id)
            .ok_or_else(|| TripoApiError::NotFound(task_id.to_string()))?;
        let job = if snapshots.len() > 1 {
            snapshots.pop_front().unwrap()
        } else {
            snapshots.front().cloned().expect("script must not be empty")
        };
        Ok(job)
    }
}

// ---- snapshot builders ----

fn snapshot(status: TaskStatus) -> RemoteJob {
    RemoteJob {
        task_id: String::new(),
        job_type: JobType::TextToModel,
        status,
        progress: None,
        output: None,
        error: None,
    }
}

pub fn queued() -> RemoteJob {
    snapshot(TaskStatus::Queued)
}

pub fn running(percent: u8) -> RemoteJob {
    let mut job = snapshot(TaskStatus::Running);
    job.progress = Some(percent);
    job
}

pub fn success_model(url: &str) -> RemoteJob {
    let mut job = snapshot(TaskStatus::Success);
    job.output = Some(TaskOutput {
        model: Some(ModelRef {
            url: url.to_string(),
        }),
        pbr_model: None,
        riggable: None,
    });
    job
}

pub fn success_pbr(url: &str) -> RemoteJob {
    let mut job = snapshot(TaskStatus::Success);
    job.output = Some(TaskOutput {
        model: None,
        pbr_model: Some(PbrModelRef::Url(url.to_string())),
        riggable: None,
    });
    job
}

pub fn success_riggable(riggable: bool) -> RemoteJob {
    let mut job = snapshot(TaskStatus::Success);
    job.output = Some(TaskOutput {
        model: None,
        pbr_model: None,
        riggable: Some(riggable),
    });
    job
}

pub fn failed(message: &str) -> RemoteJob {
    let mut job = snapshot(TaskStatus::Failed);
    job.error = Some(message.to_string());
    job
}

// ---- fixture wiring ----

/// Millisecond-scale polling so tests finish quickly.
pub fn fast_options() -> PollOptions {
    PollOptions {
        initial_interval: Duration::from_millis(1),
        backoff_multiplier: 1.5,
        max_interval: Duration::from_millis(4),
        max_total: Duration::from_secs(2),
    }
}

pub struct Fixture {
    pub client: Arc<ScriptedClient>,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<EventBus>,
    pub runner: Arc<PipelineRunner>,
}

pub fn fixture() -> Fixture {
    fixture_with_options(fast_options())
}

pub fn fixture_with_options(options: PollOptions) -> Fixture {
    let client = Arc::new(ScriptedClient::new());
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::default());
    let runner = Arc::new(
        PipelineRunner::new(
            Arc::clone(&client) as Arc<dyn JobClient>,
            Arc::clone(&store) as Arc<dyn assetforge_pipeline::AssetStore>,
            Arc::clone(&bus),
            "test-key",
        )
        .with_poll_options(options),
    );
    Fixture {
        client,
        store,
        bus,
        runner,
    }
}
