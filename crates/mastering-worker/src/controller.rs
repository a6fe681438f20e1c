//! Child-process lifecycle: launch, cooperative polling, cancellation, import.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::error::{WorkerError, WorkerResult};
use crate::extstate::{keys, ExtState, CANCEL_COMMAND, SECTION};
use crate::job::JobRequest;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// What the host does with a finished master.
#[async_trait]
pub trait ProjectImporter: Send + Sync {
    async fn import(&self, path: &Path) -> Result<(), String>;
}

/// Importer that runs a caller-configured command, substituting `{path}`
/// with the produced file. The command is the host's own import hook.
pub struct HostCommandImporter {
    program: String,
    args: Vec<String>,
}

impl HostCommandImporter {
    pub fn from_template(template: &str) -> WorkerResult<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| WorkerError::InvalidInput("empty import command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl ProjectImporter for HostCommandImporter {
    async fn import(&self, path: &Path) -> Result<(), String> {
        let path_text = path.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{path}", &path_text))
            .collect();
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|error| format!("failed to run import command: {error}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("import command exited with {status}"))
        }
    }
}

/// Importer used when no import hook is configured: the host is expected to
/// pick the file up itself once `Status` reads `Done`.
pub struct NoopImporter;

#[async_trait]
impl ProjectImporter for NoopImporter {
    async fn import(&self, path: &Path) -> Result<(), String> {
        tracing::info!("no import command configured; master left at {}", path.display());
        Ok(())
    }
}

/// Signal returned by [`JobController::poll_tick`]: whether the caller
/// should schedule another tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Lifecycle of the single outstanding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

pub struct WorkerConfig {
    /// Interpreter the mastering CLI runs under.
    pub interpreter: PathBuf,
    /// Path to the mastering CLI entry point.
    pub tool: PathBuf,
    /// Subfolder of the project directory the output lands in.
    pub output_subfolder: String,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            tool: PathBuf::from("mg_cli.py"),
            output_subfolder: "Matchering_Masters".to_string(),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Owns the single child-process handle and publishes every observable
/// transition to the `Status` key.
pub struct JobController {
    config: WorkerConfig,
    store: Arc<dyn ExtState>,
    importer: Arc<dyn ProjectImporter>,
    child: Option<Child>,
    state: JobState,
    result_path: Option<PathBuf>,
}

impl JobController {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn ExtState>,
        importer: Arc<dyn ProjectImporter>,
    ) -> Self {
        Self {
            config,
            store,
            importer,
            child: None,
            state: JobState::Idle,
            result_path: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Validate the request, resolve the output path and launch the child.
    ///
    /// A second submit while a job is active is rejected without touching the
    /// `Status` key, so the running job's progress channel stays intact.
    pub async fn submit(&mut self, project_dir: &Path, request: &JobRequest) -> WorkerResult<()> {
        if self.child.is_some() {
            tracing::warn!("submit rejected: a mastering job is already active");
            return Err(WorkerError::InvalidInput(
                "a mastering job is already running".to_string(),
            ));
        }

        if let Err(error) = request.validate() {
            let message = match &error {
                WorkerError::InvalidInput(msg) => msg.clone(),
                other => other.to_string(),
            };
            self.publish(&format!("Error: {message}")).await?;
            return Err(error);
        }

        let output_dir = project_dir.join(&self.config.output_subfolder);
        if let Err(error) = tokio::fs::create_dir_all(&output_dir).await {
            self.publish(&format!("Error: Could not create output directory: {error}"))
                .await?;
            return Err(WorkerError::Environment(format!(
                "failed to create output directory {}: {error}",
                output_dir.display()
            )));
        }

        let result_path = output_dir.join(request.output_file_name());

        let mut command = Command::new(&self.config.interpreter);
        command
            .arg("-X")
            .arg("utf8")
            .arg(&self.config.tool)
            .arg(request.bit_depth.flag())
            .arg(&request.target)
            .arg(&request.reference)
            .arg(&result_path)
            .env("PYTHONIOENCODING", "utf-8");
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        match command.spawn() {
            Ok(child) => {
                tracing::info!(
                    pid = child.id().unwrap_or(0),
                    "mastering process started, output {}",
                    result_path.display()
                );
                self.child = Some(child);
                self.result_path = Some(result_path);
                self.state = JobState::Running;
                self.publish("Running...").await
            }
            Err(error) => {
                self.publish(&format!("Error: failed to launch mastering process: {error}"))
                    .await?;
                Err(WorkerError::Environment(format!(
                    "failed to launch mastering process: {error}"
                )))
            }
        }
    }

    /// One cooperative poll: honor a pending cancel, otherwise check the
    /// child's exit status without blocking.
    pub async fn poll_tick(&mut self) -> WorkerResult<Tick> {
        let Some(child) = self.child.as_mut() else {
            return Ok(Tick::Stop);
        };

        let command = self.store.get(SECTION, keys::COMMAND).await?;
        if command.as_deref() == Some(CANCEL_COMMAND) {
            tracing::info!("cancel requested by host, killing mastering process");
            if let Err(error) = child.start_kill() {
                tracing::warn!("failed to kill mastering process: {error}");
            }
            let _ = child.wait().await;
            self.child = None;
            self.state = JobState::Cancelled;
            self.publish("Error: Operation cancelled by user.").await?;
            self.store.set(SECTION, keys::COMMAND, "").await?;
            return Ok(Tick::Stop);
        }

        let exit = child
            .try_wait()
            .map_err(|error| WorkerError::Internal(format!("failed to poll child: {error}")))?;
        match exit {
            None => {
                let pid = child.id().unwrap_or(0);
                self.publish(&format!("Running... (PID: {pid})")).await?;
                Ok(Tick::Continue)
            }
            Some(status) => {
                self.child = None;
                self.finish(status.code().unwrap_or(-1)).await?;
                Ok(Tick::Stop)
            }
        }
    }

    /// Drive [`poll_tick`](Self::poll_tick) on a fixed interval until the job
    /// reaches a terminal state.
    pub async fn run(&mut self) -> WorkerResult<()> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            ticker.tick().await;
            if self.poll_tick().await? == Tick::Stop {
                return Ok(());
            }
        }
    }

    async fn finish(&mut self, code: i32) -> WorkerResult<()> {
        if code != 0 {
            tracing::warn!("mastering process failed with code {code}");
            self.state = JobState::Failed;
            return self
                .publish(&format!("Error: Mastering failed (Code: {code})."))
                .await;
        }

        self.state = JobState::Completed;
        self.publish("Completed! Importing file...").await?;
        match self.result_path.clone() {
            Some(path) => match self.importer.import(&path).await {
                Ok(()) => self.publish("Done").await,
                Err(error) => {
                    tracing::warn!("import failed: {error}");
                    self.publish("Error: Succeeded, but failed to import file.")
                        .await
                }
            },
            None => {
                self.publish("Error: Succeeded, but failed to import file.")
                    .await
            }
        }
    }

    async fn publish(&self, status: &str) -> WorkerResult<()> {
        tracing::debug!("status: {status}");
        self.store.set(SECTION, keys::STATUS, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extstate::MemoryExtState;
    use crate::job::BitDepth;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingImporter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl RecordingImporter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProjectImporter for RecordingImporter {
        async fn import(&self, _path: &Path) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("import refused".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn new_controller(
        importer: Arc<RecordingImporter>,
    ) -> (JobController, Arc<MemoryExtState>) {
        let store = Arc::new(MemoryExtState::default());
        let controller =
            JobController::new(WorkerConfig::default(), store.clone(), importer);
        (controller, store)
    }

    fn request(target: &str, reference: &str) -> JobRequest {
        JobRequest {
            target: PathBuf::from(target),
            reference: PathBuf::from(reference),
            reference_name: "ref".to_string(),
            bit_depth: BitDepth::Pcm24,
        }
    }

    async fn status(store: &MemoryExtState) -> String {
        store
            .get(SECTION, keys::STATUS)
            .await
            .expect("get")
            .unwrap_or_default()
    }

    fn attach_child(controller: &mut JobController, script: &str) {
        let child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .spawn()
            .expect("spawn test child");
        controller.child = Some(child);
        controller.state = JobState::Running;
        controller.result_path = Some(PathBuf::from("/tmp/out.wav"));
    }

    async fn poll_until_stop(controller: &mut JobController) {
        for _ in 0..200 {
            if controller.poll_tick().await.expect("tick") == Tick::Stop {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn missing_path_publishes_error_without_launching() {
        let importer = RecordingImporter::new(false);
        let (mut controller, store) = new_controller(importer.clone());
        let dir = tempfile::tempdir().expect("tempdir");

        let result = controller.submit(dir.path(), &request("", "/ref.wav")).await;
        assert!(result.is_err());
        assert!(controller.child.is_none());
        assert!(status(&store).await.starts_with("Error:"));
        assert_eq!(importer.calls(), 0);
    }

    #[tokio::test]
    async fn mp3_rejected_before_launch() {
        let importer = RecordingImporter::new(false);
        let (mut controller, store) = new_controller(importer);
        let dir = tempfile::tempdir().expect("tempdir");

        let result = controller
            .submit(dir.path(), &request("/mix.MP3", "/ref.wav"))
            .await;
        assert!(result.is_err());
        assert!(controller.child.is_none());
        assert!(status(&store).await.contains(".mp3 files are not supported"));
    }

    #[tokio::test]
    async fn zero_exit_completes_and_imports_once() {
        let importer = RecordingImporter::new(false);
        let (mut controller, store) = new_controller(importer.clone());
        attach_child(&mut controller, "exit 0");

        poll_until_stop(&mut controller).await;
        assert_eq!(controller.state(), JobState::Completed);
        assert_eq!(importer.calls(), 1);
        assert_eq!(status(&store).await, "Done");
    }

    #[tokio::test]
    async fn failed_import_publishes_distinct_error() {
        let importer = RecordingImporter::new(true);
        let (mut controller, store) = new_controller(importer.clone());
        attach_child(&mut controller, "exit 0");

        poll_until_stop(&mut controller).await;
        assert_eq!(importer.calls(), 1);
        assert_eq!(
            status(&store).await,
            "Error: Succeeded, but failed to import file."
        );
    }

    #[tokio::test]
    async fn nonzero_exit_fails_without_import() {
        let importer = RecordingImporter::new(false);
        let (mut controller, store) = new_controller(importer.clone());
        attach_child(&mut controller, "exit 3");

        poll_until_stop(&mut controller).await;
        assert_eq!(controller.state(), JobState::Failed);
        assert_eq!(importer.calls(), 0);
        assert!(status(&store).await.contains("Code: 3"));
    }

    #[tokio::test]
    async fn cancel_kills_child_and_clears_flag() {
        let importer = RecordingImporter::new(false);
        let (mut controller, store) = new_controller(importer.clone());
        attach_child(&mut controller, "sleep 30");

        store
            .set(SECTION, keys::COMMAND, CANCEL_COMMAND)
            .await
            .expect("set");
        let tick = controller.poll_tick().await.expect("tick");
        assert_eq!(tick, Tick::Stop);
        assert_eq!(controller.state(), JobState::Cancelled);
        assert!(controller.child.is_none());
        assert_eq!(status(&store).await, "Error: Operation cancelled by user.");
        assert_eq!(
            store.get(SECTION, keys::COMMAND).await.expect("get"),
            Some(String::new())
        );
        assert_eq!(importer.calls(), 0);

        // The loop is over; further ticks are no-ops.
        assert_eq!(controller.poll_tick().await.expect("tick"), Tick::Stop);
    }

    #[tokio::test]
    async fn second_submit_rejected_while_running() {
        let importer = RecordingImporter::new(false);
        let (mut controller, store) = new_controller(importer);
        attach_child(&mut controller, "sleep 30");
        store
            .set(SECTION, keys::STATUS, "Running...")
            .await
            .expect("set");
        let dir = tempfile::tempdir().expect("tempdir");

        let result = controller
            .submit(dir.path(), &request("/mix.wav", "/ref.wav"))
            .await;
        assert!(result.is_err());
        // The active job's status channel is untouched.
        assert_eq!(status(&store).await, "Running...");

        if let Some(child) = controller.child.as_mut() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}
