//! Session state machine and the snapshot store it owns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::WatchConfig;
use crate::error::SessionError;
use crate::snapshot::container::{archive_path, write_container};
use crate::snapshot::model::{InvocationRecord, SessionState, SnapshotContainer};

/// Handle shared between the interception shim and the host program.
pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    instance_id: String,
    snapshot_override: Option<String>,
    output_dir: PathBuf,
    dump_iter_count: usize,
    dump_counter: usize,
    /// Containers started so far; names rotations of an overridden id.
    generation: u32,
    last_session_secs: i64,
    container: Option<SnapshotContainer>,
}

impl Session {
    /// An idle session. `config.initial_state` is not applied.
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            state: SessionState::Idle,
            instance_id: config.instance_id.clone(),
            snapshot_override: config.snapshot_id.clone(),
            output_dir: config.output_dir.clone(),
            dump_iter_count: config.dump_iter_count,
            dump_counter: 0,
            generation: 0,
            last_session_secs: 0,
            container: None,
        }
    }

    /// A session moved into `config.initial_state`.
    pub fn from_config(config: &WatchConfig) -> Result<Self, SessionError> {
        let mut session = Self::new(config);
        match config.initial_state {
            SessionState::Idle => {}
            SessionState::Watching => session.start()?,
            SessionState::Testing => session.enter_testing()?,
        }
        Ok(session)
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_watching(&self) -> bool {
        self.state == SessionState::Watching
    }

    pub fn session_id(&self) -> Option<&str> {
        self.container.as_ref().map(|c| c.session_id.as_str())
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.container.as_ref().map(|c| c.snapshot_id.as_str())
    }

    pub fn dump_counter(&self) -> usize {
        self.dump_counter
    }

    pub fn dump_iter_count(&self) -> usize {
        self.dump_iter_count
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The container currently being filled.
    pub fn container(&self) -> Option<&SnapshotContainer> {
        self.container.as_ref()
    }

    /// Where the current container will be written.
    pub fn archive_path(&self) -> Option<PathBuf> {
        self.snapshot_id()
            .map(|id| archive_path(&self.output_dir, id))
    }

    /// True once the current container has reached the rotation threshold.
    pub fn should_dump(&self) -> bool {
        self.is_watching() && self.dump_iter_count > 0 && self.dump_counter >= self.dump_iter_count
    }

    /// IDLE -> WATCHING with a fresh session identity and an empty container.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Idle, "start")?;

        let session_id = self.next_session_id();
        let snapshot_id = match (&self.snapshot_override, self.generation) {
            (Some(id), 0) => id.clone(),
            (Some(id), n) => format!("{id}_{n}"),
            (None, _) => session_id.clone(),
        };
        self.generation += 1;

        tracing::info!(
            instance = %self.instance_id,
            session_id = %session_id,
            snapshot_id = %snapshot_id,
            "watching started"
        );
        self.container = Some(SnapshotContainer::new(
            self.instance_id.clone(),
            snapshot_id,
            session_id,
        ));
        self.dump_counter = 0;
        self.state = SessionState::Watching;
        Ok(())
    }

    /// WATCHING -> IDLE. Writes the container and returns the archive path.
    ///
    /// On a write failure the session stays WATCHING with its buffer intact.
    pub fn stop(&mut self) -> Result<PathBuf, SessionError> {
        let path = self.flush()?;
        self.container = None;
        self.state = SessionState::Idle;
        tracing::info!(path = %path.display(), "watching stopped");
        Ok(path)
    }

    /// Rotation: write the current container and continue in a new one.
    pub fn dump(&mut self) -> Result<PathBuf, SessionError> {
        let path = self.stop()?;
        self.start()?;
        Ok(path)
    }

    /// Append a record to the current container. Returns its run id.
    pub fn record(&mut self, record: InvocationRecord) -> Result<u64, SessionError> {
        self.expect_state(SessionState::Watching, "record")?;
        let Some(container) = self.container.as_mut() else {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                action: "record",
            });
        };
        let run_id = container.push(record);
        self.dump_counter += 1;
        Ok(run_id)
    }

    /// Write everything buffered so far to the container's archive.
    ///
    /// Identity and records are kept, so a later flush rewrites the same
    /// archive with a superset of the records. The buffer is not cleared
    /// here; [`stop`](Self::stop) clears it once the final write succeeds.
    pub fn flush(&mut self) -> Result<PathBuf, SessionError> {
        self.expect_state(SessionState::Watching, "flush")?;
        let Some(container) = self.container.as_ref() else {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                action: "flush",
            });
        };
        let path = write_container(&self.output_dir, container)?;
        self.dump_counter = 0;
        Ok(path)
    }

    /// IDLE -> TESTING. Calls pass through unrecorded until left.
    pub fn enter_testing(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Idle, "enter testing")?;
        self.state = SessionState::Testing;
        Ok(())
    }

    /// TESTING -> IDLE.
    pub fn leave_testing(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Testing, "leave testing")?;
        self.state = SessionState::Idle;
        Ok(())
    }

    fn expect_state(
        &self,
        expected: SessionState,
        action: &'static str,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    fn next_session_id(&mut self) -> String {
        let now = chrono::Utc::now().timestamp();
        let secs = now.max(self.last_session_secs + 1);
        self.last_session_secs = secs;
        secs.to_string()
    }
}
