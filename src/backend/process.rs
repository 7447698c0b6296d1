//! Backend reached over the stdio of a child process.
//!
//! One JSON document per line in each direction:
//!
//! - request:  `{"id": 7, "command": "install_localization", "args": {"localization": {...}}}`
//! - response: `{"id": 7, "result": null}` or `{"id": 7, "error": "Game is running"}`
//! - event:    `{"event": "play:updating", "payload": "ru-main"}`
//!
//! Responses may arrive in any order; events are forwarded to subscribers in
//! the order the process writes them.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use super::{command, Backend, BackendEvent, EVENT_CAPACITY};
use crate::error::{CoreError, Result};
use crate::models::{AppSettings, AppState, Localization};

type Reply = std::result::Result<Value, String>;
type Pending = Arc<Mutex<PendingCalls>>;

/// Calls awaiting a response. Once `closed`, no new call may register.
#[derive(Default)]
struct PendingCalls {
    closed: bool,
    calls: HashMap<u64, oneshot::Sender<Reply>>,
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    command: &'a str,
    args: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Incoming {
    Response {
        id: u64,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

/// Backend child process speaking line-delimited JSON
pub struct ProcessBackend {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    events: broadcast::Sender<BackendEvent>,
    /// Owns the child; aborting it kills the process
    reader: JoinHandle<()>,
    exit_status: Arc<Mutex<Option<ExitStatus>>>,
}

impl ProcessBackend {
    /// Spawn the backend executable and start reading its output
    pub fn spawn(program: &str, args: &[String]) -> std::io::Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("backend stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("backend stdout unavailable"))?;

        tracing::info!("Spawned backend process: {} {:?}", program, args);

        let pending: Pending = Arc::default();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let exit_status = Arc::new(Mutex::new(None));
        let reader = tokio::spawn(read_loop(
            child,
            stdout,
            pending.clone(),
            events.clone(),
            exit_status.clone(),
        ));

        Ok(Self {
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            events,
            reader,
            exit_status,
        })
    }

    /// How the backend process ended, once it has exited and been reaped
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit_status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn call<T: DeserializeOwned>(&self, command: &str, args: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if pending.closed {
                return Err(CoreError::backend(command, "backend process exited"));
            }
            pending.calls.insert(id, tx);
        }

        let mut line = serde_json::to_string(&Request { id, command, args })
            .map_err(|e| CoreError::backend(command, e.to_string()))?;
        line.push('\n');

        let written = {
            let mut stdin = self.stdin.lock().await;
            match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            lock(&self.pending).calls.remove(&id);
            return Err(CoreError::backend(command, format!("write failed: {}", e)));
        }

        tracing::debug!("-> {} #{}", command, id);

        let value = match rx.await {
            Ok(Ok(value)) => value,
            Ok(Err(message)) => return Err(CoreError::backend(command, message)),
            Err(_) => return Err(CoreError::backend(command, "backend process exited")),
        };

        serde_json::from_value(value)
            .map_err(|e| CoreError::backend(command, format!("invalid response: {}", e)))
    }
}

impl Drop for ProcessBackend {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn lock(pending: &Pending) -> std::sync::MutexGuard<'_, PendingCalls> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn read_loop(
    mut child: Child,
    stdout: ChildStdout,
    pending: Pending,
    events: broadcast::Sender<BackendEvent>,
    exit_status: Arc<Mutex<Option<ExitStatus>>>,
) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read from backend: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Incoming>(&line) {
            Ok(Incoming::Response { id, result, error }) => {
                let reply = match error {
                    Some(message) => Err(message),
                    None => Ok(result),
                };
                let sender = lock(&pending).calls.remove(&id);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => tracing::warn!("Response for unknown request #{}", id),
                }
            }
            Ok(Incoming::Event { event, payload }) => match BackendEvent::from_wire(&event, payload) {
                Ok(Some(decoded)) => {
                    // No subscribers is fine; the event is simply unobserved
                    let _ = events.send(decoded);
                }
                Ok(None) => tracing::debug!("Ignoring unknown backend event '{}'", event),
                Err(e) => tracing::warn!("Malformed payload for '{}': {}", event, e),
            },
            Err(e) => tracing::warn!("Unparseable backend line: {}", e),
        }
    }

    tracing::warn!("Backend output closed");
    // Dropping the senders fails every outstanding call
    {
        let mut pending = lock(&pending);
        pending.closed = true;
        pending.calls.clear();
    }

    match child.wait().await {
        Ok(status) => {
            tracing::info!("Backend process exited: {}", status);
            *exit_status.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
        }
        Err(e) => tracing::error!("Failed to reap backend process: {}", e),
    }
}

#[async_trait]
impl Backend for ProcessBackend {
    async fn get_app_state(&self) -> Result<AppState> {
        self.call(command::GET_APP_STATE, json!({})).await
    }

    async fn update_settings(&self, settings: &AppSettings) -> Result<()> {
        self.call(command::UPDATE_SETTINGS, json!({ "newSettings": settings }))
            .await
    }

    async fn set_game_directory(&self, directory: Option<&str>) -> Result<()> {
        self.call(command::SET_GAME_DIRECTORY, json!({ "directory": directory }))
            .await
    }

    async fn get_available_localizations(&self) -> Result<Vec<Localization>> {
        self.call(command::GET_AVAILABLE_LOCALIZATIONS, json!({})).await
    }

    async fn get_latest_version(&self) -> Result<String> {
        self.call(command::GET_LATEST_VERSION, json!({})).await
    }

    async fn install_localization(&self, localization: &Localization) -> Result<()> {
        self.call(command::INSTALL_LOCALIZATION, json!({ "localization": localization }))
            .await
    }

    async fn uninstall_localization(&self, localization: &Localization) -> Result<()> {
        self.call(command::UNINSTALL_LOCALIZATION, json!({ "localization": localization }))
            .await
    }

    async fn repair_localization(&self, localization: &Localization) -> Result<()> {
        self.call(command::REPAIR_LOCALIZATION, json!({ "localization": localization }))
            .await
    }

    async fn update_and_play(&self) -> Result<()> {
        self.call(command::UPDATE_AND_PLAY, json!({})).await
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}
