//! External client program bridge
//!
//! The client program is invoked in two ways:
//!
//! - `<program> version` prints the latest protocol version and exits
//! - `<program> connect --version <v> [--print-qr] [--link-preview]` reads the
//!   stored credentials (JSON or `null`) as one line on stdin, then prints one
//!   JSON event per line on stdout until the connection closes
//!
//! The child is killed when its event stream is dropped.

use crate::error::{BridgeError, BridgeResult};
use crate::event::{parse_event, ProtocolVersion};
use crate::{ConnectOptions, EventStream, MessagingClient, EVENT_BUFFER};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Messaging client backed by an external program
pub struct ProcessBridge {
    program: String,
}

impl ProcessBridge {
    /// Create a bridge for the given program
    ///
    /// # Arguments
    /// * `program` - Executable name or path of the client program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program this bridge runs
    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn_error(&self, source: std::io::Error) -> BridgeError {
        BridgeError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl MessagingClient for ProcessBridge {
    fn name(&self) -> &str {
        &self.program
    }

    async fn latest_version(&self) -> BridgeResult<ProtocolVersion> {
        let output = Command::new(&self.program)
            .arg("version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(BridgeError::Command(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let version = ProtocolVersion::parse(&String::from_utf8_lossy(&output.stdout))
            .ok_or(BridgeError::MissingVersion)?;
        debug!("{}: protocol version {}", self.program, version);
        Ok(version)
    }

    async fn connect(&self, options: ConnectOptions) -> BridgeResult<EventStream> {
        let mut command = Command::new(&self.program);
        command
            .arg("connect")
            .arg("--version")
            .arg(options.version.to_string());
        if options.print_qr_in_terminal {
            command.arg("--print-qr");
        }
        if options.high_quality_link_preview {
            command.arg("--link-preview");
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Hand over stored credentials, then close stdin
        if let Some(mut stdin) = child.stdin.take() {
            let mut line = serde_json::to_vec(&options.credentials)?;
            line.push(b'\n');
            stdin.write_all(&line).await?;
            stdin.shutdown().await?;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Refused("client stdout unavailable".to_string()))?;

        info!("{}: connecting with protocol {}", self.program, options.version);

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(pump_events(self.program.clone(), child, stdout, tx));
        Ok(rx)
    }
}

/// Forward parsed stdout lines until EOF or the receiver goes away
///
/// A dropped receiver kills the child even if it never prints anything.
async fn pump_events(
    program: String,
    mut child: Child,
    stdout: ChildStdout,
    tx: mpsc::Sender<crate::ClientEvent>,
) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tx.closed() => {
                stop_client(&program, &mut child).await;
                return;
            }
        };

        match line {
            Ok(Some(line)) => {
                if let Some(event) = parse_event(&line) {
                    if tx.send(event).await.is_err() {
                        stop_client(&program, &mut child).await;
                        return;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("{}: failed to read client output: {}", program, e);
                break;
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => info!("{}: connection closed", program),
        Ok(status) => warn!("{}: client exited with {}", program, status),
        Err(e) => warn!("{}: failed to reap client: {}", program, e),
    }
}

/// Kill the child and reap it
async fn stop_client(program: &str, child: &mut Child) {
    debug!("{}: event stream dropped, stopping client", program);
    if let Err(e) = child.kill().await {
        warn!("{}: failed to kill client: {}", program, e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::ClientEvent;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-client");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_latest_version() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), r#"echo "[2, 3000, 1023223821]""#);

        let bridge = ProcessBridge::new(script);
        let version = bridge.latest_version().await.unwrap();
        assert_eq!(version.to_string(), "2.3000.1023223821");
    }

    #[tokio::test]
    async fn test_version_command_failure() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "echo boom >&2\nexit 3");

        let bridge = ProcessBridge::new(script);
        let err = bridge.latest_version().await.unwrap_err();
        assert!(matches!(err, BridgeError::Command(ref msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let bridge = ProcessBridge::new("/nonexistent/pairgate-client");
        let err = bridge.latest_version().await.unwrap_err();
        assert!(matches!(err, BridgeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_connect_streams_events() {
        let dir = tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"read creds
echo "starting up"
echo '{"type":"connection.update","qr":"2@abc"}'
echo "{\"type\":\"creds.update\",\"creds\":$creds}"
echo '{"type":"connection.update","pairingCode":"ABC-123"}'"#,
        );

        let bridge = ProcessBridge::new(script);
        let options = ConnectOptions::new(
            ProtocolVersion("2.3000.1".to_string()),
            Some(serde_json::json!({ "registered": false })),
        );
        let mut events = bridge.connect(options).await.unwrap();

        assert_eq!(events.recv().await, Some(ClientEvent::qr("2@abc")));
        assert_eq!(
            events.recv().await,
            Some(ClientEvent::CredentialsUpdate {
                creds: serde_json::json!({ "registered": false })
            })
        );
        assert_eq!(events.recv().await, Some(ClientEvent::pairing_code("ABC-123")));
        assert_eq!(events.recv().await, None);
    }

    fn is_running(pid: &str) -> bool {
        std::process::Command::new("kill")
            .args(["-0", pid])
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_dropping_stream_kills_silent_client() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = write_script(
            dir.path(),
            &format!("read creds\necho $$ > {}\nexec sleep 30", pid_file.display()),
        );

        let bridge = ProcessBridge::new(script);
        let options = ConnectOptions::new(ProtocolVersion("2.3000.1".to_string()), None);
        let events = bridge.connect(options).await.unwrap();

        let mut pid = String::new();
        for _ in 0..200 {
            if let Ok(contents) = std::fs::read_to_string(&pid_file) {
                if contents.ends_with('\n') {
                    pid = contents.trim().to_string();
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!pid.is_empty(), "client never started");
        assert!(is_running(&pid));

        drop(events);

        let mut stopped = false;
        for _ in 0..200 {
            if !is_running(&pid) {
                stopped = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(stopped, "client {} still running after stream dropped", pid);
    }
}
