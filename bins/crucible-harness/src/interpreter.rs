/// Python runtime driven over a line-delimited JSON channel
///
/// The interpreter runs the bundled loader program. Each `load` starts a
/// fresh process, so no namespace ever outlives the submission it served.

use crate::runner::{Invocation, LoadFailure, Runtime, RuntimeFault};
use crucible_common::value::Value;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use tracing::debug;

const LOADER: &str = include_str!("loader.py");

#[derive(Serialize)]
struct LoadRequest<'a> {
    code: &'a str,
    function_name: &'a str,
}

#[derive(Serialize)]
struct CallRequest<'a> {
    args: &'a [Value],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Reply {
    Loaded,
    Missing,
    LoadError(String),
    Value(Value),
    Raised(String),
    Unrepresentable(String),
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Worker {
    fn spawn(command: &[String]) -> io::Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty interpreter command"))?;

        let mut child = Command::new(program)
            .args(args)
            .arg("-c")
            .arg(LOADER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "interpreter stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "interpreter stdout unavailable"))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn send<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.stdin.write_all(&line)?;
        self.stdin.flush()
    }

    /// `Ok(None)` means the interpreter closed the channel
    fn receive(&mut self) -> io::Result<Option<Reply>> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        serde_json::from_str(&line)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn exchange<T: Serialize>(&mut self, message: &T) -> io::Result<Option<Reply>> {
        match self.send(message) {
            Ok(()) => self.receive(),
            // A dead interpreter surfaces as a broken pipe on write
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stop the process and describe how it ended
    fn reap(mut self) -> String {
        let status = match self.child.try_wait() {
            Ok(Some(status)) => Ok(status),
            _ => {
                let _ = self.child.kill();
                self.child.wait()
            }
        };
        describe_status(status)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn describe_status(status: io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => status.to_string(),
        Err(e) => format!("status unknown: {}", e),
    }
}

/// Runs submissions in a Python interpreter subprocess
pub struct PythonRuntime {
    command: Vec<String>,
    worker: Option<Worker>,
}

impl PythonRuntime {
    /// `command` is the interpreter and its flags, e.g. `["python3", "-I"]`
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            worker: None,
        }
    }

    fn lost(worker: Worker, during: &str, detail: Option<io::Error>) -> String {
        let status = worker.reap();
        match detail {
            Some(e) => format!("interpreter failed during {}: {} ({})", during, e, status),
            None => format!("interpreter exited unexpectedly during {} ({})", during, status),
        }
    }
}

impl Runtime for PythonRuntime {
    fn load(&mut self, code: &str, function_name: &str) -> Result<(), LoadFailure> {
        // Never reuse a namespace
        self.worker = None;

        let mut worker = Worker::spawn(&self.command).map_err(|e| {
            LoadFailure::Fault(format!(
                "failed to start interpreter `{}`: {}",
                self.command.join(" "),
                e
            ))
        })?;
        debug!(pid = worker.child.id(), "Interpreter started");

        let reply = worker.exchange(&LoadRequest {
            code,
            function_name,
        });
        match reply {
            Ok(Some(Reply::Loaded)) => {
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Some(Reply::LoadError(message))) => Err(LoadFailure::Raised(message)),
            Ok(Some(Reply::Missing)) => Err(LoadFailure::MissingFunction),
            Ok(Some(other)) => Err(LoadFailure::Fault(format!(
                "unexpected reply during load: {:?}",
                other
            ))),
            Ok(None) => Err(LoadFailure::Fault(Self::lost(worker, "load", None))),
            Err(e) => Err(LoadFailure::Fault(Self::lost(worker, "load", Some(e)))),
        }
    }

    fn call(&mut self, args: &[Value]) -> Result<Invocation, RuntimeFault> {
        let mut worker = self
            .worker
            .take()
            .ok_or_else(|| RuntimeFault("interpreter is not loaded".to_string()))?;

        let invocation = match worker.exchange(&CallRequest { args }) {
            Ok(Some(Reply::Value(value))) => Invocation::Returned(value),
            Ok(Some(Reply::Raised(message))) => Invocation::Raised(message),
            Ok(Some(Reply::Unrepresentable(text))) => Invocation::Unrepresentable(text),
            Ok(Some(other)) => {
                return Err(RuntimeFault(format!("unexpected reply during call: {:?}", other)))
            }
            Ok(None) => return Err(RuntimeFault(Self::lost(worker, "call", None))),
            Err(e) => return Err(RuntimeFault(Self::lost(worker, "call", Some(e)))),
        };

        self.worker = Some(worker);
        Ok(invocation)
    }
}
