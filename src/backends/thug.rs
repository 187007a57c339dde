//! Runs attachments through a local Thug install.
//!
//! The payload is written to a temporary file named after the attachment's
//! extension and handed to the `thug` command once per configured user
//! agent. Each run's stdout is parsed as JSON when possible. A run that
//! outlives the configured timeout is killed.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::SandboxAnalyzer;
use crate::error::BackendError;
use crate::model::attachment::Attachment;

/// Keys of the processor configuration this backend reads at analysis time.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunOptions {
    /// Thug personalities (`-u`), one run each. Empty means one default run.
    user_agents: Vec<String>,
    /// Referer passed with `-r`.
    referer: Option<String>,
}

/// Default bound on a single sandbox run.
pub const DEFAULT_THUG_TIMEOUT: Duration = Duration::from_secs(300);

/// External-command sandbox.
pub struct ThugCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ThugCommand {
    /// `args` come before the per-run flags and the sample path.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_THUG_TIMEOUT,
        }
    }

    /// Kill a run that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_error(&self, reason: impl Into<String>) -> BackendError {
        BackendError::Command {
            program: self.program.clone(),
            reason: reason.into(),
        }
    }

    fn run_once(
        &self,
        sample: &std::path::Path,
        user_agent: Option<&str>,
        referer: Option<&str>,
    ) -> Result<Value, BackendError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ua) = user_agent {
            cmd.arg("-u").arg(ua);
        }
        if let Some(referer) = referer {
            cmd.arg("-r").arg(referer);
        }
        cmd.arg("-l").arg(sample);

        // Output goes to files so a chatty run cannot fill a pipe and stall.
        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?));

        debug!(program = %self.program, user_agent = ?user_agent, "Running sandbox");
        let mut child = cmd.spawn().map_err(|e| self.command_error(e.to_string()))?;

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                warn!(
                    program = %self.program,
                    timeout = ?self.timeout,
                    "Sandbox run timed out, killing it"
                );
                child.kill()?;
                child.wait()?;
                return Err(self.command_error(format!(
                    "timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                )));
            }
        };

        if !status.success() {
            let stderr = read_back(&mut stderr)?;
            return Err(self.command_error(format!(
                "{}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(parse_output(&read_back(&mut stdout)?))
    }
}

/// Everything written to `file` so far.
fn read_back(file: &mut File) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

impl SandboxAnalyzer for ThugCommand {
    fn analyze(&self, attachment: &Attachment, config: &Value) -> Result<Value, BackendError> {
        let options: RunOptions = serde_json::from_value(config.clone())
            .map_err(|e| BackendError::InvalidResponse(format!("thug options: {e}")))?;
        let data = attachment
            .decoded_payload()
            .map_err(|e| BackendError::Payload(e.to_string()))?;

        let mut sample = tempfile::Builder::new()
            .prefix("attachscope-")
            .suffix(&attachment.extension)
            .tempfile()?;
        sample.write_all(&data)?;
        sample.flush()?;

        let referer = options.referer.as_deref();
        if options.user_agents.is_empty() {
            return Ok(json!([{ "report": self.run_once(sample.path(), None, referer)? }]));
        }

        let mut runs = Vec::with_capacity(options.user_agents.len());
        for ua in &options.user_agents {
            let report = self.run_once(sample.path(), Some(ua), referer)?;
            runs.push(json!({ "user_agent": ua, "report": report }));
        }
        Ok(Value::Array(runs))
    }
}

/// JSON stdout as-is, anything else wrapped as text.
fn parse_output(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).unwrap_or_else(|_| {
        json!({ "output": String::from_utf8_lossy(stdout).trim().to_string() })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output(br#"{"url": "x"}"#)["url"], "x");
        assert_eq!(parse_output(b"plain log line\n")["output"], "plain log line");
    }

    #[cfg(unix)]
    #[test]
    fn test_analyze_runs_command_per_user_agent() {
        // `echo` prints its arguments, which ends with the sample path.
        let sandbox = ThugCommand::new("echo", vec![]);
        let att = Attachment {
            payload: "alert(1)".to_string(),
            extension: ".js".to_string(),
            ..Default::default()
        };
        let config = json!({"enabled": true, "user_agents": ["win7ie90", "linuxfirefox40"]});
        let result = sandbox.analyze(&att, &config).unwrap();
        let runs = result.as_array().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0]["user_agent"], "win7ie90");
        let out = runs[1]["report"]["output"].as_str().unwrap();
        assert!(out.starts_with("-u linuxfirefox40 -l "));
        assert!(out.ends_with(".js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_analyze_kills_run_past_timeout() {
        // `sh -c` ignores the trailing `-l <sample>` as positional args.
        let sandbox = ThugCommand::new(
            "sh",
            vec!["-c".to_string(), "exec sleep 10".to_string(), "sh".to_string()],
        )
        .with_timeout(Duration::from_millis(200));
        let att = Attachment {
            payload: "x".to_string(),
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let err = sandbox.analyze(&att, &json!({})).unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            BackendError::Command { program, reason } => {
                assert_eq!(program, "sh");
                assert!(reason.contains("timed out"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_analyze_reports_failing_command() {
        let sandbox = ThugCommand::new("false", vec![]);
        let att = Attachment {
            payload: "x".to_string(),
            ..Default::default()
        };
        let err = sandbox.analyze(&att, &json!({})).unwrap_err();
        assert!(matches!(err, BackendError::Command { .. }));
    }
}
