//! External command execution.
//!
//! Commands are run directly from an argv, never through a shell, since
//! everything umake runs (dpkg, apt, apt-get, java) is a plain executable
//! and some of it runs as root.

use crate::error::{Result, UmakeError};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Result of executing a command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
        }
    }

    /// stdout and stderr joined, for error messages.
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Capture stdout (if false, inherits from parent).
    pub capture_stdout: bool,

    /// Capture stderr (if false, inherits from parent).
    pub capture_stderr: bool,
}

impl CommandOptions {
    /// Capture both streams with the C locale, so output can be parsed.
    pub fn parseable() -> Self {
        let mut env = HashMap::new();
        env.insert("LC_ALL".to_string(), "C".to_string());
        Self {
            env,
            capture_stdout: true,
            capture_stderr: true,
        }
    }
}

/// Output line from command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

fn describe<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> String {
    let mut parts = vec![program.to_string_lossy().into_owned()];
    parts.extend(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
    parts.join(" ")
}

fn build<P, S>(program: P, args: &[S], options: &CommandOptions) -> Command
where
    P: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    cmd
}

/// Execute a command.
///
/// A program that can't be started at all is an error; a program that
/// runs and exits non-zero is a failed [`CommandResult`].
pub fn execute<P, S>(program: P, args: &[S], options: &CommandOptions) -> Result<CommandResult>
where
    P: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let program = program.as_ref();
    let mut cmd = build(program, args, options);

    if options.capture_stdout {
        cmd.stdout(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit());
    }

    if options.capture_stderr {
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stderr(Stdio::inherit());
    }

    let output = cmd.output().map_err(|_| UmakeError::CommandFailed {
        command: describe(program, args),
        code: None,
    })?;

    let duration = start.elapsed();

    let stdout = if options.capture_stdout {
        String::from_utf8_lossy(&output.stdout).to_string()
    } else {
        String::new()
    };

    let stderr = if options.capture_stderr {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::new()
    };

    if output.status.success() {
        Ok(CommandResult::success(stdout, stderr, duration))
    } else {
        Ok(CommandResult::failure(
            output.status.code(),
            stdout,
            stderr,
            duration,
        ))
    }
}

/// Execute a command and collect both streams in the C locale.
pub fn execute_quiet<P, S>(program: P, args: &[S]) -> Result<CommandResult>
where
    P: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    execute(program, args, &CommandOptions::parseable())
}

/// Read `stream` to EOF, forwarding each line and returning all of it.
///
/// Invalid UTF-8 is replaced rather than ending the read: a pipe closed
/// early would kill the child with SIGPIPE on its next write.
fn drain<R: Read>(
    stream: R,
    wrap: fn(String) -> OutputLine,
    tx: &mpsc::Sender<OutputLine>,
) -> String {
    let mut reader = BufReader::new(stream);
    let mut output = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Stopped reading command output: {}", e);
                break;
            }
        }
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        output.push_str(&line);
        output.push('\n');
        let _ = tx.send(wrap(line));
    }
    output
}

/// Execute a command, handing each output line to `callback` as it arrives.
///
/// The callback runs on the calling thread.
pub fn execute_streaming<P, S>(
    program: P,
    args: &[S],
    options: &CommandOptions,
    callback: &mut dyn FnMut(OutputLine),
) -> Result<CommandResult>
where
    P: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let program = program.as_ref();
    let failed = || UmakeError::CommandFailed {
        command: describe(program, args),
        code: None,
    };

    let mut cmd = build(program, args, options);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|_| failed())?;

    let stdout = child.stdout.take().ok_or_else(failed)?;
    let stderr = child.stderr.take().ok_or_else(failed)?;

    let (tx, rx) = mpsc::channel();
    let tx_stdout = tx.clone();
    let tx_stderr = tx;

    let stdout_handle = thread::spawn(move || drain(stdout, OutputLine::Stdout, &tx_stdout));
    let stderr_handle = thread::spawn(move || drain(stderr, OutputLine::Stderr, &tx_stderr));

    for line in rx {
        callback(line);
    }

    let stdout_output = stdout_handle.join().unwrap_or_default();
    let stderr_output = stderr_handle.join().unwrap_or_default();

    let status = child.wait().map_err(|_| failed())?;

    let duration = start.elapsed();

    if status.success() {
        Ok(CommandResult::success(
            stdout_output,
            stderr_output,
            duration,
        ))
    } else {
        Ok(CommandResult::failure(
            status.code(),
            stdout_output,
            stderr_output,
            duration,
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn execute_successful_command() {
        let result = execute_quiet("echo", &["hello"]).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn execute_failing_command() {
        let result = execute_quiet("sh", &["-c", "exit 3"]).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = execute_quiet("umake-definitely-not-a-program", &["--version"]).unwrap_err();
        match err {
            UmakeError::CommandFailed { command, code } => {
                assert_eq!(command, "umake-definitely-not-a-program --version");
                assert!(code.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn arguments_are_not_shell_expanded() {
        let result = execute_quiet("echo", &["$HOME", "a;b"]).unwrap();
        assert_eq!(result.stdout.trim(), "$HOME a;b");
    }

    #[test]
    fn parseable_options_force_c_locale() {
        let result = execute_quiet("sh", &["-c", "echo $LC_ALL"]).unwrap();
        assert_eq!(result.stdout.trim(), "C");
    }

    #[test]
    fn combined_output_joins_streams() {
        let result = execute_quiet("sh", &["-c", "echo out; echo err >&2"]).unwrap();
        assert_eq!(result.combined_output(), "out\nerr");
    }

    #[test]
    fn execute_streaming_separates_streams() {
        let mut lines = Vec::new();
        let result = execute_streaming(
            "sh",
            &["-c", "echo line1; echo oops >&2; echo line2"],
            &CommandOptions::default(),
            &mut |line| lines.push(line),
        )
        .unwrap();

        assert!(result.success);
        assert!(lines.contains(&OutputLine::Stdout("line1".into())));
        assert!(lines.contains(&OutputLine::Stdout("line2".into())));
        assert!(lines.contains(&OutputLine::Stderr("oops".into())));
        assert_eq!(result.stdout, "line1\nline2\n");
    }

    #[test]
    fn execute_streaming_survives_invalid_utf8() {
        let script = r#"printf '\377\376 latin-1\n'; i=0; while [ $i -lt 4000 ]; do echo "line $i"; i=$((i+1)); done; echo finished"#;
        let mut lines = Vec::new();
        let result = execute_streaming(
            "sh",
            &["-c", script],
            &CommandOptions::default(),
            &mut |line| lines.push(line),
        )
        .unwrap();

        assert!(result.success);
        assert_eq!(
            lines.first(),
            Some(&OutputLine::Stdout("\u{FFFD}\u{FFFD} latin-1".into()))
        );
        assert_eq!(lines.last(), Some(&OutputLine::Stdout("finished".into())));
        assert_eq!(lines.len(), 4002);
    }

    #[test]
    fn execute_streaming_reports_exit_code() {
        let result = execute_streaming(
            "sh",
            &["-c", "exit 100"],
            &CommandOptions::default(),
            &mut |_| {},
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(100));
    }
}
