//! The privileged helper and its line protocol.
//!
//! Mutations of the package database run in a separate process started
//! through the configured elevation command (`pkexec` by default):
//!
//! ```text
//! <elevation...> <umake> privileged-helper add-arch <arch>
//! <elevation...> <umake> privileged-helper commit --install <pkg>... --upgrade <pkg>...
//! ```
//!
//! The helper runs `/usr/bin/apt-get` and `/usr/bin/dpkg` by absolute path.
//! Nothing the unprivileged side passes can change which programs it runs
//! as root.
//!
//! The helper's stdin is `/dev/null`, its stderr is the exchange file, and
//! its stdout carries one message per line:
//!
//! ```text
//! fetch <current_bytes> <current_items> <total_bytes> <total_items>
//! apply <percent>
//! error <message>
//! done
//! ```
//!
//! Everything apt-get and dpkg print that isn't a status update goes to
//! the exchange file.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context};
use tracing::{debug, warn};

use crate::error::{Result, UmakeError};
use crate::shell::{execute_streaming, is_elevated, CommandOptions, OutputLine};

use super::backend::{MarkAction, MarkPlan};
use super::progress::{CommitEvent, FetchCounters};

/// Exit status pkexec uses when authorization is refused or dismissed.
const PKEXEC_NOT_AUTHORIZED: i32 = 126;
/// Exit status when the elevation command can't find the helper.
const ELEVATED_COMMAND_NOT_FOUND: i32 = 127;

/// One line of helper output.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperMessage {
    Fetch(FetchCounters),
    Apply { percent: f64 },
    Error(String),
    Done,
}

impl HelperMessage {
    /// Decode one protocol line.
    pub fn decode(line: &str) -> Result<Self> {
        let protocol_error = || UmakeError::HelperProtocol {
            line: line.to_string(),
        };
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));

        match verb {
            "fetch" => {
                let fields = rest
                    .split_whitespace()
                    .map(|f| f.parse::<u64>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| protocol_error())?;
                match fields.as_slice() {
                    [current_bytes, current_items, total_bytes, total_items] => {
                        Ok(HelperMessage::Fetch(FetchCounters {
                            current_bytes: *current_bytes,
                            current_items: *current_items,
                            total_bytes: *total_bytes,
                            total_items: *total_items,
                        }))
                    }
                    _ => Err(protocol_error()),
                }
            }
            "apply" => {
                let percent = rest.trim().parse().map_err(|_| protocol_error())?;
                Ok(HelperMessage::Apply { percent })
            }
            "error" => Ok(HelperMessage::Error(unescape(rest))),
            "done" if rest.is_empty() => Ok(HelperMessage::Done),
            _ => Err(protocol_error()),
        }
    }

    /// The progress event this message carries, if any.
    pub fn to_event(&self) -> Option<CommitEvent> {
        match self {
            HelperMessage::Fetch(counters) => Some(CommitEvent::Fetch(*counters)),
            HelperMessage::Apply { percent } => Some(CommitEvent::Apply { percent: *percent }),
            _ => None,
        }
    }
}

impl fmt::Display for HelperMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperMessage::Fetch(c) => write!(
                f,
                "fetch {} {} {} {}",
                c.current_bytes, c.current_items, c.total_bytes, c.total_items
            ),
            HelperMessage::Apply { percent } => write!(f, "apply {}", percent),
            HelperMessage::Error(message) => write!(f, "error {}", escape(message)),
            HelperMessage::Done => write!(f, "done"),
        }
    }
}

// Error messages may span lines; keep them on one protocol line.
fn escape(message: &str) -> String {
    message.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// What the helper is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperRequest {
    /// Enable a foreign architecture and refresh the package lists.
    AddArch { arch: String },
    /// Install and upgrade packages.
    Commit {
        install: Vec<String>,
        upgrade: Vec<String>,
    },
}

impl HelperRequest {
    /// Request committing a mark plan.
    pub fn commit(plan: &MarkPlan) -> Self {
        let names = |action| {
            plan.with_action(action)
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
        };
        HelperRequest::Commit {
            install: names(MarkAction::Install),
            upgrade: names(MarkAction::Upgrade),
        }
    }

    /// Command-line arguments after `privileged-helper --apt-get <path>`.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            HelperRequest::AddArch { arch } => vec!["add-arch".to_string(), arch.clone()],
            HelperRequest::Commit { install, upgrade } => {
                let mut args = vec!["commit".to_string()];
                for pkg in install {
                    args.push("--install".to_string());
                    args.push(pkg.clone());
                }
                for pkg in upgrade {
                    args.push("--upgrade".to_string());
                    args.push(pkg.clone());
                }
                args
            }
        }
    }
}

/// Starts the privileged helper and relays its messages.
#[derive(Debug, Clone)]
pub struct HelperClient {
    elevation_command: Vec<String>,
    executable: PathBuf,
}

impl HelperClient {
    /// Client running `executable` (normally the umake binary itself).
    pub fn new(elevation_command: Vec<String>, executable: PathBuf) -> Self {
        Self {
            elevation_command,
            executable,
        }
    }

    /// Client running the current umake executable.
    pub fn for_current_exe(elevation_command: Vec<String>) -> Result<Self> {
        let executable = std::env::current_exe()?;
        Ok(Self::new(elevation_command, executable))
    }

    /// Full argv for a request.
    pub fn argv(&self, request: &HelperRequest) -> Vec<String> {
        let mut argv = Vec::new();
        if !is_elevated() {
            argv.extend(self.elevation_command.iter().cloned());
        }
        argv.push(self.executable.to_string_lossy().into_owned());
        argv.push("privileged-helper".to_string());
        argv.extend(request.to_args());
        argv
    }

    /// Run a request to completion.
    ///
    /// Helper stderr goes straight into `exchange`. Progress messages are
    /// passed to `on_event`; an `error` message becomes
    /// [`UmakeError::CommitFailed`].
    pub fn run(
        &self,
        request: &HelperRequest,
        exchange: &Path,
        on_event: &mut dyn FnMut(CommitEvent),
    ) -> Result<()> {
        if self.elevation_command.is_empty() && !is_elevated() {
            return Err(UmakeError::ElevationFailed {
                message: "no elevation command configured and not running as root".to_string(),
            });
        }

        let argv = self.argv(request);
        debug!("Starting privileged helper: {}", argv.join(" "));

        let stderr = OpenOptions::new().append(true).create(true).open(exchange)?;
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| UmakeError::ElevationFailed {
                message: format!("can't start {}: {}", argv[0], e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| UmakeError::HelperProtocol {
            line: "helper stdout unavailable".to_string(),
        })?;

        let mut error = None;
        let mut done = false;
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            match HelperMessage::decode(&line) {
                Ok(HelperMessage::Error(message)) => error = Some(message),
                Ok(HelperMessage::Done) => done = true,
                Ok(message) => {
                    if let Some(event) = message.to_event() {
                        on_event(event);
                    }
                }
                Err(_) => {
                    warn!("Ignoring unexpected helper output: {}", line);
                    append_line(exchange, &line)?;
                }
            }
        }

        let status = child.wait()?;
        if let Some(message) = error {
            return Err(UmakeError::CommitFailed { message });
        }
        match status.code() {
            Some(0) if done => Ok(()),
            Some(0) => Err(UmakeError::HelperProtocol {
                line: "helper exited without reporting completion".to_string(),
            }),
            Some(code @ (PKEXEC_NOT_AUTHORIZED | ELEVATED_COMMAND_NOT_FOUND)) => {
                Err(UmakeError::ElevationFailed {
                    message: format!("{} exited with code {}", argv[0], code),
                })
            }
            code => Err(UmakeError::CommandFailed {
                command: argv.join(" "),
                code,
            }),
        }
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// The package tools the helper runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTools {
    pub apt_get: PathBuf,
    pub dpkg: PathBuf,
}

impl PackageTools {
    /// The system's apt-get and dpkg.
    pub fn system() -> Self {
        Self {
            apt_get: PathBuf::from("/usr/bin/apt-get"),
            dpkg: PathBuf::from("/usr/bin/dpkg"),
        }
    }

    /// The system tools, or the system tools with `apt_get` swapped out.
    ///
    /// A replacement apt-get is only accepted when the helper isn't
    /// `elevated`.
    pub fn resolve(apt_get: Option<PathBuf>, elevated: bool) -> Result<Self> {
        match apt_get {
            None => Ok(Self::system()),
            Some(path) if elevated => Err(UmakeError::ToolOverrideRefused { path }),
            Some(apt_get) => Ok(Self {
                apt_get,
                ..Self::system()
            }),
        }
    }
}

/// Serve one request as the privileged helper.
///
/// Status goes to `out` as protocol lines; everything else the package
/// tools print goes to `log`. Returns whether the request succeeded. An
/// `Err` means `out` itself couldn't be written.
pub fn serve(
    request: &HelperRequest,
    tools: &PackageTools,
    out: &mut dyn Write,
    log: &mut dyn Write,
) -> std::io::Result<bool> {
    let outcome = match request {
        HelperRequest::AddArch { arch } => add_arch(arch, tools, log),
        HelperRequest::Commit { install, upgrade } => {
            let packages: Vec<&str> = install
                .iter()
                .chain(upgrade.iter())
                .map(String::as_str)
                .collect();
            commit(&packages, &tools.apt_get, out, log)
        }
    };

    let succeeded = outcome.is_ok();
    let message = match outcome {
        Ok(()) => HelperMessage::Done,
        Err(e) => HelperMessage::Error(format!("{:#}", e)),
    };
    writeln!(out, "{}", message)?;
    out.flush()?;
    Ok(succeeded)
}

/// Run a package tool, sending all of its output to `log`.
fn run_logged(program: &Path, args: &[&str], log: &mut dyn Write) -> anyhow::Result<()> {
    let result = execute_streaming(program, args, &CommandOptions::default(), &mut |line| {
        let (OutputLine::Stdout(text) | OutputLine::Stderr(text)) = line;
        let _ = writeln!(log, "{}", text);
    })
    .with_context(|| format!("can't run {}", program.display()))?;

    if !result.success {
        bail!(
            "{} {} failed with exit code {:?}",
            program.display(),
            args.join(" "),
            result.exit_code
        );
    }
    Ok(())
}

fn add_arch(arch: &str, tools: &PackageTools, log: &mut dyn Write) -> anyhow::Result<()> {
    run_logged(&tools.dpkg, &["--add-architecture", arch], log)
        .with_context(|| format!("Can't add architecture {}", arch))?;
    run_logged(&tools.apt_get, &["update"], log).context("Can't refresh package lists")?;
    Ok(())
}

/// Total download size and archive count, from `--print-uris`.
pub fn parse_print_uris(output: &str) -> (u64, u64) {
    output
        .lines()
        .filter(|line| line.starts_with('\''))
        .filter_map(|line| line.split_whitespace().nth(2)?.parse::<u64>().ok())
        .fold((0, 0), |(bytes, items), size| (bytes + size, items + 1))
}

/// A status line from `APT::Status-Fd`.
#[derive(Debug, Clone, PartialEq)]
pub enum AptStatus {
    Download { percent: f64 },
    Install { percent: f64 },
    Error { package: String, message: String },
}

/// Parse `dlstatus:`, `pmstatus:` and `pmerror:` lines.
pub fn parse_status_line(line: &str) -> Option<AptStatus> {
    let mut fields = line.splitn(4, ':');
    let kind = fields.next()?;
    let subject = fields.next()?;
    let percent = fields.next()?;
    let message = fields.next().unwrap_or("");

    match kind {
        "dlstatus" => Some(AptStatus::Download {
            percent: percent.parse().ok()?,
        }),
        "pmstatus" => Some(AptStatus::Install {
            percent: percent.parse().ok()?,
        }),
        "pmerror" => Some(AptStatus::Error {
            package: subject.to_string(),
            message: message.trim().to_string(),
        }),
        _ => None,
    }
}

fn scaled(total: u64, percent: f64) -> u64 {
    ((total as f64) * percent.clamp(0.0, 100.0) / 100.0).round() as u64
}

fn commit(
    packages: &[&str],
    apt_get: &Path,
    out: &mut dyn Write,
    log: &mut dyn Write,
) -> anyhow::Result<()> {
    if packages.is_empty() {
        return Ok(());
    }

    let mut print_args = vec!["install", "-y", "-qq", "--print-uris"];
    print_args.extend_from_slice(packages);
    let mut listing = String::new();
    let listed = execute_streaming(apt_get, &print_args, &CommandOptions::default(), &mut |line| {
        match line {
            OutputLine::Stdout(text) => {
                listing.push_str(&text);
                listing.push('\n');
            }
            OutputLine::Stderr(text) => {
                let _ = writeln!(log, "{}", text);
            }
        }
    })
    .with_context(|| format!("can't run {}", apt_get.display()))?;
    // No listing, no download size: fetch reports are skipped.
    let (total_bytes, total_items) = if listed.success {
        parse_print_uris(&listing)
    } else {
        let _ = writeln!(
            log,
            "{} --print-uris failed with exit code {:?}, download progress unavailable",
            apt_get.display(),
            listed.exit_code
        );
        (0, 0)
    };
    let sizes_known = total_bytes > 0 || total_items > 0;

    let mut install_args = vec![
        "install",
        "-y",
        "-o",
        "APT::Status-Fd=1",
        "-o",
        "Dpkg::Use-Pty=0",
    ];
    install_args.extend_from_slice(packages);

    let mut errors = Vec::new();
    let mut write_failure = None;
    let result = execute_streaming(apt_get, &install_args, &CommandOptions::default(), &mut |line| {
        let text = match line {
            OutputLine::Stdout(text) => text,
            OutputLine::Stderr(text) => {
                if text.starts_with("E:") {
                    errors.push(text.clone());
                }
                let _ = writeln!(log, "{}", text);
                return;
            }
        };

        let message = match parse_status_line(&text) {
            Some(AptStatus::Download { .. }) if !sizes_known => {
                let _ = writeln!(log, "{}", text);
                return;
            }
            Some(AptStatus::Download { percent }) => HelperMessage::Fetch(FetchCounters {
                current_bytes: scaled(total_bytes, percent),
                current_items: scaled(total_items, percent),
                total_bytes,
                total_items,
            }),
            Some(AptStatus::Install { percent }) => HelperMessage::Apply { percent },
            Some(AptStatus::Error { package, message }) => {
                errors.push(format!("{}: {}", package, message));
                return;
            }
            None => {
                let _ = writeln!(log, "{}", text);
                return;
            }
        };
        if let Err(e) = writeln!(out, "{}", message).and_then(|()| out.flush()) {
            write_failure.get_or_insert(e);
        }
    })
    .with_context(|| format!("can't run {}", apt_get.display()))?;

    if let Some(e) = write_failure {
        return Err(e).context("lost connection to umake");
    }
    if !result.success {
        if errors.is_empty() {
            bail!(
                "{} install failed with exit code {:?}",
                apt_get.display(),
                result.exit_code
            );
        }
        bail!("{}", errors.join("\n"));
    }
    Ok(())
}
