//! Camera backend that shells out to a platform capture program.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::{CameraBackend, CaptureError, PendingCapture, capture_channel};

/// Placeholder replaced by the target path in argument lists.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Drives an external program such as `termux-camera-photo {path}` or
/// `libcamera-still -o {path}`.
///
/// The program runs on a helper thread; a zero exit status with no file on disk
/// is treated as a cancelled capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCameraBackend {
    program: String,
    args: Vec<String>,
}

impl CommandCameraBackend {
    /// Creates a backend. When no argument contains [`PATH_PLACEHOLDER`], the
    /// target path is appended as the final argument.
    ///
    /// # Errors
    /// Returns [`CaptureError::Backend`] for an empty program name.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Result<Self, CaptureError> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(CaptureError::Backend(
                "camera command is empty".to_string(),
            ));
        }
        Ok(Self { program, args })
    }

    /// Parses a whitespace-separated command line.
    ///
    /// # Errors
    /// Returns [`CaptureError::Backend`] for a blank command line.
    pub fn from_command_line(command_line: &str) -> Result<Self, CaptureError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self::new(program, parts.collect())
    }

    /// Final argument list for `target`.
    pub fn arguments_for(&self, target: &Path) -> Vec<String> {
        let target = target.display().to_string();
        if self.args.iter().any(|arg| arg.contains(PATH_PLACEHOLDER)) {
            return self
                .args
                .iter()
                .map(|arg| arg.replace(PATH_PLACEHOLDER, &target))
                .collect();
        }

        let mut args = self.args.clone();
        args.push(target);
        args
    }
}

impl CameraBackend for CommandCameraBackend {
    fn take_picture(&self, target: &Path) -> Result<PendingCapture, CaptureError> {
        let (completion, pending) = capture_channel();
        let program = self.program.clone();
        let args = self.arguments_for(target);
        let target = target.to_path_buf();

        std::thread::Builder::new()
            .name("photo-relay-camera".to_string())
            .spawn(move || {
                debug!(stage = "capture", action = "spawn", %program, ?args);
                let outcome = Command::new(&program)
                    .args(&args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::piped())
                    .output();

                match outcome {
                    Ok(output) if output.status.success() => {
                        if target.is_file() {
                            completion.complete(Some(target));
                        } else {
                            completion.complete(None);
                        }
                    }
                    Ok(output) => {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        warn!(stage = "capture", action = "exit", status = %output.status);
                        completion.fail(format!(
                            "{program} exited with {}: {}",
                            output.status,
                            stderr.trim()
                        ));
                    }
                    Err(error) => completion.fail(format!("failed to run {program}: {error}")),
                }
            })
            .map_err(|error| CaptureError::Backend(format!("camera thread spawn failed: {error}")))?;

        Ok(pending)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
