//! Script Embedder
//!
//! Turns a file payload into late-command strings that recreate the file
//! inside the target system using a quoted heredoc:
//!
//! ```text
//! cat > /target/tmp/setup.sh << 'EOFSETUP'
//! <payload>
//! EOFSETUP
//! ```
//!
//! Binary payloads are base64-encoded and piped through `base64 -d` in the
//! same heredoc form.
//!
//! # Marker Safety
//!
//! A heredoc ends at the first line equal to its marker. Before emitting, the
//! payload is scanned for that line; under [`CollisionPolicy::Rotate`] a
//! suffixed marker (`EOFSETUP_1`, `EOFSETUP_2`, ...) is tried next, under
//! [`CollisionPolicy::Reject`] the embedding fails. A payload is never
//! emitted with a marker that occurs in it.
//!
//! # Ordering
//!
//! Each embedding is split into `materialize` commands (write, chmod) and
//! `follow_up` commands (run, enable). The plan builder emits every
//! materialize command before any follow-up, so nothing runs or gets enabled
//! before its file exists.

use crate::error::{PlanError, Result};
use crate::types::CollisionPolicy;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

/// Marker candidates tried under [`CollisionPolicy::Rotate`], preferred included.
pub const MAX_MARKER_ATTEMPTS: usize = 64;

/// Content of an embedded file.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Written verbatim
    Text(&'a str),
    /// Written through base64
    Binary(&'a [u8]),
}

/// What happens to a file after it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileAction {
    #[default]
    None,
    /// Execute with bash inside the target
    Run,
    /// `systemctl enable` the unit named by the file
    EnableService,
}

/// A file to materialize in the target system.
#[derive(Debug, Clone)]
pub struct EmbeddedFile<'a> {
    /// Absolute path inside the target system
    pub destination: &'a str,
    pub payload: Payload<'a>,
    /// Preferred heredoc marker
    pub marker: &'a str,
    /// Add `chmod +x` after writing
    pub executable: bool,
    pub action: FileAction,
}

impl<'a> EmbeddedFile<'a> {
    /// A text file written verbatim.
    pub fn text(destination: &'a str, content: &'a str, marker: &'a str) -> Self {
        Self {
            destination,
            payload: Payload::Text(content),
            marker,
            executable: false,
            action: FileAction::None,
        }
    }

    /// A binary file written through base64.
    pub fn binary(destination: &'a str, content: &'a [u8], marker: &'a str) -> Self {
        Self {
            destination,
            payload: Payload::Binary(content),
            marker,
            executable: false,
            action: FileAction::None,
        }
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }

    pub fn then(mut self, action: FileAction) -> Self {
        self.action = action;
        self
    }
}

/// Commands produced for one embedded file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embedding {
    /// Write the file (and make it executable)
    pub materialize: Vec<String>,
    /// Run or enable it
    pub follow_up: Vec<String>,
    /// Marker actually used
    pub marker: String,
}

/// Produces heredoc commands rooted at the installer's target mount.
#[derive(Debug, Clone)]
pub struct Embedder {
    target_root: String,
    explicit_target: bool,
    policy: CollisionPolicy,
}

impl Embedder {
    /// `target_root` is where the installed system is mounted (`/target`).
    /// With `explicit_target`, in-target commands pass `--target=<root>`.
    pub fn new(target_root: &str, explicit_target: bool, policy: CollisionPolicy) -> Self {
        Self {
            target_root: target_root.trim_end_matches('/').to_string(),
            explicit_target,
            policy,
        }
    }

    /// Target mount without a trailing slash.
    pub fn target_root(&self) -> &str {
        &self.target_root
    }

    /// Build the commands that write `file` and apply its action.
    pub fn embed(&self, file: &EmbeddedFile<'_>) -> Result<Embedding> {
        check_destination(file.destination)?;
        check_marker(file.marker)?;

        let host_path = format!("{}{}", self.target_root, file.destination);
        if !is_safe_path(&self.target_root) {
            return Err(PlanError::config(format!(
                "Target root '{}' must be an absolute path of [A-Za-z0-9/._+@-]",
                self.target_root
            )));
        }
        let (command, body) = match file.payload {
            Payload::Text(text) => (format!("cat > {}", host_path), text.to_string()),
            Payload::Binary(bytes) => (format!("base64 -d > {}", host_path), STANDARD.encode(bytes)),
        };

        let marker = self.choose_marker(&body, file.marker, file.destination)?;
        debug!("Embedding {} with marker {}", file.destination, marker);

        let mut materialize = vec![heredoc(&command, &marker, &body)];
        if file.executable {
            materialize.push(format!("chmod +x {}", host_path));
        }

        let follow_up = match file.action {
            FileAction::None => Vec::new(),
            FileAction::Run => vec![self.in_target(&format!("bash {}", file.destination))],
            FileAction::EnableService => {
                let unit = file.destination.rsplit('/').next().unwrap_or(file.destination);
                vec![self.in_target(&format!("systemctl enable {}", unit))]
            }
        };

        Ok(Embedding {
            materialize,
            follow_up,
            marker,
        })
    }

    /// Wrap a command so curtin runs it chrooted into the target.
    pub fn in_target(&self, command: &str) -> String {
        if self.explicit_target {
            format!("curtin in-target --target={} -- {}", self.target_root, command)
        } else {
            format!("curtin in-target -- {}", command)
        }
    }

    /// Pick a marker that does not occur as a line of `body`.
    pub fn choose_marker(&self, body: &str, preferred: &str, destination: &str) -> Result<String> {
        if !has_marker_line(body, preferred) {
            return Ok(preferred.to_string());
        }

        let collision = || PlanError::DelimiterCollision {
            destination: destination.to_string(),
            marker: preferred.to_string(),
        };

        if self.policy == CollisionPolicy::Reject {
            return Err(collision());
        }

        let marker = (1..MAX_MARKER_ATTEMPTS)
            .map(|n| format!("{}_{}", preferred, n))
            .find(|candidate| !has_marker_line(body, candidate))
            .ok_or_else(collision)?;

        warn!(
            "Payload for {} contains a '{}' line; using marker '{}'",
            destination, preferred, marker
        );
        Ok(marker)
    }
}

/// Whether `body` has a line that would terminate a heredoc ended by `marker`.
///
/// A trailing `\r` is ignored so CRLF payloads are treated conservatively.
pub fn has_marker_line(body: &str, marker: &str) -> bool {
    body.split('\n')
        .any(|line| line == marker || line.strip_suffix('\r') == Some(marker))
}

/// Format a quoted heredoc. A newline is added before the closing marker only
/// when the body does not already end with one.
pub fn heredoc(command: &str, marker: &str, body: &str) -> String {
    let separator = if body.is_empty() || body.ends_with('\n') { "" } else { "\n" };
    format!("{} << '{}'\n{}{}{}", command, marker, body, separator, marker)
}

/// Destinations are interpolated into shell commands unquoted.
/// Absolute path other than `/` that a shell reads as a single word.
pub(crate) fn is_safe_path(path: &str) -> bool {
    path.starts_with('/')
        && path.len() > 1
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | '@'))
}

fn check_destination(destination: &str) -> Result<()> {
    if is_safe_path(destination) {
        Ok(())
    } else {
        Err(PlanError::config(format!(
            "Embedded file destination '{}' must be an absolute path of [A-Za-z0-9/._+@-]",
            destination
        )))
    }
}

fn check_marker(marker: &str) -> Result<()> {
    if !marker.is_empty() && marker.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(PlanError::config(format!(
            "Heredoc marker '{}' must be non-empty [A-Za-z0-9_]",
            marker
        )))
    }
}
