//! Writer: emits a fully rendered plan to a file or stdout.
//!
//! The caller renders the whole document first, so a failure before this
//! point never leaves a partial file behind.

use crate::error::Result;
use crate::types::Arch;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Write `text` to `path`, or to stdout when no path is given.
///
/// With a path, a `Generated <path> for <arch>` notice goes to stderr.
pub fn write_plan(text: &str, path: Option<&Path>, arch: Arch) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text)?;
            debug!("Wrote {} bytes to {}", text.len(), path.display());
            eprintln!("Generated {} for {}", path.display(), arch);
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
