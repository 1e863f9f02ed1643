//! Batch-level confirmation for destructive runs.
//!
//! This gate protects the entire run, not individual targets: it is checked
//! once, before any target is processed, and declining aborts with no side
//! effects.

use crate::error::{CurateError, Result};
use std::io::{BufRead, Write};

/// Prompt the operator and abort unless they type `YES` (or `force` is set).
pub fn confirm(
    prompt: &str,
    force: bool,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<()> {
    if force {
        return Ok(());
    }
    writeln!(output, "WARNING: {}", prompt)?;
    write!(output, "Enter YES to continue: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    if line.trim() == "YES" {
        Ok(())
    } else {
        Err(CurateError::Aborted(
            "confirmation declined, the command cannot proceed".to_string(),
        ))
    }
}
