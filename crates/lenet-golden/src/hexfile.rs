// SPDX-License-Identifier: AGPL-3.0-only

//! `$readmemh`-style hex files: one word per line, no prefix
//!
//! Readers ignore blank lines and surrounding whitespace and accept a
//! missing trailing newline. Writers never emit a newline after the last
//! line, matching the files the testbench has always been given.

use std::fs;
use std::path::Path;

use crate::error::{GoldenError, Result};
use crate::layout::WideWord;

/// Read the non-blank, trimmed lines of a hex file
///
/// # Errors
///
/// Returns `MissingInput` if the file does not exist, or an I/O error.
pub fn read_hex_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    tracing::debug!("Reading hex file: {}", path.display());

    if !path.exists() {
        return Err(GoldenError::missing_input(path));
    }

    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Write lines joined by `\n`, without a trailing newline
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_hex_lines<P, S>(path: P, lines: &[S]) -> Result<()>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let text = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n");
    fs::write(path, text)?;
    tracing::debug!("Wrote {} line(s) to {}", lines.len(), path.display());
    Ok(())
}

/// Parse hex lines into `bits`-wide words
///
/// # Errors
///
/// Returns `Parse` carrying the 1-based line number of the first bad line.
pub fn parse_words<S: AsRef<str>>(lines: &[S], bits: u32) -> Result<Vec<WideWord>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            WideWord::from_hex(line.as_ref(), bits).map_err(|e| match e {
                GoldenError::Parse { reason, .. } => GoldenError::parse(i + 1, reason),
                other => other,
            })
        })
        .collect()
}

/// Read a hex file as `bits`-wide words
///
/// # Errors
///
/// See [`read_hex_lines`] and [`parse_words`].
pub fn read_words<P: AsRef<Path>>(path: P, bits: u32) -> Result<Vec<WideWord>> {
    let lines = read_hex_lines(&path)?;
    parse_words(&lines, bits)
}

/// Write words as hex lines
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_words<P: AsRef<Path>>(path: P, words: &[WideWord]) -> Result<()> {
    let lines: Vec<String> = words.iter().map(WideWord::to_hex).collect();
    write_hex_lines(path, &lines)
}
