//! Reading premium keys from user-selected files.

use crate::error::{LicenseError, LicenseResult};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Upper bound on the bytes read looking for the first line.
const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Byte order mark some editors prepend to UTF-8 text files.
const UTF8_BOM: char = '\u{feff}';

/// Reads the first line of a premium key file, without its line terminator.
///
/// Only the first line is significant; anything after it is ignored.
///
/// # Errors
///
/// Returns [`LicenseError::Io`] if the file cannot be read, and
/// [`LicenseError::Malformed`] if the first line is empty or not UTF-8.
pub fn read_first_line(path: &Path) -> LicenseResult<String> {
    let mut reader = BufReader::new(File::open(path)?).take(MAX_LINE_BYTES);
    let mut bytes = Vec::new();
    reader.read_until(b'\n', &mut bytes)?;

    let line = String::from_utf8(bytes).map_err(|_| {
        LicenseError::Malformed(format!("{} is not a text file", path.display()))
    })?;
    let line = line.trim_end_matches(['\n', '\r']);
    let line = line.strip_prefix(UTF8_BOM).unwrap_or(line);
    if line.trim().is_empty() {
        return Err(LicenseError::Malformed(format!(
            "no premium key on the first line of {}",
            path.display()
        )));
    }
    Ok(line.to_string())
}
