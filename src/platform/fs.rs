// Regression - platform/fs.rs
//
// Whole-file reads for ingestion. Files are read synchronously in one shot;
// no streaming, no offsets.

use std::io;
use std::path::Path;

/// Outcome of reading a log file as text.
#[derive(Debug)]
pub enum TextRead {
    /// The file decoded as UTF-8.
    Text(String),
    /// The file was read but is not valid UTF-8.
    NotUtf8(std::string::FromUtf8Error),
}

/// Read the full content of a file as strict UTF-8.
///
/// Invalid UTF-8 is reported, not replaced: a lossy read would persist
/// records whose text differs from the source file. A leading UTF-8 BOM is
/// stripped so the first line's timestamp is still a line prefix.
pub fn read_text(path: &Path) -> io::Result<TextRead> {
    let bytes = std::fs::read(path)?;
    tracing::trace!(path = %path.display(), bytes = bytes.len(), "Read log file");
    Ok(match String::from_utf8(bytes) {
        Ok(mut text) => {
            if text.starts_with('\u{feff}') {
                text.drain(..'\u{feff}'.len_utf8());
            }
            TextRead::Text(text)
        }
        Err(e) => TextRead::NotUtf8(e),
    })
}
