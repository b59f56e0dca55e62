use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::Path;

/// Defines the interface for reading a text-based sequence or alignment format.
///
/// Implementors handle format-specific parsing; the provided methods adapt files and
/// in-memory strings onto [`read_from`](TextFormat::read_from).
pub trait TextFormat {
    /// The parsed representation produced by this format.
    type Output;

    /// The error type for parsing and I/O failures.
    type Error: Error + From<io::Error>;

    /// Reads and parses the whole content of `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed or reading fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error>;

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Output, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Parses an in-memory string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed.
    fn parse_str(content: &str) -> Result<Self::Output, Self::Error> {
        let mut reader = Cursor::new(content.as_bytes());
        Self::read_from(&mut reader)
    }
}
