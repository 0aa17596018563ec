//! Dr. Probe parameter files.
//!
//! Both `msa` and `wavimg` read line-oriented text files: each line holds
//! one or more values separated by commas or whitespace, optionally
//! followed by a `!` comment. String values are single-quoted, with an
//! embedded quote written twice.
//!
//! - [`msa`]: multislice propagation parameters ([`MsaPrm`](msa::MsaPrm))
//! - [`wavimg`]: image formation parameters ([`WavimgPrm`](wavimg::WavimgPrm))

pub mod msa;
pub mod wavimg;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Errors reading or writing parameter files.
#[derive(Debug, Error)]
pub enum PrmError {
    #[error("Failed to access parameter file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parameter file syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Unexpected end of parameter file while reading {0}")]
    UnexpectedEof(String),
}

/// Aberration coefficients keyed by Dr. Probe aberration index.
///
/// Values are the (x, y) components in nm. Index 1 is defocus, 5 is
/// spherical aberration Cs, 11 is fifth-order spherical aberration C5.
pub type Aberrations = BTreeMap<u32, (f64, f64)>;

/// Aberration index of the defocus term.
pub const DEFOCUS: u32 = 1;
/// Aberration index of third-order spherical aberration.
pub const SPHERICAL_CS: u32 = 5;
/// Aberration index of fifth-order spherical aberration.
pub const SPHERICAL_C5: u32 = 11;

/// One non-empty line of a parameter file, split into values.
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub line: usize,
    pub values: Vec<String>,
    pub raw: String,
}

impl Record {
    fn value(&self, index: usize) -> Result<&str, PrmError> {
        self.values
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| PrmError::Syntax {
                line: self.line,
                message: format!("expected at least {} values, found {}", index + 1, self.values.len()),
            })
    }

    pub fn parse<T: FromStr>(&self, index: usize) -> Result<T, PrmError> {
        let raw = self.value(index)?;
        raw.parse().map_err(|_| PrmError::Syntax {
            line: self.line,
            message: format!("invalid value '{}'", raw),
        })
    }

    pub fn string(&self, index: usize) -> Result<String, PrmError> {
        self.value(index).map(str::to_string)
    }
}

/// Sequential reader over the records of a parameter file.
pub(crate) struct PrmReader<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> PrmReader<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { lines: content.lines().enumerate() }
    }

    /// Next non-blank record; `what` names the expected entry for errors.
    pub fn next(&mut self, what: &str) -> Result<Record, PrmError> {
        self.try_next()?
            .ok_or_else(|| PrmError::UnexpectedEof(what.to_string()))
    }

    pub fn try_next(&mut self) -> Result<Option<Record>, PrmError> {
        for (idx, line) in self.lines.by_ref() {
            let values = tokenize(line).map_err(|message| PrmError::Syntax {
                line: idx + 1,
                message,
            })?;
            if values.is_empty() {
                continue;
            }
            return Ok(Some(Record {
                line: idx + 1,
                values,
                raw: line.trim_end().to_string(),
            }));
        }
        Ok(None)
    }

    /// Read an aberration block: a count line followed by `index, x, y` lines.
    pub fn aberrations(&mut self) -> Result<Aberrations, PrmError> {
        let count: usize = self.next("number of aberrations")?.parse(0)?;
        let mut aberrations = Aberrations::new();
        for _ in 0..count {
            let record = self.next("aberration definition")?;
            aberrations.insert(record.parse(0)?, (record.parse(1)?, record.parse(2)?));
        }
        Ok(aberrations)
    }
}

/// Split a line into values, honouring quotes and trailing `!` comments.
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                if !current.is_empty() {
                    values.push(std::mem::take(&mut current));
                }
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            quoted.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => quoted.push(c),
                        None => return Err("unterminated quoted string".into()),
                    }
                }
                values.push(quoted);
            }
            '!' => break,
            ',' | ' ' | '\t' => {
                if !current.is_empty() {
                    values.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        values.push(current);
    }
    Ok(values)
}

/// Accumulates parameter file lines with aligned trailing comments.
pub(crate) struct PrmWriter {
    out: String,
}

impl PrmWriter {
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    pub fn line(&mut self, values: impl AsRef<str>, comment: &str) {
        let values = values.as_ref();
        if comment.is_empty() {
            self.out.push_str(values);
        } else {
            self.out.push_str(&format!("{:<30} ! {}", values, comment));
        }
        self.out.push('\n');
    }

    pub fn aberrations(&mut self, aberrations: &Aberrations) {
        self.line(aberrations.len().to_string(), "number of aberration definitions");
        for (index, (x, y)) in aberrations {
            self.line(format!("{}, {}, {}", index, x, y), "aberration index, x [nm], y [nm]");
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn read_file(path: &Path) -> Result<String, PrmError> {
    std::fs::read_to_string(path).map_err(|source| PrmError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), PrmError> {
    std::fs::write(path, content).map_err(|source| PrmError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed_separators_and_comment() {
        let values = tokenize("1, 0.5  2.0 ! trailing comment").unwrap();
        assert_eq!(values, vec!["1", "0.5", "2.0"]);
    }

    #[test]
    fn test_tokenize_quoted_strings() {
        let values = tokenize("0, 1, 'C:\\data\\my file.mtf'").unwrap();
        assert_eq!(values, vec!["0", "1", "C:\\data\\my file.mtf"]);

        let empty = tokenize("'' ! slice files").unwrap();
        assert_eq!(empty, vec![""]);

        // '!' inside quotes is part of the value
        let bang = tokenize("'a!b'").unwrap();
        assert_eq!(bang, vec!["a!b"]);
    }

    #[test]
    fn test_tokenize_doubled_quote() {
        let values = tokenize("'/data/O''Neil/slc/Pt_slc', 'x'").unwrap();
        assert_eq!(values, vec!["/data/O'Neil/slc/Pt_slc", "x"]);
        assert_eq!(tokenize(&quote("it's")).unwrap(), vec!["it's"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        assert!(tokenize("'oops").is_err());
    }

    #[test]
    fn test_reader_skips_blank_lines() {
        let mut reader = PrmReader::new("\n   \n! only a comment\n42\n");
        let record = reader.next("answer").unwrap();
        assert_eq!(record.line, 4);
        assert_eq!(record.parse::<u32>(0).unwrap(), 42);
        assert!(reader.try_next().unwrap().is_none());
    }

    #[test]
    fn test_reader_reports_bad_number() {
        let mut reader = PrmReader::new("abc\n");
        let record = reader.next("value").unwrap();
        let err = record.parse::<f64>(0).unwrap_err();
        assert!(matches!(err, PrmError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_aberration_block() {
        let mut aberrations = Aberrations::new();
        aberrations.insert(DEFOCUS, (0.0, 0.0));
        aberrations.insert(SPHERICAL_CS, (-9000.0, 0.0));
        aberrations.insert(SPHERICAL_C5, (5_000_000.0, 0.0));

        let mut writer = PrmWriter::new();
        writer.aberrations(&aberrations);
        let text = writer.finish();

        let mut reader = PrmReader::new(&text);
        assert_eq!(reader.aberrations().unwrap(), aberrations);
    }
}
