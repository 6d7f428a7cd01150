use crate::features::{EncodedFeatures, FEATURE_ORDER};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// On-disk header: the 18 indicators in canonical order, then the outcome columns.
pub const LOG_COLUMNS: [&str; 21] = [
    FEATURE_ORDER[0],
    FEATURE_ORDER[1],
    FEATURE_ORDER[2],
    FEATURE_ORDER[3],
    FEATURE_ORDER[4],
    FEATURE_ORDER[5],
    FEATURE_ORDER[6],
    FEATURE_ORDER[7],
    FEATURE_ORDER[8],
    FEATURE_ORDER[9],
    FEATURE_ORDER[10],
    FEATURE_ORDER[11],
    FEATURE_ORDER[12],
    FEATURE_ORDER[13],
    FEATURE_ORDER[14],
    FEATURE_ORDER[15],
    FEATURE_ORDER[16],
    FEATURE_ORDER[17],
    "prediction",
    "probability",
    "timestamp",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("prediction log not found: {0}")]
    NotFound(PathBuf),
    #[error("prediction log has no header: {0}")]
    Empty(PathBuf),
    #[error("malformed row at {path}:{line}: expected {expected} fields, got {got}")]
    Malformed {
        path: PathBuf,
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("unterminated quoted field at {path}:{line}")]
    Unterminated { path: PathBuf, line: usize },
    #[error("prediction log header at {path} is not a permutation of the log columns: {found}")]
    HeaderMismatch { path: PathBuf, found: String },
    #[error("prediction log io {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One persisted prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub features: EncodedFeatures,
    pub prediction: u8,
    pub probability: f64,
    pub timestamp: String,
}

impl LogRow {
    /// Cells in `LOG_COLUMNS` order.
    pub fn fields(&self) -> Vec<String> {
        let mut out: Vec<String> = self.features.iter().map(|(_, v)| v.to_string()).collect();
        out.push(self.prediction.to_string());
        out.push(self.probability.to_string());
        out.push(self.timestamp.clone());
        out
    }

    pub fn cell(&self, column: &str) -> Option<String> {
        match column {
            "prediction" => Some(self.prediction.to_string()),
            "probability" => Some(self.probability.to_string()),
            "timestamp" => Some(self.timestamp.clone()),
            _ => self.features.get(column).map(|v| v.to_string()),
        }
    }

    /// Cells laid out under an existing header. `None` unless the header names every log
    /// column exactly once.
    pub fn fields_for(&self, header: &[String]) -> Option<Vec<String>> {
        if header.iter().eq(LOG_COLUMNS.iter()) {
            return Some(self.fields());
        }
        let complete = header.len() == LOG_COLUMNS.len()
            && LOG_COLUMNS.iter().all(|c| header.iter().any(|h| h == c));
        if !complete {
            return None;
        }
        header.iter().map(|h| self.cell(h)).collect()
    }
}

/// Full contents of the log as read back from disk, header-driven.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl LogTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell `col` of every row, in file order.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |r| r[col].as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// An existing log was deleted before the empty one was written.
    Replaced,
    Created,
}

/// Append-only CSV file holding one row per prediction.
///
/// Writers inside this process are serialised by `write_lock`; other processes
/// touching the same file are not coordinated.
#[derive(Debug)]
pub struct PredictionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, matching the column order of whatever header the file already has.
    /// A missing or blank file gets the `LOG_COLUMNS` header first.
    pub fn append(&self, row: &LogRow) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        self.ensure_parent()?;

        let header = self.read_header()?;
        let need_header = header.is_none();
        let fields = match &header {
            None => row.fields(),
            Some(h) => row.fields_for(h).ok_or_else(|| StoreError::HeaderMismatch {
                path: self.path.clone(),
                found: h.join(","),
            })?,
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io(e))?;

        let mut buf = String::with_capacity(256);
        if need_header {
            push_record(&mut buf, LOG_COLUMNS.iter().copied());
        }
        push_record(&mut buf, fields.iter().map(String::as_str));
        // one write per append keeps header+row together
        f.write_all(buf.as_bytes()).map_err(|e| self.io(e))?;
        f.flush().map_err(|e| self.io(e))?;

        tracing::debug!(path = %self.path.display(), header = need_header, "prediction appended");
        Ok(())
    }

    pub fn read_all(&self) -> Result<LogTable, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(self.io(e)),
        };

        let mut records = parse_csv(&text).map_err(|line| StoreError::Unterminated {
            path: self.path.clone(),
            line,
        })?;
        if records.is_empty() {
            return Err(StoreError::Empty(self.path.clone()));
        }

        let (_, headers) = records.remove(0);
        let mut rows = Vec::with_capacity(records.len());
        for (line, rec) in records {
            if rec.len() != headers.len() {
                return Err(StoreError::Malformed {
                    path: self.path.clone(),
                    line,
                    expected: headers.len(),
                    got: rec.len(),
                });
            }
            rows.push(rec);
        }
        Ok(LogTable { headers, rows })
    }

    /// First record of the file; `None` when the file is missing or holds only blank lines.
    fn read_header(&self) -> Result<Option<Vec<String>>, StoreError> {
        let f = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io(e)),
        };
        let mut reader = BufReader::new(f);
        let mut line = String::new();
        let mut line_no = 0usize;
        loop {
            line.clear();
            if reader.read_line(&mut line).map_err(|e| self.io(e))? == 0 {
                return Ok(None);
            }
            line_no += 1;
            if !line.trim_end_matches(['\r', '\n']).is_empty() {
                break;
            }
        }
        let mut records = parse_csv(&line).map_err(|_| StoreError::Unterminated {
            path: self.path.clone(),
            line: line_no,
        })?;
        Ok(records.pop().map(|(_, fields)| fields))
    }

    /// Deletes the log (if any) and recreates it holding only the header.
    pub fn reset(&self) -> Result<ResetOutcome, StoreError> {
        let _guard = self.write_lock.lock();
        self.ensure_parent()?;

        let outcome = match fs::remove_file(&self.path) {
            Ok(()) => ResetOutcome::Replaced,
            Err(e) if e.kind() == io::ErrorKind::NotFound => ResetOutcome::Created,
            Err(e) => return Err(self.io(e)),
        };

        let mut buf = String::new();
        push_record(&mut buf, LOG_COLUMNS.iter().copied());
        fs::write(&self.path, buf).map_err(|e| self.io(e))?;
        Ok(outcome)
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|e| self.io(e))
            }
            _ => Ok(()),
        }
    }

    fn io(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn push_record<'a>(buf: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, f) in fields.enumerate() {
        if i > 0 {
            buf.push(',');
        }
        buf.push_str(&escape_csv(f));
    }
    buf.push('\n');
}

fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// RFC 4180-ish reader: quoted fields may hold commas, doubled quotes and newlines.
/// Blank lines are skipped. Returns `(starting line, fields)` per record, or the line of an
/// unterminated quote.
fn parse_csv(text: &str) -> Result<Vec<(usize, Vec<String>)>, usize> {
    let mut out = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut start_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if !fields.is_empty() || !field.is_empty() {
                    fields.push(std::mem::take(&mut field));
                    out.push((start_line, std::mem::take(&mut fields)));
                }
                line += 1;
                start_line = line;
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(start_line);
    }
    if !fields.is_empty() || !field.is_empty() {
        fields.push(field);
        out.push((start_line, fields));
    }
    Ok(out)
}
