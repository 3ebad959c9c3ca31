//! Streaming tabular input.
//!
//! Reads a delimited text file one line at a time and answers value queries
//! for a simulated instant (time mode) or a row number (row mode). At most
//! two rows are buffered: the current row and the next one.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::{debug, trace, warn};

use super::date::{looks_like_date, parse_date};
use super::schema::ColumnSchema;
use crate::core::Holder;
use crate::fixedpoint;
use crate::matrix::DenseMatrix;
use crate::util::{Error, Result};

/// Options for [`InputReader`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputOptions {
    /// Queries are by time and a time column is discovered.
    pub time: bool,
    /// Interpolate linearly between the buffered rows. Implies `time`.
    pub smooth: bool,
    /// Tolerance when deciding whether the next row has been reached.
    pub epsilon: f64,
    /// Binary-point position for fixed-point queries.
    pub exponent: i32,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self { time: false, smooth: false, epsilon: 1e-7, exponent: 0 }
    }
}

impl InputOptions {
    pub fn time(mut self, time: bool) -> Self {
        self.time = time;
        self
    }

    pub fn smooth(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self.time |= smooth;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Derive the tolerance from the simulation step.
    pub fn with_dt(self, dt: f64) -> Self {
        self.epsilon(dt / 1000.0)
    }

    pub fn exponent(mut self, exponent: i32) -> Self {
        self.exponent = exponent;
        self
    }
}

#[derive(Clone, Debug)]
struct Row {
    time: f64,
    values: Vec<f64>,
}

impl Row {
    #[inline]
    fn value(&self, slot: usize) -> f64 {
        self.values.get(slot).copied().unwrap_or(0.0)
    }
}

/// Cached, lazily-read tabular input.
pub struct InputReader {
    name: String,
    source: Option<Box<dyn BufRead>>,
    options: InputOptions,
    delimiter: Option<char>,
    schema: ColumnSchema,
    time_column: usize,
    time_column_locked: bool,
    /// Widest row seen so far. Never shrinks.
    width: usize,
    /// Data lines consumed, the row number in row mode.
    rows_read: usize,
    current: Option<Row>,
    next: Option<Row>,
    exhausted: bool,
    /// Whole-row answer for the last queried instant.
    row_cache: Option<(f64, DenseMatrix<f64>)>,
    line: String,
}

impl InputReader {
    /// Open a file. An empty name or `-` reads standard input.
    pub fn open(path: impl AsRef<Path>, options: InputOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        if name.is_empty() || name == "-" {
            return Ok(Self::from_reader(name, BufReader::new(io::stdin()), options));
        }
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Ok(Self::from_reader(name, BufReader::new(file), options))
    }

    /// Open a file, or log and behave as empty input if it cannot be opened.
    pub fn open_or_empty(path: impl AsRef<Path>, options: InputOptions) -> Self {
        let path = path.as_ref();
        Self::open(path, options).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "input unavailable, reading as empty");
            Self::with_source(path.to_string_lossy().into_owned(), None, options)
        })
    }

    /// Read from any buffered source.
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl BufRead + 'static,
        options: InputOptions,
    ) -> Self {
        Self::with_source(name.into(), Some(Box::new(reader)), options)
    }

    fn with_source(name: String, source: Option<Box<dyn BufRead>>, options: InputOptions) -> Self {
        let options = options.smooth(options.smooth);
        Self {
            name,
            source,
            options,
            delimiter: None,
            schema: ColumnSchema::new(),
            time_column: 0,
            time_column_locked: false,
            width: 0,
            rows_read: 0,
            current: None,
            next: None,
            exhausted: false,
            row_cache: None,
            line: String::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn options(&self) -> &InputOptions {
        &self.options
    }

    /// Detected delimiter, once a non-empty line has been read.
    #[inline]
    pub fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    /// Header-derived name→slot mapping.
    #[inline]
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Slot of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.slot(name)
    }

    /// Width of the widest row seen, time column included.
    #[inline]
    pub fn columns(&self) -> usize {
        self.width
    }

    /// Columns addressable by numeric index.
    pub fn data_columns(&self) -> usize {
        if self.options.time {
            self.width.saturating_sub(1)
        } else {
            self.width
        }
    }

    /// Slot of the time column, in time mode.
    pub fn time_column(&self) -> Option<usize> {
        self.options.time.then_some(self.time_column)
    }

    /// Time (or row number) of the current row.
    pub fn current_time(&self) -> Option<f64> {
        self.current.as_ref().map(|r| r.time)
    }

    /// Time (or row number) of the buffered look-ahead row.
    pub fn next_time(&self) -> Option<f64> {
        self.next.as_ref().map(|r| r.time)
    }

    /// Whether the source has no more lines.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted || self.source.is_none()
    }

    /// Value of a named column. Unknown names read as 0.
    pub fn get_by_name(&mut self, at: f64, column: &str) -> f64 {
        self.advance(at);
        match self.schema.slot(column) {
            Some(slot) => self.value_at(at, slot),
            None => 0.0,
        }
    }

    /// Value of a data column by position, time column excluded.
    ///
    /// The index is rounded and clamped into range. With no data columns
    /// the result is 0.
    pub fn get_by_index(&mut self, at: f64, column: f64) -> f64 {
        self.advance(at);
        match self.data_slot(column) {
            Some(slot) => self.value_at(at, slot),
            None => 0.0,
        }
    }

    /// [`get_by_name`](Self::get_by_name) encoded at the configured exponent.
    pub fn get_fixed_by_name(&mut self, at: f64, column: &str) -> i32 {
        let exponent = self.options.exponent;
        fixedpoint::encode_f64(self.get_by_name(at, column), exponent)
    }

    /// [`get_by_index`](Self::get_by_index) encoded at the configured exponent.
    pub fn get_fixed_by_index(&mut self, at: f64, column: f64) -> i32 {
        let exponent = self.options.exponent;
        fixedpoint::encode_f64(self.get_by_index(at, column), exponent)
    }

    /// The whole row as a 1×N matrix, time column stripped in time mode.
    ///
    /// Repeated queries at the same instant reuse the cached matrix.
    pub fn row(&mut self, at: f64) -> &DenseMatrix<f64> {
        self.advance(at);
        let key = if self.options.smooth {
            at
        } else {
            self.current_time().unwrap_or(f64::NEG_INFINITY)
        };
        let cached = match self.row_cache.take() {
            Some((k, m)) if k == key => (k, m),
            _ => (key, self.build_row(at)),
        };
        &self.row_cache.insert(cached).1
    }

    fn build_row(&self, at: f64) -> DenseMatrix<f64> {
        let values: Vec<f64> = (0..self.width)
            .filter(|&slot| !(self.options.time && slot == self.time_column))
            .map(|slot| self.value_at(at, slot))
            .collect();
        let n = values.len();
        DenseMatrix::from_vec(1, n, values).unwrap_or_else(|| DenseMatrix::zeros(1, 0))
    }

    fn data_slot(&self, column: f64) -> Option<usize> {
        let count = self.data_columns();
        if count == 0 {
            return None;
        }
        let c = column.round();
        let c = if c.is_nan() || c < 0.0 { 0 } else { (c as usize).min(count - 1) };
        Some(if self.options.time && c >= self.time_column { c + 1 } else { c })
    }

    fn value_at(&self, at: f64, slot: usize) -> f64 {
        let Some(current) = &self.current else {
            return 0.0;
        };
        let v0 = current.value(slot);
        if !self.options.smooth {
            return v0;
        }
        let Some(next) = &self.next else {
            return v0;
        };
        let (t0, t1) = (current.time, next.time);
        if !(t0 <= at && at < t1) {
            return v0;
        }
        let span = t1 - t0;
        let v1 = next.value(slot);
        (at - t0) / span * v1 + (t1 - at) / span * v0
    }

    /// Consume rows until the look-ahead row lies beyond `at`.
    ///
    /// Never waits for input: on end of stream the current row stands.
    fn advance(&mut self, at: f64) {
        let limit = if self.options.time { at + self.options.epsilon } else { at };
        loop {
            if self.next.is_none() {
                if self.exhausted {
                    break;
                }
                match self.read_row() {
                    Some(row) => self.next = Some(row),
                    None => {
                        self.exhausted = true;
                        break;
                    }
                }
            }
            match self.next.take() {
                Some(row) if row.time <= limit => {
                    trace!(input = %self.name, time = row.time, "advanced row");
                    self.current = Some(row);
                    self.row_cache = None;
                }
                other => {
                    self.next = other;
                    break;
                }
            }
        }
    }

    /// Read lines until a data row is found, absorbing headers on the way.
    fn read_row(&mut self) -> Option<Row> {
        let mut line = std::mem::take(&mut self.line);
        let row = loop {
            line.clear();
            let source = self.source.as_mut()?;
            match source.read_line(&mut line) {
                Ok(0) => break None,
                Ok(_) => {}
                Err(e) => {
                    warn!(input = %self.name, error = %e, "read failed, treating as end of input");
                    break None;
                }
            }
            let text = line.trim_end_matches(['\r', '\n']);
            if text.trim().is_empty() {
                continue;
            }
            let delimiter = *self.delimiter.get_or_insert_with(|| {
                let d = detect_delimiter(text);
                debug!(input = %self.name, delimiter = ?d, "detected delimiter");
                d
            });
            if is_header(text, delimiter) {
                self.read_header(text, delimiter);
                continue;
            }
            break Some(self.parse_data(text, delimiter));
        };
        self.line = line;
        row
    }

    fn read_header(&mut self, text: &str, delimiter: char) {
        let fields = split_fields(text, delimiter);
        self.width = self.width.max(fields.len());
        for (i, field) in fields.iter().enumerate() {
            let name = strip_quotes(field);
            if !name.is_empty() {
                self.schema.bind(name, i);
            }
        }
        debug!(input = %self.name, columns = self.schema.width(), "read header");

        if self.options.time && !self.time_column_locked {
            let mut best = 0;
            for (slot, name) in self.schema.iter() {
                let score = time_score(name);
                if score > best {
                    best = score;
                    self.time_column = slot;
                }
            }
            self.time_column_locked = true;
            debug!(input = %self.name, column = self.time_column, "selected time column");
        }
    }

    fn parse_data(&mut self, text: &str, delimiter: char) -> Row {
        let fields = split_fields(text, delimiter);
        self.width = self.width.max(fields.len());
        let mut values = vec![0.0; self.width];
        for (i, field) in fields.iter().enumerate() {
            values[i] = if self.options.time && i == self.time_column && looks_like_date(field) {
                parse_date(field).unwrap_or_else(|e| {
                    debug!(input = %self.name, error = %e, "unreadable date");
                    0.0
                })
            } else {
                field.trim().parse().unwrap_or(0.0)
            };
        }
        let time = if self.options.time {
            values.get(self.time_column).copied().unwrap_or(0.0)
        } else {
            self.rows_read as f64
        };
        self.rows_read += 1;
        Row { time, values }
    }
}

impl Holder for InputReader {
    fn close(&mut self) -> Result<()> {
        self.source = None;
        self.exhausted = true;
        Ok(())
    }
}

/// Tab beats comma beats space.
fn detect_delimiter(line: &str) -> char {
    if line.contains('\t') {
        '\t'
    } else if line.contains(',') {
        ','
    } else {
        ' '
    }
}

/// A header line starts with something that cannot begin a number.
fn is_header(line: &str, delimiter: char) -> bool {
    let line = if delimiter == ' ' { line.trim_start() } else { line };
    match line.chars().next() {
        Some(c) => !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.') || c == delimiter),
        None => false,
    }
}

fn split_fields(line: &str, delimiter: char) -> Vec<&str> {
    if delimiter == ' ' {
        line.split_whitespace().collect()
    } else {
        line.split(delimiter).map(str::trim).collect()
    }
}

fn strip_quotes(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

fn time_score(name: &str) -> u8 {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "$t" => 4,
        "time" => 3,
        "t" | "date" => 2,
        s if s.contains("time") => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str, options: InputOptions) -> InputReader {
        InputReader::from_reader("test", Cursor::new(text.to_string()), options)
    }

    #[test]
    fn test_delimiter_precedence() {
        assert_eq!(detect_delimiter("a,b\tc d"), '\t');
        assert_eq!(detect_delimiter("a b,c"), ',');
        assert_eq!(detect_delimiter("a b c"), ' ');
    }

    #[test]
    fn test_header_detection() {
        assert!(is_header("time,x", ','));
        assert!(is_header("\"a\"\t\"b\"", '\t'));
        assert!(!is_header("-1.5,2", ','));
        assert!(!is_header(".5 1", ' '));
        assert!(!is_header("  3 4", ' '));
        assert!(!is_header(",5", ','));
    }

    #[test]
    fn test_time_scores() {
        assert_eq!(time_score("$t"), 4);
        assert_eq!(time_score("Time"), 3);
        assert_eq!(time_score("t"), 2);
        assert_eq!(time_score("DATE"), 2);
        assert_eq!(time_score("elapsed_time"), 1);
        assert_eq!(time_score("x"), 0);
    }

    #[test]
    fn test_row_mode() {
        let mut r = reader("1 2\n3 4\n5 6\n", InputOptions::default());
        assert_eq!(r.get_by_index(0.0, 1.0), 2.0);
        assert_eq!(r.get_by_index(2.0, 0.0), 5.0);
        // Past the end holds the last row.
        assert_eq!(r.get_by_index(10.0, 1.0), 6.0);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_headers_and_names() {
        let mut r = reader("\"a\",b,c\n1,2,3\n", InputOptions::default());
        assert_eq!(r.get_by_name(0.0, "a"), 1.0);
        assert_eq!(r.get_by_name(0.0, "c"), 3.0);
        assert_eq!(r.get_by_name(0.0, "missing"), 0.0);
        assert_eq!(r.delimiter(), Some(','));
    }

    #[test]
    fn test_time_column_selection() {
        let opts = InputOptions::default().time(true);
        let mut r = reader("x\ttime\t$t\n1\t2\t3\n", opts);
        r.get_by_index(0.0, 0.0);
        assert_eq!(r.time_column(), Some(2));

        let mut r = reader("date,t,v\n1,2,3\n", opts);
        r.get_by_index(0.0, 0.0);
        assert_eq!(r.time_column(), Some(0));
    }

    #[test]
    fn test_time_column_locked_after_first_header() {
        let opts = InputOptions::default().time(true);
        let mut r = reader("v,t\n5,0\n$t,v,t\n6,1,1\n", opts);
        assert_eq!(r.get_by_name(0.0, "v"), 5.0);
        r.get_by_name(1.0, "v");
        assert_eq!(r.time_column(), Some(1));
    }

    #[test]
    fn test_index_skips_time_column() {
        let opts = InputOptions::default().time(true);
        let mut r = reader("a,t,b\n10,0,20\n", opts);
        assert_eq!(r.get_by_index(0.0, 0.0), 10.0);
        assert_eq!(r.get_by_index(0.0, 1.0), 20.0);
        assert_eq!(r.get_by_index(0.0, 0.6), 20.0);
        assert_eq!(r.get_by_index(0.0, 7.0), 20.0);
        assert_eq!(r.get_by_index(0.0, -3.0), 10.0);
    }

    #[test]
    fn test_index_with_time_column_last() {
        let opts = InputOptions::default().time(true);
        let mut r = reader("a,b,time\n10,20,0\n", opts);
        assert_eq!(r.get_by_index(0.0, 0.0), 10.0);
        assert_eq!(r.get_by_index(0.0, 1.0), 20.0);
        // Clamped to the last data column, never onto the time column.
        assert_eq!(r.get_by_index(0.0, 2.0), 20.0);
        assert_eq!(r.time_column(), Some(2));
    }

    #[test]
    fn test_index_with_only_time_column() {
        let opts = InputOptions::default().time(true);
        let mut r = reader("t\n0\n1\n", opts);
        assert_eq!(r.get_by_index(0.0, 0.0), 0.0);
        assert_eq!(r.row(0.0).columns(), 0);
    }

    #[test]
    fn test_step_and_epsilon() {
        let opts = InputOptions::default().time(true).epsilon(0.01);
        let mut r = reader("t,v\n0,0\n10,10\n", opts);
        assert_eq!(r.get_by_name(5.0, "v"), 0.0);
        assert_eq!(r.get_by_name(9.995, "v"), 10.0);
        assert_eq!(r.current_time(), Some(10.0));
    }

    #[test]
    fn test_smooth_interpolation() {
        let opts = InputOptions::default().smooth(true);
        let mut r = reader("t,v\n0,0\n10,10\n", opts);
        assert_eq!(r.get_by_name(0.0, "v"), 0.0);
        assert_eq!(r.get_by_name(5.0, "v"), 5.0);
        assert!((r.get_by_name(9.999, "v") - 9.999).abs() < 1e-9);
        assert_eq!(r.get_by_name(10.0, "v"), 10.0);
        assert_eq!(r.get_by_name(20.0, "v"), 10.0);
    }

    #[test]
    fn test_dates_in_time_column() {
        let opts = InputOptions::default().time(true);
        let mut r = reader("date,v\n1970-01-01,1\n1970-01-02,2\n", opts);
        assert_eq!(r.get_by_name(0.0, "v"), 1.0);
        assert_eq!(r.get_by_name(86400.0, "v"), 2.0);
    }

    #[test]
    fn test_row_cache() {
        let opts = InputOptions::default().time(true);
        let mut r = reader("t,a,b\n0,1,2\n5,3,4\n", opts);
        let first = r.row(1.0).clone();
        assert_eq!(first.as_slice(), &[1.0, 2.0]);
        let ptr = r.row(2.0).as_slice().as_ptr();
        assert_eq!(r.row(3.0).as_slice().as_ptr(), ptr);
        assert_eq!(r.row(5.0).as_slice(), &[3.0, 4.0]);
    }

    #[test]
    fn test_width_grows() {
        let mut r = reader("1\n2 3 4\n", InputOptions::default());
        assert_eq!(r.get_by_index(0.0, 2.0), 0.0);
        assert_eq!(r.columns(), 3);
        assert_eq!(r.get_by_index(1.0, 2.0), 4.0);
    }

    #[test]
    fn test_fixed_queries() {
        let opts = InputOptions::default().exponent(2);
        let mut r = reader("2\n", opts);
        assert_eq!(r.get_fixed_by_index(0.0, 0.0), 1 << 29);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let mut r = InputReader::open_or_empty("/nonexistent/input.tsv", InputOptions::default());
        assert!(r.is_exhausted());
        assert_eq!(r.get_by_index(0.0, 0.0), 0.0);
        assert_eq!(r.row(0.0).columns(), 0);
    }
}
