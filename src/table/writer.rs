//! Incremental tabular output.
//!
//! Values recorded for the current simulated instant accumulate in one row.
//! The first record at a later instant writes that row out. Slot 0 always
//! holds the instant itself under the name `$t`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::mode::{parse_hints, ColumnMode};
use super::schema::ColumnSchema;
use super::sidecar::{ColumnSidecar, SidecarColumn};
use crate::core::Holder;
use crate::fixedpoint;
use crate::util::Result;

/// Name of the time column in slot 0.
pub const TIME_COLUMN: &str = "$t";

/// Upper bound on raw column indices; every row is as wide as the largest.
const MAX_RAW_COLUMNS: usize = 1 << 16;

/// Sidecar used when writing to standard output.
const STDOUT_SIDECAR: &str = "out.columns";

/// Options for [`OutputWriter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Address columns by explicit index and never write headers.
    pub raw: bool,
}

impl OutputOptions {
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }
}

/// Tab-separated output with a growing header.
pub struct OutputWriter {
    name: String,
    out: Option<Box<dyn Write>>,
    sidecar_path: PathBuf,
    raw: bool,
    schema: ColumnSchema,
    modes: Vec<ColumnMode>,
    /// Accumulator for the current instant. NaN means missing.
    values: Vec<f64>,
    /// Schema revision the last header (and sidecar) reflects.
    written_revision: u64,
    time: f64,
    received: bool,
    closed: bool,
}

impl OutputWriter {
    /// Create an output file and its `.columns` sidecar path.
    ///
    /// An empty name or `-` writes to standard output.
    pub fn create(path: impl AsRef<Path>, options: OutputOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        if name.is_empty() || name == "-" {
            return Ok(Self::from_writer(name, io::stdout(), STDOUT_SIDECAR, options));
        }
        let file = File::create(path)?;
        Ok(Self::from_writer(name, BufWriter::new(file), sidecar_path(path), options))
    }

    /// Create an output file, or log and discard everything if that fails.
    pub fn create_or_discard(path: impl AsRef<Path>, options: OutputOptions) -> Self {
        let path = path.as_ref();
        Self::create(path, options).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "output unavailable, discarding");
            Self::with_sink(path.to_string_lossy().into_owned(), None, sidecar_path(path), options)
        })
    }

    /// Write to any sink, with the sidecar at an explicit path.
    pub fn from_writer(
        name: impl Into<String>,
        writer: impl Write + 'static,
        sidecar: impl Into<PathBuf>,
        options: OutputOptions,
    ) -> Self {
        Self::with_sink(name.into(), Some(Box::new(writer)), sidecar.into(), options)
    }

    fn with_sink(
        name: String,
        out: Option<Box<dyn Write>>,
        sidecar_path: PathBuf,
        options: OutputOptions,
    ) -> Self {
        Self {
            name,
            out,
            sidecar_path,
            raw: options.raw,
            schema: ColumnSchema::new(),
            modes: Vec::new(),
            values: Vec::new(),
            written_revision: 0,
            time: f64::NEG_INFINITY,
            received: false,
            closed: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_raw(&self) -> bool {
        self.raw
    }

    #[inline]
    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    #[inline]
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Instant currently being accumulated.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Hints recorded for a slot.
    pub fn mode(&self, slot: usize) -> Option<&ColumnMode> {
        self.modes.get(slot)
    }

    /// Record a value in a named column. Returns the value.
    ///
    /// `hints` is only read the first time the column appears.
    pub fn record(&mut self, now: f64, column: &str, value: f64, hints: Option<&str>) -> f64 {
        self.begin(now);
        let slot = match self.schema.slot(column) {
            Some(slot) => slot,
            None => {
                let slot = self.schema.push(column);
                self.grow();
                self.apply_hints(slot, hints);
                debug!(output = %self.name, column, slot, "new column");
                slot
            }
        };
        self.values[slot] = value;
        value
    }

    /// Record a value by numeric column.
    ///
    /// In raw mode the index is the data slot (the time column is not
    /// counted) and skipped slots are backfilled as missing. Otherwise the
    /// number is simply used as the column name.
    pub fn record_index(&mut self, now: f64, column: f64, value: f64, hints: Option<&str>) -> f64 {
        if !self.raw {
            return self.record(now, &format_number(column), value, hints);
        }
        let Some(slot) = raw_slot(column) else {
            warn!(output = %self.name, column, "raw column index out of range, value dropped");
            return value;
        };
        self.begin(now);
        let key = (slot - 1).to_string();
        if self.schema.slot(&key).is_none() {
            self.schema.bind(&key, slot);
            self.grow();
            self.apply_hints(slot, hints);
        }
        self.values[slot] = value;
        value
    }

    /// Record a fixed-point value, decoding it at `exponent`.
    pub fn record_fixed(&mut self, now: f64, column: &str, bits: i32, exponent: i32) -> i32 {
        self.record(now, column, fixedpoint::decode(bits, exponent), None);
        bits
    }

    /// Write the accumulated row, header and sidecar if due, and close the
    /// sink. Later calls do nothing.
    ///
    /// The sink is released even when a step fails.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let row = self.flush_row();
        let sidecar = if self.out.is_none() || self.schema.is_empty() {
            Ok(())
        } else {
            self.write_sidecar()
        };
        let flush = match self.out.take() {
            Some(mut out) => out.flush(),
            None => Ok(()),
        };
        row?;
        sidecar?;
        flush?;
        Ok(())
    }

    fn begin(&mut self, now: f64) {
        if now > self.time {
            if let Err(e) = self.flush_row() {
                warn!(output = %self.name, error = %e, "failed to write row");
            }
            self.time = now;
        }
        if !self.received {
            if self.schema.is_empty() {
                self.schema.push(TIME_COLUMN);
                self.grow();
            }
            self.values[0] = self.time;
            self.received = true;
        }
    }

    fn grow(&mut self) {
        let width = self.schema.width();
        self.values.resize(width, f64::NAN);
        self.modes.resize_with(width, ColumnMode::new);
    }

    /// Route reserved keys to the time column, the rest to `slot`.
    fn apply_hints(&mut self, slot: usize, hints: Option<&str>) {
        let Some(hints) = hints else { return };
        for (key, value) in parse_hints(hints) {
            if key == ColumnMode::TIME_SCALE_KEY {
                self.modes[0].set(ColumnMode::SCALE_KEY, value);
            } else if ColumnMode::is_shared_key(key) {
                self.modes[0].set(key, value);
            } else {
                self.modes[slot].set(key, value);
            }
        }
    }

    fn flush_row(&mut self) -> Result<()> {
        if !self.received {
            return Ok(());
        }
        self.received = false;

        let mut text = String::new();
        let grew = self.schema.revision() != self.written_revision;
        if grew {
            self.written_revision = self.schema.revision();
            if !self.raw {
                text.push_str(&self.header_line());
            }
        }
        let last = self.values.len().saturating_sub(1);
        for (i, v) in self.values.iter_mut().enumerate() {
            if !v.is_nan() {
                text.push_str(&v.to_string());
            }
            text.push(if i < last { '\t' } else { '\n' });
            *v = f64::NAN;
        }

        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        out.write_all(text.as_bytes())?;
        if grew {
            self.write_sidecar()?;
        }
        Ok(())
    }

    fn header_line(&self) -> String {
        let headers: Vec<String> = (0..self.schema.width())
            .map(|slot| quote_header(self.schema.name(slot).unwrap_or("")))
            .collect();
        let mut line = headers.join("\t");
        line.push('\n');
        line
    }

    fn write_sidecar(&self) -> Result<()> {
        let sidecar = ColumnSidecar {
            columns: self
                .schema
                .iter()
                .map(|(index, name)| SidecarColumn {
                    index,
                    name: name.to_string(),
                    mode: self.modes.get(index).cloned().unwrap_or_default(),
                })
                .collect(),
        };
        sidecar.write(&self.sidecar_path)
    }
}

impl Holder for OutputWriter {
    fn close(&mut self) -> Result<()> {
        OutputWriter::close(self)
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(output = %self.name, error = %e, "final flush failed");
        }
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".columns");
    PathBuf::from(s)
}

fn quote_header(name: &str) -> String {
    if name.contains([' ', '\t', ',', '"']) {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    }
}

/// Slot for a raw data-column index. NaN and negatives clamp to 0.
fn raw_slot(column: f64) -> Option<usize> {
    let index = if column.is_nan() || column < 0.0 { 0.0 } else { column.round() };
    if index >= MAX_RAW_COLUMNS as f64 {
        return None;
    }
    (index as usize).checked_add(1)
}

/// Integral values print without a fraction so `3.0` names column `3`.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}
