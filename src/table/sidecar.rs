//! Column metadata sidecar (`<output>.columns`).
//!
//! ```text
//! N2A.schema=3
//! 0:$t
//!  scale:ms
//! 1:voltage
//!  color:red
//! ```

use std::fs;
use std::path::Path;

use super::mode::ColumnMode;
use crate::util::{Error, Result};

/// Version tag on the first line.
pub const SIDECAR_VERSION_TAG: &str = "N2A.schema=3";

/// One column entry in a sidecar.
#[derive(Clone, Debug, PartialEq)]
pub struct SidecarColumn {
    pub index: usize,
    pub name: String,
    pub mode: ColumnMode,
}

/// Parsed or to-be-written sidecar contents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnSidecar {
    pub columns: Vec<SidecarColumn>,
}

impl ColumnSidecar {
    pub fn render(&self) -> String {
        let mut out = String::from(SIDECAR_VERSION_TAG);
        out.push('\n');
        for column in &self.columns {
            out.push_str(&format!("{}:{}\n", column.index, column.name));
            for (k, v) in column.mode.iter() {
                out.push_str(&format!(" {}:{}\n", k, v));
            }
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        match lines.next() {
            Some(tag) if tag.trim().starts_with("N2A.schema=") => {}
            _ => return Err(Error::other("missing column sidecar version tag")),
        }

        let mut sidecar = Self::default();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(entry) = line.strip_prefix(' ') {
                let column = sidecar
                    .columns
                    .last_mut()
                    .ok_or_else(|| Error::other(format!("metadata before any column: {line}")))?;
                let (k, v) = entry.split_once(':').unwrap_or((entry, ""));
                column.mode.set(k.trim(), v.trim());
                continue;
            }
            let (index, name) = line
                .split_once(':')
                .ok_or_else(|| Error::other(format!("bad column line: {line}")))?;
            let index = index
                .trim()
                .parse()
                .map_err(|_| Error::other(format!("bad column index: {line}")))?;
            sidecar.columns.push(SidecarColumn {
                index,
                name: name.to_string(),
                mode: ColumnMode::new(),
            });
        }
        Ok(sidecar)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&SidecarColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}
