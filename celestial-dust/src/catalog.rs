//! Comma-separated source catalogs.
//!
//! A catalog is a header line of column names followed by one line per
//! source. Lines starting with `#` are metadata; they are kept and written
//! back ahead of the header. Blank lines are dropped. Fields are split on `,`
//! with no quoting. Column names are trimmed, while data cells are stored as
//! the raw text between commas, so cells that are never touched round-trip
//! unchanged.

use crate::errors::{DustError, DustResult};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    comments: Vec<String>,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Catalog {
    pub fn open(path: impl AsRef<Path>) -> DustResult<Self> {
        let path = path.as_ref();
        let catalog = Self::read(BufReader::new(File::open(path)?))?;
        tracing::info!(
            path = %path.display(),
            rows = catalog.len(),
            columns = catalog.columns.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Parses a catalog from `reader`.
    ///
    /// # Errors
    /// [`DustError::Catalog`] if there is no header, a column name repeats,
    /// or a row has the wrong number of fields.
    pub fn read<R: BufRead>(reader: R) -> DustResult<Self> {
        let mut catalog = Self::default();
        let mut header_seen = false;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.starts_with('#') {
                catalog.comments.push(trimmed.to_string());
                continue;
            }
            if trimmed.trim().is_empty() {
                continue;
            }

            let fields: Vec<String> = trimmed.split(',').map(str::to_string).collect();
            if !header_seen {
                for name in fields {
                    catalog.add_name(name.trim().to_string())?;
                }
                header_seen = true;
                continue;
            }
            if fields.len() != catalog.columns.len() {
                return Err(DustError::catalog(format!(
                    "line {} has {} fields, header has {}",
                    line_no + 1,
                    fields.len(),
                    catalog.columns.len()
                )));
            }
            catalog.rows.push(fields);
        }

        if !header_seen {
            return Err(DustError::catalog("EOF before finding header"));
        }
        Ok(catalog)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Numeric values of column `name`.
    ///
    /// # Errors
    /// [`DustError::Catalog`] if the column is absent or any cell is not a
    /// number.
    pub fn column_f64(&self, name: &str) -> DustResult<Vec<f64>> {
        let col = self.require_column(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, fields)| {
                let cell = &fields[col];
                cell.trim().parse::<f64>().map_err(|_| {
                    DustError::catalog(format!(
                        "row {}, column {}: cannot parse '{}' as a number",
                        row + 1,
                        name,
                        cell
                    ))
                })
            })
            .collect()
    }

    /// Appends a new column.
    ///
    /// # Errors
    /// [`DustError::ShapeMismatch`] if `values` does not have one entry per
    /// row, [`DustError::Catalog`] if the column already exists.
    pub fn push_column(&mut self, name: &str, values: &[f64]) -> DustResult<()> {
        self.check_length(name, values)?;
        self.add_name(name.to_string())?;
        for (fields, value) in self.rows.iter_mut().zip(values) {
            fields.push(value.to_string());
        }
        Ok(())
    }

    /// Replaces column `name` if present, otherwise appends it.
    pub fn set_column(&mut self, name: &str, values: &[f64]) -> DustResult<()> {
        let Some(&col) = self.index.get(name) else {
            return self.push_column(name, values);
        };
        self.check_length(name, values)?;
        tracing::debug!(column = name, "overwriting existing column");
        for (fields, value) in self.rows.iter_mut().zip(values) {
            fields[col] = value.to_string();
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, mut writer: W) -> DustResult<()> {
        for comment in &self.comments {
            writeln!(writer, "{}", comment)?;
        }
        writeln!(writer, "{}", self.columns.join(","))?;
        for fields in &self.rows {
            writeln!(writer, "{}", fields.join(","))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> DustResult<()> {
        let path = path.as_ref();
        self.write(BufWriter::new(File::create(path)?))?;
        tracing::info!(path = %path.display(), rows = self.len(), "catalog written");
        Ok(())
    }

    fn require_column(&self, name: &str) -> DustResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DustError::catalog(format!("Missing column: {}", name)))
    }

    fn check_length(&self, name: &str, values: &[f64]) -> DustResult<()> {
        if values.len() != self.rows.len() {
            return Err(DustError::shape_mismatch(
                &format!("catalog column {} (values, rows)", name),
                values.len(),
                self.rows.len(),
            ));
        }
        Ok(())
    }

    fn add_name(&mut self, name: String) -> DustResult<()> {
        if self.index.contains_key(&name) {
            return Err(DustError::catalog(format!("Duplicate column: {}", name)));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push(name);
        Ok(())
    }
}
