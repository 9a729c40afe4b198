//! CSV table files shared by the message store and the location aggregate.
//!
//! Tables are created with their header on first use, read by column name
//! (extra or reordered columns are tolerated) and rewritten whole through a
//! temporary sibling that is renamed into place.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer};
use tracing::{debug, info};

use crate::error::{MonitorError, Result};

/// Rows of a table together with the position of each requested column.
pub(crate) struct TableRows {
    pub(crate) columns: Vec<usize>,
    pub(crate) records: Vec<StringRecord>,
}

impl TableRows {
    /// Field of `record` for the `index`-th requested column.
    pub(crate) fn field<'r>(&self, record: &'r StringRecord, index: usize) -> &'r str {
        self.columns
            .get(index)
            .and_then(|&pos| record.get(pos))
            .unwrap_or("")
    }
}

/// Create `path` holding only `header` when it does not exist yet.
///
/// Returns true when the file was created.
pub(crate) fn ensure_table(path: &Path, header: &[&str]) -> Result<bool> {
    if path.exists() && fs::metadata(path)?.len() > 0 {
        return Ok(false);
    }
    write_table(path, header, |_| Ok(()))?;
    info!(path = %path.display(), "Initialized empty table");
    Ok(true)
}

/// Read every row of `path`, locating `required` columns by header name.
pub(crate) fn read_table(path: &Path, required: &[&str]) -> Result<TableRows> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let columns = required
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim() == *name)
                .ok_or_else(|| MonitorError::Persistence {
                    path: path.to_path_buf(),
                    message: format!("missing column '{name}'"),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(path = %path.display(), rows = records.len(), "Read table");

    Ok(TableRows { columns, records })
}

/// A fully written and synced temporary copy of a table, not yet visible
/// at its final path. Dropping it without [`commit`](Self::commit) removes
/// the temporary file.
#[derive(Debug)]
pub(crate) struct StagedTable {
    path: PathBuf,
    tmp_path: PathBuf,
    committed: bool,
}

impl StagedTable {
    /// Final path the staged rows will replace
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the staged file over the table.
    pub(crate) fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedTable {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                debug!(path = %self.tmp_path.display(), error = %e, "Could not remove staged table");
            }
        }
    }
}

/// Write `header` and whatever `write_rows` emits to a temporary sibling of
/// `path`, leaving `path` itself untouched.
pub(crate) fn stage_table<F>(path: &Path, header: &[&str], write_rows: F) -> Result<StagedTable>
where
    F: FnOnce(&mut Writer<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    // Declared before the writer so the file is closed before cleanup
    let staged = StagedTable {
        path: path.to_path_buf(),
        tmp_path: temp_path(path),
        committed: false,
    };
    let mut writer = Writer::from_path(&staged.tmp_path)?;

    writer.write_record(header)?;
    write_rows(&mut writer)?;
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| MonitorError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);

    Ok(staged)
}

/// Rewrite `path` with `header` followed by whatever `write_rows` emits.
pub(crate) fn write_table<F>(path: &Path, header: &[&str], write_rows: F) -> Result<()>
where
    F: FnOnce(&mut Writer<File>) -> Result<()>,
{
    stage_table(path, header, write_rows)?.commit()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
