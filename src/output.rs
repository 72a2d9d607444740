//! Output files that are removed unless completed.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// An output file being written.
///
/// Any previous file at the path is removed on creation. If the value is
/// dropped before [`PartialOutput::commit`], the partial file is deleted so
/// a failed or cancelled run never leaves a silently truncated table.
#[derive(Debug)]
pub struct PartialOutput {
    path: PathBuf,
    writer: BufWriter<File>,
    committed: bool,
}

impl PartialOutput {
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            committed: false,
        })
    }

    /// The underlying writer, for formatted output such as `csv`.
    pub fn writer(&mut self) -> &mut BufWriter<File> {
        &mut self.writer
    }

    /// Write one line followed by a newline.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush and keep the file.
    pub fn commit(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        self.committed = true;
        Ok(self.path.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed {
            debug!(path = %self.path.display(), "removing incomplete output");
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_commit_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut out = PartialOutput::create(&path).unwrap();
        out.write_line("DP").unwrap();
        out.write_line("30").unwrap();
        let kept = out.commit().unwrap();
        assert_eq!(kept, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "DP\n30\n");
    }

    #[test]
    fn test_drop_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        {
            let mut out = PartialOutput::create(&path).unwrap();
            out.write_line("DP").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_create_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "stale\nrows\n").unwrap();
        let mut out = PartialOutput::create(&path).unwrap();
        out.write_line("fresh").unwrap();
        out.commit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }
}
