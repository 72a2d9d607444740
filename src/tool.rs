//! The external variant tool.
//!
//! [`VariantTool`] is the seam between the resolver/assembler and the
//! subprocess that actually reads records. [`Bcftools`] runs the real binary;
//! tests substitute a fake that returns canned text.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{Result, VcfQueryError};

/// Shared flag used to cancel running tool invocations.
///
/// Checked before every subprocess is spawned and on every streamed line;
/// a cancelled invocation kills its child and returns
/// [`VcfQueryError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once [`CancelFlag::cancel`] has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VcfQueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Arguments for a `query -f` extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub file: PathBuf,
    pub format: String,
    pub region: Option<String>,
}

impl QueryRequest {
    /// `query -f <format> [--regions R] <file>`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["query".into(), "-f".into(), (&self.format).into()];
        if let Some(region) = &self.region {
            args.push("--regions".into());
            args.push(region.into());
        }
        args.push(self.file.clone().into_os_string());
        args
    }
}

/// Operations the core needs from the external variant tool.
pub trait VariantTool {
    /// Header text (`view -h`).
    fn view_header(&self, file: &Path) -> Result<String>;

    /// Sample identifiers in file order (`query -l`).
    fn list_samples(&self, file: &Path) -> Result<Vec<String>>;

    /// Run an extraction and hand each output line to `on_line` as it
    /// arrives.
    fn query(
        &self,
        request: &QueryRequest,
        on_line: &mut dyn FnMut(&str) -> Result<()>,
    ) -> Result<()>;

    /// Genotype concordance (`gtcheck -G 1`), optionally restricted to the
    /// records matching an `--include` predicate.
    fn gtcheck(&self, file: &Path, include: Option<&str>) -> Result<String>;
}

/// Runs the `bcftools` binary.
#[derive(Debug, Clone)]
pub struct Bcftools {
    program: PathBuf,
    cancel: CancelFlag,
}

impl Default for Bcftools {
    fn default() -> Self {
        Self::new("bcftools")
    }
}

impl Bcftools {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cancel: CancelFlag::new(),
        }
    }

    /// Use a shared cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    fn describe<S: AsRef<OsStr>>(&self, args: &[S]) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
        parts.join(" ")
    }

    fn spawn<S: AsRef<OsStr>>(&self, args: &[S], stdin: Stdio) -> Result<Running> {
        self.cancel.check()?;
        let command = self.describe(args);
        debug!(command = %command, "spawning");

        let stderr = tempfile::tempfile()?;
        let child = Command::new(&self.program)
            .args(args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| VcfQueryError::ToolFailed {
                command: command.clone(),
                code: None,
                stderr: format!("failed to start: {}", e),
            })?;

        Ok(Running {
            child,
            command,
            stderr,
            finished: false,
        })
    }

    /// Run to completion and capture standard output.
    fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<String> {
        let mut running = self.spawn(args, Stdio::null())?;
        let stdout = running.take_stdout()?;
        let mut out = String::new();
        BufReader::new(stdout).read_to_string(&mut out)?;
        running.finish()?;
        Ok(out)
    }
}

impl VariantTool for Bcftools {
    fn view_header(&self, file: &Path) -> Result<String> {
        self.run(&[OsStr::new("view"), OsStr::new("-h"), file.as_os_str()])
    }

    fn list_samples(&self, file: &Path) -> Result<Vec<String>> {
        let out = self.run(&[OsStr::new("query"), OsStr::new("-l"), file.as_os_str()])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn query(
        &self,
        request: &QueryRequest,
        on_line: &mut dyn FnMut(&str) -> Result<()>,
    ) -> Result<()> {
        let mut running = self.spawn(&request.args(), Stdio::null())?;
        let stdout = running.take_stdout()?;
        for line in BufReader::new(stdout).lines() {
            // Dropping `running` kills the child.
            self.cancel.check()?;
            on_line(&line?)?;
        }
        running.finish()
    }

    fn gtcheck(&self, file: &Path, include: Option<&str>) -> Result<String> {
        let Some(predicate) = include else {
            return self.run(&[
                OsStr::new("gtcheck"),
                OsStr::new("-G"),
                OsStr::new("1"),
                file.as_os_str(),
            ]);
        };

        // view --include <predicate> <file> | gtcheck -G 1 -
        let mut view = self.spawn(
            &[
                OsStr::new("view"),
                OsStr::new("--include"),
                OsStr::new(predicate),
                file.as_os_str(),
            ],
            Stdio::null(),
        )?;
        let piped = view.take_stdout()?;
        let mut gtcheck = self.spawn(&["gtcheck", "-G", "1", "-"], Stdio::from(piped))?;

        let mut out = String::new();
        gtcheck.take_stdout()?.read_to_string(&mut out)?;
        let gtcheck_result = gtcheck.finish();
        view.finish()?;
        gtcheck_result?;
        Ok(out)
    }
}

/// A spawned child that is killed if dropped before it finished.
struct Running {
    child: Child,
    command: String,
    stderr: File,
    finished: bool,
}

impl Running {
    fn take_stdout(&mut self) -> Result<std::process::ChildStdout> {
        self.child.stdout.take().ok_or_else(|| {
            VcfQueryError::UnexpectedOutput(format!("no stdout from `{}`", self.command))
        })
    }

    fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait()?;
        self.finished = true;
        Ok(status)
    }

    fn read_stderr(&mut self) -> String {
        let mut text = String::new();
        if self.stderr.seek(SeekFrom::Start(0)).is_ok() {
            let _ = self.stderr.read_to_string(&mut text);
        }
        text.trim().to_string()
    }

    /// Wait for exit and turn a non-zero status into `ToolFailed`.
    fn finish(&mut self) -> Result<()> {
        let status = self.wait()?;
        debug!(command = %self.command, code = ?status.code(), "completed");
        if status.success() {
            Ok(())
        } else {
            Err(VcfQueryError::ToolFailed {
                command: self.command.clone(),
                code: status.code(),
                stderr: self.read_stderr(),
            })
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) => {
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
            Err(_) => {
                let _ = self.child.kill();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_request_args() {
        let request = QueryRequest {
            file: PathBuf::from("calls.vcf.gz"),
            format: r"%CHROM,%POS\n".to_string(),
            region: Some("chr1:1-1000".to_string()),
        };
        let args: Vec<String> = request
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["query", "-f", r"%CHROM,%POS\n", "--regions", "chr1:1-1000", "calls.vcf.gz"]
        );
    }

    #[test]
    fn test_query_request_without_region() {
        let request = QueryRequest {
            file: PathBuf::from("calls.bcf"),
            format: r"%QUAL\n".to_string(),
            region: None,
        };
        assert_eq!(request.args().len(), 4);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let tool = Bcftools::new("bcftools").with_cancel(flag.clone());
        assert!(tool.cancel_flag().check().is_ok());
        flag.cancel();
        assert!(matches!(tool.cancel_flag().check(), Err(VcfQueryError::Cancelled)));
    }

    #[test]
    fn test_cancelled_tool_does_not_spawn() {
        let tool = Bcftools::new("definitely-not-a-real-binary");
        tool.cancel_flag().cancel();
        let err = tool.view_header(Path::new("x.vcf")).unwrap_err();
        assert!(matches!(err, VcfQueryError::Cancelled));
    }

    #[test]
    fn test_missing_binary_is_tool_failure() {
        let tool = Bcftools::new("definitely-not-a-real-binary");
        let err = tool.list_samples(Path::new("x.vcf")).unwrap_err();
        assert!(matches!(err, VcfQueryError::ToolFailed { code: None, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_kills_streaming_child() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("endless-bcftools");
        std::fs::write(&script, "#!/bin/sh\nwhile :; do echo 1; done\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let flag = CancelFlag::new();
        let tool = Bcftools::new(&script).with_cancel(flag.clone());
        let request = QueryRequest {
            file: PathBuf::from("calls.vcf.gz"),
            format: r"%INFO/DP\n".to_string(),
            region: None,
        };

        let mut seen = 0;
        let result = tool.query(&request, &mut |_line: &str| {
            seen += 1;
            if seen == 3 {
                flag.cancel();
            }
            Ok(())
        });
        assert!(matches!(result, Err(VcfQueryError::Cancelled)));
        assert_eq!(seen, 3);
    }
}
