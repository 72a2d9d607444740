//! Query assembly.
//!
//! Combines one or two resolved variables into the tool's `-f` format string
//! and the matching comma-separated output header, then streams the tool's
//! output into a table file.

use std::path::Path;

use crate::error::Result;
use crate::output::PartialOutput;
use crate::resolve::{ResolvedVariable, SIGIL};
use crate::tool::{QueryRequest, VariantTool};

/// The tool's escaped newline, as written inside a format string.
pub const NEWLINE_ESCAPE: &str = "\\n";

/// Suffixes stripped from a source file name to get its stem.
const FORMAT_EXTENSIONS: [&str; 3] = [".gz", ".vcf", ".bcf"];

/// An assembled extraction: output header plus tool arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Comma-separated output header, without trailing newline.
    pub header: String,
    /// The `-f` format string, ending in an escaped newline.
    pub format: String,
    /// `--regions` restriction; `None` when empty or absent.
    pub region: Option<String>,
}

impl QueryPlan {
    /// Assemble a plan for `x` and an optional second variable `y`.
    ///
    /// When the format starts with the position field, the chromosome is
    /// prepended to both header and format.
    pub fn build(x: &ResolvedVariable, y: &ResolvedVariable, region: Option<&str>) -> Self {
        let present: Vec<&ResolvedVariable> = [x, y].into_iter().filter(|v| !v.is_absent()).collect();

        let mut header = present
            .iter()
            .map(|v| v.column_name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let mut format = present
            .iter()
            .filter_map(|v| v.query_expr.as_deref())
            .collect::<Vec<_>>()
            .join(",");

        let position = format!("{}POS", SIGIL);
        if format.starts_with(&position) {
            header = format!("CHROM,{}", header);
            format = format!("{}CHROM,{}", SIGIL, format);
        }
        format.push_str(NEWLINE_ESCAPE);

        let region = region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Self {
            header,
            format,
            region,
        }
    }

    /// The tool request for `file`.
    pub fn request(&self, file: &Path) -> QueryRequest {
        QueryRequest {
            file: file.to_path_buf(),
            format: self.format.clone(),
            region: self.region.clone(),
        }
    }
}

/// The file name with `.gz`, `.vcf` and `.bcf` suffixes stripped.
pub fn file_stem(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    while let Some(stripped) = FORMAT_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
    {
        name = stripped.to_string();
    }
    name.trim_matches('.').to_string()
}

/// Make an expression safe for use in a file name: sigils, brackets and
/// newline escapes removed, path separators replaced with `-`.
pub fn sanitize_expr(expr: &str) -> String {
    expr.replace(NEWLINE_ESCAPE, "")
        .replace(['%', '[', ']'], "")
        .replace('/', "-")
}

/// `<prefix><stem>.<x>[.<y>].txt`, skipping empty parts.
pub fn data_file_name(prefix: &str, stem: &str, x: Option<&str>, y: Option<&str>) -> String {
    let mut name = format!("{}{}", prefix, stem);
    for part in [x, y].into_iter().flatten().map(sanitize_expr) {
        if !part.is_empty() {
            name.push('.');
            name.push_str(&part);
        }
    }
    name.push_str(".txt");
    name
}

/// Write the plan's header, then every non-blank line of the tool output.
///
/// The file is replaced if it exists and removed again if the tool fails.
/// Returns the number of data lines written.
pub fn write_query_output<T: VariantTool + ?Sized>(
    tool: &T,
    plan: &QueryPlan,
    source: &Path,
    out_path: &Path,
) -> Result<usize> {
    let mut out = PartialOutput::create(out_path)?;
    out.write_line(&plan.header)?;

    let mut rows = 0;
    tool.query(&plan.request(source), &mut |line: &str| {
        if line.trim().is_empty() {
            return Ok(());
        }
        rows += 1;
        out.write_line(line)
    })?;

    out.commit()?;
    Ok(rows)
}
