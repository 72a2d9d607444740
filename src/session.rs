//! An opened variant file and the operations run against it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::concordance::{ComparisonSummary, SamplePairs, run_comparison};
use crate::error::Result;
use crate::header::{FieldCatalog, parse_header};
use crate::listing::VariableListing;
use crate::query::{QueryPlan, data_file_name, file_stem, write_query_output};
use crate::resolve::{ResolvedVariable, Resolver};
use crate::tool::{Bcftools, VariantTool};

/// Result of [`VariantFile::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub path: PathBuf,
    pub x: ResolvedVariable,
    pub y: ResolvedVariable,
    pub rows: usize,
}

/// Result of [`VariantFile::compare`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOutput {
    pub path: PathBuf,
    pub variable: ResolvedVariable,
    pub summary: ComparisonSummary,
}

/// One VCF/BCF file: its header catalog, samples and analysis directory.
///
/// The catalog is read once on [`VariantFile::open`]; resolution errors in
/// later calls leave it untouched.
#[derive(Debug)]
pub struct VariantFile<T: VariantTool = Bcftools> {
    path: PathBuf,
    analysis_dir: PathBuf,
    catalog: FieldCatalog,
    samples: Vec<String>,
    tool: T,
}

impl<T: VariantTool> VariantFile<T> {
    /// Read the header and samples of `path` and create its analysis
    /// directory (`<stem>` next to the file, or under `out_root`).
    pub fn open(path: impl Into<PathBuf>, tool: T, out_root: Option<&Path>) -> Result<Self> {
        let path = path.into();
        let header = tool.view_header(&path)?;
        let catalog = parse_header(&header);
        if catalog.skipped() > 0 {
            warn!(
                skipped = catalog.skipped(),
                file = %path.display(),
                "skipped malformed header declarations"
            );
        }

        let mut samples = tool.list_samples(&path)?;
        if samples.is_empty() {
            samples = catalog.samples().to_vec();
        }

        let root = match out_root {
            Some(root) => root.to_path_buf(),
            None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let analysis_dir = root.join(file_stem(&path));
        fs::create_dir_all(&analysis_dir)?;
        debug!(
            info = catalog.info_fields().len(),
            format = catalog.format_fields().len(),
            samples = samples.len(),
            dir = %analysis_dir.display(),
            "opened variant file"
        );

        Ok(Self {
            path,
            analysis_dir,
            catalog,
            samples,
            tool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn analysis_dir(&self) -> &Path {
        &self.analysis_dir
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.catalog)
    }

    pub fn resolve(&self, reference: Option<&str>) -> Result<ResolvedVariable> {
        self.resolver().resolve(reference)
    }

    /// The catalog grouped for display; no resolution involved.
    pub fn list_variables(&self) -> VariableListing {
        VariableListing::new(&self.catalog, &self.samples)
    }

    /// Extract one or two variables into `<analysis_dir>/<stem>.<x>[.<y>].txt`.
    pub fn query(&self, x: &str, y: Option<&str>, region: Option<&str>) -> Result<QueryOutput> {
        let resolver = self.resolver();
        let x = resolver.resolve_required(x)?;
        let y = resolver.resolve(y)?;
        let plan = QueryPlan::build(&x, &y, region);

        let name = data_file_name(
            "",
            &file_stem(&self.path),
            x.query_expr.as_deref(),
            y.query_expr.as_deref(),
        );
        let path = self.analysis_dir.join(name);
        let rows = write_query_output(&self.tool, &plan, &self.path, &path)?;

        Ok(QueryOutput { path, x, y, rows })
    }

    /// Sample concordance, globally or partitioned by `variable`, written to
    /// `<analysis_dir>/Concordance_<stem>[.<variable>].txt`.
    pub fn compare(&self, variable: Option<&str>, pairs: &SamplePairs) -> Result<ComparisonOutput> {
        let variable = self.resolve(variable)?;
        let name = data_file_name(
            "Concordance_",
            &file_stem(&self.path),
            (!variable.is_absent()).then_some(variable.include_expr.as_str()),
            None,
        );
        let path = self.analysis_dir.join(name);
        let summary = run_comparison(&self.tool, &self.path, &variable, pairs, &path)?;

        Ok(ComparisonOutput {
            path,
            variable,
            summary,
        })
    }
}
