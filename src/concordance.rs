//! Sample concordance, globally or partitioned by a variable.
//!
//! For a resolved variable the distinct observed values decide the
//! partitioning: up to [`EXACT_MATCH_LIMIT`] values get one exact-match
//! partition each, more numeric values are split into [`PERCENTILE_BINS`]
//! percentile intervals. Each partition becomes an `--include` predicate,
//! the tool's `gtcheck` runs on the matching records, and its `CN` lines are
//! appended to one tab-delimited table.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{Result, VcfQueryError};
use crate::header::FieldType;
use crate::output::PartialOutput;
use crate::predicate::{BinaryOp, Expr};
use crate::query::NEWLINE_ESCAPE;
use crate::resolve::ResolvedVariable;
use crate::tool::{QueryRequest, VariantTool};
use crate::value::{Value, sorted_distinct};

/// Up to this many distinct values are compared one value at a time.
pub const EXACT_MATCH_LIMIT: usize = 100;

/// Number of percentile intervals used above the exact-match limit.
pub const PERCENTILE_BINS: usize = 100;

/// Marker at the start of each gtcheck result line.
pub const RECORD_MARKER: &str = "CN";

/// Fixed leading columns of the concordance table.
pub const BASE_COLUMNS: [&str; 7] = [
    "Discordant_Sites",
    "Number_of_Sites",
    "Average_minimum_depth",
    "Sample_i",
    "Sample_j",
    "Same_Sample",
    "Concordance",
];

/// One slice of a variable's value domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Partition {
    /// Records where the variable equals the value.
    Exact(Value),
    /// Records with `lower <= variable < upper` (`<= upper` when
    /// `upper_inclusive`).
    Interval {
        lower: f64,
        upper: f64,
        upper_inclusive: bool,
    },
}

impl Partition {
    /// The filter predicate selecting this partition's records.
    pub fn predicate(&self, include_expr: &str) -> Expr {
        match self {
            Partition::Exact(value) => Expr::eq(include_expr, value.clone()),
            Partition::Interval {
                lower,
                upper,
                upper_inclusive,
            } => {
                let upper_op = if *upper_inclusive {
                    BinaryOp::LtEq
                } else {
                    BinaryOp::Lt
                };
                Expr::compare(include_expr, BinaryOp::GtEq, Value::Float(*lower))
                    .and(Expr::compare(include_expr, upper_op, Value::Float(*upper)))
            }
        }
    }

    /// The value written to the table for rows of this partition.
    pub fn representative(&self) -> Value {
        match self {
            Partition::Exact(value) => value.clone(),
            Partition::Interval { upper, .. } => Value::Float(*upper),
        }
    }
}

/// How a variable's values were partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinningMode {
    Exact,
    Percentile,
}

/// The ordered partitions for one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPlan {
    pub mode: BinningMode,
    pub partitions: Vec<Partition>,
}

/// Decide the partitions for `resolved` over its observed values.
///
/// Empty and missing (`.`) values are ignored.
///
/// # Errors
///
/// [`VcfQueryError::DisallowedVariable`] when `resolved` is the chromosome.
pub fn plan_comparison<'a, I>(resolved: &ResolvedVariable, raw_values: I) -> Result<ComparisonPlan>
where
    I: IntoIterator<Item = &'a str>,
{
    if resolved.is_chromosome() {
        return Err(VcfQueryError::DisallowedVariable(
            resolved.include_expr.clone(),
        ));
    }

    let distinct: BTreeSet<&str> = raw_values
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != ".")
        .collect();
    let values = sorted_distinct(
        distinct
            .into_iter()
            .map(|raw| typed_value(resolved.field_type, raw))
            .collect(),
    );

    if values.len() > EXACT_MATCH_LIMIT && values.iter().all(Value::is_numeric) {
        let numbers: Vec<f64> = values.iter().filter_map(Value::as_number).collect();
        return Ok(ComparisonPlan {
            mode: BinningMode::Percentile,
            partitions: percentile_partitions(&numbers),
        });
    }

    Ok(ComparisonPlan {
        mode: BinningMode::Exact,
        partitions: values.into_iter().map(Partition::Exact).collect(),
    })
}

/// Type a raw value by the field's declared type. Text fields stay strings
/// even when they look numeric; undeclared or flag types are inferred.
fn typed_value(field_type: Option<FieldType>, raw: &str) -> Value {
    match field_type {
        Some(t) if !t.is_numeric() && t != FieldType::Flag => Value::String(raw.to_string()),
        _ => Value::coerce(raw),
    }
}

/// Linear-interpolated percentile of sorted data, `p` in `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() - 1) as f64 * p / 100.0;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Tile `[min, max]` with [`PERCENTILE_BINS`] adjacent intervals whose upper
/// bounds are the 1st..100th percentiles. The last interval is closed so the
/// maximum is covered.
fn percentile_partitions(sorted: &[f64]) -> Vec<Partition> {
    let Some(&min) = sorted.first() else {
        return Vec::new();
    };
    let mut lower = min;
    (1..=PERCENTILE_BINS)
        .map(|i| {
            let upper = percentile(sorted, i as f64 * 100.0 / PERCENTILE_BINS as f64);
            let partition = Partition::Interval {
                lower,
                upper,
                upper_inclusive: i == PERCENTILE_BINS,
            };
            lower = upper;
            partition
        })
        .collect()
}

/// `1 - discordant / sites`, or 0 when no sites were compared.
pub fn concordance_ratio(discordant: f64, sites: u64) -> f64 {
    if sites == 0 {
        return 0.0;
    }
    (1.0 - discordant / sites as f64).clamp(0.0, 1.0)
}

/// One `CN` line of gtcheck output.
#[derive(Debug, Clone, PartialEq)]
pub struct GtcheckRecord {
    pub discordant: f64,
    pub sites: u64,
    pub avg_min_depth: f64,
    pub sample_i: String,
    pub sample_j: String,
}

/// Parse every `CN` line; other lines are ignored.
///
/// # Errors
///
/// [`VcfQueryError::UnexpectedOutput`] when a `CN` line has too few or
/// non-numeric fields.
pub fn parse_gtcheck(output: &str) -> Result<Vec<GtcheckRecord>> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            (fields.next() == Some(RECORD_MARKER)).then(|| parse_record(line, fields))
        })
        .collect()
}

fn parse_record<'a>(line: &str, fields: impl Iterator<Item = &'a str>) -> Result<GtcheckRecord> {
    let fields: Vec<&str> = fields.map(str::trim).collect();
    let bad = || VcfQueryError::UnexpectedOutput(format!("malformed gtcheck line: {}", line));
    if fields.len() < 5 {
        return Err(bad());
    }
    let sites = fields[1]
        .parse::<u64>()
        .or_else(|_| fields[1].parse::<f64>().map(|f| f as u64))
        .map_err(|_| bad())?;
    Ok(GtcheckRecord {
        discordant: fields[0].parse().map_err(|_| bad())?,
        sites,
        avg_min_depth: fields[2].parse().map_err(|_| bad())?,
        sample_i: fields[3].to_string(),
        sample_j: fields[4].to_string(),
    })
}

/// Sample pairs known to be the same individual; order-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplePairs(HashSet<(String, String)>);

impl SamplePairs {
    /// Parse `a,b:c,d`. Entries without exactly two names are ignored.
    pub fn parse(text: &str) -> Self {
        let pairs = text
            .split(':')
            .filter_map(|pair| {
                let names: Vec<&str> = pair.split(',').map(str::trim).collect();
                match names.as_slice() {
                    [a, b] if !a.is_empty() && !b.is_empty() => Some(ordered(a, b)),
                    _ => None,
                }
            })
            .collect();
        Self(pairs)
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        self.0.contains(&ordered(a, b))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// One output row of the concordance table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcordanceRow {
    pub record: GtcheckRecord,
    pub same_sample: bool,
    pub concordance: f64,
    /// The partition's representative value; `None` for a global comparison.
    pub value: Option<Value>,
}

impl ConcordanceRow {
    pub fn new(record: GtcheckRecord, pairs: &SamplePairs, value: Option<Value>) -> Self {
        let same_sample = pairs.contains(&record.sample_i, &record.sample_j);
        let concordance = concordance_ratio(record.discordant, record.sites);
        Self {
            record,
            same_sample,
            concordance,
            value,
        }
    }

    fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.record.discordant.to_string(),
            self.record.sites.to_string(),
            self.record.avg_min_depth.to_string(),
            self.record.sample_i.clone(),
            self.record.sample_j.clone(),
            u8::from(self.same_sample).to_string(),
            self.concordance.to_string(),
        ];
        if let Some(value) = &self.value {
            fields.push(value.to_string());
        }
        fields
    }
}

/// Outcome of a comparison run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSummary {
    /// `None` for a global comparison.
    pub mode: Option<BinningMode>,
    pub partitions: usize,
    pub rows: usize,
}

/// Distinct raw values of `resolved` across all records.
pub fn collect_values<T: VariantTool + ?Sized>(
    tool: &T,
    source: &Path,
    resolved: &ResolvedVariable,
) -> Result<Vec<String>> {
    let Some(query_expr) = &resolved.query_expr else {
        return Ok(Vec::new());
    };
    let request = QueryRequest {
        file: source.to_path_buf(),
        format: format!("{}{}", query_expr, NEWLINE_ESCAPE),
        region: None,
    };
    let mut values = BTreeSet::new();
    tool.query(&request, &mut |line: &str| {
        values.insert(line.trim().to_string());
        Ok(())
    })?;
    Ok(values.into_iter().collect())
}

/// Run gtcheck over `source` and write the concordance table to `out_path`.
///
/// With an absent `variable` a single global comparison is made; otherwise
/// one comparison per partition of the variable's values.
pub fn run_comparison<T: VariantTool + ?Sized>(
    tool: &T,
    source: &Path,
    variable: &ResolvedVariable,
    pairs: &SamplePairs,
    out_path: &Path,
) -> Result<ComparisonSummary> {
    // Reject before touching the output file.
    if variable.is_chromosome() {
        return Err(VcfQueryError::DisallowedVariable(
            variable.include_expr.clone(),
        ));
    }

    let mut out = PartialOutput::create(out_path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(out.writer());

    let mut header: Vec<&str> = BASE_COLUMNS.to_vec();
    if !variable.is_absent() {
        header.push(&variable.column_name);
    }
    writer.write_record(&header)?;

    let mut rows = 0;
    let summary = if variable.is_absent() {
        for record in parse_gtcheck(&tool.gtcheck(source, None)?)? {
            writer.write_record(ConcordanceRow::new(record, pairs, None).fields())?;
            rows += 1;
        }
        ComparisonSummary {
            mode: None,
            partitions: 0,
            rows,
        }
    } else {
        let values = collect_values(tool, source, variable)?;
        let plan = plan_comparison(variable, values.iter().map(String::as_str))?;
        if plan.mode == BinningMode::Percentile {
            warn!(
                "More than {} different values for {}, binning by percentile",
                EXACT_MATCH_LIMIT, variable.include_expr
            );
        }

        let total = plan.partitions.len();
        for (index, partition) in plan.partitions.iter().enumerate() {
            let value = partition.representative();
            info!(
                "Comparing genotypes at {}={}; ({}/{})",
                variable.include_expr,
                value,
                index + 1,
                total
            );
            let predicate = partition.predicate(&variable.include_expr).to_string();
            let output = tool.gtcheck(source, Some(&predicate))?;
            for record in parse_gtcheck(&output)? {
                let row = ConcordanceRow::new(record, pairs, Some(value.clone()));
                writer.write_record(row.fields())?;
                rows += 1;
            }
        }
        ComparisonSummary {
            mode: Some(plan.mode),
            partitions: total,
            rows,
        }
    };

    writer.flush()?;
    drop(writer);
    out.commit()?;
    Ok(summary)
}
