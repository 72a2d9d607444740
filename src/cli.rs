//! Command-line interface for vcf-query.
//!
//! ```text
//! # Show the variables a file declares
//! vcf-query listvars calls.vcf.gz
//!
//! # Extract depth against genotype quality on chr1
//! vcf-query query calls.vcf.gz DP GQ --region chr1
//!
//! # Sample concordance binned by allele frequency
//! vcf-query compare calls.vcf.gz --variable AF --pairs S1,S2
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use vcf_query::{Bcftools, SamplePairs, VariantFile};

#[derive(Parser)]
#[command(name = "vcf-query")]
#[command(version)]
#[command(about = "Extract and compare variables from VCF/BCF files through bcftools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// bcftools executable to run
    #[arg(long, global = true, env = "VCF_QUERY_BCFTOOLS", default_value = "bcftools")]
    pub bcftools: PathBuf,

    /// Directory under which per-file analysis directories are created
    /// (defaults to the directory of the input file)
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List standard, INFO and FORMAT variables declared in the header
    #[command(name = "listvars")]
    ListVars(ListVarsArgs),

    /// Write one or two variables to a comma-separated table
    Query(QueryArgs),

    /// Compute sample genotype concordance, optionally per variable value
    Compare(CompareArgs),
}

#[derive(Args)]
pub struct ListVarsArgs {
    /// VCF or BCF file
    #[arg(required = true)]
    pub file: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct QueryArgs {
    /// VCF or BCF file
    #[arg(required = true)]
    pub file: PathBuf,

    /// First variable (e.g. "DP", "INFO/AF", "FORMAT/GQ")
    #[arg(required = true)]
    pub x: String,

    /// Optional second variable
    pub y: Option<String>,

    /// Restrict to a region (e.g. "chr1" or "chr1:100-200")
    #[arg(short, long)]
    pub region: Option<String>,
}

#[derive(Args)]
pub struct CompareArgs {
    /// VCF or BCF file
    #[arg(required = true)]
    pub file: PathBuf,

    /// Partition the comparison by the values of this variable
    #[arg(long)]
    pub variable: Option<String>,

    /// Sample pairs known to be the same individual (e.g. "a,b:c,d")
    #[arg(long)]
    pub pairs: Option<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Log filter directives. Partition progress is logged at info and shown
/// by default.
pub fn log_directives(verbose: bool) -> &'static str {
    if verbose {
        "vcf_query=debug,info"
    } else {
        "vcf_query=info,warn"
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let tool = Bcftools::new(cli.bcftools.clone());
    let out_dir = cli.out_dir.as_deref();

    match cli.command {
        Commands::ListVars(args) => {
            let file = VariantFile::open(&args.file, tool, out_dir)?;
            let listing = file.list_variables();
            match args.format {
                OutputFormat::Text => print!("{}", listing.to_text()),
                OutputFormat::Json => println!("{}", listing.to_json()?),
            }
        }
        Commands::Query(args) => {
            let file = VariantFile::open(&args.file, tool, out_dir)?;
            let output = file.query(&args.x, args.y.as_deref(), args.region.as_deref())?;
            debug!(rows = output.rows, "query finished");
            println!(
                "{} {} ({} rows)",
                "Wrote".green().bold(),
                output.path.display(),
                output.rows
            );
        }
        Commands::Compare(args) => {
            let file = VariantFile::open(&args.file, tool, out_dir)?;
            let pairs = args
                .pairs
                .as_deref()
                .map(SamplePairs::parse)
                .unwrap_or_default();
            let output = file.compare(args.variable.as_deref(), &pairs)?;
            debug!(
                partitions = output.summary.partitions,
                rows = output.summary.rows,
                "comparison finished"
            );
            println!(
                "{} {} ({} rows)",
                "Wrote".green().bold(),
                output.path.display(),
                output.summary.rows
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_query_with_region() {
        let cli = Cli::try_parse_from([
            "vcf-query", "query", "calls.vcf.gz", "DP", "FORMAT/GQ", "--region", "chr1",
        ])
        .unwrap();
        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.x, "DP");
        assert_eq!(args.y.as_deref(), Some("FORMAT/GQ"));
        assert_eq!(args.region.as_deref(), Some("chr1"));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vcf-query", "compare", "calls.bcf", "--pairs", "S1,S2", "--verbose",
            "--bcftools", "/opt/bcftools", "--out-dir", "results",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.bcftools, PathBuf::from("/opt/bcftools"));
        assert_eq!(cli.out_dir, Some(PathBuf::from("results")));
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.variable, None);
        assert_eq!(args.pairs.as_deref(), Some("S1,S2"));
    }

    #[test]
    fn test_parse_listvars_json() {
        let cli = Cli::try_parse_from(["vcf-query", "listvars", "calls.vcf", "--format", "json"])
            .unwrap();
        let Commands::ListVars(args) = cli.command else {
            panic!("expected listvars");
        };
        assert!(matches!(args.format, OutputFormat::Json));
    }

    #[test]
    fn test_progress_is_logged_by_default() {
        assert_eq!(log_directives(false), "vcf_query=info,warn");
        assert_eq!(log_directives(true), "vcf_query=debug,info");
    }

    #[test]
    fn test_query_requires_variable() {
        assert!(Cli::try_parse_from(["vcf-query", "query", "calls.vcf"]).is_err());
    }
}
