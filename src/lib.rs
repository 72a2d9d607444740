//! # VCF Query Library
//!
//! Variable resolution, extraction and genotype concordance for VCF/BCF
//! files, driven through `bcftools`.
//!
//! ## Features
//!
//! - Parse VCF headers into a catalog of standard, INFO and FORMAT fields
//! - Resolve user variable names (`DP`, `INFO/DP`, `FORMAT/GQ`) to query
//!   expressions, column names and include predicates
//! - Extract one or two variables into comma-separated tables
//! - Compare sample genotypes per value or percentile bin of a variable
//!
//! ## Example
//!
//! ```rust
//! use vcf_query::{Resolver, parse_header};
//!
//! let header = concat!(
//!     "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">\n",
//!     "##FORMAT=<ID=GQ,Number=1,Type=Integer,Description=\"Genotype quality\">\n",
//!     "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2"
//! );
//!
//! let catalog = parse_header(header);
//! assert_eq!(catalog.samples(), ["S1", "S2"]);
//!
//! let resolver = Resolver::new(&catalog);
//! let dp = resolver.resolve_required("DP").unwrap();
//! assert_eq!(dp.query_expr.as_deref(), Some("%INFO/DP"));
//!
//! let gq = resolver.resolve_required("FORMAT/GQ").unwrap();
//! assert_eq!(gq.query_expr.as_deref(), Some(r"[%GQ\n]"));
//! ```
//!
//! ## Variable References
//!
//! - `QUAL`, `POS`, `CHROM` - Built-in VCF columns
//! - `DP` - A field declared in only one of INFO or FORMAT
//! - `INFO/DP`, `FORMAT/DP` - Explicit namespace, required when ambiguous
//! - `%DP` - A leading `%` is accepted and ignored

pub mod concordance;
pub mod error;
pub mod header;
pub mod listing;
pub mod output;
pub mod predicate;
pub mod query;
pub mod resolve;
pub mod session;
pub mod tool;
pub mod value;

pub use concordance::{
    BinningMode, ComparisonSummary, ConcordanceRow, GtcheckRecord, Partition, SamplePairs,
};
pub use error::{Result, VcfQueryError};
pub use header::{Cardinality, FieldCatalog, FieldDeclaration, FieldType, parse_header};
pub use listing::VariableListing;
pub use predicate::{BinaryOp, Expr};
pub use query::QueryPlan;
pub use resolve::{Namespace, Origin, ResolvedVariable, Resolver};
pub use session::{ComparisonOutput, QueryOutput, VariantFile};
pub use tool::{Bcftools, CancelFlag, QueryRequest, VariantTool};
pub use value::Value;
