//! VCF header parser.
//!
//! Builds a [`FieldCatalog`] from `##INFO`, `##FORMAT`, `##FILTER` and
//! `##contig` declarations, simple `##key=value` metadata lines and the
//! `#CHROM` sample columns. Structured declarations are parsed with a chumsky
//! grammar; lines that fail it are skipped and counted, never fatal.

use std::collections::BTreeMap;

use chumsky::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::value::Value;

/// The number of values a field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    /// A fixed number of values (`Number=0` for flags).
    Count(usize),
    /// One value per alternate allele (A).
    PerAltAllele,
    /// One value per possible genotype (G).
    PerGenotype,
    /// One value per allele including reference (R).
    PerAllele,
    /// Variable or unknown number of values (.).
    Variable,
}

impl Cardinality {
    /// Parse the `Number` attribute.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Cardinality::PerAltAllele),
            "G" => Some(Cardinality::PerGenotype),
            "R" => Some(Cardinality::PerAllele),
            "." => Some(Cardinality::Variable),
            _ => s.parse().ok().map(Cardinality::Count),
        }
    }

    /// The fixed count, when the declaration has one.
    pub fn fixed(&self) -> Option<usize> {
        match self {
            Cardinality::Count(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::Count(n) => write!(f, "{}", n),
            Cardinality::PerAltAllele => write!(f, "A"),
            Cardinality::PerGenotype => write!(f, "G"),
            Cardinality::PerAllele => write!(f, "R"),
            Cardinality::Variable => write!(f, "."),
        }
    }
}

/// The data type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

impl FieldType {
    /// Parse the `Type` attribute. Unknown types are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Integer" => Some(FieldType::Integer),
            "Float" => Some(FieldType::Float),
            "Flag" => Some(FieldType::Flag),
            "Character" => Some(FieldType::Character),
            "String" => Some(FieldType::String),
            _ => None,
        }
    }

    /// Returns true for integer and float fields.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Integer => "Integer",
            FieldType::Float => "Float",
            FieldType::Flag => "Flag",
            FieldType::Character => "Character",
            FieldType::String => "String",
        };
        f.write_str(name)
    }
}

/// The declaration family a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Family {
    Standard,
    Info,
    Format,
    Contig,
}

/// Metadata for a single declared field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDeclaration {
    /// The field identifier (e.g., "DP").
    pub id: String,
    /// The description from the header.
    pub description: String,
    /// The data type of the field.
    pub field_type: FieldType,
    /// The number of values this field carries.
    pub cardinality: Cardinality,
    /// Which family declared it.
    pub family: Family,
}

/// A `##FILTER` declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDeclaration {
    pub id: String,
    pub description: String,
}

/// A `##contig` declaration with its attributes coerced to values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contig {
    pub id: String,
    pub attributes: BTreeMap<String, Value>,
}

impl Contig {
    /// The declared `length`, when it is an integer.
    pub fn length(&self) -> Option<i64> {
        match self.attributes.get("length") {
            Some(Value::Integer(n)) => Some(*n),
            _ => None,
        }
    }
}

/// The six fixed VCF columns, with their well-known types.
pub const STANDARD_FIELDS: [(&str, &str, FieldType); 6] = [
    ("CHROM", "Chromosome", FieldType::String),
    ("POS", "Position", FieldType::Integer),
    ("REF", "Reference Allele", FieldType::String),
    ("ALT", "Alternate Allele", FieldType::String),
    ("QUAL", "Variant Quality", FieldType::Float),
    ("FILTER", "Filter", FieldType::String),
];

/// Look up one of the six standard fields by name.
pub fn standard_field(name: &str) -> Option<FieldDeclaration> {
    STANDARD_FIELDS
        .iter()
        .find(|(id, _, _)| *id == name)
        .map(|(id, desc, field_type)| FieldDeclaration {
            id: id.to_string(),
            description: desc.to_string(),
            field_type: *field_type,
            cardinality: Cardinality::Count(1),
            family: Family::Standard,
        })
}

/// Every declaration extracted from one file's header.
///
/// Built once by [`parse_header`] and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldCatalog {
    info: Vec<FieldDeclaration>,
    format: Vec<FieldDeclaration>,
    filters: Vec<FilterDeclaration>,
    contigs: Vec<Contig>,
    metadata: Vec<(String, String)>,
    samples: Vec<String>,
    skipped: usize,
}

impl FieldCatalog {
    /// The six standard fields.
    pub fn standard(&self) -> Vec<FieldDeclaration> {
        STANDARD_FIELDS
            .iter()
            .filter_map(|(id, _, _)| standard_field(id))
            .collect()
    }

    /// INFO declarations in header order.
    pub fn info_fields(&self) -> &[FieldDeclaration] {
        &self.info
    }

    /// FORMAT declarations in header order.
    pub fn format_fields(&self) -> &[FieldDeclaration] {
        &self.format
    }

    pub fn filters(&self) -> &[FilterDeclaration] {
        &self.filters
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    /// Simple `##key=value` lines in header order.
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Sample identifiers from the `#CHROM` line.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Number of malformed declaration lines that were skipped.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn info(&self, id: &str) -> Option<&FieldDeclaration> {
        self.info.iter().find(|f| f.id == id)
    }

    pub fn format(&self, id: &str) -> Option<&FieldDeclaration> {
        self.format.iter().find(|f| f.id == id)
    }

    pub fn contig(&self, id: &str) -> Option<&Contig> {
        self.contigs.iter().find(|c| c.id == id)
    }

    /// Returns true when `id` is declared in both INFO and FORMAT.
    pub fn is_ambiguous(&self, id: &str) -> bool {
        self.info(id).is_some() && self.format(id).is_some()
    }

    /// Returns true when `id` is a standard, INFO or FORMAT field.
    pub fn contains(&self, id: &str) -> bool {
        standard_field(id).is_some() || self.info(id).is_some() || self.format(id).is_some()
    }

    fn upsert(list: &mut Vec<FieldDeclaration>, field: FieldDeclaration) {
        if let Some(existing) = list.iter_mut().find(|f| f.id == field.id) {
            debug!(id = %field.id, family = ?field.family, "duplicate declaration replaces earlier one");
            *existing = field;
        } else {
            list.push(field);
        }
    }
}

/// A structured header line: `##KEY=<k=v,...>`.
#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    key: String,
    attrs: Vec<(String, String)>,
}

impl Declaration {
    fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn attr_key() -> impl Parser<char, String, Error = Simple<char>> {
    filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .repeated()
        .at_least(1)
        .collect::<String>()
}

/// Grammar for a structured declaration line.
fn declaration() -> impl Parser<char, Declaration, Error = Simple<char>> {
    // Quoted values may contain commas, '>' and backslash escapes.
    let escaped = just('\\').ignore_then(any());
    let quoted = just('"')
        .ignore_then(escaped.or(none_of("\\\"")).repeated())
        .then_ignore(just('"'))
        .collect::<String>();

    let bare = none_of(",>\"").repeated().collect::<String>();

    let attr = attr_key().then_ignore(just('=')).then(quoted.or(bare));

    just("##")
        .ignore_then(attr_key())
        .then_ignore(just("=<"))
        .then(attr.separated_by(just(',')).at_least(1))
        .then_ignore(just('>'))
        .then_ignore(end())
        .map(|(key, attrs)| Declaration { key, attrs })
}

const FAMILY_PREFIXES: [&str; 4] = ["##INFO=", "##FORMAT=", "##FILTER=", "##contig="];

/// Parse a full VCF header into a [`FieldCatalog`].
///
/// Never fails: malformed INFO/FORMAT/FILTER/contig lines are counted in
/// [`FieldCatalog::skipped`] and every other line is ignored.
pub fn parse_header(header: &str) -> FieldCatalog {
    let mut catalog = FieldCatalog::default();
    let parser = declaration();

    for line in header.lines() {
        let line = line.trim_end();

        if let Some(columns) = line.strip_prefix("#CHROM") {
            // Samples follow the eight fixed columns and FORMAT.
            catalog.samples = columns
                .split('\t')
                .skip(9)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            continue;
        }

        if !line.starts_with("##") {
            continue;
        }

        let is_family = FAMILY_PREFIXES.iter().any(|p| line.starts_with(p));
        if !line.contains("=<") {
            if is_family {
                catalog.skipped += 1;
                debug!(line, "skipping declaration without attribute list");
            } else if let Some((key, value)) = line[2..].split_once('=') {
                catalog.metadata.push((key.to_string(), value.to_string()));
            }
            continue;
        }
        if !is_family {
            continue;
        }

        let accepted = match parser.parse(line) {
            Ok(decl) => add_declaration(&mut catalog, &decl),
            Err(errs) => {
                debug!(line, errors = errs.len(), "declaration does not match grammar");
                false
            }
        };
        if !accepted {
            catalog.skipped += 1;
            debug!(line, "skipping malformed declaration");
        }
    }

    catalog
}

/// Add a parsed declaration to its family. Returns false when a mandatory
/// attribute is missing or invalid.
fn add_declaration(catalog: &mut FieldCatalog, decl: &Declaration) -> bool {
    let Some(id) = decl.get("ID").filter(|id| !id.is_empty()) else {
        return false;
    };

    match decl.key.as_str() {
        "INFO" | "FORMAT" => {
            let family = if decl.key == "INFO" {
                Family::Info
            } else {
                Family::Format
            };
            let Some(cardinality) = decl.get("Number").and_then(Cardinality::parse) else {
                return false;
            };
            let Some(field_type) = decl.get("Type").and_then(FieldType::parse) else {
                return false;
            };
            let field = FieldDeclaration {
                id: id.to_string(),
                description: decl.get("Description").unwrap_or_default().to_string(),
                field_type,
                cardinality,
                family,
            };
            match family {
                Family::Info => FieldCatalog::upsert(&mut catalog.info, field),
                _ => FieldCatalog::upsert(&mut catalog.format, field),
            }
        }
        "FILTER" => {
            let filter = FilterDeclaration {
                id: id.to_string(),
                description: decl.get("Description").unwrap_or_default().to_string(),
            };
            match catalog.filters.iter_mut().find(|f| f.id == filter.id) {
                Some(existing) => *existing = filter,
                None => catalog.filters.push(filter),
            }
        }
        "contig" => {
            let attributes = decl
                .attrs
                .iter()
                .filter(|(k, _)| k != "ID")
                .map(|(k, v)| (k.clone(), Value::coerce(v)))
                .collect();
            let contig = Contig {
                id: id.to_string(),
                attributes,
            };
            match catalog.contigs.iter_mut().find(|c| c.id == contig.id) {
                Some(existing) => *existing = contig,
                None => catalog.contigs.push(contig),
            }
        }
        _ => return false,
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = r#"##fileformat=VCFv4.2
##FILTER=<ID=PASS,Description="All filters passed">
##FILTER=<ID=q10,Description="Quality below 10">
##contig=<ID=chr1,length=248956422,assembly=GRCh38>
##contig=<ID=chrM,length=16569,md5=c68f52674c9fb33aef52dcf399755519>
##INFO=<ID=DP,Number=1,Type=Integer,Description="Total depth">
##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency, one per ALT">
##INFO=<ID=CIPOS,Number=2,Type=Integer,Description="Confidence interval around POS">
##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">
##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Read depth">
##FORMAT=<ID=AD,Number=R,Type=Integer,Description="Allelic depths">
##ALT=<ID=DEL,Description="Deletion">
##bcftools_viewCommand=view -h in.vcf.gz
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO	FORMAT	NA12878	NA12891"#;

    #[test]
    fn test_parse_info_and_format() {
        let catalog = parse_header(HEADER);

        assert_eq!(catalog.info_fields().len(), 3);
        assert_eq!(catalog.format_fields().len(), 3);

        let dp = catalog.info("DP").unwrap();
        assert_eq!(dp.cardinality, Cardinality::Count(1));
        assert_eq!(dp.field_type, FieldType::Integer);
        assert_eq!(dp.family, Family::Info);
        assert_eq!(dp.description, "Total depth");

        let af = catalog.info("AF").unwrap();
        assert_eq!(af.cardinality, Cardinality::PerAltAllele);
        assert_eq!(af.description, "Allele frequency, one per ALT");

        assert_eq!(catalog.info("CIPOS").unwrap().cardinality, Cardinality::Count(2));
        assert_eq!(catalog.format("AD").unwrap().cardinality, Cardinality::PerAllele);
        assert_eq!(catalog.skipped(), 0);
    }

    #[test]
    fn test_ambiguous_lookup() {
        let catalog = parse_header(HEADER);
        assert!(catalog.is_ambiguous("DP"));
        assert!(!catalog.is_ambiguous("GT"));
        assert!(!catalog.is_ambiguous("AF"));
        assert!(catalog.contains("POS"));
        assert!(catalog.contains("GT"));
        assert!(!catalog.contains("MQ"));
    }

    #[test]
    fn test_filters_without_type_or_number() {
        let catalog = parse_header(HEADER);
        let ids: Vec<&str> = catalog.filters().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["PASS", "q10"]);
        assert_eq!(catalog.filters()[1].description, "Quality below 10");
    }

    #[test]
    fn test_contig_attributes_are_coerced() {
        let catalog = parse_header(HEADER);
        let chr1 = catalog.contig("chr1").unwrap();
        assert_eq!(chr1.length(), Some(248956422));
        assert_eq!(
            chr1.attributes.get("assembly"),
            Some(&Value::String("GRCh38".to_string()))
        );
        assert_eq!(catalog.contig("chrM").unwrap().length(), Some(16569));
    }

    #[test]
    fn test_metadata_and_samples() {
        let catalog = parse_header(HEADER);
        assert_eq!(
            catalog.metadata()[0],
            ("fileformat".to_string(), "VCFv4.2".to_string())
        );
        assert_eq!(catalog.metadata().len(), 2);
        assert_eq!(catalog.samples(), ["NA12878", "NA12891"]);
    }

    #[test]
    fn test_description_is_optional() {
        let catalog = parse_header("##INFO=<ID=SOMATIC,Number=0,Type=Flag>");
        let field = catalog.info("SOMATIC").unwrap();
        assert_eq!(field.cardinality, Cardinality::Count(0));
        assert_eq!(field.field_type, FieldType::Flag);
        assert_eq!(field.description, "");
    }

    #[test]
    fn test_quoted_description_with_escapes_and_brackets() {
        let line = r#"##INFO=<ID=CSQ,Number=.,Type=String,Description="Consequence <VEP> \"annotations\", pipe separated",Source="vep",Version="110">"#;
        let catalog = parse_header(line);
        let field = catalog.info("CSQ").unwrap();
        assert_eq!(
            field.description,
            r#"Consequence <VEP> "annotations", pipe separated"#
        );
        assert_eq!(field.cardinality, Cardinality::Variable);
    }

    #[test]
    fn test_malformed_declarations_are_counted() {
        let header = r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="Total depth">
##INFO=<ID=BAD,Number=1,Description="No type">
##INFO=<ID=WEIRD,Number=X,Type=Integer,Description="Bad number">
##FORMAT=<ID=GQ,Number=1,Type=Integer,Description="unterminated
##FORMAT=ID=GQ
##contig=<length=100>
##SAMPLE=<ID=S1,Description="ignored family">
not a header line"#;
        let catalog = parse_header(header);
        assert_eq!(catalog.info_fields().len(), 1);
        assert!(catalog.format_fields().is_empty());
        assert!(catalog.contigs().is_empty());
        assert_eq!(catalog.skipped(), 5);
    }

    #[test]
    fn test_duplicate_id_replaces_earlier() {
        let header = r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="first">
##INFO=<ID=DP,Number=1,Type=Float,Description="second">"#;
        let catalog = parse_header(header);
        assert_eq!(catalog.info_fields().len(), 1);
        assert_eq!(catalog.info("DP").unwrap().description, "second");
    }

    #[test]
    fn test_standard_fields() {
        let catalog = parse_header("");
        let standard = catalog.standard();
        assert_eq!(standard.len(), 6);
        assert_eq!(standard[1].id, "POS");
        assert_eq!(standard[1].field_type, FieldType::Integer);
        assert_eq!(standard[4].field_type, FieldType::Float);
        assert!(standard.iter().all(|f| f.family == Family::Standard));
    }
}
