//! Variable resolution.
//!
//! Turns a user-facing field reference such as `DP`, `INFO/DP`, `%QUAL` or
//! `FORMAT/AD` into the expressions the query tool needs: a `-f` extraction
//! expression, an `--include` filter operand and the output column names.

use crate::error::{Result, VcfQueryError};
use crate::header::{FieldCatalog, FieldDeclaration, FieldType, standard_field};

/// The sigil the query tool uses to mark a field in a format string.
pub const SIGIL: char = '%';

/// An explicit namespace prefix on a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Info,
    Format,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Info => "INFO/",
            Namespace::Format => "FORMAT/",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Namespace::Info => "INFO",
            Namespace::Format => "FORMAT",
        }
    }
}

/// A parsed field reference: optional namespace plus bare name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The reference with sigils removed, namespace kept.
    pub text: String,
    pub namespace: Option<Namespace>,
    pub name: String,
}

impl Reference {
    /// Strip sigils, then split off an `INFO/` or `FORMAT/` prefix.
    pub fn parse(raw: &str) -> Self {
        let text: String = raw.trim().chars().filter(|c| *c != SIGIL).collect();
        let (namespace, name) = if let Some(name) = text.strip_prefix(Namespace::Info.prefix()) {
            (Some(Namespace::Info), name)
        } else if let Some(name) = text.strip_prefix(Namespace::Format.prefix()) {
            (Some(Namespace::Format), name)
        } else {
            (None, text.as_str())
        };
        let name = name.to_string();
        Self {
            text,
            namespace,
            name,
        }
    }
}

/// Which family a resolved variable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Standard,
    Info,
    Format,
}

/// The resolution of one field reference.
///
/// The "no variable" sentinel ([`ResolvedVariable::absent`]) has no query
/// expression, empty include and column strings, and zero cardinality.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariable {
    /// Expression for the tool's `-f` format string.
    pub query_expr: Option<String>,
    /// Operand for `--include` predicates; namespace kept, sigils stripped.
    pub include_expr: String,
    /// Comma-joined output column name(s).
    pub column_name: String,
    pub field_type: Option<FieldType>,
    /// Number of output columns the field expands to.
    pub cardinality: usize,
    pub origin: Option<Origin>,
}

impl ResolvedVariable {
    /// The "no second variable" sentinel.
    pub fn absent() -> Self {
        Self {
            query_expr: None,
            include_expr: String::new(),
            column_name: String::new(),
            field_type: None,
            cardinality: 0,
            origin: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.query_expr.is_none()
    }

    /// Returns true for the chromosome column.
    pub fn is_chromosome(&self) -> bool {
        self.origin == Some(Origin::Standard) && self.include_expr == "CHROM"
    }
}

/// Resolves references against one file's [`FieldCatalog`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a FieldCatalog,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a FieldCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve an optional reference. `None` yields the absent sentinel.
    ///
    /// # Errors
    ///
    /// - [`VcfQueryError::UnknownField`] when the bare name is not declared.
    /// - [`VcfQueryError::AmbiguousField`] when an unprefixed name is in both
    ///   INFO and FORMAT.
    /// - [`VcfQueryError::NamespaceMismatch`] when the prefix names a family
    ///   that does not declare the field.
    pub fn resolve(&self, reference: Option<&str>) -> Result<ResolvedVariable> {
        let Some(raw) = reference else {
            return Ok(ResolvedVariable::absent());
        };
        let reference = Reference::parse(raw);
        let name = reference.name.as_str();

        if !self.catalog.contains(name) {
            return Err(VcfQueryError::UnknownField(reference.text));
        }

        match reference.namespace {
            None => {
                if self.catalog.is_ambiguous(name) {
                    return Err(VcfQueryError::AmbiguousField(reference.text));
                }
                if let Some(field) = standard_field(name) {
                    return Ok(resolve_standard(&field));
                }
                if let Some(field) = self.catalog.info(name) {
                    return Ok(resolve_declared(&reference, field, Origin::Info));
                }
                match self.catalog.format(name) {
                    Some(field) => Ok(resolve_declared(&reference, field, Origin::Format)),
                    None => Err(VcfQueryError::UnknownField(reference.text)),
                }
            }
            Some(namespace) => {
                let (field, origin) = match namespace {
                    Namespace::Info => (self.catalog.info(name), Origin::Info),
                    Namespace::Format => (self.catalog.format(name), Origin::Format),
                };
                match field {
                    Some(field) => Ok(resolve_declared(&reference, field, origin)),
                    None => Err(VcfQueryError::NamespaceMismatch {
                        reference: reference.text,
                        namespace: namespace.label(),
                    }),
                }
            }
        }
    }

    /// Resolve a reference that must be present.
    pub fn resolve_required(&self, reference: &str) -> Result<ResolvedVariable> {
        self.resolve(Some(reference))
    }
}

fn resolve_standard(field: &FieldDeclaration) -> ResolvedVariable {
    ResolvedVariable {
        query_expr: Some(format!("{}{}", SIGIL, field.id)),
        include_expr: field.id.clone(),
        column_name: field.id.clone(),
        field_type: Some(field.field_type),
        cardinality: 1,
        origin: Some(Origin::Standard),
    }
}

fn resolve_declared(
    reference: &Reference,
    field: &FieldDeclaration,
    origin: Origin,
) -> ResolvedVariable {
    // A/G/R/. have no fixed width and stay a single column.
    let width = match field.cardinality.fixed() {
        Some(n) if n > 1 => n,
        _ => 1,
    };

    let base = field.id.replace('/', ".");
    let column_name = if width > 1 {
        (0..width)
            .map(|i| format!("{}.{}", base, i))
            .collect::<Vec<_>>()
            .join(",")
    } else {
        base
    };

    let query_expr = match origin {
        Origin::Format => format!("[{}{}\\n]", SIGIL, field.id),
        _ => format!("{}{}{}", SIGIL, Namespace::Info.prefix(), field.id),
    };

    ResolvedVariable {
        query_expr: Some(query_expr),
        include_expr: reference.text.clone(),
        column_name,
        field_type: Some(field.field_type),
        cardinality: width,
        origin: Some(origin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::parse_header;
    use pretty_assertions::assert_eq;

    const HEADER: &str = r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="Total depth">
##INFO=<ID=CIPOS,Number=2,Type=Integer,Description="Confidence interval around POS">
##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency">
##INFO=<ID=MQ,Number=1,Type=Float,Description="Mapping quality">
##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Read depth">
##FORMAT=<ID=GQ,Number=1,Type=Integer,Description="Genotype quality">
##FORMAT=<ID=PL,Number=3,Type=Integer,Description="Phred likelihoods">
##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#;

    fn resolve(reference: Option<&str>) -> Result<ResolvedVariable> {
        let catalog = parse_header(HEADER);
        Resolver::new(&catalog).resolve(reference)
    }

    #[test]
    fn test_reference_parse() {
        let r = Reference::parse("%INFO/DP");
        assert_eq!(r.text, "INFO/DP");
        assert_eq!(r.namespace, Some(Namespace::Info));
        assert_eq!(r.name, "DP");

        let r = Reference::parse("FORMAT/GQ");
        assert_eq!(r.namespace, Some(Namespace::Format));
        assert_eq!(r.name, "GQ");

        let r = Reference::parse("QUAL");
        assert_eq!(r.namespace, None);
        assert_eq!(r.name, "QUAL");
    }

    #[test]
    fn test_none_is_absent_sentinel() {
        let first = resolve(None).unwrap();
        let second = resolve(None).unwrap();
        assert!(first.is_absent());
        assert_eq!(first, second);
        assert_eq!(first.cardinality, 0);
        assert_eq!(first.column_name, "");
    }

    #[test]
    fn test_standard_field() {
        let pos = resolve(Some("POS")).unwrap();
        assert_eq!(pos.query_expr.as_deref(), Some("%POS"));
        assert_eq!(pos.include_expr, "POS");
        assert_eq!(pos.column_name, "POS");
        assert_eq!(pos.field_type, Some(FieldType::Integer));
        assert_eq!(pos.cardinality, 1);
        assert_eq!(pos.origin, Some(Origin::Standard));

        let qual = resolve(Some("%QUAL")).unwrap();
        assert_eq!(qual.query_expr.as_deref(), Some("%QUAL"));
        assert_eq!(qual.field_type, Some(FieldType::Float));
    }

    #[test]
    fn test_info_field_with_and_without_prefix() {
        let bare = resolve(Some("MQ")).unwrap();
        assert_eq!(bare.query_expr.as_deref(), Some("%INFO/MQ"));
        assert_eq!(bare.include_expr, "MQ");
        assert_eq!(bare.column_name, "MQ");
        assert_eq!(bare.origin, Some(Origin::Info));

        let prefixed = resolve(Some("INFO/MQ")).unwrap();
        assert_eq!(prefixed.query_expr.as_deref(), Some("%INFO/MQ"));
        assert_eq!(prefixed.include_expr, "INFO/MQ");
        assert_eq!(prefixed.column_name, "MQ");
    }

    #[test]
    fn test_fixed_cardinality_expands_columns() {
        let cipos = resolve(Some("INFO/CIPOS")).unwrap();
        assert_eq!(cipos.cardinality, 2);
        assert_eq!(cipos.column_name, "CIPOS.0,CIPOS.1");

        let pl = resolve(Some("PL")).unwrap();
        assert_eq!(pl.cardinality, 3);
        assert_eq!(pl.column_name, "PL.0,PL.1,PL.2");
        assert_eq!(pl.column_name.split(',').count(), 3);
    }

    #[test]
    fn test_per_allele_cardinality_stays_single_column() {
        let af = resolve(Some("AF")).unwrap();
        assert_eq!(af.cardinality, 1);
        assert_eq!(af.column_name, "AF");
    }

    #[test]
    fn test_format_field_uses_repeat_block() {
        let gq = resolve(Some("GQ")).unwrap();
        assert_eq!(gq.query_expr.as_deref(), Some(r"[%GQ\n]"));
        assert_eq!(gq.include_expr, "GQ");
        assert_eq!(gq.column_name, "GQ");
        assert_eq!(gq.origin, Some(Origin::Format));

        let prefixed = resolve(Some("FORMAT/GQ")).unwrap();
        assert_eq!(prefixed.query_expr.as_deref(), Some(r"[%GQ\n]"));
        assert_eq!(prefixed.include_expr, "FORMAT/GQ");
        assert_eq!(prefixed.column_name, "GQ");
    }

    #[test]
    fn test_ambiguous_requires_prefix() {
        let err = resolve(Some("DP")).unwrap_err();
        assert!(matches!(err, VcfQueryError::AmbiguousField(ref name) if name == "DP"));

        let info = resolve(Some("INFO/DP")).unwrap();
        let format = resolve(Some("FORMAT/DP")).unwrap();
        assert_eq!(info.query_expr.as_deref(), Some("%INFO/DP"));
        assert_eq!(format.query_expr.as_deref(), Some(r"[%DP\n]"));
        assert_ne!(info.query_expr, format.query_expr);
    }

    #[test]
    fn test_unknown_field() {
        let err = resolve(Some("AC")).unwrap_err();
        assert!(matches!(err, VcfQueryError::UnknownField(ref name) if name == "AC"));
        assert!(err.to_string().contains("listvars"));
    }

    #[test]
    fn test_namespace_mismatch() {
        let err = resolve(Some("INFO/GQ")).unwrap_err();
        assert!(matches!(
            err,
            VcfQueryError::NamespaceMismatch { namespace: "INFO", .. }
        ));

        let err = resolve(Some("FORMAT/MQ")).unwrap_err();
        assert!(matches!(
            err,
            VcfQueryError::NamespaceMismatch { namespace: "FORMAT", .. }
        ));

        let err = resolve(Some("INFO/POS")).unwrap_err();
        assert!(err.is_reference_error());
    }

    #[test]
    fn test_column_name_has_no_prefix_or_sigil() {
        for reference in ["%INFO/MQ", "FORMAT/GQ", "%POS", "INFO/CIPOS", "PL"] {
            let resolved = resolve(Some(reference)).unwrap();
            assert!(!resolved.column_name.contains('%'));
            assert!(!resolved.column_name.contains("INFO"));
            assert!(!resolved.column_name.contains("FORMAT"));
            assert!(!resolved.include_expr.contains('%'));
        }
    }

    #[test]
    fn test_is_chromosome() {
        assert!(resolve(Some("CHROM")).unwrap().is_chromosome());
        assert!(!resolve(Some("POS")).unwrap().is_chromosome());
    }
}
