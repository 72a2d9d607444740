//! Rendering of the variable catalog for `listvars`.

use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::header::{FieldCatalog, FieldDeclaration};

/// One listed variable, named the way it can be referenced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableEntry {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub number: String,
}

impl VariableEntry {
    fn new(prefix: &str, field: &FieldDeclaration) -> Self {
        Self {
            id: format!("{}{}", prefix, field.id),
            description: field.description.clone(),
            field_type: field.field_type.to_string(),
            number: field.cardinality.to_string(),
        }
    }

    fn cells(&self) -> [&str; 4] {
        [
            self.id.as_str(),
            self.description.as_str(),
            self.field_type.as_str(),
            self.number.as_str(),
        ]
    }
}

/// The catalog grouped into the three referenceable families.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableListing {
    pub standard: Vec<VariableEntry>,
    pub info: Vec<VariableEntry>,
    pub format: Vec<VariableEntry>,
    pub samples: Vec<String>,
    pub skipped_declarations: usize,
}

const COLUMNS: [&str; 4] = ["id", "desc", "type", "number"];

impl VariableListing {
    /// List a catalog; `samples` comes from the tool, not the header.
    pub fn new(catalog: &FieldCatalog, samples: &[String]) -> Self {
        Self {
            standard: catalog
                .standard()
                .iter()
                .map(|f| VariableEntry::new("", f))
                .collect(),
            info: catalog
                .info_fields()
                .iter()
                .map(|f| VariableEntry::new("INFO/", f))
                .collect(),
            format: catalog
                .format_fields()
                .iter()
                .map(|f| VariableEntry::new("FORMAT/", f))
                .collect(),
            samples: samples.to_vec(),
            skipped_declarations: catalog.skipped(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Grid tables for each family followed by a usage note.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for (title, entries) in [
            ("STANDARD", &self.standard),
            ("INFO FIELDS", &self.info),
            ("FORMAT FIELDS", &self.format),
        ] {
            text.push('\n');
            text.push_str(&title.bold().to_string());
            text.push('\n');
            text.push_str(&grid(entries));
        }
        text.push('\n');
        text.push_str(&format!("Samples: {}\n", self.samples.len()));
        if self.skipped_declarations > 0 {
            text.push_str(&format!(
                "Skipped {} malformed header declaration(s)\n",
                self.skipped_declarations
            ));
        }
        text.push_str(
            "\nVariables have been prefixed with \"INFO/\" or \"FORMAT/\",\n\
             however these prefixes are not necessary if the variable\n\
             is unique within both groups.\n",
        );
        text
    }
}

fn grid(entries: &[VariableEntry]) -> String {
    let mut widths = COLUMNS.map(str::len);
    for entry in entries {
        for (width, cell) in widths.iter_mut().zip(entry.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = |fill: char| {
        let mut line = String::from("+");
        for width in widths {
            line.push_str(&fill.to_string().repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };
    let row = |cells: [&str; 4]| {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(widths) {
            line.push_str(&format!(" {:<width$} |", cell, width = width));
        }
        line.push('\n');
        line
    };

    let mut out = rule('-');
    out.push_str(&row(COLUMNS));
    out.push_str(&rule('='));
    for entry in entries {
        out.push_str(&row(entry.cells()));
        out.push_str(&rule('-'));
    }
    out
}
