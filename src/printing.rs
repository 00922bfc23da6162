//! reStructuredText documentation rendering.
//!
//! Renders a module's metadata, input table, and result table as
//! reStructuredText. The section printer tracks nesting depth and picks the
//! matching underline character; paragraph text is wrapped at 80 columns.

use std::fmt::Write as _;

use crate::errors::{EngineError, EngineResult};
use crate::fields::{InputMap, ResultMap};
use crate::module::Module;

const WRAP_COLUMN: usize = 80;

/// Section-aware reStructuredText writer.
pub struct RestPrinter {
    out: String,
    underline_chars: Vec<char>,
    section: usize,
}

impl RestPrinter {
    pub fn new() -> Self {
        RestPrinter {
            out: String::new(),
            underline_chars: vec!['=', '-', '~', '^'],
            section: 0,
        }
    }

    /// Open a section: the header followed by the underline for the current
    /// nesting depth.
    ///
    /// # Errors
    ///
    /// *not-found* when sections nest deeper than the configured underline
    /// characters.
    pub fn start_section(&mut self, header: &str) -> EngineResult<()> {
        let underline = *self.underline_chars.get(self.section).ok_or_else(|| {
            EngineError::NotFound("no underline character for this section depth".to_string())
        })?;
        let _ = writeln!(self.out, "{header}");
        let _ = writeln!(self.out, "{}", underline.to_string().repeat(header.len()));
        let _ = writeln!(self.out);
        self.section += 1;
        Ok(())
    }

    pub fn finish_section(&mut self) -> EngineResult<()> {
        if self.section == 0 {
            return Err(EngineError::NotFound("not in a section".to_string()));
        }
        self.section -= 1;
        Ok(())
    }

    /// Write a paragraph, wrapping words at 80 columns.
    pub fn paragraph(&mut self, text: &str) {
        let mut column = 0usize;
        for word in text.split_whitespace() {
            let width = word.chars().count();
            if column > 0 && column + 1 + width <= WRAP_COLUMN {
                self.out.push(' ');
                column += 1;
            } else if column > 0 {
                self.out.push('\n');
                column = 0;
            }
            self.out.push_str(word);
            column += width;
        }
        self.out.push('\n');
        self.out.push('\n');
    }

    pub fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Default for RestPrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn list_table(title: &str, header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, ".. list-table:: {title}");
    let _ = writeln!(out, "   :header-rows: 1");
    let _ = writeln!(out);
    for (idx, cell) in header.iter().enumerate() {
        let bullet = if idx == 0 { "   * -" } else { "     -" };
        let _ = writeln!(out, "{bullet} {cell}");
    }
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let bullet = if idx == 0 { "   * -" } else { "     -" };
            let _ = writeln!(out, "{bullet} {cell}");
        }
    }
    out.push('\n');
    out
}

/// Render an input map as an rST list table: key, type, default,
/// optional/transparent flags, check labels, description.
pub fn input_table(inputs: &InputMap) -> String {
    let rows: Vec<Vec<String>> = inputs
        .iter()
        .map(|(key, input)| {
            vec![
                key.to_string(),
                input
                    .declared_type_name()
                    .unwrap_or_else(|| "(undeclared)".to_string()),
                input
                    .any_field()
                    .map(|field| field.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                if input.is_optional() { "Yes" } else { "No" }.to_string(),
                if input.is_transparent() { "Yes" } else { "No" }.to_string(),
                input.check_labels().join(", "),
                input.description().unwrap_or("N/A").to_string(),
            ]
        })
        .collect();
    list_table(
        "Inputs",
        &[
            "Key",
            "Type",
            "Default",
            "Optional?",
            "Transparent?",
            "Domain Checks",
            "Description",
        ],
        &rows,
    )
}

/// Render a result map as an rST list table: key, type, description.
pub fn result_table(results: &ResultMap) -> String {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|(key, result)| {
            vec![
                key.to_string(),
                result
                    .declared_type_name()
                    .unwrap_or_else(|| "(undeclared)".to_string()),
                result.description().unwrap_or("N/A").to_string(),
            ]
        })
        .collect();
    list_table("Results", &["Key", "Type", "Description"], &rows)
}

/// Full module documentation: description, citations, inputs, results.
pub fn document_module(name: &str, module: &Module) -> EngineResult<String> {
    let mut printer = RestPrinter::new();
    printer.start_section(name)?;
    printer.paragraph(
        module
            .description()
            .unwrap_or("No description provided."),
    );

    if !module.citations().is_empty() {
        printer.start_section("Citations")?;
        for citation in module.citations() {
            printer.paragraph(citation);
        }
        printer.finish_section()?;
    }

    printer.start_section("Module API")?;
    printer.raw(&input_table(module.inputs()));
    printer.raw(&result_table(module.results()));
    printer.finish_section()?;

    printer.finish_section()?;
    Ok(printer.finish())
}
