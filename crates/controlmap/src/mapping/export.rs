use crate::error::StorageError;
use crate::mapping::xlsx::{write_workbook, Cell, Worksheet};
use crate::mapping::MappingOutput;

/// Renders a mapping into downloadable artifacts.
pub trait Exporter: Send + Sync {
    fn to_json(&self, mapping: &MappingOutput) -> Result<Vec<u8>, StorageError>;
    fn to_xlsx(&self, mapping: &MappingOutput) -> Result<Vec<u8>, StorageError>;
}

/// Pretty JSON plus a three sheet workbook: Summary, Requirements and
/// Check Mappings.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkbookExporter;

impl WorkbookExporter {
    pub fn new() -> Self {
        Self
    }
}

fn summary_sheet(mapping: &MappingOutput) -> Worksheet {
    let mut sheet = Worksheet::new("Summary").with_column_widths(&[20.0, 60.0]);
    let rows = [
        ("Framework", mapping.framework.clone()),
        ("Name", mapping.name.clone()),
        ("Version", mapping.version.clone().unwrap_or_default()),
        ("Provider", mapping.provider.clone()),
        ("Description", mapping.description.clone().unwrap_or_default()),
        ("Total Requirements", mapping.requirements.len().to_string()),
    ];
    for (label, value) in rows {
        sheet.push_row(vec![Cell::header(label), Cell::body(value)]);
    }
    sheet
}

fn requirements_sheet(mapping: &MappingOutput) -> Worksheet {
    let mut sheet = Worksheet::new("Requirements")
        .with_column_widths(&[15.0, 40.0, 50.0, 25.0, 25.0, 15.0, 50.0]);
    sheet.push_row(
        [
            "Control ID",
            "Name",
            "Description",
            "Section",
            "SubSection",
            "Service",
            "Checks",
        ]
        .into_iter()
        .map(Cell::header)
        .collect(),
    );

    for requirement in &mapping.requirements {
        // Only the first attribute block is shown.
        let attribute = requirement.attributes.first();
        sheet.push_row(vec![
            Cell::body(requirement.id.as_str()),
            Cell::body(requirement.name.as_str()),
            Cell::body(requirement.description.clone().unwrap_or_default()),
            Cell::body(attribute.map(|a| a.section.clone()).unwrap_or_default()),
            Cell::body(attribute.and_then(|a| a.sub_section.clone()).unwrap_or_default()),
            Cell::body(attribute.and_then(|a| a.service.clone()).unwrap_or_default()),
            Cell::body(requirement.checks.join(", ")),
        ]);
    }
    sheet
}

fn check_mappings_sheet(mapping: &MappingOutput) -> Worksheet {
    let mut sheet = Worksheet::new("Check Mappings").with_column_widths(&[15.0, 50.0, 40.0]);
    sheet.push_row(
        ["Control ID", "Control Name", "Check ID"]
            .into_iter()
            .map(Cell::header)
            .collect(),
    );

    for requirement in &mapping.requirements {
        for check in &requirement.checks {
            sheet.push_row(vec![
                Cell::body(requirement.id.as_str()),
                Cell::body(requirement.name.as_str()),
                Cell::body(check.as_str()),
            ]);
        }
    }
    sheet
}

impl Exporter for WorkbookExporter {
    fn to_json(&self, mapping: &MappingOutput) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec_pretty(mapping)
            .map_err(|e| StorageError::Encode(format!("failed to serialize mapping: {}", e)))
    }

    fn to_xlsx(&self, mapping: &MappingOutput) -> Result<Vec<u8>, StorageError> {
        write_workbook(&[
            summary_sheet(mapping),
            requirements_sheet(mapping),
            check_mappings_sheet(mapping),
        ])
    }
}
