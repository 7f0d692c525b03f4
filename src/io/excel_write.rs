use std::path::Path;

use rust_xlsxwriter::{Table, Workbook, Worksheet};
use tracing::debug;

use crate::error::Result;
use crate::tabulate::{OutputTable, OutputWorkbook};

/// Writes the assembled output tables to an .xlsx file, one sheet per table
/// with an autofilter header row.
pub fn write_workbook(path: &Path, workbook: &OutputWorkbook) -> Result<()> {
    let mut workbook_writer = Workbook::new();

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        write_table(worksheet, table)?;
        debug!(sheet = %table.sheet_name, rows = table.rows.len(), "sheet written");
    }

    workbook_writer.save(path)?;
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &OutputTable) -> Result<()> {
    worksheet.set_name(&table.sheet_name)?;

    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    let mut excel_table = Table::new();
    excel_table.set_autofilter(true);

    let col_end = (table.columns.len() as u16).saturating_sub(1);
    let row_end = if table.rows.is_empty() {
        0
    } else {
        table.rows.len() as u32
    };
    worksheet.add_table(0, 0, row_end, col_end, &excel_table)?;
    worksheet.autofit();
    Ok(())
}
