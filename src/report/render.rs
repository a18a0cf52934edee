//! Spreadsheet rendering.
//!
//! Sheets are first laid out into a plain cell model, then written with
//! `rust_xlsxwriter`. Tests inspect the layout directly.

use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};
use std::path::{Path, PathBuf};

use super::aggregate::Aggregation;
use crate::error::Result;
use crate::models::ReportPeriod;

pub const TOTALS_SHEET: &str = "totales";
pub const DETAIL_SHEET: &str = "detalle";
pub const TOTALS_HEADERS: [&str; 3] = ["calendario", "nombre", "total"];

/// Day/month/year, independent of locale
pub const DATE_FORMAT: &str = "%d/%m/%Y";

const TOTALS_HEADER_FILL: u32 = 0xE6E6FA;
const COLUMN_HEADER_FILL: u32 = 0xFFE4B5;
const CALENDAR_HEADER_FILL: u32 = 0xD3D3D3;

/// First detail row holding dates (0-based; rows 0 and 1 are headers)
const DETAIL_FIRST_DATE_ROW: u32 = 2;

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain,
    TotalsHeader,
    ColumnHeader,
    CalendarHeader,
}

impl CellStyle {
    fn format(&self) -> Option<Format> {
        let fill = match self {
            CellStyle::Plain => return None,
            CellStyle::TotalsHeader => TOTALS_HEADER_FILL,
            CellStyle::ColumnHeader => COLUMN_HEADER_FILL,
            CellStyle::CalendarHeader => CALENDAR_HEADER_FILL,
        };
        Some(
            Format::new()
                .set_bold()
                .set_background_color(Color::RGB(fill))
                .set_align(FormatAlign::Center),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    fn display_len(&self) -> usize {
        match self {
            CellValue::Text(s) => s.chars().count(),
            CellValue::Number(n) => n.to_string().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
    pub style: CellStyle,
}

/// A horizontally merged header cell
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCell {
    pub row: u32,
    pub first_col: u16,
    pub last_col: u16,
    pub text: String,
    pub style: CellStyle,
}

/// In-memory layout of one worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub name: String,
    pub cells: Vec<Cell>,
    pub merges: Vec<MergedCell>,
    pub column_widths: Vec<f64>,
}

impl SheetLayout {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: Vec::new(),
            merges: Vec::new(),
            column_widths: Vec::new(),
        }
    }

    fn put(&mut self, row: u32, col: u16, value: CellValue, style: CellStyle) {
        self.cells.push(Cell {
            row,
            col,
            value,
            style,
        });
    }

    fn put_text(&mut self, row: u32, col: u16, text: impl Into<String>, style: CellStyle) {
        self.put(row, col, CellValue::Text(text.into()), style);
    }

    /// Value at a position, including the top-left of merged ranges
    pub fn value_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|c| c.row == row && c.col == col)
            .map(|c| &c.value)
    }

    pub fn text_at(&self, row: u32, col: u16) -> Option<&str> {
        match self.value_at(row, col) {
            Some(CellValue::Text(s)) => Some(s),
            _ => self
                .merges
                .iter()
                .find(|m| m.row == row && m.first_col == col)
                .map(|m| m.text.as_str()),
        }
    }

    #[cfg(test)]
    fn row_count(&self) -> u32 {
        self.cells.iter().map(|c| c.row + 1).max().unwrap_or(0)
    }

    /// Longest cell per column, clamped to `[min, max]` after padding by 2
    fn fit_columns(&mut self, min: f64, max: f64) {
        let columns = self
            .cells
            .iter()
            .map(|c| c.col + 1)
            .chain(self.merges.iter().map(|m| m.last_col + 1))
            .max()
            .unwrap_or(0);

        let mut longest = vec![0usize; columns as usize];
        for cell in &self.cells {
            let slot = &mut longest[cell.col as usize];
            *slot = (*slot).max(cell.value.display_len());
        }

        self.column_widths = longest
            .into_iter()
            .map(|len| ((len + 2) as f64).clamp(min, max))
            .collect();
    }

    fn write_to(&self, worksheet: &mut Worksheet) -> Result<()> {
        worksheet.set_name(&self.name)?;

        for cell in &self.cells {
            match (&cell.value, cell.style.format()) {
                (CellValue::Text(s), Some(format)) => {
                    worksheet.write_string_with_format(cell.row, cell.col, s, &format)?;
                }
                (CellValue::Text(s), None) => {
                    worksheet.write_string(cell.row, cell.col, s)?;
                }
                (CellValue::Number(n), Some(format)) => {
                    worksheet.write_number_with_format(cell.row, cell.col, *n, &format)?;
                }
                (CellValue::Number(n), None) => {
                    worksheet.write_number(cell.row, cell.col, *n)?;
                }
            }
        }

        for merge in &self.merges {
            let format = merge.style.format().unwrap_or_default();
            worksheet.merge_range(
                merge.row,
                merge.first_col,
                merge.row,
                merge.last_col,
                &merge.text,
                &format,
            )?;
        }

        for (col, width) in self.column_widths.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }

        Ok(())
    }
}

/// `totales`: calendar, patient, total
pub fn totals_layout(aggregation: &Aggregation) -> SheetLayout {
    let mut sheet = SheetLayout::new(TOTALS_SHEET);

    for (col, header) in TOTALS_HEADERS.iter().enumerate() {
        sheet.put_text(0, col as u16, *header, CellStyle::TotalsHeader);
    }

    for (i, row) in aggregation.totals.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.put_text(r, 0, row.calendar.as_str(), CellStyle::Plain);
        sheet.put_text(r, 1, row.name.as_str(), CellStyle::Plain);
        sheet.put(r, 2, CellValue::Number(row.total as f64), CellStyle::Plain);
    }

    sheet.fit_columns(0.0, 50.0);
    sheet
}

/// `detalle`: a column per normalized title, sectioned by calendar
pub fn detail_layout(aggregation: &Aggregation) -> SheetLayout {
    let mut sheet = SheetLayout::new(DETAIL_SHEET);
    let mut col: u16 = 0;

    for section in &aggregation.detail {
        if section.columns.is_empty() {
            continue;
        }
        let first_col = col;

        for column in &section.columns {
            sheet.put_text(0, col, column.label.as_str(), CellStyle::ColumnHeader);
            for (i, date) in column.dates.iter().enumerate() {
                sheet.put_text(
                    DETAIL_FIRST_DATE_ROW + i as u32,
                    col,
                    format_date(*date),
                    CellStyle::Plain,
                );
            }
            col += 1;
        }

        let last_col = col - 1;
        if last_col > first_col {
            sheet.merges.push(MergedCell {
                row: 1,
                first_col,
                last_col,
                text: section.calendar.clone(),
                style: CellStyle::CalendarHeader,
            });
        } else {
            sheet.put_text(1, first_col, section.calendar.as_str(), CellStyle::CalendarHeader);
        }
    }

    sheet.fit_columns(12.0, 20.0);
    sheet
}

/// Build the two-sheet workbook in memory
pub fn build_workbook(aggregation: &Aggregation) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    totals_layout(aggregation).write_to(workbook.add_worksheet())?;
    detail_layout(aggregation).write_to(workbook.add_worksheet())?;
    Ok(workbook)
}

/// `report_2024_01_20240205_143000.xlsx`
pub fn report_file_name(period: ReportPeriod, generated_at: NaiveDateTime) -> String {
    format!(
        "report_{:04}_{:02}_{}.xlsx",
        period.year,
        period.month,
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// True for names produced by [`report_file_name`]; rejects anything path-like
pub fn is_report_file_name(name: &str) -> bool {
    name.starts_with("report_")
        && name.ends_with(".xlsx")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !name.contains("..")
}

/// Write the report into `dir`, creating it if needed
pub fn save_report(
    aggregation: &Aggregation,
    period: ReportPeriod,
    dir: &Path,
    generated_at: NaiveDateTime,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(period, generated_at));
    let mut workbook = build_workbook(aggregation)?;
    workbook.save(&path)?;
    tracing::info!("saved report to {}", path.display());
    Ok(path)
}
