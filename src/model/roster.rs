//! Parses the raw sheet grid into roster rows restricted to the schema's columns.

use crate::model::SchemaConfig;
use crate::Result;
use anyhow::bail;
use std::collections::HashMap;

/// The roster rows, in sheet order, restricted to the columns the schema names.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Roster {
    rows: Vec<RosterRow>,
}

impl Roster {
    /// Parses the sheet grid (header row first, as returned by the Sheets API). Fails fast with
    /// a schema-mismatch error before any row is produced when a required column is absent.
    ///
    /// Cells are kept only for the schema's columns, and empty-string cells are treated as
    /// absent. Short rows (the API omits trailing empty cells) are fine.
    pub fn parse<S, R>(sheet_data: impl IntoIterator<Item = R>, schema: &SchemaConfig) -> Result<Self>
    where
        S: Into<String>,
        R: IntoIterator<Item = S>,
    {
        let mut rows = sheet_data.into_iter();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.into_iter().map(|s| s.into()).collect(),
            None => bail!("An empty data set cannot be parsed into a roster"),
        };
        schema.verify_headers(&headers)?;

        let needed: Vec<&str> = schema.colnames();
        let data = rows
            .enumerate()
            .map(|(ix, row)| {
                let cells: Vec<String> = row.into_iter().map(|s| s.into()).collect();
                let fields: HashMap<String, String> = headers
                    .iter()
                    .zip(cells)
                    .filter(|(header, cell)| {
                        needed.contains(&header.as_str()) && !cell.trim().is_empty()
                    })
                    .map(|(header, cell)| (header.clone(), cell))
                    .collect();
                // Row 1 is the header row, so the first data row is sheet row 2.
                RosterRow {
                    row_num: ix + 2,
                    fields,
                }
            })
            .collect();

        Ok(Self { rows: data })
    }

    pub fn rows(&self) -> &[RosterRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RosterRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One roster row. Holds only non-empty cells of the schema's columns, keyed by header, plus the
/// 1-based sheet row number for error reporting.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct RosterRow {
    row_num: usize,
    fields: HashMap<String, String>,
}

impl RosterRow {
    pub(crate) fn new(row_num: usize, fields: HashMap<String, String>) -> Self {
        Self { row_num, fields }
    }

    /// The 1-based sheet row this record came from.
    pub fn row_num(&self) -> usize {
        self.row_num
    }

    /// The cell under `header`, or `None` when the cell was absent or empty.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).map(|s| s.as_str())
    }

    /// The person name cell, per the schema.
    pub fn name<'a>(&'a self, schema: &SchemaConfig) -> Option<&'a str> {
        self.get(schema.name())
    }

    /// The troop cell, per the schema.
    pub fn troop<'a>(&'a self, schema: &SchemaConfig) -> Option<&'a str> {
        self.get(schema.troop())
    }

    /// The registration-number cell, per the schema.
    pub fn reg_num<'a>(&'a self, schema: &SchemaConfig) -> Option<&'a str> {
        self.get(schema.reg_num())
    }

    /// A short identity string for operator-facing messages.
    pub fn describe(&self, schema: &SchemaConfig) -> String {
        format!(
            "row {} ({})",
            self.row_num,
            self.name(schema).unwrap_or("<no name>")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LedgerColumns;

    fn schema() -> SchemaConfig {
        SchemaConfig::new(
            "Name",
            "Troop",
            "Reg",
            vec!["Email 1".to_string()],
            LedgerColumns::DuePaid {
                amount_due: "Due".to_string(),
                amount_paid: "Paid".to_string(),
                amount_due_sts: None,
                amount_paid_sts: None,
            },
        )
    }

    #[test]
    fn test_parse_restricts_and_drops_empty() {
        let grid = vec![
            vec!["Name", "Troop", "Reg", "Email 1", "Due", "Paid", "Unrelated"],
            vec!["Jana Nováková", "Sokol", "042", "", "500", "0", "ignored"],
        ];
        let roster = Roster::parse(grid, &schema()).unwrap();
        assert_eq!(roster.len(), 1);
        let row = &roster.rows()[0];
        assert_eq!(row.row_num(), 2);
        assert_eq!(row.get("Name"), Some("Jana Nováková"));
        assert_eq!(row.get("Email 1"), None); // empty cell is absent
        assert_eq!(row.get("Unrelated"), None); // not a schema column
        assert_eq!(row.get("Due"), Some("500"));
    }

    #[test]
    fn test_parse_short_rows() {
        // The Sheets API omits trailing empty cells.
        let grid = vec![
            vec!["Name", "Troop", "Reg", "Email 1", "Due", "Paid"],
            vec!["Jana Nováková", "Sokol"],
        ];
        let roster = Roster::parse(grid, &schema()).unwrap();
        let row = &roster.rows()[0];
        assert_eq!(row.get("Reg"), None);
        assert_eq!(row.get("Troop"), Some("Sokol"));
    }

    #[test]
    fn test_parse_missing_column_fails_fast() {
        let grid = vec![
            vec!["Name", "Troop", "Email 1", "Due", "Paid"],
            vec!["Jana Nováková", "Sokol", "jana@example.com", "500", "0"],
        ];
        let err = Roster::parse(grid, &schema()).unwrap_err();
        assert!(err.to_string().contains("Reg"));
    }

    #[test]
    fn test_parse_empty_grid() {
        let grid: Vec<Vec<String>> = Vec::new();
        assert!(Roster::parse(grid, &schema()).is_err());
    }

    #[test]
    fn test_row_numbers_follow_sheet_order() {
        let grid = vec![
            vec!["Name", "Troop", "Reg", "Email 1", "Due", "Paid"],
            vec!["Osoba Jedna", "Sokol", "001"],
            vec!["Osoba Druhá", "Orel", "002"],
        ];
        let roster = Roster::parse(grid, &schema()).unwrap();
        let nums: Vec<usize> = roster.rows().iter().map(|r| r.row_num()).collect();
        assert_eq!(nums, vec![2, 3]);
    }
}
