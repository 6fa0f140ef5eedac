//! Plain text table layout

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment {
    Left,
    Right,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
}

impl Column {
    pub fn left(header: &str) -> Self {
        Self { header: header.to_string(), alignment: Alignment::Left, min_width: 0 }
    }

    pub fn right(header: &str) -> Self {
        Self { header: header.to_string(), alignment: Alignment::Right, min_width: 0 }
    }
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Table with a bordered header
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<RowData>,
    show_borders: bool,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new(), show_borders: true }
    }

    pub fn without_borders(mut self) -> Self {
        self.show_borders = false;
        self
    }

    pub fn push_row(&mut self, row: RowData) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table; an empty table renders as an empty string
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        let widths = self.column_widths();
        let mut lines = Vec::new();

        if self.show_borders {
            lines.push(Self::horizontal_border(&widths));
        }
        let headers: Vec<String> = self.columns.iter().map(|c| c.header.clone()).collect();
        lines.push(self.render_row(&headers, &widths));
        if self.show_borders {
            lines.push(Self::horizontal_border(&widths));
        }

        for row in &self.rows {
            lines.push(self.render_row(row, &widths));
        }

        if self.show_borders {
            lines.push(Self::horizontal_border(&widths));
        }

        lines.join("\n")
    }

    fn column_widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let content = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0);
                column.min_width.max(column.header.chars().count()).max(content)
            })
            .collect()
    }

    fn render_row(&self, cells: &[String], widths: &[usize]) -> String {
        let rendered: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(idx, width)| {
                let cell = cells.get(idx).map(String::as_str).unwrap_or("");
                let alignment = self.columns.get(idx).map_or(Alignment::Left, |c| c.alignment);
                match alignment {
                    Alignment::Left => format!("{:<width$}", cell, width = width),
                    Alignment::Right => format!("{:>width$}", cell, width = width),
                }
            })
            .collect();

        if self.show_borders {
            format!("| {} |", rendered.join(" | "))
        } else {
            rendered.join("  ").trim_end().to_string()
        }
    }

    fn horizontal_border(widths: &[usize]) -> String {
        let segments: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
        format!("+{}+", segments.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_renders_nothing() {
        let table = Table::new(vec![Column::left("ID")]);
        assert!(table.is_empty());
        assert_eq!(table.render(), "");
    }

    #[test]
    fn test_bordered_layout() {
        let mut table = Table::new(vec![Column::right("ID"), Column::left("Download")]);
        table.push_row(vec!["7".to_string(), "88.63MB".to_string()]);
        table.push_row(vec!["12".to_string(), "0B".to_string()]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "+----+----------+");
        assert_eq!(lines[1], "| ID | Download |");
        assert_eq!(lines[3], "|  7 | 88.63MB  |");
        assert_eq!(lines[4], "| 12 | 0B       |");
    }

    #[test]
    fn test_borderless_layout_trims_trailing_space() {
        let mut table = Table::new(vec![Column::left("Key"), Column::left("Value")]).without_borders();
        table.push_row(vec!["a".to_string(), String::new()]);

        let rendered = table.render();
        assert_eq!(rendered.lines().nth(1), Some("a"));
    }
}
