use console::measure_text_width;
use crossterm::style::Stylize;

/// Column-aligned plain-text table. Cells may carry ANSI styling.
#[derive(Debug, Default, Clone)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    fn widths(&self) -> Vec<usize> {
        let num_cols = std::iter::once(&self.header)
            .chain(&self.rows)
            .map(Vec::len)
            .max()
            .unwrap_or(0);

        let mut widths = vec![0; num_cols];
        for row in std::iter::once(&self.header).chain(&self.rows) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(measure_text_width(cell));
            }
        }
        widths
    }

    fn render_row(cells: &[String], widths: &[usize], out: &mut String) {
        let last = cells.len().saturating_sub(1);
        for (i, cell) in cells.iter().enumerate() {
            out.push_str(cell);
            if i < last {
                // Escape sequences take no columns, so pad by printed width.
                let fill = widths[i].saturating_sub(measure_text_width(cell)) + 3;
                out.extend(std::iter::repeat_n(' ', fill));
            }
        }
        out.push('\n');
    }

    /// Renders the table; the header row is bold when `styled` is set.
    pub fn render(&self, styled: bool) -> String {
        let widths = self.widths();
        let mut out = String::new();

        if !self.header.is_empty() {
            let header: Vec<String> = self
                .header
                .iter()
                .map(|h| {
                    if styled {
                        h.as_str().bold().to_string()
                    } else {
                        h.clone()
                    }
                })
                .collect();
            Self::render_row(&header, &widths, &mut out);
        }

        for row in &self.rows {
            Self::render_row(row, &widths, &mut out);
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_columns_to_widest_cell() {
        let mut table = Table::new(["NAME", "STATE"]);
        table.push_row(["shop-web-1", "running"]);
        table.push_row(["db", "exited"]);

        assert_eq!(
            table.render(false),
            "NAME         STATE\n\
             shop-web-1   running\n\
             db           exited\n"
        );
    }

    #[test]
    fn styled_cells_do_not_skew_alignment() {
        let mut table = Table::new(["A", "B"]);
        table.push_row(["x".red().to_string(), "1".to_string()]);
        table.push_row(["yyy".to_string(), "2".to_string()]);

        let rendered = table.render(false);
        let plain: Vec<String> = rendered
            .lines()
            .map(|l| console::strip_ansi_codes(l).into_owned())
            .collect();

        assert_eq!(plain, vec!["A     B", "x     1", "yyy   2"]);
    }

    #[test]
    fn overlong_cells_push_the_next_column_out() {
        let mut table = Table::new(["ID", "NAME"]);
        table.push_row(["7", "web"]);
        let widths = table.widths();

        let mut out = String::new();
        Table::render_row(
            &["seven".to_string(), "db".to_string()],
            &widths,
            &mut out,
        );

        assert_eq!(widths, vec![2, 4]);
        assert_eq!(out, "seven   db\n");
    }

    #[test]
    fn ragged_rows_render() {
        let mut table = Table::new(Vec::<String>::new());
        table.push_row(["only"]);
        table.push_row(["a", "b"]);

        assert_eq!(table.render(false), "only\na      b\n");
    }
}
