use std::cmp;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    pub name: &'a str,
    pub align: Align,
}

const INDENT: usize = 2;
const COLUMN_GAP: usize = 2;
const MIN_COLUMN_WIDTH: usize = 6;

pub fn terminal_width() -> usize {
    let from_env = std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(120);
    cmp::max(from_env, 40)
}

pub fn key_value_rows(entries: &[(&str, String)], indent: usize) -> Vec<String> {
    let label_width = entries
        .iter()
        .map(|(label, _)| display_width(label))
        .max()
        .unwrap_or(0);
    let padding = " ".repeat(indent);

    entries
        .iter()
        .map(|(label, value)| format!("{padding}{}  {value}", pad(label, label_width, Align::Left)))
        .collect()
}

/// Renders a fixed-width table. Cells wider than their share of `max_width` are
/// cut with an ellipsis; the widest column gives up space first.
pub fn render_table(columns: &[Column<'_>], rows: &[Vec<String>], max_width: usize) -> Vec<String> {
    if columns.is_empty() {
        return Vec::new();
    }

    let mut widths = columns
        .iter()
        .map(|column| display_width(column.name))
        .collect::<Vec<usize>>();
    for row in rows {
        for (index, value) in row.iter().enumerate() {
            if let Some(slot) = widths.get_mut(index) {
                *slot = cmp::max(*slot, display_width(value));
            }
        }
    }

    let gaps = COLUMN_GAP * columns.len().saturating_sub(1);
    let budget = max_width.saturating_sub(INDENT + gaps);
    shrink_to_budget(&mut widths, budget);

    let header = columns
        .iter()
        .map(|column| column.name.to_string())
        .collect::<Vec<String>>();
    let mut output = vec![format_row(columns, &header, &widths)];
    output.extend(rows.iter().map(|row| format_row(columns, row, &widths)));
    output
}

pub fn truncate(value: &str, width: usize) -> String {
    if display_width(value) <= width {
        return value.to_string();
    }
    if width <= 1 {
        return value.chars().take(width).collect();
    }
    let mut cut = value.chars().take(width - 1).collect::<String>();
    cut.push('…');
    cut
}

fn shrink_to_budget(widths: &mut [usize], budget: usize) {
    let mut total = widths.iter().sum::<usize>();
    while total > budget {
        let Some((index, widest)) = widths
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, width)| *width)
        else {
            return;
        };
        if widest <= MIN_COLUMN_WIDTH {
            return;
        }
        widths[index] -= 1;
        total -= 1;
    }
}

fn format_row(columns: &[Column<'_>], cells: &[String], widths: &[usize]) -> String {
    let pieces = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let width = widths.get(index).copied().unwrap_or(MIN_COLUMN_WIDTH);
            let value = cells.get(index).map(String::as_str).unwrap_or("");
            pad(&truncate(value, width), width, column.align)
        })
        .collect::<Vec<String>>();

    format!("{}{}", " ".repeat(INDENT), pieces.join("  ").trim_end())
}

fn pad(value: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(display_width(value)));
    match align {
        Align::Left => format!("{value}{fill}"),
        Align::Right => format!("{fill}{value}"),
    }
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

#[cfg(test)]
mod tests {
    use super::{Align, Column, key_value_rows, render_table, truncate};

    #[test]
    fn key_value_rows_align_labels() {
        let rows = key_value_rows(&[("Rows:", "3".to_string()), ("Imported:", "1".to_string())], 2);
        assert_eq!(rows, vec!["  Rows:      3", "  Imported:  1"]);
    }

    #[test]
    fn table_pads_accented_text_by_characters() {
        let columns = [
            Column {
                name: "Description",
                align: Align::Left,
            },
            Column {
                name: "Amount",
                align: Align::Right,
            },
        ];
        let rows = vec![vec!["Café".to_string(), "3.50".to_string()]];
        let rendered = render_table(&columns, &rows, 80);
        assert_eq!(rendered[0], "  Description  Amount");
        assert_eq!(rendered[1], "  Café           3.50");
    }

    #[test]
    fn narrow_terminals_truncate_wide_cells() {
        let columns = [Column {
            name: "Description",
            align: Align::Left,
        }];
        let rows = vec![vec!["a".repeat(60)]];
        let rendered = render_table(&columns, &rows, 40);
        assert!(rendered[1].ends_with('…'));
        assert_eq!(rendered[1].chars().count(), 40);
        assert_eq!(truncate("abc", 2), "a…");
    }
}
