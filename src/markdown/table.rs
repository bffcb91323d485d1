use crate::markdown::{
    blocks::{Cell, Paragraph, Table, TextAttrs, TextRun},
    Patterns,
};

/// Reads a pipe table starting at `lines[start]`.
///
/// Returns the table and the number of source lines consumed, separator rows
/// included. `None` when the first line is not a table row or every consumed
/// row was a separator.
pub(crate) fn build_table(patterns: &Patterns, lines: &[&str], start: usize) -> Option<(Table, usize)> {
    let first = lines.get(start)?.trim();
    if !patterns.table_row.is_match(first) {
        return None;
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut consumed = 0;
    for line in &lines[start..] {
        let line = line.trim();
        if line.is_empty() || !patterns.table_row.is_match(line) {
            break;
        }
        consumed += 1;
        if patterns.table_separator.is_match(line) {
            continue;
        }
        rows.push(split_row(line));
    }

    if rows.is_empty() {
        return None;
    }

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let row_count = rows.len();
    let cells = rows
        .into_iter()
        .enumerate()
        .flat_map(|(row_index, row)| {
            let attrs = if row_index == 0 {
                TextAttrs::bold()
            } else {
                TextAttrs::default()
            };
            row.into_iter().enumerate().map(move |(col_index, text)| Cell {
                row: row_index + 1,
                col: col_index + 1,
                content: vec![Paragraph::single(TextRun::styled(text, attrs))],
            })
        })
        .collect();

    Some((
        Table {
            row_count,
            col_count,
            cells,
        },
        consumed,
    ))
}

/// Drops one leading and one trailing pipe, then splits and trims each cell.
pub fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}
