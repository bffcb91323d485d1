//! Rich document blocks and their destination JSON shape.

use serde::{
    ser::{SerializeMap, SerializeStruct},
    Serialize, Serializer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingSize {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

impl HeadingSize {
    pub const ALL: [HeadingSize; 6] = [Self::H1, Self::H2, Self::H3, Self::H4, Self::H5, Self::H6];

    pub fn level(self) -> usize {
        match self {
            Self::H1 => 1,
            Self::H2 => 2,
            Self::H3 => 3,
            Self::H4 => 4,
            Self::H5 => 5,
            Self::H6 => 6,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
            Self::H6 => "h6",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextAttrs {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub font_size: Option<HeadingSize>,
}

impl TextAttrs {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Self::default()
        }
    }

    pub fn strikethrough() -> Self {
        Self {
            strikethrough: true,
            ..Self::default()
        }
    }

    pub fn heading(size: HeadingSize) -> Self {
        Self {
            bold: true,
            font_size: Some(size),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Attribute values are strings in the destination format.
impl Serialize for TextAttrs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(size) = self.font_size {
            map.serialize_entry("fontSize", size.token())?;
        }
        if self.bold {
            map.serialize_entry("bold", "true")?;
        }
        if self.italic {
            map.serialize_entry("italic", "true")?;
        }
        if self.strikethrough {
            map.serialize_entry("strikethrough", "true")?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub attrs: TextAttrs,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, TextAttrs::default())
    }

    pub fn styled(text: impl Into<String>, attrs: TextAttrs) -> Self {
        Self {
            text: text.into(),
            attrs,
        }
    }
}

impl Serialize for TextRun {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.attrs.is_empty() { 2 } else { 3 };
        let mut state = serializer.serialize_struct("TextRun", fields)?;
        state.serialize_field("type", "text")?;
        state.serialize_field("text", &self.text)?;
        if !self.attrs.is_empty() {
            state.serialize_field("attrs", &self.attrs)?;
        }
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
}

impl Paragraph {
    pub fn single(run: TextRun) -> Self {
        Self { runs: vec![run] }
    }
}

impl Serialize for Paragraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Paragraph", 2)?;
        state.serialize_field("type", "paragraph")?;
        state.serialize_field("content", &self.runs)?;
        state.end()
    }
}

/// 1-based coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    #[serde(rename = "cellContent")]
    pub content: Vec<Paragraph>,
}

/// Cells are sparse: a row shorter than `col_count` simply has fewer cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub row_count: usize,
    pub col_count: usize,
    pub cells: Vec<Cell>,
}

impl Table {
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.row == row && cell.col == col)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableInfo<'a> {
    row_size: usize,
    col_size: usize,
    cell_list: &'a [Cell],
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Table", 2)?;
        state.serialize_field("type", "table")?;
        state.serialize_field(
            "tableInfo",
            &TableInfo {
                row_size: self.row_count,
                col_size: self.col_count,
                cell_list: &self.cells,
            },
        )?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichBlock {
    Blank,
    Paragraph(Paragraph),
    Table(Table),
}

impl RichBlock {
    pub fn paragraph(runs: Vec<TextRun>) -> Self {
        Self::Paragraph(Paragraph { runs })
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }
}

impl Serialize for RichBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Blank => {
                let mut state = serializer.serialize_struct("Blank", 1)?;
                state.serialize_field("type", "blank")?;
                state.end()
            }
            Self::Paragraph(paragraph) => paragraph.serialize(serializer),
            Self::Table(table) => table.serialize(serializer),
        }
    }
}

/// Every non-blank line becomes one unstyled run; blank lines stay blank.
pub fn plain_text_fallback(text: &str) -> Vec<RichBlock> {
    text.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                RichBlock::Blank
            } else {
                RichBlock::paragraph(vec![TextRun::plain(trimmed)])
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unstyled_runs_omit_attrs() {
        let block = RichBlock::paragraph(vec![
            TextRun::styled("hello", TextAttrs::bold()),
            TextRun::plain("world"),
        ]);
        assert_eq!(
            serde_json::to_value(&block).expect("serialize"),
            json!({
                "type": "paragraph",
                "content": [
                    {"type": "text", "text": "hello", "attrs": {"bold": "true"}},
                    {"type": "text", "text": "world"}
                ]
            })
        );
    }

    #[test]
    fn table_nests_under_table_info() {
        let table = RichBlock::Table(Table {
            row_count: 1,
            col_count: 1,
            cells: vec![Cell {
                row: 1,
                col: 1,
                content: vec![Paragraph::single(TextRun::styled("A", TextAttrs::bold()))],
            }],
        });
        let value = serde_json::to_value(&table).expect("serialize");
        assert_eq!(value["type"], "table");
        assert_eq!(value["tableInfo"]["rowSize"], 1);
        assert_eq!(value["tableInfo"]["cellList"][0]["cellContent"][0]["type"], "paragraph");
    }

    #[test]
    fn fallback_keeps_line_structure() {
        let blocks = plain_text_fallback("**a**\n\n  b  ");
        assert_eq!(
            blocks,
            vec![
                RichBlock::paragraph(vec![TextRun::plain("**a**")]),
                RichBlock::Blank,
                RichBlock::paragraph(vec![TextRun::plain("b")]),
            ]
        );
    }
}
