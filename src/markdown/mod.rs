//! Markdown answer to rich document blocks.

pub mod blocks;
pub mod converter;
pub mod inline;
pub mod table;

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub use blocks::{plain_text_fallback, Cell, HeadingSize, Paragraph, RichBlock, Table, TextAttrs, TextRun};
pub use converter::convert;
pub use inline::{InlineFormat, InlineMatch};

/// Internal conversion failure. Never escapes [`convert`]; it triggers the
/// plain-text fallback instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("pattern failed to compile: {0}")]
    Pattern(String),
    #[error("offsets {start}..{end} do not fall on character boundaries")]
    Boundary { start: usize, end: usize },
}

pub(crate) struct Patterns {
    inline: Vec<(InlineFormat, Regex)>,
    titles: Vec<(HeadingSize, Regex)>,
    table_row: Regex,
    table_separator: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        let inline = vec![
            (InlineFormat::Bold, Regex::new(r"\*\*(.*?)\*\*|__(.*?)__")?),
            (InlineFormat::Italic, Regex::new(r"\*(.*?)\*|_(.*?)_")?),
            (InlineFormat::Strikethrough, Regex::new(r"~~(.*?)~~")?),
        ];
        let titles = HeadingSize::ALL
            .into_iter()
            .map(|size| {
                Regex::new(&format!(r"^#{{{}}} (.+)$", size.level())).map(|regex| (size, regex))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            inline,
            titles,
            table_row: Regex::new(r"^\|(.+)\|$")?,
            table_separator: Regex::new(r"^\|(?:[\s\-:]+\|)+$")?,
        })
    }
}

static PATTERNS: LazyLock<Result<Patterns, regex::Error>> = LazyLock::new(Patterns::compile);

pub(crate) fn patterns() -> Result<&'static Patterns, ConvertError> {
    PATTERNS
        .as_ref()
        .map_err(|err| ConvertError::Pattern(err.to_string()))
}
