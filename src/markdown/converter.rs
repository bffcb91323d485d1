use tracing::{debug, warn};

use crate::markdown::{
    blocks::{plain_text_fallback, RichBlock, TextAttrs, TextRun},
    inline::build_runs,
    patterns,
    table::build_table,
    ConvertError, Patterns,
};

/// Converts a markdown answer into blocks, one source line at a time.
///
/// Never fails: any internal error degrades to [`plain_text_fallback`].
pub fn convert(markdown: &str) -> Vec<RichBlock> {
    match try_convert(markdown) {
        Ok(blocks) => {
            debug!(blocks = blocks.len(), "markdown converted");
            blocks
        }
        Err(err) => {
            warn!(error = %err, "markdown conversion failed, using plain text");
            plain_text_fallback(markdown)
        }
    }
}

pub fn try_convert(markdown: &str) -> Result<Vec<RichBlock>, ConvertError> {
    let patterns = patterns()?;
    let lines: Vec<&str> = markdown.split('\n').collect();

    let mut blocks = Vec::new();
    let mut cursor = 0;
    while cursor < lines.len() {
        let line = lines[cursor];
        if line.trim().is_empty() {
            blocks.push(RichBlock::Blank);
            cursor += 1;
            continue;
        }

        if let Some((table, consumed)) = build_table(patterns, &lines, cursor) {
            blocks.push(RichBlock::Table(table));
            cursor += consumed;
            continue;
        }

        let block = match build_title(patterns, line) {
            Some(title) => title,
            None => RichBlock::paragraph(build_runs(patterns, line)?),
        };
        blocks.push(block);
        cursor += 1;
    }
    Ok(blocks)
}

/// `#` through `######` followed by a space; the whole title is one bold run.
fn build_title(patterns: &Patterns, line: &str) -> Option<RichBlock> {
    patterns.titles.iter().find_map(|(size, regex)| {
        let text = regex.captures(line)?.get(1)?.as_str().trim();
        Some(RichBlock::paragraph(vec![TextRun::styled(
            text,
            TextAttrs::heading(*size),
        )]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::blocks::HeadingSize;

    #[test]
    fn titles_skip_inline_matching() {
        let blocks = convert("### **Summary**  ");
        assert_eq!(
            blocks,
            vec![RichBlock::paragraph(vec![TextRun::styled(
                "**Summary**",
                TextAttrs::heading(HeadingSize::H3),
            )])]
        );
    }

    #[test]
    fn seven_hashes_is_a_paragraph() {
        let blocks = convert("####### deep");
        assert_eq!(blocks, vec![RichBlock::paragraph(vec![TextRun::plain("####### deep")])]);
    }

    #[test]
    fn trailing_newline_yields_blank() {
        assert_eq!(convert("a\n").last(), Some(&RichBlock::Blank));
    }
}
