//! Text-only block finder used when no syntax tree is available.

use crate::detect::patterns::{class_definition, function_definition, indentation, is_blank};
use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Function,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    pub kind: BlockKind,
    pub name: Option<String>,
    /// 1-indexed, inclusive
    pub start_line: usize,
    pub end_line: usize,
}

impl Block {
    pub(crate) const fn encloses(&self, other: &Self) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }
}

/// Outermost blocks of `kind`; definitions nested inside a found block are
/// skipped.
pub(crate) fn find_blocks(content: &str, language: Language, kind: BlockKind) -> Vec<Block> {
    let lines: Vec<&str> = content.lines().collect();
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        let name = match kind {
            BlockKind::Function => function_definition(line),
            BlockKind::Class => class_definition(line),
        };
        let Some(name) = name else {
            idx += 1;
            continue;
        };

        let end = if language.uses_indentation_blocks() {
            indented_block_end(&lines, idx)
        } else {
            braced_block_end(&lines, idx)
        };
        blocks.push(Block {
            kind,
            name: (!name.is_empty()).then_some(name),
            start_line: idx + 1,
            end_line: end + 1,
        });
        idx = end + 1;
    }
    blocks
}

/// Last line (0-indexed) of a block whose body is indented past `start`
fn indented_block_end(lines: &[&str], start: usize) -> usize {
    let base = indentation(lines[start]);
    let mut end = start;
    for (offset, line) in lines.iter().enumerate().skip(start + 1) {
        if is_blank(line) {
            continue;
        }
        if indentation(line) <= base {
            break;
        }
        end = offset;
    }
    end
}

/// Last line (0-indexed) closing the first `{` opened at or after `start`.
/// A `;` seen before any `{` ends a single-statement definition.
fn braced_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i64 = 0;
    let mut opened = false;

    for (offset, line) in lines.iter().enumerate().skip(start) {
        let mut quote: Option<char> = None;
        let mut prev = '\0';
        for ch in line.chars() {
            if let Some(q) = quote {
                if ch == q && prev != '\\' {
                    quote = None;
                }
            } else {
                match ch {
                    '"' | '\'' | '`' => quote = Some(ch),
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => depth -= 1,
                    ';' if !opened => return offset,
                    _ => {}
                }
            }
            prev = ch;
        }
        if opened && depth <= 0 {
            return offset;
        }
        // Python-style colon or a bare signature without a body
        if !opened && offset > start + 2 {
            return start;
        }
    }
    lines.len().saturating_sub(1).max(start)
}
