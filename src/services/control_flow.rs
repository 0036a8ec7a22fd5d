//! Splits a section body into the branches of its top-level if/elif/else chain.
//!
//! Only depth-0 boundaries separate blocks. Nested `if ... endif` runs stay inside
//! the branch that contains them.

use crate::models::{ControlBlock, IniLine};

/// Split lines into control blocks. A body without conditionals yields one block.
///
/// The `endif` closing a chain starts the following block, so the last block of a
/// merge-mod command list is usually `endif` plus whatever trails it.
pub fn split_blocks(lines: &[IniLine]) -> Vec<ControlBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<IniLine> = Vec::new();
    let mut depth: i32 = -1;

    for line in lines {
        if line.key_starts_with("if") {
            if depth == -1 && !current.is_empty() {
                blocks.push(ControlBlock::new(std::mem::take(&mut current)));
            }
            depth += 1;
        } else if line.key_starts_with("elif") || line.key_starts_with("else") {
            if depth == 0 && !current.is_empty() {
                blocks.push(ControlBlock::new(std::mem::take(&mut current)));
            }
        } else if line.key_starts_with("endif") {
            depth -= 1;
            if depth == -1 && !current.is_empty() {
                blocks.push(ControlBlock::new(std::mem::take(&mut current)));
            }
        }
        current.push(line.clone());
    }

    if !current.is_empty() {
        blocks.push(ControlBlock::new(current));
    }

    blocks
}

/// Flatten blocks back into one line sequence.
pub fn join_blocks(blocks: Vec<ControlBlock>) -> Vec<IniLine> {
    blocks.into_iter().flat_map(|block| block.lines).collect()
}
