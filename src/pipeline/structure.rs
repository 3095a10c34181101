//! Section/paragraph segmentation of `struct_text`.
//!
//! One left-to-right pass over the non-blank lines. A heading-like line
//! (shouting caps, or ending in a colon) closes the paragraph being
//! accumulated and is recorded as a section; every other line is appended to
//! the current paragraph. Paragraph lines are joined with single spaces.
//!
//! Joining paragraphs back together loses their line boundaries, so feeding
//! the output back in does not reproduce the same segmentation.

use crate::output::DocumentStructure;

pub fn structure_text(struct_text: &str) -> DocumentStructure {
    let mut structure = DocumentStructure::default();
    let mut current: Vec<&str> = Vec::new();

    for line in struct_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_heading(line) {
            flush(&mut current, &mut structure.paragraphs);
            structure.sections.push(line.to_string());
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut structure.paragraphs);

    structure
}

fn flush(current: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
        current.clear();
    }
}

/// A line is a heading when it ends with a colon or is written in capitals.
pub fn is_heading(line: &str) -> bool {
    line.ends_with(':') || is_all_caps(line)
}

/// Capitals test: at least one letter, no lower-case letters, and letters make
/// up most of the visible characters. The last condition keeps grade rows such
/// as `Q1: 80` or `A+ 95` from being read as headings.
fn is_all_caps(line: &str) -> bool {
    let mut letters = 0usize;
    let mut others = 0usize;
    for c in line.chars().filter(|c| !c.is_whitespace()) {
        if c.is_lowercase() {
            return false;
        }
        if c.is_alphabetic() {
            letters += 1;
        } else {
            others += 1;
        }
    }
    letters > 0 && letters > others
}
