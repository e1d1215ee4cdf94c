//! Text heuristics: the pure functions that turn extracted text into pages,
//! table rows, slides and wrapped lines.
//!
//! Every rule here is a `&str → value` function with no I/O, so strategies
//! can compose them freely and each rule is tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Page separator in extracted text.
pub const FORM_FEED: char = '\u{0C}';

/// Maximum non-blank lines per generated slide.
pub const LINES_PER_SLIDE: usize = 10;

// ── Documents ────────────────────────────────────────────────────────────────

/// Text pulled out of a source document, one entry per page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntermediateDocument {
    pages: Vec<String>,
    total_characters: usize,
}

impl IntermediateDocument {
    /// Build from raw text; form feeds separate pages, none means one page.
    pub fn from_text(text: &str) -> Self {
        Self::from_pages(split_pages(text))
    }

    /// Build from text already split per page.
    pub fn from_pages(pages: Vec<String>) -> Self {
        let separators = pages.len().saturating_sub(1);
        let total_characters =
            pages.iter().map(|p| p.chars().count()).sum::<usize>() + separators;
        Self {
            pages,
            total_characters,
        }
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Character count of [`Self::text`].
    pub fn total_characters(&self) -> usize {
        self.total_characters
    }

    /// Pages re-joined with form feeds.
    pub fn text(&self) -> String {
        self.pages.join(&FORM_FEED.to_string())
    }

    /// Trimmed non-blank lines across all pages, in order.
    pub fn lines(&self) -> Vec<&str> {
        self.pages.iter().flat_map(|p| non_blank_lines(p)).collect()
    }
}

/// Rows of cells derived from text, for spreadsheet targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TabularDocument {
    pub rows: Vec<Vec<String>>,
}

impl TabularDocument {
    pub fn from_document(doc: &IntermediateDocument) -> Self {
        Self {
            rows: tabulate(&doc.text()),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// ── Rule: page split ─────────────────────────────────────────────────────────

/// Split on form feed. Text without one is a single page.
pub fn split_pages(text: &str) -> Vec<String> {
    text.split(FORM_FEED).map(str::to_string).collect()
}

// ── Rule: line filtering ─────────────────────────────────────────────────────

/// Lines trimmed of surrounding whitespace, blank ones dropped.
///
/// Splits on `\n` and `\r\n`; a bare form feed inside a line is trimmed away.
pub fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(|l| l.trim_matches(|c: char| c.is_whitespace() || c == FORM_FEED))
        .filter(|l| !l.is_empty())
        .collect()
}

// ── Rule: column split ───────────────────────────────────────────────────────

static RE_COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t+").unwrap());

/// Split one line into cells on runs of two or more whitespace or on tabs.
pub fn split_columns(line: &str) -> Vec<String> {
    RE_COLUMN_GAP.split(line).map(str::to_string).collect()
}

/// Trim every line, drop blanks, split each on column gaps.
pub fn tabulate(text: &str) -> Vec<Vec<String>> {
    non_blank_lines(text)
        .into_iter()
        .map(split_columns)
        .collect()
}

// ── Rule: slide chunking ─────────────────────────────────────────────────────

/// Group each page's non-blank lines into chunks of [`LINES_PER_SLIDE`].
///
/// Chunks never span a page boundary. A document with no lines at all still
/// yields one empty chunk so the presentation has a slide.
pub fn chunk_slides(doc: &IntermediateDocument) -> Vec<Vec<String>> {
    let mut slides: Vec<Vec<String>> = doc
        .pages()
        .iter()
        .flat_map(|page| {
            non_blank_lines(page)
                .chunks(LINES_PER_SLIDE)
                .map(|c| c.iter().map(|l| l.to_string()).collect())
                .collect::<Vec<Vec<String>>>()
        })
        .collect();
    if slides.is_empty() {
        slides.push(Vec::new());
    }
    slides
}

// ── Rule: line wrap ──────────────────────────────────────────────────────────

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Whitespace runs inside a line are kept as written, so column gaps survive;
/// a run is dropped only where the line breaks. Words longer than the limit
/// are broken hard. An empty input yields one empty line so paragraph spacing
/// is kept.
pub fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut out: Vec<String> = Vec::new();
    let mut current: Vec<char> = Vec::new();
    let mut gap: Vec<char> = Vec::new();

    for (is_space, run) in whitespace_runs(line) {
        if is_space {
            gap.extend(run.chars());
            continue;
        }
        let mut word: Vec<char> = run.chars().collect();

        if !current.is_empty() && current.len() + gap.len() + word.len() > max_chars {
            out.push(current.drain(..).collect());
            gap.clear();
        }
        if current.is_empty() && !out.is_empty() {
            gap.clear();
        }
        current.append(&mut gap);

        while current.len() + word.len() > max_chars {
            let room = max_chars.saturating_sub(current.len());
            if room > 0 {
                let rest = word.split_off(room);
                current.append(&mut word);
                word = rest;
            }
            out.push(current.drain(..).collect());
        }
        current.append(&mut word);
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current.into_iter().collect());
    }
    out
}

/// Split a line into alternating whitespace and non-whitespace runs.
fn whitespace_runs(line: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut kind: Option<bool> = None;
    for (i, c) in line.char_indices() {
        let is_space = c.is_whitespace();
        match kind {
            Some(k) if k == is_space => {}
            Some(k) => {
                runs.push((k, &line[start..i]));
                start = i;
                kind = Some(is_space);
            }
            None => kind = Some(is_space),
        }
    }
    if let Some(k) = kind {
        runs.push((k, &line[start..]));
    }
    runs
}

/// Normalise CRLF and lone CR to LF, and expand tabs to four spaces.
pub fn normalise_text(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "    ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabulate_splits_on_wide_gaps_and_tabs() {
        assert_eq!(
            tabulate("A   B\nC\tD"),
            vec![vec!["A", "B"], vec!["C", "D"]]
        );
    }

    #[test]
    fn tabulate_drops_blank_lines_and_keeps_single_spaces() {
        let rows = tabulate("  Name  Age \n\n   \nJohn Smith    42");
        assert_eq!(rows, vec![vec!["Name", "Age"], vec!["John Smith", "42"]]);
    }

    #[test]
    fn split_pages_without_form_feed_is_one_page() {
        assert_eq!(split_pages("just text"), vec!["just text"]);
        assert_eq!(split_pages("a\u{0C}b").len(), 2);
    }

    #[test]
    fn document_text_round_trips_and_counts_chars() {
        let doc = IntermediateDocument::from_text("héllo\u{0C}world");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.text(), "héllo\u{0C}world");
        assert_eq!(doc.total_characters(), 11);
    }

    #[test]
    fn chunk_slides_counts() {
        let text: String = (1..=25).map(|i| format!("line {i}\n")).collect();
        let slides = chunk_slides(&IntermediateDocument::from_text(&text));
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].len(), 10);
        assert_eq!(slides[2].len(), 5);
        assert_eq!(slides[2][4], "line 25");
    }

    #[test]
    fn chunk_slides_respects_page_boundaries() {
        let doc = IntermediateDocument::from_text("a\nb\u{0C}c");
        assert_eq!(chunk_slides(&doc), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn chunk_slides_empty_document_gives_one_empty_slide() {
        let slides = chunk_slides(&IntermediateDocument::from_text("  \n\n"));
        assert_eq!(slides, vec![Vec::<String>::new()]);
    }

    #[test]
    fn wrap_line_breaks_on_words() {
        assert_eq!(
            wrap_line("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
    }

    #[test]
    fn wrap_line_hard_breaks_long_words() {
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_line_keeps_inner_gaps_and_drops_them_at_breaks() {
        assert_eq!(wrap_line("Name   Qty", 80), vec!["Name   Qty"]);
        assert_eq!(wrap_line("aaa    bbb", 5), vec!["aaa", "bbb"]);
        assert_eq!(wrap_line("  indented", 80), vec!["  indented"]);
    }

    #[test]
    fn wrap_line_empty_keeps_one_line() {
        assert_eq!(wrap_line("", 10), vec![""]);
    }

    #[test]
    fn normalise_text_line_endings_and_tabs() {
        assert_eq!(normalise_text("a\r\nb\rc\td"), "a\nb\nc    d");
    }
}
