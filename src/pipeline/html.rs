//! Static HTML documents: the PDF→HTML page, its degraded notice variant,
//! and the print wrapper around converted DOCX bodies.

use crate::pipeline::text::IntermediateDocument;
use html_escape::encode_text;

const BASE_STYLE: &str = "        body {
            font-family: Arial, sans-serif;
            line-height: 1.6;
            margin: 40px;
            max-width: 800px;
            margin-left: auto;
            margin-right: auto;
        }
        .header {
            text-align: center;
            margin-bottom: 2em;
            color: #333;
        }";

fn page(style: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>PDF to HTML Conversion</title>
    <style>
{BASE_STYLE}
{style}
    </style>
</head>
<body>
{body}
</body>
</html>
"#
    )
}

/// Extracted text as an HTML page: a header with the page count and file
/// name, then one `div.paragraph` per non-blank line.
pub fn render_text_page(doc: &IntermediateDocument, source_name: &str) -> String {
    let style = "        .page-break {
            page-break-before: always;
        }
        .paragraph {
            margin-bottom: 1em;
        }";
    let paragraphs: Vec<String> = doc
        .lines()
        .into_iter()
        .map(|line| format!(r#"    <div class="paragraph">{}</div>"#, encode_text(line)))
        .collect();
    let body = format!(
        r#"    <div class="header">
        <h1>PDF to HTML Conversion</h1>
        <p>Converted from PDF with {pages} pages</p>
        <p>Original file: {name}</p>
    </div>
{paragraphs}"#,
        pages = doc.page_count(),
        name = encode_text(source_name),
        paragraphs = paragraphs.join("\n"),
    );
    page(style, &body)
}

/// Notice page written when the PDF could not be parsed.
pub fn render_error_page(source_name: &str, error: &str) -> String {
    let style = "        .error-message {
            color: #d32f2f;
            background-color: #ffebee;
            padding: 20px;
            border-radius: 4px;
            border-left: 4px solid #d32f2f;
        }";
    let name = encode_text(source_name);
    let body = format!(
        r#"    <div class="header">
        <h1>PDF to HTML Conversion</h1>
        <p>PDF file: {name}</p>
    </div>
    <div class="error-message">
        <h3>Conversion Notice</h3>
        <p>The PDF content could not be fully extracted due to parsing limitations.
        This is a common issue with certain PDF formats or corrupted files.</p>
        <p>File: {name}</p>
        <p>Error: {error}</p>
    </div>"#,
        error = encode_text(error),
    );
    page(style, &body)
}

/// Wrap a body fragment into a standalone document ready for printing.
pub fn wrap_fragment_for_print(fragment: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ font-family: "Times New Roman", serif; font-size: 12pt; line-height: 1.4; }}
h1, h2, h3 {{ font-family: Arial, sans-serif; }}
p {{ margin: 0 0 0.6em 0; }}
</style>
</head>
<body>
{fragment}</body>
</html>
"#,
        title = encode_text(title),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_page_lists_paragraphs_escaped() {
        let doc = IntermediateDocument::from_text("a < b\n\n  second  \u{0C}third");
        let html = render_text_page(&doc, "in.pdf");
        assert!(html.contains("Converted from PDF with 2 pages"));
        assert!(html.contains("Original file: in.pdf"));
        assert!(html.contains(r#"<div class="paragraph">a &lt; b</div>"#));
        assert!(html.contains(r#"<div class="paragraph">second</div>"#));
        assert_eq!(html.matches(r#"class="paragraph""#).count(), 3);
    }

    #[test]
    fn error_page_has_notice_block() {
        let html = render_error_page("bad.pdf", "Invalid file header");
        assert!(html.contains(r#"<div class="error-message">"#));
        assert!(html.contains("<p>Error: Invalid file header</p>"));
        assert!(html.contains("<p>File: bad.pdf</p>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn print_wrapper_embeds_fragment() {
        let html = wrap_fragment_for_print("<p>x</p>\n", "doc & co");
        assert!(html.contains("<body>\n<p>x</p>\n</body>"));
        assert!(html.contains("<title>doc &amp; co</title>"));
    }
}
