//! Building blocks the conversion strategies are assembled from.
//!
//! Each submodule owns one concern, so strategies stay thin and every
//! extraction or rendering step is testable in isolation.
//!
//! ## Data Flow
//!
//! ```text
//! source bytes ──▶ extract ──▶ text ──▶ pdf / ooxml / html ──▶ target bytes
//!                  (lopdf,     (pages,   (writers)
//!                   calamine,   rows,
//!                   quick-xml)  slides)
//!
//! html / office file ──▶ engine (Chromium, LibreOffice) ──▶ PDF bytes
//! ```
//!
//! 1. [`extract`]: pull text, rows or HTML out of PDF, XLSX and DOCX inputs
//! 2. [`text`]: pure heuristics over extracted text: page split, column
//!    split, slide chunking, line wrap
//! 3. [`pdf`]: text-only PDF writer and the page layouts built on it
//! 4. [`ooxml`]: DOCX, XLSX and PPTX package writers
//! 5. [`html`]: static HTML documents
//! 6. [`engine`]: external renderers behind the [`engine::HtmlRenderer`]
//!    and [`engine::OfficeRenderer`] traits

pub mod engine;
pub mod extract;
pub mod html;
pub mod ooxml;
pub mod pdf;
pub mod text;
