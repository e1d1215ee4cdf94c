//! Minimal Office Open XML packages: DOCX, XLSX and PPTX.
//!
//! Each builder writes only the parts the format requires plus the text
//! content, deflated into a zip archive held in memory.

use crate::error::StrategyError;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const NS_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_OFFICE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// In-memory zip with deflated entries.
struct Package {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl Package {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    fn add(&mut self, name: &str, content: &str) -> Result<(), StrategyError> {
        self.zip
            .start_file(name, self.options)
            .map_err(StrategyError::render)?;
        self.zip
            .write_all(content.as_bytes())
            .map_err(StrategyError::render)
    }

    fn finish(self) -> Result<Vec<u8>, StrategyError> {
        Ok(self.zip.finish().map_err(StrategyError::render)?.into_inner())
    }
}

/// Escape text content, dropping characters XML 1.0 cannot carry.
fn xml_text(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    html_escape::encode_text(&cleaned).into_owned()
}

fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let mut xml = format!(r#"{XML_DECL}<Relationships xmlns="{NS_REL}">"#);
    for (id, kind, target) in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{kind}" Target="{target}"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn content_types(overrides: &[(String, &str)]) -> String {
    let mut xml = format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#
    );
    for (part, kind) in overrides {
        xml.push_str(&format!(
            r#"<Override PartName="{part}" ContentType="{kind}"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

/// A4 page in twentieths of a point.
const A4_TWIPS: (u32, u32) = (11906, 16838);
const PAGE_MARGIN_TWIPS: u32 = 1440;

/// One paragraph per entry, on A4 with one-inch margins.
pub fn build_docx<S: AsRef<str>>(paragraphs: &[S]) -> Result<Vec<u8>, StrategyError> {
    let mut body = String::new();
    for p in paragraphs {
        body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            xml_text(p.as_ref())
        ));
    }
    let (w, h) = A4_TWIPS;
    let m = PAGE_MARGIN_TWIPS;
    let document = format!(
        r#"{XML_DECL}<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="{NS_OFFICE_REL}"><w:body>{body}<w:sectPr><w:pgSz w:w="{w}" w:h="{h}"/><w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    );

    let mut pkg = Package::new();
    pkg.add(
        "[Content_Types].xml",
        &content_types(&[(
            "/word/document.xml".into(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        )]),
    )?;
    pkg.add(
        "_rels/.rels",
        &relationships(&[("rId1", REL_OFFICE_DOCUMENT, "word/document.xml")]),
    )?;
    pkg.add("word/document.xml", &document)?;
    pkg.finish()
}

// ── XLSX ─────────────────────────────────────────────────────────────────────

const XLSX_STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Spreadsheet column name for a 0-based index: 0 → A, 26 → AA.
pub fn column_letter(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// A single sheet named `Sheet1` with every cell as an inline string.
pub fn build_xlsx(rows: &[Vec<String>]) -> Result<Vec<u8>, StrategyError> {
    let mut sheet_data = String::new();
    for (r, row) in rows.iter().enumerate() {
        let r = r + 1;
        sheet_data.push_str(&format!(r#"<row r="{r}">"#));
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            sheet_data.push_str(&format!(
                r#"<c r="{}{r}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_letter(c),
                xml_text(cell)
            ));
        }
        sheet_data.push_str("</row>");
    }

    let main_ns = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    let worksheet = format!(
        r#"{XML_DECL}<worksheet xmlns="{main_ns}"><sheetData>{sheet_data}</sheetData></worksheet>"#
    );
    let workbook = format!(
        r#"{XML_DECL}<workbook xmlns="{main_ns}" xmlns:r="{NS_OFFICE_REL}"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    );

    let mut pkg = Package::new();
    pkg.add(
        "[Content_Types].xml",
        &content_types(&[
            (
                "/xl/workbook.xml".into(),
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
            ),
            (
                "/xl/worksheets/sheet1.xml".into(),
                "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
            ),
            (
                "/xl/styles.xml".into(),
                "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
            ),
        ]),
    )?;
    pkg.add(
        "_rels/.rels",
        &relationships(&[("rId1", REL_OFFICE_DOCUMENT, "xl/workbook.xml")]),
    )?;
    pkg.add("xl/workbook.xml", &workbook)?;
    pkg.add(
        "xl/_rels/workbook.xml.rels",
        &relationships(&[
            (
                "rId1",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet",
                "worksheets/sheet1.xml",
            ),
            (
                "rId2",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
                "styles.xml",
            ),
        ]),
    )?;
    pkg.add("xl/worksheets/sheet1.xml", &worksheet)?;
    pkg.add("xl/styles.xml", &format!("{XML_DECL}{XLSX_STYLES}"))?;
    pkg.finish()
}

// ── PPTX ─────────────────────────────────────────────────────────────────────

/// 16:9 slide, 10 in × 5.625 in, in EMU.
const SLIDE_EMU: (u64, u64) = (9_144_000, 5_143_500);
/// Half an inch in EMU.
const TEXT_BOX_OFFSET: u64 = 457_200;
/// Text size in hundredths of a point.
const TEXT_SIZE: u32 = 1400;

const NS_DRAWING: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PRESENTATION: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const REL_THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";

const EMPTY_GROUP: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

const THEME: &str = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#;

fn slide_xml(lines: &[String]) -> String {
    let mut shapes = String::new();
    if !lines.is_empty() {
        let (sw, sh) = SLIDE_EMU;
        let (cx, cy) = (sw * 9 / 10, sh * 9 / 10);
        let off = TEXT_BOX_OFFSET;
        let mut paragraphs = String::new();
        for line in lines {
            paragraphs.push_str(&format!(
                r#"<a:p><a:r><a:rPr lang="en-US" sz="{TEXT_SIZE}" dirty="0"><a:solidFill><a:srgbClr val="000000"/></a:solidFill></a:rPr><a:t>{}</a:t></a:r></a:p>"#,
                xml_text(line)
            ));
        }
        shapes = format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Text 0"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{off}" y="{off}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#
        );
    }
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_DRAWING}" xmlns:r="{NS_OFFICE_REL}" xmlns:p="{NS_PRESENTATION}"><p:cSld><p:spTree>{EMPTY_GROUP}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

/// One slide per entry, each holding its lines in a single text box.
///
/// An empty slice still produces a valid deck with one blank slide.
pub fn build_pptx(slides: &[Vec<String>]) -> Result<Vec<u8>, StrategyError> {
    let blank = [Vec::new()];
    let slides = if slides.is_empty() { &blank[..] } else { slides };
    let (sw, sh) = SLIDE_EMU;

    let mut overrides: Vec<(String, &str)> = vec![
        (
            "/ppt/presentation.xml".into(),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml",
        ),
        (
            "/ppt/slideMasters/slideMaster1.xml".into(),
            "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml",
        ),
        (
            "/ppt/slideLayouts/slideLayout1.xml".into(),
            "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml",
        ),
        (
            "/ppt/theme/theme1.xml".into(),
            "application/vnd.openxmlformats-officedocument.theme+xml",
        ),
    ];
    for n in 1..=slides.len() {
        overrides.push((
            format!("/ppt/slides/slide{n}.xml"),
            "application/vnd.openxmlformats-officedocument.presentationml.slide+xml",
        ));
    }

    // rId1 is the master; slides follow from rId2.
    let mut pres_rels: Vec<(String, &str, String)> =
        vec![("rId1".into(), REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml".into())];
    let mut slide_ids = String::new();
    for n in 1..=slides.len() {
        let rid = format!("rId{}", n + 1);
        slide_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="{rid}"/>"#, 255 + n));
        pres_rels.push((rid, REL_SLIDE, format!("slides/slide{n}.xml")));
    }
    let pres_rels: Vec<(&str, &str, &str)> = pres_rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();

    let presentation = format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_DRAWING}" xmlns:r="{NS_OFFICE_REL}" xmlns:p="{NS_PRESENTATION}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{sw}" cy="{sh}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    );
    let master = format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_DRAWING}" xmlns:r="{NS_OFFICE_REL}" xmlns:p="{NS_PRESENTATION}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{EMPTY_GROUP}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    );
    let layout = format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_DRAWING}" xmlns:r="{NS_OFFICE_REL}" xmlns:p="{NS_PRESENTATION}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{EMPTY_GROUP}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    );

    let mut pkg = Package::new();
    pkg.add("[Content_Types].xml", &content_types(&overrides))?;
    pkg.add(
        "_rels/.rels",
        &relationships(&[("rId1", REL_OFFICE_DOCUMENT, "ppt/presentation.xml")]),
    )?;
    pkg.add("ppt/presentation.xml", &presentation)?;
    pkg.add("ppt/_rels/presentation.xml.rels", &relationships(&pres_rels))?;
    pkg.add("ppt/slideMasters/slideMaster1.xml", &master)?;
    pkg.add(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &relationships(&[
            ("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
            ("rId2", REL_THEME, "../theme/theme1.xml"),
        ]),
    )?;
    pkg.add("ppt/slideLayouts/slideLayout1.xml", &layout)?;
    pkg.add(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &relationships(&[("rId1", REL_SLIDE_MASTER, "../slideMasters/slideMaster1.xml")]),
    )?;
    pkg.add("ppt/theme/theme1.xml", &format!("{XML_DECL}{THEME}"))?;

    for (i, lines) in slides.iter().enumerate() {
        let n = i + 1;
        pkg.add(&format!("ppt/slides/slide{n}.xml"), &slide_xml(lines))?;
        pkg.add(
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            &relationships(&[("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml")]),
        )?;
    }
    pkg.finish()
}
