//! In-place workbook update: rewrite only the managed worksheets of an
//! existing xlsx package.
//!
//! Every other part of the archive (foreign worksheets, shared strings,
//! pivot caches, charts, drawings) is copied through byte for byte. Managed
//! sheets that already exist keep their part and their sheet name; missing
//! ones are appended. Sheet names are compared ASCII case-insensitively, as
//! Excel does. Managed cells use inline strings so the shared string table
//! is never touched; `styles.xml` only gains a bold and a date cell format.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::IoError;
use crate::publish::write_atomic;
use crate::xlsx::{Cell, SheetData};

const CONTENT_TYPES: &str = "[Content_Types].xml";
const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

const WORKSHEET_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Built-in short date number format.
const DATE_NUM_FMT: u32 = 14;

// =============================================================================
// Package structure
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct SheetEntry {
    name: String,
    sheet_id: u32,
    rid: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Relationship {
    id: String,
    kind: String,
    target: String,
}

/// `<sheet>` entries of workbook.xml plus the prefix bound to the
/// relationships namespace (normally `r`).
struct WorkbookIndex {
    sheets: Vec<SheetEntry>,
    rel_prefix: String,
}

/// A managed sheet that did not exist yet.
struct NewSheet {
    name: String,
    sheet_id: u32,
    rid: String,
    part: String,
}

/// Cell format indices appended to `styles.xml`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct StyleIds {
    bold: Option<usize>,
    date: Option<usize>,
}

/// Unescape the predefined XML entities.
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn attr_text(value: &[u8]) -> String {
    unescape_xml(&String::from_utf8_lossy(value))
}

/// `x:` for `x:sheets`, empty for `sheets`.
fn prefix_of(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.find(':') {
        Some(i) => name[..=i].to_string(),
        None => String::new(),
    }
}

/// Relationship target → archive path. Targets are relative to `xl/`
/// unless absolute.
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_string(),
        None => format!("xl/{target}"),
    }
}

fn parse_workbook(xml: &str) -> Result<WorkbookIndex, String> {
    let mut reader = Reader::from_str(xml);
    let mut index = WorkbookIndex {
        sheets: Vec::new(),
        rel_prefix: "r".to_string(),
    };
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(ref e) if e.local_name().as_ref() == b"workbook" => {
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    if let Some(prefix) = key.strip_prefix("xmlns:") {
                        if attr.value.ends_with(b"relationships") {
                            index.rel_prefix = prefix.to_string();
                        }
                    }
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                let rid_key = format!("{}:id", index.rel_prefix);
                let mut name = None;
                let mut sheet_id = 0;
                let mut rid = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(attr_text(&attr.value)),
                        b"sheetId" => sheet_id = attr_text(&attr.value).parse().unwrap_or(0),
                        key if key == rid_key.as_bytes() => rid = Some(attr_text(&attr.value)),
                        _ => {}
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    index.sheets.push(SheetEntry { name, sheet_id, rid });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(index)
}

fn parse_rels(xml: &str) -> Result<Vec<Relationship>, String> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut kind = String::new();
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr_text(&attr.value)),
                        b"Type" => kind = attr_text(&attr.value),
                        b"Target" => target = Some(attr_text(&attr.value)),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    rels.push(Relationship { id, kind, target });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

// =============================================================================
// Rewriting package XML
// =============================================================================

/// Copy `xml` event by event. `skip` removes empty elements; `before_end`
/// is called with the element's prefix just before the closing tag of the
/// element named `end`, to append children.
fn rewrite<D, A>(xml: &str, end: &[u8], skip: D, mut before_end: A) -> Result<Vec<u8>, String>
where
    D: Fn(&BytesStart) -> bool,
    A: FnMut(&str, &mut Writer<Vec<u8>>) -> Result<(), String>,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match &event {
            Event::Eof => break,
            Event::Empty(e) if skip(e) => continue,
            Event::End(e) if e.local_name().as_ref() == end => {
                before_end(&prefix_of(e.name().as_ref()), &mut writer)?;
            }
            _ => {}
        }
        writer.write_event(event).map_err(|e| e.to_string())?;
    }
    Ok(writer.into_inner())
}

fn empty_element(
    writer: &mut Writer<Vec<u8>>,
    tag: String,
    attrs: &[(&str, &str)],
) -> Result<(), String> {
    let mut el = BytesStart::new(tag);
    for attr in attrs {
        el.push_attribute(*attr);
    }
    writer.write_event(Event::Empty(el)).map_err(|e| e.to_string())
}

fn rewrite_workbook(xml: &str, rel_prefix: &str, added: &[NewSheet]) -> Result<Vec<u8>, String> {
    let rid_key = format!("{rel_prefix}:id");
    rewrite(xml, b"sheets", |_| false, |prefix, writer| {
        for sheet in added {
            let sheet_id = sheet.sheet_id.to_string();
            empty_element(
                writer,
                format!("{prefix}sheet"),
                &[
                    ("name", sheet.name.as_str()),
                    ("sheetId", sheet_id.as_str()),
                    (rid_key.as_str(), sheet.rid.as_str()),
                ],
            )?;
        }
        Ok(())
    })
}

fn rewrite_rels(xml: &str, added: &[NewSheet]) -> Result<Vec<u8>, String> {
    let is_calc_chain = |e: &BytesStart| {
        e.local_name().as_ref() == b"Relationship"
            && e.attributes()
                .flatten()
                .any(|a| a.key.as_ref() == b"Type" && a.value.ends_with(b"/calcChain"))
    };
    rewrite(xml, b"Relationships", is_calc_chain, |prefix, writer| {
        for sheet in added {
            let target = sheet.part.strip_prefix("xl/").unwrap_or(&sheet.part);
            empty_element(
                writer,
                format!("{prefix}Relationship"),
                &[("Id", sheet.rid.as_str()), ("Type", WORKSHEET_REL), ("Target", target)],
            )?;
        }
        Ok(())
    })
}

fn rewrite_content_types(
    xml: &str,
    calc_chain: Option<&str>,
    added: &[NewSheet],
) -> Result<Vec<u8>, String> {
    let calc_chain = calc_chain.map(|p| format!("/{p}"));
    let is_calc_chain = |e: &BytesStart| {
        e.local_name().as_ref() == b"Override"
            && e.attributes().flatten().any(|a| {
                a.key.as_ref() == b"PartName"
                    && calc_chain.as_deref().map(str::as_bytes) == Some(&*a.value)
            })
    };
    rewrite(xml, b"Types", is_calc_chain, |prefix, writer| {
        for sheet in added {
            let part_name = format!("/{}", sheet.part);
            empty_element(
                writer,
                format!("{prefix}Override"),
                &[("PartName", part_name.as_str()), ("ContentType", WORKSHEET_CONTENT_TYPE)],
            )?;
        }
        Ok(())
    })
}

/// `<tag count="n">` → `<tag count="n + by">`.
fn bump_count(e: &BytesStart, by: usize) -> BytesStart<'static> {
    let mut out = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"count" {
            let n: usize = attr_text(&attr.value).parse().unwrap_or(0);
            out.push_attribute(("count", (n + by).to_string().as_str()));
        } else {
            out.push_attribute(attr);
        }
    }
    out
}

/// Append a bold font and two cell formats (bold text, short date) to
/// styles.xml. Existing indices are unchanged.
fn add_styles(xml: &str) -> Result<(Vec<u8>, StyleIds), String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut ids = StyleIds::default();
    let mut bold_font = None;
    let (mut in_fonts, mut in_xfs) = (false, false);
    let (mut fonts, mut xfs) = (0usize, 0usize);

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match &event {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"fonts" => {
                in_fonts = true;
                writer
                    .write_event(Event::Start(bump_count(e, 1)))
                    .map_err(|e| e.to_string())?;
                continue;
            }
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                in_xfs = true;
                let added = 1 + usize::from(bold_font.is_some());
                writer
                    .write_event(Event::Start(bump_count(e, added)))
                    .map_err(|e| e.to_string())?;
                continue;
            }
            Event::Start(e) | Event::Empty(e) if in_fonts && e.local_name().as_ref() == b"font" => {
                fonts += 1;
            }
            Event::Start(e) | Event::Empty(e) if in_xfs && e.local_name().as_ref() == b"xf" => {
                xfs += 1;
            }
            Event::End(e) if e.local_name().as_ref() == b"fonts" => {
                in_fonts = false;
                let p = prefix_of(e.name().as_ref());
                writer
                    .get_mut()
                    .extend_from_slice(format!("<{p}font><{p}b/></{p}font>").as_bytes());
                bold_font = Some(fonts);
            }
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => {
                in_xfs = false;
                let tag = format!("{}xf", prefix_of(e.name().as_ref()));
                if let Some(font) = bold_font {
                    let font = font.to_string();
                    empty_element(
                        &mut writer,
                        tag.clone(),
                        &[
                            ("numFmtId", "0"),
                            ("fontId", font.as_str()),
                            ("fillId", "0"),
                            ("borderId", "0"),
                            ("xfId", "0"),
                            ("applyFont", "1"),
                        ],
                    )?;
                    ids.bold = Some(xfs);
                    xfs += 1;
                }
                let num_fmt = DATE_NUM_FMT.to_string();
                empty_element(
                    &mut writer,
                    tag,
                    &[
                        ("numFmtId", num_fmt.as_str()),
                        ("fontId", "0"),
                        ("fillId", "0"),
                        ("borderId", "0"),
                        ("xfId", "0"),
                        ("applyNumberFormat", "1"),
                    ],
                )?;
                ids.date = Some(xfs);
            }
            _ => {}
        }
        writer.write_event(event).map_err(|e| e.to_string())?;
    }
    Ok((writer.into_inner(), ids))
}

// =============================================================================
// Worksheet XML
// =============================================================================

/// 0 → `A`, 25 → `Z`, 26 → `AA`.
fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn style_attr(style: Option<usize>) -> String {
    style.map(|s| format!(r#" s="{s}""#)).unwrap_or_default()
}

fn escape_text(s: &str) -> Cow<'_, str> {
    if s.chars().any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r')) {
        let clean: String = s
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
            .collect();
        return Cow::Owned(quick_xml::escape::escape(clean.as_str()).into_owned());
    }
    quick_xml::escape::escape(s)
}

fn inline_string(cref: &str, text: &str, style: Option<usize>) -> String {
    format!(
        r#"<c r="{cref}" t="inlineStr"{}><is><t xml:space="preserve">{}</t></is></c>"#,
        style_attr(style),
        escape_text(text)
    )
}

fn sheet_xml(sheet: &SheetData, styles: StyleIds) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(r#"<worksheet xmlns="{MAIN_NS}"><sheetData>"#));

    for (r, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        let rn = r + 1;
        let header = sheet.bold_header && r == 0;
        xml.push_str(&format!(r#"<row r="{rn}">"#));
        for (c, cell) in row.iter().enumerate() {
            let cref = format!("{}{rn}", column_letters(c));
            let text = match cell {
                Cell::Empty => continue,
                Cell::Text(s) => inline_string(&cref, s, styles.bold.filter(|_| header)),
                Cell::Number(n) if n.is_finite() => format!(r#"<c r="{cref}"><v>{n}</v></c>"#),
                Cell::Number(n) => inline_string(&cref, &n.to_string(), None),
                Cell::Bool(b) => format!(r#"<c r="{cref}" t="b"><v>{}</v></c>"#, u8::from(*b)),
                Cell::Date(serial) => format!(
                    r#"<c r="{cref}"{}><v>{serial}</v></c>"#,
                    style_attr(styles.date)
                ),
            };
            xml.push_str(&text);
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

// =============================================================================
// Entry point
// =============================================================================

fn read_part<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Replace the managed `sheets` inside the existing workbook at `path`,
/// atomically. Returns how many other sheets were kept.
pub fn update_workbook(path: &Path, sheets: &[SheetData]) -> Result<usize, IoError> {
    let fail = |message: String| IoError::write(path, format!("existing workbook: {message}"));

    let bytes = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| fail(e.to_string()))?;

    let required = |archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str| {
        read_part(archive, name).ok_or_else(|| fail(format!("missing {name}")))
    };
    let workbook_xml = required(&mut archive, WORKBOOK)?;
    let rels_xml = required(&mut archive, WORKBOOK_RELS)?;
    let types_xml = required(&mut archive, CONTENT_TYPES)?;

    let book = parse_workbook(&workbook_xml).map_err(&fail)?;
    let rels = parse_rels(&rels_xml).map_err(&fail)?;

    let mut replaced: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut styles = StyleIds::default();
    if let Some(rel) = rels.iter().find(|r| r.kind.ends_with("/styles")) {
        let styles_path = part_path(&rel.target);
        if let Some(xml) = read_part(&mut archive, &styles_path) {
            let (xml, ids) = add_styles(&xml).map_err(&fail)?;
            replaced.insert(styles_path, xml);
            styles = ids;
        }
    }

    let existing_parts: HashSet<String> = archive.file_names().map(String::from).collect();
    let mut next_sheet_id = book.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;
    let mut next_rid = rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
        + 1;
    let mut next_part = book.sheets.len() + 1;
    let mut added: Vec<NewSheet> = Vec::new();
    let mut added_parts: Vec<(String, Vec<u8>)> = Vec::new();

    for sheet in sheets {
        let xml = sheet_xml(sheet, styles).into_bytes();
        match book.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(&sheet.name)) {
            Some(entry) => {
                let rel = rels
                    .iter()
                    .find(|r| r.id == entry.rid)
                    .ok_or_else(|| fail(format!("sheet '{}' has no relationship", entry.name)))?;
                if !rel.kind.ends_with("/worksheet") {
                    return Err(fail(format!("sheet '{}' is not a worksheet", entry.name)));
                }
                replaced.insert(part_path(&rel.target), xml);
            }
            None => {
                let part = loop {
                    let candidate = format!("xl/worksheets/sheet{next_part}.xml");
                    next_part += 1;
                    if !existing_parts.contains(&candidate) {
                        break candidate;
                    }
                };
                added.push(NewSheet {
                    name: sheet.name.clone(),
                    sheet_id: next_sheet_id,
                    rid: format!("rId{next_rid}"),
                    part: part.clone(),
                });
                added_parts.push((part, xml));
                next_sheet_id += 1;
                next_rid += 1;
            }
        }
    }

    let kept = book
        .sheets
        .iter()
        .filter(|s| !sheets.iter().any(|m| m.name.eq_ignore_ascii_case(&s.name)))
        .count();

    // calcChain may point at cells of the replaced sheets; Excel rebuilds it.
    let calc_chain = rels
        .iter()
        .find(|r| r.kind.ends_with("/calcChain"))
        .map(|r| part_path(&r.target));
    replaced.insert(WORKBOOK_RELS.to_string(), rewrite_rels(&rels_xml, &added).map_err(&fail)?);
    replaced.insert(
        CONTENT_TYPES.to_string(),
        rewrite_content_types(&types_xml, calc_chain.as_deref(), &added).map_err(&fail)?,
    );
    if !added.is_empty() {
        replaced.insert(
            WORKBOOK.to_string(),
            rewrite_workbook(&workbook_xml, &book.rel_prefix, &added).map_err(&fail)?,
        );
    }

    write_atomic(path, |tmp| {
        let werr = |e: &dyn std::fmt::Display| IoError::write(path, e);
        let file = std::fs::File::create(tmp).map_err(|e| werr(&e))?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| werr(&e))?;
            let name = entry.name().to_string();
            if calc_chain.as_deref() == Some(name.as_str()) {
                continue;
            }
            match replaced.get(&name) {
                Some(bytes) => {
                    zip.start_file(name.as_str(), options).map_err(|e| werr(&e))?;
                    zip.write_all(bytes).map_err(|e| werr(&e))?;
                }
                None => zip.raw_copy_file(entry).map_err(|e| werr(&e))?,
            }
        }
        for (name, bytes) in &added_parts {
            zip.start_file(name.as_str(), options).map_err(|e| werr(&e))?;
            zip.write_all(bytes).map_err(|e| werr(&e))?;
        }
        zip.finish().map_err(|e| werr(&e))?;
        Ok(())
    })?;

    log::debug!(
        "{}: replaced {} managed sheet(s), added {}",
        path.display(),
        sheets.len() - added.len(),
        added.len()
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    use calamine::{open_workbook_auto, Reader as _};
    use rust_xlsxwriter::{Format, Workbook};
    use tempfile::tempdir;

    fn sheet(name: &str, rows: Vec<Vec<Cell>>) -> SheetData {
        SheetData {
            name: name.into(),
            rows,
            bold_header: true,
        }
    }

    fn part_bytes(path: &Path, name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        let mut out = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    /// pivot_by_state (formula, bold cell) then a stale lowercase `matches`.
    fn operator_workbook(path: &Path) {
        let mut workbook = Workbook::new();
        let pivot = workbook.add_worksheet().set_name("pivot_by_state").unwrap();
        pivot.write_number(0, 0, 5.0).unwrap();
        pivot.write_formula(1, 0, "=A1*10").unwrap();
        pivot
            .write_string_with_format(0, 1, "by state", &Format::new().set_bold())
            .unwrap();
        let stale = workbook.add_worksheet().set_name("matches").unwrap();
        stale.write_string(0, 0, "stale").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn column_letters_roll_over() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn styles_gain_bold_and_date_formats() {
        let xml = r#"<styleSheet><fonts count="2"><font><sz val="11"/></font><font><b/></font></fonts><cellXfs count="1"><xf numFmtId="0" fontId="0"/></cellXfs></styleSheet>"#;
        let (out, ids) = add_styles(xml).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(ids, StyleIds { bold: Some(1), date: Some(2) });
        assert!(out.contains(r#"<fonts count="3">"#));
        assert!(out.contains(r#"<cellXfs count="3">"#));
        assert!(out.contains(r#"fontId="2""#));
        assert!(out.contains(r#"numFmtId="14""#));
    }

    #[test]
    fn text_is_escaped_inline() {
        let xml = sheet_xml(
            &sheet("S", vec![vec!["a & <b>".into(), Cell::Number(95.0), Cell::Bool(true)]]),
            StyleIds { bold: Some(7), date: None },
        );
        assert!(xml.contains(r#"<c r="A1" t="inlineStr" s="7"><is><t xml:space="preserve">a &amp; &lt;b&gt;</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B1"><v>95</v></c>"#));
        assert!(xml.contains(r#"<c r="C1" t="b"><v>1</v></c>"#));
    }

    #[test]
    fn foreign_sheet_survives_byte_for_byte() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        operator_workbook(&path);
        let before = part_bytes(&path, "xl/worksheets/sheet1.xml");

        let managed = [
            sheet("Matches", vec![vec!["reason".into()], vec!["both".into()]]),
            sheet("Summary", vec![vec!["Run: t".into()]]),
        ];
        let kept = update_workbook(&path, &managed).unwrap();
        assert_eq!(kept, 1);

        assert_eq!(part_bytes(&path, "xl/worksheets/sheet1.xml"), before);

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["pivot_by_state", "matches", "Summary"]);

        let formulas = workbook.worksheet_formula("pivot_by_state").unwrap();
        assert!(formulas.used_cells().any(|(_, _, f)| f.contains("A1*10")));

        let matches = workbook.worksheet_range("matches").unwrap();
        let values: Vec<String> = matches.rows().map(|r| r[0].to_string()).collect();
        assert_eq!(values, vec!["reason", "both"]);
        let summary = workbook.worksheet_range("Summary").unwrap();
        assert_eq!(summary.get_value((0, 0)).map(|v| v.to_string()), Some("Run: t".into()));
    }

    #[test]
    fn relationship_targets_resolve_under_xl() {
        let rels = r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet" Target="chartsheets/sheet1.xml"/></Relationships>"#;
        let parsed = parse_rels(rels).unwrap();
        assert!(!parsed[0].kind.ends_with("/worksheet"));
        assert_eq!(part_path(&parsed[0].target), "xl/chartsheets/sheet1.xml");
        assert_eq!(part_path("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn workbook_index_reads_names_and_prefix() {
        let xml = r#"<workbook xmlns="x" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="A &amp; B" sheetId="4" rel:id="rId9"/></sheets></workbook>"#;
        let index = parse_workbook(xml).unwrap();
        assert_eq!(index.rel_prefix, "rel");
        assert_eq!(
            index.sheets,
            vec![SheetEntry { name: "A & B".into(), sheet_id: 4, rid: "rId9".into() }]
        );
    }
}
