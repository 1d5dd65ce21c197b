//! XLSX workbook that spills sheet rows to disk and serializes into any sink

use indexmap::IndexMap;
use std::io::Write;
use std::ops::RangeInclusive;

use super::streaming_zip_writer::StreamingZipWriter;
use super::worksheet::SpillWorksheet;
use super::xml_writer::XmlWriter;
use super::{DocumentWriter, RowRef, SheetId};
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::types::{CellStyle, CellValue};

const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
const MAX_SHEET_NAME_CHARS: usize = 31;
/// The ZIP entry count bounds how many sheets a package can hold
const MAX_SHEET_SEQUENCE: u32 = u16::MAX as u32;

/// XLSX document writer.
///
/// Sheets are kept in creation order. Each sheet buffers at most `flush_threshold` rows;
/// the rest live in its spill file until [`DocumentWriter::serialize`] streams the package
/// into the sink.
pub struct XlsxWorkbook {
    sheets: IndexMap<String, SpillWorksheet>,
    flush_threshold: usize,
    max_rows: u32,
    compression_level: u32,
}

impl XlsxWorkbook {
    fn sheet_mut(&mut self, sheet: SheetId) -> Result<&mut SpillWorksheet> {
        self.sheets
            .get_index_mut(sheet.0)
            .map(|(_, ws)| ws)
            .ok_or(ExportError::UnknownSheet(sheet.0))
    }

    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        let length = name.chars().count();
        if length == 0 || length > MAX_SHEET_NAME_CHARS {
            return Err(ExportError::InvalidSheetName(format!(
                "'{}' must be 1-{} characters",
                name, MAX_SHEET_NAME_CHARS
            )));
        }
        if name.contains(&INVALID_SHEET_NAME_CHARS[..]) || name.starts_with('\'') || name.ends_with('\'')
        {
            return Err(ExportError::InvalidSheetName(format!(
                "'{}' contains a character not allowed in sheet names",
                name
            )));
        }
        // sheet names are case-insensitive in XLSX
        let lowered = name.to_lowercase();
        if self.sheets.keys().any(|k| k.to_lowercase() == lowered) {
            return Err(ExportError::DuplicateSheet(name.to_string()));
        }
        Ok(())
    }

    fn write_content_types<W: Write>(&self, zip: &mut StreamingZipWriter<W>) -> Result<()> {
        zip.start_entry("[Content_Types].xml")?;
        let mut xml = XmlWriter::new(zip);
        xml.write_str(XML_DECLARATION)?;
        xml.write_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#,
        )?;
        for i in 1..=self.sheets.len() {
            xml.write_str("\n<Override PartName=\"/xl/worksheets/sheet")?;
            xml.write_int(i)?;
            xml.write_str(".xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>")?;
        }
        xml.write_str("\n</Types>")?;
        xml.into_inner()?;
        Ok(())
    }

    fn write_root_rels<W: Write>(zip: &mut StreamingZipWriter<W>) -> Result<()> {
        zip.start_entry("_rels/.rels")?;
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;
        zip.write_data(xml.as_bytes())
    }

    fn write_core_props<W: Write>(zip: &mut StreamingZipWriter<W>) -> Result<()> {
        zip.start_entry("docProps/core.xml")?;
        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let mut xml = XmlWriter::new(zip);
        xml.write_str(XML_DECLARATION)?;
        xml.write_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>tablestream</dc:creator>
<dcterms:created xsi:type="dcterms:W3CDTF">"#)?;
        xml.write_str(&created)?;
        xml.write_str("</dcterms:created>\n<dcterms:modified xsi:type=\"dcterms:W3CDTF\">")?;
        xml.write_str(&created)?;
        xml.write_str("</dcterms:modified>\n</cp:coreProperties>")?;
        xml.into_inner()?;
        Ok(())
    }

    fn write_app_props<W: Write>(zip: &mut StreamingZipWriter<W>) -> Result<()> {
        zip.start_entry("docProps/app.xml")?;
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>tablestream</Application>
</Properties>"#;
        zip.write_data(xml.as_bytes())
    }

    fn write_workbook_xml<W: Write>(&self, zip: &mut StreamingZipWriter<W>) -> Result<()> {
        zip.start_entry("xl/workbook.xml")?;
        let mut xml = XmlWriter::new(zip);

        xml.write_str(XML_DECLARATION)?;
        xml.start_element("workbook")?;
        xml.attribute("xmlns", SPREADSHEETML_NS)?;
        xml.attribute("xmlns:r", RELATIONSHIPS_NS)?;
        xml.close_start_tag()?;

        xml.start_element("sheets")?;
        xml.close_start_tag()?;
        for (i, name) in self.sheets.keys().enumerate() {
            let sheet_id = i + 1;
            xml.start_element("sheet")?;
            xml.attribute("name", name)?;
            xml.attribute_int("sheetId", sheet_id)?;
            xml.attribute("r:id", &format!("rId{}", sheet_id))?;
            xml.close_empty_element()?;
        }
        xml.end_element("sheets")?;
        xml.end_element("workbook")?;
        xml.into_inner()?;
        Ok(())
    }

    fn write_workbook_rels<W: Write>(&self, zip: &mut StreamingZipWriter<W>) -> Result<()> {
        zip.start_entry("xl/_rels/workbook.xml.rels")?;
        let mut xml = XmlWriter::new(zip);

        xml.write_str(XML_DECLARATION)?;
        xml.start_element("Relationships")?;
        xml.attribute("xmlns", PACKAGE_RELATIONSHIPS_NS)?;
        xml.close_start_tag()?;

        let sheet_count = self.sheets.len();
        for rid in 1..=sheet_count {
            xml.start_element("Relationship")?;
            xml.attribute("Id", &format!("rId{}", rid))?;
            xml.attribute("Type", &format!("{}/worksheet", RELATIONSHIPS_NS))?;
            xml.attribute("Target", &format!("worksheets/sheet{}.xml", rid))?;
            xml.close_empty_element()?;
        }

        xml.start_element("Relationship")?;
        xml.attribute("Id", &format!("rId{}", sheet_count + 1))?;
        xml.attribute("Type", &format!("{}/styles", RELATIONSHIPS_NS))?;
        xml.attribute("Target", "styles.xml")?;
        xml.close_empty_element()?;

        xml.start_element("Relationship")?;
        xml.attribute("Id", &format!("rId{}", sheet_count + 2))?;
        xml.attribute("Type", &format!("{}/sharedStrings", RELATIONSHIPS_NS))?;
        xml.attribute("Target", "sharedStrings.xml")?;
        xml.close_empty_element()?;

        xml.end_element("Relationships")?;
        xml.into_inner()?;
        Ok(())
    }

    // cellXfs order must match CellStyle::index()
    fn write_styles<W: Write>(zip: &mut StreamingZipWriter<W>) -> Result<()> {
        zip.start_entry("xl/styles.xml")?;
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1">
<font><sz val="11"/><name val="Calibri"/></font>
</fonts>
<fills count="2">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
</fills>
<borders count="1">
<border><left/><right/><top/><bottom/><diagonal/></border>
</borders>
<cellStyleXfs count="1">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
</cellStyleXfs>
<cellXfs count="2">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment horizontal="center" vertical="center" wrapText="1"/></xf>
</cellXfs>
<cellStyles count="1">
<cellStyle name="Normal" xfId="0" builtinId="0"/>
</cellStyles>
</styleSheet>"#;
        zip.write_data(xml.as_bytes())
    }

    fn write_shared_strings<W: Write>(zip: &mut StreamingZipWriter<W>) -> Result<()> {
        // text is written inline, the table only has to exist
        zip.start_entry("xl/sharedStrings.xml")?;
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="0" uniqueCount="0"/>"#;
        zip.write_data(xml.as_bytes())
    }
}

impl DocumentWriter for XlsxWorkbook {
    fn create(config: &ExportConfig) -> Result<Self> {
        let config = config.clone().normalized();
        let workbook = XlsxWorkbook {
            sheets: IndexMap::new(),
            flush_threshold: config.flush_threshold,
            max_rows: config.max_rows,
            compression_level: config.compression_level,
        };
        // every name rotation can produce must be valid, not just the first
        workbook.validate_sheet_name(&config.sheet_name(MAX_SHEET_SEQUENCE))?;
        Ok(workbook)
    }

    fn create_sheet(&mut self, name: &str) -> Result<SheetId> {
        self.validate_sheet_name(name)?;
        let worksheet = SpillWorksheet::new(name, self.flush_threshold, self.max_rows);
        let (index, _) = self.sheets.insert_full(name.to_string(), worksheet);
        log::debug!("created sheet '{}' (#{})", name, index + 1);
        Ok(SheetId(index))
    }

    fn create_row(&mut self, sheet: SheetId, offset: u32) -> Result<RowRef> {
        self.sheet_mut(sheet)?.create_row(offset)?;
        Ok(RowRef { sheet, offset })
    }

    fn set_row_style(&mut self, row: RowRef, style: CellStyle) -> Result<()> {
        self.sheet_mut(row.sheet)?.set_row_style(row.offset, style)
    }

    fn write_cell(
        &mut self,
        row: RowRef,
        column: u16,
        value: &CellValue,
        style: CellStyle,
    ) -> Result<()> {
        self.sheet_mut(row.sheet)?
            .write_cell(row.offset, column, value, style)
    }

    fn merge_region(
        &mut self,
        sheet: SheetId,
        rows: RangeInclusive<u32>,
        columns: RangeInclusive<u16>,
    ) -> Result<()> {
        self.sheet_mut(sheet)?.merge(rows, columns)
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    fn serialize<W: Write>(self, sink: W) -> Result<()> {
        let mut zip = StreamingZipWriter::new(sink, self.compression_level);

        self.write_content_types(&mut zip)?;
        Self::write_root_rels(&mut zip)?;
        Self::write_core_props(&mut zip)?;
        Self::write_app_props(&mut zip)?;
        self.write_workbook_xml(&mut zip)?;
        self.write_workbook_rels(&mut zip)?;
        Self::write_styles(&mut zip)?;
        Self::write_shared_strings(&mut zip)?;

        for (i, (name, worksheet)) in self.sheets.into_iter().enumerate() {
            log::debug!(
                "serializing sheet '{}' ({} rows, {} from disk)",
                name,
                worksheet.row_count(),
                worksheet.spilled_rows()
            );
            zip.start_entry(&format!("xl/worksheets/sheet{}.xml", i + 1))?;
            let mut xml = XmlWriter::new(&mut zip);
            worksheet.write_xml(&mut xml)?;
            xml.into_inner()?;
        }

        zip.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook(max_rows: u32) -> XlsxWorkbook {
        let config = ExportConfig {
            max_rows,
            ..ExportConfig::default()
        };
        XlsxWorkbook::create(&config).unwrap()
    }

    #[test]
    fn test_sheet_names_validated() {
        let mut wb = workbook(10);
        assert!(wb.create_sheet("Sheet_1").is_ok());
        assert!(matches!(
            wb.create_sheet("sheet_1"),
            Err(ExportError::DuplicateSheet(_))
        ));
        assert!(matches!(
            wb.create_sheet("a/b"),
            Err(ExportError::InvalidSheetName(_))
        ));
        assert!(matches!(
            wb.create_sheet(&"x".repeat(32)),
            Err(ExportError::InvalidSheetName(_))
        ));
        assert_eq!(wb.sheet_names(), vec!["Sheet_1".to_string()]);
    }

    #[test]
    fn test_unknown_sheet() {
        let mut wb = workbook(10);
        assert!(matches!(
            wb.create_row(SheetId(3), 0),
            Err(ExportError::UnknownSheet(3))
        ));
    }

    #[test]
    fn test_capacity_per_sheet() {
        let mut wb = workbook(1);
        let first = wb.create_sheet("A").unwrap();
        let second = wb.create_sheet("B").unwrap();
        wb.create_row(first, 0).unwrap();
        assert!(wb.create_row(first, 1).unwrap_err().is_capacity_exceeded());
        wb.create_row(second, 0).unwrap();
        assert_eq!(wb.sheets["A"].row_count(), 1);
        assert_eq!(wb.sheet_names(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_base_name_checked_for_last_sequence() {
        let config = |base: &str| ExportConfig {
            sheet_base_name: base.to_string(),
            ..ExportConfig::default()
        };
        assert!(XlsxWorkbook::create(&config(&"x".repeat(25))).is_ok());
        assert!(matches!(
            XlsxWorkbook::create(&config(&"x".repeat(26))),
            Err(ExportError::InvalidSheetName(_))
        ));
        assert!(matches!(
            XlsxWorkbook::create(&config("a:b")),
            Err(ExportError::InvalidSheetName(_))
        ));
    }

    #[test]
    fn test_serialize_contains_all_parts() {
        let mut wb = workbook(10);
        let sheet = wb.create_sheet("Data & More").unwrap();
        let row = wb.create_row(sheet, 0).unwrap();
        wb.write_cell(row, 0, &CellValue::Number(1), CellStyle::Default)
            .unwrap();

        let mut output = Vec::new();
        wb.serialize(&mut output).unwrap();

        let archive = zip::ZipArchive::new(std::io::Cursor::new(output)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "docProps/app.xml",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/styles.xml",
            "xl/sharedStrings.xml",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(names.contains(&part), "missing {}", part);
        }
    }
}
