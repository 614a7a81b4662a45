//! Turn an uploaded payload into a table or plain document text.
//!
//! Delimited text and spreadsheets become a [`Table`]. PDF, DOCX and plain
//! text files become document text, which only the narrative path can use.

use crate::error::{QueryError, Result};
use crate::table::{Column, Table, Value};
use std::io::Cursor;
use tracing::info;

/// Supported payload formats, detected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// .csv, .tsv
    Delimited(u8),
    /// .xlsx, .xls, .xlsm, .ods
    Spreadsheet,
    /// .pdf
    Pdf,
    /// .docx
    Docx,
    /// .txt, .md
    PlainText,
}

/// Result of loading a payload
#[derive(Debug, Clone)]
pub enum Loaded {
    Table(Table),
    Document(String),
}

pub fn detect_format(file_name: &str) -> Option<PayloadFormat> {
    let ext = file_name.rsplit_once('.').map(|(_, e)| e.to_lowercase())?;

    match ext.as_str() {
        "csv" => Some(PayloadFormat::Delimited(b',')),
        "tsv" => Some(PayloadFormat::Delimited(b'\t')),
        "xlsx" | "xls" | "xlsm" | "ods" => Some(PayloadFormat::Spreadsheet),
        "pdf" => Some(PayloadFormat::Pdf),
        "docx" => Some(PayloadFormat::Docx),
        "txt" | "md" => Some(PayloadFormat::PlainText),
        _ => None,
    }
}

/// Load a payload. Headers are returned as found; normalization happens when
/// the table enters a session.
pub fn load_bytes(file_name: &str, bytes: &[u8]) -> Result<Loaded> {
    let format = detect_format(file_name)
        .ok_or_else(|| QueryError::Load(format!("unsupported file type: {}", file_name)))?;

    let loaded = match format {
        PayloadFormat::Delimited(sep) => Loaded::Table(load_delimited(bytes, sep)?),
        PayloadFormat::Spreadsheet => Loaded::Table(load_spreadsheet(bytes)?),
        PayloadFormat::Pdf => Loaded::Document(extract_pdf(bytes)?),
        PayloadFormat::Docx => Loaded::Document(extract_docx(bytes)?),
        PayloadFormat::PlainText => Loaded::Document(String::from_utf8_lossy(bytes).into_owned()),
    };

    match &loaded {
        Loaded::Table(t) => info!(
            "loaded {} as table: {} rows, {} columns",
            file_name,
            t.row_count(),
            t.width()
        ),
        Loaded::Document(text) => info!(
            "loaded {} as document: {} chars",
            file_name,
            text.chars().count()
        ),
    }
    Ok(loaded)
}

pub fn load_delimited(bytes: &[u8], delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| QueryError::Load(format!("CSV header: {}", e)))?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(i, h))
        .collect();
    if headers.is_empty() {
        return Err(QueryError::Load("CSV has no header row".to_string()));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| QueryError::Load(format!("CSV: {}", e)))?;
        // Short rows are padded, extra cells dropped
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| Column::from_raw(name, &raw))
        .collect();
    Table::new(columns)
}

/// First worksheet, first row as headers.
pub fn load_spreadsheet(bytes: &[u8]) -> Result<Table> {
    use calamine::{open_workbook_auto_from_rs, Reader};

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| QueryError::Load(format!("spreadsheet: {}", e)))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| QueryError::Load("spreadsheet has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| QueryError::Load(format!("sheet {}: {}", sheet, e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| QueryError::Load(format!("sheet {} is empty", sheet)))?
        .iter()
        .enumerate()
        .map(|(i, c)| header_name(i, &cell_to_value(c).to_string()))
        .collect();

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(row.get(i).map(cell_to_value).unwrap_or(Value::Missing));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Table::new(columns)
}

/// Blank header cells get a position-based name, e.g. `unnamed_3`
fn header_name(index: usize, raw: &str) -> String {
    if raw.trim().is_empty() {
        format!("unnamed_{}", index)
    } else {
        raw.to_string()
    }
}

fn cell_to_value(cell: &calamine::Data) -> Value {
    use calamine::Data;
    match cell {
        Data::Empty => Value::Missing,
        Data::String(s) if s.trim().is_empty() => Value::Missing,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(n) => Value::Number(*n as f64),
        Data::Float(f) => Value::Number(*f),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::Error(e) => Value::Text(format!("#ERR({:?})", e)),
        Data::DateTime(dt) => Value::Text(format!("{}", dt)),
        Data::DateTimeIso(s) => Value::Text(s.clone()),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    // pdf-extract can panic on malformed PDFs
    let data = bytes.to_vec();
    let result = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&data));

    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(QueryError::Load(format!("PDF: {}", e))),
        Err(_) => Err(QueryError::Load(
            "PDF extraction panicked (malformed file)".to_string(),
        )),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    // DOCX is a ZIP archive; the body text lives in <w:t> runs of word/document.xml
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| QueryError::Load(format!("DOCX zip: {}", e)))?;
    let doc = archive
        .by_name("word/document.xml")
        .map_err(|e| QueryError::Load(format!("DOCX missing document.xml: {}", e)))?;

    let mut reader = quick_xml::Reader::from_reader(std::io::BufReader::new(doc));
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                if let Ok(s) = e.unescape() {
                    text.push_str(&s);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(QueryError::Load(format!("DOCX XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
