use super::{Table, Value};
use crate::{Error, Result};
use tracing::debug;

/// Delimiters considered when sniffing, in tie-break order.
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Number of non-blank lines inspected when sniffing.
const SNIFF_LINES: usize = 20;

/// Cell texts read as missing values, the markers common CSV exporters emit.
const MISSING_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Parses uploaded CSV content into a table.
///
/// The delimiter is sniffed from the leading lines first. When nothing can
/// be sniffed, or the sniffed delimiter does not yield a rectangular table,
/// the content is parsed again as plain comma-separated text.
///
/// Empty cells and the usual missing-value markers (`NA`, `NaN`, `null`, ...)
/// become [`Value::Null`] and are written back as empty fields.
pub fn read_table(bytes: &[u8]) -> Result<Table> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::bad_request(format!("unparseable file: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    if let Some(delimiter) = sniff_delimiter(text) {
        match parse_with(text, delimiter) {
            Ok(table) => return Ok(table),
            Err(e) => debug!(
                "Parsing with sniffed delimiter {:?} failed, retrying with comma: {}",
                delimiter as char, e
            ),
        }
    }

    parse_with(text, b',').map_err(|e| Error::bad_request(format!("unparseable file: {e}")))
}

/// Serializes a table as comma-separated text with a header row.
pub fn write_table(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(Value::to_string))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::internal(format!("failed to flush CSV output: {e}")))
}

/// Picks the candidate that occurs the same, non-zero number of times on
/// every sampled line. Higher counts win; earlier candidates win ties.
pub fn sniff_delimiter(text: &str) -> Option<u8> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if lines.is_empty() {
        return None;
    }

    let mut best: Option<(u8, usize)> = None;
    for delimiter in CANDIDATE_DELIMITERS {
        let first = count_unquoted(lines[0], delimiter);
        if first == 0 {
            continue;
        }
        if lines[1..]
            .iter()
            .any(|line| count_unquoted(line, delimiter) != first)
        {
            continue;
        }
        if best.is_none_or(|(_, count)| first > count) {
            best = Some((delimiter, first));
        }
    }

    best.map(|(delimiter, _)| delimiter)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

fn parse_with(text: &str, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(Error::bad_request("No columns to parse from file"));
    }

    let mut table = Table::new(dedupe_columns(headers.iter()))?;
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                if is_missing(field) {
                    Value::Null
                } else {
                    Value::Text(field.to_string())
                }
            })
            .collect();
        table.push_row(row)?;
    }

    Ok(table)
}

fn is_missing(field: &str) -> bool {
    field.is_empty() || MISSING_MARKERS.contains(&field)
}

/// Repeated header names get a `.N` suffix so every column stays addressable.
fn dedupe_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        let mut n = 1;
        while columns.contains(&name) {
            name = format!("{header}.{n}");
            n += 1;
        }
        columns.push(name);
    }
    columns
}
