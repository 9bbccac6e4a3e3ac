use crate::error::ImportError;
use crate::models::RawWatchRecord;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Reads and parses a viewing-history export from disk.
pub fn read_history_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawWatchRecord>, ImportError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ImportError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_history(&text)
}

/// Parses the export text into one record per non-blank data line, in order.
///
/// Only a missing or empty header line is an error. Short or malformed data
/// lines are filled with empty strings and zeros and still emitted.
pub fn parse_history(text: &str) -> Result<Vec<RawWatchRecord>, ImportError> {
    let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let header_line = lines
        .next()
        .map(|l| l.trim_start_matches('\u{feff}'))
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ImportError::Parse("missing header line".to_string()))?;

    let headers: Vec<String> = split_line(header_line)
        .iter()
        .map(|h| normalize_header(h))
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::Parse("header line has no column names".to_string()));
    }
    debug!("History headers: {:?}", headers);

    let mut records = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let values = split_line(line);
        let row: HashMap<&str, &str> = headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                (
                    header.as_str(),
                    values.get(index).map(String::as_str).unwrap_or(""),
                )
            })
            .collect();

        records.push(record_from_row(&row));
    }

    info!("Parsed {} watch records", records.len());
    Ok(records)
}

fn record_from_row(row: &HashMap<&str, &str>) -> RawWatchRecord {
    let field = |name: &str| row.get(name).copied().unwrap_or("");

    let title = match field("name") {
        "" => field("title"),
        name => name,
    };
    let watched_date = match field("watcheddate") {
        "" => field("date"),
        date => date,
    };
    let review = field("review");

    RawWatchRecord {
        title: title.to_string(),
        year: parse_int_lenient(field("year")),
        rating: parse_float_lenient(field("rating")),
        watched_date: watched_date.to_string(),
        rewatch: matches!(
            field("rewatch").to_ascii_lowercase().as_str(),
            "yes" | "true" | "1"
        ),
        review: (!review.is_empty()).then(|| review.to_string()),
    }
}

/// Splits one line on the delimiter, honoring double-quoted sections.
///
/// A quote toggles the quoted state; a doubled quote inside a quoted section
/// is a literal quote. Fields are trimmed.
pub fn split_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            QUOTE if in_quotes && chars.peek() == Some(&QUOTE) => {
                current.push(QUOTE);
                chars.next();
            }
            QUOTE => in_quotes = !in_quotes,
            DELIMITER if !in_quotes => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    values.push(current.trim().to_string());
    values
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != QUOTE)
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parses like JavaScript `parseFloat`: the longest numeric prefix wins, else 0.
fn parse_float_lenient(raw: &str) -> f64 {
    let raw = raw.trim();
    raw.parse::<f64>()
        .ok()
        .or_else(|| numeric_prefix(raw, true).parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parses like JavaScript `parseInt`: the longest integer prefix wins, else 0.
fn parse_int_lenient(raw: &str) -> i32 {
    let raw = raw.trim();
    raw.parse::<i32>()
        .ok()
        .or_else(|| numeric_prefix(raw, false).parse::<i32>().ok())
        .unwrap_or(0)
}

fn numeric_prefix(raw: &str, allow_fraction: bool) -> &str {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in raw.char_indices() {
        let accepted = match c {
            '+' | '-' => i == 0,
            '0'..='9' => true,
            '.' if allow_fraction && !seen_dot => {
                seen_dot = true;
                true
            }
            _ => false,
        };
        if !accepted {
            break;
        }
        end = i + c.len_utf8();
    }
    &raw[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTERBOXD_EXPORT: &str = "Date,Name,Year,Letterboxd URI,Rating\n\
        2021-01-01,\"Se7en, Director's Cut\",1995,https://boxd.it/a,4.5\n\
        \n\
        2021-01-02,Alien,1979,https://boxd.it/b,5\n";

    #[test]
    fn test_record_count_and_order() {
        let records = parse_history(LETTERBOXD_EXPORT).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Se7en, Director's Cut");
        assert_eq!(records[1].title, "Alien");
        assert_eq!(records[0].year, 1995);
        assert_eq!(records[0].rating, 4.5);
        assert_eq!(records[0].watched_date, "2021-01-01");
    }

    #[test]
    fn test_quoted_delimiter_stays_in_field() {
        let fields = split_line("\"Se7en, Director's Cut\",1995,4.5,2021-01-01");
        assert_eq!(
            fields,
            vec!["Se7en, Director's Cut", "1995", "4.5", "2021-01-01"]
        );
    }

    #[test]
    fn test_doubled_quote_is_literal() {
        let fields = split_line("\"The \"\"Best\"\" Movie\",2000");
        assert_eq!(fields, vec!["The \"Best\" Movie", "2000"]);
    }

    #[test]
    fn test_header_normalization() {
        let text = "\" Name \",\"Year\",Rating,Watched Date,Rewatch,Review\r\n\
                    Heat,1995,4,2022-05-05,Yes,Great shootout\r\n";
        let records = parse_history(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Heat");
        assert_eq!(records[0].watched_date, "2022-05-05");
        assert!(records[0].rewatch);
        assert_eq!(records[0].review.as_deref(), Some("Great shootout"));
    }

    #[test]
    fn test_missing_fields_default() {
        let text = "Name,Year,Rating,Date\nLonely\n";
        let records = parse_history(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Lonely");
        assert_eq!(records[0].year, 0);
        assert_eq!(records[0].rating, 0.0);
        assert_eq!(records[0].watched_date, "");
        assert!(!records[0].rewatch);
        assert_eq!(records[0].review, None);
    }

    #[test]
    fn test_permissive_numbers() {
        assert_eq!(parse_float_lenient("4.5"), 4.5);
        assert_eq!(parse_float_lenient("3.5 stars"), 3.5);
        assert_eq!(parse_float_lenient("n/a"), 0.0);
        assert_eq!(parse_float_lenient(""), 0.0);
        assert_eq!(parse_float_lenient("inf"), 0.0);
        assert_eq!(parse_int_lenient("1999"), 1999);
        assert_eq!(parse_int_lenient("1999.7"), 1999);
        assert_eq!(parse_int_lenient("unknown"), 0);
    }

    #[test]
    fn test_missing_header_is_error() {
        assert!(matches!(parse_history(""), Err(ImportError::Parse(_))));
        assert!(matches!(
            parse_history("   \nAlien,1979"),
            Err(ImportError::Parse(_))
        ));
    }

    #[test]
    fn test_header_only_yields_nothing() {
        let records = parse_history("Name,Year,Rating,Date\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_bom_is_stripped() {
        let records = parse_history("\u{feff}Name,Year\nAlien,1979").unwrap();
        assert_eq!(records[0].title, "Alien");
        assert_eq!(records[0].year, 1979);
    }

    #[test]
    fn test_unreadable_file() {
        let result = read_history_file("/definitely/not/here.csv");
        assert!(matches!(result, Err(ImportError::UnreadableFile { .. })));
    }
}
