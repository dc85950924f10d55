//! Per-format grammar table.
//!
//! A grammar is a field splitter plus the ordered list of hit fields its
//! output maps onto. Supporting a new source format means adding a table
//! entry, not new control flow.

use super::generated::{VALIDATED_PATTERNS, pattern_index};
use super::{LogFormat, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitField {
    Ip,
    Timestamp,
    Method,
    Url,
    Protocol,
    Status,
    Size,
    Referrer,
    UserAgent,
    Host,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSplitter {
    /// Capture groups of a build-validated pattern, in group order
    Pattern(usize),
    /// One delimited record; quoted fields allowed, leading whitespace trimmed
    Delimited(u8),
}

#[derive(Debug)]
pub struct Grammar {
    pub format: LogFormat,
    pub splitter: FieldSplitter,
    pub fields: &'static [HitField],
}

const COMBINED_FIELDS: &[HitField] = &[
    HitField::Ip,
    HitField::Timestamp,
    HitField::Method,
    HitField::Url,
    HitField::Protocol,
    HitField::Status,
    HitField::Size,
    HitField::Referrer,
    HitField::UserAgent,
];

const TABULAR_FIELDS: &[HitField] = &[
    HitField::Timestamp,
    HitField::Method,
    HitField::Host,
    HitField::Url,
    HitField::Status,
    HitField::Ip,
    HitField::Referrer,
    HitField::UserAgent,
];

pub static GRAMMARS: &[Grammar] = &[
    Grammar {
        format: LogFormat::Nginx,
        splitter: FieldSplitter::Pattern(pattern_index::COMBINED_ACCESS),
        fields: COMBINED_FIELDS,
    },
    Grammar {
        format: LogFormat::Apache,
        splitter: FieldSplitter::Pattern(pattern_index::COMBINED_ACCESS),
        fields: COMBINED_FIELDS,
    },
    Grammar {
        format: LogFormat::Csv,
        splitter: FieldSplitter::Delimited(b','),
        fields: TABULAR_FIELDS,
    },
];

/// Grammar registered for `format`.
pub fn grammar_for(format: LogFormat) -> Result<&'static Grammar, ParseError> {
    GRAMMARS
        .iter()
        .find(|grammar| grammar.format == format)
        .ok_or_else(|| ParseError::UnknownFormat(format.as_str().to_string()))
}

impl Grammar {
    /// Split `line` into raw field values, one per entry in `self.fields`.
    pub fn split(&self, line: &str) -> Result<Vec<String>, ParseError> {
        let values = match self.splitter {
            FieldSplitter::Pattern(index) => split_by_pattern(index, line, self.format)?,
            FieldSplitter::Delimited(delimiter) => split_delimited(delimiter, line)?,
        };

        if values.len() != self.fields.len() {
            return Err(ParseError::FieldCount {
                expected: self.fields.len(),
                found: values.len(),
            });
        }

        Ok(values)
    }
}

fn split_by_pattern(index: usize, line: &str, format: LogFormat) -> Result<Vec<String>, ParseError> {
    let regex = VALIDATED_PATTERNS.get(index)?;
    let captures = regex.captures(line).ok_or(ParseError::GrammarMismatch {
        format: format.as_str(),
    })?;

    captures
        .iter()
        .skip(1)
        .map(|group| {
            group
                .map(|m| m.as_str().to_string())
                .ok_or(ParseError::GrammarMismatch {
                    format: format.as_str(),
                })
        })
        .collect()
}

fn split_delimited(delimiter: u8, line: &str) -> Result<Vec<String>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    let found = reader
        .read_record(&mut record)
        .map_err(|e| ParseError::MalformedRecord(e.to_string()))?;
    if !found {
        return Err(ParseError::EmptyLine);
    }

    // A single log line must hold exactly one record
    let mut trailing = csv::StringRecord::new();
    if reader
        .read_record(&mut trailing)
        .map_err(|e| ParseError::MalformedRecord(e.to_string()))?
    {
        return Err(ParseError::MalformedRecord(
            "more than one record on a single line".to_string(),
        ));
    }

    Ok(record
        .iter()
        .map(|field| field.trim_start().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_has_a_grammar() {
        for format in [LogFormat::Nginx, LogFormat::Apache, LogFormat::Csv] {
            let grammar = grammar_for(format).unwrap();
            assert_eq!(grammar.format, format);
        }
    }

    #[test]
    fn test_combined_split_yields_nine_fields() {
        let grammar = grammar_for(LogFormat::Nginx).unwrap();
        let line = r#"10.0.0.1 - - [01/Jan/2024:12:00:00 +0000] "GET /a?b=c HTTP/2.0" 301 0 "https://ref.example/" "Mozilla/5.0 (X11; Linux x86_64)""#;

        let values = grammar.split(line).unwrap();
        assert_eq!(
            values,
            vec![
                "10.0.0.1",
                "01/Jan/2024:12:00:00 +0000",
                "GET",
                "/a?b=c",
                "HTTP/2.0",
                "301",
                "0",
                "https://ref.example/",
                "Mozilla/5.0 (X11; Linux x86_64)",
            ]
        );
    }

    #[test]
    fn test_delimited_split_trims_leading_whitespace_only() {
        let values = split_delimited(b',', "a,  b ,\tc").unwrap();
        assert_eq!(values, vec!["a", "b ", "c"]);
    }

    #[test]
    fn test_delimited_split_honours_quotes() {
        let values = split_delimited(b',', r#"x,"Mozilla/5.0 (a, b)", y"#).unwrap();
        assert_eq!(values, vec!["x", "Mozilla/5.0 (a, b)", "y"]);
    }

    #[test]
    fn test_delimited_field_count_mismatch() {
        let grammar = grammar_for(LogFormat::Csv).unwrap();
        let err = grammar.split("2024-10-10 13:55:36 UTC,GET,/only").unwrap_err();
        assert_eq!(
            err,
            ParseError::FieldCount {
                expected: 8,
                found: 3
            }
        );
    }
}
