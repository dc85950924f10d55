//! Access-log line parsing.
//!
//! [`LineParser`] turns one raw line into a [`HitRecord`] using the grammar
//! registered for its [`LogFormat`]. A structural mismatch is a per-line
//! error; callers log it and move on.

pub mod generated;
pub mod grammar;
pub mod regex_error;
pub mod regex_patterns;
pub mod timestamp;

use crate::domain::HitRecord;
use grammar::{Grammar, HitField};
use regex_error::RegexError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use grammar::{GRAMMARS, grammar_for};
pub use timestamp::{TimestampError, normalize_to_hms, normalize_to_wire_format};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),

    #[error("Empty line")]
    EmptyLine,

    #[error("Line does not match the {format} grammar")]
    GrammarMismatch { format: &'static str },

    #[error("Expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Request URL is empty")]
    EmptyUrl,

    #[error("Invalid status code '{0}'")]
    InvalidStatus(String),

    #[error("Pattern error: {0}")]
    Pattern(String),
}

impl From<RegexError> for ParseError {
    fn from(error: RegexError) -> Self {
        ParseError::Pattern(error.to_string())
    }
}

/// Source log format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Nginx,
    Apache,
    Csv,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Nginx => "nginx",
            LogFormat::Apache => "apache",
            LogFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nginx" => Ok(LogFormat::Nginx),
            "apache" => Ok(LogFormat::Apache),
            "csv" => Ok(LogFormat::Csv),
            other => Err(ParseError::UnknownFormat(other.to_string())),
        }
    }
}

/// Parser bound to a single log format.
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    grammar: &'static Grammar,
}

impl LineParser {
    pub fn new(format: LogFormat) -> Result<Self, ParseError> {
        Ok(Self {
            grammar: grammar_for(format)?,
        })
    }

    pub fn format(&self) -> LogFormat {
        self.grammar.format
    }

    pub fn parse(&self, line: &str) -> Result<HitRecord, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ParseError::EmptyLine);
        }

        let values = self.grammar.split(line)?;
        build_record(self.grammar.fields, values)
    }
}

/// Parse `line` with the grammar named by `format_name`.
///
/// Unknown format names yield [`ParseError::UnknownFormat`].
pub fn parse(line: &str, format_name: &str) -> Result<HitRecord, ParseError> {
    LineParser::new(format_name.parse()?)?.parse(line)
}

fn build_record(fields: &[HitField], values: Vec<String>) -> Result<HitRecord, ParseError> {
    let mut record = HitRecord {
        ip: String::new(),
        timestamp: String::new(),
        normalized: None,
        method: String::new(),
        url: String::new(),
        protocol: String::new(),
        status: String::new(),
        size: String::new(),
        referrer: String::new(),
        user_agent: String::new(),
        host: None,
    };

    for (field, value) in fields.iter().zip(values) {
        match field {
            HitField::Ip => record.ip = value,
            HitField::Timestamp => record.timestamp = value,
            HitField::Method => record.method = value,
            HitField::Url => record.url = value,
            HitField::Protocol => record.protocol = value,
            HitField::Status => record.status = value,
            HitField::Size => record.size = value,
            HitField::Referrer => record.referrer = value,
            HitField::UserAgent => record.user_agent = value,
            HitField::Host => record.host = Some(value).filter(|host| !host.is_empty()),
        }
    }

    if record.url.is_empty() {
        return Err(ParseError::EmptyUrl);
    }
    if record.status.len() != 3 || !record.status.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidStatus(record.status));
    }

    // A timestamp outside the known layouts leaves the record usable.
    match timestamp::normalize(&record.timestamp) {
        Ok(normalized) => record.normalized = Some(normalized),
        Err(e) => tracing::debug!(error = %e, "timestamp not normalized"),
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMBINED_LINE: &str = r#"127.0.0.1 - - [10/Oct/2024:13:55:36 +0200] "GET /report.pdf HTTP/1.1" 200 512 "-" "curl/8.0""#;

    #[test]
    fn test_combined_fields_map_verbatim() {
        let hit = parse(COMBINED_LINE, "nginx").unwrap();

        assert_eq!(hit.ip, "127.0.0.1");
        assert_eq!(hit.timestamp, "10/Oct/2024:13:55:36 +0200");
        assert_eq!(hit.method, "GET");
        assert_eq!(hit.url, "/report.pdf");
        assert_eq!(hit.protocol, "HTTP/1.1");
        assert_eq!(hit.status, "200");
        assert_eq!(hit.size, "512");
        assert_eq!(hit.referrer, "-");
        assert_eq!(hit.user_agent, "curl/8.0");
        assert_eq!(hit.host, None);
        assert_eq!(
            hit.normalized.map(|ts| ts.wire_format()),
            Some("2024-10-10 13:55:36".to_string())
        );
    }

    #[test]
    fn test_nginx_and_apache_share_grammar() {
        assert_eq!(
            parse(COMBINED_LINE, "nginx").unwrap(),
            parse(COMBINED_LINE, "apache").unwrap()
        );
    }

    #[test]
    fn test_unknown_format() {
        assert_eq!(
            parse(COMBINED_LINE, "iis"),
            Err(ParseError::UnknownFormat("iis".to_string()))
        );
    }

    #[test]
    fn test_structural_mismatches_are_rejected() {
        let parser = LineParser::new(LogFormat::Nginx).unwrap();
        let bad_lines = [
            "",
            "   ",
            // missing user agent
            r#"127.0.0.1 - - [10/Oct/2024:13:55:36 +0200] "GET / HTTP/1.1" 200 512 "-""#,
            // unterminated request quote
            r#"127.0.0.1 - - [10/Oct/2024:13:55:36 +0200] "GET / HTTP/1.1 200 512 "-" "curl/8.0""#,
            // unterminated timestamp bracket
            r#"127.0.0.1 - - [10/Oct/2024:13:55:36 +0200 "GET / HTTP/1.1" 200 512 "-" "curl/8.0""#,
            // status is not three digits
            r#"127.0.0.1 - - [10/Oct/2024:13:55:36 +0200] "GET / HTTP/1.1" 2000 512 "-" "curl/8.0""#,
            // non-numeric size
            r#"127.0.0.1 - - [10/Oct/2024:13:55:36 +0200] "GET / HTTP/1.1" 200 - "-" "curl/8.0""#,
        ];

        for line in bad_lines {
            assert!(parser.parse(line).is_err(), "expected rejection: {line}");
        }
    }

    #[test]
    fn test_unnormalizable_timestamp_keeps_record() {
        let line = r#"127.0.0.1 - - [yesterday] "GET /page HTTP/1.1" 404 0 "-" "curl/8.0""#;
        let hit = parse(line, "apache").unwrap();

        assert_eq!(hit.url, "/page");
        assert_eq!(hit.status, "404");
        assert!(hit.normalized.is_none());
    }

    #[test]
    fn test_csv_record() {
        let line = r#"2024-10-10 13:55:36 UTC, GET, www.example.com, /docs/guide.pdf, 200, 192.0.2.7, https://search.example/,"Mozilla/5.0 (Windows NT 10.0, Win64)""#;
        let hit = parse(line, "csv").unwrap();

        assert_eq!(hit.timestamp, "2024-10-10 13:55:36 UTC");
        assert_eq!(hit.method, "GET");
        assert_eq!(hit.host.as_deref(), Some("www.example.com"));
        assert_eq!(hit.url, "/docs/guide.pdf");
        assert_eq!(hit.status, "200");
        assert_eq!(hit.ip, "192.0.2.7");
        assert_eq!(hit.referrer, "https://search.example/");
        assert_eq!(hit.protocol, "");
        assert_eq!(hit.size, "");
        assert_eq!(
            hit.normalized.map(|ts| ts.hms()),
            Some((13, 55, 36))
        );
    }

    #[test]
    fn test_csv_rejects_empty_url_and_bad_status() {
        let parser = LineParser::new(LogFormat::Csv).unwrap();

        assert_eq!(
            parser.parse("2024-10-10 13:55:36 UTC,GET,host,,200,1.2.3.4,-,ua"),
            Err(ParseError::EmptyUrl)
        );
        assert_eq!(
            parser.parse("2024-10-10 13:55:36 UTC,GET,host,/a,OK,1.2.3.4,-,ua"),
            Err(ParseError::InvalidStatus("OK".to_string()))
        );
    }

    #[test]
    fn test_log_format_round_trips_names() {
        for name in ["nginx", "apache", "csv"] {
            assert_eq!(name.parse::<LogFormat>().unwrap().as_str(), name);
        }
    }
}
