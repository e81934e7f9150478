//! Parsing of `gstat` batch-mode output lines.
//!
//! `gstat -pdosCI <tick>` emits one CSV header line followed by one data line
//! per GEOM provider per tick. Each data line carries a fixed 19-column schema.

use chrono::NaiveDateTime;
use thiserror::Error;

/// First column of the header line gstat repeats before each batch.
pub const HEADER_TOKEN: &str = "timestamp";

/// Number of comma-separated columns in one `gstat -pdosCI` data row.
pub const FIELD_COUNT: usize = 19;

/// gstat prints local wall-clock time with second precision; a fractional
/// suffix may follow and is discarded.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors for lines that do not match the expected schema. The pipeline
/// discards the offending line and keeps running.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected {FIELD_COUNT} columns, got {0}")]
    ColumnCount(usize),

    #[error("bad timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },

    #[error("bad numeric value in column {column}: {value:?}")]
    Numeric { column: &'static str, value: String },
}

/// One parsed row of per-device statistics for one sampling tick.
///
/// Values are carried exactly as gstat reported them; no unit conversion.
/// The metric names keep gstat-exporter's historical spelling
/// (`miliseconds`), the field names here do not.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub timestamp: NaiveDateTime,
    pub name: String,
    pub queue_depth: f64,
    pub total_ops_per_second: f64,
    pub read_ops_per_second: f64,
    pub read_size_kilobytes: f64,
    pub read_kilobytes_per_second: f64,
    pub ms_per_read: f64,
    pub write_ops_per_second: f64,
    pub write_size_kilobytes: f64,
    pub write_kilobytes_per_second: f64,
    pub ms_per_write: f64,
    pub delete_ops_per_second: f64,
    pub delete_size_kilobytes: f64,
    pub delete_kilobytes_per_second: f64,
    pub ms_per_delete: f64,
    pub other_ops_per_second: f64,
    pub ms_per_other: f64,
    pub percent_busy: f64,
}

fn numeric(column: &'static str, value: &str) -> Result<f64, ParseError> {
    value.trim().parse().map_err(|_| ParseError::Numeric {
        column,
        value: value.to_string(),
    })
}

fn timestamp(value: &str) -> Result<NaiveDateTime, ParseError> {
    // Truncate an optional ".123456" suffix to second precision.
    let seconds = value.split('.').next().unwrap_or(value);
    NaiveDateTime::parse_from_str(seconds, TIMESTAMP_FORMAT).map_err(|source| {
        ParseError::Timestamp {
            value: value.to_string(),
            source,
        }
    })
}

/// Parses one line of the gstat stream.
///
/// Returns `Ok(None)` for the header line, `Ok(Some(record))` for a data
/// line, and `Err` for anything that does not match the 19-column schema.
pub fn parse_line(line: &str) -> Result<Option<SampleRecord>, ParseError> {
    let columns: Vec<&str> = line.trim_end().split(',').collect();

    if columns.first() == Some(&HEADER_TOKEN) {
        return Ok(None);
    }
    if columns.len() != FIELD_COUNT {
        return Err(ParseError::ColumnCount(columns.len()));
    }

    // Named-field decode: a schema change fails loudly here instead of
    // silently misassigning columns downstream.
    Ok(Some(SampleRecord {
        timestamp: timestamp(columns[0])?,
        name: columns[1].to_string(),
        queue_depth: numeric("queue_depth", columns[2])?,
        total_ops_per_second: numeric("total_ops_per_second", columns[3])?,
        read_ops_per_second: numeric("read_ops_per_second", columns[4])?,
        read_size_kilobytes: numeric("read_size_kilobytes", columns[5])?,
        read_kilobytes_per_second: numeric("read_kilobytes_per_second", columns[6])?,
        ms_per_read: numeric("ms_per_read", columns[7])?,
        write_ops_per_second: numeric("write_ops_per_second", columns[8])?,
        write_size_kilobytes: numeric("write_size_kilobytes", columns[9])?,
        write_kilobytes_per_second: numeric("write_kilobytes_per_second", columns[10])?,
        ms_per_write: numeric("ms_per_write", columns[11])?,
        delete_ops_per_second: numeric("delete_ops_per_second", columns[12])?,
        delete_size_kilobytes: numeric("delete_size_kilobytes", columns[13])?,
        delete_kilobytes_per_second: numeric("delete_kilobytes_per_second", columns[14])?,
        ms_per_delete: numeric("ms_per_delete", columns[15])?,
        other_ops_per_second: numeric("other_ops_per_second", columns[16])?,
        ms_per_other: numeric("ms_per_other", columns[17])?,
        percent_busy: numeric("percent_busy", columns[18])?,
    }))
}
