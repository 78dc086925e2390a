//! Landing of spreadsheet exports as dated TSV files.
//!
//! Files are named `<prefix>_<YYYYMMDD>.tsv` and written through a temporary
//! name, so the loader never picks up a half-written file.

use crate::error::{PipelineError, Result};
use crate::models::LandedFile;
use crate::validation::InputValidator;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use regex::Regex;
use std::fs::{self, create_dir_all, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// File name for a landed export.
#[must_use]
pub fn landed_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.tsv", prefix, date.format("%Y%m%d"))
}

/// Field values read as missing, the default null markers of the
/// spreadsheet tooling the exports are analysed with. They land as empty
/// fields and therefore load as NULL.
pub const NULL_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA",
    "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// True when the field is empty or a null marker.
#[must_use]
pub fn is_null_field(field: &str) -> bool {
    field.is_empty() || NULL_TOKENS.contains(&field)
}

/// Copy of the record with every null marker replaced by an empty field.
#[must_use]
pub fn blank_nulls(record: &StringRecord) -> StringRecord {
    record
        .iter()
        .map(|field| if is_null_field(field) { "" } else { field })
        .collect()
}

/// True when every field of the record is empty or a null marker.
#[must_use]
pub fn is_empty_record(record: &StringRecord) -> bool {
    record.iter().all(is_null_field)
}

/// Parse CSV text and write it as TSV under `raw_dir`.
///
/// Fields are kept as the exact text of the export, except null markers
/// ([`NULL_TOKENS`]) which become empty. Rows whose fields are all empty are
/// discarded, short rows are padded to the header width.
pub fn land_csv(csv_text: &str, prefix: &str, raw_dir: &Path, date: NaiveDate) -> Result<LandedFile> {
    InputValidator::validate_file_prefix(prefix)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(PipelineError::EmptyHeader(prefix.to_string()));
    }

    create_dir_all(raw_dir)?;
    let path = raw_dir.join(landed_file_name(prefix, date));
    let tmp_path = path.with_extension("tsv.tmp");

    let counts = write_tsv(&mut reader, &headers, &tmp_path, prefix);
    let (rows, dropped) = match counts {
        Ok(counts) => counts,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };
    fs::rename(&tmp_path, &path)?;

    info!(path = %path.display(), rows, dropped, "Landed {} rows", rows);
    Ok(LandedFile { path, rows, dropped })
}

/// Copy non-empty records to a tab-delimited file; returns (written, dropped)
fn write_tsv(
    reader: &mut csv::Reader<&[u8]>,
    headers: &StringRecord,
    path: &Path,
    prefix: &str,
) -> Result<(usize, usize)> {
    let width = headers.len();
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(headers)?;

    let mut rows = 0;
    let mut dropped = 0;
    for (index, record) in reader.records().enumerate() {
        let mut record = blank_nulls(&record?);
        if is_empty_record(&record) {
            dropped += 1;
            continue;
        }
        if record.len() > width {
            // Line 1 is the header
            return Err(PipelineError::Validation(format!(
                "{prefix}: row {} has {} fields, header has {width}",
                index + 2,
                record.len()
            )));
        }
        while record.len() < width {
            record.push_field("");
        }
        writer.write_record(&record)?;
        rows += 1;
    }

    writer.flush()?;
    Ok((rows, dropped))
}

fn landed_file_pattern(prefix: &str) -> Result<Regex> {
    InputValidator::validate_file_prefix(prefix)?;
    Regex::new(&format!(r"^{}_(\d{{8}})\.tsv$", regex::escape(prefix)))
        .map_err(|e| PipelineError::Validation(e.to_string()))
}

/// Find the most recently dated landed file for `prefix`.
///
/// The date stamp in the name decides; files with the same stamp are ordered
/// by modification time. A missing directory counts as no file.
pub fn latest_landed_file(raw_dir: &Path, prefix: &str) -> Result<PathBuf> {
    let pattern = landed_file_pattern(prefix)?;
    let no_file = || PipelineError::NoInputFile {
        prefix: prefix.to_string(),
        dir: raw_dir.to_path_buf(),
    };

    let entries = match fs::read_dir(raw_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(no_file()),
        Err(e) => return Err(e.into()),
    };

    let mut best: Option<(NaiveDate, SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(captures) = pattern.captures(name) else { continue };
        let Ok(date) = InputValidator::parse_date_stamp(&captures[1]) else {
            debug!(file = name, "Skipping file with invalid date stamp");
            continue;
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let candidate = (date, modified, entry.path());
        if best.as_ref().map_or(true, |b| (candidate.0, candidate.1) > (b.0, b.1)) {
            best = Some(candidate);
        }
    }

    best.map(|(_, _, path)| path).ok_or_else(no_file)
}

/// Column names from the header row of a landed TSV file.
pub fn read_tsv_header(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(PipelineError::EmptyHeader(path.display().to_string()));
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_landed_file_name() {
        assert_eq!(
            landed_file_name("whatsapp_messages", date(2025, 3, 7)),
            "whatsapp_messages_20250307.tsv"
        );
    }

    #[test]
    fn test_land_csv_drops_empty_rows_and_keeps_text() {
        let dir = tempdir().unwrap();
        let csv = "id,content,external_timestamp\n1,\"hi, there\",01/02/2025 10:00\n,,\n\n002,,\n";

        let landed = land_csv(csv, "whatsapp_messages", dir.path(), date(2025, 1, 2)).unwrap();
        assert_eq!(landed.rows, 2);
        assert_eq!(landed.dropped, 1);

        let written = fs::read_to_string(&landed.path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "id\tcontent\texternal_timestamp");
        assert_eq!(lines[1], "1\thi, there\t01/02/2025 10:00");
        // Leading zeros survive: no type inference
        assert_eq!(lines[2], "002\t\t");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_land_csv_blanks_null_markers() {
        let dir = tempdir().unwrap();
        let landed = land_csv("id,uuid\nNA,NA\n2,NULL\n3,None\n", "whatsapp_statuses", dir.path(), date(2025, 1, 2))
            .unwrap();
        assert_eq!(landed.rows, 2);
        assert_eq!(landed.dropped, 1);

        let written = fs::read_to_string(&landed.path).unwrap();
        assert_eq!(written, "id\tuuid\n2\t\n3\t\n");
    }

    #[test]
    fn test_null_markers_are_exact_matches() {
        assert!(is_null_field("N/A"));
        assert!(is_null_field("#N/A"));
        assert!(is_null_field("<NA>"));
        assert!(!is_null_field(" NA"));
        assert!(!is_null_field("na"));
        assert!(!is_null_field("Null"));
        assert!(!is_null_field("0"));
    }

    #[test]
    fn test_land_csv_pads_short_rows() {
        let dir = tempdir().unwrap();
        let landed = land_csv("a,b,c\n1\n", "whatsapp_statuses", dir.path(), date(2025, 1, 2)).unwrap();
        let written = fs::read_to_string(&landed.path).unwrap();
        assert_eq!(written.lines().nth(1), Some("1\t\t"));
    }

    #[test]
    fn test_land_csv_rejects_long_rows() {
        let dir = tempdir().unwrap();
        let err = land_csv("a,b\n1,2,3\n", "whatsapp_statuses", dir.path(), date(2025, 1, 2)).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        // No temporary file left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_land_csv_rejects_missing_header() {
        let dir = tempdir().unwrap();
        let err = land_csv("", "whatsapp_statuses", dir.path(), date(2025, 1, 2)).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyHeader(_)));
    }

    #[test]
    fn test_latest_landed_file_prefers_latest_stamp() {
        let dir = tempdir().unwrap();
        for name in [
            "whatsapp_messages_20250101.tsv",
            "whatsapp_messages_20250315.tsv",
            "whatsapp_messages_20250210.tsv",
            "whatsapp_statuses_20251231.tsv",
            "whatsapp_messages_20251231.tsv.tmp",
            "whatsapp_messages_latest.tsv",
        ] {
            fs::write(dir.path().join(name), "id\n").unwrap();
        }

        let latest = latest_landed_file(dir.path(), "whatsapp_messages").unwrap();
        assert_eq!(latest.file_name().unwrap(), "whatsapp_messages_20250315.tsv");
    }

    #[test]
    fn test_latest_landed_file_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("whatsapp_statuses_20250101.tsv"), "id\n").unwrap();

        let err = latest_landed_file(dir.path(), "whatsapp_messages").unwrap_err();
        assert!(matches!(err, PipelineError::NoInputFile { .. }));

        let err = latest_landed_file(&dir.path().join("absent"), "whatsapp_messages").unwrap_err();
        assert!(matches!(err, PipelineError::NoInputFile { .. }));
    }

    #[test]
    fn test_read_tsv_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("whatsapp_statuses_20250101.tsv");
        fs::write(&path, "id\tstatus\ttimestamp\n1\tread\t\n").unwrap();
        assert_eq!(read_tsv_header(&path).unwrap(), vec!["id", "status", "timestamp"]);
    }
}
