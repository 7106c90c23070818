//! CSV ingestion for the Our World in Data COVID-19 table.

use crate::error::{InsightsError, Result};
use crate::table::{Record, Table};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of parsing: the table plus the rows that had to be dropped.
#[derive(Debug)]
pub struct ParsedTable {
    pub table: Table,
    pub skipped_rows: usize,
}

/// Deserializes CSV rows by header name.
///
/// Unknown columns are ignored and empty cells become `None`. A row that
/// cannot be deserialized (bad date, non-numeric cell) is skipped; the
/// header itself must be readable.
pub fn parse_table<R: Read>(reader: R, source: &str) -> Result<ParsedTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    rdr.headers()
        .map_err(|source_err| InsightsError::Unparseable {
            path: source.to_string(),
            source: source_err,
        })?;

    let mut records = Vec::new();
    let mut skipped_rows = 0usize;

    for (line, result) in rdr.deserialize::<Record>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped_rows += 1;
                debug!(row = line + 1, error = %e, "Skipping unparseable row");
            }
        }
    }

    if skipped_rows > 0 {
        warn!(source, skipped_rows, "Some rows could not be parsed");
    }

    Ok(ParsedTable {
        table: Table::new(records),
        skipped_rows,
    })
}

/// Loads the table from a `.csv` or `.csv.gz` file.
///
/// # Errors
///
/// [`InsightsError::MissingInput`] when the file does not exist or yields no
/// usable rows, [`InsightsError::Unparseable`] when its header is unreadable.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_table(path: &Path) -> Result<ParsedTable> {
    if !path.exists() {
        return Err(InsightsError::MissingInput(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let file = BufReader::new(File::open(path)?);
    let source = path.display().to_string();

    let parsed = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        debug!("Decompressing gzip input");
        parse_table(GzDecoder::new(file), &source)?
    } else {
        parse_table(file, &source)?
    };

    if parsed.table.is_empty() {
        return Err(InsightsError::MissingInput(format!(
            "{} contains no usable rows",
            source
        )));
    }

    info!(
        rows = parsed.table.len(),
        skipped = parsed.skipped_rows,
        "Table loaded"
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::env;
    use std::fs;
    use std::io::Write;

    const SAMPLE: &str = "\
iso_code,continent,location,date,total_cases,new_cases,total_deaths,new_deaths,population,extra_column
KEN,Africa,Kenya,2022-11-01,343999.0,12.0,5689.0,0.0,54027484.0,x
OWID_WRL,,World,2022-11-01,630000000.0,,6580000.0,,7975105024.0,y
";

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_parse_reads_known_columns_and_ignores_others() {
        let parsed = parse_table(SAMPLE.as_bytes(), "sample").unwrap();
        assert_eq!(parsed.skipped_rows, 0);

        let records = parsed.table.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].country, "Kenya");
        assert_eq!(records[0].total_cases, Some(343999.0));
        assert_eq!(records[0].total_deaths, Some(5689.0));
        // absent column
        assert_eq!(records[0].people_fully_vaccinated, None);
        // empty cell
        assert_eq!(records[1].new_cases, None);
        assert!(records[1].is_aggregate());
    }

    #[test]
    fn test_parse_skips_malformed_rows() {
        let csv = "\
location,date,total_cases
Kenya,2022-11-01,10
Kenya,not-a-date,11
Kenya,2022-11-03,abc
Kenya,2022-11-04,12
";
        let parsed = parse_table(csv.as_bytes(), "malformed").unwrap();
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.skipped_rows, 2);
    }

    #[test]
    fn test_load_missing_file_is_missing_input() {
        let path = temp_path("covid_insights_does_not_exist.csv");
        let _ = fs::remove_file(&path);

        let err = load_table(&path).unwrap_err();
        assert!(matches!(err, InsightsError::MissingInput(_)));
    }

    #[test]
    fn test_load_header_only_file_is_missing_input() {
        let path = temp_path("covid_insights_header_only.csv");
        fs::write(&path, "location,date,total_cases\n").unwrap();

        let err = load_table(&path).unwrap_err();
        assert!(matches!(err, InsightsError::MissingInput(_)));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_gzip_input() {
        let path = temp_path("covid_insights_sample.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let parsed = load_table(&path).unwrap();
        assert_eq!(parsed.table.len(), 2);

        fs::remove_file(&path).unwrap();
    }
}
