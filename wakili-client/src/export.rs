//! Client-side document export.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// The date an export taken at `now` is named after: the UTC calendar day,
/// so the same instant gives the same file name in every time zone.
pub fn export_date<Tz: TimeZone>(now: DateTime<Tz>) -> NaiveDate {
    now.with_timezone(&Utc).date_naive()
}

/// `legal_document_<YYYY-MM-DD>.txt`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("legal_document_{}.txt", date.format("%Y-%m-%d"))
}

/// Write `document` as plain text into `dir`, creating it if needed.
/// An existing export for the same date is overwritten.
pub async fn write_document(dir: &Path, date: NaiveDate, document: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(export_file_name(date));
    tokio::fs::write(&path, document).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2023, 11, 4).unwrap();
        assert_eq!(export_file_name(date), "legal_document_2023-11-04.txt");
    }

    #[test]
    fn export_date_is_the_utc_day() {
        let evening_in_new_york = chrono::FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 11, 14, 21, 30, 0)
            .unwrap();
        let date = export_date(evening_in_new_york);
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
        assert_eq!(export_file_name(date), "legal_document_2023-11-15.txt");

        let morning_in_nairobi = chrono::FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 11, 15, 1, 0, 0)
            .unwrap();
        assert_eq!(
            export_date(morning_in_nairobi),
            NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()
        );
    }

    #[tokio::test]
    async fn writes_into_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports");
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let path = write_document(&target, date, "NON-DISCLOSURE AGREEMENT")
            .await
            .unwrap();
        assert_eq!(path, target.join("legal_document_2024-01-15.txt"));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "NON-DISCLOSURE AGREEMENT"
        );
    }
}
