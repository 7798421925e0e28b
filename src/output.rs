//! Output formatting and persistence for rides and fleet views.
//!
//! Supports pretty-printing, JSON serialization, and appending trip receipts
//! to a CSV ledger.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

use crate::trip::TripReceipt;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs any value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs any value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a [`TripReceipt`] as a row to a CSV ledger.
///
/// Creates the file with headers if it does not already exist.
pub fn append_receipt(path: &str, receipt: &TripReceipt) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending receipt");

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(receipt)?;
    writer.flush()?;

    Ok(())
}

/// Reads every receipt back from a ledger.
pub fn read_receipts(path: &str) -> Result<Vec<TripReceipt>> {
    let mut reader = csv::Reader::from_path(path)?;
    let receipts = reader.deserialize().collect::<Result<Vec<TripReceipt>, _>>()?;
    Ok(receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::FleetStats;
    use crate::trip::{PaymentMethod, PaymentStatus};
    use chrono::{TimeZone, Utc};
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn receipt() -> TripReceipt {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        TripReceipt {
            trip_id: "t-1".to_string(),
            user_id: "u-1".to_string(),
            bike_id: "b-1".to_string(),
            bike_code: "BK-0001".to_string(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(10),
            duration_minutes: 10,
            distance_km: 2.0,
            cost_etb: 9.0,
            payment_method: PaymentMethod::Wallet,
            payment_status: PaymentStatus::Pending,
        }
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&FleetStats::default());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&FleetStats::default()).unwrap();
    }

    #[test]
    fn test_append_receipt_creates_file() {
        let path = temp_path("bisklet_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        append_receipt(&path, &receipt()).unwrap();

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("wallet"));
        assert!(content.contains("pending"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_receipt_writes_header_once() {
        let path = temp_path("bisklet_test_header.csv");
        let _ = fs::remove_file(&path);

        append_receipt(&path, &receipt()).unwrap();
        append_receipt(&path, &receipt()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("trip_id")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_receipts_back() {
        let path = temp_path("bisklet_test_read.csv");
        let _ = fs::remove_file(&path);

        append_receipt(&path, &receipt()).unwrap();
        let receipts = read_receipts(&path).unwrap();

        assert_eq!(receipts, vec![receipt()]);

        fs::remove_file(&path).unwrap();
    }
}
