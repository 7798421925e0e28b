use bisklet::fleet::{
    Bike, BikeStatus, Coordinates, FilterCriteria, FleetStats, SearchScope, filter_bikes,
    find_bike, load_snapshot,
};
use bisklet::locale::{Catalog, Language, LocaleContext, MemoryPreferenceStore};
use bisklet::output::{append_receipt, read_receipts};
use bisklet::tariff::Tariff;
use bisklet::trip::{PaymentStatus, Trip, TripStatus};
use chrono::{Duration, TimeZone, Utc};

const JSON_SNAPSHOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bikes.json");
const CSV_SNAPSHOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bikes.csv");

fn available(bikes: &[Bike]) -> Vec<Bike> {
    bikes.iter().filter(|b| b.is_available()).cloned().collect()
}

fn codes(bikes: &[&Bike]) -> Vec<String> {
    bikes.iter().map(|b| b.code.clone()).collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_csv_and_json_snapshots_agree() {
    let from_json = load_snapshot(JSON_SNAPSHOT).expect("Failed to load JSON snapshot");
    let from_csv = load_snapshot(CSV_SNAPSHOT).expect("Failed to load CSV snapshot");

    assert_eq!(from_json.len(), 5);
    assert_eq!(from_json, from_csv);
    assert_eq!(from_csv[4].location_name, None);
    assert_eq!(from_csv[4].coordinates(), None);
}

#[test]
fn test_map_filters_over_snapshot() {
    let bikes = load_snapshot(JSON_SNAPSHOT).unwrap();
    let pool = available(&bikes);

    let all = filter_bikes(&pool, &FilterCriteria::default(), None);
    assert_eq!(codes(&all), ["BK-0001", "BK-0002", "BK-0003"]);

    let charged = FilterCriteria::try_new(50, 5.0, "all", "").unwrap();
    assert_eq!(codes(&filter_bikes(&pool, &charged, None)), ["BK-0001"]);

    let cruisers = FilterCriteria::try_new(0, 5.0, "City Cruiser", "").unwrap();
    assert_eq!(codes(&filter_bikes(&pool, &cruisers, None)), ["BK-0002"]);

    let bole = FilterCriteria::try_new(0, 5.0, "all", "BOLE").unwrap();
    assert_eq!(codes(&filter_bikes(&pool, &bole, None)), ["BK-0001"]);
}

#[test]
fn test_distance_filter_needs_rider_position() {
    let bikes = load_snapshot(JSON_SNAPSHOT).unwrap();
    let pool = available(&bikes);
    let near = FilterCriteria::try_new(0, 2.0, "all", "").unwrap();

    let rider = Coordinates::new(9.0, 38.76);
    assert_eq!(
        codes(&filter_bikes(&pool, &near, Some(rider))),
        ["BK-0001", "BK-0002"]
    );
    assert_eq!(filter_bikes(&pool, &near, None).len(), 3);
}

#[test]
fn test_fleet_search_covers_code_and_model() {
    let bikes = load_snapshot(JSON_SNAPSHOT).unwrap();

    let electric = FilterCriteria::try_new(0, 5.0, "all", "electric")
        .unwrap()
        .with_scope(SearchScope::Fleet);
    assert_eq!(
        codes(&filter_bikes(&bikes, &electric, None)),
        ["BK-0003", "BK-0004"]
    );

    let by_code = FilterCriteria::try_new(0, 5.0, "all", "bk-0005")
        .unwrap()
        .with_scope(SearchScope::Fleet);
    assert_eq!(codes(&filter_bikes(&bikes, &by_code, None)), ["BK-0005"]);

    let stats = FleetStats::from_bikes(&bikes);
    assert_eq!(stats.total_bikes, 5);
    assert_eq!(stats.available, 3);
    assert_eq!(stats.in_use, 1);
    assert_eq!(stats.maintenance, 1);
    assert_eq!(stats.low_battery, 2);
}

#[test]
fn test_full_ride_pipeline() {
    let mut bikes = load_snapshot(JSON_SNAPSHOT).unwrap();
    let tariff = Tariff::default();
    let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();

    let busy = find_bike(&mut bikes, "b-4").unwrap();
    assert!(Trip::start("trip-0", "rider-1", busy, start, &tariff).is_err());

    let bike = find_bike(&mut bikes, "bk-0002").unwrap();
    let mut trip = Trip::start("trip-1", "rider-1", bike, start, &tariff).unwrap();
    assert_eq!(bike.status, BikeStatus::InUse);
    assert!(close(trip.cost_etb, 5.0));

    let ten_minutes = trip.observe(start + Duration::minutes(10), &tariff).unwrap();
    assert!(close(ten_minutes.distance_km, 2.0));
    assert!(close(ten_minutes.cost_etb, 9.0));

    let end = start + Duration::minutes(12) + Duration::seconds(30);
    let receipt = trip.complete(bike, end, &tariff).unwrap();
    assert_eq!(trip.status, TripStatus::Completed);
    assert_eq!(bike.status, BikeStatus::Available);
    assert_eq!(receipt.duration_minutes, 12);
    assert!(close(receipt.distance_km, 2.4));
    assert!(close(receipt.cost_etb, 9.8));
    assert_eq!(receipt.payment_status, PaymentStatus::Pending);

    let ledger = format!("{}/bisklet_integration_ledger.csv", std::env::temp_dir().display());
    let _ = std::fs::remove_file(&ledger);
    append_receipt(&ledger, &receipt).unwrap();
    assert_eq!(read_receipts(&ledger).unwrap(), vec![receipt]);
    std::fs::remove_file(&ledger).unwrap();
}

#[test]
fn test_builtin_catalog_fallbacks() {
    let catalog = Catalog::builtin().expect("Failed to load built-in dictionaries");
    assert!(catalog.missing_keys(Language::Or).contains(&"wallet.topUp".to_string()));

    let amharic = LocaleContext::new(catalog.clone(), Language::Am);
    assert_eq!(amharic.t("wallet.topUp"), "Top Up");
    assert_eq!(amharic.t("nosuch.entry"), "entry");
    assert_eq!(amharic.t_or("nosuch.entry", "Entry"), "Entry");

    let oromo = LocaleContext::new(catalog, Language::Or);
    assert_eq!(oromo.t("trip.endRide"), "Imala Xumuri");
}

#[tokio::test]
async fn test_language_preference_survives_reload() {
    let store = MemoryPreferenceStore::new();
    let catalog = Catalog::builtin().unwrap();

    let mut first = LocaleContext::load(catalog.clone(), &store, Some("or_ET.UTF-8")).await;
    assert_eq!(first.language(), Language::Or);

    first.set_language(Language::Am, &store).await.unwrap();

    let second = LocaleContext::load(catalog, &store, Some("or_ET.UTF-8")).await;
    assert_eq!(second.language(), Language::Am);
}
