//! CLI entry point for the Bisklet ride tools.
//!
//! Provides subcommands for pricing a ride, browsing a bike snapshot with the
//! map filters, simulating a ride end to end, and working with translations.

use anyhow::{Context, Result, anyhow, bail};
use bisklet::{
    config::Settings,
    fleet::{
        Bike, BikeType, Coordinates, FilterCriteria, FleetStats, SearchScope, filter::BIKE_MODELS,
        filter_bikes, find_bike, load_snapshot,
    },
    locale::{Catalog, FilePreferenceStore, Language, LocaleContext},
    output::{append_receipt, print_json, print_pretty},
    tariff::{accrue, format_etb, format_km},
    ticker::{DEFAULT_TICK, RideSession, SystemClock},
    trip::Trip,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bisklet")]
#[command(about = "Ride pricing, bike discovery and translations for Bisklet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a ride from its start time
    Fare {
        /// Trip start time (RFC 3339)
        #[arg(long)]
        start: String,

        /// Observation time (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,

        /// Print the accrual as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Filter a bike snapshot the way the map screen does
    Bikes {
        /// JSON or CSV bike snapshot
        #[arg(value_name = "SNAPSHOT")]
        snapshot: String,

        /// Minimum battery percent (0 = any)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        min_battery: i64,

        /// Maximum distance from the rider in km (needs --lat and --lon)
        #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
        max_distance: f64,

        /// Bike model (Urban Classic, City Cruiser, Electric Pro), or "all"
        #[arg(long, default_value = "all")]
        bike_type: String,

        /// Free-text search
        #[arg(short, long, default_value = "")]
        search: String,

        /// Rider latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Rider longitude
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Admin view: every status, search over code, model and location
        #[arg(long, default_value_t = false)]
        fleet_search: bool,

        /// Print the visible bikes as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Start a ride on a bike, tick for a while, end it and record the receipt
    Ride {
        /// JSON or CSV bike snapshot
        #[arg(value_name = "SNAPSHOT")]
        snapshot: String,

        /// Bike id or code
        #[arg(short, long)]
        bike: String,

        /// Rider id
        #[arg(short, long, default_value = "local-rider")]
        user: String,

        /// How long to ride, in seconds
        #[arg(short = 'n', long, default_value_t = 5)]
        seconds: u64,

        /// CSV ledger to append the receipt to
        #[arg(short, long, default_value = "receipts.csv")]
        ledger: String,
    },
    /// Resolve a translation key
    Translate {
        /// Dotted key, e.g. trip.endRide
        key: String,

        /// Text to use when the key is missing everywhere
        #[arg(short, long)]
        fallback: Option<String>,

        /// Language code, defaults to the saved preference
        #[arg(short, long)]
        lang: Option<String>,
    },
    /// Show or change the saved language
    Language {
        /// Language code to save (en, am, or)
        code: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let settings = Settings::from_env()?;

    // Logging setup: colored stderr + JSON rolling log file
    let log_dir = settings
        .log_file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = settings
        .log_file_path
        .file_name()
        .unwrap_or(OsStr::new("bisklet.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fare { start, now, json } => {
            let start = parse_time(&start)?;
            let now = match now {
                Some(now) => parse_time(&now)?,
                None => Utc::now(),
            };
            let accrual = accrue(start, now, &settings.tariff);

            if json {
                print_json(&accrual)?;
            } else {
                print_pretty(&accrual);
                info!(
                    elapsed = %accrual.elapsed,
                    distance = %format_km(accrual.distance_km),
                    cost = %format_etb(accrual.cost_etb),
                    "Fare"
                );
            }
        }
        Commands::Bikes {
            snapshot,
            min_battery,
            max_distance,
            bike_type,
            search,
            lat,
            lon,
            fleet_search,
            json,
        } => {
            let mut criteria = FilterCriteria::try_new(min_battery, max_distance, &bike_type, &search)?;
            if fleet_search {
                criteria = criteria.with_scope(SearchScope::Fleet);
            }
            if let BikeType::Model(model) = &criteria.bike_type {
                if !BIKE_MODELS.contains(&model.as_str()) {
                    warn!(bike_type = %model, known = ?BIKE_MODELS, "Bike type is not a listed model");
                }
            }
            let rider = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
                (None, None) => None,
                _ => bail!("--lat and --lon must be given together"),
            };

            let locale = load_locale(&settings).await?;
            browse_bikes(&snapshot, &criteria, rider, json, &locale)?;
        }
        Commands::Ride {
            snapshot,
            bike,
            user,
            seconds,
            ledger,
        } => {
            let locale = load_locale(&settings).await?;
            ride(&snapshot, &bike, &user, seconds, &ledger, &settings, &locale).await?;
        }
        Commands::Translate {
            key,
            fallback,
            lang,
        } => {
            let locale = match lang {
                Some(code) => LocaleContext::new(load_catalog(&settings)?, parse_language(&code)?),
                None => load_locale(&settings).await?,
            };

            let text = match &fallback {
                Some(fallback) => locale.t_or(&key, fallback),
                None => locale.t(&key),
            };
            info!(key = %key, language = %locale.language(), text, "Resolved");
        }
        Commands::Language { code } => {
            let store = FilePreferenceStore::new(&settings.preferences_path);
            let mut locale = LocaleContext::load(
                load_catalog(&settings)?,
                &store,
                settings.device_locale.as_deref(),
            )
            .await;

            match code {
                Some(code) => {
                    let language = parse_language(&code)?;
                    let direction = locale.set_language(language, &store).await?;
                    info!(
                        language = %language,
                        direction = direction.as_str(),
                        path = %store.path().display(),
                        "Language saved"
                    );
                }
                None => {
                    let loaded: Vec<Language> = locale.catalog().languages().collect();
                    for language in Language::ALL {
                        let missing = locale.catalog().missing_keys(language).len();
                        info!(
                            code = %language,
                            name = language.native_name(),
                            active = language == locale.language(),
                            has_dictionary = loaded.contains(&language),
                            missing_keys = missing,
                            "Language"
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("'{value}' is not an RFC 3339 timestamp"))?
        .with_timezone(&Utc))
}

fn parse_language(code: &str) -> Result<Language> {
    Language::from_code(code).ok_or_else(|| {
        anyhow!(
            "unsupported language '{code}', expected one of: {}",
            Language::ALL.map(|l| l.as_str()).join(", ")
        )
    })
}

fn load_catalog(settings: &Settings) -> Result<Catalog> {
    match &settings.locales_dir {
        Some(dir) => Catalog::load_dir(dir),
        None => Catalog::builtin(),
    }
}

async fn load_locale(settings: &Settings) -> Result<LocaleContext> {
    let store = FilePreferenceStore::new(&settings.preferences_path);
    Ok(LocaleContext::load(load_catalog(settings)?, &store, settings.device_locale.as_deref()).await)
}

/// Loads a snapshot, applies the filters and logs what the map would show.
#[tracing::instrument(skip(criteria, json, locale), fields(source = %snapshot))]
fn browse_bikes(
    snapshot: &str,
    criteria: &FilterCriteria,
    rider: Option<Coordinates>,
    json: bool,
    locale: &LocaleContext,
) -> Result<()> {
    let bikes = load_snapshot(snapshot)?;

    // Riders only ever see bikes that can be unlocked.
    let pool: Vec<Bike> = match criteria.scope {
        SearchScope::Fleet => bikes.clone(),
        SearchScope::Location => bikes.iter().filter(|b| b.is_available()).cloned().collect(),
    };
    let visible = filter_bikes(&pool, criteria, rider);

    if json {
        print_json(&visible)?;
    } else {
        for bike in &visible {
            let distance = rider
                .zip(bike.coordinates())
                .map(|(r, at)| format_km(r.distance_km(&at)));
            info!(
                code = %bike.code,
                model = %bike.model,
                battery = bike.battery_level,
                location = bike.location_name.as_deref().unwrap_or(locale.t("trip.unknownLocation")),
                distance = distance.as_deref(),
                status = %bike.status,
                "Bike"
            );
        }
    }

    let stats = FleetStats::from_bikes(&bikes);
    info!(
        visible = visible.len(),
        total = stats.total_bikes,
        available = stats.available,
        in_use = stats.in_use,
        maintenance = stats.maintenance,
        low_battery = stats.low_battery,
        available_pct = %format!("{:.1}", stats.available_pct()),
        "{}",
        locale.t("map.bikesAvailable")
    );
    Ok(())
}

/// Runs a ride against a snapshot bike with the real clock, then records it.
#[tracing::instrument(skip(settings, locale))]
async fn ride(
    snapshot: &str,
    bike_ref: &str,
    user: &str,
    seconds: u64,
    ledger: &str,
    settings: &Settings,
    locale: &LocaleContext,
) -> Result<()> {
    let mut bikes = load_snapshot(snapshot)?;
    let bike = find_bike(&mut bikes, bike_ref)
        .ok_or_else(|| anyhow!("no bike '{bike_ref}' in {snapshot}"))?;

    let trip_id = format!("trip-{}", Utc::now().timestamp_millis());
    let trip = Trip::start(trip_id, user, bike, Utc::now(), &settings.tariff)?;
    let mut session = RideSession::start(trip, settings.tariff, DEFAULT_TICK, Arc::new(SystemClock));

    if let Some(mut updates) = session.subscribe() {
        let deadline = tokio::time::sleep(Duration::from_secs(seconds));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        warn!("Ticker stopped before the ride ended");
                        break;
                    }
                    let accrual = *updates.borrow_and_update();
                    info!(
                        elapsed = %accrual.elapsed,
                        distance = %format_km(accrual.distance_km),
                        cost = %format_etb(accrual.cost_etb),
                        "{}",
                        locale.t("trip.activeRide")
                    );
                }
            }
        }
    }

    let receipt = session.complete(bike, Utc::now()).await?;
    append_receipt(ledger, &receipt)?;

    info!(
        trip_id = %receipt.trip_id,
        bike = %receipt.bike_code,
        duration_minutes = receipt.duration_minutes,
        distance = %format_km(receipt.distance_km),
        cost = %format_etb(receipt.cost_etb),
        ledger,
        "{}",
        locale.t("trip.completed")
    );
    Ok(())
}
