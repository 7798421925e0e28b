//! Periodic accrual for an active trip.
//!
//! [`TripTicker`] is a spawned task that observes a shared [`Trip`] on a
//! fixed period and publishes the result on a `watch` channel. Stopping the
//! ticker, dropping it, or closing the trip ends the task. [`RideSession`]
//! ties a ticker to its trip so that closing the trip is the only way the
//! ticking stops, and it stops for good.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::TripError;
use crate::fleet::Bike;
use crate::tariff::{Accrual, Tariff};
use crate::trip::{Trip, TripReceipt};

/// Display refresh period for an active ride.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Source of "now". Injected so accrual stays a function of its inputs.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

/// A trip shared between its session and the ticking task.
pub type SharedTrip = Arc<Mutex<Trip>>;

fn lock(trip: &SharedTrip) -> MutexGuard<'_, Trip> {
    trip.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct TripTicker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    updates: watch::Receiver<Accrual>,
}

impl TripTicker {
    /// Spawns the ticking task on the current tokio runtime. The first
    /// tick fires immediately, and every tick writes the new figures into
    /// `trip` before publishing them.
    pub fn spawn(trip: SharedTrip, tariff: Tariff, period: Duration, clock: Arc<dyn Clock>) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (tx, updates) = watch::channel(lock(&trip).progress());
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    // Fires on an explicit stop and when the handle is dropped.
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        let observed = lock(&trip).observe(clock.now(), &tariff);
                        // A closed trip has nothing left to accrue.
                        let Ok(next) = observed else { break };
                        let published = tx.borrow().latest(next);
                        if tx.send(published).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Trip ticker stopped");
        });

        Self {
            stop,
            handle,
            updates,
        }
    }

    /// A receiver that is notified on every tick.
    pub fn subscribe(&self) -> watch::Receiver<Accrual> {
        self.updates.clone()
    }

    pub fn latest(&self) -> Accrual {
        *self.updates.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops ticking, waits for the task to finish, and returns the last
    /// published accrual.
    pub async fn stop(self) -> Accrual {
        let TripTicker {
            stop,
            handle,
            updates,
        } = self;
        let _ = stop.send(());
        let _ = handle.await;
        *updates.borrow()
    }
}

/// An active trip together with the ticker that drives its display.
pub struct RideSession {
    trip: SharedTrip,
    tariff: Tariff,
    ticker: Option<TripTicker>,
}

impl RideSession {
    /// Starts ticking for `trip`. A trip that is already closed gets no
    /// ticker.
    pub fn start(trip: Trip, tariff: Tariff, period: Duration, clock: Arc<dyn Clock>) -> Self {
        let active = trip.is_active();
        info!(trip_id = %trip.id, ticking = active, "Ride session started");

        let trip = Arc::new(Mutex::new(trip));
        let ticker = active.then(|| TripTicker::spawn(trip.clone(), tariff, period, clock));
        Self {
            trip,
            tariff,
            ticker,
        }
    }

    /// A snapshot of the trip, including the figures from the last tick.
    pub fn trip(&self) -> Trip {
        lock(&self.trip).clone()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(TripTicker::is_running)
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<Accrual>> {
        self.ticker.as_ref().map(TripTicker::subscribe)
    }

    /// Latest tick while active; the trip's final figures once closed.
    pub fn current(&self) -> Accrual {
        match &self.ticker {
            Some(ticker) => ticker.latest(),
            None => lock(&self.trip).progress(),
        }
    }

    /// Completes the trip at `now` and stops the ticker. On error the trip
    /// and ticker are left untouched.
    pub async fn complete(
        &mut self,
        bike: &mut Bike,
        now: DateTime<Utc>,
    ) -> Result<TripReceipt, TripError> {
        let receipt = lock(&self.trip).complete(bike, now, &self.tariff)?;
        self.halt().await;
        Ok(receipt)
    }

    pub async fn cancel(&mut self, bike: &mut Bike, now: DateTime<Utc>) -> Result<(), TripError> {
        lock(&self.trip).cancel(bike, now, &self.tariff)?;
        self.halt().await;
        Ok(())
    }

    async fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            let trip_id = lock(&self.trip).id.clone();
            let last = ticker.stop().await;
            debug!(trip_id = %trip_id, elapsed = %last.elapsed, "Ticker halted");
        }
    }
}
