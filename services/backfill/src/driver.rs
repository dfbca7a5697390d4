//! Chunked backfill driver.
//!
//! A run pulls units from a [`WorkPlan`] one at a time and stops at the
//! first of:
//! - the plan running out of units (`completed = true`)
//! - the wall-clock deadline passing
//! - the processed-unit limit being reached
//!
//! Both budget checks happen between units, from the second unit on, so
//! every run makes progress and no fetch is cancelled midway. Units that
//! already have a record are skipped without an external call, which is
//! what lets repeated runs converge.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use enrich_common::{
    BackfillKind, BackfillRequest, BackfillSummary, Budget, Coordinates, EnrichError,
    EnrichResult, HistoryRecord, HourlyIrradiance, HourlySolarIrradianceRecord,
    HourlyWeatherRecord, System, WeatherSample,
};
use solar_geometry::{compute_irradiance, daylight_hours, mid_hour};
use storage::{BatchWriter, Collection, DocumentStore, EnrichmentWrite, FlushReport};
use weather_provider::WeatherProvider;

use crate::config::BackfillConfig;
use crate::metrics::{self, UnitOutcome};
use crate::throttle::ThrottlePolicy;
use crate::work::{WorkPlan, WorkUnit};

/// Why a run ended before visiting every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Deadline,
    MaxUnits,
}

/// Per-run unit counts before writes are flushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    enqueued: u64,
    fetch_errors: u64,
    skipped_existing: u64,
    skipped_no_daylight: u64,
}

impl Tally {
    fn record(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Enqueued => self.enqueued += 1,
            UnitOutcome::FetchFailed => self.fetch_errors += 1,
            UnitOutcome::SkippedExisting => self.skipped_existing += 1,
            UnitOutcome::SkippedNoDaylight => self.skipped_no_daylight += 1,
        }
    }

    /// Units that reached the fetch/compute stage.
    fn processed(&self) -> u64 {
        self.enqueued + self.fetch_errors
    }

    fn skipped(&self) -> u64 {
        self.skipped_existing + self.skipped_no_daylight
    }

    fn visited(&self) -> u64 {
        self.processed() + self.skipped()
    }
}

/// Runs one invocation at a time against a store and a weather provider.
pub struct BackfillDriver {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn WeatherProvider>,
    config: BackfillConfig,
    throttle: ThrottlePolicy,
}

impl BackfillDriver {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn WeatherProvider>,
        config: BackfillConfig,
    ) -> Self {
        let throttle = config.throttle();
        Self {
            store,
            provider,
            config,
            throttle,
        }
    }

    pub fn config(&self) -> &BackfillConfig {
        &self.config
    }

    /// Resolve a request's budget against the configured defaults.
    pub fn budget_for(&self, request: &BackfillRequest) -> Budget {
        request.budget_with(
            self.config.max_units_for(request.kind),
            self.config.default_deadline_ms,
        )
    }

    /// Run one bounded invocation.
    ///
    /// Returns an error only when the store is unreachable; provider and
    /// per-record write failures are counted in the summary.
    #[instrument(skip(self, request), fields(kind = %request.kind))]
    pub async fn run(&self, request: &BackfillRequest) -> EnrichResult<BackfillSummary> {
        let started = Instant::now();
        let kind = request.kind;
        let budget = self.budget_for(request);

        info!(
            max_units = budget.max_units,
            deadline_ms = budget.deadline.as_millis() as u64,
            "Starting backfill run"
        );

        self.store.ping().await?;

        let store = self.store.as_ref();
        let mut plan = WorkPlan::discover(store, kind, self.config.history_page_size).await?;
        let mut writer = BatchWriter::new(store, self.config.batch_size);
        let mut tally = Tally::default();

        let outcome = self
            .drive(kind, budget, started, &mut plan, &mut writer, &mut tally)
            .await;
        // Flush what was built even if the store failed mid-run.
        let flushed = writer.finish().await;
        let stopped = outcome?;

        let summary = summarize(kind, budget, &tally, flushed, stopped, started);
        metrics::record_write_failures(kind, flushed.failed);
        metrics::record_run(kind, summary.completed, started.elapsed());

        info!(
            processed = summary.processed,
            written = summary.written,
            errors = summary.errors,
            skipped_existing = tally.skipped_existing,
            skipped_no_daylight = tally.skipped_no_daylight,
            completed = summary.completed,
            elapsed_ms = summary.elapsed_ms,
            systems = plan.systems_total(),
            "Backfill run finished"
        );

        Ok(summary)
    }

    /// Re-invoke `run` until it reports completion or `max_invocations` runs
    /// have been made.
    pub async fn run_until_complete(
        &self,
        request: &BackfillRequest,
        max_invocations: u32,
    ) -> EnrichResult<Vec<BackfillSummary>> {
        let mut summaries = Vec::new();
        for invocation in 1..=max_invocations.max(1) {
            let summary = self.run(request).await?;
            let completed = summary.completed;
            summaries.push(summary);
            if completed {
                break;
            }
            debug!(invocation, "Run incomplete, invoking again");
        }
        Ok(summaries)
    }

    async fn drive(
        &self,
        kind: BackfillKind,
        budget: Budget,
        started: Instant,
        plan: &mut WorkPlan<'_>,
        writer: &mut BatchWriter<'_>,
        tally: &mut Tally,
    ) -> EnrichResult<Option<StopReason>> {
        while let Some(unit) = plan.next_unit().await? {
            if tally.visited() > 0 {
                if started.elapsed() >= budget.deadline {
                    return Ok(Some(StopReason::Deadline));
                }
                if tally.processed() >= budget.max_units as u64 {
                    return Ok(Some(StopReason::MaxUnits));
                }
            }

            let outcome = self.handle(kind, unit, writer).await?;
            metrics::record_unit(kind, outcome);
            tally.record(outcome);
        }
        Ok(None)
    }

    async fn handle(
        &self,
        kind: BackfillKind,
        unit: WorkUnit,
        writer: &mut BatchWriter<'_>,
    ) -> EnrichResult<UnitOutcome> {
        match (kind, unit) {
            (
                BackfillKind::HourlyCloud,
                WorkUnit::Day {
                    system,
                    coordinates,
                    date,
                },
            ) => self.hourly_cloud(&system, coordinates, date, writer).await,
            (
                BackfillKind::HourlyIrradiance,
                WorkUnit::Day {
                    system,
                    coordinates,
                    date,
                },
            ) => {
                self.hourly_irradiance(&system, coordinates, date, writer)
                    .await
            }
            (
                BackfillKind::WeatherPoint,
                WorkUnit::Record {
                    system,
                    coordinates,
                    record,
                },
            ) => Ok(self.point_weather(&system, coordinates, record, writer).await),
            (kind, unit) => Err(EnrichError::InternalError(format!(
                "{} run cannot handle unit for system {}",
                kind,
                unit.system_id()
            ))),
        }
    }

    async fn hourly_cloud(
        &self,
        system: &System,
        coordinates: Coordinates,
        date: NaiveDate,
        writer: &mut BatchWriter<'_>,
    ) -> EnrichResult<UnitOutcome> {
        if self
            .store
            .exists(Collection::HourlyWeather, &system.id, date)
            .await?
        {
            debug!(system_id = %system.id, date = %date, "Hourly weather exists, skipping");
            return Ok(UnitOutcome::SkippedExisting);
        }

        let daylight = daylight_hours(date, coordinates.latitude, coordinates.longitude);
        if daylight.is_empty() {
            debug!(system_id = %system.id, date = %date, "No daylight hours, skipping");
            return Ok(UnitOutcome::SkippedNoDaylight);
        }

        let Some(samples) = self
            .fetch_hourly(BackfillKind::HourlyCloud, system, coordinates, date)
            .await
        else {
            return Ok(UnitOutcome::FetchFailed);
        };

        let hourly_data = samples
            .into_iter()
            .filter(|s| daylight.contains(&s.hour))
            .collect();

        writer
            .enqueue(EnrichmentWrite::HourlyWeather(HourlyWeatherRecord {
                system_id: system.id.clone(),
                date,
                daylight_hours: daylight,
                hourly_data,
                source: self.provider.name().to_string(),
                created_at: Utc::now(),
            }))
            .await;
        Ok(UnitOutcome::Enqueued)
    }

    async fn hourly_irradiance(
        &self,
        system: &System,
        coordinates: Coordinates,
        date: NaiveDate,
        writer: &mut BatchWriter<'_>,
    ) -> EnrichResult<UnitOutcome> {
        if self
            .store
            .exists(Collection::HourlyIrradiance, &system.id, date)
            .await?
        {
            debug!(system_id = %system.id, date = %date, "Hourly irradiance exists, skipping");
            return Ok(UnitOutcome::SkippedExisting);
        }

        let daylight = daylight_hours(date, coordinates.latitude, coordinates.longitude);
        if daylight.is_empty() {
            debug!(system_id = %system.id, date = %date, "No daylight hours, skipping");
            return Ok(UnitOutcome::SkippedNoDaylight);
        }

        // Cloud cover comes from the stored hourly weather when there is one.
        let samples = match self.store.hourly_weather(&system.id, date).await? {
            Some(record) => record.hourly_data,
            None => {
                let Some(samples) = self
                    .fetch_hourly(BackfillKind::HourlyIrradiance, system, coordinates, date)
                    .await
                else {
                    return Ok(UnitOutcome::FetchFailed);
                };
                samples
            }
        };

        let hours = irradiance_hours(date, coordinates, &daylight, &samples);
        let cloud_data_available = hours.iter().any(|h| h.cloud_data_available);

        writer
            .enqueue(EnrichmentWrite::HourlyIrradiance(
                HourlySolarIrradianceRecord {
                    system_id: system.id.clone(),
                    date,
                    hours,
                    cloud_data_available,
                    created_at: Utc::now(),
                },
            ))
            .await;
        Ok(UnitOutcome::Enqueued)
    }

    async fn point_weather(
        &self,
        system: &System,
        coordinates: Coordinates,
        record: HistoryRecord,
        writer: &mut BatchWriter<'_>,
    ) -> UnitOutcome {
        let result = self
            .provider
            .fetch_point(coordinates.latitude, coordinates.longitude, record.timestamp)
            .await;

        match result {
            Ok(sample) => {
                self.throttle.pause(Ok(())).await;
                writer
                    .enqueue(EnrichmentWrite::PointWeather {
                        record_id: record.id,
                        sample,
                    })
                    .await;
                UnitOutcome::Enqueued
            }
            Err(e) => {
                warn!(
                    system_id = %system.id,
                    record_id = %record.id,
                    timestamp = %record.timestamp,
                    error = %e,
                    "Point weather fetch failed"
                );
                metrics::record_fetch_error(BackfillKind::WeatherPoint, e.class());
                self.throttle.pause(Err(&e)).await;
                UnitOutcome::FetchFailed
            }
        }
    }

    /// Fetch one day of hourly samples, applying the throttle or backoff.
    async fn fetch_hourly(
        &self,
        kind: BackfillKind,
        system: &System,
        coordinates: Coordinates,
        date: NaiveDate,
    ) -> Option<Vec<WeatherSample>> {
        let result = self
            .provider
            .fetch_hourly(coordinates.latitude, coordinates.longitude, date)
            .await;

        match result {
            Ok(samples) => {
                self.throttle.pause(Ok(())).await;
                Some(samples)
            }
            Err(e) => {
                warn!(
                    system_id = %system.id,
                    date = %date,
                    error = %e,
                    "Hourly weather fetch failed"
                );
                metrics::record_fetch_error(kind, e.class());
                self.throttle.pause(Err(&e)).await;
                None
            }
        }
    }
}

/// Irradiance for each daylight hour of `date`, evaluated at mid-hour.
///
/// Hours without a cloud-cover sample use the clear-sky value.
pub fn irradiance_hours(
    date: NaiveDate,
    coordinates: Coordinates,
    daylight: &[u32],
    samples: &[WeatherSample],
) -> Vec<HourlyIrradiance> {
    daylight
        .iter()
        .map(|&hour| {
            let cloud_cover = samples
                .iter()
                .find(|s| s.hour == hour)
                .and_then(|s| s.cloud_cover_percent);
            let irr = compute_irradiance(
                mid_hour(date, hour),
                coordinates.latitude,
                coordinates.longitude,
                cloud_cover,
                coordinates.altitude_m,
            );

            HourlyIrradiance {
                hour,
                solar_altitude: irr.solar_altitude,
                solar_azimuth: irr.solar_azimuth,
                clear_sky_global: irr.clear_sky.global,
                clear_sky_direct_horizontal: irr.clear_sky.direct_horizontal,
                clear_sky_diffuse: irr.clear_sky.diffuse,
                actual_global: irr.actual.global,
                actual_direct_horizontal: irr.actual.direct_horizontal,
                actual_diffuse: irr.actual.diffuse,
                cloud_factor: irr.actual.cloud_factor,
                air_mass: irr.clear_sky.air_mass,
                cloud_cover_percent: cloud_cover,
                cloud_data_available: cloud_cover.is_some(),
            }
        })
        .collect()
}

fn summarize(
    kind: BackfillKind,
    budget: Budget,
    tally: &Tally,
    flushed: FlushReport,
    stopped: Option<StopReason>,
    started: Instant,
) -> BackfillSummary {
    let written = flushed.written;
    let errors = tally.fetch_errors + flushed.failed;
    let processed = written + errors;
    let skipped = tally.skipped();

    let counts = format!(
        "processed {}, written {}, errors {}, skipped {}",
        processed, written, errors, skipped
    );
    let message = match stopped {
        None if errors > 0 => format!(
            "Backfill complete: {}. Failed units will be retried on the next run",
            counts
        ),
        None => format!("Backfill complete: {}", counts),
        Some(StopReason::Deadline) => format!(
            "Stopped at the {}ms deadline: {}. Run again to continue",
            budget.deadline.as_millis(),
            counts
        ),
        Some(StopReason::MaxUnits) => format!(
            "Stopped after {} units: {}. Run again to continue",
            budget.max_units, counts
        ),
    };

    BackfillSummary {
        success: true,
        kind,
        processed,
        written,
        errors,
        skipped,
        completed: stopped.is_none(),
        message,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
