//! Work discovery: a lazy cursor over the units a run may visit.
//!
//! Hourly kinds yield one unit per (system, calendar day) between the first
//! and last history timestamp of each system. The point kind yields one unit
//! per history record that has no weather yet, paged in (timestamp, id)
//! order. Systems are visited in id order and only when both coordinates
//! are set.

use std::collections::VecDeque;

use chrono::NaiveDate;
use tracing::{debug, info};

use enrich_common::{BackfillKind, Coordinates, DayRange, Days, EnrichResult, HistoryRecord, System};
use storage::{DocumentStore, HistoryCursor};

/// One step of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkUnit {
    /// One UTC calendar day of one system
    Day {
        system: System,
        coordinates: Coordinates,
        date: NaiveDate,
    },
    /// One history record still missing weather
    Record {
        system: System,
        coordinates: Coordinates,
        record: HistoryRecord,
    },
}

impl WorkUnit {
    pub fn system_id(&self) -> &str {
        match self {
            Self::Day { system, .. } | Self::Record { system, .. } => &system.id,
        }
    }
}

enum SystemCursor {
    Days {
        system: System,
        coordinates: Coordinates,
        days: Days,
    },
    Records {
        system: System,
        coordinates: Coordinates,
        buffer: VecDeque<HistoryRecord>,
        after: Option<HistoryCursor>,
        exhausted: bool,
    },
}

/// Pull-based cursor over every unit of a run.
pub struct WorkPlan<'a> {
    store: &'a dyn DocumentStore,
    kind: BackfillKind,
    page_size: u32,
    systems: VecDeque<System>,
    current: Option<SystemCursor>,
    systems_total: usize,
}

impl<'a> WorkPlan<'a> {
    /// Load the eligible systems. Fails only if the store does.
    pub async fn discover(
        store: &'a dyn DocumentStore,
        kind: BackfillKind,
        page_size: u32,
    ) -> EnrichResult<WorkPlan<'a>> {
        let systems: VecDeque<System> = store
            .systems_with_coordinates()
            .await?
            .into_iter()
            .filter(|s| s.coordinates().is_some())
            .collect();

        if systems.is_empty() {
            info!(kind = %kind, "No systems with coordinates, nothing to backfill");
        }

        Ok(WorkPlan {
            store,
            kind,
            page_size: page_size.max(1),
            systems_total: systems.len(),
            systems,
            current: None,
        })
    }

    pub fn systems_total(&self) -> usize {
        self.systems_total
    }

    /// Next unit, or `None` once every system has been walked.
    pub async fn next_unit(&mut self) -> EnrichResult<Option<WorkUnit>> {
        loop {
            if self.current.is_none() {
                let Some(system) = self.systems.pop_front() else {
                    return Ok(None);
                };
                self.current = self.open(system).await?;
                continue;
            }

            if let Some(unit) = self.advance().await? {
                return Ok(Some(unit));
            }
            self.current = None;
        }
    }

    async fn open(&self, system: System) -> EnrichResult<Option<SystemCursor>> {
        let Some(coordinates) = system.coordinates() else {
            return Ok(None);
        };

        if !self.kind.is_hourly() {
            return Ok(Some(SystemCursor::Records {
                system,
                coordinates,
                buffer: VecDeque::new(),
                after: None,
                exhausted: false,
            }));
        }

        let range = self
            .store
            .history_range(&system.id)
            .await?
            .and_then(|(first, last)| DayRange::from_timestamps(first, last));

        match range {
            Some(range) => {
                debug!(
                    system_id = %system.id,
                    start = %range.start,
                    end = %range.end,
                    days = range.len_days(),
                    "Walking history days"
                );
                Ok(Some(SystemCursor::Days {
                    system,
                    coordinates,
                    days: range.days(),
                }))
            }
            None => {
                info!(system_id = %system.id, "System has no history, skipping");
                Ok(None)
            }
        }
    }

    async fn advance(&mut self) -> EnrichResult<Option<WorkUnit>> {
        let store = self.store;
        let page_size = self.page_size;

        match self.current.as_mut() {
            None => Ok(None),
            Some(SystemCursor::Days {
                system,
                coordinates,
                days,
            }) => Ok(days.next().map(|date| WorkUnit::Day {
                system: system.clone(),
                coordinates: *coordinates,
                date,
            })),
            Some(SystemCursor::Records {
                system,
                coordinates,
                buffer,
                after,
                exhausted,
            }) => {
                if buffer.is_empty() && !*exhausted {
                    let page = store
                        .history_missing_weather(&system.id, after.as_ref(), page_size)
                        .await?;
                    *exhausted = page.len() < page_size as usize;
                    if let Some(last) = page.last() {
                        *after = Some(HistoryCursor::after(last));
                    }
                    buffer.extend(page);
                }

                Ok(buffer.pop_front().map(|record| WorkUnit::Record {
                    system: system.clone(),
                    coordinates: *coordinates,
                    record,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use storage::InMemoryStore;

    fn system(id: &str, lat: Option<f64>) -> System {
        System {
            id: id.to_string(),
            name: id.to_string(),
            latitude: lat,
            longitude: Some(-105.0),
            altitude: None,
        }
    }

    fn record(id: &str, system_id: &str, day: u32, hour: u32) -> HistoryRecord {
        HistoryRecord {
            id: id.to_string(),
            system_id: system_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
            weather: None,
        }
    }

    async fn drain(plan: &mut WorkPlan<'_>) -> Vec<WorkUnit> {
        let mut units = Vec::new();
        while let Some(unit) = plan.next_unit().await.unwrap() {
            units.push(unit);
        }
        units
    }

    #[tokio::test]
    async fn test_days_walk_each_system_inclusively() {
        let store = InMemoryStore::new();
        store.put_system(&system("b", Some(39.0))).await.unwrap();
        store.put_system(&system("a", Some(40.0))).await.unwrap();
        store.put_system(&system("no-coords", None)).await.unwrap();
        store.put_history(&record("a1", "a", 1, 5)).await.unwrap();
        store.put_history(&record("a2", "a", 3, 23)).await.unwrap();
        store.put_history(&record("b1", "b", 10, 12)).await.unwrap();
        store.put_history(&record("n1", "no-coords", 1, 12)).await.unwrap();

        let mut plan = WorkPlan::discover(&store, BackfillKind::HourlyCloud, 10)
            .await
            .unwrap();
        assert_eq!(plan.systems_total(), 2);

        let keys: Vec<(String, u32)> = drain(&mut plan)
            .await
            .into_iter()
            .map(|u| match u {
                WorkUnit::Day { system, date, .. } => {
                    (system.id, chrono::Datelike::day(&date))
                }
                other => panic!("unexpected unit {:?}", other),
            })
            .collect();

        assert_eq!(
            keys,
            vec![
                ("a".to_string(), 1),
                ("a".to_string(), 2),
                ("a".to_string(), 3),
                ("b".to_string(), 10),
            ]
        );
    }

    #[tokio::test]
    async fn test_system_without_history_yields_nothing() {
        let store = InMemoryStore::new();
        store.put_system(&system("a", Some(40.0))).await.unwrap();
        let mut plan = WorkPlan::discover(&store, BackfillKind::HourlyIrradiance, 10)
            .await
            .unwrap();
        assert!(plan.next_unit().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_page_through_history() {
        let store = InMemoryStore::new();
        store.put_system(&system("a", Some(40.0))).await.unwrap();
        for hour in 0..5 {
            store
                .put_history(&record(&format!("r{}", hour), "a", 1, hour))
                .await
                .unwrap();
        }

        let mut plan = WorkPlan::discover(&store, BackfillKind::WeatherPoint, 2)
            .await
            .unwrap();
        let ids: Vec<String> = drain(&mut plan)
            .await
            .into_iter()
            .map(|u| match u {
                WorkUnit::Record { record, .. } => record.id,
                other => panic!("unexpected unit {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec!["r0", "r1", "r2", "r3", "r4"]);
    }

    #[tokio::test]
    async fn test_discovery_propagates_store_failure() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        let result = WorkPlan::discover(&store, BackfillKind::HourlyCloud, 10).await;
        assert!(result.is_err());
    }
}
