// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of SunLink.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Time-bucketed chart series.
//!
//! A series is a short, chronologically sorted run of buckets, unique by axis
//! label (`09:00`, `Mon`, `14`, `Jun`). A reading whose label is already on the
//! axis overwrites that bucket in place, even when it falls in a later cycle of
//! the range. A new label is inserted at its chronological position and the
//! oldest bucket falls off once the series is full.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::trace;

use sunlink_types::{EnergyReading, EventPayload, TimeBucket, TimeRange};

use crate::Reconciler;

/// Merges energy readings into a chart series
#[derive(Debug, Clone)]
pub struct SeriesReconciler {
    range: TimeRange,
    timezone: Tz,
    capacity: usize,
}

impl SeriesReconciler {
    pub fn new(range: TimeRange, timezone: Tz) -> Self {
        Self {
            range,
            timezone,
            capacity: range.bucket_count(),
        }
    }

    /// Hold fewer buckets than the range allows (e.g. a 12-hour sparkline)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.clamp(1, self.range.bucket_count());
        self
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Merge one reading into `series`.
    ///
    /// Last write wins: a reading for a populated bucket replaces its values.
    pub fn apply(&self, mut series: Vec<TimeBucket>, reading: &EnergyReading) -> Vec<TimeBucket> {
        let (key, start) = self.bucket_for(reading.timestamp);

        // The bucket keeps its start so the axis order stays put
        if let Some(bucket) = series.iter_mut().find(|b| b.bucket_key == key) {
            bucket.production_kw = reading.production_kw();
            bucket.consumption_kw = reading.consumption_kw();
            return series;
        }

        trace!(bucket = %key, start = %start, "Inserting new bucket");
        series.push(TimeBucket::new(
            key,
            start,
            reading.production_kw(),
            reading.consumption_kw(),
        ));
        series.sort_by_key(|b| b.start);

        while series.len() > self.capacity {
            let evicted = series.remove(0);
            trace!(bucket = %evicted.bucket_key, "Evicted oldest bucket");
        }

        series
    }

    /// Build a series from a REST baseline of raw readings
    pub fn from_readings(&self, readings: &[EnergyReading]) -> Vec<TimeBucket> {
        let mut ordered: Vec<&EnergyReading> = readings.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);
        ordered
            .into_iter()
            .fold(Vec::with_capacity(self.capacity), |series, reading| {
                self.apply(series, reading)
            })
    }

    /// Axis label and start instant of the bucket containing `timestamp`
    pub fn bucket_for(&self, timestamp: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let local = timestamp.with_timezone(&self.timezone);
        let date = local.date_naive();

        match self.range {
            TimeRange::Day => {
                let hour = local.hour();
                let start = date.and_hms_opt(hour, 0, 0).unwrap_or_default();
                (format!("{hour:02}:00"), self.to_utc(start))
            }
            TimeRange::Week => (
                local.format("%a").to_string(),
                self.to_utc(date.and_time(chrono::NaiveTime::MIN)),
            ),
            TimeRange::Month => (
                local.day().to_string(),
                self.to_utc(date.and_time(chrono::NaiveTime::MIN)),
            ),
            TimeRange::Year => {
                let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap_or(date);
                (
                    local.format("%b").to_string(),
                    self.to_utc(first.and_time(chrono::NaiveTime::MIN)),
                )
            }
        }
    }

    /// Resolve a local wall-clock bucket start.
    ///
    /// Ambiguous times (DST fall-back) take the earlier instant; times inside a
    /// DST gap move to the first valid instant an hour later.
    fn to_utc(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(naive + TimeDelta::hours(1)))
                    .earliest()
            })
            .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc))
    }
}

impl Reconciler for SeriesReconciler {
    type State = Vec<TimeBucket>;
    type Update = EnergyReading;

    fn apply(&self, state: Self::State, update: &Self::Update) -> Self::State {
        SeriesReconciler::apply(self, state, update)
    }

    fn extract<'a>(&self, payload: &'a EventPayload) -> Option<&'a Self::Update> {
        match payload {
            EventPayload::EnergyReading(reading) => Some(reading),
            EventPayload::AlertUpsert(_) | EventPayload::SystemOverview(_) => None,
        }
    }
}
