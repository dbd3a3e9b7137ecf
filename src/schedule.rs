use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use regex::Regex;
use time::{Date, Duration};

use crate::config::{Config, ScheduleParams};
use crate::error::{Error, Result};

/// Review intervals in days, indexed by completed-review count. The final
/// entry is effectively "never again".
pub const DEFAULT_INTERVALS: &[i64] = &[2, 6, 14, 30, 45, 90, 120, 180, 360, 720, 99999];

/// Spaced-review scheduling over a fixed interval table.
///
/// `completions_done` indexes the table; counts past the end reuse the final
/// interval, so graduated material keeps a fixed maximum cadence. Each entry
/// has a symmetric jitter window in days, drawn from the injected generator,
/// so zero-width windows make the schedule fully deterministic.
pub struct FixedIntervalScheduler {
    intervals: Vec<i64>,
    jitter: Vec<i64>,
    rng: Box<dyn RngCore + Send>,
}

impl FixedIntervalScheduler {
    pub fn new(
        intervals: Vec<i64>,
        jitter: Vec<i64>,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self> {
        if intervals.is_empty() {
            return Err(Error::Configuration(
                "interval list must not be empty".to_string(),
            ));
        }
        if intervals.len() != jitter.len() {
            return Err(Error::Configuration(format!(
                "interval and jitter lists differ in length ({} vs {})",
                intervals.len(),
                jitter.len()
            )));
        }
        if let Some(width) = jitter.iter().find(|width| **width < 0) {
            return Err(Error::Configuration(format!(
                "jitter window {width} is negative"
            )));
        }
        Ok(Self {
            intervals,
            jitter,
            rng,
        })
    }

    /// An omitted jitter list means no jitter at all.
    pub fn from_params(params: &ScheduleParams) -> Result<Self> {
        let jitter = if params.jitter.is_empty() {
            vec![0; params.intervals.len()]
        } else {
            params.jitter.clone()
        };
        Self::new(
            params.intervals.clone(),
            jitter,
            Box::new(StdRng::from_os_rng()),
        )
    }

    pub fn next_date(&mut self, completions_done: u32, anchor: Date) -> Date {
        let index = (completions_done as usize).min(self.intervals.len() - 1);
        let width = self.jitter[index];
        let jitter = if width == 0 {
            0
        } else {
            self.rng.random_range(-width..=width)
        };
        anchor + Duration::days(self.intervals[index] + jitter)
    }
}

/// Per-document scheduler lookup: the first override whose pattern matches
/// the document key wins, otherwise the default scheduler applies.
pub struct SchedulerSet {
    default: FixedIntervalScheduler,
    overrides: Vec<(Regex, FixedIntervalScheduler)>,
}

impl SchedulerSet {
    pub fn from_config(config: &Config) -> Result<Self> {
        let default = FixedIntervalScheduler::from_params(&config.scheduling)?;
        let mut overrides = Vec::new();
        for entry in &config.scheduling_overrides {
            let pattern = Regex::new(&entry.pattern).map_err(|err| {
                Error::Configuration(format!(
                    "bad scheduling override pattern {:?}: {err}",
                    entry.pattern
                ))
            })?;
            overrides.push((pattern, FixedIntervalScheduler::from_params(&entry.scheduling)?));
        }
        Ok(Self { default, overrides })
    }

    pub fn for_document(&mut self, document_key: &str) -> &mut FixedIntervalScheduler {
        let matched = self
            .overrides
            .iter()
            .position(|(pattern, _)| pattern.is_match(document_key));
        match matched {
            Some(index) => &mut self.overrides[index].1,
            None => &mut self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn seeded(intervals: Vec<i64>, jitter: Vec<i64>) -> FixedIntervalScheduler {
        FixedIntervalScheduler::new(intervals, jitter, Box::new(StdRng::seed_from_u64(7))).unwrap()
    }

    #[test]
    fn interval_indexed_by_completion_count() {
        let mut scheduler = seeded(vec![2, 6, 14], vec![0, 0, 0]);
        let anchor = date!(2026 - 08 - 06);
        assert_eq!(scheduler.next_date(0, anchor), anchor + Duration::days(2));
        assert_eq!(scheduler.next_date(1, anchor), anchor + Duration::days(6));
        assert_eq!(scheduler.next_date(2, anchor), anchor + Duration::days(14));
    }

    #[test]
    fn plateaus_at_final_interval() {
        let mut scheduler = seeded(vec![2, 6, 14], vec![0, 0, 0]);
        let anchor = date!(2026 - 08 - 06);
        assert_eq!(scheduler.next_date(10, anchor), anchor + Duration::days(14));
    }

    #[test]
    fn jitter_stays_within_window() {
        let mut scheduler = seeded(vec![10], vec![3]);
        let anchor = date!(2026 - 08 - 06);
        for _ in 0..200 {
            let next = scheduler.next_date(0, anchor);
            let offset = next - anchor;
            assert!(offset >= Duration::days(7) && offset <= Duration::days(13));
        }
    }

    #[test]
    fn mismatched_lists_are_rejected() {
        let result = FixedIntervalScheduler::new(
            vec![2, 6],
            vec![0],
            Box::new(StdRng::seed_from_u64(0)),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn empty_intervals_are_rejected() {
        let result =
            FixedIntervalScheduler::new(Vec::new(), Vec::new(), Box::new(StdRng::seed_from_u64(0)));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn negative_jitter_window_is_rejected() {
        let result = FixedIntervalScheduler::new(
            vec![2],
            vec![-1],
            Box::new(StdRng::seed_from_u64(0)),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn omitted_jitter_defaults_to_zero() {
        let params = ScheduleParams {
            intervals: vec![5],
            jitter: Vec::new(),
        };
        let mut scheduler = FixedIntervalScheduler::from_params(&params).unwrap();
        let anchor = date!(2026 - 08 - 06);
        assert_eq!(scheduler.next_date(0, anchor), anchor + Duration::days(5));
    }
}
