//! Discrete simulation timeline.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Simulation time, in ticks of the model's own unit.
pub type Time = u64;

/// The `start..=end` tick grid of a model, advanced by `step`.
///
/// A timeline may also declare the subset of its ticks at which faults are
/// injected when scenarios are enumerated. Without one, every tick is an
/// injection point.
///
/// # Examples
///
/// ```
/// use faultprop::Timeline;
///
/// let timeline = Timeline::new(0, 20, 5).unwrap();
/// assert_eq!(timeline.ticks().collect::<Vec<_>>(), vec![0, 5, 10, 15, 20]);
/// assert!(timeline.contains(15));
/// assert!(!timeline.contains(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeline")]
pub struct Timeline {
    start: Time,
    end: Time,
    step: Time,
    injection_times: Option<Vec<Time>>,
}

/// Wire form of a [`Timeline`], checked on the way in.
#[derive(Deserialize)]
struct RawTimeline {
    start: Time,
    end: Time,
    step: Time,
    #[serde(default)]
    injection_times: Option<Vec<Time>>,
}

impl TryFrom<RawTimeline> for Timeline {
    type Error = ValidationError;

    fn try_from(raw: RawTimeline) -> Result<Self, Self::Error> {
        let timeline = Self::new(raw.start, raw.end, raw.step)?;
        match raw.injection_times {
            Some(times) => timeline.with_injection_times(times),
            None => Ok(timeline),
        }
    }
}

impl Timeline {
    /// Creates a timeline.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeline` if `step` is zero or
    /// `end < start`.
    pub fn new(start: Time, end: Time, step: Time) -> Result<Self, ValidationError> {
        if step == 0 {
            return Err(ValidationError::InvalidTimeline {
                reason: "step must be > 0".to_string(),
            });
        }
        if end < start {
            return Err(ValidationError::InvalidTimeline {
                reason: format!("end ({end}) must not precede start ({start})"),
            });
        }
        Ok(Self {
            start,
            end,
            step,
            injection_times: None,
        })
    }

    /// Restricts fault injection to the given ticks.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::TimeOutsideTimeline` for any time that is not
    /// a tick, and `ValidationError::InvalidTimeline` for an empty list.
    pub fn with_injection_times(
        mut self,
        times: impl IntoIterator<Item = Time>,
    ) -> Result<Self, ValidationError> {
        let mut times: Vec<Time> = times.into_iter().collect();
        if times.is_empty() {
            return Err(ValidationError::InvalidTimeline {
                reason: "injection time list is empty".to_string(),
            });
        }
        for &t in &times {
            self.ensure_contains(t)?;
        }
        times.sort_unstable();
        times.dedup();
        self.injection_times = Some(times);
        Ok(self)
    }

    /// First tick.
    pub const fn start(&self) -> Time {
        self.start
    }

    /// Last permitted time; the final tick is the last grid point at or before it.
    pub const fn end(&self) -> Time {
        self.end
    }

    /// Distance between consecutive ticks, never zero.
    pub const fn step(&self) -> Time {
        self.step
    }

    /// Every tick of the timeline, ascending.
    pub fn ticks(&self) -> impl Iterator<Item = Time> {
        self.ticks_from(self.start)
    }

    /// Ticks at or after `from`, ascending.
    pub fn ticks_from(&self, from: Time) -> impl Iterator<Item = Time> {
        let step = self.step;
        let end = self.end;
        let first = if from <= self.start {
            self.start
        } else {
            let offset = from - self.start;
            self.start + offset.div_ceil(step) * step
        };
        std::iter::successors(Some(first), move |t| t.checked_add(step)).take_while(move |t| *t <= end)
    }

    /// Number of ticks.
    pub fn len(&self) -> usize {
        self.ticks().count()
    }

    /// Always false: a valid timeline has at least its start tick.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `time` lies on the tick grid.
    pub const fn contains(&self, time: Time) -> bool {
        time >= self.start && time <= self.end && (time - self.start) % self.step == 0
    }

    /// Ticks at which scenario enumeration injects faults.
    pub fn injection_points(&self) -> Vec<Time> {
        match &self.injection_times {
            Some(times) => times.clone(),
            None => self.ticks().collect(),
        }
    }

    /// Fails unless `time` is a tick of this timeline.
    pub fn ensure_contains(&self, time: Time) -> Result<(), ValidationError> {
        if self.contains(time) {
            Ok(())
        } else {
            Err(ValidationError::TimeOutsideTimeline {
                time,
                start: self.start,
                end: self.end,
                step: self.step,
            })
        }
    }
}
