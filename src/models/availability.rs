use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Venue opening hours and room capacity. The latest stored row wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotConfig {
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub max_concurrent_rooms: u32,
}

impl SlotConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.slot_duration_minutes == 0 {
            return Err(AppError::Configuration(
                "slot duration must be positive".to_string(),
            ));
        }
        if self.max_concurrent_rooms == 0 {
            return Err(AppError::Configuration(
                "max concurrent rooms must be positive".to_string(),
            ));
        }
        if self.opening_time >= self.closing_time {
            return Err(AppError::Configuration(format!(
                "opening time {} must be before closing time {}",
                self.opening_time, self.closing_time
            )));
        }
        Ok(())
    }

    /// Slot start times from opening up to, but excluding, closing.
    pub fn slot_times(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(i64::from(self.slot_duration_minutes.max(1)));
        let mut times = Vec::new();
        let mut t = self.opening_time;
        while t < self.closing_time {
            times.push(t);
            let (next, wrapped) = t.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            t = next;
        }
        times
    }

    pub fn is_slot_start(&self, time: NaiveTime) -> bool {
        self.slot_times().contains(&time)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    /// "HH:MM"
    pub time: String,
    pub status: SlotStatus,
    pub available_rooms: u32,
    pub max_rooms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub day_name: String,
    pub slots: Vec<SlotAvailability>,
}
