//! User records and their hourly access counters.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Identifier of a chat user.
pub type UserId = i64;

/// Hours in a day, one access counter each.
pub const HOURS: usize = 24;

/// Default number of bytes per serialized counter.
pub const DEFAULT_COUNTER_WIDTH: usize = 2;

/// Number of accesses a user made in each hour of the day.
///
/// Hours are taken modulo 24, so `23 + 1` wraps to midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessFrequencies {
    counts: [u64; HOURS],
    #[serde(skip, default = "default_width")]
    width: usize,
}

fn default_width() -> usize {
    DEFAULT_COUNTER_WIDTH
}

impl Default for AccessFrequencies {
    fn default() -> Self {
        Self {
            counts: [0; HOURS],
            width: DEFAULT_COUNTER_WIDTH,
        }
    }
}

impl AccessFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed counters serialized with `width` bytes each.
    pub fn with_width(width: usize) -> Result<Self> {
        validate_width(width)?;
        Ok(Self {
            counts: [0; HOURS],
            width,
        })
    }

    /// Decode counters stored as consecutive big-endian integers of `width`
    /// bytes. Input shorter than `24 * width` is zero-filled.
    pub fn from_bytes(bytes: &[u8], width: usize) -> Result<Self> {
        validate_width(width)?;

        let mut counts = [0u64; HOURS];
        for (count, chunk) in counts.iter_mut().zip(bytes.chunks(width)) {
            *count = chunk
                .iter()
                .fold(0u64, |acc, byte| acc.saturating_mul(256).saturating_add(u64::from(*byte)));
        }
        Ok(Self { counts, width })
    }

    /// Encode the counters as `24 * width` big-endian bytes. A counter too
    /// large for the width is stored as the width's maximum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HOURS * self.width);
        for count in self.counts {
            let be = count.to_be_bytes();
            if self.width >= be.len() {
                out.resize(out.len() + self.width - be.len(), 0);
                out.extend_from_slice(&be);
            } else {
                let max = (1u64 << (8 * self.width)) - 1;
                let clamped = count.min(max).to_be_bytes();
                out.extend_from_slice(&clamped[be.len() - self.width..]);
            }
        }
        out
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Record one access in `hour`.
    pub fn increment(&mut self, hour: u32) {
        let slot = &mut self.counts[hour_index(hour)];
        *slot = slot.saturating_add(1);
    }

    pub fn count(&self, hour: u32) -> u64 {
        self.counts[hour_index(hour)]
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.counts.iter().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    /// Share of all recorded accesses that fell in `hour`, in `0.0..=1.0`.
    /// Zero when nothing has been recorded.
    pub fn percent(&self, hour: u32) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(hour) as f64 / total as f64
    }
}

fn validate_width(width: usize) -> Result<()> {
    if width == 0 {
        return Err(StoreError::InvalidData(
            "counter width must be a positive number of bytes".to_string(),
        ));
    }
    Ok(())
}

fn hour_index(hour: u32) -> usize {
    (hour as usize) % HOURS
}

/// Persisted data of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    /// Interface language code, e.g. `"en"`.
    pub lang: String,
    pub frequencies: AccessFrequencies,
    /// Next id handed out by [`UserRecord::next_wizard_id`].
    pub next_wizard_id: u64,
}

impl UserRecord {
    /// A new user with no recorded activity.
    pub fn new(user_id: UserId, lang: impl Into<String>) -> Self {
        Self {
            user_id,
            first_name: String::new(),
            last_name: None,
            phone: None,
            lang: lang.into(),
            frequencies: AccessFrequencies::new(),
            next_wizard_id: 0,
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: Option<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last;
        self
    }

    /// Issue the next wizard id of this user. Ids are never reused.
    pub fn next_wizard_id(&mut self) -> u64 {
        let id = self.next_wizard_id;
        self.next_wizard_id += 1;
        id
    }

    /// Number of consecutive hours, starting at `start_hour`, in which this
    /// user's share of accesses is at least `percent`. At most 24.
    pub fn suggest_lifespan(&self, start_hour: u32, percent: f64) -> u32 {
        let mut hour = start_hour % HOURS as u32;
        let mut hours = 0;
        while hours < HOURS as u32 && self.frequencies.percent(hour) >= percent {
            hour = (hour + 1) % HOURS as u32;
            hours += 1;
        }
        hours
    }
}
