//! Network-adjusted time.
//!
//! Adjusted time is system time plus a correction taken from the NTP
//! offset when one is known, otherwise from the median of peer-reported
//! offsets. Corrections beyond the sanity bound are discarded so that a
//! cluster of hostile peers cannot drag the clock.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Sentinel meaning "no usable offset".
pub const TIME_OFFSET_UNKNOWN: i64 = i64::MAX;

/// Largest clock correction ever applied, in seconds.
const MAX_CLOCK_OFFSET: i64 = 70 * 60;

/// Peer samples required before the median is trusted.
const MIN_PEER_SAMPLES: usize = 5;

/// Cap on retained peer samples.
const MAX_PEER_SAMPLES: usize = 200;

/// Clock state shared across the node.
pub struct TimeData {
    /// Raw peer-reported offsets.
    samples: Mutex<Vec<i64>>,
    /// Median peer offset, or `TIME_OFFSET_UNKNOWN`.
    peer_offset: AtomicI64,
    /// NTP-measured offset, or `TIME_OFFSET_UNKNOWN`.
    ntp_offset: AtomicI64,
}

impl TimeData {
    /// Fresh clock state with no samples.
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            peer_offset: AtomicI64::new(TIME_OFFSET_UNKNOWN),
            ntp_offset: AtomicI64::new(TIME_OFFSET_UNKNOWN),
        }
    }

    /// Raw system time in seconds.
    pub fn system_time(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Record a peer-reported clock offset and refresh the median.
    pub fn add_peer_sample(&self, offset: i64) {
        let mut samples = self.samples.lock();
        if samples.len() >= MAX_PEER_SAMPLES {
            return;
        }
        samples.push(offset);
        if samples.len() < MIN_PEER_SAMPLES {
            return;
        }
        let mut sorted = samples.clone();
        sorted.sort_unstable();
        let median = sorted[sorted.len() / 2];
        if median.abs() <= MAX_CLOCK_OFFSET {
            self.peer_offset.store(median, Ordering::SeqCst);
        } else {
            self.peer_offset
                .store(TIME_OFFSET_UNKNOWN, Ordering::SeqCst);
            warn!(
                median_secs = median,
                "Peer clock offsets exceed sanity bound, ignoring"
            );
        }
    }

    /// Store an NTP measurement; saturating values mark it unknown.
    pub fn set_ntp_offset(&self, offset: i64) {
        let stored = if offset.abs() <= MAX_CLOCK_OFFSET {
            offset
        } else {
            TIME_OFFSET_UNKNOWN
        };
        self.ntp_offset.store(stored, Ordering::SeqCst);
    }

    /// Median of peer offsets, or `TIME_OFFSET_UNKNOWN`.
    pub fn peer_offset(&self) -> i64 {
        self.peer_offset.load(Ordering::SeqCst)
    }

    /// Last NTP offset, or `TIME_OFFSET_UNKNOWN`.
    pub fn ntp_offset(&self) -> i64 {
        self.ntp_offset.load(Ordering::SeqCst)
    }

    /// Correction currently in effect.
    fn offset(&self) -> i64 {
        let ntp = self.ntp_offset();
        if ntp != TIME_OFFSET_UNKNOWN {
            return ntp;
        }
        let peer = self.peer_offset();
        if peer != TIME_OFFSET_UNKNOWN {
            return peer;
        }
        0
    }

    /// Network-adjusted time in seconds.
    pub fn adjusted_time(&self) -> i64 {
        self.system_time() + self.offset()
    }
}

impl Default for TimeData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_samples_means_no_correction() {
        let time = TimeData::new();
        assert_eq!(time.peer_offset(), TIME_OFFSET_UNKNOWN);
        assert_eq!(time.ntp_offset(), TIME_OFFSET_UNKNOWN);
        let delta = (time.adjusted_time() - time.system_time()).abs();
        assert!(delta <= 1);
    }

    #[test]
    fn test_median_of_peer_samples() {
        let time = TimeData::new();
        for offset in [-3, 10, 12, 11, 9] {
            time.add_peer_sample(offset);
        }
        assert_eq!(time.peer_offset(), 10);
    }

    #[test]
    fn test_few_samples_not_trusted() {
        let time = TimeData::new();
        time.add_peer_sample(60);
        time.add_peer_sample(60);
        assert_eq!(time.peer_offset(), TIME_OFFSET_UNKNOWN);
    }

    #[test]
    fn test_saturated_median_is_unknown() {
        let time = TimeData::new();
        for _ in 0..5 {
            time.add_peer_sample(2 * MAX_CLOCK_OFFSET);
        }
        assert_eq!(time.peer_offset(), TIME_OFFSET_UNKNOWN);
    }

    #[test]
    fn test_ntp_wins_over_peers() {
        let time = TimeData::new();
        for _ in 0..5 {
            time.add_peer_sample(30);
        }
        time.set_ntp_offset(-5);
        let system = time.system_time();
        let adjusted = time.adjusted_time();
        assert!((adjusted - (system - 5)).abs() <= 1);
    }

    #[test]
    fn test_ntp_out_of_bounds_marked_unknown() {
        let time = TimeData::new();
        time.set_ntp_offset(3 * MAX_CLOCK_OFFSET);
        assert_eq!(time.ntp_offset(), TIME_OFFSET_UNKNOWN);
    }
}
