//! Round-trip time telemetry for the transport endpoint.
//!
//! Implements RFC 6298 smoothing. The estimate is informational:
//! retransmission runs on the send window's fixed timeout, and the
//! endpoint only feeds samples from first transmissions (a retransmitted
//! sequence gives an ambiguous sample and is skipped).

use std::time::Duration;

/// RTT smoothing constants.
pub mod constants {
    use std::time::Duration;

    /// Reported timeout before the first RTT sample.
    pub const INITIAL_RTO: Duration = Duration::from_millis(1000);

    /// Lower clamp on the reported timeout.
    pub const MIN_RTO: Duration = Duration::from_millis(100);

    /// Upper clamp on the reported timeout.
    pub const MAX_RTO: Duration = Duration::from_millis(60000);

    /// Alpha for SRTT smoothing (0.125 = 1/8).
    pub const SRTT_ALPHA: f64 = 0.125;

    /// Beta for RTTVAR smoothing (0.25 = 1/4).
    pub const RTTVAR_BETA: f64 = 0.25;

    /// K multiplier for the timeout calculation (4.0 per RFC 6298).
    pub const RTO_K: f64 = 4.0;

    /// Minimum clock granularity for the timeout calculation.
    pub const MIN_RTO_GRANULARITY_MS: f64 = 100.0;
}

/// RTT estimator implementing RFC 6298.
///
/// Maintains smoothed RTT (SRTT) and RTT variance (RTTVAR), and derives
/// the retransmission timeout a TCP-style sender would use.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// Smoothed RTT in milliseconds.
    srtt: f64,
    /// RTT variance in milliseconds.
    rttvar: f64,
    /// Derived retransmission timeout.
    rto: Duration,
    /// Whether the first sample has been taken.
    initialized: bool,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl RttEstimator {
    /// Create a new RTT estimator with initial values.
    pub fn new() -> Self {
        Self {
            srtt: 0.0,
            rttvar: 0.0,
            rto: constants::INITIAL_RTO,
            initialized: false,
        }
    }

    /// Update the estimate with a new sample.
    ///
    /// RFC 6298:
    /// - First measurement: SRTT = sample, RTTVAR = sample / 2
    /// - Subsequent: RTTVAR = 0.75 * RTTVAR + 0.25 * |SRTT - sample|,
    ///   SRTT = 0.875 * SRTT + 0.125 * sample
    pub fn update(&mut self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;

        if !self.initialized {
            self.srtt = sample_ms;
            self.rttvar = sample_ms / 2.0;
            self.initialized = true;
        } else {
            self.rttvar = (1.0 - constants::RTTVAR_BETA) * self.rttvar
                + constants::RTTVAR_BETA * (self.srtt - sample_ms).abs();
            self.srtt =
                (1.0 - constants::SRTT_ALPHA) * self.srtt + constants::SRTT_ALPHA * sample_ms;
        }

        // RTO = SRTT + max(G, K * RTTVAR), clamped to [MIN_RTO, MAX_RTO]
        let rto_ms =
            self.srtt + f64::max(constants::MIN_RTO_GRANULARITY_MS, constants::RTO_K * self.rttvar);
        let rto_ms = rto_ms.clamp(
            constants::MIN_RTO.as_millis() as f64,
            constants::MAX_RTO.as_millis() as f64,
        );

        self.rto = Duration::from_millis(rto_ms as u64);
    }

    /// Get the current smoothed RTT.
    pub fn srtt(&self) -> Duration {
        Duration::from_secs_f64(self.srtt / 1000.0)
    }

    /// Get the current smoothed RTT in milliseconds.
    pub fn srtt_ms(&self) -> f64 {
        self.srtt
    }

    /// Get the current RTT variance.
    pub fn rttvar(&self) -> Duration {
        Duration::from_secs_f64(self.rttvar / 1000.0)
    }

    /// Get the derived retransmission timeout.
    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Check if the estimator has taken at least one sample.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
