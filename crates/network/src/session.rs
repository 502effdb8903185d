//! Session state machine and reconnect policy
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──tcp-open──▶ Handshaking
//! Handshaking  ──signature + start message──▶ LoggedIn
//! LoggedIn     ──rc handshake type──▶ RcMode
//! any          ──disconnect / io error / kick──▶ Closing ──▶ Disconnected
//! ```

use reborn_core::DisconnectReason;
use std::time::Duration;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Handshaking,
    LoggedIn,

    /// Logged in with the RC capability set; world handling unchanged
    RcMode,

    Closing,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Handshaking | Self::LoggedIn | Self::RcMode)
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::RcMode)
    }
}

/// Fixed-backoff reconnect policy
///
/// Counts attempts across a single outage; a successful login resets
/// the counter. Only transient disconnect reasons qualify.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    backoff: Duration,
    max_attempts: u32,
    attempts_made: u32,
}

impl ReconnectPolicy {
    pub fn new(backoff: Duration, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts,
            attempts_made: 0,
        }
    }

    /// Delay before the next attempt, or None when the policy says stop.
    pub fn next_delay(&mut self, reason: &DisconnectReason) -> Option<Duration> {
        if !reason.is_transient() {
            return None;
        }
        if self.attempts_made >= self.max_attempts {
            return None;
        }
        self.attempts_made += 1;
        Some(self.backoff)
    }

    /// A login succeeded; the outage is over.
    pub fn reset(&mut self) {
        self.attempts_made = 0;
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_reasons_retry_up_to_max() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), 2);
        let reason = DisconnectReason::ConnectionLost;

        assert_eq!(policy.next_delay(&reason), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(&reason), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(&reason), None);
    }

    #[test]
    fn test_auth_failure_never_retries() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), 5);
        let reason = DisconnectReason::LoginRejected("bad password".into());
        assert_eq!(policy.next_delay(&reason), None);
        assert_eq!(policy.attempts_made(), 0);
    }

    #[test]
    fn test_reset_after_login() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), 1);
        let reason = DisconnectReason::KeepaliveTimeout;

        assert!(policy.next_delay(&reason).is_some());
        assert!(policy.next_delay(&reason).is_none());

        policy.reset();
        assert!(policy.next_delay(&reason).is_some());
    }

    #[test]
    fn test_state_predicates() {
        assert!(SessionState::LoggedIn.is_logged_in());
        assert!(SessionState::RcMode.is_logged_in());
        assert!(SessionState::Handshaking.is_connected());
        assert!(!SessionState::Handshaking.is_logged_in());
        assert!(!SessionState::Closing.is_connected());
    }
}
