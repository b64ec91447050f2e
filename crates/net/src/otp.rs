//! One-time passcode challenges
//!
//! One active challenge per email. Issuing again replaces the previous
//! code; a successful verification consumes it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::debug;

/// Shortest and longest supported code lengths
pub const MIN_CODE_LENGTH: u32 = 4;
pub const MAX_CODE_LENGTH: u32 = 9;

#[derive(Debug, Clone)]
struct Challenge {
    code: String,
    issued_at: DateTime<Utc>,
    verified: bool,
}

/// Outstanding challenges keyed by normalized email
#[derive(Debug)]
pub struct OtpStore {
    challenges: HashMap<String, Challenge>,
    validity: Duration,
    code_length: u32,
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl OtpStore {
    pub fn new(validity: Duration, code_length: u32) -> Self {
        Self {
            challenges: HashMap::new(),
            validity,
            code_length: code_length.clamp(MIN_CODE_LENGTH, MAX_CODE_LENGTH),
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    fn generate_code(&self) -> String {
        let upper = 10u32.pow(self.code_length);
        let n = rand::thread_rng().gen_range(0..upper);
        format!("{:0width$}", n, width = self.code_length as usize)
    }

    /// Issue a fresh code for `email`, replacing any active one
    pub fn issue(&mut self, email: &str, now: DateTime<Utc>) -> String {
        let code = self.generate_code();
        let replaced = self
            .challenges
            .insert(
                normalize(email),
                Challenge {
                    code: code.clone(),
                    issued_at: now,
                    verified: false,
                },
            )
            .is_some();
        debug!(replaced, "OTP issued");
        code
    }

    fn is_live(&self, challenge: &Challenge, now: DateTime<Utc>) -> bool {
        !challenge.verified && now - challenge.issued_at <= self.validity
    }

    /// Check a submitted code. A match within the validity window consumes
    /// the challenge; anything else leaves it in place.
    pub fn verify(&mut self, email: &str, code: &str, now: DateTime<Utc>) -> bool {
        let key = normalize(email);
        let Some(challenge) = self.challenges.get(&key) else {
            return false;
        };

        if !self.is_live(challenge, now) || challenge.code != code.trim() {
            return false;
        }

        if let Some(challenge) = self.challenges.get_mut(&key) {
            challenge.verified = true;
        }
        true
    }

    /// Drop a challenge whose code could not be delivered
    pub fn revoke(&mut self, email: &str) {
        self.challenges.remove(&normalize(email));
    }

    /// Evict expired or consumed challenges. Returns how many were removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.challenges.len();
        let validity = self.validity;
        self.challenges
            .retain(|_, c| !c.verified && now - c.issued_at <= validity);
        before - self.challenges.len()
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> OtpStore {
        OtpStore::new(Duration::seconds(300), 6)
    }

    #[test]
    fn test_code_shape() {
        let mut otps = store();
        let code = otps.issue("a@example.com", Utc::now());
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn test_verify_consumes_code() {
        let mut otps = store();
        let now = Utc::now();
        let code = otps.issue("Asha@Example.com", now);

        assert!(!otps.verify("asha@example.com", "not-it", now));
        assert!(otps.verify(" asha@example.com ", &code, now + Duration::seconds(10)));
        assert!(!otps.verify("asha@example.com", &code, now + Duration::seconds(11)));

        // Consumed challenges are swept regardless of age
        assert_eq!(otps.sweep(now + Duration::seconds(12)), 1);
        assert!(otps.is_empty());
    }

    #[test]
    fn test_expired_code_rejected() {
        let mut otps = store();
        let now = Utc::now();
        let code = otps.issue("a@example.com", now);

        assert!(!otps.verify("a@example.com", &code, now + Duration::seconds(301)));
    }

    #[test]
    fn test_reissue_replaces_previous_code() {
        let mut otps = store();
        let now = Utc::now();
        let first = otps.issue("a@example.com", now);
        let second = otps.issue("a@example.com", now);

        assert_eq!(otps.len(), 1);
        if first != second {
            assert!(!otps.verify("a@example.com", &first, now));
        }
        assert!(otps.verify("a@example.com", &second, now));
    }

    #[test]
    fn test_sweep_evicts_expired() {
        let mut otps = store();
        let now = Utc::now();
        otps.issue("old@example.com", now - Duration::seconds(600));
        otps.issue("new@example.com", now);

        assert_eq!(otps.sweep(now), 1);
        assert_eq!(otps.len(), 1);
    }

    #[test]
    fn test_code_length_clamped() {
        let mut otps = OtpStore::new(Duration::seconds(60), 20);
        assert_eq!(otps.issue("a@example.com", Utc::now()).len(), MAX_CODE_LENGTH as usize);
    }
}
