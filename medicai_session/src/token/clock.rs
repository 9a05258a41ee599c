use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::errors::TokenError;

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: Option<serde_json::Number>,
}

/// When the next renewal should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// The deadline has passed; renew without waiting.
    Immediate,
    /// Renew after this delay.
    After(Duration),
}

/// Reads token expiry and turns it into renewal deadlines.
#[derive(Debug, Clone, Copy)]
pub struct TokenClock {
    lead: TimeDelta,
}

impl Default for TokenClock {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl TokenClock {
    pub fn new(lead: Duration) -> Self {
        Self {
            lead: TimeDelta::from_std(lead).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn lead(&self) -> TimeDelta {
        self.lead
    }

    /// Decode the `exp` claim of a JWT without verifying its signature.
    ///
    /// The backend verifies signatures; the client only needs to know when the
    /// token stops being useful.
    pub fn expiry_of(&self, token: &str) -> Result<DateTime<Utc>, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(TokenError::InvalidTokenFormat);
        }

        jsonwebtoken::decode_header(token)?;

        let payload = URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('='))?;
        let claim: ExpiryClaim = serde_json::from_slice(&payload)?;
        let exp = claim.exp.ok_or(TokenError::MissingExpiry)?;

        let seconds = exp
            .as_i64()
            .or_else(|| exp.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| TokenError::InvalidExpiry(exp.to_string()))?;

        DateTime::from_timestamp(seconds, 0).ok_or_else(|| TokenError::InvalidExpiry(exp.to_string()))
    }

    /// Expiry minus the renewal lead time.
    pub fn renewal_deadline(&self, expiry: DateTime<Utc>) -> DateTime<Utc> {
        expiry.checked_sub_signed(self.lead).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// A deadline at or before `now` is [`Renewal::Immediate`], never a skipped timer.
    pub fn renewal_at(&self, deadline: DateTime<Utc>, now: DateTime<Utc>) -> Renewal {
        match (deadline - now).to_std() {
            Ok(delay) if !delay.is_zero() => Renewal::After(delay),
            _ => Renewal::Immediate,
        }
    }

    /// Shorthand for `renewal_at(renewal_deadline(expiry), now)`.
    pub fn schedule_for(&self, expiry: DateTime<Utc>, now: DateTime<Utc>) -> Renewal {
        self.renewal_at(self.renewal_deadline(expiry), now)
    }
}
