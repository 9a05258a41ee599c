mod clock;
mod errors;

pub use clock::{Renewal, TokenClock};
pub use errors::TokenError;

#[cfg(test)]
pub(crate) use clock::test_utils;
