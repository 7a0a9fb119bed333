//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod duration;
mod grant;

pub use duration::{
    EXPIRED_LABEL, GrantDuration, MILLIS_PER_DAY, MILLIS_PER_HOUR, MILLIS_PER_MINUTE,
    MILLIS_PER_MONTH, MILLIS_PER_SECOND, format_duration, parse_duration_millis,
};
pub use grant::{GrantRecord, RankName};
