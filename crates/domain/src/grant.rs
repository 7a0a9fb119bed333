//! Temporary rank grants and their time accounting.
//!
//! While a grant is active its deadline is the absolute `expires_at_ms`
//! instant. While it is paused the deadline is meaningless and the countdown
//! lives in `frozen_remaining_ms` instead.

use std::fmt::{Display, Formatter};

use temprank_core::{AppResult, GranteeId, NonEmptyString};

/// Name of a privilege group, stored as given and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RankName(NonEmptyString);

impl RankName {
    /// Creates a validated rank name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the rank name exactly as it was given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether `other` names the same rank, ignoring case.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.as_str().to_lowercase() == other.to_lowercase()
    }
}

impl Display for RankName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One grantee's active temporary rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    grantee_id: GranteeId,
    rank_name: RankName,
    expires_at_ms: i64,
    paused: bool,
    frozen_remaining_ms: i64,
}

impl GrantRecord {
    /// Creates a running grant that expires at `expires_at_ms`.
    #[must_use]
    pub fn new(grantee_id: GranteeId, rank_name: RankName, expires_at_ms: i64) -> Self {
        Self {
            grantee_id,
            rank_name,
            expires_at_ms,
            paused: false,
            frozen_remaining_ms: 0,
        }
    }

    /// Creates a grant that starts frozen with `remaining_ms` on the clock.
    #[must_use]
    pub fn new_paused(
        grantee_id: GranteeId,
        rank_name: RankName,
        now_ms: i64,
        remaining_ms: i64,
    ) -> Self {
        Self {
            grantee_id,
            rank_name,
            expires_at_ms: now_ms.saturating_add(remaining_ms),
            paused: true,
            frozen_remaining_ms: remaining_ms.max(0),
        }
    }

    /// Rebuilds a grant from persisted fields without altering them.
    #[must_use]
    pub fn from_storage(
        grantee_id: GranteeId,
        rank_name: RankName,
        expires_at_ms: i64,
        paused: bool,
        frozen_remaining_ms: i64,
    ) -> Self {
        Self {
            grantee_id,
            rank_name,
            expires_at_ms,
            paused,
            frozen_remaining_ms,
        }
    }

    /// Returns the grantee holding the rank.
    #[must_use]
    pub fn grantee_id(&self) -> GranteeId {
        self.grantee_id
    }

    /// Returns the granted rank.
    #[must_use]
    pub fn rank_name(&self) -> &RankName {
        &self.rank_name
    }

    /// Returns the absolute expiry in epoch milliseconds.
    ///
    /// Only meaningful while the grant is not paused.
    #[must_use]
    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    /// Returns whether the countdown is frozen.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns the frozen countdown. Only meaningful while paused.
    #[must_use]
    pub fn frozen_remaining_ms(&self) -> i64 {
        self.frozen_remaining_ms
    }

    /// Returns the time left on the grant as seen at `now_ms`.
    #[must_use]
    pub fn remaining_at(&self, now_ms: i64) -> i64 {
        if self.paused {
            return self.frozen_remaining_ms;
        }

        self.expires_at_ms.saturating_sub(now_ms).max(0)
    }

    /// Returns whether a running grant has reached its expiry.
    ///
    /// Paused grants never expire.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        !self.paused && now_ms >= self.expires_at_ms
    }

    /// Returns whether the grant is for `rank_name`, ignoring case.
    #[must_use]
    pub fn holds_rank(&self, rank_name: &str) -> bool {
        self.rank_name.matches(rank_name)
    }

    /// Adds `added_ms` to the remaining time and returns the new total.
    ///
    /// A paused grant stays paused; only its frozen countdown grows.
    pub fn extend(&mut self, now_ms: i64, added_ms: i64) -> i64 {
        let total_ms = self.remaining_at(now_ms).saturating_add(added_ms);
        if self.paused {
            self.frozen_remaining_ms = total_ms;
        } else {
            self.expires_at_ms = now_ms.saturating_add(total_ms);
        }

        total_ms
    }

    /// Freezes the countdown. Returns `false` when already paused.
    pub fn freeze(&mut self, now_ms: i64) -> bool {
        if self.paused {
            return false;
        }

        self.frozen_remaining_ms = self.remaining_at(now_ms);
        self.paused = true;
        true
    }

    /// Restarts the countdown from the frozen value. Returns `false` when
    /// the grant is already running.
    pub fn thaw(&mut self, now_ms: i64) -> bool {
        if !self.paused {
            return false;
        }

        self.expires_at_ms = now_ms.saturating_add(self.frozen_remaining_ms);
        self.frozen_remaining_ms = 0;
        self.paused = false;
        true
    }
}
