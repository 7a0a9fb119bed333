use tokio::sync::{Mutex, MutexGuard};

use temprank_core::GranteeId;

const LOCK_SHARDS: usize = 64;

/// Partitioned lock table serializing work per grantee.
///
/// Grantees hash onto a fixed set of shards, so two grantees only contend
/// when they share a shard.
pub(super) struct IdentityLocks {
    shards: Vec<Mutex<()>>,
}

impl IdentityLocks {
    pub(super) fn new() -> Self {
        Self {
            shards: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
        }
    }

    pub(super) async fn lock(&self, grantee_id: GranteeId) -> MutexGuard<'_, ()> {
        self.shards[Self::shard_index(grantee_id)].lock().await
    }

    fn shard_index(grantee_id: GranteeId) -> usize {
        let shard = grantee_id.as_uuid().as_u128() % LOCK_SHARDS as u128;
        usize::try_from(shard).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use temprank_core::GranteeId;

    use super::{IdentityLocks, LOCK_SHARDS};

    #[test]
    fn shard_index_is_stable_and_in_range() {
        for _ in 0..256 {
            let grantee_id = GranteeId::new();
            let index = IdentityLocks::shard_index(grantee_id);
            assert!(index < LOCK_SHARDS);
            assert_eq!(index, IdentityLocks::shard_index(grantee_id));
        }
    }
}
