//! IdGenerator port - ジョブ ID 生成の抽象化
//!
//! JobConfig の job_id は呼び出し側が決める。ID を持たない呼び出し側
//! （CLI など）のためにここで生成手段を提供する。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::ports::Clock;

/// IdGenerator は衝突しないジョブ ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> String;
}

/// ULID-based generator.
///
/// Ids are lowercase ULIDs, so they map to `switchyard-<ulid>` resource ids
/// unchanged and sort by creation time.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> String {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        ulid.to_string().to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RESOURCE_PREFIX, managed_resource_id};
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_job_id();
        let id2 = id_gen.generate_job_id();

        assert_ne!(id1, id2);
    }

    #[test]
    fn generated_ids_are_already_valid_resource_ids() {
        let id = UlidGenerator::new(SystemClock).generate_job_id();
        assert_eq!(managed_resource_id(&id), format!("{RESOURCE_PREFIX}{id}"));
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_job_id();
        let id2 = id_gen.generate_job_id();

        // ランダム部分があるので ID は異なるが、timestamp 部分（先頭 10 文字）は同じ
        assert_ne!(id1, id2);
        assert_eq!(id1[..10], id2[..10]);

        let ulid = Ulid::from_string(&id1.to_ascii_uppercase()).unwrap();
        assert_eq!(ulid.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
