//! Router - 宣言されたリソース量から実行 tier を決める
//!
//! # ポリシー（昇順に評価、最初に一致したものを採用）
//! | tier | CPU (mCPU) | Memory (MiB) | Duration (s) |
//! |---|---|---|---|
//! | CloudTasksTier | ≤ 500 | ≤ 512 | ≤ 600 |
//! | CloudRunJobTier | ≤ 4000 | ≤ 8192 | ≤ 3600 |
//! | CloudBatchTier | それ以外 | | |
//!
//! 未指定（0）のフィールドは最下位 tier の上限内として扱う。
//! つまりリソース要求のないジョブは最も安い tier に行く（0 は「無制限」ではない）。

use tracing::debug;

use crate::domain::{AssignedService, Resources};

/// Inclusive upper bounds of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub tier: AssignedService,
    pub max_cpu_millis: u32,
    pub max_memory_mib: u32,
    pub max_duration_secs: u64,
}

pub const CLOUD_TASKS_LIMITS: TierLimits = TierLimits {
    tier: AssignedService::CloudTasksTier,
    max_cpu_millis: 500,
    max_memory_mib: 512,
    max_duration_secs: 600,
};

pub const CLOUD_RUN_JOB_LIMITS: TierLimits = TierLimits {
    tier: AssignedService::CloudRunJobTier,
    max_cpu_millis: 4000,
    max_memory_mib: 8192,
    max_duration_secs: 3600,
};

/// The dimension that pushed a job past a tier's limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exceeded {
    Cpu,
    Memory,
    Duration,
}

impl TierLimits {
    /// First dimension (cpu, memory, duration) over the limit, if any.
    pub fn exceeded_by(&self, r: &Resources) -> Option<Exceeded> {
        if r.cpu_millis > self.max_cpu_millis {
            Some(Exceeded::Cpu)
        } else if r.memory_mib > self.max_memory_mib {
            Some(Exceeded::Memory)
        } else if r.max_run_duration_secs > self.max_duration_secs {
            Some(Exceeded::Duration)
        } else {
            None
        }
    }

    pub fn admits(&self, r: &Resources) -> bool {
        self.exceeded_by(r).is_none()
    }
}

/// An auditable routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub tier: AssignedService,
    /// Why the job did not fit the tier just below the chosen one.
    /// `None` for the cheapest tier.
    pub reason: Option<Exceeded>,
}

/// Fixed-threshold classifier. Total: always yields exactly one tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, resources: Option<&Resources>) -> AssignedService {
        self.explain(resources).tier
    }

    pub fn explain(&self, resources: Option<&Resources>) -> Decision {
        let r = resources.copied().unwrap_or_default();

        let mut reason = None;
        for limits in [CLOUD_TASKS_LIMITS, CLOUD_RUN_JOB_LIMITS] {
            match limits.exceeded_by(&r) {
                None => return self.decided(&r, limits.tier, reason),
                Some(dim) => reason = Some(dim),
            }
        }
        self.decided(&r, AssignedService::CloudBatchTier, reason)
    }

    fn decided(
        &self,
        r: &Resources,
        tier: AssignedService,
        reason: Option<Exceeded>,
    ) -> Decision {
        debug!(
            cpu_millis = r.cpu_millis,
            memory_mib = r.memory_mib,
            duration_secs = r.max_run_duration_secs,
            %tier,
            ?reason,
            "routed job"
        );
        Decision { tier, reason }
    }
}

/// Shorthand for `Router::new().route(resources)`.
pub fn route(resources: Option<&Resources>) -> AssignedService {
    Router::new().route(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn res(cpu: u32, mem: u32, secs: u64) -> Resources {
        Resources::new(cpu, mem, secs)
    }

    #[rstest]
    #[case::tiny(100, 128, 30)]
    #[case::all_at_limit(500, 512, 600)]
    #[case::cpu_at_limit(500, 1, 1)]
    #[case::memory_at_limit(1, 512, 1)]
    #[case::duration_at_limit(1, 1, 600)]
    fn small_jobs_go_to_cloud_tasks(#[case] cpu: u32, #[case] mem: u32, #[case] secs: u64) {
        assert_eq!(
            route(Some(&res(cpu, mem, secs))),
            AssignedService::CloudTasksTier
        );
    }

    #[rstest]
    #[case::cpu_over_cheap(501, 512, 600)]
    #[case::memory_over_cheap(500, 513, 600)]
    #[case::duration_over_cheap(500, 512, 601)]
    #[case::all_at_medium_limit(4000, 8192, 3600)]
    #[case::typical(2000, 4096, 1800)]
    fn medium_jobs_go_to_cloud_run(#[case] cpu: u32, #[case] mem: u32, #[case] secs: u64) {
        assert_eq!(
            route(Some(&res(cpu, mem, secs))),
            AssignedService::CloudRunJobTier
        );
    }

    #[rstest]
    #[case::cpu_over_medium(4001, 1, 1)]
    #[case::memory_over_medium(1, 8193, 1)]
    #[case::duration_over_medium(1, 1, 3601)]
    #[case::everything_huge(32000, 65536, 86400)]
    fn anything_over_medium_goes_to_batch(#[case] cpu: u32, #[case] mem: u32, #[case] secs: u64) {
        assert_eq!(
            route(Some(&res(cpu, mem, secs))),
            AssignedService::CloudBatchTier
        );
    }

    #[test]
    fn zero_requirements_mean_cheapest_tier() {
        assert_eq!(route(Some(&res(0, 0, 0))), AssignedService::CloudTasksTier);
        assert_eq!(route(None), AssignedService::CloudTasksTier);
    }

    #[test]
    fn large_cpu_and_memory_go_to_batch_even_without_duration() {
        assert_eq!(
            route(Some(&res(8000, 16384, 0))),
            AssignedService::CloudBatchTier
        );
    }

    #[test]
    fn explain_reports_the_dimension_that_escalated() {
        let router = Router::new();

        let d = router.explain(Some(&res(100, 100, 900)));
        assert_eq!(d.tier, AssignedService::CloudRunJobTier);
        assert_eq!(d.reason, Some(Exceeded::Duration));

        let d = router.explain(Some(&res(100, 9000, 10)));
        assert_eq!(d.tier, AssignedService::CloudBatchTier);
        assert_eq!(d.reason, Some(Exceeded::Memory));

        let d = router.explain(None);
        assert_eq!(d.reason, None);
    }
}
