//! Cost estimation from fixed lookup tables
//!
//! The estimate is a placeholder heuristic: it reads the phase and role tables
//! from configuration and ignores plan content. Taking the plan keeps the
//! signature stable for estimators that scale with plan size.

use crate::plan::Plan;
use autocode_core::config::EstimatorConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

const WEEKS_PER_MONTH: u64 = 4;

/// Project duration, staffing and cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub estimated_duration_weeks: u32,
    pub estimated_team_size: u32,
    pub estimated_total_cost_usd: u64,
}

/// Estimate duration, team size and total cost
pub fn estimate_cost(plan: &Plan, tables: &EstimatorConfig) -> CostEstimate {
    // Saturating so oversized tables clamp instead of overflowing
    let weeks = tables
        .phases
        .iter()
        .fold(0u32, |acc, p| acc.saturating_add(p.weeks));
    let team_size = tables
        .roles
        .iter()
        .fold(0u32, |acc, r| acc.saturating_add(r.headcount));
    let monthly_payroll = tables.roles.iter().fold(0u64, |acc, r| {
        acc.saturating_add(r.monthly_salary_usd.saturating_mul(u64::from(r.headcount)))
    });

    // Integer division truncates
    let total_cost = monthly_payroll.saturating_mul(u64::from(weeks)) / WEEKS_PER_MONTH;

    debug!(
        tasks = plan.task_count(),
        weeks, team_size, total_cost, "Cost estimate computed"
    );

    CostEstimate {
        estimated_duration_weeks: weeks,
        estimated_team_size: team_size,
        estimated_total_cost_usd: total_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::fallback_plan;
    use autocode_core::config::{PhaseDuration, RoleRate};

    #[test]
    fn test_default_tables() {
        let estimate = estimate_cost(&fallback_plan("x"), &EstimatorConfig::default());
        assert_eq!(estimate.estimated_duration_weeks, 52);
        assert_eq!(estimate.estimated_team_size, 8);
        // (2*5000 + 2*5500 + 2*6000 + 4000 + 4500) * 52 / 4
        assert_eq!(estimate.estimated_total_cost_usd, 539_500);
    }

    #[test]
    fn test_plan_content_does_not_matter() {
        let tables = EstimatorConfig::default();
        let empty = Plan::new("", Vec::new());
        assert_eq!(
            estimate_cost(&empty, &tables),
            estimate_cost(&fallback_plan("other"), &tables)
        );
    }

    #[test]
    fn test_total_cost_truncates() {
        let tables = EstimatorConfig {
            phases: vec![PhaseDuration {
                name: "only".to_string(),
                weeks: 3,
            }],
            roles: vec![RoleRate {
                role: "dev".to_string(),
                headcount: 1,
                monthly_salary_usd: 1001,
            }],
        };
        let estimate = estimate_cost(&fallback_plan("x"), &tables);
        // 1001 * 3 / 4 = 750.75
        assert_eq!(estimate.estimated_total_cost_usd, 750);
        assert_eq!(estimate.estimated_team_size, 1);
    }

    #[test]
    fn test_empty_tables() {
        let tables = EstimatorConfig {
            phases: Vec::new(),
            roles: Vec::new(),
        };
        let estimate = estimate_cost(&fallback_plan("x"), &tables);
        assert_eq!(estimate.estimated_duration_weeks, 0);
        assert_eq!(estimate.estimated_total_cost_usd, 0);
    }

    #[test]
    fn test_oversized_tables_saturate() {
        let tables = EstimatorConfig {
            phases: vec![
                PhaseDuration {
                    name: "forever".to_string(),
                    weeks: 4_000_000,
                },
                PhaseDuration {
                    name: "and more".to_string(),
                    weeks: u32::MAX,
                },
            ],
            roles: vec![
                RoleRate {
                    role: "dev".to_string(),
                    headcount: u32::MAX,
                    monthly_salary_usd: 10_000_000_000_000,
                },
                RoleRate {
                    role: "ops".to_string(),
                    headcount: 1,
                    monthly_salary_usd: 1,
                },
            ],
        };
        let estimate = estimate_cost(&fallback_plan("x"), &tables);
        assert_eq!(estimate.estimated_duration_weeks, u32::MAX);
        assert_eq!(estimate.estimated_team_size, u32::MAX);
        assert_eq!(estimate.estimated_total_cost_usd, u64::MAX / WEEKS_PER_MONTH);
    }
}
