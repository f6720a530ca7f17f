//! End-to-end compliance runs.

use sluice_error::SluiceResult;
use sluice_rules::{ComplianceReport, ComplianceRequest, RuleRegistry};
use sluice_scheduler::BatchScheduler;
use tracing::{info, instrument};

/// Plans a compliance request, runs it through the scheduler and groups
/// the outcomes per record.
pub struct ComplianceService {
    registry: RuleRegistry,
    scheduler: BatchScheduler,
}

impl ComplianceService {
    /// Create a service over a populated registry.
    pub fn new(registry: RuleRegistry, scheduler: BatchScheduler) -> Self {
        Self {
            registry,
            scheduler,
        }
    }

    /// The rule registry.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// The batch scheduler.
    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Check every record of `request` against every requested rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails validation. Individual call
    /// failures are reported inside the returned report.
    #[instrument(skip_all, fields(records = request.records.len(), rules = request.rules.len()))]
    pub async fn check(&self, request: &ComplianceRequest) -> SluiceResult<ComplianceReport> {
        let plan = request.plan(&self.registry)?;
        let result = self.scheduler.run(plan.items()).await?;
        let report = ComplianceReport::assemble(&plan, &result);
        info!(
            ok = *report.ok(),
            failures = *report.failures(),
            total_tokens = *report.total_tokens(),
            "Compliance check finished"
        );
        Ok(report)
    }
}
