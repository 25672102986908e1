use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ComputationMode, PayrollConfig};
use crate::domain::employee::Employee;
use crate::domain::payroll::PayrollRecord;
use crate::errors::ApplicationError;
use crate::payroll::remote::HttpComputationService;
use crate::payroll::rules::{DeterministicPayrollEngine, PayrollRuleEngine};

/// Batch computation of breakdowns for an ordered roster snapshot.
///
/// Implementations may be remote; results are treated as untrusted by the
/// projection and checked against the local rule engine.
#[async_trait]
pub trait PayrollComputationService: Send + Sync {
    async fn compute(&self, employees: &[Employee]) -> Result<Vec<PayrollRecord>, ApplicationError>;
}

#[derive(Clone, Debug)]
pub struct LocalComputationService<E = DeterministicPayrollEngine> {
    engine: E,
}

impl<E> LocalComputationService<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl LocalComputationService {
    /// In-process computation with the standard payroll rules.
    pub fn deterministic() -> Self {
        Self::new(DeterministicPayrollEngine)
    }
}

impl Default for LocalComputationService {
    fn default() -> Self {
        Self::deterministic()
    }
}

#[async_trait]
impl<E> PayrollComputationService for LocalComputationService<E>
where
    E: PayrollRuleEngine,
{
    async fn compute(&self, employees: &[Employee]) -> Result<Vec<PayrollRecord>, ApplicationError> {
        Ok(employees
            .iter()
            .map(|employee| PayrollRecord { id: employee.id, breakdown: self.engine.compute(employee) })
            .collect())
    }
}

#[async_trait]
impl<T> PayrollComputationService for std::sync::Arc<T>
where
    T: PayrollComputationService + ?Sized,
{
    async fn compute(&self, employees: &[Employee]) -> Result<Vec<PayrollRecord>, ApplicationError> {
        (**self).compute(employees).await
    }
}

#[async_trait]
impl PayrollComputationService for Box<dyn PayrollComputationService> {
    async fn compute(&self, employees: &[Employee]) -> Result<Vec<PayrollRecord>, ApplicationError> {
        (**self).compute(employees).await
    }
}

/// Computation service selected by `payroll.computation`.
pub fn computation_service(
    config: &PayrollConfig,
) -> Result<Arc<dyn PayrollComputationService>, ApplicationError> {
    match config.computation {
        ComputationMode::Local => Ok(Arc::new(LocalComputationService::deterministic())),
        ComputationMode::Http => {
            let endpoint = config.service_url.clone().ok_or_else(|| {
                ApplicationError::Configuration(
                    "payroll.service_url is required for http computation".to_string(),
                )
            })?;
            Ok(Arc::new(HttpComputationService::new(
                endpoint,
                config.api_key.clone(),
                config.timeout(),
                config.max_retries,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{AppConfig, ComputationMode};
    use crate::errors::ApplicationError;
    use crate::fixtures::seed_employees;
    use crate::payroll::rules::compute_breakdown;

    use super::{computation_service, LocalComputationService, PayrollComputationService};

    #[tokio::test]
    async fn local_service_applies_standard_rules() {
        let employees = seed_employees();
        let fallback: LocalComputationService = Default::default();

        let records = LocalComputationService::deterministic()
            .compute(&employees)
            .await
            .expect("local computation");

        assert_eq!(records, fallback.compute(&employees).await.expect("default computation"));
        assert_eq!(records.len(), employees.len());
        for (record, employee) in records.iter().zip(&employees) {
            assert_eq!(record.id, employee.id);
            assert_eq!(record.breakdown, compute_breakdown(employee));
        }
    }

    #[test]
    fn http_computation_requires_service_url() {
        let mut config = AppConfig::default().payroll;
        config.computation = ComputationMode::Http;

        assert!(matches!(
            computation_service(&config),
            Err(ApplicationError::Configuration(message)) if message.contains("service_url")
        ));

        config.service_url = Some("https://payroll.internal/compute".to_string());
        assert!(computation_service(&config).is_ok());
    }
}
