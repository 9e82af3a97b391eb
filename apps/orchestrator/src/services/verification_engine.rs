// [apps/orchestrator/src/services/verification_engine.rs]
/*!
 * Runs the capability assessment pipeline over a completed benchmark
 * suite: normalize each measurement onto `[0, 100]`, combine axes with
 * the configured weights, select a tier, persist the result, and mark
 * the gpu consumable until `valid_until` elapses.
 *
 * Concurrent verification requests for the same gpu are coalesced: a
 * request that arrives while one is already in flight for that gpu
 * awaits the in-flight result instead of re-running the suite.
 */

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nebula_core_matching::prelude::{evaluate_certifications, select_tier, weighted_overall_score, CertificationRule, WeightedAxis};
use nebula_domain_models::{
    BenchmarkKind, BenchmarkMeasurement, CapabilityAssessment, GpuResource, InventoryEvent, Tier,
    VerificationResult, VerificationState,
};
use nebula_infra_db::repositories::{GpuRepository, VerificationRepository};
use nebula_infra_db::TursoClient;
use tokio::sync::{broadcast, Mutex};
use tracing::instrument;
use uuid::Uuid;

use crate::config::VerificationConfig;
use crate::errors::OrchestratorError;
use crate::services::event_bus::EventBus;

/// What the leader of a coalesced verification run broadcasts to every
/// caller that joined while it was in flight. The error variant is a
/// rendered message rather than `OrchestratorError` itself since the
/// latter isn't `Clone`; a follower wraps it back into `Internal`.
type CoalescedResult = Result<VerificationResult, String>;

pub struct VerificationEngine {
    db: Arc<TursoClient>,
    config: VerificationConfig,
    event_bus: EventBus,
    in_flight: Mutex<HashMap<Uuid, broadcast::Sender<CoalescedResult>>>,
}

impl VerificationEngine {
    #[must_use]
    pub fn new(db: Arc<TursoClient>, config: VerificationConfig, event_bus: EventBus) -> Self {
        Self { db, config, event_bus, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Coalesces concurrent callers for the same gpu behind a single
    /// suite execution when `coalesce_concurrent_requests` is set;
    /// otherwise every caller runs its own pass. The follower branch
    /// subscribes to the leader's broadcast channel while still holding
    /// `in_flight`'s lock, so there is no window between "found an
    /// in-flight run" and "registered to hear its result" for the
    /// leader to finish and notify through.
    #[instrument(skip(self, measurements))]
    pub async fn assess(
        &self,
        gpu_id: Uuid,
        provider_id: Uuid,
        measurements: Vec<BenchmarkMeasurement>,
    ) -> Result<VerificationResult, OrchestratorError> {
        if !self.config.coalesce_concurrent_requests {
            return self.run_assessment(gpu_id, provider_id, measurements).await;
        }

        let mut follower = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(sender) = in_flight.get(&gpu_id) {
                Some(sender.subscribe())
            } else {
                let (sender, _receiver) = broadcast::channel(1);
                in_flight.insert(gpu_id, sender);
                None
            }
        };

        if let Some(receiver) = follower.as_mut() {
            return match receiver.recv().await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(message)) => Err(OrchestratorError::Internal(message)),
                Err(_) => Err(OrchestratorError::Internal(
                    "verification coalesced but the in-flight run ended without a result".to_string(),
                )),
            };
        }

        let result = self.run_assessment(gpu_id, provider_id, measurements).await;

        let sender = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.remove(&gpu_id)
        };
        if let Some(sender) = sender {
            let broadcastable = match &result {
                Ok(value) => Ok(value.clone()),
                Err(err) => Err(err.to_string()),
            };
            let _ = sender.send(broadcastable);
        }

        result
    }

    async fn run_assessment(
        &self,
        gpu_id: Uuid,
        provider_id: Uuid,
        measurements: Vec<BenchmarkMeasurement>,
    ) -> Result<VerificationResult, OrchestratorError> {
        let now = Utc::now();
        let connection = self.db.get_connection()?;
        let mut gpu = GpuRepository::new(&connection).get_by_id(gpu_id).await?;

        let assessment = self.score_measurements(&measurements, gpu.capabilities.supports_tensor_ops)?;
        let all_passed = measurements.iter().all(|m| m.passed);

        let result = VerificationResult {
            id: Uuid::new_v4(),
            gpu_id,
            provider_id,
            measurements,
            assessment,
            started_at: now,
            completed_at: now,
            valid_until: now + chrono::Duration::hours(self.config.validity_window_hours),
            suite_version: "1.0.0".to_string(),
        };

        VerificationRepository::new(&connection).record(&result).await?;

        gpu.verification_state = if all_passed {
            VerificationState::Verified { valid_until: result.valid_until }
        } else {
            VerificationState::Revoked
        };
        GpuRepository::new(&connection).update_with_version(&gpu).await?;

        self.event_bus.publish(InventoryEvent::VerificationCompleted {
            provider_id,
            gpu_id,
            verification_id: result.id,
            passed: all_passed,
        });

        Ok(result)
    }

    /// Combines measurement scores per axis using the configured
    /// weights, derives an overall score, a tier, and the
    /// certifications the gpu qualifies for. `supports_tensor_ops`
    /// gates the tensor certification — a high tensor-axis score on a
    /// device with no tensor units never certifies (spec.md §4.4:
    /// "tensor axis ≥ 85 AND tensor-unit present").
    fn score_measurements(
        &self,
        measurements: &[BenchmarkMeasurement],
        supports_tensor_ops: bool,
    ) -> Result<CapabilityAssessment, OrchestratorError> {
        let axis_score = |kind: BenchmarkKind| -> f64 {
            let matching: Vec<&BenchmarkMeasurement> = measurements.iter().filter(|m| m.kind == kind).collect();
            if matching.is_empty() {
                return 0.0;
            }
            matching.iter().map(|m| m.score).sum::<f64>() / matching.len() as f64
        };

        let compute_score = axis_score(BenchmarkKind::ComputeThroughput);
        let memory_score = axis_score(BenchmarkKind::MemoryBandwidth);
        let tensor_score = axis_score(BenchmarkKind::TensorOps);
        let stability_score = axis_score(BenchmarkKind::Stability);
        let compatibility_score = axis_score(BenchmarkKind::ApiCompatibility);

        let axes = vec![
            WeightedAxis { score: compute_score, weight: self.config.compute_weight },
            WeightedAxis { score: memory_score, weight: self.config.memory_weight },
            WeightedAxis { score: tensor_score, weight: self.config.tensor_weight },
            WeightedAxis { score: stability_score, weight: self.config.stability_weight },
            WeightedAxis { score: compatibility_score, weight: self.config.compatibility_weight },
        ];

        let overall_score = weighted_overall_score(&axes)
            .map_err(|err| OrchestratorError::Internal(format!("scoring axes rejected: {err}")))?;
        let tier = select_tier(overall_score, &self.config.tier_thresholds);

        let thresholds = &self.config.certification_thresholds;
        let mut certifications = Vec::new();
        if supports_tensor_ops && tensor_score >= thresholds.tensor {
            certifications.push("ai-ml-optimized".to_string());
        }
        certifications.extend(evaluate_certifications(&[
            CertificationRule {
                name: "memory-bandwidth-verified".to_string(),
                axis_score: memory_score,
                threshold: thresholds.memory_bandwidth,
            },
            CertificationRule {
                name: "stability-verified".to_string(),
                axis_score: stability_score,
                threshold: thresholds.stability,
            },
        ]));

        Ok(CapabilityAssessment {
            compute_score,
            memory_score,
            tensor_score,
            stability_score,
            compatibility_score,
            overall_score,
            tier,
            certifications,
        })
    }

    /// True when `gpu`'s current verification state is consumable at
    /// `now` — used by the matcher's hard filter.
    #[must_use]
    pub fn is_consumable(gpu: &GpuResource, now: DateTime<Utc>) -> bool {
        gpu.verification_state.is_consumable_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(kind: BenchmarkKind, score: f64) -> BenchmarkMeasurement {
        BenchmarkMeasurement {
            test_name: "synthetic".to_string(),
            kind,
            score,
            unit: "tflops".to_string(),
            min_acceptable: 10.0,
            max_observed_reference: 120.0,
            passed: score >= 10.0,
            duration_ms: 100,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn scoring_combines_axes_and_selects_tier() {
        let engine = VerificationEngine::new(
            Arc::new(TursoClient::connect(":memory:", None).await.unwrap()),
            VerificationConfig::default(),
            EventBus::new(),
        );
        let measurements = vec![
            measurement(BenchmarkKind::ComputeThroughput, 95.0),
            measurement(BenchmarkKind::MemoryBandwidth, 92.0),
            measurement(BenchmarkKind::TensorOps, 96.0),
            measurement(BenchmarkKind::Stability, 90.0),
            measurement(BenchmarkKind::ApiCompatibility, 88.0),
        ];
        let assessment = engine.score_measurements(&measurements, true).unwrap();
        assert_eq!(assessment.tier, Tier::Enterprise);
        assert!(assessment.certifications.contains(&"ai-ml-optimized".to_string()));
    }

    #[tokio::test]
    async fn missing_axis_measurements_score_as_zero_and_drag_tier_down() {
        let engine = VerificationEngine::new(
            Arc::new(TursoClient::connect(":memory:", None).await.unwrap()),
            VerificationConfig::default(),
            EventBus::new(),
        );
        let measurements = vec![measurement(BenchmarkKind::ComputeThroughput, 95.0)];
        let assessment = engine.score_measurements(&measurements, false).unwrap();
        assert!(assessment.overall_score < 50.0);
    }

    #[tokio::test]
    async fn tensor_score_without_tensor_units_does_not_certify() {
        let engine = VerificationEngine::new(
            Arc::new(TursoClient::connect(":memory:", None).await.unwrap()),
            VerificationConfig::default(),
            EventBus::new(),
        );
        let measurements = vec![
            measurement(BenchmarkKind::ComputeThroughput, 95.0),
            measurement(BenchmarkKind::MemoryBandwidth, 92.0),
            measurement(BenchmarkKind::TensorOps, 96.0),
            measurement(BenchmarkKind::Stability, 90.0),
            measurement(BenchmarkKind::ApiCompatibility, 88.0),
        ];
        let assessment = engine.score_measurements(&measurements, false).unwrap();
        assert!(!assessment.certifications.contains(&"ai-ml-optimized".to_string()));
    }
}
