// [libs/core/matching/src/matcher.rs]
/*!
 * =================================================================
 * APARATO: RESOURCE MATCHER (ESTRATO L1)
 * RESPONSABILIDAD: FILTRADO DURO + PUNTUACION BLANDA + DESEMPATE ESTABLE
 *
 * Este motor es deliberadamente puro: no toca el Inventory Store ni el
 * reloj del sistema. El Allocator le entrega una foto (snapshot) de
 * candidatos y recibe de vuelta un orden total, siempre el mismo para
 * la misma entrada.
 * =================================================================
 */

use nebula_domain_models::{ComputeApi, JobRequirements, PrecisionType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Motivo por el cual un candidato fue descartado del filtrado duro.
/// El orden de las variantes no implica severidad; cada candidato
/// rechazado acumula todos los motivos que aplican, no solo el primero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    InsufficientMemory,
    MissingPrecision,
    MissingApi,
    MissingTensorUnits,
    InsufficientUptime,
    BelowMinimumPerformance,
    CostExceedsBudget,
    VerificationNotConsumable,
}

/// Foto inmutable de un recurso candidato, tal como la entrega el
/// Allocator al motor de emparejamiento. No contiene I/O ni reloj.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub gpu_id: Uuid,
    pub provider_id: Uuid,
    pub memory_mb: u64,
    pub supported_precisions: Vec<PrecisionType>,
    pub supported_apis: Vec<ComputeApi>,
    pub supports_tensor_ops: bool,
    pub performance_score: f64,
    pub provider_uptime_percent: f64,
    pub consecutive_failed: u64,
    pub utilization_percent: f32,
    pub region: Option<String>,
    pub tags: Vec<String>,
    pub cost_per_hour: Option<f64>,
    /// Hash estable derivado del id del recurso; unico desempate de
    /// ultima instancia, jamas el orden de iteracion de un mapa.
    pub stable_hash: u64,
    pub verification_consumable: bool,
}

/// Resultado de la evaluacion de un candidato, con su puntaje y,
/// opcionalmente, la traza de por que recibio ese puntaje.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub gpu_id: Uuid,
    pub provider_id: Uuid,
    pub score: f64,
    pub explanation: Option<MatchExplanation>,
}

/// Traza legible de la puntuacion blanda, emitida solo en modo explain.
#[derive(Debug, Clone)]
pub struct MatchExplanation {
    pub headroom_component: f64,
    pub reliability_component: f64,
    pub affinity_component: f64,
    pub cost_component: f64,
}

/// Aplica los filtros duros obligatorios y retorna los motivos de rechazo
/// acumulados; una lista vacia significa que el candidato es elegible.
#[must_use]
pub fn hard_filter(candidate: &MatchCandidate, requirements: &JobRequirements) -> Vec<RejectionReason> {
    let mut reasons = Vec::new();

    if candidate.memory_mb < requirements.min_memory_mb {
        reasons.push(RejectionReason::InsufficientMemory);
    }

    if !requirements.required_precisions.is_empty()
        && !requirements
            .required_precisions
            .iter()
            .all(|p| candidate.supported_precisions.contains(p))
    {
        reasons.push(RejectionReason::MissingPrecision);
    }

    if !requirements.required_apis.is_empty()
        && !requirements
            .required_apis
            .iter()
            .all(|a| candidate.supported_apis.contains(a))
    {
        reasons.push(RejectionReason::MissingApi);
    }

    if requirements.requires_tensor_units && !candidate.supports_tensor_ops {
        reasons.push(RejectionReason::MissingTensorUnits);
    }

    if candidate.provider_uptime_percent < requirements.min_provider_uptime_percent {
        reasons.push(RejectionReason::InsufficientUptime);
    }

    if candidate.performance_score < requirements.min_performance_score {
        reasons.push(RejectionReason::BelowMinimumPerformance);
    }

    if let Some(budget) = requirements.max_cost_per_hour {
        if let Some(cost) = candidate.cost_per_hour {
            if cost > budget {
                reasons.push(RejectionReason::CostExceedsBudget);
            }
        }
    }

    if !candidate.verification_consumable {
        reasons.push(RejectionReason::VerificationNotConsumable);
    }

    reasons
}

/// Pesos relativos de los componentes de puntuacion blanda. Suman 1.0
/// por construccion en `default()`, pero el combinador tolera cualquier
/// suma positiva (ver `weighted_overall_score`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub headroom: f64,
    pub reliability: f64,
    pub affinity: f64,
    pub cost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            headroom: 0.35,
            reliability: 0.35,
            affinity: 0.2,
            cost: 0.1,
        }
    }
}

fn headroom_component(candidate: &MatchCandidate) -> f64 {
    (100.0 - f64::from(candidate.utilization_percent)).clamp(0.0, 100.0)
}

fn reliability_component(candidate: &MatchCandidate) -> f64 {
    candidate.provider_uptime_percent.clamp(0.0, 100.0)
}

fn affinity_component(candidate: &MatchCandidate, requirements: &JobRequirements) -> f64 {
    let region_match = candidate
        .region
        .as_ref()
        .map(|r| requirements.preferred_regions.iter().any(|p| p == r))
        .unwrap_or(false);
    let tag_hits = candidate
        .tags
        .iter()
        .filter(|t| requirements.preferred_tags.contains(t))
        .count();
    let tag_ratio = if requirements.preferred_tags.is_empty() {
        0.0
    } else {
        tag_hits as f64 / requirements.preferred_tags.len() as f64
    };
    let region_score = if region_match { 100.0 } else { 0.0 };
    (region_score * 0.5 + tag_ratio * 100.0 * 0.5).clamp(0.0, 100.0)
}

fn cost_component(candidate: &MatchCandidate, requirements: &JobRequirements) -> f64 {
    match (candidate.cost_per_hour, requirements.max_cost_per_hour) {
        (Some(cost), Some(budget)) if budget > 0.0 => {
            (100.0 * (1.0 - (cost / budget))).clamp(0.0, 100.0)
        }
        _ => 50.0,
    }
}

/// Puntua un candidato elegible combinando los cuatro componentes
/// blandos con los pesos provistos.
#[must_use]
pub fn score_candidate(
    candidate: &MatchCandidate,
    requirements: &JobRequirements,
    weights: ScoringWeights,
) -> (f64, MatchExplanation) {
    let headroom = headroom_component(candidate);
    let reliability = reliability_component(candidate);
    let affinity = affinity_component(candidate, requirements);
    let cost = cost_component(candidate, requirements);

    let weight_sum = weights.headroom + weights.reliability + weights.affinity + weights.cost;
    let overall = if weight_sum > 0.0 {
        (headroom * weights.headroom
            + reliability * weights.reliability
            + affinity * weights.affinity
            + cost * weights.cost)
            / weight_sum
    } else {
        0.0
    };

    (
        overall.clamp(0.0, 100.0),
        MatchExplanation {
            headroom_component: headroom,
            reliability_component: reliability,
            affinity_component: affinity,
            cost_component: cost,
        },
    )
}

/// Filtra, puntua y ordena candidatos en un orden total y determinista.
///
/// El desempate sigue, en orden: menor `consecutive_failed`, luego
/// mayor `provider_uptime_percent`, luego menor `stable_hash` — jamas
/// el orden en que los candidatos llegaron en el slice de entrada.
#[must_use]
pub fn rank_candidates(
    candidates: &[MatchCandidate],
    requirements: &JobRequirements,
    weights: ScoringWeights,
    explain: bool,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .filter(|c| hard_filter(c, requirements).is_empty())
        .map(|c| {
            let (score, explanation) = score_candidate(c, requirements, weights);
            RankedCandidate {
                gpu_id: c.gpu_id,
                provider_id: c.provider_id,
                score,
                explanation: if explain { Some(explanation) } else { None },
            }
        })
        .collect();

    let by_hash: std::collections::HashMap<Uuid, &MatchCandidate> =
        candidates.iter().map(|c| (c.gpu_id, c)).collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ca = by_hash[&a.gpu_id];
                let cb = by_hash[&b.gpu_id];
                ca.consecutive_failed
                    .cmp(&cb.consecutive_failed)
                    .then_with(|| {
                        cb.provider_uptime_percent
                            .partial_cmp(&ca.provider_uptime_percent)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .then_with(|| ca.stable_hash.cmp(&cb.stable_hash))
            })
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_candidate(gpu_id: Uuid, stable_hash: u64) -> MatchCandidate {
        MatchCandidate {
            gpu_id,
            provider_id: Uuid::new_v4(),
            memory_mb: 24_000,
            supported_precisions: vec![PrecisionType::Fp32, PrecisionType::Fp16],
            supported_apis: vec![ComputeApi::Cuda],
            supports_tensor_ops: true,
            performance_score: 80.0,
            provider_uptime_percent: 99.0,
            consecutive_failed: 0,
            utilization_percent: 10.0,
            region: Some("us-east".into()),
            tags: vec!["spot".into()],
            cost_per_hour: Some(1.5),
            stable_hash,
            verification_consumable: true,
        }
    }

    #[test]
    fn insufficient_memory_is_rejected_with_reason() {
        let mut candidate = base_candidate(Uuid::new_v4(), 1);
        candidate.memory_mb = 1_000;
        let requirements = JobRequirements {
            min_memory_mb: 16_000,
            ..JobRequirements::default()
        };
        let reasons = hard_filter(&candidate, &requirements);
        assert_eq!(reasons, vec![RejectionReason::InsufficientMemory]);
    }

    #[test]
    fn unconsumable_verification_excludes_candidate() {
        let mut candidate = base_candidate(Uuid::new_v4(), 1);
        candidate.verification_consumable = false;
        let requirements = JobRequirements::default();
        let ranked = rank_candidates(&[candidate], &requirements, ScoringWeights::default(), false);
        assert!(ranked.is_empty());
    }

    #[test]
    fn tie_break_prefers_lower_consecutive_failed_then_higher_uptime_then_stable_hash() {
        let a = {
            let mut c = base_candidate(Uuid::new_v4(), 100);
            c.utilization_percent = 10.0;
            c.consecutive_failed = 2;
            c
        };
        let b = {
            let mut c = base_candidate(Uuid::new_v4(), 1);
            c.utilization_percent = 10.0;
            c.consecutive_failed = 0;
            c
        };
        let requirements = JobRequirements::default();
        let ranked = rank_candidates(&[a.clone(), b.clone()], &requirements, ScoringWeights::default(), false);
        assert_eq!(ranked[0].gpu_id, b.gpu_id);
    }

    #[test]
    fn stable_hash_is_last_resort_tie_break() {
        let a = base_candidate(Uuid::new_v4(), 50);
        let b = base_candidate(Uuid::new_v4(), 5);
        let requirements = JobRequirements::default();
        let ranked = rank_candidates(&[a.clone(), b.clone()], &requirements, ScoringWeights::default(), false);
        assert_eq!(ranked[0].gpu_id, b.gpu_id);
    }
}
