// [libs/core/matching/src/lib.rs]
#![deny(missing_docs)]

/*!
 * =================================================================
 * APARATO: CORE MATCHING MASTER HUB (ESTRATO L1)
 * CLASIFICACIÓN: NUCLEO DE PUNTUACION (ESTRATO L1)
 * RESPONSABILIDAD: NORMALIZACION, COMBINACION PONDERADA Y EMPAREJAMIENTO
 *
 * Este crate es deliberadamente libre de I/O: ni abre conexiones, ni
 * lee el reloj del sistema, ni conoce el Inventory Store. Recibe fotos
 * inmutables y retorna puntajes y ordenes — la misma entrada produce
 * siempre la misma salida.
 * =================================================================
 */

/// Catalogo de fallos del motor de emparejamiento.
pub mod errors;
/// Filtrado duro, puntuacion blanda ponderada y desempate estable.
pub mod matcher;
/// Proyeccion de mediciones crudas de benchmark al rango `[0, 100]`.
pub mod normalize;
/// Seleccion y ejecucion del algoritmo de placement sobre la salida
/// del matcher (greedy, bin-packing, genetico, costo minimo, ranking).
pub mod placement;
/// Combinacion ponderada de ejes y seleccion de tier/certificaciones.
pub mod scoring;

/// Unica autoridad de importacion autorizada para los estratos
/// superiores (orquestador y agente de provider).
pub mod prelude {
    pub use crate::errors::MatchingError;
    pub use crate::matcher::{
        hard_filter, rank_candidates, score_candidate, MatchCandidate, MatchExplanation,
        RankedCandidate, RejectionReason, ScoringWeights,
    };
    pub use crate::normalize::{clamp_unit_percent, normalize};
    pub use crate::placement::{
        place, select_algorithm, AlgorithmSelectionPolicy, JobCharacteristics, PlacementAlgorithm,
    };
    pub use crate::scoring::{
        evaluate_certifications, select_tier, weighted_overall_score, CertificationRule,
        CertificationThresholds, TierThresholds, WeightedAxis,
    };
}
