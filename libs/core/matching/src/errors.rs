// [libs/core/matching/src/errors.rs]
/*!
 * =================================================================
 * APARATO: CATALOGO DE FALLOS DEL MOTOR DE EMPAREJAMIENTO (ESTRATO L1)
 * =================================================================
 */

use thiserror::Error;

/// Fallos posibles al puntuar o emparejar recursos. Puros, sin I/O.
#[derive(Debug, Error, PartialEq)]
pub enum MatchingError {
    #[error("rango invalido para normalizacion: min={min} max={max}")]
    InvalidRange { min: f64, max: f64 },

    #[error("ningun peso de ponderacion fue provisto")]
    EmptyWeightSet,

    #[error("los pesos de ponderacion deben sumar un valor positivo, obtuve {sum}")]
    NonPositiveWeightSum { sum: f64 },

    #[error("ningun candidato satisface los requisitos duros del trabajo")]
    NoEligibleCandidates,
}
