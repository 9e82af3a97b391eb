// [libs/core/matching/src/normalize.rs]
/*!
 * =================================================================
 * APARATO: NORMALIZACION DE PUNTAJES DE BENCHMARK (ESTRATO L1)
 * RESPONSABILIDAD: PROYECTAR UNA MEDICION CRUDA AL RANGO [0, 100]
 *
 * El Verification Engine aplica esta ley antes de combinar mediciones
 * heterogeneas (tflops, GB/s, ms) en un puntaje de eje unico.
 * =================================================================
 */

use crate::errors::MatchingError;

/// Normaliza `value` al rango `[min, max]` a una escala `[0, 100]`,
/// sujetando (clamp) el resultado para que jamas escape del rango
/// cerrado incluso si `value` cae fuera de `[min, max]`.
pub fn normalize(value: f64, min: f64, max: f64) -> Result<f64, MatchingError> {
    if !(max > min) {
        return Err(MatchingError::InvalidRange { min, max });
    }
    let raw = 100.0 * (value - min) / (max - min);
    Ok(clamp_unit_percent(raw))
}

/// Sujeta un puntaje al rango cerrado `[0, 100]`.
#[must_use]
pub fn clamp_unit_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn midpoint_normalizes_to_fifty() {
        assert_eq!(normalize(50.0, 0.0, 100.0).unwrap(), 50.0);
    }

    #[test]
    fn invalid_range_is_rejected() {
        assert_eq!(
            normalize(1.0, 10.0, 10.0),
            Err(MatchingError::InvalidRange { min: 10.0, max: 10.0 })
        );
    }

    proptest! {
        /// Ley de normalizacion: para todo rango valido y todo valor
        /// real, el resultado siempre cae en [0, 100].
        #[test]
        fn normalize_result_is_always_within_unit_percent(
            value in -1.0e9f64..1.0e9f64,
            min in -1.0e6f64..1.0e6f64,
            span in 0.001f64..1.0e6f64,
        ) {
            let max = min + span;
            let result = normalize(value, min, max).unwrap();
            prop_assert!(result >= 0.0);
            prop_assert!(result <= 100.0);
        }

        #[test]
        fn clamp_is_idempotent(value in -1.0e9f64..1.0e9f64) {
            let once = clamp_unit_percent(value);
            let twice = clamp_unit_percent(once);
            prop_assert_eq!(once, twice);
        }
    }
}
