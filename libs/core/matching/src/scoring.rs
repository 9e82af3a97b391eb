// [libs/core/matching/src/scoring.rs]
/*!
 * =================================================================
 * APARATO: COMBINACION PONDERADA DE EJES Y CLASIFICACION POR NIVEL (ESTRATO L1)
 * RESPONSABILIDAD: DERIVAR UN PUNTAJE GENERAL Y UN TIER DESDE LOS EJES
 * =================================================================
 */

use nebula_domain_models::Tier;
use serde::{Deserialize, Serialize};

use crate::errors::MatchingError;
use crate::normalize::clamp_unit_percent;

/// Un eje de puntuacion con su peso relativo en la combinacion general.
#[derive(Debug, Clone, Copy)]
pub struct WeightedAxis {
    pub score: f64,
    pub weight: f64,
}

/// Combina ejes ponderados en un puntaje general `[0, 100]`.
///
/// El peso de cada eje se normaliza internamente por la suma total,
/// de modo que el llamador no necesita que los pesos sumen 1.0.
pub fn weighted_overall_score(axes: &[WeightedAxis]) -> Result<f64, MatchingError> {
    if axes.is_empty() {
        return Err(MatchingError::EmptyWeightSet);
    }
    let weight_sum: f64 = axes.iter().map(|a| a.weight).sum();
    if weight_sum <= 0.0 {
        return Err(MatchingError::NonPositiveWeightSum { sum: weight_sum });
    }
    let weighted: f64 = axes.iter().map(|a| a.score * a.weight).sum();
    Ok(clamp_unit_percent(weighted / weight_sum))
}

/// Umbrales minimos (inclusivos) de puntaje general por tier —
/// configuracion, no codigo (spec.md §4.4/§6: "Weights and thresholds
/// are configuration"). `basic` no tiene umbral propio: es el tier de
/// respaldo cuando ningun otro se alcanza.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub enterprise: f64,
    pub professional: f64,
    pub standard: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { enterprise: 90.0, professional: 75.0, standard: 50.0 }
    }
}

impl TierThresholds {
    /// Umbrales en orden descendente de exigencia, emparejados con su
    /// tier — el primer acierto de `select_tier` gana.
    fn ordered(&self) -> [(f64, Tier); 4] {
        [
            (self.enterprise, Tier::Enterprise),
            (self.professional, Tier::Professional),
            (self.standard, Tier::Standard),
            (0.0, Tier::Basic),
        ]
    }
}

/// Selecciona el tier correspondiente a un puntaje general, recorriendo
/// los umbrales de mayor a menor exigencia (primer acierto gana).
#[must_use]
pub fn select_tier(overall_score: f64, thresholds: &TierThresholds) -> Tier {
    for (threshold, tier) in thresholds.ordered() {
        if overall_score >= threshold {
            return tier;
        }
    }
    Tier::Basic
}

/// Regla de certificacion: nombre emitido cuando el puntaje de un eje
/// especifico alcanza o supera el umbral declarado.
#[derive(Debug, Clone)]
pub struct CertificationRule {
    pub name: String,
    pub axis_score: f64,
    pub threshold: f64,
}

/// Evalua un conjunto de reglas de certificacion y retorna los nombres
/// de las certificaciones otorgadas, en el mismo orden que las reglas.
#[must_use]
pub fn evaluate_certifications(rules: &[CertificationRule]) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.axis_score >= rule.threshold)
        .map(|rule| rule.name.clone())
        .collect()
}

/// Umbrales por eje para las certificaciones que el motor de
/// verificacion otorga — configuracion, no codigo, igual que
/// `TierThresholds`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationThresholds {
    /// Puntaje minimo del eje tensor para "ai-ml-optimized"; solo se
    /// otorga ademas cuando el recurso reporta unidades tensor.
    pub tensor: f64,
    pub memory_bandwidth: f64,
    pub stability: f64,
}

impl Default for CertificationThresholds {
    fn default() -> Self {
        Self { tensor: 85.0, memory_bandwidth: 80.0, stability: 85.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_score_respects_proportional_weights() {
        let axes = vec![
            WeightedAxis { score: 100.0, weight: 1.0 },
            WeightedAxis { score: 0.0, weight: 1.0 },
        ];
        assert_eq!(weighted_overall_score(&axes).unwrap(), 50.0);
    }

    #[test]
    fn empty_axis_set_is_rejected() {
        assert_eq!(
            weighted_overall_score(&[]),
            Err(MatchingError::EmptyWeightSet)
        );
    }

    #[test]
    fn tier_thresholds_select_first_match() {
        let thresholds = TierThresholds::default();
        assert_eq!(select_tier(95.0, &thresholds), Tier::Enterprise);
        assert_eq!(select_tier(75.0, &thresholds), Tier::Professional);
        assert_eq!(select_tier(50.0, &thresholds), Tier::Standard);
        assert_eq!(select_tier(10.0, &thresholds), Tier::Basic);
        assert_eq!(select_tier(0.0, &thresholds), Tier::Basic);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let thresholds = TierThresholds { enterprise: 99.0, professional: 80.0, standard: 60.0 };
        assert_eq!(select_tier(95.0, &thresholds), Tier::Professional);
    }

    #[test]
    fn certification_rules_filter_by_threshold() {
        let rules = vec![
            CertificationRule {
                name: "tensor-core-verified".into(),
                axis_score: 92.0,
                threshold: 90.0,
            },
            CertificationRule {
                name: "memory-bandwidth-verified".into(),
                axis_score: 40.0,
                threshold: 80.0,
            },
        ];
        let granted = evaluate_certifications(&rules);
        assert_eq!(granted, vec!["tensor-core-verified".to_string()]);
    }
}
