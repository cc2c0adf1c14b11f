// ============================================================
// Layer 3 — Feature Schema
// ============================================================
// Column groups shared by training and inference.
//
// The one correctness hazard in this system is a schema
// mismatch: a model trained on columns in one order and fed
// columns in another. Every stage takes its column lists from
// here, and trained models record the exact order they saw.

use crate::domain::record::Field;

/// Upper-body clothing indicators, autoencoder input order
pub const UPPER_CLOTHING: [Field; 7] = [
    Field::TDress,
    Field::TPoly,
    Field::TCot,
    Field::Sleeves,
    Field::JLight,
    Field::JFleece,
    Field::JDown,
];

/// Lower-body clothing indicators, PCA input order
pub const LOWER_CLOTHING: [Field; 5] = [
    Field::Shorts,
    Field::PThin,
    Field::PThick,
    Field::PFleece,
    Field::PDown,
];

/// Non-clothing columns carried through to the computed table
pub const CONDITIONS: [Field; 8] = [
    Field::Temp,
    Field::Sun,
    Field::Headwind,
    Field::Snow,
    Field::Rain,
    Field::Fatigued,
    Field::Hr,
    Field::Feels,
];

pub const UPPER_INSULATION: &str = "upr_clo";
pub const LOWER_INSULATION: &str = "lwr_clo";

/// Hand-assigned clo value per clothing item, used only to orient
/// the sign of the learned insulation features.
pub fn expected_clo(field: Field) -> f64 {
    match field {
        Field::TDress  => 0.05,
        Field::TPoly   => 0.08,
        Field::TCot    => 0.09,
        Field::Sleeves => 0.20,
        Field::JLight  => 0.50,
        Field::JFleece => 0.70,
        Field::JDown   => 0.90,
        Field::Shorts  => 0.06,
        Field::PThin   => 0.15,
        Field::PThick  => 0.24,
        Field::PFleece => 0.80,
        Field::PDown   => 0.90,
        _ => 0.0,
    }
}

/// Weights for a clothing subset, aligned with its column order
pub fn expected_clo_weights(fields: &[Field]) -> Vec<f64> {
    fields.iter().map(|&f| expected_clo(f)).collect()
}

/// Columns of the computed (reduced) table, in order
pub fn computed_columns() -> Vec<String> {
    let mut cols = vec![UPPER_INSULATION.to_string(), LOWER_INSULATION.to_string()];
    cols.extend(CONDITIONS.iter().map(|f| f.name().to_string()));
    cols
}

pub fn names(fields: &[Field]) -> Vec<String> {
    fields.iter().map(|f| f.name().to_string()).collect()
}
