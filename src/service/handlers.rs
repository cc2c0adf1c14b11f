// ============================================================
// Layer 1 — HTTP Handlers
// ============================================================
// Request body for every /predict route:
//
//   {"instances": [ {"temp": 4, "sun": 1, "t_cot": 1, ...}, ... ]}
//
// Per instance:
//   1. If the model expects upr_clo / lwr_clo and the reducer is
//      loaded, derive them from the raw clothing indicators (absent
//      indicators count as 0). Values sent by the client for these
//      two keys are replaced.
//   2. Fill every other missing feature with 0.
//   3. Order the values as the model's stored feature_names.
//
// A missing key therefore always behaves like the same key sent
// as 0.
//
// The first instance's result is returned as `prediction`; the
// whole batch as `predictions`.

use axum::{extract::State, Json};
use serde_json::{json, Map, Value};
use std::{collections::BTreeMap, sync::Arc};

use super::{context::ServiceContext, error::ServiceError};
use crate::domain::schema::{LOWER_INSULATION, UPPER_INSULATION};
use crate::ml::reducer::ClothingReducer;

pub type Instance = BTreeMap<String, f64>;

type Reply = Result<Json<Value>, ServiceError>;

pub async fn root() -> &'static str {
    "temp-feel prediction service"
}

pub async fn health(State(ctx): State<Arc<ServiceContext>>) -> Json<Value> {
    Json(json!({
        "status":  "ok",
        "models":  ctx.versions(),
        "reducer": ctx.reducer.is_some(),
    }))
}

pub async fn predict_feels(State(ctx): State<Arc<ServiceContext>>, Json(body): Json<Value>) -> Reply {
    let slot = ctx.feels.as_ref().ok_or(ServiceError::ModelUnavailable("feels"))?;
    let instances = parse_instances(&body)?;
    let x = prepare_features(&instances, &slot.meta.feature_names, ctx.reducer.as_ref());

    let probabilities = slot.model.predict_proba(&x)?;
    let labels: Vec<String> = slot
        .model
        .predict(&x)?
        .into_iter()
        .map(|c| {
            slot.meta
                .class_mapping
                .get(&c.to_string())
                .cloned()
                .unwrap_or_else(|| c.to_string())
        })
        .collect();

    Ok(Json(json!({
        "prediction":     labels[0],
        "predictions":    labels,
        "probabilities":  probabilities,
        "model_accuracy": slot.meta.accuracy.unwrap_or(0.0),
        "version":        slot.meta.version,
    })))
}

pub async fn predict_hr(State(ctx): State<Arc<ServiceContext>>, Json(body): Json<Value>) -> Reply {
    let slot = ctx.hr.as_ref().ok_or(ServiceError::ModelUnavailable("hr"))?;
    let instances = parse_instances(&body)?;
    let x = prepare_features(&instances, &slot.meta.feature_names, ctx.reducer.as_ref());

    let values: Vec<f64> = slot.model.predict(&x)?.into_iter().map(|p| p[0]).collect();

    Ok(Json(json!({
        "prediction":  values[0],
        "predictions": values,
        "r2_score":    slot.meta.r2_score,
        "version":     slot.meta.version,
    })))
}

pub async fn predict_clothing(State(ctx): State<Arc<ServiceContext>>, Json(body): Json<Value>) -> Reply {
    let slot = ctx.clothing.as_ref().ok_or(ServiceError::ModelUnavailable("clothing"))?;
    let instances = parse_instances(&body)?;
    let x = prepare_features(&instances, &slot.meta.feature_names, ctx.reducer.as_ref());

    let targets: Vec<String> = if slot.meta.target_columns.is_empty() {
        vec![UPPER_INSULATION.to_string(), LOWER_INSULATION.to_string()]
    } else {
        slot.meta.target_columns.clone()
    };
    let predictions: Vec<Value> = slot
        .model
        .predict(&x)?
        .into_iter()
        .map(|row| Value::Object(targets.iter().cloned().zip(row.into_iter().map(Value::from)).collect::<Map<_, _>>()))
        .collect();

    Ok(Json(json!({
        "prediction":  predictions[0],
        "predictions": predictions,
        "r2_scores":   slot.meta.individual_r2_scores,
        "version":     slot.meta.version,
    })))
}

// ─── Request Preparation ─────────────────────────────────────────────────────

/// Validate the body and read every instance as name → value.
/// Booleans count as 0 / 1.
pub fn parse_instances(body: &Value) -> Result<Vec<Instance>, ServiceError> {
    let list = body
        .get("instances")
        .ok_or_else(|| ServiceError::BadRequest("missing 'instances'".into()))?
        .as_array()
        .ok_or_else(|| ServiceError::BadRequest("'instances' must be an array".into()))?;
    if list.is_empty() {
        return Err(ServiceError::BadRequest("'instances' is empty".into()));
    }

    list.iter()
        .enumerate()
        .map(|(i, item)| {
            let obj = item
                .as_object()
                .ok_or_else(|| ServiceError::BadRequest(format!("instance {i} is not an object")))?;
            obj.iter()
                .map(|(k, v)| {
                    let x = match v {
                        Value::Number(n) => n.as_f64(),
                        Value::Bool(b)   => Some(if *b { 1.0 } else { 0.0 }),
                        _                => None,
                    };
                    x.map(|x| (k.clone(), x)).ok_or_else(|| {
                        ServiceError::BadRequest(format!("feature '{k}' of instance {i} is not numeric"))
                    })
                })
                .collect()
        })
        .collect()
}

/// One row per instance, in `feature_names` order.
pub fn prepare_features(
    instances:     &[Instance],
    feature_names: &[String],
    reducer:       Option<&ClothingReducer>,
) -> Vec<Vec<f64>> {
    let wants_upper = feature_names.iter().any(|f| f == UPPER_INSULATION);
    let wants_lower = feature_names.iter().any(|f| f == LOWER_INSULATION);

    instances
        .iter()
        .map(|inst| {
            let mut inst = inst.clone();
            if let (Some(r), true) = (reducer, wants_upper || wants_lower) {
                let (upper, lower) = r.insulation(|f| inst.get(f.name()).copied().unwrap_or(0.0));
                if wants_upper {
                    inst.insert(UPPER_INSULATION.to_string(), upper);
                }
                if wants_lower {
                    inst.insert(LOWER_INSULATION.to_string(), lower);
                }
            }
            feature_names
                .iter()
                .map(|f| inst.get(f).copied().unwrap_or(0.0))
                .collect()
        })
        .collect()
}
