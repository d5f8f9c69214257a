use crate::analysis::formulas::{
    CapBasis, ScoringPolicy, BUG_SCORE_MULTIPLIER, DECISION_SCORE_MULTIPLIER, DEFAULT_POLICY,
    FEATURE_BUSINESS_VALUE_COEFF, FEATURE_DIFFICULTY_COEFF, FEATURE_IMPACT_COEFF,
    MEETING_SCORE_CAP_PERCENT,
};
use crate::commands::{ensure_state_dir, STATE_DIR};
use crate::error::{EquityError, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 1;

const COEFFICIENT_KEYS: [(&str, f64); 3] = [
    ("impact", FEATURE_IMPACT_COEFF),
    ("difficulty", FEATURE_DIFFICULTY_COEFF),
    ("businessValue", FEATURE_BUSINESS_VALUE_COEFF),
];

pub fn get_settings(workspace_path: &str) -> Result<Value> {
    let path = settings_path(workspace_path);
    ensure_state_dir(workspace_path)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings.json is not valid JSON ({e}); using defaults");
            json!({})
        })
    } else {
        json!({})
    };

    let normalized = normalize_settings(original.clone());
    if normalized != original || !path.exists() {
        write_settings_file(&path, &normalized)?;
    }

    Ok(normalized)
}

/// Merges a partial settings object over the stored one.
pub fn save_settings(workspace_path: &str, settings: Value) -> Result<Value> {
    if !settings.is_object() {
        return Err(EquityError::Settings(
            "settings update must be a JSON object".to_string(),
        ));
    }

    let path = settings_path(workspace_path);
    let mut merged = get_settings(workspace_path)?;
    merge_settings(&mut merged, &settings);

    let normalized = normalize_settings(merged);
    write_settings_file(&path, &normalized)?;
    Ok(normalized)
}

pub fn load_scoring_policy(workspace_path: &str) -> Result<ScoringPolicy> {
    let settings = get_settings(workspace_path)?;
    Ok(policy_from_settings(&settings))
}

/// Reads a sanitized settings object into a policy. Missing or malformed
/// keys fall back to the defaults.
pub fn policy_from_settings(settings: &Value) -> ScoringPolicy {
    let number = |key: &str, default: f64| settings.get(key).and_then(Value::as_f64).unwrap_or(default);
    let coefficient = |key: &str, default: f64| {
        settings
            .get("coefficients")
            .and_then(|c| c.get(key))
            .and_then(Value::as_f64)
            .unwrap_or(default)
    };

    ScoringPolicy {
        impact_coeff: coefficient("impact", FEATURE_IMPACT_COEFF),
        difficulty_coeff: coefficient("difficulty", FEATURE_DIFFICULTY_COEFF),
        business_value_coeff: coefficient("businessValue", FEATURE_BUSINESS_VALUE_COEFF),
        bug_multiplier: number("bugScoreMultiplier", BUG_SCORE_MULTIPLIER),
        decision_multiplier: number("decisionScoreMultiplier", DECISION_SCORE_MULTIPLIER),
        meeting_cap_percent: number("meetingCapPercent", MEETING_SCORE_CAP_PERCENT),
        cap_basis: settings
            .get("meetingCapBasis")
            .and_then(Value::as_str)
            .and_then(CapBasis::parse)
            .unwrap_or(DEFAULT_POLICY.cap_basis),
        include_in_progress_features: settings
            .get("includeInProgressFeatures")
            .and_then(Value::as_bool)
            .unwrap_or(DEFAULT_POLICY.include_in_progress_features),
    }
}

fn settings_path(workspace_path: &str) -> PathBuf {
    Path::new(workspace_path)
        .join(STATE_DIR)
        .join("settings.json")
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<()> {
    let raw = serde_json::to_string_pretty(settings)?;
    fs::write(path, raw)?;
    Ok(())
}

/// Fills missing keys from the defaults and sanitizes every value. Values
/// are read as written: a `meetingCapPercent` of 1 means one percent.
fn normalize_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    if let Some(version) = out.get("schema_version").and_then(Value::as_i64) {
        if version > SETTINGS_SCHEMA_VERSION {
            log::warn!("settings schema_version {version} is newer than {SETTINGS_SCHEMA_VERSION}");
        }
    }

    deep_merge_defaults(&mut out, &default_settings());
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    let coefficients: Map<String, Value> = COEFFICIENT_KEYS
        .iter()
        .map(|(key, value)| (key.to_string(), json!(value)))
        .collect();

    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "meetingCapPercent": MEETING_SCORE_CAP_PERCENT,
        "meetingCapBasis": DEFAULT_POLICY.cap_basis.as_str(),
        "coefficients": coefficients,
        "bugScoreMultiplier": BUG_SCORE_MULTIPLIER,
        "decisionScoreMultiplier": DECISION_SCORE_MULTIPLIER,
        "includeInProgressFeatures": DEFAULT_POLICY.include_in_progress_features
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_f64(obj, "meetingCapPercent", 0.0, 100.0, MEETING_SCORE_CAP_PERCENT);
    clamp_f64(obj, "bugScoreMultiplier", 0.0, 100.0, BUG_SCORE_MULTIPLIER);
    clamp_f64(obj, "decisionScoreMultiplier", 0.0, 100.0, DECISION_SCORE_MULTIPLIER);

    sanitize_enum(
        obj,
        "meetingCapBasis",
        &[CapBasis::UncappedTotal.as_str(), CapBasis::CappedTotal.as_str()],
        DEFAULT_POLICY.cap_basis.as_str(),
    );

    ensure_bool(
        obj,
        "includeInProgressFeatures",
        DEFAULT_POLICY.include_in_progress_features,
    );

    let coefficients = obj
        .entry("coefficients".to_string())
        .or_insert_with(|| json!({}));

    if !coefficients.is_object() {
        log::warn!("settings coefficients are not an object; restoring defaults");
        *coefficients = json!({});
    }
    if let Some(coeff_obj) = coefficients.as_object_mut() {
        coeff_obj.retain(|key, _| COEFFICIENT_KEYS.iter().any(|(k, _)| *k == key.as_str()));
        for (key, default_value) in COEFFICIENT_KEYS {
            clamp_f64(coeff_obj, key, 0.0, f64::MAX, default_value);
        }

        // Coefficients are relative weights; only their ratios matter.
        let sum: f64 = coeff_obj.values().filter_map(Value::as_f64).sum();
        if sum > f64::EPSILON {
            for value in coeff_obj.values_mut() {
                if let Some(v) = value.as_f64() {
                    *value = json!(v / sum);
                }
            }
        } else {
            log::warn!("settings coefficients sum to zero; restoring defaults");
            for (key, default_value) in COEFFICIENT_KEYS {
                coeff_obj.insert(key.to_string(), json!(default_value));
            }
        }
    }
}

fn clamp_f64(map: &mut Map<String, Value>, key: &str, min: f64, max: f64, default: f64) {
    let raw = map.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());
    let value = raw.unwrap_or(default).clamp(min, max);
    match raw {
        Some(raw) if raw != value => {
            log::warn!("settings {key} = {raw} is outside [{min}, {max}]; using {value}");
        }
        None if map.contains_key(key) => {
            log::warn!("settings {key} is not a finite number; using {value}");
        }
        _ => {}
    }
    map.insert(key.to_string(), json!(value));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}
