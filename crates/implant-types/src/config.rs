// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ImplantError, ImplantResult};

/// Named scalar parameters forwarded verbatim to a profile model.
///
/// The engine never interprets these; each model documents the keys it reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParameters {
    values: BTreeMap<String, f64>,
}

impl ModelParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value of `name`, or `default` when absent or non-finite.
    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        match self.get(name) {
            Some(v) if v.is_finite() => v,
            _ => default,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Beam configuration for one implant step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImplantConfig {
    /// Incidence angle from the depth axis [degrees].
    #[serde(default)]
    pub angle_deg: f64,
    /// Parameter bag handed to the profile model.
    #[serde(default)]
    pub parameters: ModelParameters,
    /// Mask material ids. Accepted for bookkeeping; the tracer itself only
    /// treats material 0 as impenetrable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mask_materials: Vec<i32>,
}

impl ImplantConfig {
    pub fn new(angle_deg: f64, parameters: ModelParameters) -> Self {
        ImplantConfig {
            angle_deg,
            parameters,
            mask_materials: Vec::new(),
        }
    }

    pub fn with_mask_materials(mut self, mask_materials: &[i32]) -> Self {
        self.mask_materials = mask_materials.to_vec();
        self
    }

    /// Load from a JSON file.
    pub fn from_file(path: &str) -> ImplantResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> ImplantResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ImplantResult<()> {
        if !self.angle_deg.is_finite() {
            return Err(ImplantError::ConfigError(format!(
                "implant angle must be finite, got {}",
                self.angle_deg
            )));
        }
        if let Some((name, value)) = self.parameters.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ImplantError::ConfigError(format!(
                "model parameter '{name}' must be finite, got {value}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// CARGO_MANIFEST_DIR points to crates/implant-types/, the sample
    /// configs live two levels up.
    fn config_path(relative: &str) -> String {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(relative)
            .to_string_lossy()
            .to_string()
    }

    #[test]
    fn test_load_default_config() {
        let cfg = ImplantConfig::from_file(&config_path("configs/implant_default.json")).unwrap();
        assert!((cfg.angle_deg - 7.0).abs() < 1e-12);
        assert!((cfg.parameters.get("projected_range").unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(cfg.mask_materials, vec![0]);
    }

    #[test]
    fn test_load_box_config() {
        let cfg = ImplantConfig::from_file(&config_path("configs/implant_box.json")).unwrap();
        assert_eq!(cfg.angle_deg, 0.0);
        assert_eq!(cfg.parameters.get("depth_max"), Some(1.0));
        assert!(cfg.mask_materials.is_empty());
    }

    #[test]
    fn test_missing_fields_default() {
        let cfg = ImplantConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg.angle_deg, 0.0);
        assert!(cfg.parameters.is_empty());
        assert!(cfg.mask_materials.is_empty());
    }

    #[test]
    fn test_rejects_non_finite_angle() {
        let cfg = ImplantConfig::new(f64::NAN, ModelParameters::new());
        assert!(matches!(cfg.validate(), Err(ImplantError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_non_finite_parameter() {
        let params = ModelParameters::new().with("dose", f64::INFINITY);
        let cfg = ImplantConfig::new(0.0, params);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_error() {
        let result = ImplantConfig::from_json_str("{\"angle_deg\": \"steep\"}");
        assert!(matches!(result, Err(ImplantError::Json(_))));
    }

    #[test]
    fn test_parameters_get_or() {
        let params = ModelParameters::new()
            .with("projected_range", 0.3)
            .with("broken", f64::NAN);
        assert_eq!(params.get_or("projected_range", 1.0), 0.3);
        assert_eq!(params.get_or("absent", 1.0), 1.0);
        assert_eq!(params.get_or("broken", 2.0), 2.0);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_roundtrip_serialization() {
        let cfg = ImplantConfig::new(
            12.5,
            ModelParameters::new().with("dose", 3.0).with("depth_straggle", 0.05),
        )
        .with_mask_materials(&[0, 4]);
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let cfg2 = ImplantConfig::from_json_str(&json).unwrap();
        assert_eq!(cfg.angle_deg, cfg2.angle_deg);
        assert_eq!(cfg.parameters, cfg2.parameters);
        assert_eq!(cfg.mask_materials, cfg2.mask_materials);
    }
}
