use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The immutable, cluster-specific declaration of acceptable state (spec §3
/// "Spec"). Sub-sections are keyed by subsystem name (`nvidia`, `infiniband`,
/// `ethernet`, `pcie_topo`, …); within a subsystem, entries are keyed by the
/// hardware identifier they apply to (a GPU PCI ID, an HCA board ID, ...).
///
/// The framework never interprets the fragment payload itself — it is opaque
/// YAML, narrowed by each Checker into its own typed fragment via
/// [`Spec::fragment`]. This is what makes round-tripping (load → emit → load)
/// lossless: unknown/future keys survive untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Spec {
    #[serde(flatten)]
    subsystems: HashMap<String, SubsystemSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubsystemSpec {
    #[serde(flatten)]
    entries: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("subsystem `{subsystem}` has no spec entry for hardware id `{hardware_id}`")]
    HardwareIdNotFound {
        subsystem: String,
        hardware_id: String,
    },
    #[error("subsystem `{subsystem}` hardware id `{hardware_id}` failed to parse as the expected fragment type")]
    FragmentParse {
        subsystem: String,
        hardware_id: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Spec {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn subsystem(&self, name: &str) -> Option<&SubsystemSpec> {
        self.subsystems.get(name)
    }

    pub fn insert_subsystem(&mut self, name: impl Into<String>, spec: SubsystemSpec) {
        self.subsystems.insert(name.into(), spec);
    }

    /// Narrow a subsystem's entry for `hardware_id` into a typed fragment `T`.
    ///
    /// Per spec §3's invariant, a Checker that finds no entry falls back to
    /// `T::default()` rather than failing, *unless* the caller requires
    /// presence via [`Spec::fragment_required`].
    pub fn fragment<T>(&self, subsystem: &str, hardware_id: &str) -> Result<T, SpecError>
    where
        T: DeserializeOwned + Default,
    {
        match self
            .subsystems
            .get(subsystem)
            .and_then(|s| s.entries.get(hardware_id))
        {
            Some(value) => {
                serde_yaml::from_value(value.clone()).map_err(|source| SpecError::FragmentParse {
                    subsystem: subsystem.to_string(),
                    hardware_id: hardware_id.to_string(),
                    source,
                })
            }
            None => Ok(T::default()),
        }
    }

    pub fn fragment_required<T>(&self, subsystem: &str, hardware_id: &str) -> Result<T, SpecError>
    where
        T: DeserializeOwned,
    {
        let value = self
            .subsystems
            .get(subsystem)
            .and_then(|s| s.entries.get(hardware_id))
            .ok_or_else(|| SpecError::HardwareIdNotFound {
                subsystem: subsystem.to_string(),
                hardware_id: hardware_id.to_string(),
            })?;
        serde_yaml::from_value(value.clone()).map_err(|source| SpecError::FragmentParse {
            subsystem: subsystem.to_string(),
            hardware_id: hardware_id.to_string(),
            source,
        })
    }
}

impl SubsystemSpec {
    pub fn insert(&mut self, hardware_id: impl Into<String>, fragment: impl Serialize) {
        let value = serde_yaml::to_value(fragment).expect("fragment must serialize to YAML");
        self.entries.insert(hardware_id.into(), value);
    }

    pub fn hardware_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct GpuFragment {
        gpu_nums: u32,
        #[serde(default)]
        gpu_memory: u64,
    }

    #[test]
    fn fragment_round_trips_through_yaml() {
        let mut spec = Spec::default();
        let mut nvidia = SubsystemSpec::default();
        nvidia.insert(
            "10de:2330",
            GpuFragment {
                gpu_nums: 8,
                gpu_memory: 81920,
            },
        );
        spec.insert_subsystem("nvidia", nvidia);

        let yaml = spec.to_yaml().unwrap();
        let reloaded = Spec::from_yaml(&yaml).unwrap();
        assert_eq!(spec, reloaded);

        let fragment: GpuFragment = reloaded.fragment("nvidia", "10de:2330").unwrap();
        assert_eq!(fragment.gpu_nums, 8);
    }

    #[test]
    fn missing_hardware_id_falls_back_to_default() {
        let spec = Spec::default();
        let fragment: GpuFragment = spec.fragment("nvidia", "unknown").unwrap();
        assert_eq!(fragment, GpuFragment::default());
    }

    #[test]
    fn fragment_required_errors_on_missing_hardware_id() {
        let spec = Spec::default();
        let err = spec.fragment_required::<GpuFragment>("nvidia", "unknown");
        assert!(matches!(err, Err(SpecError::HardwareIdNotFound { .. })));
    }
}
