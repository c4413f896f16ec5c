//! Software packages as producible, versioned assets.
//!
//! Each development run emits a new version whose bug rate improves with
//! cumulative development hours. The scheduler folds the latest version's
//! reliability into quality for recipes that declare a software dependency.

use ahash::AHashMap;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::types::ResourceId;

/// Fraction of raw bug rate surviving testing.
const TESTING_REDUCTION: f32 = 0.1;

#[derive(Debug, Clone, Serialize)]
pub struct SoftwarePackage {
    pub kind: ResourceId,
    pub version: u32,
    pub bug_rate: f32,
    pub dev_hours: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SoftwareLibrary {
    packages: AHashMap<ResourceId, Vec<SoftwarePackage>>,
    total_dev_hours: f32,
}

impl SoftwareLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, kind: ResourceId) -> bool {
        self.packages.contains_key(&kind)
    }

    pub fn package_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn latest(&self, kind: ResourceId) -> Option<&SoftwarePackage> {
        self.packages.get(&kind).and_then(|versions| versions.last())
    }

    pub fn total_dev_hours(&self) -> f32 {
        self.total_dev_hours
    }

    /// Sum of latest-version bug rates across all kinds. Metrics feed.
    /// Summed in handle order so float accumulation is reproducible.
    pub fn open_bug_rate(&self) -> f32 {
        let mut latest: Vec<(ResourceId, f32)> = self
            .packages
            .iter()
            .filter_map(|(kind, versions)| versions.last().map(|p| (*kind, p.bug_rate)))
            .collect();
        latest.sort_unstable_by_key(|(kind, _)| *kind);
        latest.iter().map(|(_, rate)| rate).sum()
    }

    /// Registers a finished development run and returns the new package.
    ///
    /// `bug_rate = base * max(0.5, 1 - total_dev_hours/1000) * 0.1`: more
    /// cumulative development experience means fewer shipped bugs, floored
    /// at half the base, then cut 90% by testing.
    pub fn develop(
        &mut self,
        catalog: &Catalog,
        kind: ResourceId,
        dev_hours: f32,
    ) -> SoftwarePackage {
        self.total_dev_hours += dev_hours;
        let base_rate = catalog.software(kind).map_or(0.05, |s| s.base_bug_rate);
        let experience = (1.0 - self.total_dev_hours / 1000.0).max(0.5);
        let bug_rate = base_rate * experience * TESTING_REDUCTION;

        let versions = self.packages.entry(kind).or_default();
        let package = SoftwarePackage {
            kind,
            version: versions.len() as u32 + 1,
            bug_rate,
            dev_hours,
        };
        versions.push(package.clone());
        package
    }

    /// Reliability multiplier the scheduler applies. 1.0 when the recipe has
    /// no software dependency or the kind is unknown.
    pub fn reliability(&self, kind: Option<ResourceId>) -> f32 {
        match kind.and_then(|k| self.latest(k)) {
            Some(package) => 1.0 - package.bug_rate,
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ResourceDef, SoftwareKindDef};

    fn catalog_with_plc() -> (Catalog, ResourceId) {
        let mut catalog = Catalog::new();
        let plc = catalog.add_resource(ResourceDef::new("PLC_PROGRAM"));
        catalog.register_software(SoftwareKindDef {
            resource: plc,
            base_bug_rate: 0.05,
            compatible_module_kinds: vec![],
        });
        (catalog, plc)
    }

    #[test]
    fn versions_increment_and_bug_rate_falls_with_experience() {
        let (catalog, plc) = catalog_with_plc();
        let mut library = SoftwareLibrary::new();

        let v1 = library.develop(&catalog, plc, 100.0);
        assert_eq!(v1.version, 1);
        // 0.05 * (1 - 0.1) * 0.1
        assert!((v1.bug_rate - 0.0045).abs() < 1e-6);

        let v2 = library.develop(&catalog, plc, 400.0);
        assert_eq!(v2.version, 2);
        assert!(v2.bug_rate < v1.bug_rate);
    }

    #[test]
    fn experience_factor_floors_at_half() {
        let (catalog, plc) = catalog_with_plc();
        let mut library = SoftwareLibrary::new();
        let package = library.develop(&catalog, plc, 10_000.0);
        assert!((package.bug_rate - 0.05 * 0.5 * 0.1).abs() < 1e-6);
    }

    #[test]
    fn reliability_defaults_to_one() {
        let (catalog, plc) = catalog_with_plc();
        let mut library = SoftwareLibrary::new();
        assert_eq!(library.reliability(None), 1.0);
        assert_eq!(library.reliability(Some(plc)), 1.0);

        library.develop(&catalog, plc, 100.0);
        let r = library.reliability(Some(plc));
        assert!(r < 1.0 && r > 0.99);
    }
}
