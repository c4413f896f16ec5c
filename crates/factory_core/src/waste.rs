//! Waste stream with per-kind recovery back into usable stock.

use crate::catalog::Catalog;
use crate::types::ResourceId;

#[derive(Debug, Clone)]
pub struct WasteStream {
    /// Tons of accumulated waste, indexed by resource handle.
    amounts: Vec<f32>,
    /// Lifetime total, monotonic. Reclaim does not reduce it.
    generated_total_t: f32,
}

impl WasteStream {
    pub fn new(resource_count: usize) -> Self {
        Self {
            amounts: vec![0.0; resource_count],
            generated_total_t: 0.0,
        }
    }

    pub fn add(&mut self, kind: ResourceId, quantity: f32) {
        if quantity <= 0.0 {
            return;
        }
        self.amounts[kind.index()] += quantity;
        self.generated_total_t += quantity;
    }

    pub fn amount(&self, kind: ResourceId) -> f32 {
        self.amounts[kind.index()]
    }

    /// Tons currently sitting in the stream.
    pub fn total_t(&self) -> f32 {
        self.amounts.iter().sum()
    }

    /// Lifetime tons ever emitted.
    pub fn generated_total_t(&self) -> f32 {
        self.generated_total_t
    }

    /// How much usable material could be recovered for `kind` right now.
    pub fn recoverable(&self, catalog: &Catalog, kind: ResourceId) -> f32 {
        let def = catalog.resource(kind);
        if !def.recyclable {
            return 0.0;
        }
        self.amounts[kind.index()] * def.recovery_fraction
    }

    /// Recovers up to `needed` tons of usable `kind`, drawing down the waste
    /// inventory at the kind's recovery fraction. Returns the usable amount
    /// actually recovered.
    pub fn reclaim(&mut self, catalog: &Catalog, kind: ResourceId, needed: f32) -> f32 {
        let def = catalog.resource(kind);
        if !def.recyclable || needed <= 0.0 || def.recovery_fraction <= 0.0 {
            return 0.0;
        }
        let slot = &mut self.amounts[kind.index()];
        let recovered = needed.min(*slot * def.recovery_fraction);
        *slot = (*slot - recovered / def.recovery_fraction).max(0.0);
        recovered
    }
}

/// Recovery fraction by conventional material name. Used by spec builders to
/// default `ResourceDef::recovery_fraction`.
pub fn default_recovery_fraction(name: &str) -> f32 {
    let lower = name.to_ascii_lowercase();
    if lower.contains("steel") {
        0.95
    } else if lower.contains("aluminum") || lower.contains("aluminium") {
        0.90
    } else if lower.contains("copper") {
        0.85
    } else if lower.contains("glass") {
        0.80
    } else if lower.contains("wafer") {
        0.70
    } else if lower.contains("plastic") {
        0.60
    } else {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceDef;

    fn catalog() -> (Catalog, ResourceId, ResourceId) {
        let mut catalog = Catalog::new();
        let steel = catalog.add_resource(ResourceDef {
            recovery_fraction: 0.95,
            ..ResourceDef::new("STEEL")
        });
        let sealant = catalog.add_resource(ResourceDef {
            recyclable: false,
            ..ResourceDef::new("SEALANT")
        });
        (catalog, steel, sealant)
    }

    #[test]
    fn reclaim_draws_down_waste_at_recovery_fraction() {
        let (catalog, steel, _) = catalog();
        let mut waste = WasteStream::new(catalog.resource_count());
        waste.add(steel, 100.0);

        let recovered = waste.reclaim(&catalog, steel, 19.0);
        assert!((recovered - 19.0).abs() < 1e-4);
        // 19 usable tons consumed 19 / 0.95 = 20 t of waste.
        assert!((waste.amount(steel) - 80.0).abs() < 1e-3);
        // Lifetime total untouched by reclaim.
        assert!((waste.generated_total_t() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn reclaim_is_capped_by_recoverable_stock() {
        let (catalog, steel, _) = catalog();
        let mut waste = WasteStream::new(catalog.resource_count());
        waste.add(steel, 10.0);
        let recovered = waste.reclaim(&catalog, steel, 1000.0);
        assert!((recovered - 9.5).abs() < 1e-4);
        assert!(waste.amount(steel) < 1e-3);
    }

    #[test]
    fn non_recyclable_kinds_recover_nothing() {
        let (catalog, _, sealant) = catalog();
        let mut waste = WasteStream::new(catalog.resource_count());
        waste.add(sealant, 50.0);
        assert_eq!(waste.recoverable(&catalog, sealant), 0.0);
        assert_eq!(waste.reclaim(&catalog, sealant, 10.0), 0.0);
        assert_eq!(waste.amount(sealant), 50.0);
    }

    #[test]
    fn name_based_fractions() {
        assert_eq!(default_recovery_fraction("STEEL"), 0.95);
        assert_eq!(default_recovery_fraction("SILICON_WAFER"), 0.70);
        assert_eq!(default_recovery_fraction("PLASTIC_WASTE"), 0.60);
        assert_eq!(default_recovery_fraction("UNOBTAINIUM"), 0.5);
    }
}
