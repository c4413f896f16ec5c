//! Physical inventory gated by volume, weight, and storage temperature.
//!
//! Quantities are tons; volume is `quantity / density` (t over t/m3).
//! Storage is perfectly fungible per kind: no lots, no fragmentation.

use crate::catalog::Catalog;
use crate::error::{SimError, StorageRejection};
use crate::types::ResourceId;

/// Stored kinds must sit within this band of each other when the store is
/// temperature controlled.
const STORAGE_TEMP_TOLERANCE_C: f32 = 10.0;

/// Quantities below this are treated as empty when checking temperature
/// compatibility and utilization.
const MIN_MEANINGFUL_TONS: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct Storage {
    volume_cap_m3: f32,
    weight_cap_t: f32,
    temperature_controlled: bool,
    limits_enabled: bool,
    /// Tons on hand, indexed by resource handle.
    inventory: Vec<f32>,
}

impl Storage {
    pub fn new(
        volume_cap_m3: f32,
        weight_cap_t: f32,
        temperature_controlled: bool,
        limits_enabled: bool,
        resource_count: usize,
    ) -> Self {
        Self {
            volume_cap_m3,
            weight_cap_t,
            temperature_controlled,
            limits_enabled,
            inventory: vec![0.0; resource_count],
        }
    }

    pub fn quantity(&self, kind: ResourceId) -> f32 {
        self.inventory[kind.index()]
    }

    pub fn total_weight_t(&self) -> f32 {
        self.inventory.iter().sum()
    }

    pub fn total_volume_m3(&self, catalog: &Catalog) -> f32 {
        self.inventory
            .iter()
            .enumerate()
            .map(|(i, &qty)| qty / catalog.resource(ResourceId(i as u16)).density_t_per_m3)
            .sum()
    }

    /// Fraction of the tighter cap currently in use.
    pub fn utilization(&self, catalog: &Catalog) -> f32 {
        let by_volume = self.total_volume_m3(catalog) / self.volume_cap_m3;
        let by_weight = self.total_weight_t() / self.weight_cap_t;
        by_volume.max(by_weight)
    }

    /// Admission check. Rejects on volume, weight, or (when temperature
    /// controlled) a stored kind whose preferred temperature is too far from
    /// the incoming kind's.
    pub fn can_store(
        &self,
        catalog: &Catalog,
        kind: ResourceId,
        quantity: f32,
    ) -> Result<(), StorageRejection> {
        if !self.limits_enabled {
            return Ok(());
        }
        let def = catalog.resource(kind);

        let projected_volume =
            self.total_volume_m3(catalog) + quantity / def.density_t_per_m3;
        if projected_volume > self.volume_cap_m3 {
            return Err(StorageRejection::Volume {
                projected_m3: projected_volume,
                cap_m3: self.volume_cap_m3,
            });
        }

        let projected_weight = self.total_weight_t() + quantity;
        if projected_weight > self.weight_cap_t {
            return Err(StorageRejection::Weight {
                projected_t: projected_weight,
                cap_t: self.weight_cap_t,
            });
        }

        if self.temperature_controlled {
            for (i, &qty) in self.inventory.iter().enumerate() {
                if qty <= MIN_MEANINGFUL_TONS || i == kind.index() {
                    continue;
                }
                let stored = catalog.resource(ResourceId(i as u16));
                if (stored.storage_temp_c - def.storage_temp_c).abs() > STORAGE_TEMP_TOLERANCE_C {
                    return Err(StorageRejection::Temperature {
                        incoming_c: def.storage_temp_c,
                        stored_c: stored.storage_temp_c,
                    });
                }
            }
        }

        Ok(())
    }

    /// Deposits `quantity` of `kind` after an admission check.
    pub fn store(
        &mut self,
        catalog: &Catalog,
        kind: ResourceId,
        quantity: f32,
    ) -> Result<(), StorageRejection> {
        self.can_store(catalog, kind, quantity)?;
        self.inventory[kind.index()] += quantity;
        Ok(())
    }

    /// Removes `quantity` of `kind`. Going negative is an invariant breach;
    /// callers gate on availability first.
    pub fn consume(&mut self, kind: ResourceId, quantity: f32) -> Result<(), SimError> {
        let slot = &mut self.inventory[kind.index()];
        if *slot + 1e-4 < quantity {
            return Err(SimError::State {
                detail: format!(
                    "consume of {quantity:.3} t from kind #{kind} exceeds stock {slot:.3} t"
                ),
            });
        }
        *slot = (*slot - quantity).max(0.0);
        Ok(())
    }

    /// Deposit without admission checks. Only for seeding initial stockpiles.
    pub fn seed(&mut self, kind: ResourceId, quantity: f32) {
        self.inventory[kind.index()] += quantity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceDef;

    fn two_kind_catalog() -> (Catalog, ResourceId, ResourceId) {
        let mut catalog = Catalog::new();
        let iron = catalog.add_resource(ResourceDef {
            density_t_per_m3: 4.0,
            ..ResourceDef::new("IRON_ORE")
        });
        let cryo = catalog.add_resource(ResourceDef {
            density_t_per_m3: 1.0,
            storage_temp_c: -40.0,
            ..ResourceDef::new("CRYO_FEEDSTOCK")
        });
        (catalog, iron, cryo)
    }

    #[test]
    fn rejects_on_volume_but_not_weight() {
        let (catalog, iron, _) = two_kind_catalog();
        // 100 m3 cap, huge weight cap: 500 t of density-4 ore is 125 m3.
        let storage = Storage::new(100.0, 1e9, false, true, catalog.resource_count());
        assert!(matches!(
            storage.can_store(&catalog, iron, 500.0),
            Err(StorageRejection::Volume { .. })
        ));
        assert!(storage.can_store(&catalog, iron, 300.0).is_ok());
    }

    #[test]
    fn rejects_on_weight_but_not_volume() {
        let (catalog, iron, _) = two_kind_catalog();
        let storage = Storage::new(1e9, 100.0, false, true, catalog.resource_count());
        assert!(matches!(
            storage.can_store(&catalog, iron, 150.0),
            Err(StorageRejection::Weight { .. })
        ));
    }

    #[test]
    fn rejects_temperature_conflict_when_controlled() {
        let (catalog, iron, cryo) = two_kind_catalog();
        let mut storage = Storage::new(1e9, 1e9, true, true, catalog.resource_count());
        storage.store(&catalog, iron, 10.0).unwrap();
        assert!(matches!(
            storage.can_store(&catalog, cryo, 1.0),
            Err(StorageRejection::Temperature { .. })
        ));
    }

    #[test]
    fn consume_below_stock_is_a_state_error() {
        let (catalog, iron, _) = two_kind_catalog();
        let mut storage = Storage::new(1e9, 1e9, false, true, catalog.resource_count());
        storage.store(&catalog, iron, 5.0).unwrap();
        assert!(storage.consume(iron, 10.0).is_err());
        assert!(storage.consume(iron, 5.0).is_ok());
    }

    #[test]
    fn limits_disabled_admits_anything() {
        let (catalog, iron, _) = two_kind_catalog();
        let storage = Storage::new(1.0, 1.0, false, false, catalog.resource_count());
        assert!(storage.can_store(&catalog, iron, 1e6).is_ok());
    }
}
