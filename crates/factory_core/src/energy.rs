//! Solar generation and battery storage.
//!
//! Generation follows solar geometry (hour angle, declination, zenith) with
//! weather, panel-age, dust, and temperature derates. The battery enforces
//! state-of-charge bounds and C-rate caps and counts fractional cycles.

use rand::Rng;
use serde::Serialize;

use crate::noise::gaussian_noise;
use crate::types::{SimConfig, BATTERY_MAX_SOC, BATTERY_MIN_SOC, BATTERY_RATE_C};

/// Proxy peak irradiance at zenith, W/m2.
const PEAK_IRRADIANCE_W_M2: f32 = 1_000.0;

#[derive(Debug, Clone, Serialize)]
pub struct EnergyState {
    pub solar_capacity_kw: f32,
    pub panel_age_days: f32,
    pub days_since_cleaning: f32,
    pub battery_capacity_kwh: f32,
    pub battery_charge_kwh: f32,
    pub battery_cycles: f32,
    /// Generation over the most recent tick, for metrics.
    pub last_generation_kw: f32,
    pub generated_total_kwh: f32,
}

impl EnergyState {
    pub fn new(config: &SimConfig) -> Self {
        let capacity = config.battery_capacity_kwh;
        Self {
            solar_capacity_kw: config.initial_solar_capacity_kw,
            panel_age_days: 0.0,
            days_since_cleaning: 0.0,
            battery_capacity_kwh: capacity,
            // Start mid-band so the first night does not immediately hit the floor.
            battery_charge_kwh: 0.5 * capacity,
            battery_cycles: 0.0,
            last_generation_kw: 0.0,
            generated_total_kwh: 0.0,
        }
    }

    pub fn min_charge_kwh(&self) -> f32 {
        BATTERY_MIN_SOC * self.battery_capacity_kwh
    }

    pub fn max_charge_kwh(&self) -> f32 {
        BATTERY_MAX_SOC * self.battery_capacity_kwh
    }

    /// Cosine of the solar zenith angle; <= 0 means the sun is down.
    fn cos_zenith(latitude_deg: f32, hour_of_day: f32, day_of_year: u32) -> f32 {
        let hour_angle = (15.0 * (hour_of_day - 12.0)).to_radians();
        let declination = (23.45_f32
            * (2.0 * std::f32::consts::PI * (284.0 + day_of_year as f32) / 365.0).sin())
        .to_radians();
        let lat = latitude_deg.to_radians();
        lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos()
    }

    /// Instantaneous generation for the current hour and day.
    ///
    /// Weather jitter is the only stochastic term; with weather disabled the
    /// cloud factor collapses to its mean.
    pub fn solar_generation_kw(
        &self,
        config: &SimConfig,
        hour_of_day: f32,
        day_of_year: u32,
        rng: &mut impl Rng,
    ) -> f32 {
        let cos_z = Self::cos_zenith(config.latitude_deg, hour_of_day, day_of_year);
        if cos_z <= 0.0 {
            return 0.0;
        }
        let irradiance = PEAK_IRRADIANCE_W_M2 * cos_z;

        let weather = if config.enable_weather {
            let jitter = 1.0 + gaussian_noise(rng, 0.2);
            (1.0 - config.average_cloud_cover * jitter).clamp(0.1, 1.0)
        } else {
            (1.0 - config.average_cloud_cover).clamp(0.1, 1.0)
        };
        let age = 0.995_f32.powf(self.panel_age_days / 365.0);
        let dust = (1.0 - 0.01 * self.days_since_cleaning).max(0.7);
        let temp = 1.0 - 0.004 * (config.ambient_temperature_c - 25.0);

        (self.solar_capacity_kw * (irradiance / PEAK_IRRADIANCE_W_M2) * weather * age * dust * temp)
            .max(0.0)
    }

    /// Deterministic clear-ish-sky estimate of energy arriving over the next
    /// `duration_h`, for the scheduler's energy gate. Uses the current solar
    /// angle and the mean cloud cover, with no random draws.
    pub fn estimate_generation_kwh(
        &self,
        config: &SimConfig,
        hour_of_day: f32,
        day_of_year: u32,
        duration_h: f32,
    ) -> f32 {
        let cos_z = Self::cos_zenith(config.latitude_deg, hour_of_day, day_of_year);
        if cos_z <= 0.0 {
            return 0.0;
        }
        let weather = (1.0 - config.average_cloud_cover).clamp(0.1, 1.0);
        let age = 0.995_f32.powf(self.panel_age_days / 365.0);
        let dust = (1.0 - 0.01 * self.days_since_cleaning).max(0.7);
        let temp = 1.0 - 0.004 * (config.ambient_temperature_c - 25.0);
        (self.solar_capacity_kw * cos_z * weather * age * dust * temp).max(0.0) * duration_h
    }

    /// Applies a signed energy delta to the battery over `dt_hours`.
    ///
    /// Positive = surplus available to charge, negative = draw to cover.
    /// Charging pays the round-trip efficiency; both directions are capped at
    /// half the capacity per hour and bounded to the [0.2, 0.95] SOC band.
    pub fn apply_net(&mut self, net_kw: f32, dt_hours: f32, efficiency: f32) {
        let rate_cap_kwh = BATTERY_RATE_C * self.battery_capacity_kwh * dt_hours;
        if net_kw >= 0.0 {
            let offered = (net_kw * dt_hours).min(rate_cap_kwh);
            let headroom = (self.max_charge_kwh() - self.battery_charge_kwh).max(0.0);
            let stored = (offered * efficiency).min(headroom);
            self.battery_charge_kwh += stored;
            self.battery_cycles += stored / self.battery_capacity_kwh;
        } else {
            let wanted = (-net_kw * dt_hours).min(rate_cap_kwh);
            let available = (self.battery_charge_kwh - self.min_charge_kwh()).max(0.0);
            let drawn = wanted.min(available);
            self.battery_charge_kwh -= drawn;
            self.battery_cycles += drawn / self.battery_capacity_kwh;
        }
    }

    /// Debits a task's estimated energy at admission time. The draw stops at
    /// the SOC floor; the energy gate has already checked that forecast solar
    /// covers the remainder.
    pub fn debit(&mut self, energy_kwh: f32) {
        let available = (self.battery_charge_kwh - self.min_charge_kwh()).max(0.0);
        let drawn = energy_kwh.min(available);
        self.battery_charge_kwh -= drawn;
        self.battery_cycles += drawn / self.battery_capacity_kwh;
    }

    /// Daily aging: panel degradation clock and dust accumulation.
    pub fn age(&mut self, dt_hours: f32) {
        self.panel_age_days += dt_hours / 24.0;
        self.days_since_cleaning += dt_hours / 24.0;
    }
}
