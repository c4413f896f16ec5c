//! Zero-mean Gaussian draws via Box-Muller over the shared simulation Rng.

use rand::Rng;

/// One sample of N(0, std^2). `std <= 0` returns 0 so callers can disable
/// jitter without branching.
pub(crate) fn gaussian_noise(rng: &mut impl Rng, std: f32) -> f32 {
    if std <= 0.0 {
        return 0.0;
    }
    // gen() yields [0, 1); shift to (0, 1] so ln() stays finite.
    let u1: f32 = 1.0 - rng.gen::<f32>();
    let u2: f32 = rng.gen();
    let mag = (-2.0 * u1.ln()).sqrt();
    std * mag * (2.0 * std::f32::consts::PI * u2).cos()
}
