//! Shot-noise injection.
//!
//! A noisy image at vacuum level `f` replaces every clean pixel value `v`
//! with an independent Poisson draw of rate `v * f`, the counting
//! statistics of a detector receiving `f` electrons per pixel in vacuum.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};

/// Random source for noise realisations.
///
/// Unseeded sources produce a different realisation on every run; a seed
/// makes the sequence reproducible.
pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Draw one Poisson realisation of `clean` at vacuum level `flux`.
    pub fn poisson_realization(&mut self, clean: &Array2<f32>, flux: f64) -> Array2<u32> {
        let rng = &mut self.rng;
        clean.mapv(|value| sample_counts(rng, value as f64 * flux))
    }
}

fn sample_counts(rng: &mut StdRng, rate: f64) -> u32 {
    if !rate.is_finite() || rate <= 0.0 {
        return 0;
    }
    if rate >= u32::MAX as f64 {
        return u32::MAX;
    }
    match Poisson::new(rate) {
        Ok(poisson) => {
            let k: f64 = poisson.sample(rng);
            k.min(u32::MAX as f64) as u32
        }
        Err(_) => 0,
    }
}
