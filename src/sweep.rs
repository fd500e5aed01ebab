use log::info;

use crate::params::{BlurConfig, BlurKind, HoughConfig, ParameterSet, UnsharpConfig};

/// Value grid explored by the parameter sweep. The defaults match the grid
/// searched for the eclipse dataset.
///
/// Radius bounds are fractions of the resize bound; 0 disables the bound
/// (0 minimum radius, "use the image size" maximum).
#[derive(Debug, Clone)]
pub struct SweepGrid {
    pub sizes: Vec<u32>,
    pub blur_kinds: Vec<BlurKind>,
    pub blur_ksizes: Vec<u32>,
    /// Final-blur sigmas, swept only for gaussian blur.
    pub blur_sigmas: Vec<u32>,
    pub dps: Vec<u32>,
    pub min_dists: Vec<u32>,
    pub param1s: Vec<u32>,
    pub param2s: Vec<u32>,
    pub min_radius_fracs: Vec<f64>,
    pub max_radius_fracs: Vec<f64>,
    pub unsharp_enabled: Vec<bool>,
    pub unsharp_blur_kinds: Vec<BlurKind>,
    pub unsharp_ksizes: Vec<u32>,
    /// Unsharp blur sigmas, swept only for gaussian unsharp blur.
    pub unsharp_sigmas: Vec<u32>,
    pub unsharp_add_weights: Vec<f64>,
    pub unsharp_gammas: Vec<i32>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            sizes: vec![1200, 1800],
            blur_kinds: vec![BlurKind::Gaussian, BlurKind::Median],
            blur_ksizes: vec![3, 9, 15, 21],
            blur_sigmas: vec![0, 5, 10, 20],
            dps: vec![1, 2, 4, 8],
            min_dists: vec![1],
            param1s: vec![7, 15, 30, 60],
            param2s: vec![7, 15, 30, 60],
            min_radius_fracs: vec![0.0, 1.0 / 32.0, 1.0 / 16.0, 1.0 / 8.0],
            max_radius_fracs: vec![0.0, 1.0],
            unsharp_enabled: vec![true, false],
            unsharp_blur_kinds: vec![BlurKind::Gaussian, BlurKind::Median],
            unsharp_ksizes: vec![3, 9, 15, 21],
            unsharp_sigmas: vec![0, 5, 10, 20],
            unsharp_add_weights: vec![0.4, 0.8, 2.0],
            unsharp_gammas: vec![0],
        }
    }
}

impl SweepGrid {
    /// Enumerates the full cross-product, calling `emit` once per fully
    /// specified parameter set, and returns the total count. Sigma values are
    /// only swept where the corresponding blur kind is gaussian; median blur
    /// takes no sigma. Pure enumeration: no I/O, no detection.
    pub fn for_each<F: FnMut(ParameterSet)>(&self, mut emit: F) -> usize {
        let mut count = 0;

        for &size in &self.sizes {
            for &blur_kind in &self.blur_kinds {
                for &blur_ksize in &self.blur_ksizes {
                    for &dp in &self.dps {
                        for &min_dist in &self.min_dists {
                            for &param1 in &self.param1s {
                                for &param2 in &self.param2s {
                                    for &min_frac in &self.min_radius_fracs {
                                        for &max_frac in &self.max_radius_fracs {
                                            let base = ParameterSet {
                                                size_bound: size,
                                                unsharp: None,
                                                blur: BlurConfig {
                                                    kind: blur_kind,
                                                    ksize: blur_ksize,
                                                    sigma: 0,
                                                },
                                                hough: HoughConfig { dp, min_dist, param1, param2 },
                                                min_radius_frac: min_frac,
                                                max_radius_frac: max_frac,
                                            };
                                            match blur_kind {
                                                BlurKind::Gaussian => {
                                                    for &sigma in &self.blur_sigmas {
                                                        let mut set = base.clone();
                                                        set.blur.sigma = sigma;
                                                        count += self.unsharp_sweep(set, &mut emit);
                                                    }
                                                }
                                                BlurKind::Median => {
                                                    count += self.unsharp_sweep(base, &mut emit);
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        info!("sweep enumerated {count} parameter sets");
        count
    }

    /// Collects the whole sweep. Intended for small grids; large sweeps
    /// should stream through [`for_each`](Self::for_each).
    pub fn enumerate(&self) -> Vec<ParameterSet> {
        let mut sets = Vec::new();
        self.for_each(|set| sets.push(set));
        sets
    }

    fn unsharp_sweep<F: FnMut(ParameterSet)>(&self, base: ParameterSet, emit: &mut F) -> usize {
        let mut count = 0;

        for &enabled in &self.unsharp_enabled {
            if !enabled {
                count += 1;
                emit(base.clone());
                continue;
            }
            for &u_kind in &self.unsharp_blur_kinds {
                for &u_ksize in &self.unsharp_ksizes {
                    for &add_weight in &self.unsharp_add_weights {
                        for &gamma in &self.unsharp_gammas {
                            let unsharp = UnsharpConfig {
                                blur: BlurConfig { kind: u_kind, ksize: u_ksize, sigma: 0 },
                                add_weight,
                                gamma,
                            };
                            match u_kind {
                                BlurKind::Gaussian => {
                                    for &u_sigma in &self.unsharp_sigmas {
                                        let mut set = base.clone();
                                        let mut unsharp = unsharp;
                                        unsharp.blur.sigma = u_sigma;
                                        set.unsharp = Some(unsharp);
                                        count += 1;
                                        emit(set);
                                    }
                                }
                                BlurKind::Median => {
                                    let mut set = base.clone();
                                    set.unsharp = Some(unsharp);
                                    count += 1;
                                    emit(set);
                                }
                            }
                        }
                    }
                }
            }
        }

        count
    }
}
