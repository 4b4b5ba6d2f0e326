//! Correlation engine.
//!
//! The matrix is assembled from each risk's dependency list, factored
//! once per run (Cholesky), and applied to every iteration's vector of
//! independent standard normals. Correlation is induced in normal space;
//! each component is then re-expressed through its risk's own marginal.
//!
//! RULE: An inconsistent (non-PSD) set of coefficients never fails a run.
//! It is projected onto the nearest valid matrix by eigenvalue clipping
//! and the projection is reported as a `PsdCorrection`.

use crate::{
    error::{SimError, SimResult},
    risk::Risk,
};
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Eigenvalues above this are treated as PSD (round-off tolerance).
const PSD_TOLERANCE: f64 = -1e-9;

/// Repair attempts, each raising the eigenvalue floor tenfold.
const MAX_REPAIR_ATTEMPTS: usize = 6;

/// Symmetric, unit-diagonal correlation matrix in risk order.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    values: DMatrix<f64>,
}

impl CorrelationMatrix {
    /// Build the matrix from dependency lists. A pair specified from
    /// both sides takes the mean of the two coefficients. Unknown ids
    /// and self-references are skipped (validation rejects them).
    pub fn assemble(risks: &[Risk]) -> Self {
        let n = risks.len();
        let index: HashMap<&str, usize> = risks
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.as_str(), i))
            .collect();

        let mut pairs: BTreeMap<(usize, usize), (f64, u32)> = BTreeMap::new();
        for (i, risk) in risks.iter().enumerate() {
            for dep in &risk.correlations {
                let Some(&j) = index.get(dep.risk_id.as_str()) else {
                    continue;
                };
                if i == j {
                    continue;
                }
                let key = (i.min(j), i.max(j));
                let entry = pairs.entry(key).or_insert((0.0, 0));
                entry.0 += dep.coefficient.clamp(-1.0, 1.0);
                entry.1 += 1;
            }
        }

        let mut values = DMatrix::identity(n, n);
        for ((i, j), (sum, count)) in pairs {
            let rho = sum / count as f64;
            values[(i, j)] = rho;
            values[(j, i)] = rho;
        }

        Self { values }
    }

    pub fn size(&self) -> usize {
        self.values.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[(i, j)]
    }

    /// True when no off-diagonal entry is non-zero.
    pub fn is_identity(&self) -> bool {
        let n = self.size();
        (0..n).all(|i| (0..n).all(|j| i == j || self.values[(i, j)] == 0.0))
    }
}

/// Recorded when the requested matrix was not positive semi-definite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsdCorrection {
    /// Smallest eigenvalue of the matrix as requested.
    pub min_eigenvalue: f64,
    /// Floor the eigenvalues were clipped to.
    pub eigenvalue_floor: f64,
    /// Largest absolute change to any coefficient.
    pub max_adjustment: f64,
}

/// Lower-triangular factor applied to independent draws.
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    size: usize,
    /// None for the identity matrix (draws pass through).
    factor: Option<DMatrix<f64>>,
    correction: Option<PsdCorrection>,
}

impl CorrelationEngine {
    pub fn new(matrix: &CorrelationMatrix, eigenvalue_floor: f64) -> SimResult<Self> {
        let size = matrix.size();
        if matrix.is_identity() {
            return Ok(Self { size, factor: None, correction: None });
        }

        if let Some(cholesky) = matrix.values.clone().cholesky() {
            log::debug!("correlation: factored {size}x{size} matrix directly");
            return Ok(Self {
                size,
                factor: Some(cholesky.l()),
                correction: None,
            });
        }

        let min_eigenvalue = SymmetricEigen::new(matrix.values.clone())
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);

        let mut floor = eigenvalue_floor.max(f64::EPSILON);
        for _ in 0..MAX_REPAIR_ATTEMPTS {
            let repaired = nearest_correlation_matrix(&matrix.values, floor);
            if let Some(cholesky) = repaired.clone().cholesky() {
                let max_adjustment = (&repaired - &matrix.values).amax();
                // Singular but PSD input (e.g. a coefficient of exactly 1)
                // only needs the floor to factor; that is not a correction.
                let correction = (min_eigenvalue < PSD_TOLERANCE).then(|| {
                    log::warn!(
                        "correlation: matrix not PSD (min eigenvalue {min_eigenvalue:.4}); \
                         clipped to floor {floor:e}, max coefficient change {max_adjustment:.4}"
                    );
                    PsdCorrection {
                        min_eigenvalue,
                        eigenvalue_floor: floor,
                        max_adjustment,
                    }
                });
                return Ok(Self {
                    size,
                    factor: Some(cholesky.l()),
                    correction,
                });
            }
            floor *= 10.0;
        }

        Err(SimError::CorrelationFactorization { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn correction(&self) -> Option<&PsdCorrection> {
        self.correction.as_ref()
    }

    /// out = L · independent. Both slices must have length `size()`.
    pub fn correlate(&self, independent: &[f64], out: &mut [f64]) {
        debug_assert_eq!(independent.len(), self.size);
        debug_assert_eq!(out.len(), self.size);
        match &self.factor {
            None => out.copy_from_slice(independent),
            Some(l) => {
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = (0..=i).map(|k| l[(i, k)] * independent[k]).sum();
                }
            }
        }
    }
}

/// Clip eigenvalues to `floor`, rebuild, then rescale to unit diagonal.
fn nearest_correlation_matrix(values: &DMatrix<f64>, floor: f64) -> DMatrix<f64> {
    let n = values.nrows();
    let eigen = SymmetricEigen::new(values.clone());
    let clipped = eigen.eigenvalues.map(|l| l.max(floor));
    let vectors = &eigen.eigenvectors;
    let rebuilt = vectors * DMatrix::from_diagonal(&clipped) * vectors.transpose();

    let scale: Vec<f64> = (0..n).map(|i| rebuilt[(i, i)].sqrt()).collect();
    let mut repaired = DMatrix::identity(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let rho = ((rebuilt[(i, j)] + rebuilt[(j, i)]) / 2.0 / (scale[i] * scale[j]))
                .clamp(-1.0, 1.0);
            repaired[(i, j)] = rho;
            repaired[(j, i)] = rho;
        }
    }
    repaired
}
