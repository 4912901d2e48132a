//! Generic Lotka-Volterra Engine
//!
//! Type-I generalised Lotka-Volterra, solved for its fixed point rather than
//! integrated: `A·x = b` gives the equilibrium abundances and the
//! eigenvalues of the community matrix at `x` give local stability.
//!
//! The engine knows nothing about ecology. Every rate comes from a
//! [`SpeciesParams`] implementation supplied at construction, and the
//! adjacency walked during a build is whatever the caller passes in.

pub mod index;

use crate::core::error::{ModelError, ModelResult};
use nalgebra::linalg::{Schur, SymmetricEigen};
use nalgebra::{DMatrix, DVector};
use std::collections::HashSet;
use std::fmt::{Debug, Write};
use std::hash::Hash;
use tracing::{debug, warn};

pub use index::SpeciesIndex;

/// Anything usable as an external species id.
pub trait SpeciesKey: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> SpeciesKey for T {}

/// The four per-species rates the engine is parameterised by.
pub trait SpeciesParams<K> {
    /// Intrinsic growth (positive) or loss (negative) rate.
    fn growth(&self, species: &K) -> f64;

    /// Diagonal of the interaction matrix.
    fn self_limitation(&self, species: &K) -> f64;

    /// Per-capita rate at which `consumer` captures `resource`.
    fn attack_rate(&self, resource: &K, consumer: &K) -> ModelResult<f64>;

    /// Fraction of captured `resource` biomass converted into `consumer`.
    fn efficiency(&self, resource: &K, consumer: &K) -> f64;
}

/// Closure-backed parameter set.
#[derive(Clone)]
pub struct FnParams<G, S, A, E> {
    pub growth: G,
    pub self_limitation: S,
    pub attack_rate: A,
    pub efficiency: E,
}

impl<K, G, S, A, E> SpeciesParams<K> for FnParams<G, S, A, E>
where
    G: Fn(&K) -> f64,
    S: Fn(&K) -> f64,
    A: Fn(&K, &K) -> f64,
    E: Fn(&K, &K) -> f64,
{
    fn growth(&self, species: &K) -> f64 {
        (self.growth)(species)
    }

    fn self_limitation(&self, species: &K) -> f64 {
        (self.self_limitation)(species)
    }

    fn attack_rate(&self, resource: &K, consumer: &K) -> ModelResult<f64> {
        Ok((self.attack_rate)(resource, consumer))
    }

    fn efficiency(&self, resource: &K, consumer: &K) -> f64 {
        (self.efficiency)(resource, consumer)
    }
}

/// One predation edge as it was entered into the last matrix build.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub resource: usize,
    pub consumer: usize,
    pub attack_rate: f64,
    pub efficiency: f64,
}

#[derive(Clone, Debug)]
pub struct LotkaVolterra<K, P> {
    params: P,
    index: SpeciesIndex<K>,

    // A is the interaction matrix, b is -r, x is the equilibrium abundance
    a: DMatrix<f64>,
    b: DVector<f64>,
    x: DVector<f64>,
    // Jacobian evaluated at x
    community: DMatrix<f64>,
    edges: Vec<Edge>,

    equilibrium_solved: bool,
    dominant_eigenvalue: f64,
    reactivity: f64,
    eigen_max_iterations: usize,
}

impl<K: SpeciesKey, P: SpeciesParams<K>> LotkaVolterra<K, P> {
    pub fn new(params: P) -> Self {
        LotkaVolterra {
            params,
            index: SpeciesIndex::new(),
            a: DMatrix::zeros(0, 0),
            b: DVector::zeros(0),
            x: DVector::zeros(0),
            community: DMatrix::zeros(0, 0),
            edges: Vec::new(),
            equilibrium_solved: false,
            dominant_eigenvalue: f64::NAN,
            reactivity: f64::NAN,
            eigen_max_iterations: 10_000,
        }
    }

    pub fn with_eigen_max_iterations(mut self, max_iterations: usize) -> Self {
        self.eigen_max_iterations = max_iterations;
        self
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    /// Parameters may change freely between solves; the next build reads
    /// them fresh.
    pub fn params_mut(&mut self) -> &mut P {
        &mut self.params
    }

    pub fn index(&self) -> &SpeciesIndex<K> {
        &self.index
    }

    pub fn richness(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, species: &K) -> bool {
        self.index.contains(species)
    }

    pub fn add_species(&mut self, species: K) -> ModelResult<()> {
        self.index.insert(species)?;
        self.reallocate();
        Ok(())
    }

    pub fn remove_species(&mut self, species: &K) -> ModelResult<()> {
        self.index.remove(species)?;
        self.reallocate();
        Ok(())
    }

    pub fn add_interaction(&mut self, resource: &K, consumer: &K) -> ModelResult<()> {
        self.index.add_interaction(resource, consumer)
    }

    pub fn remove_interaction(&mut self, resource: &K, consumer: &K) -> ModelResult<()> {
        self.index.remove_interaction(resource, consumer)
    }

    pub fn has_interaction(&self, resource: &K, consumer: &K) -> bool {
        self.index.has_interaction(resource, consumer)
    }

    /// Adjacency from the engine's own interaction set, for callers that do
    /// not keep the graph elsewhere.
    pub fn consumers_of(&self, resource: &K) -> Vec<K> {
        self.index.consumers_of(resource)
    }

    // Sizes change, so every buffer is replaced rather than resized.
    fn reallocate(&mut self) {
        let n = self.index.len();
        self.a = DMatrix::zeros(n, n);
        self.b = DVector::zeros(n);
        self.x = DVector::zeros(n);
        self.community = DMatrix::zeros(n, n);
        self.edges.clear();
        self.equilibrium_solved = false;
        self.dominant_eigenvalue = f64::NAN;
        self.reactivity = f64::NAN;
    }

    /// Rebuilds `A` and `b` from scratch out of the current parameters and
    /// the supplied adjacency.
    pub fn build_interaction_matrix<F, I>(&mut self, mut consumers_of: F) -> ModelResult<()>
    where
        F: FnMut(&K) -> I,
        I: IntoIterator<Item = K>,
    {
        self.build_with(|index, res| {
            consumers_of(res)
                .into_iter()
                .map(|con| {
                    index
                        .index_of(&con)
                        .ok_or_else(|| ModelError::unknown_species(&con))
                })
                .collect()
        })
    }

    /// Same as [`build_interaction_matrix`](Self::build_interaction_matrix)
    /// but walks the engine's own dense-index adjacency.
    pub fn build_own_interaction_matrix(&mut self) -> ModelResult<()> {
        self.build_with(|index, res| {
            let i = index
                .index_of(res)
                .ok_or_else(|| ModelError::unknown_species(res))?;
            let mut consumers: Vec<usize> = index
                .internal_consumers(i)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default();
            // hash order would make the edge list nondeterministic
            consumers.sort_unstable();
            Ok(consumers)
        })
    }

    fn build_with<F>(&mut self, mut consumers_of: F) -> ModelResult<()>
    where
        F: FnMut(&SpeciesIndex<K>, &K) -> ModelResult<Vec<usize>>,
    {
        let n = self.index.len();
        self.a.fill(0.0);
        self.b.fill(0.0);
        self.edges.clear();
        self.equilibrium_solved = false;

        for i in 0..n {
            let res = match self.index.key_at(i) {
                Some(key) => key.clone(),
                None => break,
            };
            self.b[i] = -self.params.growth(&res);
            self.a[(i, i)] += self.params.self_limitation(&res);

            let mut seen = HashSet::new();
            for j in consumers_of(&self.index, &res)? {
                if !seen.insert(j) {
                    let con = &self.index.keys()[j];
                    return Err(ModelError::duplicate_interaction(&res, con));
                }
                let con = self.index.keys()[j].clone();
                let attack_rate = self.params.attack_rate(&res, &con)?;
                let efficiency = self.params.efficiency(&res, &con);

                self.a[(i, j)] -= attack_rate;
                self.a[(j, i)] += efficiency * attack_rate;
                self.edges.push(Edge {
                    resource: i,
                    consumer: j,
                    attack_rate,
                    efficiency,
                });
            }
        }
        Ok(())
    }

    /// Solves `A·x = b`. True iff every abundance is strictly positive.
    ///
    /// A singular `A` has no unique fixed point; the abundances become NaN
    /// and the system is reported infeasible.
    pub fn solve_feasibility<F, I>(&mut self, consumers_of: F) -> ModelResult<bool>
    where
        F: FnMut(&K) -> I,
        I: IntoIterator<Item = K>,
    {
        self.build_interaction_matrix(consumers_of)?;
        Ok(self.solve_equilibrium())
    }

    /// Feasibility over the engine's own interaction set.
    pub fn solve_own_feasibility(&mut self) -> ModelResult<bool> {
        self.build_own_interaction_matrix()?;
        Ok(self.solve_equilibrium())
    }

    fn solve_equilibrium(&mut self) -> bool {
        let n = self.index.len();
        if n > 0 {
            self.x = match self.a.clone().lu().solve(&self.b) {
                Some(x) => x,
                None => {
                    warn!("⚠️ [LotkaVolterra] Singular interaction matrix (n={})", n);
                    DVector::from_element(n, f64::NAN)
                }
            };
        }
        self.equilibrium_solved = true;

        let feasible = self.x.iter().all(|&abundance| abundance > 0.0);
        debug!("[LotkaVolterra] Equilibrium solved: n={} feasible={}", n, feasible);
        feasible
    }

    /// True iff every eigenvalue of the community matrix has non-positive
    /// real part. Depends on the last feasibility solve.
    pub fn solve_stability(&mut self) -> ModelResult<bool> {
        if !self.equilibrium_solved {
            return Err(ModelError::StabilityBeforeFeasibility);
        }
        if self.index.is_empty() {
            self.dominant_eigenvalue = f64::NEG_INFINITY;
            return Ok(true);
        }

        self.build_community_matrix();
        self.dominant_eigenvalue = self.max_real_eigenvalue();
        Ok(self.dominant_eigenvalue <= 0.0)
    }

    /// True iff the symmetric part of the community matrix is negative
    /// semi-definite, i.e. no perturbation grows even transiently.
    pub fn solve_reactivity(&mut self) -> ModelResult<bool> {
        if !self.equilibrium_solved {
            return Err(ModelError::StabilityBeforeFeasibility);
        }
        if self.index.is_empty() {
            self.reactivity = f64::NEG_INFINITY;
            return Ok(true);
        }

        self.build_community_matrix();
        let hermitian = (&self.community + self.community.transpose()) * 0.5;
        self.reactivity = if hermitian.iter().all(|v| v.is_finite()) {
            match SymmetricEigen::try_new(hermitian, f64::EPSILON, self.eigen_max_iterations) {
                Some(eigen) => eigen.eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                None => {
                    warn!("⚠️ [LotkaVolterra] Symmetric eigen-decomposition did not converge");
                    f64::NAN
                }
            }
        } else {
            f64::NAN
        };
        Ok(self.reactivity <= 0.0)
    }

    // With A·x = b at equilibrium the diagonal collapses to A_ii·x_i.
    fn build_community_matrix(&mut self) {
        let n = self.index.len();
        for i in 0..n {
            for j in 0..n {
                self.community[(i, j)] = self.a[(i, j)] * self.x[i];
            }
        }
    }

    fn max_real_eigenvalue(&self) -> f64 {
        // the Schur iteration never terminates on NaN input
        if self.community.iter().any(|v| !v.is_finite()) {
            return f64::NAN;
        }
        match Schur::try_new(self.community.clone(), f64::EPSILON, self.eigen_max_iterations) {
            Some(schur) => schur
                .complex_eigenvalues()
                .iter()
                .map(|lambda| lambda.re)
                .fold(f64::NEG_INFINITY, f64::max),
            None => {
                warn!("⚠️ [LotkaVolterra] Schur decomposition did not converge");
                f64::NAN
            }
        }
    }

    pub fn is_equilibrium_solved(&self) -> bool {
        self.equilibrium_solved
    }

    pub fn get_solved_abundance(&self, species: &K) -> ModelResult<f64> {
        let i = self
            .index
            .index_of(species)
            .ok_or_else(|| ModelError::unknown_species(species))?;
        Ok(self.x[i])
    }

    /// `efficiency · attack_rate · x[resource]`, zero if the last build had
    /// no such edge.
    pub fn get_solved_flux(&self, resource: &K, consumer: &K) -> ModelResult<f64> {
        let i = self
            .index
            .index_of(resource)
            .ok_or_else(|| ModelError::unknown_species(resource))?;
        let j = self
            .index
            .index_of(consumer)
            .ok_or_else(|| ModelError::unknown_species(consumer))?;
        Ok(self
            .edges
            .iter()
            .filter(|e| e.resource == i && e.consumer == j)
            .map(|e| self.edge_flux(e))
            .sum())
    }

    fn edge_flux(&self, edge: &Edge) -> f64 {
        edge.efficiency * edge.attack_rate * self.x[edge.resource]
    }

    pub fn total_flux(&self) -> f64 {
        self.edges.iter().map(|e| self.edge_flux(e)).sum()
    }

    pub fn total_abundance(&self) -> f64 {
        self.x.sum()
    }

    pub fn link_count(&self) -> usize {
        self.edges.len()
    }

    /// Links per possible ordered pair, `L / S²`.
    pub fn connectance(&self) -> f64 {
        let s = self.index.len();
        if s == 0 {
            0.0
        } else {
            self.edges.len() as f64 / (s * s) as f64
        }
    }

    /// May complexity `σ·sqrt(S·C)`, with `σ` the RMS magnitude of the
    /// non-zero off-diagonal interaction strengths.
    pub fn complexity(&self) -> f64 {
        let n = self.index.len();
        let mut sum_sq = 0.0;
        let mut count = 0usize;
        for i in 0..n {
            for j in 0..n {
                let a_ij = self.a[(i, j)];
                if i != j && a_ij != 0.0 {
                    sum_sq += a_ij * a_ij;
                    count += 1;
                }
            }
        }
        if count == 0 {
            return 0.0;
        }
        let sigma = (sum_sq / count as f64).sqrt();
        sigma * (n as f64 * self.connectance()).sqrt()
    }

    /// Largest real part over the community eigenvalues from the last
    /// stability solve (NaN if none).
    pub fn dominant_eigenvalue(&self) -> f64 {
        self.dominant_eigenvalue
    }

    pub fn reactivity(&self) -> f64 {
        self.reactivity
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn interaction_matrix(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn growth_vector(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn equilibrium(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn community_matrix(&self) -> &DMatrix<f64> {
        &self.community
    }

    /// Debug dump of the last build and solve.
    pub fn describe_state(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "species: {:?}", self.index.keys());
        if self.index.is_empty() {
            return out;
        }
        let _ = write!(out, "A:{}", self.a);
        let _ = write!(out, "b:{}", self.b.transpose());
        let _ = write!(out, "x:{}", self.x.transpose());
        out
    }
}
