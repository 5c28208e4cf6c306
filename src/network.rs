//! Fracture network consumed from the upstream generator.
//!
//! The network is read-only for the whole mapping pipeline. Fractures are
//! resolved once into planar polygons; degenerate ones are skipped and
//! reported rather than aborting the run.

pub mod fracture;

use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

pub use fracture::{Fracture, FractureShape, ResolvedFracture};

use crate::ecpm::domain::Domain;
use crate::error::{MapDfnError, Result};

/// Domain extents plus the ordered fracture set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractureNetwork {
    /// Full extent of the DFN, centered at the DFN origin.
    pub domain: Domain,
    #[serde(default)]
    pub fractures: Vec<Fracture>,
}

/// Fractures that survived geometry validation.
#[derive(Debug, Clone, Default)]
pub struct ResolvedNetwork {
    pub fractures: Vec<ResolvedFracture>,
    /// Ids of fractures skipped because of degenerate geometry.
    pub skipped: Vec<u32>,
}

impl FractureNetwork {
    pub fn new(domain: Domain, fractures: Vec<Fracture>) -> Result<Self> {
        let network = Self { domain, fractures };
        network.validate()?;
        Ok(network)
    }

    /// Checks the domain and the uniqueness of fracture ids.
    pub fn validate(&self) -> Result<()> {
        self.domain.validate()?;
        let mut seen = HashSet::with_capacity(self.fractures.len());
        for f in self.fractures.iter() {
            if f.id == 0 {
                return Err(MapDfnError::config("fracture ids must be positive"));
            }
            if !seen.insert(f.id) {
                return Err(MapDfnError::config(format!(
                    "duplicate fracture id {}",
                    f.id
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fractures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractures.is_empty()
    }

    /// Resolves every fracture, skipping (and logging) degenerate ones.
    pub fn resolve(&self) -> ResolvedNetwork {
        let mut resolved = ResolvedNetwork::default();
        for f in self.fractures.iter() {
            match f.resolve() {
                Ok(r) => resolved.fractures.push(r),
                Err(err) => {
                    warn!(fracture_id = f.id; "Skipping fracture: {err}");
                    resolved.skipped.push(f.id);
                }
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        Domain::new(10., 10., 10.)
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let f1 = Fracture::ellipse(1, 1.0, [0.; 3], [0., 0., 1.], 1e-3);
        let f2 = Fracture::ellipse(1, 2.0, [1.; 3], [0., 1., 0.], 1e-3);
        let err = FractureNetwork::new(domain(), vec![f1, f2]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_zero_id_rejected() {
        let f = Fracture::ellipse(0, 1.0, [0.; 3], [0., 0., 1.], 1e-3);
        assert!(FractureNetwork::new(domain(), vec![f]).is_err());
    }

    #[test]
    fn test_resolve_skips_degenerate() {
        let good = Fracture::ellipse(1, 1.0, [0.; 3], [0., 0., 1.], 1e-3);
        let bad = Fracture::ellipse(2, 1.0, [0.; 3], [0., 0., 1.], -1e-3);
        let network = FractureNetwork::new(domain(), vec![good, bad]).unwrap();
        let resolved = network.resolve();
        assert_eq!(resolved.fractures.len(), 1);
        assert_eq!(resolved.fractures[0].id, 1);
        assert_eq!(resolved.skipped, vec![2]);
        assert_eq!(network.len(), 2);
    }
}
