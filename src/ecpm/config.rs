use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ecpm::domain::{CellSize, Domain, MappingRegion};
use crate::ecpm::upscale::{MatrixProperties, UpscaleOptions};
use crate::error::{MapDfnError, Result};

/// Cell size as accepted from callers: one edge length or one per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSizeInput {
    Scalar(f64),
    Components(Vec<f64>),
}

impl CellSizeInput {
    pub fn normalize(&self) -> Result<CellSize> {
        match self {
            Self::Scalar(d) => CellSize::uniform(*d),
            Self::Components(values) => CellSize::from_components(values),
        }
    }
}

impl From<f64> for CellSizeInput {
    fn from(d: f64) -> Self {
        Self::Scalar(d)
    }
}

impl From<[f64; 3]> for CellSizeInput {
    fn from(d: [f64; 3]) -> Self {
        Self::Components(d.to_vec())
    }
}

fn default_tortuosity_factor() -> f64 {
    0.001
}

fn default_correction_factor() -> bool {
    true
}

fn default_output_dir() -> String {
    "mapdfn_ecpm".to_string()
}

fn default_sub_directory() -> String {
    "sub".to_string()
}

fn default_jobname() -> PathBuf {
    PathBuf::from(".")
}

/// Job configuration of an ECPM mapping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EcpmConfig {
    /// Isotropic matrix permeability (m^2).
    pub matrix_perm: f64,
    pub matrix_porosity: f64,
    pub cell_size: CellSizeInput,
    /// Keep matrix-only cells active in the materials artifact.
    #[serde(default)]
    pub matrix_on: bool,
    #[serde(default = "default_tortuosity_factor")]
    pub tortuosity_factor: f64,
    #[serde(default)]
    pub lump_diag_terms: bool,
    #[serde(default = "default_correction_factor")]
    pub correction_factor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_domain: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_origin: Option<Vec<f64>>,
    #[serde(default = "default_sub_directory")]
    pub sub_directory: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Job directory the output directory is created in.
    #[serde(default = "default_jobname")]
    pub jobname: PathBuf,
}

/// Configuration after validation, in the types the pipeline works with.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub matrix: MatrixProperties,
    pub cell_size: CellSize,
    pub region: MappingRegion,
    pub options: UpscaleOptions,
    pub matrix_on: bool,
    pub tortuosity_factor: f64,
    pub output_dir: PathBuf,
}

impl EcpmConfig {
    pub fn new(matrix_perm: f64, matrix_porosity: f64, cell_size: impl Into<CellSizeInput>) -> Self {
        Self {
            matrix_perm,
            matrix_porosity,
            cell_size: cell_size.into(),
            matrix_on: false,
            tortuosity_factor: default_tortuosity_factor(),
            lump_diag_terms: false,
            correction_factor: default_correction_factor(),
            sub_domain: None,
            sub_origin: None,
            sub_directory: default_sub_directory(),
            output_dir: default_output_dir(),
            jobname: default_jobname(),
        }
    }

    pub fn with_matrix_on(mut self, on: bool) -> Self {
        self.matrix_on = on;
        self
    }

    pub fn with_tortuosity_factor(mut self, factor: f64) -> Self {
        self.tortuosity_factor = factor;
        self
    }

    pub fn with_lump_diag_terms(mut self, lump: bool) -> Self {
        self.lump_diag_terms = lump;
        self
    }

    pub fn with_correction_factor(mut self, correct: bool) -> Self {
        self.correction_factor = correct;
        self
    }

    /// Maps only a box of extents `domain` centered at the DFN origin and
    /// writes it with `origin` as output origin.
    pub fn with_sub_domain(mut self, domain: [f64; 3], origin: [f64; 3]) -> Self {
        self.sub_domain = Some(domain.to_vec());
        self.sub_origin = Some(origin.to_vec());
        self
    }

    pub fn with_sub_directory(mut self, name: &str) -> Self {
        self.sub_directory = name.to_string();
        self
    }

    pub fn with_output_dir(mut self, name: &str) -> Self {
        self.output_dir = name.to_string();
        self
    }

    pub fn with_jobname(mut self, jobname: impl AsRef<Path>) -> Self {
        self.jobname = jobname.as_ref().to_path_buf();
        self
    }

    /// Directory the artifacts are written to.
    ///
    /// `<jobname>/<output_dir>`, or
    /// `<jobname>/<output_dir>/<output_dir>_<sub_directory>` for sub-domains.
    pub fn output_path(&self) -> PathBuf {
        let base = self.jobname.join(&self.output_dir);
        if self.sub_domain.is_some() {
            base.join(format!("{}_{}", self.output_dir, self.sub_directory))
        } else {
            base
        }
    }

    /// Checks every setting against the network domain.
    ///
    /// Nothing is computed or written before this passes.
    pub fn validate(&self, full_domain: &Domain) -> Result<ValidatedConfig> {
        let matrix = MatrixProperties::new(self.matrix_porosity, self.matrix_perm)?;
        let cell_size = self.cell_size.normalize()?;
        let region = MappingRegion::select(
            full_domain,
            self.sub_domain.as_deref(),
            self.sub_origin.as_deref(),
        )?;
        if !(self.tortuosity_factor.is_finite() && self.tortuosity_factor > 0.) {
            return Err(MapDfnError::config(format!(
                "tortuosity factor must be positive, got {}",
                self.tortuosity_factor
            )));
        }
        if self.output_dir.is_empty() {
            return Err(MapDfnError::config("output directory name is empty"));
        }
        if region.is_sub_domain && self.sub_directory.is_empty() {
            return Err(MapDfnError::config("sub-directory name is empty"));
        }

        Ok(ValidatedConfig {
            matrix,
            cell_size,
            region,
            options: UpscaleOptions {
                lump_diag_terms: self.lump_diag_terms,
                correction_factor: self.correction_factor,
            },
            matrix_on: self.matrix_on,
            tortuosity_factor: self.tortuosity_factor,
            output_dir: self.output_path(),
        })
    }
}
