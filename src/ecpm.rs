//! DFN to ECPM upscaling.

pub mod config;
pub mod domain;
pub mod pipeline;
pub mod tag;
pub mod tensor;
pub mod upscale;

pub use config::{CellSizeInput, EcpmConfig};
pub use domain::{CellSize, Domain, Grid, MappingRegion, discretize};
pub use pipeline::{EcpmFields, EcpmReport, map_network, mapdfn_ecpm};
pub use tag::{CellFractureMap, TagSummary, tag_cells, tag_network};
pub use tensor::PermTensor;
pub use upscale::{MatrixProperties, UpscaleOptions, UpscaledFields, upscale};
