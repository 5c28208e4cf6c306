//! File I/O: fracture networks and job configurations as JSON, ECPM fields as
//! binary field files.

pub mod artifacts;
pub mod field_file;
pub mod network;

pub use artifacts::{OutputArtifacts, WriteOptions, setup_output_dir, write_fields};
pub use field_file::{Dataset, DatasetValues, FieldFile, read_field_file, write_field_file};
pub use network::{read_config, read_network, write_config, write_network};
