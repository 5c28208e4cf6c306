//! JSON I/O for fracture networks and job configurations.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ecpm::config::EcpmConfig;
use crate::error::{MapDfnError, Result};
use crate::network::FractureNetwork;

/// Reads a fracture network from a JSON file and validates it.
///
/// # Example
/// ```no_run
/// use mapdfn::io::read_network;
/// use std::path::Path;
///
/// let network = read_network(Path::new("network.json")).unwrap();
/// println!("Loaded {} fractures", network.len());
/// ```
pub fn read_network(path: &Path) -> Result<FractureNetwork> {
    let network: FractureNetwork = read_json(path)?;
    network.validate()?;
    Ok(network)
}

/// Writes a fracture network to a JSON file.
pub fn write_network(path: &Path, network: &FractureNetwork) -> Result<()> {
    write_json(path, network)
}

/// Reads a job configuration from a JSON file.
pub fn read_config(path: &Path) -> Result<EcpmConfig> {
    read_json(path)
}

pub fn write_config(path: &Path, config: &EcpmConfig) -> Result<()> {
    write_json(path, config)
}

/// Deserializes a fracture network from a JSON string.
pub fn network_from_str(json: &str) -> Result<FractureNetwork> {
    let network: FractureNetwork = serde_json::from_str(json)
        .map_err(|e| MapDfnError::config(format!("invalid fracture network: {e}")))?;
    network.validate()?;
    Ok(network)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| MapDfnError::io(path, e))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| MapDfnError::config(format!("failed to parse {}: {e}", path.display())))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| MapDfnError::io(path, e))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value).map_err(|e| MapDfnError::io(path, e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecpm::domain::Domain;
    use crate::network::{Fracture, FractureShape};
    use tempfile::tempdir;

    #[test]
    fn test_network_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("network.json");
        let network = FractureNetwork::new(
            Domain::new(10., 10., 10.),
            vec![
                Fracture::ellipse(1, 2., [0.; 3], [0., 0., 1.], 1e-4).with_beta(30.),
                Fracture::rectangle(2, 1., [1., 1., 1.], [1., 0., 0.], 1e-3)
                    .with_aspect_ratio(0.5)
                    .with_permeability(1e-10),
                Fracture::polygon(3, vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]], 1e-3),
            ],
        )
        .unwrap();
        write_network(&path, &network).unwrap();
        let back = read_network(&path).unwrap();
        assert_eq!(back, network);
    }

    #[test]
    fn test_network_from_str_defaults() {
        let json = r#"{
            "domain": {"x": 10.0, "y": 10.0, "z": 10.0},
            "fractures": [
                {"id": 1, "shape": {"type": "ellipse", "radius": 6.0}, "aperture": 1e-3}
            ]
        }"#;
        let network = network_from_str(json).unwrap();
        let f = &network.fractures[0];
        assert_eq!(f.id, 1);
        assert_eq!(f.center, [0.; 3]);
        assert_eq!(f.normal, [0., 0., 1.]);
        assert_eq!(
            f.shape,
            FractureShape::Ellipse {
                radius: 6.,
                aspect_ratio: 1.,
                num_vertices: 8
            }
        );
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        assert!(network_from_str("{").unwrap_err().is_configuration());
        let dup = r#"{
            "domain": {"x": 1.0, "y": 1.0, "z": 1.0},
            "fractures": [
                {"id": 1, "shape": {"type": "rectangle", "radius": 1.0}, "aperture": 1e-3},
                {"id": 1, "shape": {"type": "rectangle", "radius": 1.0}, "aperture": 1e-3}
            ]
        }"#;
        assert!(network_from_str(dup).unwrap_err().is_configuration());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = EcpmConfig::new(1e-16, 0.1, [1., 1., 0.5])
            .with_matrix_on(true)
            .with_sub_domain([2., 2., 2.], [0., 0., 0.]);
        write_config(&path, &config).unwrap();
        assert_eq!(read_config(&path).unwrap(), config);
        assert!(read_config(&dir.path().join("missing.json")).is_err());
    }
}
