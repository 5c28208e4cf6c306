//! The six ECPM artifacts and their atomic writer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_json::json;

use crate::Point;
use crate::ecpm::domain::Grid;
use crate::ecpm::tag::CellFractureMap;
use crate::ecpm::tensor::PermTensor;
use crate::ecpm::upscale::UpscaledFields;
use crate::error::{MapDfnError, Result};
use crate::io::field_file::{Dataset, DatasetValues, EXTENSION, FieldFile, write_field_file};

pub const MAPDFN: &str = "mapdfn";
pub const ISOTROPIC_K: &str = "isotropic_k";
pub const ANISOTROPIC_K: &str = "anisotropic_k";
pub const TORTUOSITY: &str = "tortuosity";
pub const POROSITY: &str = "porosity";
pub const MATERIALS: &str = "materials";

/// Logical artifact names in writing order.
pub const ARTIFACT_NAMES: [&str; 6] = [
    MAPDFN,
    ISOTROPIC_K,
    ANISOTROPIC_K,
    TORTUOSITY,
    POROSITY,
    MATERIALS,
];

/// Material id of active cells.
pub const MATERIAL_ACTIVE: i32 = 1;
/// Material id of inactive (matrix-only) cells.
pub const MATERIAL_INACTIVE: i32 = 0;

/// Paths of the artifacts inside one output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifacts {
    pub dir: PathBuf,
}

impl OutputArtifacts {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the artifact with logical name `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    /// `(name, path)` of every artifact.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, PathBuf)> + '_ {
        ARTIFACT_NAMES.into_iter().map(|name| (name, self.path(name)))
    }
}

/// Creates the output directory (idempotent) and returns its artifact paths.
pub fn setup_output_dir(dir: &Path) -> Result<OutputArtifacts> {
    fs::create_dir_all(dir).map_err(|e| MapDfnError::io(dir, e))?;
    info!(dir:% = dir.display(); "Output directory ready");
    Ok(OutputArtifacts::new(dir))
}

/// Scalars recorded alongside the fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteOptions {
    pub matrix_perm: f64,
    pub tortuosity_factor: f64,
    /// Keep matrix-only cells active.
    pub matrix_on: bool,
    /// Output origin of the lower grid corner.
    pub origin: Point,
}

/// Builds the in-memory content of all six artifacts.
pub fn build_artifacts(
    grid: &Grid,
    map: &CellFractureMap,
    fields: &UpscaledFields,
    opts: &WriteOptions,
) -> Result<Vec<FieldFile>> {
    let num_cells = grid.num_cells();
    if map.num_cells() != num_cells || fields.num_cells() != num_cells {
        return Err(MapDfnError::config(format!(
            "field sizes ({} tagged, {} upscaled) do not match the grid ({num_cells} cells)",
            map.num_cells(),
            fields.num_cells()
        )));
    }
    let cell_ids = cell_ids(num_cells)?;

    let dims = grid.dims();
    let base = |name: &str| {
        FieldFile::new(name)
            .with_attribute("dims", json!(dims))
            .with_attribute("cell_size", json!(grid.cell_size.to_array()))
            .with_attribute("origin", json!(opts.origin.to_array()))
            .with_attribute("num_cells", json!(num_cells))
            .with_attribute("matrix_perm", json!(opts.matrix_perm))
            .with_attribute("tortuosity_factor", json!(opts.tortuosity_factor))
    };
    let ids = || Dataset::new("Cell Ids", DatasetValues::I32(cell_ids.clone()));
    let f64s = |name: &str, values: Vec<f64>| Dataset::new(name, DatasetValues::F64(values));

    // Cell to fracture relation in compressed row form
    let mut counts = Vec::with_capacity(num_cells);
    let mut offsets = Vec::with_capacity(num_cells + 1);
    let mut fracture_ids = Vec::with_capacity(map.num_tags());
    offsets.push(0u64);
    for ids in map.iter() {
        counts.push(ids.len() as u32);
        fracture_ids.extend_from_slice(ids);
        offsets.push(fracture_ids.len() as u64);
    }

    let mapdfn = base(MAPDFN)
        .with_dataset(f64s("Coordinates/X", grid.face_coordinates(0, opts.origin.x)))
        .with_dataset(f64s("Coordinates/Y", grid.face_coordinates(1, opts.origin.y)))
        .with_dataset(f64s("Coordinates/Z", grid.face_coordinates(2, opts.origin.z)))
        .with_dataset(ids())
        .with_dataset(Dataset::new("Fracture Count", DatasetValues::U32(counts)))
        .with_dataset(Dataset::new("Fracture Offsets", DatasetValues::U64(offsets)))
        .with_dataset(Dataset::new("Fracture Ids", DatasetValues::U32(fracture_ids)));

    let isotropic = base(ISOTROPIC_K)
        .with_dataset(ids())
        .with_dataset(f64s("Permeability", fields.k_iso.clone()));

    let component = |f: fn(&PermTensor) -> f64| -> Vec<f64> {
        fields.k_aniso.iter().map(f).collect()
    };
    let anisotropic = base(ANISOTROPIC_K)
        .with_dataset(ids())
        .with_dataset(f64s("PermeabilityX", component(|t| t.xx)))
        .with_dataset(f64s("PermeabilityY", component(|t| t.yy)))
        .with_dataset(f64s("PermeabilityZ", component(|t| t.zz)))
        .with_dataset(f64s("PermeabilityXY", component(|t| t.xy)))
        .with_dataset(f64s("PermeabilityXZ", component(|t| t.xz)))
        .with_dataset(f64s("PermeabilityYZ", component(|t| t.yz)));

    let tortuosity = base(TORTUOSITY).with_dataset(ids()).with_dataset(f64s(
        "Tortuosity",
        fields
            .porosity
            .iter()
            .map(|phi| opts.tortuosity_factor / phi)
            .collect(),
    ));

    let porosity = base(POROSITY)
        .with_dataset(ids())
        .with_dataset(f64s("Porosity", fields.porosity.clone()));

    let material_ids = (0..num_cells)
        .map(|idx| {
            if opts.matrix_on || fields.is_fractured(idx) {
                MATERIAL_ACTIVE
            } else {
                MATERIAL_INACTIVE
            }
        })
        .collect();
    let materials = base(MATERIALS)
        .with_attribute("matrix_on", opts.matrix_on)
        .with_dataset(Dataset::new(
            "Materials/Cell Ids",
            DatasetValues::I32(cell_ids.clone()),
        ))
        .with_dataset(Dataset::new(
            "Materials/Material Ids",
            DatasetValues::I32(material_ids),
        ));

    Ok(vec![
        mapdfn,
        isotropic,
        anisotropic,
        tortuosity,
        porosity,
        materials,
    ])
}

/// Writes all artifacts into `artifacts.dir`.
///
/// Files are first written to a staging directory inside the output directory
/// and renamed into place once every write succeeded. Artifacts of a previous
/// run are moved aside first and restored if any rename fails, so a failed
/// call leaves the previous set of artifacts in place. Restoring is best
/// effort; a failure there is logged.
pub fn write_fields(
    artifacts: &OutputArtifacts,
    grid: &Grid,
    map: &CellFractureMap,
    fields: &UpscaledFields,
    opts: &WriteOptions,
) -> Result<()> {
    let files = build_artifacts(grid, map, fields, opts)?;
    info!(dir:% = artifacts.dir.display(); "Writing ECPM artifacts");

    for (_, target) in artifacts.iter() {
        if target.exists() && !target.is_file() {
            let source = io::Error::new(
                io::ErrorKind::InvalidInput,
                "artifact path exists and is not a regular file",
            );
            return Err(MapDfnError::io(&target, source));
        }
    }

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(&artifacts.dir)
        .map_err(|e| MapDfnError::io(&artifacts.dir, e))?;

    for file in files.iter() {
        let path = staging.path().join(format!("{}.{EXTENSION}", file.name));
        write_field_file(&path, file)?;
        debug!(artifact = file.name.as_str(); "Staged artifact");
    }
    let previous = staging.path().join("previous");
    fs::create_dir(&previous).map_err(|e| MapDfnError::io(&previous, e))?;
    let mut moved = Vec::new();
    let mut placed = Vec::new();
    let swapped = swap_in(&files, artifacts, staging.path(), &previous, &mut moved, &mut placed);
    if let Err(err) = swapped {
        restore(artifacts, &previous, &moved, &placed);
        return Err(err);
    }

    staging
        .close()
        .map_err(|e| MapDfnError::io(&artifacts.dir, e))?;
    info!(num_artifacts = files.len(); "ECPM artifacts written");
    Ok(())
}

/// Moves existing artifacts into `previous`, then staged files into place.
/// Records what was done in `moved` and `placed`.
fn swap_in<'a>(
    files: &'a [FieldFile],
    artifacts: &OutputArtifacts,
    staged: &Path,
    previous: &Path,
    moved: &mut Vec<&'a str>,
    placed: &mut Vec<&'a str>,
) -> Result<()> {
    for file in files.iter() {
        let target = artifacts.path(&file.name);
        if target.is_file() {
            let aside = previous.join(format!("{}.{EXTENSION}", file.name));
            fs::rename(&target, &aside).map_err(|e| MapDfnError::io(&target, e))?;
            moved.push(file.name.as_str());
        }
    }
    for file in files.iter() {
        let from = staged.join(format!("{}.{EXTENSION}", file.name));
        let to = artifacts.path(&file.name);
        fs::rename(&from, &to).map_err(|e| MapDfnError::io(&to, e))?;
        placed.push(file.name.as_str());
    }
    Ok(())
}

fn restore(artifacts: &OutputArtifacts, previous: &Path, moved: &[&str], placed: &[&str]) {
    for name in placed {
        let path = artifacts.path(name);
        if let Err(e) = fs::remove_file(&path) {
            warn!(path:% = path.display(), error:% = e; "Failed to remove partial artifact");
        }
    }
    for name in moved {
        let aside = previous.join(format!("{name}.{EXTENSION}"));
        let path = artifacts.path(name);
        if let Err(e) = fs::rename(&aside, &path) {
            warn!(path:% = path.display(), error:% = e; "Failed to restore previous artifact");
        }
    }
}

/// 1-based cell ids in linear index order.
fn cell_ids(num_cells: usize) -> Result<Vec<i32>> {
    let n = i32::try_from(num_cells).map_err(|_| {
        MapDfnError::config(format!(
            "{num_cells} cells exceed the range of 32-bit cell ids"
        ))
    })?;
    Ok((1..=n).collect())
}
