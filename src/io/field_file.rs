//! Self-describing binary field files.
//!
//! Layout:
//!
//! ```text
//! magic "MDFN" | version: u32 | header length: u64 | JSON header | payload | CRC32: u32
//! ```
//!
//! Integers and values are little-endian. The header lists every dataset with
//! its dtype, shape and byte offset into the payload. The CRC covers all bytes
//! before it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MapDfnError, Result};

pub const MAGIC: &[u8; 4] = b"MDFN";
pub const FORMAT_VERSION: u32 = 1;
/// File extension of field files.
pub const EXTENSION: &str = "mdfn";

const PREAMBLE_LEN: usize = 4 + 4 + 8;
const CRC_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    F64,
    I32,
    U32,
    U64,
}

impl Dtype {
    pub fn size(self) -> usize {
        match self {
            Self::F64 | Self::U64 => 8,
            Self::I32 | Self::U32 => 4,
        }
    }
}

/// Typed values of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetValues {
    F64(Vec<f64>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl DatasetValues {
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::F64(_) => Dtype::F64,
            Self::I32(_) => Dtype::I32,
            Self::U32(_) => Dtype::U32,
            Self::U64(_) => Dtype::U64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            Self::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<&[u64]> {
        match self {
            Self::U64(v) => Some(v),
            _ => None,
        }
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        match self {
            Self::F64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::I32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::U32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::U64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        }
    }

    fn read_le(dtype: Dtype, bytes: &[u8]) -> Self {
        match dtype {
            Dtype::F64 => Self::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes(c.try_into().unwrap_or([0; 8])))
                    .collect(),
            ),
            Dtype::I32 => Self::I32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes(c.try_into().unwrap_or([0; 4])))
                    .collect(),
            ),
            Dtype::U32 => Self::U32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes(c.try_into().unwrap_or([0; 4])))
                    .collect(),
            ),
            Dtype::U64 => Self::U64(
                bytes
                    .chunks_exact(8)
                    .map(|c| u64::from_le_bytes(c.try_into().unwrap_or([0; 8])))
                    .collect(),
            ),
        }
    }
}

/// Named, shaped array stored in a field file.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: DatasetValues,
}

impl Dataset {
    /// One-dimensional dataset.
    pub fn new(name: &str, values: DatasetValues) -> Self {
        Self {
            name: name.to_string(),
            shape: vec![values.len()],
            values,
        }
    }

    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetEntry {
    name: String,
    dtype: Dtype,
    shape: Vec<usize>,
    /// Byte offset into the payload.
    offset: u64,
    /// Number of values.
    len: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    name: String,
    attributes: BTreeMap<String, Value>,
    datasets: Vec<DatasetEntry>,
}

/// In-memory content of one artifact.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldFile {
    pub name: String,
    pub attributes: BTreeMap<String, Value>,
    pub datasets: Vec<Dataset>,
}

impl FieldFile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Encodes the file. Fails only if a dataset shape disagrees with its length.
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, String> {
        let mut payload = Vec::new();
        let mut entries = Vec::with_capacity(self.datasets.len());
        for ds in self.datasets.iter() {
            let expected: usize = ds.shape.iter().product();
            if expected != ds.values.len() {
                return Err(format!(
                    "dataset '{}' has shape {:?} but {} values",
                    ds.name,
                    ds.shape,
                    ds.values.len()
                ));
            }
            entries.push(DatasetEntry {
                name: ds.name.clone(),
                dtype: ds.values.dtype(),
                shape: ds.shape.clone(),
                offset: payload.len() as u64,
                len: ds.values.len() as u64,
            });
            ds.values.write_le(&mut payload);
        }

        let header = Header {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            datasets: entries,
        };
        let header = serde_json::to_vec(&header).map_err(|e| e.to_string())?;

        let mut out = Vec::with_capacity(PREAMBLE_LEN + header.len() + payload.len() + CRC_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(header.len() as u64).to_le_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(&payload);
        let crc = crc32(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(out)
    }

    /// Decodes a file, checking magic, version and checksum.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < PREAMBLE_LEN + CRC_LEN {
            return Err(format!("file too short ({} bytes)", bytes.len()));
        }
        if &bytes[..4] != MAGIC {
            return Err("bad magic number".to_string());
        }

        let (body, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let computed = crc32(body);
        if stored != computed {
            return Err(format!(
                "checksum mismatch (stored {stored:#010x}, computed {computed:#010x})"
            ));
        }

        let version = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&body[8..16]);
        let header_len = usize::try_from(u64::from_le_bytes(len_bytes))
            .map_err(|_| "header length overflow".to_string())?;
        let header_end = PREAMBLE_LEN
            .checked_add(header_len)
            .filter(|&end| end <= body.len())
            .ok_or_else(|| "header exceeds file".to_string())?;

        let header: Header = serde_json::from_slice(&body[PREAMBLE_LEN..header_end])
            .map_err(|e| format!("invalid header: {e}"))?;
        let payload = &body[header_end..];

        let mut datasets = Vec::with_capacity(header.datasets.len());
        for entry in header.datasets {
            let start = entry.offset as usize;
            let end = (entry.len as usize)
                .checked_mul(entry.dtype.size())
                .and_then(|n| n.checked_add(start))
                .filter(|&end| end <= payload.len())
                .ok_or_else(|| format!("dataset '{}' exceeds payload", entry.name))?;
            let values = DatasetValues::read_le(entry.dtype, &payload[start..end]);
            datasets.push(Dataset {
                name: entry.name,
                shape: entry.shape,
                values,
            });
        }

        Ok(Self {
            name: header.name,
            attributes: header.attributes,
            datasets,
        })
    }
}

/// Writes a field file to `path`.
pub fn write_field_file(path: &Path, file: &FieldFile) -> Result<()> {
    let bytes = file.to_bytes().map_err(|reason| MapDfnError::format(path, reason))?;
    let f = File::create(path).map_err(|e| MapDfnError::io(path, e))?;
    let mut writer = BufWriter::new(f);
    writer
        .write_all(&bytes)
        .and_then(|_| writer.flush())
        .map_err(|e| MapDfnError::io(path, e))?;
    Ok(())
}

/// Reads and validates a field file.
pub fn read_field_file(path: &Path) -> Result<FieldFile> {
    let bytes = std::fs::read(path).map_err(|e| MapDfnError::io(path, e))?;
    FieldFile::from_bytes(&bytes).map_err(|reason| MapDfnError::format(path, reason))
}

/// CRC-32 (IEEE) of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = 0xEDB8_8320 ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC32_TABLE: [u32; 256] = generate_crc32_table();

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> FieldFile {
        FieldFile::new("porosity")
            .with_attribute("dims", vec![2, 1, 1])
            .with_attribute("tortuosity_factor", 0.001)
            .with_dataset(Dataset::new("Cell Ids", DatasetValues::I32(vec![1, 2])))
            .with_dataset(Dataset::new("Porosity", DatasetValues::F64(vec![0.1, 0.25])))
            .with_dataset(
                Dataset::new("Offsets", DatasetValues::U64(vec![0, 1, 2, 3, 4, 5]))
                    .with_shape(vec![2, 3]),
            )
    }

    #[test]
    fn test_crc32_check_value() {
        // Standard check value of CRC-32/ISO-HDLC
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("porosity.mdfn");
        let file = sample();
        write_field_file(&path, &file).unwrap();
        let back = read_field_file(&path).unwrap();
        assert_eq!(back, file);
        assert_eq!(
            back.dataset("Porosity").unwrap().values.as_f64(),
            Some(&[0.1, 0.25][..])
        );
        assert_eq!(back.dataset("Offsets").unwrap().shape, vec![2, 3]);
        assert!(back.dataset("Missing").is_none());
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = sample().to_bytes().unwrap();
        let n = bytes.len();
        bytes[n - 10] ^= 0x01;
        let err = FieldFile::from_bytes(&bytes).unwrap_err();
        assert!(err.contains("checksum"));

        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(FieldFile::from_bytes(&bytes).unwrap_err().contains("magic"));

        assert!(FieldFile::from_bytes(b"MDFN").is_err());
    }

    #[test]
    fn test_read_reports_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.mdfn");
        std::fs::write(&path, b"not a field file at all").unwrap();
        let err = read_field_file(&path).unwrap_err();
        assert!(matches!(err, MapDfnError::Format { .. }));

        let err = read_field_file(&dir.path().join("missing.mdfn")).unwrap_err();
        assert!(matches!(err, MapDfnError::Io { .. }));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let file = FieldFile::new("x").with_dataset(
            Dataset::new("A", DatasetValues::F64(vec![1., 2., 3.])).with_shape(vec![2, 2]),
        );
        assert!(file.to_bytes().is_err());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(sample().to_bytes().unwrap(), sample().to_bytes().unwrap());
    }
}
