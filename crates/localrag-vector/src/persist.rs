//! On-disk layout of a [`VectorIndex`].
//!
//! `vectors.bin`:
//!
//! ```text
//! magic "LRVI" | version u32 | dimension u32 | next_id u64 | count u64
//! | count * dimension little-endian f32 | blake3(all preceding bytes)
//! ```
//!
//! `fragments.json` holds the ordered fragment list. The two files are one
//! unit: `load` accepts both or neither.

use std::fs;
use std::io::Write;
use std::path::Path;

use localrag_core::types::Fragment;
use localrag_core::{Error, Result};
use tempfile::NamedTempFile;

use crate::index::VectorIndex;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const FRAGMENTS_FILE: &str = "fragments.json";

const MAGIC: &[u8; 4] = b"LRVI";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8;
const CHECKSUM_LEN: usize = blake3::OUT_LEN;

impl VectorIndex {
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let blob = encode(self)?;
        let fragments = serde_json::to_vec(self.fragments()).map_err(|e| Error::Io(e.into()))?;
        // Stage both files before renaming either so a failed write leaves
        // the previous pair intact.
        let staged_vectors = stage(dir, &blob)?;
        let staged_fragments = stage(dir, &fragments)?;
        commit(staged_vectors, &dir.join(VECTORS_FILE))?;
        commit(staged_fragments, &dir.join(FRAGMENTS_FILE))?;
        tracing::info!(dir = %dir.display(), total = self.total(), "vector index saved");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let fragments_path = dir.join(FRAGMENTS_FILE);
        match (vectors_path.exists(), fragments_path.exists()) {
            (false, false) => return Err(Error::NotFound(format!("no vector index in {}", dir.display()))),
            (true, false) => return Err(Error::corrupt(&fragments_path, "missing; vectors present without fragments")),
            (false, true) => return Err(Error::corrupt(&vectors_path, "missing; fragments present without vectors")),
            (true, true) => {}
        }

        let blob = fs::read(&vectors_path)?;
        let header = decode(&blob, &vectors_path)?;
        let fragments: Vec<Fragment> = serde_json::from_slice(&fs::read(&fragments_path)?)
            .map_err(|e| Error::corrupt(&fragments_path, e.to_string()))?;

        if fragments.len() != header.count {
            return Err(Error::corrupt(
                &fragments_path,
                format!("{} fragments for {} vectors", fragments.len(), header.count),
            ));
        }
        if fragments.windows(2).any(|w| w[0].id >= w[1].id) || fragments.last().is_some_and(|f| f.id >= header.next_id) {
            return Err(Error::corrupt(&fragments_path, "fragment ids out of order"));
        }

        tracing::info!(dir = %dir.display(), total = header.count, dimension = header.dimension, "vector index loaded");
        Ok(VectorIndex::from_parts(header.dimension, header.vectors, fragments, header.next_id))
    }

    /// Load from `dir`, or start empty when nothing has been saved yet.
    /// A stored index of another dimension is an error, not a reset.
    pub fn load_or_new(dir: &Path, dimension: usize) -> Result<Self> {
        match Self::load(dir) {
            Ok(index) if index.dimension() != dimension => {
                Err(Error::DimensionMismatch { expected: dimension, actual: index.dimension() })
            }
            Ok(index) => Ok(index),
            Err(Error::NotFound(_)) => Self::new(dimension),
            Err(e) => Err(e),
        }
    }
}

struct Decoded {
    dimension: usize,
    next_id: u64,
    count: usize,
    vectors: Vec<f32>,
}

fn encode(index: &VectorIndex) -> Result<Vec<u8>> {
    let dimension = u32::try_from(index.dimension())
        .map_err(|_| Error::InvalidConfig(format!("dimension {} too large to persist", index.dimension())))?;
    let raw = index.raw_vectors();
    let mut out = Vec::with_capacity(HEADER_LEN + raw.len() * 4 + CHECKSUM_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&dimension.to_le_bytes());
    out.extend_from_slice(&index.next_id().to_le_bytes());
    out.extend_from_slice(&(index.total() as u64).to_le_bytes());
    for x in raw {
        out.extend_from_slice(&x.to_le_bytes());
    }
    let checksum = blake3::hash(&out);
    out.extend_from_slice(checksum.as_bytes());
    Ok(out)
}

fn decode(blob: &[u8], path: &Path) -> Result<Decoded> {
    if blob.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(Error::corrupt(path, format!("truncated: {} bytes", blob.len())));
    }
    let (body, checksum) = blob.split_at(blob.len() - CHECKSUM_LEN);
    if blake3::hash(body).as_bytes() != checksum {
        return Err(Error::corrupt(path, "checksum mismatch"));
    }
    if &body[0..4] != MAGIC {
        return Err(Error::corrupt(path, "bad magic"));
    }
    let version = u32::from_le_bytes(le_bytes(&body[4..8]));
    if version != VERSION {
        return Err(Error::corrupt(path, format!("unsupported version {version}")));
    }
    let dimension = u32::from_le_bytes(le_bytes(&body[8..12])) as usize;
    let next_id = u64::from_le_bytes(le_bytes(&body[12..20]));
    let count = usize::try_from(u64::from_le_bytes(le_bytes(&body[20..28])))
        .map_err(|_| Error::corrupt(path, "vector count overflows"))?;
    if dimension == 0 {
        return Err(Error::corrupt(path, "zero dimension"));
    }

    let payload = &body[HEADER_LEN..];
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::corrupt(path, "payload size overflows"))?;
    if payload.len() != expected {
        return Err(Error::corrupt(path, format!("payload is {} bytes, header implies {expected}", payload.len())));
    }
    if (count as u64) > next_id {
        return Err(Error::corrupt(path, "next id behind vector count"));
    }
    let vectors = payload.chunks_exact(4).map(|b| f32::from_le_bytes(le_bytes(b))).collect();
    Ok(Decoded { dimension, next_id, count, vectors })
}

fn le_bytes<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(slice);
    buf
}

fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn commit(tmp: NamedTempFile, target: &Path) -> Result<()> {
    tmp.persist(target).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
