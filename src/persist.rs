//! On-disk format for learned optimal order positions.
//!
//! One file per map, one line per signature: six comma-separated integers
//! `tileX,tileY,posX,posY,vx,vy` where the tile identifies the resource
//! node and the velocity components are quantized (scaled by 100). The
//! format is shared with prior sessions, so reading is tolerant: malformed
//! lines are logged and skipped, a missing file is simply empty state.

use crate::position::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure writing the learned-position file. Reading never fails; the
/// worst case is an empty learned set.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write learned positions to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where to find and store learned-position files for a map.
///
/// Reading probes `read_dirs` in order and uses the first file that
/// exists; writing always targets `write_dir`, truncating.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistConfig {
    pub read_dirs: Vec<PathBuf>,
    pub write_dir: PathBuf,
    /// Hash of the current map; signatures are map-specific.
    pub map_hash: String,
}

impl PersistConfig {
    /// The conventional tournament directory layout: per-map data shipped
    /// with the bot, accumulated from prior runs, or written this run.
    pub fn for_map(map_hash: impl Into<String>) -> Self {
        PersistConfig {
            read_dirs: vec![
                PathBuf::from("bwapi-data/AI"),
                PathBuf::from("bwapi-data/read"),
                PathBuf::from("bwapi-data/write"),
            ],
            write_dir: PathBuf::from("bwapi-data/write"),
            map_hash: map_hash.into(),
        }
    }

    fn file_name(&self) -> String {
        format!("{}_resourceOptimalOrderPositions.csv", self.map_hash)
    }

    /// First existing file among the read candidates.
    pub fn read_path(&self) -> Option<PathBuf> {
        self.read_dirs
            .iter()
            .map(|dir| dir.join(self.file_name()))
            .find(|path| path.exists())
    }

    pub fn write_path(&self) -> PathBuf {
        self.write_dir.join(self.file_name())
    }
}

/// One persisted line: which node (by initial tile) and the kinematic
/// signature at which a gather resend is known to be free.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PersistedSignature {
    pub tile: TilePosition,
    pub sample: PositionAndVelocity,
}

fn parse_line(line: &str) -> Option<PersistedSignature> {
    let mut fields = [0i32; 6];
    let mut count = 0;
    for cell in line.split(',') {
        if count == 6 {
            return None;
        }
        fields[count] = cell.trim().parse().ok()?;
        count += 1;
    }
    if count != 6 {
        return None;
    }
    Some(PersistedSignature {
        tile: TilePosition::new(fields[0], fields[1]),
        sample: PositionAndVelocity::new(
            Position::new(fields[2], fields[3]),
            fields[4],
            fields[5],
        ),
    })
}

/// Load every well-formed signature from the first available file.
///
/// A missing file yields an empty set; malformed lines are skipped
/// individually so one corrupt entry cannot poison the rest.
pub fn load_signatures(config: &PersistConfig) -> Vec<PersistedSignature> {
    let Some(path) = config.read_path() else {
        debug!(
            "no learned-position file for map {}; starting empty",
            config.map_hash
        );
        return Vec::new();
    };
    load_signatures_from(&path)
}

fn load_signatures_from(path: &Path) -> Vec<PersistedSignature> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!("failed to open {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let mut signatures = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("failed to read line from {}: {}", path.display(), err);
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(signature) => signatures.push(signature),
            None => warn!("skipping malformed learned-position line: {}", line),
        }
    }

    debug!(
        "loaded {} learned positions from {}",
        signatures.len(),
        path.display()
    );
    signatures
}

/// Overwrite the canonical file with the given signatures.
pub fn store_signatures<'a>(
    config: &PersistConfig,
    signatures: impl IntoIterator<Item = &'a PersistedSignature>,
) -> Result<(), PersistError> {
    let path = config.write_path();
    let wrap = |source| PersistError::Write {
        path: path.clone(),
        source,
    };

    let file = File::create(&path).map_err(wrap)?;
    let mut writer = BufWriter::new(file);
    for signature in signatures {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            signature.tile.x,
            signature.tile.y,
            signature.sample.position.x(),
            signature.sample.position.y(),
            signature.sample.velocity_x,
            signature.sample.velocity_y
        )
        .map_err(wrap)?;
    }
    writer.flush().map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_config(tag: &str) -> PersistConfig {
        let dir = std::env::temp_dir().join(format!("harvest-foreman-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        PersistConfig {
            read_dirs: vec![dir.clone()],
            write_dir: dir,
            map_hash: "testmap".to_string(),
        }
    }

    fn signature(tx: i32, ty: i32, x: i32, y: i32, vx: i32, vy: i32) -> PersistedSignature {
        PersistedSignature {
            tile: TilePosition::new(tx, ty),
            sample: PositionAndVelocity::new(Position::new(x, y), vx, vy),
        }
    }

    #[test]
    fn round_trip_preserves_signatures() {
        let config = temp_config("round-trip");
        let written = vec![
            signature(10, 12, 330, 401, -87, 120),
            signature(10, 12, 331, 399, 0, -250),
            signature(41, 7, 1312, 250, 99, 99),
        ];
        store_signatures(&config, &written).unwrap();
        let loaded = load_signatures(&config);
        assert_eq!(loaded, written);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let config = temp_config("malformed");
        let path = config.write_path();
        fs::write(
            &path,
            "10,12,330,401,-87,120\nnot,a,number,at,all,x\n1,2,3\n41,7,1312,250,99,99\n",
        )
        .unwrap();
        let loaded = load_signatures(&config);
        assert_eq!(
            loaded,
            vec![
                signature(10, 12, 330, 401, -87, 120),
                signature(41, 7, 1312, 250, 99, 99)
            ]
        );
    }

    #[test]
    fn missing_file_loads_empty() {
        let config = PersistConfig {
            read_dirs: vec![PathBuf::from("does/not/exist")],
            write_dir: PathBuf::from("does/not/exist"),
            map_hash: "nope".to_string(),
        };
        assert!(load_signatures(&config).is_empty());
    }
}
