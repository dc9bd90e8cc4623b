//! Static map sources.
//!
//! The planner only asks one question of a map: is this point blocked.
//! Grid-world text maps (`.map`) are parsed here; richer raster sources
//! (GeoTIFF bathymetry) are an external collaborator and report as
//! unsupported so the caller can keep its previous map.

use std::path::Path;
use std::sync::Arc;

use crate::error::{PlanError, Result};

/// Blocked/free query over world coordinates.
pub trait Map: Send + Sync {
    fn is_blocked(&self, x: f64, y: f64) -> bool;
}

/// Map with no obstacles, installed when planning starts before any map
/// has been loaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyMap;

impl Map for EmptyMap {
    fn is_blocked(&self, _x: f64, _y: f64) -> bool {
        false
    }
}

/// Grid-world text map.
///
/// Format: first line is the cell resolution in meters; each following
/// line is a row of `#` (blocked) or `.` (free) cells. The last text row
/// lies along y = 0, so maps read the way they are drawn.
#[derive(Clone, Debug)]
pub struct GridWorldMap {
    resolution: f64,
    width: usize,
    height: usize,
    /// Row-major, row 0 at y = 0.
    blocked: Vec<bool>,
}

impl GridWorldMap {
    pub fn load(path: &Path) -> Result<GridWorldMap> {
        let text = std::fs::read_to_string(path)?;
        let mut lines = text.lines();

        let resolution: f64 = lines
            .next()
            .ok_or_else(|| PlanError::MapFormat("empty map file".into()))?
            .trim()
            .parse()
            .map_err(|e| PlanError::MapFormat(format!("bad resolution line: {e}")))?;
        if resolution <= 0.0 {
            return Err(PlanError::MapFormat("resolution must be positive".into()));
        }

        let rows: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();
        if rows.is_empty() {
            return Err(PlanError::MapFormat("map has no rows".into()));
        }
        let width = rows[0].trim().len();
        let height = rows.len();
        let mut blocked = vec![false; width * height];

        // Text top row is the highest y.
        for (i, row) in rows.iter().enumerate() {
            let row = row.trim();
            if row.len() != width {
                return Err(PlanError::MapFormat(format!(
                    "row {} has width {}, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            let y = height - 1 - i;
            for (x, c) in row.chars().enumerate() {
                blocked[y * width + x] = match c {
                    '#' => true,
                    '.' => false,
                    other => {
                        return Err(PlanError::MapFormat(format!(
                            "unexpected cell character {other:?}"
                        )))
                    }
                };
            }
        }

        Ok(GridWorldMap {
            resolution,
            width,
            height,
            blocked,
        })
    }
}

impl Map for GridWorldMap {
    fn is_blocked(&self, x: f64, y: f64) -> bool {
        let cx = (x / self.resolution).floor();
        let cy = (y / self.resolution).floor();
        if cx < 0.0 || cy < 0.0 {
            return true;
        }
        let (cx, cy) = (cx as usize, cy as usize);
        if cx >= self.width || cy >= self.height {
            return true;
        }
        self.blocked[cy * self.width + cx]
    }
}

/// Load a map file, picking the format from the extension: `.map` is the
/// grid-world text format; anything else is assumed to be GeoTIFF, which
/// this crate does not decode.
pub fn load_map(path: &Path, _latitude: f64, _longitude: f64) -> Result<Arc<dyn Map>> {
    if path.extension().is_some_and(|e| e == "map") {
        Ok(Arc::new(GridWorldMap::load(path)?))
    } else {
        Err(PlanError::UnsupportedMap(format!(
            "GeoTIFF decoding is not available in this build: {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_map(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".map").tempfile().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_grid_world_round_trip() {
        let f = write_map("1.0\n####\n#..#\n####\n");
        let map = GridWorldMap::load(f.path()).unwrap();
        // Bottom row (y in [0, 1)) is all blocked.
        assert!(map.is_blocked(0.5, 0.5));
        // Interior free cells on the middle row.
        assert!(!map.is_blocked(1.5, 1.5));
        assert!(!map.is_blocked(2.5, 1.5));
        assert!(map.is_blocked(0.5, 1.5));
        // Outside the grid counts as blocked.
        assert!(map.is_blocked(-1.0, 0.0));
        assert!(map.is_blocked(10.0, 0.0));
    }

    #[test]
    fn test_resolution_scales_cells() {
        let f = write_map("2.0\n.#\n..\n");
        let map = GridWorldMap::load(f.path()).unwrap();
        assert!(!map.is_blocked(1.0, 1.0));
        assert!(map.is_blocked(3.0, 3.0));
        assert!(!map.is_blocked(1.0, 3.0));
    }

    #[test]
    fn test_malformed_map_rejected() {
        let f = write_map("1.0\n..\n...\n");
        assert!(GridWorldMap::load(f.path()).is_err());

        let f = write_map("nope\n..\n");
        assert!(GridWorldMap::load(f.path()).is_err());
    }

    #[test]
    fn test_load_map_dispatches_on_extension() {
        let f = write_map("1.0\n..\n..\n");
        assert!(load_map(f.path(), 0.0, 0.0).is_ok());

        let other = tempfile::Builder::new().suffix(".tiff").tempfile().unwrap();
        assert!(matches!(
            load_map(other.path(), 43.0, -70.0),
            Err(PlanError::UnsupportedMap(_))
        ));
    }

    #[test]
    fn test_empty_map_never_blocks() {
        let m = EmptyMap;
        assert!(!m.is_blocked(1e9, -1e9));
    }
}
