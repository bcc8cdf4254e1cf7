//! Path storage.
//!
//! Waypoint and taxi paths are loaded once, validated, and published as
//! immutable `Arc`s. Movement generators borrow them for as long as they
//! need; the store itself is never mutated after publishing.

use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;
use std::path::Path;
use std::sync::Arc;
use log::{debug, info, warn};
use serde::Deserialize;
use realm_shared::{
    PathOrigin, TaxiNode, TaxiNodeRow, TaxiPath, WaypointBehavior, WaypointNode, WaypointNodeRow,
    WaypointPath, MAX_WAYPOINT_TEXT, ORIENTATION_FROM_TRAVEL,
};

/// Key of a waypoint path in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub origin: PathOrigin,
    /// Spawn guid for [`PathOrigin::Guid`], template entry otherwise
    pub owner_key: u64,
    pub path_id: u32,
}

impl PathKey {
    pub fn new(origin: PathOrigin, owner_key: u64, path_id: u32) -> Self {
        Self { origin, owner_key, path_id }
    }
}

/// Read-only access to path data
pub trait PathProvider {
    fn waypoint_path(&self, key: &PathKey) -> Option<Arc<WaypointPath>>;

    fn taxi_path(&self, path_id: u32) -> Option<Arc<TaxiPath>>;

    /// Resolve the path of a creature. Without an explicit origin the guid
    /// path is preferred over the template path.
    fn path_for(
        &self,
        guid: u64,
        entry: u32,
        path_id: u32,
        origin: Option<PathOrigin>,
    ) -> Option<(Arc<WaypointPath>, PathOrigin)> {
        match origin {
            Some(PathOrigin::Guid) => self
                .waypoint_path(&PathKey::new(PathOrigin::Guid, guid, path_id))
                .map(|p| (p, PathOrigin::Guid)),
            Some(origin) => self
                .waypoint_path(&PathKey::new(origin, entry as u64, path_id))
                .map(|p| (p, origin)),
            None => self
                .path_for(guid, entry, path_id, Some(PathOrigin::Guid))
                .or_else(|| self.path_for(guid, entry, path_id, Some(PathOrigin::Entry))),
        }
    }
}

/// Path file loading errors
#[derive(Debug)]
pub enum PathLoadError {
    Read(String),
    Parse(String),
}

impl std::fmt::Display for PathLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(e) => write!(f, "Failed to read path file: {}", e),
            Self::Parse(e) => write!(f, "Failed to parse path file: {}", e),
        }
    }
}

impl std::error::Error for PathLoadError {}

/// Layout of the JSON path file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PathFile {
    waypoints: Vec<WaypointNodeRow>,
    taxi: Vec<TaxiNodeRow>,
    /// Text ids that exist; behavior texts outside this set are dropped
    texts: Option<Vec<i32>>,
}

/// Validated, immutable path data
#[derive(Default)]
pub struct PathStore {
    waypoints: HashMap<PathKey, Arc<WaypointPath>>,
    taxi: HashMap<u32, Arc<TaxiPath>>,
}

impl std::fmt::Debug for PathStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathStore")
            .field("waypoint_paths", &self.waypoints.len())
            .field("taxi_paths", &self.taxi.len())
            .finish()
    }
}

impl PathProvider for PathStore {
    fn waypoint_path(&self, key: &PathKey) -> Option<Arc<WaypointPath>> {
        self.waypoints.get(key).cloned()
    }

    fn taxi_path(&self, path_id: u32) -> Option<Arc<TaxiPath>> {
        self.taxi.get(&path_id).cloned()
    }
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate raw rows and build the store.
    ///
    /// Bad rows are repaired or skipped with a warning; nothing here fails.
    pub fn build(
        waypoint_rows: Vec<WaypointNodeRow>,
        taxi_rows: Vec<TaxiNodeRow>,
        known_texts: Option<&HashSet<i32>>,
    ) -> Self {
        let mut raw: HashMap<PathKey, WaypointPath> = HashMap::new();

        for row in &waypoint_rows {
            let origin = match PathOrigin::from_u8(row.origin) {
                Some(o) => o,
                None => {
                    warn!("Waypoint row for owner {} point {} has unknown origin {}, skipped",
                        row.owner_key, row.point, row.origin);
                    continue;
                }
            };

            let key = PathKey::new(origin, row.owner_key as u64, row.path_id);
            let path = raw.entry(key).or_default();
            if path.contains_key(&row.point) {
                warn!("Duplicate point {} in {} path {} of owner {}, keeping the first row",
                    row.point, origin.name(), row.path_id, row.owner_key);
                continue;
            }
            path.insert(row.point, node_from_row(row, known_texts));
        }

        let mut taxi_raw: HashMap<u32, Vec<&TaxiNodeRow>> = HashMap::new();
        for row in &taxi_rows {
            taxi_raw.entry(row.path_id).or_default().push(row);
        }

        let taxi = taxi_raw
            .into_iter()
            .map(|(path_id, mut rows)| {
                rows.sort_by_key(|r| r.node_index);
                let nodes: TaxiPath = rows
                    .into_iter()
                    .map(|r| TaxiNode {
                        map_id: r.map_id,
                        position: [r.position_x, r.position_y, r.position_z],
                        arrival_event_id: r.arrival_event_id,
                        departure_event_id: r.departure_event_id,
                    })
                    .collect();
                (path_id, Arc::new(nodes))
            })
            .collect::<HashMap<_, _>>();

        let waypoints = raw
            .into_iter()
            .map(|(key, path)| (key, Arc::new(path)))
            .collect::<HashMap<_, _>>();

        info!("Built path store: {} waypoint paths from {} rows, {} taxi paths from {} rows",
            waypoints.len(), waypoint_rows.len(), taxi.len(), taxi_rows.len());

        Self { waypoints, taxi }
    }

    /// Parse and validate a JSON path file's contents
    pub fn from_json(content: &str) -> Result<Self, PathLoadError> {
        let file: PathFile = serde_json::from_str(content)
            .map_err(|e| PathLoadError::Parse(e.to_string()))?;
        let texts = file.texts.map(|t| t.into_iter().collect::<HashSet<_>>());
        Ok(Self::build(file.waypoints, file.taxi, texts.as_ref()))
    }

    /// Load and validate a JSON path file
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self, PathLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PathLoadError::Read(format!("{:?}: {}", path, e)))?;
        Self::from_json(&content)
    }

    /// Hardcoded paths matching [`crate::world::SpawnRegistry::with_defaults`]
    pub fn with_defaults() -> Self {
        let mut waypoints = HashMap::new();

        // Guard patrol around the square, pausing at the gate
        let mut patrol = WaypointPath::new();
        patrol.insert(1, WaypointNode::new([-8800.0, 640.0, 94.0]));
        patrol.insert(2, WaypointNode {
            orientation: Some(1.57),
            delay: 5000,
            ..WaypointNode::new([-8780.0, 640.0, 94.0])
        });
        patrol.insert(3, WaypointNode::new([-8780.0, 660.0, 94.0]));
        patrol.insert(4, WaypointNode {
            delay: 2000,
            behavior: Some(WaypointBehavior {
                emote: 1,
                text_ids: [2000000, 2000001, 0, 0, 0],
                ..WaypointBehavior::default()
            }),
            ..WaypointNode::new([-8800.0, 660.0, 94.0])
        });
        waypoints.insert(PathKey::new(PathOrigin::Guid, 1, 0), Arc::new(patrol));

        // Template path shared by every thug
        let mut thug = WaypointPath::new();
        thug.insert(0, WaypointNode::new([-9800.0, 200.0, 35.0]));
        thug.insert(1, WaypointNode {
            delay: 3000,
            ..WaypointNode::new([-9790.0, 210.0, 35.0])
        });
        waypoints.insert(PathKey::new(PathOrigin::Entry, 2, 0), Arc::new(thug));

        let mut taxi = HashMap::new();
        taxi.insert(1, Arc::new(vec![
            TaxiNode::new(0, [-8835.0, 490.0, 109.0]),
            TaxiNode::new(0, [-8700.0, 400.0, 140.0]),
            TaxiNode::new(0, [-8600.0, 300.0, 160.0]),
            TaxiNode::new(1, [1500.0, -4400.0, 60.0]),
            TaxiNode::new(1, [1600.0, -4380.0, 40.0]),
        ]));

        info!("Path store initialized with {} waypoint paths (hardcoded defaults)", waypoints.len());

        Self { waypoints, taxi }
    }

    pub fn waypoint_path_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn taxi_path_count(&self) -> usize {
        self.taxi.len()
    }
}

/// Normalize a stored heading. The sentinel and non-finite values mean
/// "derive from direction of travel".
pub fn normalize_orientation(orientation: f32) -> Option<f32> {
    if !orientation.is_finite() || orientation == ORIENTATION_FROM_TRAVEL {
        None
    } else {
        Some(orientation.rem_euclid(TAU))
    }
}

fn node_from_row(row: &WaypointNodeRow, known_texts: Option<&HashSet<i32>>) -> WaypointNode {
    if row.wait_time < 0 {
        warn!("Point {} of owner {} has negative wait time {}, using 0",
            row.point, row.owner_key, row.wait_time);
    }

    let mut text_ids = row.text_ids;
    if let Some(known) = known_texts {
        for slot in text_ids.iter_mut().take(MAX_WAYPOINT_TEXT) {
            if *slot != 0 && !known.contains(slot) {
                warn!("Point {} of owner {} references unknown text {}, skipped",
                    row.point, row.owner_key, slot);
                *slot = 0;
            }
        }
    }

    let behavior = WaypointBehavior {
        emote: row.emote,
        spell: row.spell,
        model1: row.model1,
        model2: row.model2,
        text_ids,
    };

    let behavior = if behavior.is_empty() {
        None
    } else {
        if behavior.text_ids[0] == 0 && behavior.text_ids.iter().any(|t| *t != 0) {
            debug!("Point {} of owner {} has texts but slot 0 is empty; texts will never be used",
                row.point, row.owner_key);
        }
        Some(behavior)
    };

    WaypointNode {
        position: [row.position_x, row.position_y, row.position_z],
        orientation: normalize_orientation(row.orientation),
        delay: row.wait_time.max(0) as u32,
        script_id: (row.script_id != 0).then_some(row.script_id),
        behavior,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(origin: PathOrigin, owner_key: u32, point: u32) -> WaypointNodeRow {
        WaypointNodeRow {
            origin: origin.as_u8(),
            owner_key,
            path_id: 0,
            point,
            position_x: point as f32,
            position_y: 0.0,
            position_z: 0.0,
            orientation: ORIENTATION_FROM_TRAVEL,
            wait_time: 0,
            script_id: 0,
            emote: 0,
            spell: 0,
            model1: 0,
            model2: 0,
            text_ids: [0; MAX_WAYPOINT_TEXT],
        }
    }

    #[test]
    fn test_guid_path_preferred_over_entry_path() {
        let store = PathStore::build(
            vec![row(PathOrigin::Guid, 7, 0), row(PathOrigin::Entry, 3, 0), row(PathOrigin::Entry, 3, 1)],
            Vec::new(),
            None,
        );

        let (path, origin) = store.path_for(7, 3, 0, None).unwrap();
        assert_eq!(origin, PathOrigin::Guid);
        assert_eq!(path.len(), 1);

        let (path, origin) = store.path_for(8, 3, 0, None).unwrap();
        assert_eq!(origin, PathOrigin::Entry);
        assert_eq!(path.len(), 2);

        assert!(store.path_for(8, 4, 0, None).is_none());
        assert!(store.path_for(7, 3, 0, Some(PathOrigin::External)).is_none());
    }

    #[test]
    fn test_validation_repairs_rows() {
        let mut a = row(PathOrigin::Entry, 1, 5);
        a.orientation = -1.0;
        a.wait_time = -20;
        a.text_ids = [10, 11, 12, 0, 0];
        let mut duplicate = row(PathOrigin::Entry, 1, 5);
        duplicate.position_x = 99.0;
        let mut b = row(PathOrigin::Entry, 1, 2);
        b.script_id = 44;

        let known: HashSet<i32> = [10, 12].into_iter().collect();
        let store = PathStore::build(vec![a, duplicate, b], Vec::new(), Some(&known));
        let path = store.waypoint_path(&PathKey::new(PathOrigin::Entry, 1, 0)).unwrap();

        // Iteration is ascending by id regardless of row order
        assert_eq!(path.keys().copied().collect::<Vec<_>>(), vec![2, 5]);

        let node = &path[&5];
        assert_eq!(node.position[0], 5.0);
        assert_eq!(node.delay, 0);
        assert!((node.orientation.unwrap() - (TAU - 1.0)).abs() < 1e-5);
        assert_eq!(node.behavior.as_ref().unwrap().text_ids, [10, 0, 12, 0, 0]);

        assert_eq!(path[&2].orientation, None);
        assert_eq!(path[&2].script_id, Some(44));
        assert!(path[&2].behavior.is_none());
    }

    #[test]
    fn test_unknown_origin_skipped() {
        let mut bad = row(PathOrigin::Guid, 1, 0);
        bad.origin = 9;
        let store = PathStore::build(vec![bad], Vec::new(), None);
        assert_eq!(store.waypoint_path_count(), 0);
    }

    #[test]
    fn test_taxi_rows_ordered_by_index() {
        let taxi_row = |index: u32, map_id: u32| TaxiNodeRow {
            path_id: 3,
            node_index: index,
            map_id,
            position_x: index as f32,
            position_y: 0.0,
            position_z: 0.0,
            arrival_event_id: 0,
            departure_event_id: 0,
        };
        let store = PathStore::build(Vec::new(), vec![taxi_row(2, 1), taxi_row(0, 0), taxi_row(1, 0)], None);

        let path = store.taxi_path(3).unwrap();
        assert_eq!(path.iter().map(|n| n.position[0]).collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
        assert_eq!(path[2].map_id, 1);
        assert!(store.taxi_path(4).is_none());
    }

    #[test]
    fn test_json_file_layout() {
        let store = PathStore::from_json(r#"{
            "waypoints": [
                { "origin": 3, "owner_key": 12, "path_id": 2, "point": 1,
                  "position_x": 1.0, "position_y": 2.0, "position_z": 3.0, "wait_time": 1500 }
            ],
            "taxi": []
        }"#).unwrap();

        let path = store.waypoint_path(&PathKey::new(PathOrigin::External, 12, 2)).unwrap();
        assert_eq!(path[&1].delay, 1500);
        assert_eq!(path[&1].orientation, None);
    }

    #[test]
    fn test_defaults_are_consistent() {
        let store = PathStore::with_defaults();
        assert!(store.path_for(1, 1, 0, None).is_some());
        assert_eq!(store.path_for(5, 2, 0, None).unwrap().1, PathOrigin::Entry);
        assert_eq!(store.taxi_path(1).unwrap().len(), 5);
    }
}
