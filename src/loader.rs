//! CSV tables as a [`DataSource`].
//!
//! Every table has a header row, which is skipped; columns are read by
//! position. Rows that fail to parse or validate are logged and counted, and
//! the rest of the table is still loaded.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::LoadError;
use crate::model::{Delivery, Location, LocationId, Point, Priority, Road, TrafficEvent, Vehicle};
use crate::traits::{DataSource, Loaded};

/// File names of the tables inside a data directory.
#[derive(Debug, Clone)]
pub struct CsvFiles {
    pub locations: String,
    pub vehicles: String,
    pub deliveries: String,
    pub traffic_updates: String,
    pub city_map: String,
}

impl Default for CsvFiles {
    fn default() -> Self {
        Self {
            locations: "locations.csv".to_string(),
            vehicles: "vehicles.csv".to_string(),
            deliveries: "deliveries.csv".to_string(),
            traffic_updates: "Traffic_updates.csv".to_string(),
            city_map: "City_map.csv".to_string(),
        }
    }
}

/// Reads the tables from one directory.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    root: PathBuf,
    files: CsvFiles,
}

impl CsvDataSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_files(root, CsvFiles::default())
    }

    pub fn with_files(root: impl Into<PathBuf>, files: CsvFiles) -> Self {
        Self {
            root: root.into(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open(&self, name: &str) -> Result<File, LoadError> {
        let path = self.root.join(name);
        File::open(&path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

impl DataSource for CsvDataSource {
    fn locations(&self) -> Result<Loaded<Location>, LoadError> {
        read_locations(self.open(&self.files.locations)?)
    }

    fn vehicles(&self) -> Result<Loaded<Vehicle>, LoadError> {
        read_vehicles(self.open(&self.files.vehicles)?)
    }

    fn deliveries(&self) -> Result<Loaded<Delivery>, LoadError> {
        read_deliveries(self.open(&self.files.deliveries)?)
    }

    fn traffic_events(&self) -> Result<Loaded<TrafficEvent>, LoadError> {
        read_traffic_events(self.open(&self.files.traffic_updates)?)
    }

    fn roads(&self) -> Result<Loaded<Road>, LoadError> {
        read_roads(self.open(&self.files.city_map)?)
    }
}

// ============================================================================
// Row layouts
// ============================================================================

#[derive(Debug, Deserialize)]
struct LocationRow {
    id: LocationId,
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VehicleRow {
    vehicle_id: String,
    capacity: f64,
    #[serde(default)]
    avg_speed_kmh: Option<f64>,
    #[serde(default)]
    start_location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeliveryRow {
    id: String,
    source: String,
    destination: String,
    deadline: String,
    priority: String,
    #[serde(default)]
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrafficRow {
    road_id: usize,
    new_weight: i64,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct RoadRow {
    source: String,
    destination: String,
    distance: f64,
    traffic_congestion: f64,
    traffic_time: f64,
}

/// Reads one table, converting each row and skipping the ones that fail.
fn read_table<R, Row, T>(
    reader: R,
    table: &'static str,
    convert: impl Fn(Row) -> Result<T, String>,
) -> Result<Loaded<T>, LoadError>
where
    R: io::Read,
    Row: DeserializeOwned,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut loaded = Loaded::default();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let row = record
            .deserialize::<Row>(None)
            .map_err(|err| err.to_string())
            .and_then(&convert);

        match row {
            Ok(value) => loaded.records.push(value),
            Err(reason) => {
                tracing::warn!(table, line, %reason, "skipping malformed row");
                loaded.skipped += 1;
            }
        }
    }

    tracing::debug!(table, records = loaded.records.len(), skipped = loaded.skipped, "table loaded");
    Ok(loaded)
}

pub fn read_locations<R: io::Read>(reader: R) -> Result<Loaded<Location>, LoadError> {
    read_table(reader, "locations", |row: LocationRow| {
        Ok(Location {
            id: row.id,
            name: row.name,
            point: Point::new(row.longitude, row.latitude),
            details: row.details.unwrap_or_default(),
        })
    })
}

pub fn read_vehicles<R: io::Read>(reader: R) -> Result<Loaded<Vehicle>, LoadError> {
    read_table(reader, "vehicles", |row: VehicleRow| {
        if row.capacity < 0.0 {
            return Err(format!("negative capacity {}", row.capacity));
        }
        let mut vehicle = Vehicle::new(row.vehicle_id, row.capacity);
        vehicle.speed_kmh = row.avg_speed_kmh;
        vehicle.start_location = row.start_location.filter(|name| !name.is_empty());
        Ok(vehicle)
    })
}

pub fn read_deliveries<R: io::Read>(reader: R) -> Result<Loaded<Delivery>, LoadError> {
    read_table(reader, "deliveries", |row: DeliveryRow| {
        let priority: Priority = row.priority.parse().map_err(|err| format!("{err}"))?;
        let weight = row.weight.unwrap_or(0.0);
        if weight < 0.0 {
            return Err(format!("negative weight {weight}"));
        }
        Ok(Delivery::new(row.id, row.source, row.destination)
            .with_deadline(row.deadline)
            .with_priority(priority)
            .with_weight(weight))
    })
}

pub fn read_traffic_events<R: io::Read>(reader: R) -> Result<Loaded<TrafficEvent>, LoadError> {
    read_table(reader, "traffic_updates", |row: TrafficRow| {
        Ok(TrafficEvent {
            road_id: row.road_id,
            new_weight: row.new_weight,
            timestamp: row.timestamp,
        })
    })
}

pub fn read_roads<R: io::Read>(reader: R) -> Result<Loaded<Road>, LoadError> {
    read_table(reader, "city_map", |row: RoadRow| {
        Ok(Road {
            source: row.source,
            destination: row.destination,
            distance: row.distance,
            congestion: row.traffic_congestion,
            traffic_time: row.traffic_time,
        })
    })
}
