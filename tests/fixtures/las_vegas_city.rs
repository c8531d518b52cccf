//! A Las Vegas / Henderson delivery network.
//!
//! Coordinates are real OpenStreetMap positions. Road lengths and traffic
//! figures are made up, chosen so shortest paths have no ties.

use std::fs;
use std::io;
use std::path::Path;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Site {
    pub id: u32,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Site {
    pub const fn new(id: u32, name: &'static str, lat: f64, lng: f64) -> Self {
        Self { id, name, lat, lng }
    }
}

/// `(source, destination, distance, congestion, traffic_time)`.
pub type RoadRow = (&'static str, &'static str, f64, i64, f64);

// ============================================================================
// Locations
// ============================================================================

pub const SITES: &[Site] = &[
    Site::new(1, "Central Depot", 36.1263781, -115.1658180),
    Site::new(2, "MGM Grand", 36.1023654, -115.1688720),
    Site::new(3, "Bellagio", 36.1126, -115.1767),
    Site::new(4, "Caesars Palace", 36.1162, -115.1745),
    Site::new(5, "Hard Rock Cafe", 36.1041592, -115.1722166),
    Site::new(6, "Brooklyn Bowl", 36.1175388, -115.1695094),
    Site::new(7, "Sunset Station", 36.0614, -115.0631),
    Site::new(8, "Green Valley Ranch", 36.0308, -115.0825),
    Site::new(9, "Longhorn Casino", 36.1070664, -115.0591256),
];

// ============================================================================
// Roads (segment index = position)
// ============================================================================

pub const ROADS: &[RoadRow] = &[
    ("Central Depot", "Caesars Palace", 2.0, 3, 6.0),
    ("Caesars Palace", "Bellagio", 1.0, 5, 3.0),
    ("Bellagio", "MGM Grand", 2.0, 7, 6.0),
    ("Central Depot", "MGM Grand", 5.0, 2, 17.0),
    ("Caesars Palace", "Brooklyn Bowl", 1.0, 4, 1.0),
    ("Brooklyn Bowl", "Central Depot", 2.0, 2, 2.0),
    ("MGM Grand", "Hard Rock Cafe", 1.0, 6, 3.0),
    ("MGM Grand", "Sunset Station", 12.0, 3, 20.0),
    ("Sunset Station", "Green Valley Ranch", 4.0, 1, 6.0),
    ("Green Valley Ranch", "Longhorn Casino", 8.0, 2, 10.0),
    ("Longhorn Casino", "Sunset Station", 5.0, 1, 5.0),
    ("Hard Rock Cafe", "Unknown Plaza", 1.0, 1, 1.0),
];

// ============================================================================
// Tables
// ============================================================================

pub fn locations_csv() -> String {
    let mut csv = String::from("id,name,latitude,longitude,details\n");
    for site in SITES {
        csv.push_str(&format!("{},{},{},{},\n", site.id, site.name, site.lat, site.lng));
    }
    csv.push_str("x,Broken Row,0,0,\n");
    csv
}

pub fn roads_csv() -> String {
    let mut csv = String::from("source,destination,distance,traffic_congestion,traffic_time\n");
    for (source, destination, distance, congestion, time) in ROADS {
        csv.push_str(&format!("{source},{destination},{distance},{congestion},{time}\n"));
    }
    csv
}

pub const VEHICLES_CSV: &str = "\
vehicle_id,capacity,avg_speed_kmh,start_location
V001,100,40,Central Depot
V002,40,35,Sunset Station
V003,250,30
";

pub const DELIVERIES_CSV: &str = "\
id,source,destination,deadline,priority,weight
D001,Central Depot,MGM Grand,2024-03-01 10:00,High,20
D002,Bellagio,Hard Rock Cafe,2024-03-01 12:00,Medium,35
D003,Sunset Station,Longhorn Casino,2024-03-01 09:00,Low,10
D004,Caesars Palace,Brooklyn Bowl,2024-03-02 08:00,High,600
D005,MGM Grand,Green Valley Ranch,2024-03-01 10:00,Medium,15
D006,Bellagio,MGM Grand,2024-03-01 11:00,Urgent,5
";

pub const TRAFFIC_CSV: &str = "\
road_id,new_weight,timestamp
0,12,2024-03-01T07:30
1,9,2024-03-01T07:45
42,5,2024-03-01T08:00
";

/// Writes every table under its default file name.
pub fn write_dataset(dir: &Path) -> io::Result<()> {
    fs::write(dir.join("locations.csv"), locations_csv())?;
    fs::write(dir.join("vehicles.csv"), VEHICLES_CSV)?;
    fs::write(dir.join("deliveries.csv"), DELIVERIES_CSV)?;
    fs::write(dir.join("Traffic_updates.csv"), TRAFFIC_CSV)?;
    fs::write(dir.join("City_map.csv"), roads_csv())?;
    Ok(())
}

pub fn site(name: &str) -> &'static Site {
    SITES
        .iter()
        .find(|site| site.name == name)
        .unwrap_or_else(|| panic!("no fixture site named {name}"))
}
