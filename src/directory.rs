use std::collections::HashMap;

/// Read-only lookup capability the extraction core depends on. Injected so
/// the embedded tables can be swapped for a fuller directory without touching
/// the extraction or validation logic.
pub trait ReferenceDirectory {
    fn station(&self, code: &str) -> Option<&StationInfo>;
    fn train(&self, number: &str) -> Option<&TrainInfo>;
    fn code_for_station_name(&self, name: &str) -> Option<&str>;

    /// Resolve a station name to a code when the printed ticket shows `(-)`.
    fn infer_station_code(&self, station_name: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StationInfo {
    pub name: &'static str,
    pub zone: &'static str,
}

#[derive(Debug, Clone)]
pub struct TrainInfo {
    pub name: &'static str,
    pub zone: &'static str,
}

#[derive(Debug)]
pub struct BuiltinDirectory {
    stations: HashMap<&'static str, StationInfo>,
    trains: HashMap<&'static str, TrainInfo>,
    name_to_code: HashMap<&'static str, &'static str>,
}

impl BuiltinDirectory {
    pub fn new() -> Self {
        let station_rows: &[(&str, &str, &str)] = &[
            ("NDLS", "NEW DELHI", "NR"),
            ("BCT", "MUMBAI CENTRAL", "WR"),
            ("MAS", "CHENNAI CENTRAL", "SR"),
            ("HWH", "HOWRAH JN", "ER"),
            ("RTM", "RATLAM JN", "WCR"),
            ("BRC", "VADODARA JN", "WR"),
            ("JP", "JAIPUR", "NWR"),
            ("ADI", "AHMEDABAD JN", "WR"),
            ("SBC", "BANGALORE", "SWR"),
            ("HYB", "HYDERABAD", "SCR"),
            ("PUNE", "PUNE", "CR"),
            ("INDB", "INDORE", "WR"),
        ];

        let train_rows: &[(&str, &str, &str)] = &[
            ("20958", "INDORE EXPRESS", "WCR"),
            ("20946", "NZM EKNR SF EXP", "NWR"),
            ("12956", "JP MMCT SF EXP", "WR"),
        ];

        let mut stations = HashMap::new();
        let mut name_to_code = HashMap::new();
        for &(code, name, zone) in station_rows {
            stations.insert(code, StationInfo { name, zone });
            name_to_code.insert(name, code);
        }

        let mut trains = HashMap::new();
        for &(number, name, zone) in train_rows {
            trains.insert(number, TrainInfo { name, zone });
        }

        Self {
            stations,
            trains,
            name_to_code,
        }
    }
}

impl Default for BuiltinDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceDirectory for BuiltinDirectory {
    fn station(&self, code: &str) -> Option<&StationInfo> {
        self.stations.get(code)
    }

    fn train(&self, number: &str) -> Option<&TrainInfo> {
        self.trains.get(number)
    }

    fn code_for_station_name(&self, name: &str) -> Option<&str> {
        self.name_to_code.get(name).copied()
    }

    /// Exact name match first, then substring match in either direction, then
    /// a generated stand-in code from the name itself.
    fn infer_station_code(&self, station_name: &str) -> String {
        let cleaned = station_name.trim().to_uppercase();

        if let Some(code) = self.code_for_station_name(&cleaned) {
            return code.to_string();
        }

        for (&name, &code) in &self.name_to_code {
            if cleaned.contains(name) || name.contains(cleaned.as_str()) {
                return code.to_string();
            }
        }

        let words: Vec<&str> = cleaned.split_whitespace().collect();
        match words.as_slice() {
            [] => cleaned.chars().take(4).collect(),
            [only] => only.chars().take(3).collect(),
            [first, second, ..] => {
                let mut code: String = first.chars().take(2).collect();
                code.extend(second.chars().take(2));
                code
            }
        }
    }
}
