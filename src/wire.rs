use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_OK: i64 = 0;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Quantity {
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CpuGroup {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub cores: usize,
    pub threads: usize,
    #[serde(default)]
    pub mhz: Vec<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

impl LoadAverage {
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            one: f(self.one),
            five: f(self.five),
            fifteen: f(self.fifteen),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Memory {
    pub total: Quantity,
    pub used: Quantity,
    pub buffer_cache: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Swap {
    pub total: Quantity,
    pub used: Quantity,
    pub cache: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NetworkInterface {
    #[serde(default)]
    pub interface: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Volume {
    #[serde(default)]
    pub device: String,
    pub size: Quantity,
    pub used: Quantity,
    #[serde(default)]
    pub points: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub kernel: String,
    #[serde(default)]
    pub rtc_time: String,
    #[serde(default)]
    pub uptime: Quantity,
    pub cpus: Vec<CpuGroup>,
    pub cpus_stat: Vec<f64>,
    pub load_average: LoadAverage,
    pub memory: Memory,
    pub swap: Swap,
    #[serde(default)]
    pub network: Vec<NetworkInterface>,
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "hostname": "box",
        "kernel": "6.1.0",
        "rtc_time": "2024-01-01 00:00:00",
        "uptime": {"value": 3600, "text": "1 hour"},
        "cpus": [{"model_name": "Xeon", "cores": 2, "threads": 4, "mhz": [2400.0], "vendor": "intel"}],
        "cpus_stat": [0.5, 0.1, 0.2, 0.3, 0.4],
        "load_average": {"one": 1.0, "five": 0.5, "fifteen": 0.25},
        "memory": {
            "total": {"value": 1000, "text": "1000 B"},
            "used": {"value": 250, "text": "250 B"},
            "buffer_cache": {"value": 100, "text": "100 B"}
        },
        "swap": {
            "total": {"value": 0, "text": "0 B"},
            "used": {"value": 0, "text": "0 B"},
            "cache": {"value": 0, "text": "0 B"}
        },
        "network": [{"interface": "eth0", "upload_total": {"value": 1, "text": "1 B"}}],
        "volumes": [{"device": "sda1", "size": {"value": 200}, "used": {"value": 50}, "points": ["/"]}]
    }"#;

    #[test]
    fn snapshot_keeps_unknown_fields() {
        let raw: RawSnapshot = serde_json::from_str(SAMPLE).expect("валидный снимок");

        assert_eq!(raw.cpus[0].threads, 4);
        assert_eq!(
            raw.cpus[0].extra.get("vendor"),
            Some(&Value::String("intel".to_string()))
        );
        assert!(raw.network[0].extra.contains_key("upload_total"));
        assert_eq!(raw.volumes[0].points, vec!["/".to_string()]);
        assert_eq!(raw.volumes[0].size.text, "");
    }

    #[test]
    fn snapshot_without_cpu_stats_is_rejected() {
        let broken = SAMPLE.replace("\"cpus_stat\": [0.5, 0.1, 0.2, 0.3, 0.4],", "");
        assert!(serde_json::from_str::<RawSnapshot>(&broken).is_err());
    }

    #[test]
    fn load_average_map_applies_to_every_period() {
        let la = LoadAverage {
            one: 1.0,
            five: 2.0,
            fifteen: 3.0,
        };
        assert_eq!(
            la.map(|v| v * 10.0),
            LoadAverage {
                one: 10.0,
                five: 20.0,
                fifteen: 30.0,
            }
        );
    }
}
