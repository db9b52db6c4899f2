use crate::wire::{CpuGroup, LoadAverage, Memory, NetworkInterface, Quantity, Swap, Volume};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

pub type ViewSender = watch::Sender<Arc<VersionedView>>;
pub type ViewReceiver = watch::Receiver<Arc<VersionedView>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewModel {
    pub last_update_time: Option<String>,
    pub hostname: String,
    pub kernel: String,
    pub rtc_time: String,
    pub uptime: Quantity,
    pub logical_cores: usize,
    pub load_average: LoadAverage,
    pub load_average_scale: LoadAverage,
    pub cpu: f64,
    pub cpus: Vec<CpuView>,
    pub memory: Memory,
    pub memory_scale: MemoryScale,
    pub swap: Swap,
    pub swap_scale: SwapScale,
    pub network: Vec<NetworkInterface>,
    pub volumes: Vec<VolumeView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuView {
    #[serde(flatten)]
    pub group: CpuGroup,
    pub cpus_stat: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryScale {
    pub used: f64,
    pub buffer_cache: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SwapScale {
    pub used: f64,
    pub cache: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeView {
    #[serde(flatten)]
    pub volume: Volume,
    pub scale: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionedView {
    pub version: u64,
    pub view: ViewModel,
}

impl ViewModel {
    pub fn last_update_label(&self) -> &str {
        self.last_update_time.as_deref().unwrap_or("Never")
    }
}

pub fn channel() -> (ViewSender, ViewReceiver) {
    watch::channel(Arc::new(VersionedView::default()))
}

pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_view_is_zeroed_and_never_updated() {
        let (_tx, rx) = channel();
        let frame = rx.borrow().clone();

        assert_eq!(frame.version, 0);
        assert_eq!(frame.view.logical_cores, 0);
        assert!(frame.view.cpus.is_empty());
        assert_eq!(frame.view.last_update_label(), "Never");
    }

    #[test]
    fn cpu_view_serializes_group_fields_inline() {
        let view = CpuView {
            group: CpuGroup {
                model_name: "Ryzen".to_string(),
                threads: 2,
                ..CpuGroup::default()
            },
            cpus_stat: vec![10.0, 20.0],
        };
        let json = serde_json::to_value(&view).expect("сериализация");

        assert_eq!(json["model_name"], "Ryzen");
        assert_eq!(json["threads"], 2);
        assert_eq!(json["cpus_stat"][1], 20.0);
    }
}
