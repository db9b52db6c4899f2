use crate::view::{CpuView, MemoryScale, SwapScale, ViewModel, VolumeView};
use crate::wire::{CpuGroup, RawSnapshot};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("в снимке нет логических ядер")]
    NoLogicalCores,
    #[error("в снимке нет общей загрузки CPU (cpus_stat пуст)")]
    MissingAggregate,
}

pub fn normalize(raw: &RawSnapshot) -> Result<ViewModel, NormalizeError> {
    let logical_cores: usize = raw.cpus.iter().map(|cpu| cpu.threads).sum();
    if logical_cores == 0 {
        return Err(NormalizeError::NoLogicalCores);
    }
    let aggregate = *raw
        .cpus_stat
        .first()
        .ok_or(NormalizeError::MissingAggregate)?;

    let cores = logical_cores as f64;

    Ok(ViewModel {
        last_update_time: None,
        hostname: raw.hostname.clone(),
        kernel: raw.kernel.clone(),
        rtc_time: raw.rtc_time.clone(),
        uptime: raw.uptime.clone(),
        logical_cores,
        load_average: raw.load_average,
        load_average_scale: raw.load_average.map(|v| v * 100.0 / cores),
        cpu: aggregate * 100.0,
        cpus: split_thread_stats(&raw.cpus, &raw.cpus_stat),
        memory: raw.memory.clone(),
        memory_scale: MemoryScale {
            used: percent(raw.memory.used.value, raw.memory.total.value),
            buffer_cache: percent(raw.memory.buffer_cache.value, raw.memory.total.value),
        },
        swap: raw.swap.clone(),
        swap_scale: SwapScale {
            used: percent(raw.swap.used.value, raw.swap.total.value),
            cache: percent(raw.swap.cache.value, raw.swap.total.value),
        },
        network: raw.network.clone(),
        volumes: raw
            .volumes
            .iter()
            .map(|volume| VolumeView {
                volume: volume.clone(),
                scale: percent(volume.used.value, volume.size.value),
            })
            .collect(),
    })
}

// A short cpus_stat yields shorter slices; the offset still advances by declared threads.
pub fn split_thread_stats(groups: &[CpuGroup], cpus_stat: &[f64]) -> Vec<CpuView> {
    let mut offset = 1_usize;
    groups
        .iter()
        .map(|group| {
            let start = offset.min(cpus_stat.len());
            let end = offset.saturating_add(group.threads).min(cpus_stat.len());
            offset = offset.saturating_add(group.threads);
            CpuView {
                group: group.clone(),
                cpus_stat: cpus_stat[start..end].iter().map(|v| v * 100.0).collect(),
            }
        })
        .collect()
}

// Zero totals (no swap configured, unmounted volume) read as 0%.
fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{LoadAverage, Memory, Quantity, Swap, Volume};

    fn q(value: u64) -> Quantity {
        Quantity {
            value,
            text: format!("{value} B"),
        }
    }

    fn group(threads: usize) -> CpuGroup {
        CpuGroup {
            threads,
            ..CpuGroup::default()
        }
    }

    fn snapshot() -> RawSnapshot {
        RawSnapshot {
            hostname: "box".to_string(),
            kernel: "6.1.0".to_string(),
            cpus: vec![group(2), group(1)],
            cpus_stat: vec![0.5, 0.1, 0.2, 0.3],
            load_average: LoadAverage {
                one: 1.5,
                five: 0.75,
                fifteen: 3.0,
            },
            memory: Memory {
                total: q(1000),
                used: q(250),
                buffer_cache: q(100),
            },
            swap: Swap {
                total: q(400),
                used: q(100),
                cache: q(40),
            },
            volumes: vec![
                Volume {
                    device: "sda1".to_string(),
                    size: q(200),
                    used: q(50),
                    ..Volume::default()
                },
                Volume {
                    device: "sdb1".to_string(),
                    size: q(1000),
                    used: q(999),
                    ..Volume::default()
                },
            ],
            ..RawSnapshot::default()
        }
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn splits_thread_stats_per_group() {
        let view = normalize(&snapshot()).expect("валидный снимок");

        assert_eq!(view.logical_cores, 3);
        assert_eq!(view.cpu, 50.0);
        assert_eq!(view.cpus.len(), 2);
        assert_close(&view.cpus[0].cpus_stat, &[10.0, 20.0]);
        assert_close(&view.cpus[1].cpus_stat, &[30.0]);
    }

    #[test]
    fn slices_are_contiguous_without_gaps_or_overlaps() {
        let groups = vec![group(3), group(1), group(2)];
        let stats: Vec<f64> = (0..7).map(|i| i as f64 / 100.0).collect();
        let views = split_thread_stats(&groups, &stats);

        let joined: Vec<f64> = views
            .iter()
            .flat_map(|v| v.cpus_stat.iter().map(|p| p / 100.0))
            .collect();
        assert_close(&joined, &stats[1..]);
    }

    #[test]
    fn short_cpu_stats_are_clamped() {
        let groups = vec![group(2), group(2)];
        let views = split_thread_stats(&groups, &[0.5, 0.1, 0.2, 0.3]);

        assert_close(&views[0].cpus_stat, &[10.0, 20.0]);
        assert_close(&views[1].cpus_stat, &[30.0]);

        let views = split_thread_stats(&groups, &[0.5]);
        assert!(views[0].cpus_stat.is_empty());
        assert!(views[1].cpus_stat.is_empty());
    }

    #[test]
    fn load_average_is_scaled_by_logical_cores() {
        let view = normalize(&snapshot()).expect("валидный снимок");

        assert_eq!(view.load_average_scale.one, 1.5 * 100.0 / 3.0);
        assert_eq!(view.load_average_scale.five, 0.75 * 100.0 / 3.0);
        assert_eq!(view.load_average_scale.fifteen, 100.0);
        assert_eq!(view.load_average, snapshot().load_average);
    }

    #[test]
    fn memory_and_swap_are_scaled_by_totals() {
        let view = normalize(&snapshot()).expect("валидный снимок");

        assert_eq!(
            view.memory_scale,
            MemoryScale {
                used: 25.0,
                buffer_cache: 10.0,
            }
        );
        assert_eq!(
            view.swap_scale,
            SwapScale {
                used: 25.0,
                cache: 10.0,
            }
        );
    }

    #[test]
    fn missing_swap_reads_as_zero_percent() {
        let mut raw = snapshot();
        raw.swap = Swap::default();
        let view = normalize(&raw).expect("валидный снимок");

        assert_eq!(view.swap_scale, SwapScale::default());
    }

    #[test]
    fn volume_scale_preserves_order() {
        let view = normalize(&snapshot()).expect("валидный снимок");

        let devices: Vec<&str> = view
            .volumes
            .iter()
            .map(|v| v.volume.device.as_str())
            .collect();
        assert_eq!(devices, vec!["sda1", "sdb1"]);
        assert_eq!(view.volumes[0].scale, 25.0);
        assert_eq!(view.volumes[1].scale, 99.9);
    }

    #[test]
    fn inconsistent_data_is_not_clamped() {
        let mut raw = snapshot();
        raw.memory.used = q(1500);
        raw.cpus_stat[0] = 1.25;
        let view = normalize(&raw).expect("валидный снимок");

        assert_eq!(view.memory_scale.used, 150.0);
        assert_eq!(view.cpu, 125.0);
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = snapshot();
        let before = raw.clone();

        let first = normalize(&raw).expect("валидный снимок");
        let second = normalize(&raw).expect("валидный снимок");

        assert_eq!(first, second);
        assert_eq!(raw, before);
        assert!(first.last_update_time.is_none());
    }

    #[test]
    fn zero_logical_cores_is_rejected() {
        let mut raw = snapshot();
        raw.cpus = vec![group(0)];
        assert_eq!(normalize(&raw), Err(NormalizeError::NoLogicalCores));

        raw.cpus.clear();
        assert_eq!(normalize(&raw), Err(NormalizeError::NoLogicalCores));
    }

    #[test]
    fn empty_cpu_stats_is_rejected() {
        let mut raw = snapshot();
        raw.cpus_stat.clear();
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingAggregate));
    }
}
