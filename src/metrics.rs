use crate::view::ViewModel;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub prober_fetch_attempts_total: Counter,
    pub prober_fetch_failures_total: CounterVec,
    pub prober_cycles_skipped_total: Counter,
    pub prober_fetch_latency_ms: Gauge,
    pub prober_consecutive_failures: Gauge,
    pub prober_view_version: Gauge,
    pub prober_last_update_timestamp_seconds: Gauge,
    pub prober_cpu_usage_percent: Gauge,
    pub prober_thread_usage_percent: GaugeVec,
    pub prober_logical_cores: Gauge,
    pub prober_load_average_percent: GaugeVec,
    pub prober_memory_usage_percent: GaugeVec,
    pub prober_swap_usage_percent: GaugeVec,
    pub prober_volume_usage_percent: GaugeVec,
    pub prober_scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let prober_fetch_attempts_total = Counter::with_opts(opts!(
            "prober_fetch_attempts_total",
            "Monitor API requests issued, retries included"
        ))?;
        let prober_fetch_failures_total = CounterVec::new(
            opts!(
                "prober_fetch_failures_total",
                "Failed poll cycles by failure kind"
            ),
            &["kind"],
        )?;
        let prober_cycles_skipped_total = Counter::with_opts(opts!(
            "prober_cycles_skipped_total",
            "Cycles where the API answered with a non-zero code"
        ))?;
        let prober_fetch_latency_ms = Gauge::with_opts(opts!(
            "prober_fetch_latency_ms",
            "Latency of the last monitor API request in milliseconds"
        ))?;
        let prober_consecutive_failures = Gauge::with_opts(opts!(
            "prober_consecutive_failures",
            "Failed attempts since the last successful fetch"
        ))?;
        let prober_view_version = Gauge::with_opts(opts!(
            "prober_view_version",
            "Version of the latest published view"
        ))?;
        let prober_last_update_timestamp_seconds = Gauge::with_opts(opts!(
            "prober_last_update_timestamp_seconds",
            "Unix time of the last successful refresh"
        ))?;
        let prober_cpu_usage_percent = Gauge::with_opts(opts!(
            "prober_cpu_usage_percent",
            "System-wide CPU usage of the remote host in percent"
        ))?;
        let prober_thread_usage_percent = GaugeVec::new(
            opts!(
                "prober_thread_usage_percent",
                "CPU usage per hardware thread in percent"
            ),
            &["group", "thread"],
        )?;
        let prober_logical_cores = Gauge::with_opts(opts!(
            "prober_logical_cores",
            "Logical cores of the remote host"
        ))?;
        let prober_load_average_percent = GaugeVec::new(
            opts!(
                "prober_load_average_percent",
                "Load average relative to logical cores in percent"
            ),
            &["period"],
        )?;
        let prober_memory_usage_percent = GaugeVec::new(
            opts!(
                "prober_memory_usage_percent",
                "Memory usage relative to total memory in percent"
            ),
            &["field"],
        )?;
        let prober_swap_usage_percent = GaugeVec::new(
            opts!(
                "prober_swap_usage_percent",
                "Swap usage relative to total swap in percent"
            ),
            &["field"],
        )?;
        let prober_volume_usage_percent = GaugeVec::new(
            opts!(
                "prober_volume_usage_percent",
                "Volume usage in percent by position, device and first mount point"
            ),
            &["index", "device", "mount"],
        )?;
        let prober_scrape_count_total = Counter::with_opts(opts!(
            "prober_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;

        register(&registry, &prober_fetch_attempts_total)?;
        register(&registry, &prober_fetch_failures_total)?;
        register(&registry, &prober_cycles_skipped_total)?;
        register(&registry, &prober_fetch_latency_ms)?;
        register(&registry, &prober_consecutive_failures)?;
        register(&registry, &prober_view_version)?;
        register(&registry, &prober_last_update_timestamp_seconds)?;
        register(&registry, &prober_cpu_usage_percent)?;
        register(&registry, &prober_thread_usage_percent)?;
        register(&registry, &prober_logical_cores)?;
        register(&registry, &prober_load_average_percent)?;
        register(&registry, &prober_memory_usage_percent)?;
        register(&registry, &prober_swap_usage_percent)?;
        register(&registry, &prober_volume_usage_percent)?;
        register(&registry, &prober_scrape_count_total)?;

        Ok(Arc::new(Self {
            registry,
            prober_fetch_attempts_total,
            prober_fetch_failures_total,
            prober_cycles_skipped_total,
            prober_fetch_latency_ms,
            prober_consecutive_failures,
            prober_view_version,
            prober_last_update_timestamp_seconds,
            prober_cpu_usage_percent,
            prober_thread_usage_percent,
            prober_logical_cores,
            prober_load_average_percent,
            prober_memory_usage_percent,
            prober_swap_usage_percent,
            prober_volume_usage_percent,
            prober_scrape_count_total,
        }))
    }

    pub fn update_from_view(&self, view: &ViewModel, version: u64) {
        self.prober_view_version.set(version as f64);
        self.prober_last_update_timestamp_seconds
            .set(now_unix() as f64);
        self.prober_cpu_usage_percent.set(view.cpu);
        self.prober_logical_cores.set(view.logical_cores as f64);

        self.prober_thread_usage_percent.reset();
        self.prober_volume_usage_percent.reset();

        for (group_idx, cpu) in view.cpus.iter().enumerate() {
            let group = group_idx.to_string();
            for (thread_idx, pct) in cpu.cpus_stat.iter().enumerate() {
                let thread = thread_idx.to_string();
                self.prober_thread_usage_percent
                    .with_label_values(&[group.as_str(), thread.as_str()])
                    .set(*pct);
            }
        }

        let la = view.load_average_scale;
        for (period, pct) in [("one", la.one), ("five", la.five), ("fifteen", la.fifteen)] {
            self.prober_load_average_percent
                .with_label_values(&[period])
                .set(pct);
        }

        self.prober_memory_usage_percent
            .with_label_values(&["used"])
            .set(view.memory_scale.used);
        self.prober_memory_usage_percent
            .with_label_values(&["buffer_cache"])
            .set(view.memory_scale.buffer_cache);
        self.prober_swap_usage_percent
            .with_label_values(&["used"])
            .set(view.swap_scale.used);
        self.prober_swap_usage_percent
            .with_label_values(&["cache"])
            .set(view.swap_scale.cache);

        for (idx, v) in view.volumes.iter().enumerate() {
            let index = idx.to_string();
            let mount = v.volume.points.first().map(String::as_str).unwrap_or("");
            self.prober_volume_usage_percent
                .with_label_values(&[index.as_str(), v.volume.device.as_str(), mount])
                .set(v.scale);
        }
    }

    pub fn inc_fetch_attempt(&self) {
        self.prober_fetch_attempts_total.inc();
    }

    pub fn observe_fetch_latency(&self, elapsed: Duration) {
        self.prober_fetch_latency_ms
            .set(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn inc_fetch_failure(&self, kind: &str, consecutive: u32) {
        self.prober_fetch_failures_total
            .with_label_values(&[kind])
            .inc();
        self.prober_consecutive_failures.set(consecutive as f64);
    }

    pub fn inc_skipped(&self) {
        self.prober_cycles_skipped_total.inc();
    }

    pub fn reset_failures(&self) {
        self.prober_consecutive_failures.set(0.0);
    }

    pub fn inc_scrape_count(&self) {
        self.prober_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
