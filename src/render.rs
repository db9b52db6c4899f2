use crate::view::{VersionedView, ViewReceiver};
use serde_json::Value;
use std::fmt::Write as _;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

pub fn format_view(frame: &VersionedView) -> String {
    let view = &frame.view;
    let mut out = String::new();

    let uptime = if view.uptime.text.is_empty() {
        humantime::format_duration(Duration::from_secs(view.uptime.value)).to_string()
    } else {
        view.uptime.text.clone()
    };

    let _ = writeln!(out, "== {} (#{}) ==", display_or_dash(&view.hostname), frame.version);
    let _ = writeln!(out, "kernel:   {}", display_or_dash(&view.kernel));
    let _ = writeln!(out, "rtc:      {}", display_or_dash(&view.rtc_time));
    let _ = writeln!(out, "uptime:   {uptime}");

    let _ = writeln!(
        out,
        "cpu:      {:.1}% ({} logical cores)",
        view.cpu, view.logical_cores
    );
    for (idx, group) in view.cpus.iter().enumerate() {
        let threads = group
            .cpus_stat
            .iter()
            .map(|v| format!("{v:.0}%"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            "  [{idx}] {} x{}: {threads}",
            display_or_dash(&group.group.model_name),
            group.group.threads
        );
    }

    let _ = writeln!(
        out,
        "load:     {:.2} {:.2} {:.2} ({:.0}% {:.0}% {:.0}%)",
        view.load_average.one,
        view.load_average.five,
        view.load_average.fifteen,
        view.load_average_scale.one,
        view.load_average_scale.five,
        view.load_average_scale.fifteen
    );
    let _ = writeln!(
        out,
        "memory:   {} / {} used {:.1}%, buffer/cache {:.1}%",
        view.memory.used.text,
        view.memory.total.text,
        view.memory_scale.used,
        view.memory_scale.buffer_cache
    );
    let _ = writeln!(
        out,
        "swap:     {} / {} used {:.1}%, cache {:.1}%",
        view.swap.used.text, view.swap.total.text, view.swap_scale.used, view.swap_scale.cache
    );

    for iface in &view.network {
        let details = iface
            .extra
            .iter()
            .filter_map(|(k, v)| scalar_text(v).map(|v| format!("{k}={v}")))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "net:      {} {details}", display_or_dash(&iface.interface));
    }

    for volume in &view.volumes {
        let mount = if volume.volume.points.is_empty() {
            "-".to_string()
        } else {
            volume.volume.points.join(",")
        };
        let _ = writeln!(
            out,
            "volume:   {} on {mount}: {} / {} ({:.1}%)",
            display_or_dash(&volume.volume.device),
            volume.volume.used.text,
            volume.volume.size.text,
            volume.scale
        );
    }

    let _ = write!(out, "last update: {}", view.last_update_label());
    out
}

fn display_or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub async fn run_console(mut views: ViewReceiver, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("консоль: получен сигнал остановки");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    info!("канал представлений закрыт, консоль остановлена");
                    break;
                }
                let frame = views.borrow_and_update().clone();
                if frame.version == 0 {
                    continue;
                }
                println!("{}\n", format_view(&frame));
            }
        }
    }
}
