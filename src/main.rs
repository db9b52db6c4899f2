mod config;
mod fetch;
mod http;
mod metrics;
mod normalize;
mod notify;
mod poller;
mod render;
mod view;
mod wire;

use axum::serve;
use clap::Parser;
use config::Config;
use fetch::HttpFetcher;
use metrics::Metrics;
use notify::{LogNotifier, TelegramNotifier, TerminalNotifier};
use poller::{PollExit, PollSettings, Poller};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "prober-client")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,
    #[arg(long)]
    auth_key: Option<String>,
    #[arg(long)]
    listen: Option<String>,
    #[arg(long, conflicts_with = "telegram_off")]
    telegram_on: bool,
    #[arg(long, conflicts_with = "telegram_on")]
    telegram_off: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };

    let notifier = if cfg.telegram.enabled {
        match TelegramNotifier::from_config(&cfg.telegram) {
            Ok(n) => TerminalNotifier::Telegram(n),
            Err(err) => {
                error!(error = %err, "не удалось подготовить настройки Telegram");
                std::process::exit(1);
            }
        }
    } else {
        TerminalNotifier::Log(LogNotifier)
    };

    let fetcher = match HttpFetcher::new(&cfg.endpoint, &cfg.api_path, cfg.request_timeout()) {
        Ok(f) => f,
        Err(err) => {
            error!(error = %err, "не удалось создать HTTP-клиент");
            std::process::exit(1);
        }
    };

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    let auth_key = cfg.resolve_auth_key(cli.auth_key.as_deref());
    if auth_key.is_none() {
        warn!(env = %cfg.auth_key_env, "ключ авторизации не задан, запросы идут без заголовка Authorization");
    }

    info!(
        url = %fetcher.url(),
        interval_ms = cfg.interval_ms,
        max_failures = cfg.retry.max_failures,
        "запуск prober-client"
    );

    let (views_tx, views_rx) = view::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = cfg.listen.clone().map(|listen| {
        let metrics = metrics.clone();
        let views = views_rx.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(metrics, views);
            let addr: SocketAddr = match listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %listen, "некорректный адрес listen");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "не удалось запустить HTTP-сервер");
                    return;
                }
            };
            info!(%addr, "HTTP-сервер слушает");

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "ошибка HTTP-сервера");
            }
        })
    });

    let console_task = cfg
        .console
        .then(|| tokio::spawn(render::run_console(views_rx.clone(), shutdown_rx.clone())));
    drop(views_rx);

    let settings = PollSettings {
        interval: cfg.interval(),
        auth_key,
        retry: cfg.retry_policy(),
    };
    let mut poller_task = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut poller = Poller::new(fetcher, notifier, settings, views_tx, metrics);
            poller.run(shutdown).await
        })
    };

    let finished = tokio::select! {
        res = &mut poller_task => Some(res),
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                error!(error = %err, "не удалось дождаться Ctrl+C");
            }
            info!("получен Ctrl+C, выполняется остановка");
            None
        }
    };

    let _ = shutdown_tx.send(true);

    let outcome = match finished {
        Some(res) => res,
        None => poller_task.await,
    };

    if let Some(task) = console_task {
        let _ = task.await;
    }
    if let Some(task) = http_task {
        let _ = task.await;
    }

    match outcome {
        Ok(PollExit::Stopped) => info!("prober-client остановлен"),
        Ok(PollExit::Exhausted { attempts }) => {
            error!(attempts, "опрос остановлен после исчерпания попыток");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "задача опроса завершилась аварийно");
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    if let Some(endpoint) = &cli.endpoint {
        cfg.endpoint = endpoint.clone();
    }
    if let Some(interval) = cli.interval {
        cfg.interval_ms = interval.as_millis() as u64;
    }
    if let Some(listen) = &cli.listen {
        cfg.listen = Some(listen.clone());
    }
    if cli.telegram_on {
        cfg.telegram.enabled = true;
    } else if cli.telegram_off {
        cfg.telegram.enabled = false;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_defaults() {
        let cli = Cli::parse_from([
            "prober-client",
            "--endpoint",
            "https://probe.example",
            "--interval",
            "5s",
            "--listen",
            "127.0.0.1:9200",
        ]);
        let cfg = load_config(&cli).expect("конфигурация");

        assert_eq!(cfg.endpoint, "https://probe.example");
        assert_eq!(cfg.interval_ms, 5000);
        assert_eq!(cfg.listen.as_deref(), Some("127.0.0.1:9200"));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::parse_from(["prober-client", "--endpoint", "ftp://probe"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn telegram_flags_conflict() {
        let res = Cli::try_parse_from(["prober-client", "--telegram-on", "--telegram-off"]);
        assert!(res.is_err());
    }
}
