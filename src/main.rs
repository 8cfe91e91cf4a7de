use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod layout;
mod services;

use config::Config;
use services::host::WindowHost;
use services::{create_host, kwin_script, KwinScript, Tiler};

#[derive(Parser, Debug)]
#[command(name = "gamescope-tiler")]
#[command(about = "Раскладывает окна gamescope по экрану и перестраивает раскладку при появлении и закрытии окон")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "gamescope-tiler.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция окон, без реальных изменений)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    /// Разложить окна один раз и выйти
    #[arg(long)]
    once: bool,

    /// Вывести KWin скрипт в stdout и выйти
    #[arg(long)]
    print_kwin_script: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск gamescope-tiler v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.print_kwin_script {
        print!(
            "{}",
            kwin_script::render_script(&config.target.class, config.layout.tile_options())
        );
        return Ok(());
    }

    check_args(&args, &config)?;

    if args.dry_run {
        warn!("Режим сухого запуска - реальные окна не изменяются");
    } else if config.host.backend == "kwin" {
        return run_kwin(&config).await;
    }

    run_tiler(config, &args).await
}

async fn run_tiler(config: Arc<Config>, args: &Args) -> Result<()> {
    let host = create_host(config.clone(), args.dry_run)?;
    let tiler = Arc::new(Tiler::new(config.clone(), host.clone()));

    if args.once {
        let plan = tiler.retile().await?;
        info!("Разовая раскладка: {:?}, изменений: {}", plan.outcome, plan.requests.len());
        return Ok(());
    }

    let events = host.subscribe()?;

    let mut tiler_handle = {
        let tiler = tiler.clone();
        tokio::spawn(async move {
            if let Err(e) = tiler.run(events).await {
                error!("Ошибка в Tiler: {}", e);
            }
        })
    };

    info!("Все сервисы запущены");

    wait_for_shutdown().await;

    info!("Завершение работы...");
    // Хост закрывает поток событий, Tiler дорабатывает очередь и выходит сам
    host.shutdown();

    // Ожидаем завершения задачи (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, &mut tiler_handle).await {
        Ok(_) => info!("Tiler завершил работу корректно"),
        Err(_) => {
            warn!("Таймаут при завершении Tiler, прерываем задачу");
            tiler_handle.abort();
        }
    }

    info!("gamescope-tiler завершил работу");
    Ok(())
}

async fn run_kwin(config: &Config) -> Result<()> {
    let script = kwin_script::render_script(&config.target.class, config.layout.tile_options());

    let mut loaded = KwinScript::load(
        &script,
        &config.host.kwin_script_path,
        &config.host.kwin_plugin_name,
    )
    .await?;

    info!("KWin раскладывает окна сам, ожидаем Ctrl+C");
    wait_for_shutdown().await;

    loaded.unload().await?;
    info!("gamescope-tiler завершил работу");
    Ok(())
}

/// Сочетания флагов, которые нельзя выполнить
fn check_args(args: &Args, config: &Config) -> Result<()> {
    if args.once && !args.dry_run && config.host.backend == "kwin" {
        anyhow::bail!("--once не поддерживается с backend = \"kwin\": скрипт KWin работает до выгрузки");
    }
    Ok(())
}

async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    // Логи идут в stderr, stdout остаётся для --print-kwin-script
    let (compact, json) = if format == "json" {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(json)
        .init();

    Ok(())
}
