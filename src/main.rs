// src/main.rs

use std::sync::Arc;
use clap::Parser;
use uuid::Uuid;

use statuspage_backend::auth;
use statuspage_backend::config::AppConfig;
use statuspage_backend::events::EventHub;
use statuspage_backend::status_service::StatusService;
use statuspage_backend::web::run_web_server;

/// Основная команда
#[derive(clap::Parser)]
#[command(name = "statuspage-backend")]
#[command(about = "Бэкенд статусных страниц и инцидентов", long_about = None)]
struct Args {
    /// Адрес для веб-сервера (например, 127.0.0.1:8080)
    #[arg(long)]
    addr: Option<String>,

    /// Путь к YAML-конфигу
    #[arg(short, long)]
    config: Option<String>,

    /// Выпустить тестовый токен и выйти
    #[arg(long, action)]
    gen_token: bool,

    /// Организация для тестового токена
    #[arg(long)]
    org: Option<Uuid>,

    /// Роль для тестового токена
    #[arg(long, default_value = "org:admin")]
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_max_level(parse_level(&config.logging.level))
        .init();

    if args.gen_token {
        let org = args.org.unwrap_or_else(Uuid::new_v4);
        let token = auth::generate_token("local-admin", org, Some("Local Org"), &args.role)?;
        println!("org: {}", org);
        println!("token: {}", token);
        return Ok(());
    }

    let hub = Arc::new(EventHub::new(config.events.buffer));
    let service = Arc::new(StatusService::new(hub));

    let addr = args.addr.unwrap_or_else(|| config.web_server.address.clone());
    println!("🚀 Запуск веб-API на http://{}", addr);
    run_web_server(service, &addr).await?;

    Ok(())
}

fn parse_level(level: &str) -> tracing::Level {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "WARN" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
