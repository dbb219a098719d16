use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use subscription_aggregator::{
    config::{Config, StorageKind},
    database::{create_pool, run_migrations},
    handlers,
    middlewares::create_cors,
    repositories::{InMemorySubscriptionRepository, PgSubscriptionRepository, SubscriptionRepository},
    services::SubscriptionService,
    swagger::swagger_config,
    validation::SubscriptionValidator,
};

fn init_logger(level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 加载配置
    let config = Config::from_toml().map_err(std::io::Error::other)?;
    init_logger(&config.logger.level);

    let repository: Arc<dyn SubscriptionRepository> = match config.storage {
        StorageKind::Postgres => {
            // 创建数据库连接池
            let pool = create_pool(&config.database)
                .await
                .map_err(std::io::Error::other)?;

            // 运行数据库迁移
            run_migrations(&pool)
                .await
                .map_err(std::io::Error::other)?;

            Arc::new(PgSubscriptionRepository::new(pool))
        }
        StorageKind::Memory => {
            log::warn!("Using in-memory storage, data will be lost on restart");
            Arc::new(InMemorySubscriptionRepository::new())
        }
    };

    let subscription_service =
        SubscriptionService::new(repository, Arc::new(SubscriptionValidator::new()))
            .with_timeout(config.service.operation_timeout());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new(
                r#"%a "%r" %s %b %T request_id=%{x-request-id}i"#,
            ))
            .wrap(create_cors())
            .app_data(web::Data::new(subscription_service.clone()))
            .configure(swagger_config)
            .service(web::scope("/api/v1").configure(handlers::subscription_config))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
