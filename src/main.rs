//! 交易报表服务主入口

use anyhow::Context;
use deal_reports::{
    config::AppConfig, db, handlers::health, middleware::AppState, models::role::RoleName,
    routes, telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

/// 命令行子命令
enum Command {
    Serve,
    Migrate,
    SetRole { username: String, role: RoleName },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let command = match args.get(1).map(String::as_str) {
        None => Command::Serve,
        Some("--version") => {
            println!("deal-reports {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some("migrate") => Command::Migrate,
        Some("set-role") => match (args.get(2), args.get(3)) {
            (Some(username), Some(role)) => Command::SetRole {
                username: username.clone(),
                role: role
                    .parse()
                    .map_err(|_| anyhow::anyhow!("未知角色: {} (Viewer, Admin, Owner)", role))?,
            },
            _ => {
                eprintln!("用法: deal-reports set-role <username> <role>");
                std::process::exit(1);
            }
        },
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(env) = std::env::var("REPORTS_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    match command {
        Command::Migrate => {
            println!("Migrations applied");
            Ok(())
        }
        Command::SetRole { username, role } => {
            let state = AppState::new(config, db_pool)?;
            let user = state
                .permission_service
                .assign_role_by_username(&username, role)
                .await?;
            println!("{} is now {}", user.username, user.role);
            Ok(())
        }
        Command::Serve => serve(config, db_pool).await,
    }
}

async fn serve(config: AppConfig, db_pool: sqlx::PgPool) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Deal reports service starting...");

    tokio::fs::create_dir_all(&config.uploads.dir)
        .await
        .with_context(|| format!("Failed to create upload directory {}", config.uploads.dir))?;

    let app_state = Arc::new(AppState::new(config.clone(), db_pool)?);

    // 启动时清理上次遗留的过期会话
    app_state.auth_service.purge_expired_sessions().await;

    let app = routes::create_router(app_state);

    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制退出
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("deal-reports {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: deal-reports [命令]");
    println!();
    println!("命令:");
    println!("  (无)                          启动 HTTP 服务");
    println!("  migrate                       执行数据库迁移后退出");
    println!("  set-role <username> <role>    设置用户角色 (Viewer, Admin, Owner)");
    println!("  --version                     打印版本信息并退出");
    println!("  --help                        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 REPORTS_ 前缀的环境变量完成");
    println!("  可用选项请参考 .env.example");
}
