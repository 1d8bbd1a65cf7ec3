use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use newsradar::api::{ActivityParams, AdvanceResponse, TrendParams};
use newsradar::utils::logger;
use newsradar::{
    AppConfig, ArticleQuery, Dashboard, DashboardQuery, Database, IdentityProvider,
    StaticIdentity, UserId,
};

#[derive(Parser)]
#[command(name = "newsradar")]
#[command(about = "文章分类仪表盘：统计、趋势与文章列表", long_about = None)]
struct Cli {
    /// 当前用户，用于"上次访问以来的新文章"
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// 参考时刻 (RFC 3339)，默认当前时间
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化配置和数据库
    Init,
    /// 汇总计数
    Stats,
    /// 按日/周/月分桶的分类趋势
    Trend {
        #[arg(short, long)]
        days: Option<u32>,
        /// day | week | month
        #[arg(short, long)]
        bucket: Option<String>,
    },
    /// 每日发布数与分类数
    Activity {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// 文章列表
    Articles {
        /// all | threat | opportunity | neutral | backlog | starred | today | user_uploaded
        #[arg(short, long)]
        filter: Option<String>,
        /// classification | title | date_published | source
        #[arg(short, long)]
        sort: Option<String>,
        /// asc | desc | none
        #[arg(long)]
        dir: Option<String>,
        #[arg(short, long)]
        page: Option<usize>,
        /// 正整数或 all
        #[arg(long)]
        page_size: Option<String>,
    },
    /// 查看单篇文章
    Article {
        #[arg(long)]
        id: i64,
    },
    /// 收藏或取消收藏
    Star {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        off: bool,
    },
    /// 把上次访问时间推进到现在
    AdvanceVisit,
    /// 完整加载一次仪表盘
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();
    info!("newsradar 启动");

    let cli = Cli::parse();
    let app_config = AppConfig::load()?;

    match cli.command {
        Commands::Init => init_command(&app_config).await?,
        command => {
            let identity = StaticIdentity::new(
                cli.user
                    .or_else(|| app_config.dashboard.default_user.clone())
                    .and_then(UserId::new),
            );
            run_command(command, &app_config, &identity, cli.now).await?
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    app_config: &AppConfig,
    identity: &dyn IdentityProvider,
    now: Option<DateTime<Utc>>,
) -> Result<()> {
    let db = Database::new(&app_config.database_url(), app_config.storage.max_connections).await?;
    let dashboard = Dashboard::new(db, app_config.dashboard.clone())?;
    let clock = match now {
        Some(now) => dashboard.clock_at(now),
        None => dashboard.clock(),
    };
    let user = identity.current_user();

    match command {
        Commands::Init => init_command(app_config).await?,
        Commands::Stats => print_json(&dashboard.stats(&clock, user.as_ref()).await?)?,
        Commands::Trend { days, bucket } => {
            let params = TrendParams { days, bucket };
            print_json(&dashboard.trend(&clock, &params).await?)?
        }
        Commands::Activity { days } => {
            print_json(&dashboard.activity(&clock, &ActivityParams { days }).await?)?
        }
        Commands::Articles {
            filter,
            sort,
            dir,
            page,
            page_size,
        } => {
            let query = ArticleQuery {
                filter,
                sort,
                dir,
                page,
                page_size,
            };
            print_json(&dashboard.articles(&clock, &query).await?)?
        }
        Commands::Article { id } => {
            let article = dashboard.article(id).await?;
            if article.is_none() {
                info!("文章不存在: {}", id);
            }
            print_json(&article)?
        }
        Commands::Star { id, off } => {
            let found = dashboard.set_starred(id, !off).await?;
            print_json(&AdvanceResponse { success: found })?
        }
        Commands::AdvanceVisit => {
            print_json(&dashboard.advance_visit(&clock, user.as_ref()).await?)?
        }
        Commands::Dashboard => {
            let snapshot = dashboard
                .load(&clock, user.as_ref(), &DashboardQuery::default())
                .await?;
            print_json(&snapshot)?
        }
    }

    Ok(())
}

async fn init_command(app_config: &AppConfig) -> Result<()> {
    info!("初始化系统...");

    tokio::fs::create_dir_all("config").await?;
    if let Some(parent) = std::path::Path::new(&app_config.storage.database_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    app_config.save("config/settings.toml")?;
    info!("已生成配置文件: config/settings.toml");

    let db_url = app_config.database_url();
    info!("正在初始化数据库: {}", db_url);
    let db = Database::new(&db_url, app_config.storage.max_connections).await?;
    db.init_schema().await?;

    info!("✅ 系统初始化完成！");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
