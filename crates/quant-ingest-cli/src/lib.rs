//! # Quant Ingest CLI
//!
//! 日线采集系统的运维入口：建表、断点查看与清理、本地交易日历查询

pub mod app;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::{error, info};

use quant_ingest_core::logger::{setup_logging, LogConfig};
use quant_ingest_domain::DEFAULT_EXCHANGE;

use app::bootstrap::AppContext;
use app::commands;

#[derive(Parser, Debug)]
#[command(name = "quant-ingest", version, about = "A 股日线采集运维工具")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 检查数据库连接
    Health,
    /// 创建基础表结构，可同时为指定股票建日线表
    InitSchema {
        /// 逗号分隔的股票代码
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// 任务断点
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// 本地交易日历
    Calendar {
        #[command(subcommand)]
        action: CalendarAction,
    },
    /// 某只股票已落库的最新交易日
    LatestBar { symbol: String },
}

#[derive(Subcommand, Debug)]
pub enum CheckpointAction {
    Show { task_id: String },
    Clear { task_id: String },
}

#[derive(Subcommand, Debug)]
pub enum CalendarAction {
    /// 是否交易日
    Check {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long, default_value = DEFAULT_EXCHANGE)]
        exchange: String,
    },
    /// 上一个交易日
    Prev {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long, default_value = DEFAULT_EXCHANGE)]
        exchange: String,
    },
    /// 下一个交易日
    Next {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long, default_value = DEFAULT_EXCHANGE)]
        exchange: String,
    },
    /// 区间内的日历条目
    List {
        #[arg(value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(value_parser = parse_date_arg)]
        end: NaiveDate,
        #[arg(long, default_value = DEFAULT_EXCHANGE)]
        exchange: String,
        /// 只列出交易日
        #[arg(long)]
        trading_only: bool,
    },
}

fn parse_date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    quant_ingest_common::utils::parse_date(value).map_err(|e| e.to_string())
}

/// 应用初始化：加载 .env 并设置日志
pub fn app_init() -> Result<()> {
    dotenv().ok();
    setup_logging(&LogConfig::from_env())?;
    Ok(())
}

/// 执行一条命令，结束后关闭连接池
pub async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::connect().await?;

    let result = match cli.command {
        Command::Health => commands::health(&ctx).await,
        Command::InitSchema { symbols } => commands::init_schema(&ctx, &symbols).await,
        Command::Checkpoint { action } => match action {
            CheckpointAction::Show { task_id } => commands::show_checkpoint(&ctx, &task_id).await,
            CheckpointAction::Clear { task_id } => {
                commands::clear_checkpoint(&ctx, &task_id).await
            }
        },
        Command::Calendar { action } => commands::calendar(&ctx, action).await,
        Command::LatestBar { symbol } => commands::latest_bar(&ctx, &symbol).await,
    };

    if let Err(e) = &result {
        error!("❌ 命令执行失败: {}", e);
    }
    ctx.shutdown().await;
    info!("程序退出");
    result
}
