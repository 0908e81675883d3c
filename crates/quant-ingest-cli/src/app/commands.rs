//! 运维命令

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use quant_ingest_core::database::health_check;
use quant_ingest_domain::Symbol;
use quant_ingest_infrastructure::{CalendarRepository, CheckpointStore, DailyBarRepository};

use super::bootstrap::AppContext;
use crate::CalendarAction;

pub async fn health(ctx: &AppContext) -> Result<()> {
    health_check(ctx.pool()).await?;
    println!("ok");
    Ok(())
}

pub async fn init_schema(ctx: &AppContext, symbols: &[String]) -> Result<()> {
    // 先校验全部代码，避免建了一半的表
    let symbols = symbols
        .iter()
        .map(|s| Symbol::new(s.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    ctx.storage.ensure_base_structure().await?;
    info!("✅ 基础表结构已就绪");

    for symbol in &symbols {
        let created = ctx.storage.ensure_entity_table(symbol).await?;
        info!(
            "日线表 {}: {}",
            symbol,
            if created { "新建" } else { "已存在" }
        );
    }
    Ok(())
}

pub async fn show_checkpoint(ctx: &AppContext, task_id: &str) -> Result<()> {
    let store = CheckpointStore::new(ctx.storage.clone());
    match store.load(task_id).await? {
        Some(checkpoint) => {
            println!("task_id: {}", checkpoint.task_id);
            println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        }
        None => println!("任务 {} 没有断点", task_id),
    }
    Ok(())
}

pub async fn clear_checkpoint(ctx: &AppContext, task_id: &str) -> Result<()> {
    let store = CheckpointStore::new(ctx.storage.clone());
    if store.delete(task_id).await? {
        info!("🗑 已删除任务 {} 的断点", task_id);
    } else {
        warn!("任务 {} 没有断点", task_id);
    }
    Ok(())
}

pub async fn calendar(ctx: &AppContext, action: CalendarAction) -> Result<()> {
    let repo = CalendarRepository::new(ctx.storage.clone());
    match action {
        CalendarAction::Check { date, exchange } => {
            let entry = repo
                .find(date, &exchange)
                .await?
                .ok_or_else(|| anyhow!("本地日历无 {} {} 的记录", exchange, date))?;
            println!(
                "{} {}: {}",
                exchange,
                date,
                if entry.is_trading_day { "交易日" } else { "非交易日" }
            );
        }
        CalendarAction::Prev { date, exchange } => {
            match repo.previous_trading_date(date, &exchange).await? {
                Some(prev) => println!("{}", prev),
                None => println!("本地日历中 {} 之前没有交易日", date),
            }
        }
        CalendarAction::Next { date, exchange } => {
            match repo.next_trading_date(date, &exchange).await? {
                Some(next) => println!("{}", next),
                None => println!("本地日历中 {} 之后没有交易日", date),
            }
        }
        CalendarAction::List {
            start,
            end,
            exchange,
            trading_only,
        } => {
            if start > end {
                return Err(anyhow!("开始日期 {} 晚于结束日期 {}", start, end));
            }
            let entries = repo.list(start, end, &exchange, trading_only).await?;
            for entry in &entries {
                println!(
                    "{}\t{}\t{}",
                    entry.trade_date,
                    entry.is_trading_day,
                    entry.holiday_name.as_deref().unwrap_or("")
                );
            }
            info!("共 {} 条", entries.len());
        }
    }
    Ok(())
}

pub async fn latest_bar(ctx: &AppContext, symbol: &str) -> Result<()> {
    let symbol = Symbol::new(symbol.trim())?;
    let bars = DailyBarRepository::new(ctx.storage.clone());
    match bars.latest_trade_date(&symbol).await? {
        Some(date) => println!("{} 最新交易日: {}", symbol, date),
        None => println!("{} 尚无日线数据", symbol),
    }
    Ok(())
}
