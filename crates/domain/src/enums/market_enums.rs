use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use quant_ingest_common::IngestError;

/// 上市交易所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// 上海证券交易所
    SH,
    /// 深圳证券交易所
    SZ,
    /// 北京证券交易所
    BJ,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::SH => "SH",
            Market::SZ => "SZ",
            Market::BJ => "BJ",
        }
    }

    /// 根据代码首位推断市场：6→SH，0/3→SZ，8→BJ，其余按 SH 处理
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.chars().next() {
            Some('0') | Some('3') => Market::SZ,
            Some('8') => Market::BJ,
            _ => Market::SH,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SH" => Ok(Market::SH),
            "SZ" => Ok(Market::SZ),
            "BJ" => Ok(Market::BJ),
            other => Err(IngestError::validation(format!("未知市场: {}", other))),
        }
    }
}

/// 复权方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdjustMode {
    /// 不复权
    #[default]
    None,
    /// 前复权
    Forward,
    /// 后复权
    Backward,
}

impl AdjustMode {
    /// 落库编码 0:不复权 1:前复权 2:后复权
    pub fn code(&self) -> i16 {
        match self {
            AdjustMode::None => 0,
            AdjustMode::Forward => 1,
            AdjustMode::Backward => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, IngestError> {
        match code {
            0 => Ok(AdjustMode::None),
            1 => Ok(AdjustMode::Forward),
            2 => Ok(AdjustMode::Backward),
            other => Err(IngestError::validation(format!("未知复权编码: {}", other))),
        }
    }

    /// 数据源接口参数
    pub fn as_param(&self) -> &'static str {
        match self {
            AdjustMode::None => "",
            AdjustMode::Forward => "qfq",
            AdjustMode::Backward => "hfq",
        }
    }
}

impl FromStr for AdjustMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(AdjustMode::None),
            "qfq" | "forward" => Ok(AdjustMode::Forward),
            "hfq" | "backward" => Ok(AdjustMode::Backward),
            other => Err(IngestError::validation(format!("未知复权方式: {}", other))),
        }
    }
}
