//! 股票代码值对象

use serde::{Deserialize, Serialize};
use std::fmt;

use quant_ingest_common::{IngestError, Result};

use super::identifier::validate_identifier;

pub const SYMBOL_LEN: usize = 6;

/// 股票代码值对象
///
/// 业务规则:
/// - 只允许字母和数字
/// - 固定 6 位（如 "600000"）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// 创建股票代码 (带验证)
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_identifier(&value)?;
        if value.len() != SYMBOL_LEN {
            return Err(IngestError::InvalidIdentifier(format!(
                "股票代码应为 {} 位, 实际: {}",
                SYMBOL_LEN, value
            )));
        }
        Ok(Self(value))
    }

    /// 获取代码字符串
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self> {
        Symbol::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_symbol() {
        let symbol = Symbol::new("600000").unwrap();
        assert_eq!(symbol.as_str(), "600000");
        assert_eq!(symbol.to_string(), "600000");
    }

    #[test]
    fn test_invalid_symbol() {
        // 含 SQL 片段
        assert!(matches!(
            Symbol::new("600000;DROP"),
            Err(IngestError::InvalidIdentifier(_))
        ));
        // 长度不对
        assert!(Symbol::new("60000").is_err());
        assert!(Symbol::new("6000001").is_err());
        // 空字符串
        assert!(Symbol::new("").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Symbol = serde_json::from_str("\"000001\"").unwrap();
        assert_eq!(ok.as_str(), "000001");
        assert!(serde_json::from_str::<Symbol>("\"00-001\"").is_err());
    }
}
