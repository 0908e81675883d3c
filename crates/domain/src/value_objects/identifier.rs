//! 动态标识符白名单
//!
//! 表名无法像值一样参数化，凡是来自外部输入、需要拼进 DDL/SQL 的片段都必须先过这里。

use quant_ingest_common::{IngestError, Result};

pub const MAX_IDENTIFIER_LEN: usize = 32;

/// 校验标识符片段：`^[A-Za-z0-9]{1,32}$`，原样返回
pub fn validate_identifier(token: &str) -> Result<&str> {
    if token.is_empty() || token.len() > MAX_IDENTIFIER_LEN {
        return Err(IngestError::InvalidIdentifier(format!(
            "长度必须在 1..={} 之间: {:?}",
            MAX_IDENTIFIER_LEN, token
        )));
    }
    if !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IngestError::InvalidIdentifier(format!(
            "只允许字母和数字: {:?}",
            token
        )));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_alphanumeric() {
        assert_eq!(validate_identifier("600000").unwrap(), "600000");
        assert_eq!(validate_identifier("SH600000").unwrap(), "SH600000");
    }

    #[test]
    fn test_rejects_injection_and_noise() {
        for bad in ["600000;DROP", "", "a b", "stock_daily", "60000\u{0}", "六零零"] {
            assert!(
                matches!(validate_identifier(bad), Err(IngestError::InvalidIdentifier(_))),
                "应拒绝 {:?}",
                bad
            );
        }
        let too_long = "A".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier(&too_long).is_err());
    }
}
