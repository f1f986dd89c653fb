//! 配置校验模块
//!
//! 校验规则：
//! - 字段约束 (`validator` derive)：prefix / 事件名非空，纠正窗口 > 0
//! - sink name 唯一
//! - udp sink 必须提供合法的 `addr`
//! - stuck / corrected 事件名不能相同

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, PipelineConfig, SinkType};
use validator::Validate;

/// 校验 PipelineConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &PipelineConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_storage(config)?;
    validate_watchdog(config)?;
    validate_sinks(config)?;
    Ok(())
}

/// 字段级约束
fn validate_fields(config: &PipelineConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::config_validation("config", e.to_string()))
}

/// 校验存储配置
fn validate_storage(config: &PipelineConfig) -> Result<(), ContractError> {
    if let Some(path) = &config.storage.path {
        if path.as_os_str().is_empty() {
            return Err(ContractError::config_validation(
                "storage.path",
                "path cannot be empty; omit it for an in-memory store",
            ));
        }
    }
    Ok(())
}

/// 校验 watchdog 配置
fn validate_watchdog(config: &PipelineConfig) -> Result<(), ContractError> {
    let watchdog = &config.watchdog;
    if watchdog.stuck_event == watchdog.corrected_event {
        return Err(ContractError::config_validation(
            "watchdog.corrected_event",
            format!(
                "corrected_event must differ from stuck_event ('{}')",
                watchdog.stuck_event
            ),
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(config: &PipelineConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in config.sinks.iter().enumerate() {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }

        if sink.sink_type == SinkType::Udp {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", idx),
                    "udp sink requires an 'addr' parameter",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", idx),
                    format!("invalid address '{}': {}", addr, e),
                )
            })?;
        }
    }
    Ok(())
}
