//! 流水线配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PlayerError, Result};
use crate::types::RateMode;

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 帧队列 ===
    pub input_capacity: usize,  // 解码 → 推理, 0 = 不限
    pub output_capacity: usize, // 推理 → 显示统计, 0 = 不限

    // === 结果缓存 (仅 Timed 模式) ===
    pub result_cache_capacity: usize,

    // === 推理线程 ===
    pub catchup_high_water: usize, // 积压超过该值开始追帧
    pub catchup_low_water: usize,  // 追帧直到积压降到该值
    pub timed_pop_timeout_ms: u64,
    pub continuous_idle_ms: u64,

    // === 播放 ===
    pub default_fps: f64, // 源未提供帧率时使用
    pub rate_mode: RateMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_capacity: 60,
            output_capacity: 30,
            result_cache_capacity: 100,
            catchup_high_water: 10,
            catchup_low_water: 5,
            timed_pop_timeout_ms: 100,
            continuous_idle_ms: 10,
            default_fps: 30.0,
            rate_mode: RateMode::Timed,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置; 文件不存在时写入默认值, 解析失败时使用默认值
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("✅ 配置已从 {} 加载", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("⚠️  配置无效: {}, 使用默认值", e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    log::warn!("⚠️  保存默认配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.tuning().validate()?;
        if self.result_cache_capacity == 0 {
            return Err(PlayerError::config("result_cache_capacity must be non-zero"));
        }
        if !(self.default_fps > 0.0) {
            return Err(PlayerError::config("default_fps must be positive"));
        }
        Ok(())
    }

    pub fn tuning(&self) -> InferenceTuning {
        InferenceTuning {
            high_water: self.catchup_high_water,
            low_water: self.catchup_low_water,
            pop_timeout: Duration::from_millis(self.timed_pop_timeout_ms),
            idle_sleep: Duration::from_millis(self.continuous_idle_ms),
        }
    }
}

/// 推理线程的帧选择参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InferenceTuning {
    pub high_water: usize,
    pub low_water: usize,
    pub pop_timeout: Duration,
    pub idle_sleep: Duration,
}

impl InferenceTuning {
    pub fn validate(&self) -> Result<()> {
        if self.low_water >= self.high_water {
            return Err(PlayerError::config(format!(
                "catchup_low_water ({}) must be below catchup_high_water ({})",
                self.low_water, self.high_water
            )));
        }
        Ok(())
    }
}

impl Default for InferenceTuning {
    fn default() -> Self {
        PipelineConfig::default().tuning()
    }
}
