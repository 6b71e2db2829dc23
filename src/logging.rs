//! 日志初始化
//!
//! 使用 tracing-subscriber 的 fmt 输出，`RUST_LOG` 优先于传入的默认级别。
//! 宿主应用已经安装了全局 subscriber 时不会覆盖。

use tracing_subscriber::EnvFilter;

/// 安装全局 subscriber；已存在时返回 false
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_noop() {
        let _ = init_tracing("info");
        assert!(!init_tracing("debug"));
    }
}
