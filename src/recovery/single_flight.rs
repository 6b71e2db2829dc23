//! 按集合的单飞锁
//!
//! 同一集合同一时间只允许一个备份在写；拿不到锁的调用直接跳过，不排队。
//! 守卫在 drop 时释放，错误路径同样会释放。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<DashMap<String, ()>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用 `key`；已被占用时返回 None
    pub fn try_acquire(&self, key: &str) -> Option<FlightGuard> {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(FlightGuard {
                    in_flight: Arc::clone(&self.in_flight),
                    key: key.to_string(),
                })
            }
        }
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }
}

#[derive(Debug)]
pub struct FlightGuard {
    in_flight: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
