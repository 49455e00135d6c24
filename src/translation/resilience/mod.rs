//! 远程资源的故障隔离与重试
//!
//! 调用方以 `breaker.call(|| retry.execute(op))` 的方式组合两者：
//! 熔断器打开时整个重试序列被跳过，一次耗尽的重试序列只计为一次失败。

pub mod breaker;
pub mod retry;

pub use breaker::{
    BackendBreakerStorage, BreakerConfig, BreakerError, BreakerSnapshot, BreakerState,
    BreakerStorage, CircuitBreaker, MemoryBreakerStorage,
};
pub use retry::{RetryConfig, RetryPolicy};
