pub mod pool;
pub mod retry;

pub use pool::{PoolConfig, WorkerPool};
pub use retry::RetryPolicy;
