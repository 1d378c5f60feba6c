//! Key rotation, response caching, rate limiting and retry pipeline in
//! front of the paid upstream providers.

pub mod audit;
pub mod cache;
pub mod facade;
pub mod key_pool;
pub mod memory;
pub mod rate_limit;
pub mod retry;
pub mod security;

pub use audit::AuditLog;
pub use cache::{cache_key, CacheOperation, CacheScope, ResponseCache};
pub use facade::{Gateway, GatewayDeps};
pub use key_pool::{KeyPool, KeySelection};
pub use memory::{MemoryAuditLog, MemoryStore};
pub use rate_limit::RateLimiter;
pub use retry::{Execution, Orchestrator, RetryPolicy};
pub use security::{RequestDescriptor, SecurityFilter};
