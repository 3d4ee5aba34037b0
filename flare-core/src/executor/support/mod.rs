//! 内置线程池形态。

pub mod cached;
pub mod eager;
pub mod fixed;
pub mod limited;

pub use cached::CachedThreadPool;
pub use eager::EagerThreadPool;
pub use fixed::FixedThreadPool;
pub use limited::LimitedThreadPool;
