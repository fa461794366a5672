mod conn;
mod pool;
pub mod stream;
mod transaction;

pub use conn::{CommandHandle, Conn};
pub use pool::{HealthCheckReport, Pool, PoolConfig, PooledConn};
pub use stream::Stream;
pub use transaction::Transaction;
