mod buffer;
pub mod connector;
pub mod constant;
pub mod error;
pub mod handler;
mod opts;
mod prepared;
pub mod protocol;
pub mod raw;
pub mod row_stream;

pub use buffer::BufferSet;
pub use connector::Connector;
pub use opts::Opts;
pub use prepared::PreparedStatement;
pub use row_stream::RowStream;

#[cfg(feature = "tokio")]
pub mod tokio;
