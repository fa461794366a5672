mod column_definition;
pub mod prepared;
pub mod query;
pub mod resultset;
pub mod utility;

pub use column_definition::ColumnDefinition;
pub use column_definition::ColumnDefinitionBytes;
pub use column_definition::ColumnDefinitionTail;
pub use column_definition::ColumnDefinitions;
pub use column_definition::ColumnTypeAndFlags;

/// Action returned by a result-set state machine, telling the driving loop
/// what I/O to perform before calling `step()` again.
pub enum Action<'buf> {
    /// Fill the given buffer with the next packet's payload.
    NeedPacket(&'buf mut Vec<u8>),
    /// Read `num_columns` column-definition packets, appending each as
    /// `[len: u32 native-endian][payload]` to `buffer_set.column_definition_buffer`,
    /// then call `step()` again.
    ReadColumnMetadata { num_columns: usize },
    /// The state machine has reached a terminal state.
    Finished,
}

/// Shared interface over [`query::Query`] and `prepared::Exec`, letting the
/// connection actor drive either the text or the binary protocol result-set
/// state machine with one generic loop instead of duplicating it per
/// protocol.
pub trait Step {
    fn step<'buf>(&mut self, buffer_set: &'buf mut crate::BufferSet) -> crate::error::Result<Action<'buf>>;
}

impl<H: crate::protocol::r#trait::TextResultSetHandler> Step for query::Query<'_, H> {
    fn step<'buf>(&mut self, buffer_set: &'buf mut crate::BufferSet) -> crate::error::Result<Action<'buf>> {
        query::Query::step(self, buffer_set)
    }
}

impl<H: crate::protocol::r#trait::BinaryResultSetHandler> Step for prepared::Exec<'_, '_, H> {
    fn step<'buf>(&mut self, buffer_set: &'buf mut crate::BufferSet) -> crate::error::Result<Action<'buf>> {
        prepared::Exec::step(self, buffer_set)
    }
}
