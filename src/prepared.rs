use crate::protocol::command::{ColumnDefinition, ColumnDefinitions};

/// A prepared statement handle.
///
/// Column definitions are cached here after the first execution so that
/// subsequent `COM_STMT_EXECUTE` calls can skip re-reading metadata when the
/// server (MariaDB, with `MARIADB_CLIENT_CACHE_METADATA`) omits it.
pub struct PreparedStatement {
    id: u32,
    num_params: u16,
    column_definitions: Option<ColumnDefinitions>,
    closed: bool,
}

impl PreparedStatement {
    pub fn new(id: u32, num_params: u16) -> Self {
        Self {
            id,
            num_params,
            column_definitions: None,
            closed: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn num_params(&self) -> u16 {
        self.num_params
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn column_definitions(&self) -> Option<&[ColumnDefinition<'_>]> {
        self.column_definitions.as_ref().map(|defs| defs.definitions())
    }

    pub fn set_column_definitions(&mut self, defs: ColumnDefinitions) {
        self.column_definitions = Some(defs);
    }
}
