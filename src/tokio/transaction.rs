use crate::connector::Connector;
use crate::error::{Error, Result};

use super::conn::Conn;

/// A handle to an open `BEGIN`/`COMMIT`/`ROLLBACK` block, produced by
/// [`Conn::transaction`].
///
/// Holds only the identity of the connection that opened it, so that
/// `commit`/`rollback` can reject being called against a different
/// connection.
pub struct Transaction {
    connection_identity: u64,
}

impl Transaction {
    pub(crate) fn new(connection_identity: u64) -> Self {
        Self { connection_identity }
    }

    fn check_connection<C: Connector>(&self, conn: &Conn<C>) -> Result<()> {
        if conn.identity() != self.connection_identity {
            return Err(Error::ConnectionMismatch {
                expected: self.connection_identity,
                actual: conn.identity(),
            });
        }
        Ok(())
    }

    /// Commit the transaction early. Any work after this call happens
    /// outside the transaction.
    pub async fn commit<C: Connector>(&self, conn: &mut Conn<C>) -> Result<()> {
        self.check_connection(conn)?;
        conn.query_drop("COMMIT").await?;
        conn.set_in_transaction(false);
        Ok(())
    }

    /// Roll back the transaction early. Any work after this call happens
    /// outside the transaction.
    pub async fn rollback<C: Connector>(&self, conn: &mut Conn<C>) -> Result<()> {
        self.check_connection(conn)?;
        conn.query_drop("ROLLBACK").await?;
        conn.set_in_transaction(false);
        Ok(())
    }
}
