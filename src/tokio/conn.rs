//! The connection actor: a dedicated task that owns the socket and drives the
//! wire protocol, reached through a cheaply-cloneable [`Conn`] handle.
//!
//! A MySQL connection can only have one command in flight at a time, so the
//! actor processes `Command`s from its channel one at a time, exactly
//! mirroring the protocol's own synchronous request/response discipline.
//! Handlers are captured in a boxed closure (`Job`) at the call site, so the
//! actor itself stays generic only over the [`Connector`] and never needs a
//! dyn-compatible handler trait to cross the channel.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use crate::buffer::BufferSet;
use crate::connector::{Connector, TcpConnector};
use crate::error::{Error, Result};
use crate::handler::{CancelGate, DropHandler, FirstRowHandler};
use crate::opts::Opts;
use crate::prepared::PreparedStatement;
use crate::protocol::command::prepared::Exec;
use crate::protocol::command::query::Query;
use crate::protocol::command::{Action, Step};
use crate::protocol::connection::{Handshake, HandshakeConfig, HandshakeResult};
use crate::protocol::packet::write_packet_header_array;
use crate::protocol::r#trait::params::Params;
use crate::protocol::r#trait::{BinaryResultSetHandler, TextResultSetHandler};
use crate::raw::{FromRawRow, RowCollector};
use crate::row_stream::{DEFAULT_HIGH_WATER_MARK, RowStream, RowStreamProducer, StreamStats};

static NEXT_CONNECTION_IDENTITY: AtomicU64 = AtomicU64::new(1);

type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
type Job<C> = Box<dyn for<'a> FnOnce(&'a mut Actor<C>) -> BoxFuture<'a> + Send>;

enum Command<C: Connector> {
    Run(Job<C>),
}

/// A handle to an in-flight command, returned by every `Conn` dispatch
/// method. Dropping it without calling `cancel()` simply waits for the
/// normal reply; calling `cancel()` requests early cancellation.
pub struct CommandHandle<T> {
    cancel_flag: Arc<AtomicBool>,
    cancel_notify: Arc<tokio::sync::Notify>,
    reply: oneshot::Receiver<Result<T>>,
    kill: Option<KillQuery>,
}

impl<T> CommandHandle<T> {
    /// Request cancellation. If the command has not yet started any I/O, it
    /// never will. If it is in flight and server-side cancellation is
    /// enabled, a side-channel `KILL QUERY` is dispatched in the background.
    /// Either way `wait()` resolves with `Error::Cancelled` right away; the
    /// actor keeps draining the command's remaining packets on its own.
    pub fn cancel(&mut self) {
        self.cancel_flag.store(true, Ordering::Release);
        self.cancel_notify.notify_waiters();
        if let Some(kill) = self.kill.take() {
            kill.spawn();
        }
    }

    /// Wait for the command's reply, or resolve immediately with
    /// `Error::Cancelled` the moment `cancel()` is accepted. The connection
    /// is not freed for reuse until the actor itself finishes draining the
    /// cancelled command — that happens in the background, independently of
    /// this future.
    pub async fn wait(mut self) -> Result<T> {
        if self.cancel_flag.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel_notify.notified() => Err(Error::Cancelled),
            result = &mut self.reply => {
                result.map_err(|_| Error::ConnectionError("connection actor task ended".into()))?
            }
        }
    }
}

impl<T: Send + 'static> std::future::IntoFuture for CommandHandle<T> {
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

/// Captures what a `KILL QUERY <id>` side-channel connection needs, built at
/// dispatch time and fired only if the caller actually cancels.
struct KillQuery {
    thread_id: u32,
    opts: Opts,
    timeout: Duration,
}

impl KillQuery {
    fn spawn(self) {
        tokio::spawn(async move {
            let connector = TcpConnector::new(self.opts.clone());
            let fut = async {
                let transport = connector.connect().await?;
                let mut stream = BufReader::new(transport);
                let mut buf = Vec::new();
                let config = HandshakeConfig::new(
                    self.opts.user.clone(),
                    self.opts.password.clone().unwrap_or_default(),
                    self.opts.db.clone(),
                );
                perform_handshake(&mut stream, &mut buf, config).await?;

                let sql = format!("KILL QUERY {}", self.thread_id);
                let mut out = vec![0u8; 4];
                crate::protocol::command::query::write_query(&mut out, &sql);
                write_payload(stream.get_mut(), &out[4..], 0).await?;
                read_payload(&mut stream, &mut buf).await?;
                Ok::<(), Error>(())
            };
            if let Err(err) = tokio::time::timeout(self.timeout, fut).await {
                tracing::warn!("KILL QUERY side-channel timed out: {err}");
            }
        });
    }
}

/// The connection actor's owned state: socket, buffers, and the session
/// facts learned during the handshake.
pub struct Actor<C: Connector> {
    stream: BufReader<C::Transport>,
    buffers: BufferSet,
    thread_id: u32,
    server_version: String,
    in_transaction: Arc<AtomicBool>,
}

impl<C: Connector> Actor<C> {
    async fn connect(connector: &C, in_transaction: Arc<AtomicBool>) -> Result<Self> {
        let transport = connector.connect().await?;
        let mut stream = BufReader::new(transport);
        let mut buf = Vec::new();
        let opts = connector.opts();
        let config = HandshakeConfig::new(
            opts.user.clone(),
            opts.password.clone().unwrap_or_default(),
            opts.db.clone(),
        );
        let (server_version, _capability_flags, thread_id) =
            perform_handshake(&mut stream, &mut buf, config).await?;

        Ok(Self {
            stream,
            buffers: BufferSet::with_initial_handshake(buf),
            thread_id,
            server_version,
            in_transaction,
        })
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command<C>>) {
        while let Some(Command::Run(job)) = rx.recv().await {
            job(&mut self).await;
        }
    }

    async fn write_command(&mut self, payload: &[u8]) -> Result<()> {
        write_payload(self.stream.get_mut(), payload, 0).await
    }
}

/// Feed the server's handshake packets into [`Handshake`] until it reports
/// `Connected`, writing each response packet in turn.
async fn perform_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    buf: &mut Vec<u8>,
    config: HandshakeConfig,
) -> Result<(String, crate::constant::CapabilityFlags, u32)> {
    let mut handshake = Handshake::with_config(config);
    read_payload(stream, buf).await?;
    loop {
        match handshake.drive(buf)? {
            HandshakeResult::Write(packet) => {
                if !packet.is_empty() {
                    write_payload(stream.get_mut(), &packet, 1).await?;
                }
                read_payload(stream, buf).await?;
            }
            HandshakeResult::Connected {
                server_version,
                capability_flags,
                connection_id,
            } => return Ok((server_version, capability_flags, connection_id)),
        }
    }
}

/// Write one MySQL command payload, splitting into 16MB chunks and
/// appending a trailing empty packet when the payload is an exact multiple
/// of the chunk size, per the wire protocol's continuation rule.
async fn write_payload<W: AsyncWrite + Unpin>(
    stream: &mut W,
    payload: &[u8],
    mut sequence_id: u8,
) -> Result<()> {
    let mut remaining = payload;
    loop {
        let chunk_size = remaining.len().min(0xFFFFFF);
        let (chunk, rest) = remaining.split_at(chunk_size);
        let header = write_packet_header_array(sequence_id, chunk_size);
        stream.write_all(&header).await?;
        stream.write_all(chunk).await?;
        sequence_id = sequence_id.wrapping_add(1);
        remaining = rest;
        if remaining.is_empty() {
            if chunk_size == 0xFFFFFF {
                continue;
            }
            break;
        }
    }
    stream.flush().await?;
    Ok(())
}

/// Read one complete MySQL payload, concatenating 16MB continuation packets.
async fn read_payload<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut Vec<u8>) -> Result<u8> {
    let mut header = [0u8; 4];
    buffer.clear();
    reader.read_exact(&mut header).await?;

    let mut length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    let sequence_id = header[3];

    loop {
        let start = buffer.len();
        buffer.resize(start + length, 0);
        reader.read_exact(&mut buffer[start..]).await?;
        if length != 0xFFFFFF {
            break;
        }
        reader.read_exact(&mut header).await?;
        length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    }

    Ok(sequence_id)
}

/// Drive a [`Step`] state machine to completion, checking `cancel_flag`
/// after every step (i.e. before the I/O that step asked for) and invoking
/// `on_cancel` exactly once the first time it is observed set.
async fn drive<C: Connector, S: Step>(
    stream: &mut BufReader<C::Transport>,
    buffers: &mut BufferSet,
    machine: &mut S,
    cancel_flag: &AtomicBool,
    mut on_cancel: impl FnMut(),
) -> Result<()> {
    let mut reported = false;
    loop {
        let action = machine.step(buffers)?;
        if !reported && cancel_flag.load(Ordering::Acquire) {
            reported = true;
            on_cancel();
        }
        match action {
            Action::NeedPacket(buf) => {
                read_payload(stream, buf).await?;
            }
            Action::ReadColumnMetadata { num_columns } => {
                buffers.column_definition_buffer.clear();
                for _ in 0..num_columns {
                    let mut packet = Vec::new();
                    read_payload(stream, &mut packet).await?;
                    buffers
                        .column_definition_buffer
                        .extend_from_slice(&(packet.len() as u32).to_ne_bytes());
                    buffers.column_definition_buffer.extend_from_slice(&packet);
                }
            }
            Action::Finished => return Ok(()),
        }
    }
}

/// Same as [`drive`], but flushes decoded rows into `producer` after every
/// step, giving true backpressure: the push blocks on the bounded channel,
/// which in turn blocks the next packet read.
async fn drive_streaming<C: Connector, S: Step, T: Send + 'static>(
    stream: &mut BufReader<C::Transport>,
    buffers: &mut BufferSet,
    machine: &mut S,
    pending: &Mutex<Vec<T>>,
    producer: &RowStreamProducer<T>,
    cancel_flag: &AtomicBool,
) -> Result<()> {
    loop {
        let action = machine.step(buffers)?;
        let rows: Vec<T> = {
            let mut guard = pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for row in rows {
            producer.push(row).await?;
        }
        if cancel_flag.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }
        match action {
            Action::NeedPacket(buf) => {
                read_payload(stream, buf).await?;
            }
            Action::ReadColumnMetadata { num_columns } => {
                buffers.column_definition_buffer.clear();
                for _ in 0..num_columns {
                    let mut packet = Vec::new();
                    read_payload(stream, &mut packet).await?;
                    buffers
                        .column_definition_buffer
                        .extend_from_slice(&(packet.len() as u32).to_ne_bytes());
                    buffers.column_definition_buffer.extend_from_slice(&packet);
                }
            }
            Action::Finished => return Ok(()),
        }
    }
}

/// A [`BinaryResultSetHandler`] that decodes each row into `T` and stashes it
/// in a shared buffer the driving loop drains after every step.
struct StreamRowHandler<T> {
    pending: Arc<Mutex<Vec<T>>>,
}

impl<T: for<'a> FromRawRow<'a>> BinaryResultSetHandler for StreamRowHandler<T> {
    fn no_result_set(&mut self, _ok: crate::protocol::response::OkPayloadBytes) -> Result<()> {
        Ok(())
    }

    fn resultset_start(&mut self, _cols: &[crate::protocol::command::ColumnDefinition<'_>]) -> Result<()> {
        Ok(())
    }

    fn row(
        &mut self,
        cols: &[crate::protocol::command::ColumnDefinition<'_>],
        row: crate::protocol::BinaryRowPayload<'_>,
    ) -> Result<()> {
        let decoded = T::from_raw_row(cols, row)?;
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(decoded);
        Ok(())
    }

    fn resultset_end(&mut self, _eof: crate::protocol::response::OkPayloadBytes) -> Result<()> {
        Ok(())
    }
}

/// A cloneable handle to a connection actor task.
///
/// Cloning is cheap (an `mpsc::Sender` clone); every clone dispatches
/// commands to the same underlying socket, which processes them strictly
/// one at a time, matching the protocol's own discipline.
pub struct Conn<C: Connector = TcpConnector> {
    tx: mpsc::Sender<Command<C>>,
    identity: u64,
    thread_id: u32,
    in_transaction: Arc<AtomicBool>,
    opts: Opts,
}

impl<C: Connector> Clone for Conn<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            identity: self.identity,
            thread_id: self.thread_id,
            in_transaction: Arc::clone(&self.in_transaction),
            opts: self.opts.clone(),
        }
    }
}

impl Conn<TcpConnector> {
    /// Connect using a `mysql://`/`mysqls://` URL. Use [`Conn::with_opts`]
    /// to connect from an already-built [`Opts`].
    pub async fn new(url: &str) -> Result<Self> {
        Self::with_opts(Opts::try_from(url)?).await
    }

    pub async fn with_opts(opts: Opts) -> Result<Self> {
        Self::with_connector(TcpConnector::new(opts)).await
    }
}

impl<C: Connector> Conn<C> {
    pub async fn with_connector(connector: C) -> Result<Self> {
        let opts = connector.opts().clone();
        let in_transaction = Arc::new(AtomicBool::new(false));
        let actor = Actor::connect(&connector, Arc::clone(&in_transaction)).await?;
        let thread_id = actor.thread_id();
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(actor.run(rx));
        Ok(Self {
            tx,
            identity: NEXT_CONNECTION_IDENTITY.fetch_add(1, Ordering::Relaxed),
            thread_id,
            in_transaction,
            opts,
        })
    }

    /// A stable identity for this logical connection, used by
    /// [`crate::tokio::Transaction`] to reject operations issued against a
    /// connection other than the one that opened it.
    pub fn identity(&self) -> u64 {
        self.identity
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_transaction(&self, value: bool) {
        self.in_transaction.store(value, Ordering::Release);
    }

    fn kill_query(&self) -> Option<KillQuery> {
        if !self.opts.enable_server_side_cancellation {
            return None;
        }
        Some(KillQuery {
            thread_id: self.thread_id,
            opts: self.opts.clone(),
            timeout: self.opts.kill_timeout,
        })
    }

    async fn dispatch<T, F>(&self, f: F) -> CommandHandle<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(
                &'a mut Actor<C>,
                &'a AtomicBool,
            ) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>
            + Send
            + 'static,
    {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let cancel_notify = Arc::new(tokio::sync::Notify::new());
        let (reply_tx, reply_rx) = oneshot::channel();
        let cf = Arc::clone(&cancel_flag);
        let job: Job<C> = Box::new(move |actor: &mut Actor<C>| {
            Box::pin(async move {
                let result = f(actor, &cf).await;
                let _ = reply_tx.send(result);
            })
        });
        if self.tx.send(Command::Run(job)).await.is_err() {
            let (dead_tx, dead_rx) = oneshot::channel();
            let _ = dead_tx.send(Err(Error::ConnectionError(
                "connection actor task has shut down".into(),
            )));
            return CommandHandle {
                cancel_flag,
                cancel_notify,
                reply: dead_rx,
                kill: None,
            };
        }
        CommandHandle {
            cancel_flag,
            cancel_notify,
            reply: reply_rx,
            kill: self.kill_query(),
        }
    }

    /// Run a text-protocol query, calling `handler` for every row, and
    /// return the handler once the command completes.
    pub async fn query<H>(&self, sql: impl Into<String>, mut handler: H) -> CommandHandle<H>
    where
        H: TextResultSetHandler + Send + 'static,
    {
        let sql = sql.into();
        self.dispatch(move |actor, cancel_flag| {
            Box::pin(async move {
                let out = actor.buffers.new_write_buffer();
                crate::protocol::command::query::write_query(out, &sql);
                let payload_len = actor.buffers.payload_len();
                let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                actor.write_command(&payload).await?;

                let mut gate = CancelGate::new(&mut handler, cancel_flag);
                let mut machine = Query::new(&mut gate);
                drive::<C, _>(&mut actor.stream, &mut actor.buffers, &mut machine, cancel_flag, || {}).await?;
                Ok(handler)
            })
        })
        .await
    }

    pub async fn query_drop(&self, sql: impl Into<String>) -> Result<()> {
        self.query(sql, DropHandler::default()).await.wait().await?;
        Ok(())
    }

    /// Prepare a statement via `COM_STMT_PREPARE`.
    pub async fn prepare(&self, sql: impl Into<String>) -> Result<PreparedStatement> {
        let sql = sql.into();
        self.dispatch(move |actor, _cancel_flag| {
            Box::pin(async move {
                let out = actor.buffers.new_write_buffer();
                crate::protocol::command::prepared::write_prepare(out, &sql);
                let payload_len = actor.buffers.payload_len();
                let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                actor.write_command(&payload).await?;

                read_payload(&mut actor.stream, &mut actor.buffers.read_buffer).await?;
                let ok = crate::protocol::command::prepared::read_prepare_ok(&actor.buffers.read_buffer)?;
                let stmt = PreparedStatement::new(ok.statement_id(), ok.num_params());
                let num_columns = ok.num_columns();
                // Parameter and initial column-definition packets: not yet
                // cached here, only populated once a real execution runs.
                for _ in 0..(stmt.num_params() as usize + num_columns as usize) {
                    let mut packet = Vec::new();
                    read_payload(&mut actor.stream, &mut packet).await?;
                }
                Ok(stmt)
            })
        })
        .await
        .wait()
        .await
    }

    /// Execute a prepared statement, calling `handler` for every row, and
    /// return the prepared statement (with any newly-cached column
    /// definitions) together with the handler.
    pub async fn exec<H, P>(
        &self,
        mut stmt: PreparedStatement,
        params: P,
        mut handler: H,
    ) -> CommandHandle<(PreparedStatement, H)>
    where
        H: BinaryResultSetHandler + Send + 'static,
        P: Params + Send + 'static,
    {
        self.dispatch(move |actor, cancel_flag| {
            Box::pin(async move {
                if stmt.is_closed() {
                    return Err(Error::PreparedStatementClosed);
                }
                let cache_metadata = stmt.column_definitions().is_some();
                let out = actor.buffers.new_write_buffer();
                crate::protocol::command::prepared::write_execute(out, stmt.id(), params)?;
                let payload_len = actor.buffers.payload_len();
                let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                actor.write_command(&payload).await?;

                let mut gate = CancelGate::new(&mut handler, cancel_flag);
                let mut machine = Exec::new(&mut gate, &mut stmt, cache_metadata);
                drive::<C, _>(&mut actor.stream, &mut actor.buffers, &mut machine, cancel_flag, || {}).await?;
                Ok((stmt, handler))
            })
        })
        .await
    }

    pub async fn exec_drop<P>(&self, stmt: PreparedStatement, params: P) -> Result<PreparedStatement>
    where
        P: Params + Send + 'static,
    {
        let (stmt, _) = self.exec(stmt, params, DropHandler::default()).await.wait().await?;
        Ok(stmt)
    }

    /// Execute a prepared statement and decode every row into `T`.
    pub async fn exec_collect<T, P>(&self, stmt: PreparedStatement, params: P) -> Result<(PreparedStatement, Vec<T>)>
    where
        T: for<'a> FromRawRow<'a> + Send + 'static,
        P: Params + Send + 'static,
    {
        let (stmt, collector) = self
            .exec(stmt, params, RowCollector::<T>::default())
            .await
            .wait()
            .await?;
        Ok((stmt, collector.into_rows()))
    }

    /// Execute a prepared statement and decode only the first row, if any.
    pub async fn exec_one<T, P>(&self, stmt: PreparedStatement, params: P) -> Result<(PreparedStatement, Option<T>)>
    where
        T: for<'a> FromRawRow<'a> + Send + 'static,
        P: Params + Send + 'static,
    {
        self.dispatch(move |actor, cancel_flag| {
            Box::pin(async move {
                if stmt.is_closed() {
                    return Err(Error::PreparedStatementClosed);
                }
                let cache_metadata = stmt.column_definitions().is_some();
                let out = actor.buffers.new_write_buffer();
                crate::protocol::command::prepared::write_execute(out, stmt.id(), params)?;
                let payload_len = actor.buffers.payload_len();
                let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                actor.write_command(&payload).await?;

                let mut stmt = stmt;
                let mut inner = RowCollector::<T>::default();
                let mut first = FirstRowHandler::new(&mut inner);
                let mut gate = CancelGate::new(&mut first, cancel_flag);
                let mut machine = Exec::new(&mut gate, &mut stmt, cache_metadata);
                drive::<C, _>(&mut actor.stream, &mut actor.buffers, &mut machine, cancel_flag, || {}).await?;
                let row = inner.into_rows().into_iter().next();
                Ok((stmt, row))
            })
        })
        .await
        .wait()
        .await
    }

    /// Execute a prepared statement, streaming rows through a backpressured
    /// channel instead of collecting them into a `Vec` up front.
    pub async fn stream_prepared<T, P>(&self, mut stmt: PreparedStatement, params: P) -> Result<RowStream<T>>
    where
        T: for<'a> FromRawRow<'a> + Send + 'static,
        P: Params + Send + 'static,
    {
        let (producer, mut consumer) = RowStream::new(DEFAULT_HIGH_WATER_MARK);
        let handle = self
            .dispatch(move |actor, cancel_flag| {
                Box::pin(async move {
                    if stmt.is_closed() {
                        producer.error(Error::PreparedStatementClosed).await;
                        return Ok(());
                    }
                    let cache_metadata = stmt.column_definitions().is_some();
                    let out = actor.buffers.new_write_buffer();
                    if let Err(e) =
                        crate::protocol::command::prepared::write_execute(out, stmt.id(), params)
                    {
                        producer.error(e).await;
                        return Ok(());
                    }
                    let payload_len = actor.buffers.payload_len();
                    let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                    if let Err(e) = actor.write_command(&payload).await {
                        producer.error(e).await;
                        return Ok(());
                    }

                    let pending = Arc::new(Mutex::new(Vec::new()));
                    let mut handler = StreamRowHandler {
                        pending: Arc::clone(&pending),
                    };
                    let result = {
                        let mut machine = Exec::new(&mut handler, &mut stmt, cache_metadata);
                        drive_streaming::<C, _, T>(
                            &mut actor.stream,
                            &mut actor.buffers,
                            &mut machine,
                            &pending,
                            &producer,
                            cancel_flag,
                        )
                        .await
                    };
                    match result {
                        Ok(()) => {
                            producer
                                .complete(StreamStats {
                                    server_thread_id: actor.thread_id(),
                                    ..Default::default()
                                })
                                .await;
                        }
                        Err(e) => producer.error(e).await,
                    }
                    Ok(())
                })
            })
            .await;

        consumer.on_cancel(move || {
            let mut handle = handle;
            handle.cancel();
        });
        Ok(consumer)
    }

    pub async fn close_statement(&self, mut stmt: PreparedStatement) -> Result<()> {
        self.dispatch(move |actor, _cancel_flag| {
            Box::pin(async move {
                let out = actor.buffers.new_write_buffer();
                crate::protocol::command::prepared::write_close_statement(out, stmt.id());
                let payload_len = actor.buffers.payload_len();
                let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                actor.write_command(&payload).await?;
                stmt.mark_closed();
                Ok(())
            })
        })
        .await
        .wait()
        .await
    }

    pub async fn ping(&self) -> Result<()> {
        self.dispatch(move |actor, _cancel_flag| {
            Box::pin(async move {
                let out = actor.buffers.new_write_buffer();
                crate::protocol::command::utility::write_ping(out);
                let payload_len = actor.buffers.payload_len();
                let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                actor.write_command(&payload).await?;
                read_payload(&mut actor.stream, &mut actor.buffers.read_buffer).await?;
                Ok(())
            })
        })
        .await
        .wait()
        .await
    }

    /// Issue `COM_RESET_CONNECTION`, clearing session state (but not the
    /// TCP connection) before the pool returns this connection to its idle
    /// queue.
    pub async fn reset(&self) -> Result<()> {
        let in_transaction = Arc::clone(&self.in_transaction);
        self.dispatch(move |actor, _cancel_flag| {
            Box::pin(async move {
                let out = actor.buffers.new_write_buffer();
                crate::protocol::command::utility::write_reset_connection(out);
                let payload_len = actor.buffers.payload_len();
                let payload = actor.buffers.write_buffer()[4..4 + payload_len].to_vec();
                actor.write_command(&payload).await?;
                read_payload(&mut actor.stream, &mut actor.buffers.read_buffer).await?;
                in_transaction.store(false, Ordering::Release);
                Ok(())
            })
        })
        .await
        .wait()
        .await
    }

    /// Run `f` inside a `BEGIN`/`COMMIT`/`ROLLBACK` block.
    ///
    /// The transaction is committed if `f` returns `Ok` and rolled back if
    /// it returns `Err`, unless `f` already called
    /// [`crate::tokio::Transaction::commit`] or
    /// [`crate::tokio::Transaction::rollback`] itself, in which case that
    /// outcome is left untouched.
    pub async fn transaction<F, Fut, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self, &crate::tokio::Transaction) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        if self.in_transaction() {
            return Err(Error::NestedTransaction);
        }

        self.query_drop("BEGIN").await?;
        self.set_in_transaction(true);
        let tx = crate::tokio::Transaction::new(self.identity());

        let result = f(self, &tx).await;

        if self.in_transaction() {
            match &result {
                Ok(_) => tx.commit(self).await?,
                Err(_) => tx.rollback(self).await?,
            }
        }

        result
    }
}

