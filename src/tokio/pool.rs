//! A bb8-style connection pool: a bounded set of [`Conn`]s checked out in
//! FIFO order, with idle/max-lifetime eviction done lazily on checkout and
//! proactively by a background reaper task.
//!
//! Checked-out, idle, and in-flight-dial connections are all accounted for
//! by one `active` counter behind the same lock as the idle queue, rather
//! than by a semaphore permit attached to each connection: a permit that
//! rode along with an idle connection would never be released by a normal
//! (non-discarding) check-in, so a blocked waiter would starve forever even
//! though a reusable connection just became available. Here, check-in always
//! wakes the oldest waiter in `waiters` — whether the connection was kept
//! idle or discarded — and that waiter simply re-examines `idle`/`active`
//! under the lock instead of being handed anything directly.

use std::collections::VecDeque;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::connector::{Connector, TcpConnector};
use crate::error::{Error, Result};

use super::conn::Conn;

/// Tunable pool parameters beyond `max_size`, mirroring bb8's `Builder`.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_size: usize,
    /// Connections idle longer than this are closed. `None` disables idle
    /// eviction.
    pub idle_timeout: Option<Duration>,
    /// Connections older than this are closed even if in active use by the
    /// time they are next released. `None` disables lifetime eviction.
    pub max_lifetime: Option<Duration>,
    /// How often the background reaper scans the idle queue.
    pub reap_interval: Duration,
}

impl PoolConfig {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Default::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            reap_interval: Duration::from_secs(30),
        }
    }
}

struct IdleEntry<C: Connector> {
    conn: Conn<C>,
    created_at: Instant,
    last_used_at: Instant,
}

/// A blocked `get()` call, woken with no payload: by the time it wakes, the
/// idle entry or freed slot it was woken about may already have been claimed
/// by someone else, so it just retries its own loop under the lock rather
/// than being handed a connection directly.
type Waiter = oneshot::Sender<()>;

struct Internals<C: Connector> {
    idle: VecDeque<IdleEntry<C>>,
    waiters: VecDeque<Waiter>,
    /// Connections that exist right now: checked out, idle, or in the
    /// middle of being dialed. Bounded by `PoolConfig::max_size`.
    active: usize,
    closed: bool,
}

impl<C: Connector> Internals<C> {
    fn wake_one(&mut self) {
        while let Some(tx) = self.waiters.pop_front() {
            if tx.send(()).is_ok() {
                return;
            }
            // That waiter's future was already dropped; try the next one.
        }
    }

    fn wake_all(&mut self) {
        while let Some(tx) = self.waiters.pop_front() {
            let _ = tx.send(());
        }
    }
}

/// A bounded pool of [`Conn`]s.
///
/// `get()` waits in FIFO order if the pool is at `max_size`, then reuses a
/// live idle connection or dials a fresh one. Checked-out connections are
/// returned to the idle queue on drop, optionally after a
/// `COM_RESET_CONNECTION` per [`crate::Opts::reset_connection`].
pub struct Pool<C: Connector = TcpConnector> {
    connector: C,
    config: PoolConfig,
    internals: Mutex<Internals<C>>,
}

/// Outcome of [`Pool::health_check`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthCheckReport {
    pub total_checked: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

impl Pool<TcpConnector> {
    pub fn new(opts: crate::Opts, max_size: usize) -> Arc<Self> {
        Self::with_connector(TcpConnector::new(opts), PoolConfig::new(max_size))
    }
}

impl<C: Connector> Pool<C> {
    pub fn with_connector(connector: C, config: PoolConfig) -> Arc<Self> {
        let pool = Arc::new(Self {
            connector,
            config,
            internals: Mutex::new(Internals {
                idle: VecDeque::new(),
                waiters: VecDeque::new(),
                active: 0,
                closed: false,
            }),
        });
        spawn_reaper(Arc::downgrade(&pool));
        pool
    }

    fn lock(&self) -> MutexGuard<'_, Internals<C>> {
        self.internals.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &IdleEntry<C>) -> bool {
        if let Some(max_lifetime) = self.config.max_lifetime {
            if entry.created_at.elapsed() > max_lifetime {
                return true;
            }
        }
        if let Some(idle_timeout) = self.config.idle_timeout {
            if entry.last_used_at.elapsed() > idle_timeout {
                return true;
            }
        }
        false
    }

    /// Pop the most recently released live idle entry from an
    /// already-locked `Internals`, discarding (and decrementing `active`
    /// for) any expired entries encountered along the way.
    fn pop_live_idle(&self, internals: &mut Internals<C>) -> Option<IdleEntry<C>> {
        while let Some(entry) = internals.idle.pop_back() {
            if self.is_expired(&entry) {
                internals.active -= 1;
                continue;
            }
            return Some(entry);
        }
        None
    }

    /// Check out a connection, waiting in FIFO order if the pool is at
    /// `max_size`. Idle entries past `idle_timeout`/`max_lifetime` are
    /// evicted lazily here (in addition to the background reaper); a dead
    /// one (failed ping) is silently replaced with a freshly dialed
    /// connection.
    pub async fn get(self: &Arc<Self>) -> Result<PooledConn<C>> {
        loop {
            enum Step<C: Connector> {
                Use(IdleEntry<C>),
                Dial,
                Wait(oneshot::Receiver<()>),
            }

            let step = {
                let mut internals = self.lock();
                if internals.closed {
                    return Err(Error::PoolClosed);
                }
                if let Some(entry) = self.pop_live_idle(&mut internals) {
                    Step::Use(entry)
                } else if internals.active < self.config.max_size {
                    internals.active += 1;
                    Step::Dial
                } else {
                    let (tx, rx) = oneshot::channel();
                    internals.waiters.push_back(tx);
                    Step::Wait(rx)
                }
            };

            match step {
                Step::Use(entry) => {
                    if entry.conn.ping().await.is_ok() {
                        return Ok(PooledConn {
                            pool: Arc::clone(self),
                            conn: ManuallyDrop::new(entry.conn),
                            created_at: entry.created_at,
                        });
                    }
                    // Dead connection: `active` already counts it, so free
                    // the slot before looping back to try again.
                    self.lock().active -= 1;
                }
                Step::Dial => match Conn::with_connector(self.connector.clone()).await {
                    Ok(conn) => {
                        return Ok(PooledConn {
                            pool: Arc::clone(self),
                            conn: ManuallyDrop::new(conn),
                            created_at: Instant::now(),
                        });
                    }
                    Err(err) => {
                        // Dial failed: free the slot we reserved and let the
                        // next waiter try it instead of us sitting on it.
                        let mut internals = self.lock();
                        internals.active -= 1;
                        internals.wake_one();
                        return Err(err);
                    }
                },
                Step::Wait(rx) => {
                    // Woken by a check-in or a discard; retry from the top
                    // under the lock rather than trusting why we woke.
                    let _ = rx.await;
                }
            }
        }
    }

    /// Ping every idle connection, evicting the ones that fail.
    pub async fn health_check(self: &Arc<Self>) -> HealthCheckReport {
        let entries: Vec<_> = {
            let mut internals = self.lock();
            internals.idle.drain(..).collect()
        };
        let mut report = HealthCheckReport::default();
        for entry in entries {
            report.total_checked += 1;
            if !self.is_expired(&entry) && entry.conn.ping().await.is_ok() {
                report.healthy += 1;
                self.lock().idle.push_back(entry);
            } else {
                report.unhealthy += 1;
                let mut internals = self.lock();
                internals.active -= 1;
                internals.wake_one();
            }
        }
        report
    }

    /// Reject all future `get()` calls, wake every waiter with
    /// `Error::PoolClosed`, and drop every idle connection. In-use
    /// connections are closed on their own release. Idempotent.
    pub fn close(self: &Arc<Self>) {
        let mut internals = self.lock();
        if internals.closed {
            return;
        }
        internals.closed = true;
        internals.active -= internals.idle.len();
        internals.idle.clear();
        internals.wake_all();
    }

    fn check_in(self: &Arc<Self>, conn: Conn<C>, created_at: Instant) {
        let pool = Arc::clone(self);
        let reset = pool.connector.opts().reset_connection;
        tokio::spawn(async move {
            let closed = pool.lock().closed;
            let kept = if closed {
                None
            } else if reset {
                conn.reset().await.ok().map(|()| conn)
            } else {
                Some(conn)
            };

            let mut internals = pool.lock();
            match kept {
                Some(conn) => {
                    let entry = IdleEntry {
                        conn,
                        created_at,
                        last_used_at: Instant::now(),
                    };
                    if internals.closed || pool.is_expired(&entry) {
                        internals.active -= 1;
                    } else {
                        internals.idle.push_back(entry);
                    }
                }
                None => {
                    internals.active -= 1;
                }
            }
            // Whether the connection was kept idle or discarded, a slot a
            // waiter could use now exists: hand off to the oldest one.
            internals.wake_one();
        });
    }
}

fn spawn_reaper<C: Connector>(pool: std::sync::Weak<Pool<C>>) {
    let interval = match pool.upgrade() {
        Some(p) => p.config.reap_interval,
        None => return,
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(pool) = pool.upgrade() else {
                return;
            };
            let mut internals = pool.lock();
            if internals.closed {
                return;
            }
            let before = internals.idle.len();
            internals.idle.retain(|entry| !pool.is_expired(entry));
            internals.active -= before - internals.idle.len();
        }
    });
}

/// A checked-out connection. Returns to the pool's idle queue on drop.
pub struct PooledConn<C: Connector = TcpConnector> {
    pool: Arc<Pool<C>>,
    conn: ManuallyDrop<Conn<C>>,
    created_at: Instant,
}

impl<C: Connector> Deref for PooledConn<C> {
    type Target = Conn<C>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<C: Connector> DerefMut for PooledConn<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl<C: Connector> Drop for PooledConn<C> {
    fn drop(&mut self) {
        // SAFETY: `conn` is never accessed again after this point.
        let conn = unsafe { ManuallyDrop::take(&mut self.conn) };
        self.pool.check_in(conn, self.created_at);
    }
}
