//! Bounded connection pool shared by the backends.
//!
//! Connections are opened lazily up to `max_size` and handed out through
//! [`PooledConnection`], which returns its connection on drop. A caller that
//! finds every connection checked out waits on a condition variable until
//! one comes back or the acquisition timeout passes.

use crate::config::PoolConfig;
use crate::error::{CensusError, Result};
use parking_lot::{Condvar, Mutex};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// Opens connections of one kind.
pub(crate) trait Connector: Send + Sync {
    type Connection: Send;

    fn connect(&self) -> Result<Self::Connection>;

    /// Whether a connection coming back to the pool must be discarded.
    fn is_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

struct PoolState<C> {
    idle: Vec<C>,
    /// Connections in existence, idle or checked out.
    open: u32,
}

pub(crate) struct ConnectionPool<M: Connector> {
    connector: M,
    state: Mutex<PoolState<M::Connection>>,
    returned: Condvar,
    max_size: u32,
    timeout: Duration,
}

impl<M: Connector> ConnectionPool<M> {
    /// Build a pool and open its first connection.
    ///
    /// Failing to open that connection means the backend is unreachable and
    /// is reported as [`CensusError::BackendUnavailable`].
    pub(crate) fn open(connector: M, config: &PoolConfig) -> Result<Self> {
        let first = connector.connect().map_err(|e| match e {
            CensusError::BackendUnavailable(_) => e,
            other => CensusError::BackendUnavailable(other.to_string()),
        })?;

        Ok(Self {
            connector,
            state: Mutex::new(PoolState {
                idle: vec![first],
                open: 1,
            }),
            returned: Condvar::new(),
            max_size: config.max_size.max(1),
            timeout: config.acquire_timeout(),
        })
    }

    /// Check out a connection, waiting up to the acquisition timeout.
    pub(crate) fn get(&self) -> Result<PooledConnection<'_, M>> {
        // A timeout too large to represent waits without a deadline.
        let deadline = Instant::now().checked_add(self.timeout);
        let mut state = self.state.lock();

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(self.wrap(conn));
            }

            if state.open < self.max_size {
                state.open += 1;
                drop(state);
                return match self.connector.connect() {
                    Ok(conn) => Ok(self.wrap(conn)),
                    Err(e) => {
                        self.release_slot();
                        Err(e)
                    }
                };
            }

            let timed_out = match deadline {
                Some(deadline) => self.returned.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.returned.wait(&mut state);
                    false
                }
            };
            if timed_out
                && state.idle.is_empty()
                && state.open >= self.max_size
            {
                log::warn!(
                    "no connection free after {:?} ({} in use)",
                    self.timeout,
                    state.open
                );
                return Err(CensusError::PoolExhausted(format!(
                    "all {} connections busy for {:?}",
                    self.max_size, self.timeout
                )));
            }
        }
    }

    /// (open, idle) connection counts.
    pub(crate) fn state(&self) -> (u32, u32) {
        let state = self.state.lock();
        (state.open, state.idle.len() as u32)
    }

    fn wrap(&self, conn: M::Connection) -> PooledConnection<'_, M> {
        PooledConnection {
            pool: self,
            conn: Some(conn),
        }
    }

    fn put_back(&self, mut conn: M::Connection) {
        if self.connector.is_broken(&mut conn) {
            log::debug!("discarding broken connection");
            drop(conn);
            self.release_slot();
            return;
        }
        self.state.lock().idle.push(conn);
        self.returned.notify_one();
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.open = state.open.saturating_sub(1);
        drop(state);
        self.returned.notify_one();
    }
}

/// A checked-out connection. Returned to the pool when dropped.
pub(crate) struct PooledConnection<'a, M: Connector> {
    pool: &'a ConnectionPool<M>,
    conn: Option<M::Connection>,
}

impl<M: Connector> Deref for PooledConnection<'_, M> {
    type Target = M::Connection;

    fn deref(&self) -> &M::Connection {
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl<M: Connector> DerefMut for PooledConnection<'_, M> {
    fn deref_mut(&mut self) -> &mut M::Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl<M: Connector> Drop for PooledConnection<'_, M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}
