// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Accept loop for TCPROS publishers.
//!
//! ```text
//! +--------------------------------------------+
//! |              roswire-tcpros-accept          |
//! |  mio::Poll                                  |
//! |   - listener (LISTENER_TOKEN)  -> on_accept |
//! |   - waker    (WAKER_TOKEN)     -> stop      |
//! +--------------------------------------------+
//! ```
//!
//! Accepted streams are handed to the callback in blocking mode; the
//! callback owns them from then on.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Protocol, Socket, Type};

use crate::config::TransportConfig;
use crate::error::{Error, Result};

const LISTENER_TOKEN: Token = Token(0);
const WAKER_TOKEN: Token = Token(1);

/// Poll timeout; bounds how long a missed wakeup can delay shutdown.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

const MAX_EVENTS: usize = 16;

/// Bind a non-blocking listener with address reuse and the configured backlog.
pub(crate) fn bind_listener(config: &TransportConfig) -> io::Result<std::net::TcpListener> {
    let ip = config
        .listen_address
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let addr = SocketAddr::new(ip, 0);

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(config.listen_backlog)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Running accept thread.
pub(crate) struct AcceptLoop {
    local_addr: SocketAddr,
    waker: Arc<Waker>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AcceptLoop {
    /// Bind and start accepting; `on_accept` runs on the accept thread.
    pub(crate) fn spawn<F>(config: &TransportConfig, mut on_accept: F) -> Result<Self>
    where
        F: FnMut(std::net::TcpStream, SocketAddr) + Send + 'static,
    {
        let resource = |what: &str, e: io::Error| Error::Resource(format!("{}: {}", what, e));

        let std_listener = bind_listener(config).map_err(|e| resource("bind TCPROS listener", e))?;
        let local_addr = std_listener
            .local_addr()
            .map_err(|e| resource("listener address", e))?;
        let mut listener = TcpListener::from_std(std_listener);

        let poll = Poll::new().map_err(|e| resource("create poll", e))?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(|e| resource("register listener", e))?;
        let waker = Arc::new(
            Waker::new(poll.registry(), WAKER_TOKEN).map_err(|e| resource("create waker", e))?,
        );
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("roswire-tcpros-accept".to_string())
                .spawn(move || {
                    run(poll, listener, &running, &mut on_accept);
                })
                .map_err(|e| resource("spawn accept thread", e))?
        };

        log::debug!("[TCPROS] listening on {}", local_addr);
        Ok(Self {
            local_addr,
            waker,
            running,
            thread: Some(thread),
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the thread and close the listener. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            log::debug!("[TCPROS] accept waker failed: {}", e);
        }
        if let Some(handle) = self.thread.take() {
            // The accept thread never calls back into shutdown.
            if handle.join().is_err() {
                log::warn!("[TCPROS] accept thread panicked");
            }
            log::debug!("[TCPROS] stopped listening on {}", self.local_addr);
        }
    }
}

impl Drop for AcceptLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F>(mut poll: Poll, listener: TcpListener, running: &AtomicBool, on_accept: &mut F)
where
    F: FnMut(std::net::TcpStream, SocketAddr),
{
    let mut events = Events::with_capacity(MAX_EVENTS);

    while running.load(Ordering::Acquire) {
        if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if e.kind() != io::ErrorKind::Interrupted {
                log::warn!("[TCPROS] poll error: {}", e);
            }
            continue;
        }

        for event in events.iter() {
            if event.token() == LISTENER_TOKEN {
                accept_pending(&listener, running, on_accept);
            }
            // WAKER_TOKEN: fall through to the running check.
        }
    }
}

fn accept_pending<F>(listener: &TcpListener, running: &AtomicBool, on_accept: &mut F)
where
    F: FnMut(std::net::TcpStream, SocketAddr),
{
    loop {
        match listener.accept() {
            Ok((stream, remote_addr)) => {
                if !running.load(Ordering::Acquire) {
                    return;
                }
                let stream = std::net::TcpStream::from(stream);
                if let Err(e) = stream.set_nonblocking(false) {
                    log::warn!("[TCPROS] dropping {}: {}", remote_addr, e);
                    continue;
                }
                log::debug!("[TCPROS] accepted {}", remote_addr);
                on_accept(stream, remote_addr);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("[TCPROS] accept error: {}", e);
                return;
            }
        }
    }
}
