/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::FtpConnectionProvider;
use crate::local::FtpLocalStore;

/// Hand out prepared streams in order.
pub(crate) struct MockProvider<S> {
    control: Option<S>,
    data: VecDeque<S>,
    listen_addr: SocketAddr,
    listening: bool,
    data_addrs: Vec<SocketAddr>,
}

impl<S> Default for MockProvider<S> {
    fn default() -> Self {
        MockProvider {
            control: None,
            data: VecDeque::new(),
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000),
            listening: false,
            data_addrs: Vec::new(),
        }
    }
}

impl<S> MockProvider<S> {
    pub(crate) fn with_control(control: S) -> Self {
        MockProvider {
            control: Some(control),
            ..Default::default()
        }
    }

    pub(crate) fn push_data(&mut self, stream: S) {
        self.data.push_back(stream);
    }

    pub(crate) fn set_listen_addr(&mut self, addr: SocketAddr) {
        self.listen_addr = addr;
    }

    pub(crate) fn data_addrs(&self) -> &[SocketAddr] {
        &self.data_addrs
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listening
    }

    fn next_data(&mut self) -> io::Result<S> {
        self.data.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, "no data stream prepared")
        })
    }
}

#[async_trait]
impl<S> FtpConnectionProvider<S> for MockProvider<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    async fn new_control_connection(
        &mut self,
        _host: &str,
        _port: u16,
        _secure: bool,
    ) -> io::Result<S> {
        self.control.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, "no control stream prepared")
        })
    }

    async fn new_data_connection(&mut self, server_addr: SocketAddr) -> io::Result<S> {
        self.data_addrs.push(server_addr);
        self.next_data()
    }

    async fn listen_data_connection(&mut self) -> io::Result<SocketAddr> {
        self.listening = true;
        Ok(self.listen_addr)
    }

    async fn accept_data_connection(&mut self) -> io::Result<S> {
        self.listening = false;
        self.next_data()
    }

    fn release_data_connection(&mut self) {
        self.listening = false;
    }
}

type MemoryFiles = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Local store kept in memory.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    files: MemoryFiles,
}

impl MemoryStore {
    pub(crate) fn insert(&self, name: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
    }

    pub(crate) fn content(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }
}

pub(crate) struct MemorySink {
    name: String,
    files: MemoryFiles,
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut files = self.files.lock().unwrap();
        files
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl FtpLocalStore for MemoryStore {
    type Sink = MemorySink;
    type Source = Cursor<Vec<u8>>;

    async fn open_sink(&mut self, name: &str, offset: u64) -> io::Result<MemorySink> {
        self.files
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .resize(offset as usize, 0);
        Ok(MemorySink {
            name: name.to_string(),
            files: self.files.clone(),
        })
    }

    async fn open_source(&mut self, name: &str, offset: u64) -> io::Result<Cursor<Vec<u8>>> {
        let Some(content) = self.content(name) else {
            return Err(io::Error::new(io::ErrorKind::NotFound, name.to_string()));
        };
        let mut cursor = Cursor::new(content);
        cursor.set_position(offset);
        Ok(cursor)
    }
}
