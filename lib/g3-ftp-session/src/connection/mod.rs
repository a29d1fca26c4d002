/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

mod stream;
pub use stream::FtpStream;

mod tcp;
pub use tcp::TcpConnectionProvider;

/// Transport for the control and data connections of one session.
#[async_trait]
pub trait FtpConnectionProvider<S: AsyncRead + AsyncWrite> {
    async fn new_control_connection(&mut self, host: &str, port: u16, secure: bool)
    -> io::Result<S>;

    /// Connect to the passive endpoint advertised by the server.
    ///
    /// The ip of `server_addr` is unspecified if the server only gave a port.
    async fn new_data_connection(&mut self, server_addr: SocketAddr) -> io::Result<S>;

    /// Listen for the server to connect back, returns the address to advertise.
    async fn listen_data_connection(&mut self) -> io::Result<SocketAddr>;

    async fn accept_data_connection(&mut self) -> io::Result<S>;

    /// Drop the pending listener if the server will never connect back.
    fn release_data_connection(&mut self) {}
}
