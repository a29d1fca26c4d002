/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use rustls::ClientConfig;
use rustls_pki_types::ServerName;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;

use super::{FtpConnectionProvider, FtpStream};

/// Plain TCP transport, with implicit TLS if a rustls client config is set.
///
/// Data connections always go to the ip of the control connection peer,
/// unless `trust_pasv_ip` is enabled.
#[derive(Default)]
pub struct TcpConnectionProvider {
    bind_ip: Option<IpAddr>,
    trust_pasv_ip: bool,
    tls_config: Option<Arc<ClientConfig>>,
    tls_name: Option<ServerName<'static>>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    listener: Option<TcpListener>,
}

impl TcpConnectionProvider {
    pub fn set_bind_ip(&mut self, ip: IpAddr) {
        self.bind_ip = Some(ip);
    }

    pub fn set_trust_pasv_ip(&mut self, trust: bool) {
        self.trust_pasv_ip = trust;
    }

    pub fn set_tls_client_config(&mut self, config: Arc<ClientConfig>) {
        self.tls_config = Some(config);
    }

    async fn connect_tcp(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        if let Some(ip) = self.bind_ip {
            socket.bind(SocketAddr::new(ip, 0))?;
        }
        socket.connect(addr).await
    }

    async fn wrap_stream(&self, tcp: TcpStream) -> io::Result<FtpStream> {
        let Some(name) = &self.tls_name else {
            return Ok(FtpStream::Plain(tcp));
        };
        let Some(config) = &self.tls_config else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "no tls client config set",
            ));
        };
        let connector = TlsConnector::from(config.clone());
        let tls = connector.connect(name.clone(), tcp).await?;
        Ok(FtpStream::Tls(Box::new(tls)))
    }
}

#[async_trait]
impl FtpConnectionProvider<FtpStream> for TcpConnectionProvider {
    async fn new_control_connection(
        &mut self,
        host: &str,
        port: u16,
        secure: bool,
    ) -> io::Result<FtpStream> {
        self.tls_name = None;
        if secure {
            if self.tls_config.is_none() {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "no tls client config set",
                ));
            }
            let name = ServerName::try_from(host.to_string())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            self.tls_name = Some(name);
        }

        let mut last_err = None;
        for addr in tokio::net::lookup_host((host, port)).await? {
            match self.connect_tcp(addr).await {
                Ok(tcp) => {
                    let stream = self.wrap_stream(tcp).await?;
                    self.local_addr = Some(stream.tcp().local_addr()?);
                    self.peer_addr = Some(addr);
                    crate::log_msg!("control connection {} -> {addr} established", host);
                    return Ok(stream);
                }
                Err(e) => {
                    crate::log_msg!("failed to connect to {addr}: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address resolved for {host}"),
            )
        }))
    }

    async fn new_data_connection(&mut self, server_addr: SocketAddr) -> io::Result<FtpStream> {
        let Some(peer_addr) = self.peer_addr else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no control connection",
            ));
        };

        let addr = if self.trust_pasv_ip && !server_addr.ip().is_unspecified() {
            server_addr
        } else {
            SocketAddr::new(peer_addr.ip(), server_addr.port())
        };
        let tcp = self.connect_tcp(addr).await?;
        self.wrap_stream(tcp).await
    }

    async fn listen_data_connection(&mut self) -> io::Result<SocketAddr> {
        let Some(local_addr) = self.local_addr else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no control connection",
            ));
        };

        let listener = TcpListener::bind(SocketAddr::new(local_addr.ip(), 0)).await?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    async fn accept_data_connection(&mut self) -> io::Result<FtpStream> {
        let Some(listener) = self.listener.take() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no data listener",
            ));
        };

        let (tcp, peer) = listener.accept().await?;
        if let Some(control_peer) = self.peer_addr {
            if control_peer.ip() != peer.ip() {
                log::warn!(
                    "data connection from {peer} differs from control peer {}",
                    control_peer.ip()
                );
            }
        }
        self.wrap_stream(tcp).await
    }

    fn release_data_connection(&mut self) {
        if let Some(listener) = self.listener.take() {
            if let Ok(addr) = listener.local_addr() {
                crate::log_msg!("data listener {addr} released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn release_listener() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let mut provider = TcpConnectionProvider::default();
        let _control = provider
            .new_control_connection("127.0.0.1", port, false)
            .await
            .unwrap();
        let _peer = server.accept().await.unwrap();

        let addr = provider.listen_data_connection().await.unwrap();
        assert_eq!(addr.ip(), IpAddr::from([127u8, 0, 0, 1]));
        provider.release_data_connection();

        let e = TcpStream::connect(addr).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            provider.accept_data_connection().await,
            Err(e) if e.kind() == io::ErrorKind::NotConnected
        ));
    }
}
