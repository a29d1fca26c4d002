/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::FtpConnectionProvider;
use crate::control::{FtpCommand, FtpControlChannel};
use crate::error::{FtpCommandError, FtpNegotiationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpDataChannelMode {
    /// the client connects to the server
    Passive,
    /// the server connects back to the client
    Active,
}

/// The negotiated endpoint of a data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpDataChannelDescriptor {
    mode: FtpDataChannelMode,
    addr: SocketAddr,
}

impl FtpDataChannelDescriptor {
    #[inline]
    pub fn mode(&self) -> FtpDataChannelMode {
        self.mode
    }

    /// Server endpoint in passive mode, local endpoint in active mode.
    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for FtpDataChannelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            FtpDataChannelMode::Passive => write!(f, "passive {}", self.addr),
            FtpDataChannelMode::Active => write!(f, "active {}", self.addr),
        }
    }
}

/// A data channel for exactly one transfer.
pub(crate) enum FtpDataChannel<S> {
    Connected(FtpDataChannelDescriptor, S),
    Listening(FtpDataChannelDescriptor),
}

impl<S> FtpDataChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) async fn negotiate<CP>(
        control: &mut FtpControlChannel<S>,
        provider: &mut CP,
        passive: bool,
        prefer_epsv: bool,
        timeout: Duration,
    ) -> Result<Self, FtpNegotiationError>
    where
        CP: FtpConnectionProvider<S> + Send,
    {
        if passive {
            Self::negotiate_passive(control, provider, prefer_epsv, timeout).await
        } else {
            Self::negotiate_active(control, provider).await
        }
    }

    async fn request_passive(
        control: &mut FtpControlChannel<S>,
        cmd: FtpCommand,
    ) -> Result<SocketAddr, FtpCommandError> {
        if cmd == FtpCommand::EPSV {
            let port = control.request_epsv_port().await?;
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
        } else {
            control.request_pasv_port().await
        }
    }

    async fn negotiate_passive<CP>(
        control: &mut FtpControlChannel<S>,
        provider: &mut CP,
        prefer_epsv: bool,
        timeout: Duration,
    ) -> Result<Self, FtpNegotiationError>
    where
        CP: FtpConnectionProvider<S> + Send,
    {
        let (first, second) = if prefer_epsv {
            (FtpCommand::EPSV, FtpCommand::PASV)
        } else {
            (FtpCommand::PASV, FtpCommand::EPSV)
        };

        let addr = match Self::request_passive(control, first).await {
            Ok(addr) => addr,
            Err(FtpCommandError::UnexpectedReply(cmd, reply))
                if matches!(reply.code(), 500 | 502 | 522) =>
            {
                crate::log_msg!("{cmd} not supported: {reply}, fallback to {second}");
                Self::request_passive(control, second).await?
            }
            Err(e) => return Err(e.into()),
        };

        let stream = match tokio::time::timeout(timeout, provider.new_data_connection(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(FtpNegotiationError::ConnectFailed(e)),
            Err(_) => return Err(FtpNegotiationError::ConnectTimedOut),
        };

        let descriptor = FtpDataChannelDescriptor {
            mode: FtpDataChannelMode::Passive,
            addr,
        };
        Ok(FtpDataChannel::Connected(descriptor, stream))
    }

    async fn negotiate_active<CP>(
        control: &mut FtpControlChannel<S>,
        provider: &mut CP,
    ) -> Result<Self, FtpNegotiationError>
    where
        CP: FtpConnectionProvider<S> + Send,
    {
        let addr = provider
            .listen_data_connection()
            .await
            .map_err(FtpNegotiationError::ListenFailed)?;

        let r = match addr {
            SocketAddr::V4(v4) => control.request_port(v4).await,
            SocketAddr::V6(_) => control.request_eprt(addr).await,
        };
        if let Err(e) = r {
            provider.release_data_connection();
            return Err(e.into());
        }

        let descriptor = FtpDataChannelDescriptor {
            mode: FtpDataChannelMode::Active,
            addr,
        };
        Ok(FtpDataChannel::Listening(descriptor))
    }

    pub(crate) fn descriptor(&self) -> &FtpDataChannelDescriptor {
        match self {
            FtpDataChannel::Connected(d, _) => d,
            FtpDataChannel::Listening(d) => d,
        }
    }

    /// Give up the channel without transfer.
    pub(crate) fn release<CP>(self, provider: &mut CP)
    where
        CP: FtpConnectionProvider<S> + Send,
    {
        if let FtpDataChannel::Listening(_) = self {
            provider.release_data_connection();
        }
    }

    /// Get the data stream, should be called after the preliminary reply.
    pub(crate) async fn establish<CP>(
        self,
        provider: &mut CP,
        timeout: Duration,
    ) -> Result<S, FtpNegotiationError>
    where
        CP: FtpConnectionProvider<S> + Send,
    {
        match self {
            FtpDataChannel::Connected(_, stream) => Ok(stream),
            FtpDataChannel::Listening(_) => {
                match tokio::time::timeout(timeout, provider.accept_data_connection()).await {
                    Ok(Ok(stream)) => Ok(stream),
                    Ok(Err(e)) => Err(FtpNegotiationError::AcceptFailed(e)),
                    Err(_) => Err(FtpNegotiationError::AcceptTimedOut),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use tokio_test::io::Builder;

    use crate::FtpControlConfig;
    use crate::testing::MockProvider;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn control(mock: tokio_test::io::Mock) -> FtpControlChannel<tokio_test::io::Mock> {
        let mut control = FtpControlChannel::new(mock, FtpControlConfig::default());
        control.wait_greetings().await.unwrap();
        control
    }

    #[tokio::test]
    async fn pasv_fallback_to_epsv() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"PASV\r\n")
            .read(b"502 not implemented\r\n")
            .write(b"EPSV\r\n")
            .read(b"229 Entering Extended Passive Mode (|||6446|)\r\n")
            .build();
        let mut control = control(mock).await;
        let mut provider = MockProvider::default();
        provider.push_data(Builder::new().build());

        let channel = FtpDataChannel::negotiate(&mut control, &mut provider, true, false, TIMEOUT)
            .await
            .unwrap();
        let descriptor = *channel.descriptor();
        assert_eq!(descriptor.mode(), FtpDataChannelMode::Passive);
        assert_eq!(descriptor.addr().port(), 6446);
        assert!(descriptor.addr().ip().is_unspecified());
        assert_eq!(provider.data_addrs(), &[descriptor.addr()]);
    }

    #[tokio::test]
    async fn epsv_rejected() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"EPSV\r\n")
            .read(b"425 can't open data connection\r\n")
            .build();
        let mut control = control(mock).await;
        let mut provider = MockProvider::<tokio_test::io::Mock>::default();

        let e = FtpDataChannel::negotiate(&mut control, &mut provider, true, true, TIMEOUT)
            .await
            .err()
            .unwrap();
        match e {
            FtpNegotiationError::Rejected(cmd, reply) => {
                assert_eq!(cmd, FtpCommand::EPSV);
                assert_eq!(reply.code(), 425);
            }
            e => panic!("unexpected error {e}"),
        }
    }

    #[tokio::test]
    async fn active_port() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"PORT 10,0,0,2,4,1\r\n")
            .read(b"200 PORT command successful\r\n")
            .build();
        let mut control = control(mock).await;
        let mut provider = MockProvider::default();
        provider.set_listen_addr(SocketAddr::from_str("10.0.0.2:1025").unwrap());
        provider.push_data(Builder::new().read(b"data").build());

        let channel = FtpDataChannel::negotiate(&mut control, &mut provider, false, false, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(channel.descriptor().mode(), FtpDataChannelMode::Active);
        assert!(provider.is_listening());
        let mut stream = channel.establish(&mut provider, TIMEOUT).await.unwrap();
        assert!(!provider.is_listening());

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut buf)
            .await
            .unwrap();
        assert_eq!(buf, b"data");
    }

    #[tokio::test]
    async fn port_rejected() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"EPRT |2|::1|6446|\r\n")
            .read(b"522 network protocol not supported\r\n")
            .build();
        let mut control = control(mock).await;
        let mut provider = MockProvider::<tokio_test::io::Mock>::default();
        provider.set_listen_addr(SocketAddr::from_str("[::1]:6446").unwrap());

        let e = FtpDataChannel::negotiate(&mut control, &mut provider, false, false, TIMEOUT)
            .await
            .err()
            .unwrap();
        match e {
            FtpNegotiationError::Rejected(cmd, reply) => {
                assert_eq!(cmd, FtpCommand::EPRT);
                assert_eq!(reply.code(), 522);
            }
            e => panic!("unexpected error {e}"),
        }
        assert!(!provider.is_listening());
    }
}
