/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};

use crate::FtpControlConfig;
use crate::error::{FtpAuthStatus, FtpCommandError};
use crate::transfer::FtpTransferType;

mod reply;
pub use reply::{FtpReply, FtpReplyClass, FtpReplyParser};

mod command;
pub use command::FtpCommand;

pub(crate) struct FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite,
{
    config: FtpControlConfig,
    stream: BufStream<T>,
    reply_pending: bool,
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: T, config: FtpControlConfig) -> Self {
        FtpControlChannel {
            config,
            stream: BufStream::new(stream),
            // the server speaks first
            reply_pending: true,
        }
    }

    pub(crate) fn set_command_timeout(&mut self, timeout: Duration) {
        self.config.set_command_timeout(timeout);
    }

    /// Send a command and wait for its final reply, whatever the code is.
    pub(crate) async fn send_command(
        &mut self,
        cmd: FtpCommand,
        param: Option<&str>,
    ) -> Result<FtpReply, FtpCommandError> {
        self.send_cmd_opt(cmd, param).await?;
        let reply = self.timed_read_reply(cmd.as_str()).await?;
        Ok(reply)
    }

    async fn expect_completion(
        &mut self,
        cmd: FtpCommand,
        param: Option<&str>,
    ) -> Result<FtpReply, FtpCommandError> {
        let reply = self.send_command(cmd, param).await?;
        if reply.is_completion() {
            Ok(reply)
        } else {
            Err(FtpCommandError::UnexpectedReply(cmd, reply))
        }
    }

    pub(crate) async fn wait_greetings(&mut self) -> Result<FtpReply, FtpCommandError> {
        loop {
            let reply = self.timed_read_reply("wait greetings").await?;
            return match reply.code() {
                120 => {
                    // service ready in nnn minutes
                    self.reply_pending = true;
                    continue;
                }
                220 => Ok(reply),
                _ => Err(FtpCommandError::UnexpectedReply(
                    FtpCommand::GREETING,
                    reply,
                )),
            };
        }
    }

    pub(crate) async fn send_username(
        &mut self,
        name: &str,
    ) -> Result<FtpAuthStatus, FtpCommandError> {
        let cmd = FtpCommand::USER;
        let reply = self.send_command(cmd, Some(name)).await?;
        match reply.code() {
            230 => Ok(FtpAuthStatus::LoggedIn),
            331 => Ok(FtpAuthStatus::NeedPassword),
            332 => Ok(FtpAuthStatus::NeedAccount(reply)),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn send_password(
        &mut self,
        pass: &str,
    ) -> Result<FtpAuthStatus, FtpCommandError> {
        let cmd = FtpCommand::PASS;
        self.send_cmd1(cmd, pass).await?;
        let reply = self.timed_read_reply("send password").await?;
        match reply.code() {
            202 | 230 => Ok(FtpAuthStatus::LoggedIn),
            332 => Ok(FtpAuthStatus::NeedAccount(reply)),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn send_account(&mut self, account: &str) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::ACCT;
        let reply = self.send_command(cmd, Some(account)).await?;
        match reply.code() {
            202 | 230 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn send_quit(&mut self) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::QUIT;
        let reply = self.send_command(cmd, None).await?;
        match reply.code() {
            221 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn change_dir(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.expect_completion(FtpCommand::CWD, Some(path)).await?;
        Ok(())
    }

    pub(crate) async fn change_to_parent(&mut self) -> Result<(), FtpCommandError> {
        self.expect_completion(FtpCommand::CDUP, None).await?;
        Ok(())
    }

    pub(crate) async fn print_working_dir(&mut self) -> Result<String, FtpCommandError> {
        let cmd = FtpCommand::PWD;
        let reply = self.send_command(cmd, None).await?;
        match reply.code() {
            257 => match reply.quoted_path() {
                Some(path) => Ok(path),
                None => Err(FtpCommandError::InvalidReplySyntax(cmd, reply)),
            },
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn make_dir(&mut self, path: &str) -> Result<String, FtpCommandError> {
        let reply = self.expect_completion(FtpCommand::MKD, Some(path)).await?;
        // not all servers echo the created path
        Ok(reply.quoted_path().unwrap_or_else(|| path.to_string()))
    }

    pub(crate) async fn remove_dir(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.expect_completion(FtpCommand::RMD, Some(path)).await?;
        Ok(())
    }

    pub(crate) async fn delete_file(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.expect_completion(FtpCommand::DELE, Some(path)).await?;
        Ok(())
    }

    pub(crate) async fn rename_from(&mut self, path: &str) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::RNFR;
        let reply = self.send_command(cmd, Some(path)).await?;
        match reply.code() {
            350 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn rename_to(&mut self, path: &str) -> Result<(), FtpCommandError> {
        self.expect_completion(FtpCommand::RNTO, Some(path)).await?;
        Ok(())
    }

    pub(crate) async fn site_chmod(&mut self, mode: u32, path: &str) -> Result<(), FtpCommandError> {
        let param = format!("{mode:o} {path}");
        self.expect_completion(FtpCommand::SITE_CHMOD, Some(&param))
            .await?;
        Ok(())
    }

    pub(crate) async fn site_exec(&mut self, command: &str) -> Result<FtpReply, FtpCommandError> {
        self.expect_completion(FtpCommand::SITE_EXEC, Some(command))
            .await
    }

    pub(crate) async fn request_allocate(&mut self, size: u64) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::ALLO;
        let reply = self.send_command(cmd, Some(&size.to_string())).await?;
        match reply.code() {
            200 | 202 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn request_size(&mut self, path: &str) -> Result<u64, FtpCommandError> {
        let cmd = FtpCommand::SIZE;
        let reply = self.send_command(cmd, Some(path)).await?;
        match reply.code() {
            213 => match reply.line_trimmed().and_then(|s| u64::from_str(s).ok()) {
                Some(size) => Ok(size),
                None => Err(FtpCommandError::InvalidReplySyntax(cmd, reply)),
            },
            500 | 502 | 504 | 550 => Err(FtpCommandError::NotAvailable(cmd, reply)),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn request_mtime(
        &mut self,
        path: &str,
    ) -> Result<DateTime<Utc>, FtpCommandError> {
        let cmd = FtpCommand::MDTM;
        let reply = self.send_command(cmd, Some(path)).await?;
        match reply.code() {
            213 => match reply.parse_mdtm_213() {
                Some(dt) => Ok(dt),
                None => Err(FtpCommandError::InvalidReplySyntax(cmd, reply)),
            },
            500 | 502 | 504 | 550 => Err(FtpCommandError::NotAvailable(cmd, reply)),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn request_transfer_type(
        &mut self,
        transfer_type: FtpTransferType,
    ) -> Result<(), FtpCommandError> {
        let cmd = match transfer_type {
            FtpTransferType::Ascii => FtpCommand::TYPE_A,
            FtpTransferType::Image => FtpCommand::TYPE_I,
        };
        let reply = self.send_command(cmd, None).await?;
        match reply.code() {
            200 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn request_pasv_port(&mut self) -> Result<SocketAddr, FtpCommandError> {
        let cmd = FtpCommand::PASV;
        let reply = self.send_command(cmd, None).await?;
        match reply.code() {
            227 => match reply.parse_pasv_227() {
                Some(addr) => Ok(addr),
                None => Err(FtpCommandError::InvalidReplySyntax(cmd, reply)),
            },
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn request_epsv_port(&mut self) -> Result<u16, FtpCommandError> {
        let cmd = FtpCommand::EPSV;
        let reply = self.send_command(cmd, None).await?;
        match reply.code() {
            229 => match reply.parse_epsv_229() {
                Some(port) => Ok(port),
                None => Err(FtpCommandError::InvalidReplySyntax(cmd, reply)),
            },
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn request_port(&mut self, addr: SocketAddrV4) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::PORT;
        let ip = addr.ip().octets();
        let port = addr.port();
        let param = format!(
            "{},{},{},{},{},{}",
            ip[0],
            ip[1],
            ip[2],
            ip[3],
            port >> 8,
            port & 0xFF
        );
        let reply = self.send_command(cmd, Some(&param)).await?;
        match reply.code() {
            200 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn request_eprt(&mut self, addr: SocketAddr) -> Result<(), FtpCommandError> {
        let cmd = FtpCommand::EPRT;
        let proto = if addr.is_ipv4() { 1 } else { 2 };
        let param = format!("|{proto}|{}|{}|", addr.ip(), addr.port());
        let reply = self.send_command(cmd, Some(&param)).await?;
        match reply.code() {
            200 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    /// Returns false if the server does not implement REST.
    pub(crate) async fn request_restart(&mut self, position: u64) -> Result<bool, FtpCommandError> {
        let cmd = FtpCommand::REST;
        let reply = self.send_command(cmd, Some(&position.to_string())).await?;
        match reply.code() {
            350 => Ok(true),
            500 | 502 | 504 => Ok(false),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    /// Send a data transfer command and wait for the preliminary reply.
    ///
    /// The final reply should be read by `wait_transfer_end` or `drain_reply`.
    pub(crate) async fn start_transfer(
        &mut self,
        cmd: FtpCommand,
        param: Option<&str>,
    ) -> Result<(), FtpCommandError> {
        let reply = self.send_command(cmd, param).await?;
        match reply.code() {
            125 | 150 => {
                self.reply_pending = true;
                Ok(())
            }
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    pub(crate) async fn wait_transfer_end(&mut self, cmd: FtpCommand) -> Result<(), FtpCommandError> {
        let reply = self.timed_read_reply("wait transfer end").await?;
        match reply.code() {
            226 | 250 => Ok(()),
            _ => Err(FtpCommandError::UnexpectedReply(cmd, reply)),
        }
    }

    /// Read and discard the pending reply, if any.
    pub(crate) async fn drain_reply(&mut self, stage: &'static str) -> Option<FtpReply> {
        if !self.reply_pending {
            return None;
        }
        match self.timed_read_reply(stage).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                crate::log_msg!("failed to drain reply at stage {stage}: {e}");
                None
            }
        }
    }

    pub(crate) async fn shutdown(&mut self) -> io::Result<()> {
        match self.stream.shutdown().await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FtpReplyError;
    use tokio_test::io::Builder;

    fn channel(mock: tokio_test::io::Mock) -> FtpControlChannel<tokio_test::io::Mock> {
        FtpControlChannel::new(mock, FtpControlConfig::default())
    }

    #[tokio::test]
    async fn greeting_with_delay() {
        let mock = Builder::new()
            .read(b"120 ready in 1 minute\r\n")
            .read(b"220-Welcome\r\n220 ready\r\n")
            .build();
        let mut control = channel(mock);
        let reply = control.wait_greetings().await.unwrap();
        assert_eq!(reply.code(), 220);
        assert_eq!(reply.lines(), &["Welcome", "ready"]);
    }

    #[tokio::test]
    async fn greeting_refused() {
        let mock = Builder::new().read(b"421 too many users\r\n").build();
        let mut control = channel(mock);
        let e = control.wait_greetings().await.unwrap_err();
        match e {
            FtpCommandError::UnexpectedReply(_, reply) => assert_eq!(reply.code(), 421),
            e => panic!("unexpected error {e}"),
        }
    }

    #[tokio::test]
    async fn pending_reply_blocks_command() {
        let mock = Builder::new().build();
        let mut control = channel(mock);
        let e = control.change_dir("/").await.unwrap_err();
        assert!(matches!(e, FtpCommandError::ReplyPending(FtpCommand::CWD)));
    }

    #[tokio::test]
    async fn line_break_in_parameter() {
        let mock = Builder::new().read(b"220 ok\r\n").build();
        let mut control = channel(mock);
        control.wait_greetings().await.unwrap();
        let e = control.delete_file("a\r\nDELE b").await.unwrap_err();
        assert!(matches!(e, FtpCommandError::InvalidParameter(FtpCommand::DELE)));
    }

    #[tokio::test]
    async fn login_and_pwd() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"USER alice\r\n")
            .read(b"331 need password\r\n")
            .write(b"PASS secret\r\n")
            .read(b"230 logged in\r\n")
            .write(b"PWD\r\n")
            .read(b"257 \"/home/alice\" is cwd\r\n")
            .build();
        let mut control = channel(mock);
        control.wait_greetings().await.unwrap();
        assert!(matches!(
            control.send_username("alice").await.unwrap(),
            FtpAuthStatus::NeedPassword
        ));
        assert!(matches!(
            control.send_password("secret").await.unwrap(),
            FtpAuthStatus::LoggedIn
        ));
        assert_eq!(control.print_working_dir().await.unwrap(), "/home/alice");
    }

    #[tokio::test]
    async fn size_not_available() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"SIZE missing.txt\r\n")
            .read(b"550 no such file\r\n")
            .write(b"SIZE a.txt\r\n")
            .read(b"213 1024\r\n")
            .build();
        let mut control = channel(mock);
        control.wait_greetings().await.unwrap();
        let e = control.request_size("missing.txt").await.unwrap_err();
        assert!(matches!(e, FtpCommandError::NotAvailable(FtpCommand::SIZE, _)));
        assert_eq!(control.request_size("a.txt").await.unwrap(), 1024);
    }

    #[tokio::test]
    async fn port_and_chmod_params() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"PORT 127,0,0,1,195,80\r\n")
            .read(b"200 ok\r\n")
            .write(b"EPRT |2|::1|6446|\r\n")
            .read(b"200 ok\r\n")
            .write(b"SITE CHMOD 644 a.txt\r\n")
            .read(b"200 ok\r\n")
            .build();
        let mut control = channel(mock);
        control.wait_greetings().await.unwrap();
        control
            .request_port(SocketAddrV4::from_str("127.0.0.1:50000").unwrap())
            .await
            .unwrap();
        control
            .request_eprt(SocketAddr::from_str("[::1]:6446").unwrap())
            .await
            .unwrap();
        control.site_chmod(0o644, "a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn transfer_reply_pending() {
        let mock = Builder::new()
            .read(b"220 ok\r\n")
            .write(b"RETR a.txt\r\n")
            .read(b"150 opening\r\n")
            .read(b"226 done\r\n")
            .build();
        let mut control = channel(mock);
        control.wait_greetings().await.unwrap();
        control
            .start_transfer(FtpCommand::RETR, Some("a.txt"))
            .await
            .unwrap();
        assert!(control.reply_pending);
        control.wait_transfer_end(FtpCommand::RETR).await.unwrap();
        assert!(!control.reply_pending);
        assert!(control.drain_reply("nothing").await.is_none());
    }

    #[tokio::test]
    async fn closed_in_multi_line() {
        let mock = Builder::new().read(b"220-Welcome\r\n").build();
        let mut control = channel(mock);
        let e = control.wait_greetings().await.unwrap_err();
        assert!(matches!(
            e,
            FtpCommandError::RecvFailed(FtpReplyError::UnterminatedReply)
        ));
    }

    #[tokio::test]
    async fn reply_line_too_long() {
        let mut config = FtpControlConfig::default();
        config.set_max_line_len(16);
        let mock = Builder::new()
            .read(b"220 a very long greeting line\r\n")
            .build();
        let mut control = FtpControlChannel::new(mock, config);
        let e = control.wait_greetings().await.unwrap_err();
        assert!(matches!(
            e,
            FtpCommandError::RecvFailed(FtpReplyError::LineTooLong)
        ));
    }
}
