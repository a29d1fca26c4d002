/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::FtpControlChannel;
use crate::error::FtpCommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpCommand(&'static str);

impl FtpCommand {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

macro_rules! ftp_commands {
    (
        $(
            $(#[$docs:meta])*
            ($konst:ident, $phrase:expr);
        )+
    ) => {
        impl FtpCommand {
        $(
            $(#[$docs])*
            pub const $konst: FtpCommand = FtpCommand($phrase);
        )+
        }
    };
}

ftp_commands! {
    /// a fake command for greeting
    (GREETING, "-");
    (USER, "USER");
    (PASS, "PASS");
    (ACCT, "ACCT");
    (QUIT, "QUIT");
    (CWD, "CWD");
    (CDUP, "CDUP");
    (PWD, "PWD");
    (MKD, "MKD");
    (RMD, "RMD");
    (DELE, "DELE");
    (RNFR, "RNFR");
    (RNTO, "RNTO");
    (SITE_CHMOD, "SITE CHMOD");
    (SITE_EXEC, "SITE EXEC");
    (SIZE, "SIZE");
    (MDTM, "MDTM");
    (ALLO, "ALLO");
    (TYPE_A, "TYPE A");
    (TYPE_I, "TYPE I");
    (PASV, "PASV");
    (EPSV, "EPSV");
    (PORT, "PORT");
    (EPRT, "EPRT");
    (REST, "REST");
    (RETR, "RETR");
    (STOR, "STOR");
    (NLST, "NLST");
    (LIST, "LIST");
    /// recursive listing, not supported by all servers
    (LIST_R, "LIST -R");
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn send_all(&mut self, cmd: FtpCommand, buf: &[u8]) -> Result<(), FtpCommandError> {
        #[cfg(feature = "log-raw-io")]
        {
            if cmd == FtpCommand::PASS {
                crate::debug::log_cmd("PASS ****");
            } else {
                crate::debug::log_cmd(String::from_utf8_lossy(buf).trim_end());
            }
        }

        let write_all = async {
            self.stream.write_all(buf).await?;
            self.stream.flush().await?;
            Ok::<(), io::Error>(())
        };
        match tokio::time::timeout(self.config.command_timeout, write_all).await {
            Ok(Ok(_)) => {
                self.reply_pending = true;
                Ok(())
            }
            Ok(Err(e)) => Err(FtpCommandError::SendFailed(e)),
            Err(_) => Err(FtpCommandError::SendTimedOut(cmd)),
        }
    }

    pub(super) async fn send_cmd(&mut self, cmd: FtpCommand) -> Result<(), FtpCommandError> {
        if self.reply_pending {
            return Err(FtpCommandError::ReplyPending(cmd));
        }

        let len = cmd.0.len() + 2;
        let mut buf: Vec<u8> = Vec::with_capacity(len);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(cmd, buf.as_ref()).await
    }

    pub(super) async fn send_cmd1(
        &mut self,
        cmd: FtpCommand,
        param1: &str,
    ) -> Result<(), FtpCommandError> {
        if self.reply_pending {
            return Err(FtpCommandError::ReplyPending(cmd));
        }
        if memchr::memchr2(b'\r', b'\n', param1.as_bytes()).is_some() {
            return Err(FtpCommandError::InvalidParameter(cmd));
        }

        let len = cmd.0.len() + 1 + param1.len() + 2;
        let mut buf: Vec<u8> = Vec::with_capacity(len);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(param1.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(cmd, buf.as_ref()).await
    }

    pub(super) async fn send_cmd_opt(
        &mut self,
        cmd: FtpCommand,
        param1: Option<&str>,
    ) -> Result<(), FtpCommandError> {
        match param1 {
            Some(p) if !p.is_empty() => self.send_cmd1(cmd, p).await,
            _ => self.send_cmd(cmd).await,
        }
    }
}
