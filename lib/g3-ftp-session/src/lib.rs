/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod debug;
pub use debug::{FTP_DEBUG_LOG_LEVEL, FTP_DEBUG_LOG_TARGET};

mod config;
pub use config::{FtpClientConfig, FtpControlConfig, FtpTransferConfig};

mod error;
pub use error::{
    FtpCommandError, FtpConnectError, FtpNegotiationError, FtpReplyError, FtpSessionError,
    FtpTransferError, FtpTransferIoError,
};

mod io;
mod time_val;

mod connection;
pub use connection::{FtpConnectionProvider, FtpStream, TcpConnectionProvider};

mod control;
pub use control::{FtpCommand, FtpReply, FtpReplyClass, FtpReplyParser};

mod data;
pub use data::{FtpDataChannelDescriptor, FtpDataChannelMode};

mod transfer;
pub use transfer::FtpTransferType;

mod local;
pub use local::{FsLocalStore, FtpLocalStore};

mod option;
pub use option::{FtpOptionValue, FtpRuntimeOption};

mod session;
pub use session::{FtpSession, FtpSessionState, TcpFtpSession};

#[cfg(test)]
mod testing;
