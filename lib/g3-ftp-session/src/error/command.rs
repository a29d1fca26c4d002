/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::FtpReplyError;
use crate::control::{FtpCommand, FtpReply};

#[derive(Debug, Error)]
pub enum FtpCommandError {
    #[error("unable to send command: {0:?}")]
    SendFailed(io::Error),
    #[error("timed out to send command {0}")]
    SendTimedOut(FtpCommand),
    #[error("unable to recv reply: {0}")]
    RecvFailed(#[from] FtpReplyError),
    #[error("command {0} issued while the previous reply is still pending")]
    ReplyPending(FtpCommand),
    #[error("line break is not allowed in parameter of command {0}")]
    InvalidParameter(FtpCommand),
    #[error("unexpected reply to {0}: {1}")]
    UnexpectedReply(FtpCommand, FtpReply),
    #[error("invalid reply syntax to {0}: {1}")]
    InvalidReplySyntax(FtpCommand, FtpReply),
    #[error("{0} is not available: {1}")]
    NotAvailable(FtpCommand, FtpReply),
}
