/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::{FtpCommandError, FtpReplyError};
use crate::control::FtpReply;

#[derive(Debug, Error)]
pub enum FtpConnectError {
    #[error("connect failed: {0:?}")]
    ConnectIoError(io::Error),
    #[error("timed out to connect")]
    ConnectTimedOut,
    #[error("timed out to receive greetings")]
    GreetingTimedOut,
    #[error("greeting failed: {0}")]
    GreetingFailed(FtpCommandError),
    #[error("service not available: {0}")]
    ServiceNotAvailable(FtpReply),
    #[error("unexpected greeting: {0}")]
    UnexpectedGreeting(FtpReply),
}

impl From<FtpCommandError> for FtpConnectError {
    fn from(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::RecvFailed(FtpReplyError::ReadTimedOut(_)) => {
                FtpConnectError::GreetingTimedOut
            }
            FtpCommandError::UnexpectedReply(_, reply) => {
                if reply.code() == 421 {
                    FtpConnectError::ServiceNotAvailable(reply)
                } else {
                    FtpConnectError::UnexpectedGreeting(reply)
                }
            }
            _ => FtpConnectError::GreetingFailed(e),
        }
    }
}
