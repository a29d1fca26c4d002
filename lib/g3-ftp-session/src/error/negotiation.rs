/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::FtpCommandError;
use crate::control::{FtpCommand, FtpReply};

#[derive(Debug, Error)]
pub enum FtpNegotiationError {
    #[error("{0} rejected by server: {1}")]
    Rejected(FtpCommand, FtpReply),
    #[error("invalid reply syntax to {0}: {1}")]
    InvalidReplySyntax(FtpCommand, FtpReply),
    #[error("control channel error: {0}")]
    CommandFailed(FtpCommandError),
    #[error("failed to connect to data port: {0:?}")]
    ConnectFailed(io::Error),
    #[error("timed out to connect to data port")]
    ConnectTimedOut,
    #[error("failed to listen for data connection: {0:?}")]
    ListenFailed(io::Error),
    #[error("failed to accept data connection: {0:?}")]
    AcceptFailed(io::Error),
    #[error("timed out to accept data connection")]
    AcceptTimedOut,
}

impl From<FtpCommandError> for FtpNegotiationError {
    fn from(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::UnexpectedReply(cmd, reply) => FtpNegotiationError::Rejected(cmd, reply),
            FtpCommandError::InvalidReplySyntax(cmd, reply) => {
                FtpNegotiationError::InvalidReplySyntax(cmd, reply)
            }
            _ => FtpNegotiationError::CommandFailed(e),
        }
    }
}
