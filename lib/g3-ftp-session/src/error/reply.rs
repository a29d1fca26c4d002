/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FtpReplyError {
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("line too long")]
    LineTooLong,
    #[error("invalid line format")]
    InvalidLineFormat,
    #[error("no reply code found")]
    MissingReplyCode,
    #[error("invalid reply code {0}")]
    InvalidReplyCode(u16),
    #[error("too many lines")]
    TooManyLines,
    #[error("connection closed before the end of multi-line reply")]
    UnterminatedReply,
    #[error("read reply for stage '{0}' timed out")]
    ReadTimedOut(&'static str),
}

impl FtpReplyError {
    /// The server sent something that is not a valid reply.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FtpReplyError::LineTooLong
                | FtpReplyError::InvalidLineFormat
                | FtpReplyError::MissingReplyCode
                | FtpReplyError::InvalidReplyCode(_)
                | FtpReplyError::TooManyLines
                | FtpReplyError::UnterminatedReply
        )
    }
}
