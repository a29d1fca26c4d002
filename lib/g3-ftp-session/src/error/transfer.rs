/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use crate::control::{FtpCommand, FtpReply};

/// Server side failure of a transfer.
#[derive(Debug, Error)]
pub enum FtpTransferError {
    #[error("{0} rejected by server: {1}")]
    StartRejected(FtpCommand, FtpReply),
    #[error("{0} not completed by server: {1}")]
    EndRejected(FtpCommand, FtpReply),
    #[error("restart rejected by server: {0}")]
    RestartRejected(FtpReply),
    #[error("too long listing line at line {0}")]
    ListLineTooLong(usize),
    #[error("too many listing entries")]
    ListTooManyEntries,
}

/// Byte stream failure on either side of a transfer.
#[derive(Debug, Error)]
pub enum FtpTransferIoError {
    #[error("data channel read failed: {0:?}")]
    DataReadFailed(io::Error),
    #[error("data channel write failed: {0:?}")]
    DataWriteFailed(io::Error),
    #[error("data channel timed out")]
    DataTimedOut,
    #[error("local open failed: {0:?}")]
    LocalOpenFailed(io::Error),
    #[error("local read failed: {0:?}")]
    LocalReadFailed(io::Error),
    #[error("local write failed: {0:?}")]
    LocalWriteFailed(io::Error),
    #[error("local seek failed: {0:?}")]
    LocalSeekFailed(io::Error),
}

#[derive(Debug, Error)]
pub(crate) enum FtpLineDataReadError {
    #[error("read failed: {0:?}")]
    ReadFailed(#[from] io::Error),
    #[error("read timed out")]
    ReadTimedOut,
    #[error("line {0} too long")]
    LineTooLong(usize),
    #[error("too many lines")]
    TooManyLines,
}
