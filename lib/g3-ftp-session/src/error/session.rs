/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::{
    FtpCommandError, FtpConnectError, FtpLineDataReadError, FtpNegotiationError, FtpReplyError,
    FtpTransferError, FtpTransferIoError,
};
use crate::control::{FtpCommand, FtpReply};
use crate::option::FtpRuntimeOption;

pub(crate) enum FtpAuthStatus {
    LoggedIn,
    NeedPassword,
    NeedAccount(FtpReply),
}

#[derive(Debug, Error)]
pub enum FtpSessionError {
    #[error("connect error: {0}")]
    Connect(#[from] FtpConnectError),
    #[error("login failed: {0}")]
    Auth(FtpReply),
    #[error("command {0} failed: {1}")]
    Command(FtpCommand, FtpReply),
    #[error("navigation command {0} failed: {1}")]
    Navigation(FtpCommand, FtpReply),
    #[error("{0} result not available: {1}")]
    NotAvailable(FtpCommand, FtpReply),
    #[error("transfer failed: {0}")]
    Transfer(#[from] FtpTransferError),
    #[error("transfer io error: {0}")]
    Io(FtpTransferIoError),
    #[error("data channel negotiation failed: {0}")]
    Negotiation(FtpNegotiationError),
    #[error("malformed reply: {0}")]
    MalformedReply(FtpReplyError),
    #[error("protocol error: {0}")]
    Protocol(FtpCommandError),
    #[error("unsupported option {0}")]
    UnsupportedOption(String),
    #[error("invalid value for option {0}: {1}")]
    Validation(FtpRuntimeOption, &'static str),
    #[error("invalid time format {0}")]
    InvalidTimeFormat(String),
    #[error("timed out at stage '{0}'")]
    Timeout(&'static str),
    #[error("session is busy with another operation")]
    Busy,
    #[error("failed to close control connection: {0:?}")]
    Close(io::Error),
    #[error("session not connected")]
    NotConnected,
    #[error("session already connected")]
    AlreadyConnected,
    #[error("session not logged in")]
    NotAuthenticated,
    #[error("session closed")]
    Closed,
}

impl From<FtpCommandError> for FtpSessionError {
    fn from(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::RecvFailed(FtpReplyError::ReadTimedOut(stage)) => {
                FtpSessionError::Timeout(stage)
            }
            FtpCommandError::SendTimedOut(cmd) => FtpSessionError::Timeout(cmd.as_str()),
            FtpCommandError::RecvFailed(e) if e.is_malformed() => {
                FtpSessionError::MalformedReply(e)
            }
            FtpCommandError::UnexpectedReply(cmd, reply) => FtpSessionError::Command(cmd, reply),
            FtpCommandError::NotAvailable(cmd, reply) => FtpSessionError::NotAvailable(cmd, reply),
            _ => FtpSessionError::Protocol(e),
        }
    }
}

impl From<FtpNegotiationError> for FtpSessionError {
    fn from(e: FtpNegotiationError) -> Self {
        match e {
            FtpNegotiationError::CommandFailed(e) => FtpSessionError::from(e),
            _ => FtpSessionError::Negotiation(e),
        }
    }
}

impl From<FtpTransferIoError> for FtpSessionError {
    fn from(e: FtpTransferIoError) -> Self {
        match e {
            FtpTransferIoError::DataTimedOut => FtpSessionError::Timeout("data transfer"),
            _ => FtpSessionError::Io(e),
        }
    }
}

impl From<FtpLineDataReadError> for FtpSessionError {
    fn from(e: FtpLineDataReadError) -> Self {
        match e {
            FtpLineDataReadError::ReadFailed(e) => {
                FtpSessionError::Io(FtpTransferIoError::DataReadFailed(e))
            }
            FtpLineDataReadError::ReadTimedOut => FtpSessionError::Timeout("list data"),
            FtpLineDataReadError::LineTooLong(n) => {
                FtpSessionError::Transfer(FtpTransferError::ListLineTooLong(n))
            }
            FtpLineDataReadError::TooManyLines => {
                FtpSessionError::Transfer(FtpTransferError::ListTooManyEntries)
            }
        }
    }
}

impl FtpSessionError {
    pub(crate) fn from_auth(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::UnexpectedReply(_, reply) => FtpSessionError::Auth(reply),
            _ => FtpSessionError::from(e),
        }
    }

    pub(crate) fn from_navigation(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::UnexpectedReply(cmd, reply) => {
                FtpSessionError::Navigation(cmd, reply)
            }
            _ => FtpSessionError::from(e),
        }
    }

    pub(crate) fn from_transfer_start(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::UnexpectedReply(cmd, reply) => {
                FtpSessionError::Transfer(FtpTransferError::StartRejected(cmd, reply))
            }
            _ => FtpSessionError::from(e),
        }
    }

    pub(crate) fn from_transfer_end(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::UnexpectedReply(cmd, reply) => {
                FtpSessionError::Transfer(FtpTransferError::EndRejected(cmd, reply))
            }
            _ => FtpSessionError::from(e),
        }
    }

    /// The failure was detected on the client side before any network io.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            FtpSessionError::UnsupportedOption(_)
                | FtpSessionError::Validation(_, _)
                | FtpSessionError::InvalidTimeFormat(_)
                | FtpSessionError::Busy
                | FtpSessionError::NotConnected
                | FtpSessionError::AlreadyConnected
                | FtpSessionError::NotAuthenticated
                | FtpSessionError::Closed
        )
    }

    /// The server answered with a negative reply, the session is still usable.
    pub fn is_server_rejection(&self) -> bool {
        match self {
            FtpSessionError::Auth(_)
            | FtpSessionError::Command(_, _)
            | FtpSessionError::Navigation(_, _)
            | FtpSessionError::NotAvailable(_, _) => true,
            FtpSessionError::Transfer(e) => !matches!(
                e,
                FtpTransferError::ListLineTooLong(_) | FtpTransferError::ListTooManyEntries
            ),
            _ => false,
        }
    }
}
