/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod reply;
pub use reply::FtpReplyError;

mod command;
pub use command::FtpCommandError;

mod connect;
pub use connect::FtpConnectError;

mod negotiation;
pub use negotiation::FtpNegotiationError;

mod transfer;
pub(crate) use transfer::FtpLineDataReadError;
pub use transfer::{FtpTransferError, FtpTransferIoError};

mod session;
pub(crate) use session::FtpAuthStatus;
pub use session::FtpSessionError;
