/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod ascii;

mod engine;
pub(crate) use engine::FtpTransferEngine;

mod line;
pub(crate) use line::FtpLineDataTransfer;

/// Representation type, as set by the TYPE command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpTransferType {
    /// TYPE A, line endings are converted
    Ascii,
    /// TYPE I, bytes are copied unmodified
    Image,
}

impl FtpTransferType {
    pub fn from_binary(binary: bool) -> Self {
        if binary {
            FtpTransferType::Image
        } else {
            FtpTransferType::Ascii
        }
    }
}
