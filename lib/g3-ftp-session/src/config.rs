/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpControlConfig {
    pub(crate) max_line_len: usize,
    pub(crate) max_multi_lines: usize,
    pub(crate) command_timeout: Duration,
}

impl Default for FtpControlConfig {
    fn default() -> Self {
        FtpControlConfig {
            max_line_len: 2048,
            max_multi_lines: 128,
            command_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FtpControlConfig {
    pub fn set_max_line_len(&mut self, len: usize) {
        self.max_line_len = len.max(16);
    }

    pub fn set_max_multi_lines(&mut self, lines: usize) {
        self.max_multi_lines = lines.max(2);
    }

    /// Set the default timeout for every control channel operation.
    ///
    /// This is the initial value of the `timeout-seconds` runtime option and
    /// is replaced by the timeout given to `FtpSession::connect`.
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        if !timeout.is_zero() {
            self.command_timeout = timeout;
        }
    }

    #[inline]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpTransferConfig {
    pub(crate) list_max_line_len: usize,
    pub(crate) list_max_entries: usize,
    pub(crate) buffer_size: usize,
    pub(crate) prefer_epsv: bool,
}

impl Default for FtpTransferConfig {
    fn default() -> Self {
        FtpTransferConfig {
            list_max_line_len: 2048,
            list_max_entries: 65536,
            buffer_size: 16 * 1024,
            prefer_epsv: false,
        }
    }
}

impl FtpTransferConfig {
    pub fn set_list_max_line_len(&mut self, len: usize) {
        self.list_max_line_len = len.max(16);
    }

    pub fn set_list_max_entries(&mut self, count: usize) {
        self.list_max_entries = count;
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size.max(512);
    }

    /// Try EPSV before PASV when negotiating a passive data channel.
    pub fn set_prefer_epsv(&mut self, prefer: bool) {
        self.prefer_epsv = prefer;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpClientConfig {
    pub control: FtpControlConfig,
    pub transfer: FtpTransferConfig,
    pub(crate) autoseek: bool,
}

impl Default for FtpClientConfig {
    fn default() -> Self {
        FtpClientConfig {
            control: FtpControlConfig::default(),
            transfer: FtpTransferConfig::default(),
            autoseek: true,
        }
    }
}

impl FtpClientConfig {
    /// Set the initial value of the `autoseek` runtime option.
    pub fn set_autoseek(&mut self, autoseek: bool) {
        self.autoseek = autoseek;
    }
}
