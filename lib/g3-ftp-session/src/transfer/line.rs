/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use tokio::io::{AsyncRead, BufReader};

use crate::config::FtpTransferConfig;
use crate::error::FtpLineDataReadError;
use crate::io::LimitedBufReadExt;

/// Read the line based data of LIST and NLST.
pub(crate) struct FtpLineDataTransfer<T: AsyncRead> {
    io: BufReader<T>,
    max_lines: usize,
    max_line_len: usize,
    io_timeout: Duration,
    keep_empty: bool,
}

impl<T> FtpLineDataTransfer<T>
where
    T: AsyncRead + Unpin,
{
    pub(crate) fn new(io: T, config: &FtpTransferConfig, io_timeout: Duration) -> Self {
        FtpLineDataTransfer {
            io: BufReader::new(io),
            max_lines: config.list_max_entries,
            max_line_len: config.list_max_line_len,
            io_timeout,
            keep_empty: false,
        }
    }

    /// Keep empty lines except the ones at the end, LIST -R uses them as separators.
    pub(crate) fn keep_empty_lines(mut self) -> Self {
        self.keep_empty = true;
        self
    }

    /// Read all lines, with line endings stripped.
    pub(crate) async fn read_to_end(mut self) -> Result<Vec<String>, FtpLineDataReadError> {
        let mut lines: Vec<String> = Vec::new();
        let mut buf = Vec::with_capacity(self.max_line_len);

        loop {
            buf.clear();
            let (found, nr) = tokio::time::timeout(
                self.io_timeout,
                self.io
                    .limited_read_until(b'\n', self.max_line_len, &mut buf),
            )
            .await
            .map_err(|_| FtpLineDataReadError::ReadTimedOut)??;
            if nr == 0 {
                while lines.last().is_some_and(|s| s.is_empty()) {
                    lines.pop();
                }
                return Ok(lines);
            }
            if !found && nr >= self.max_line_len {
                return Err(FtpLineDataReadError::LineTooLong(lines.len() + 1));
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() && !self.keep_empty {
                continue;
            }
            if lines.len() >= self.max_lines {
                return Err(FtpLineDataReadError::TooManyLines);
            }
            lines.push(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn read_lines() {
        let data = Builder::new()
            .read(b"b.txt\r\na.t")
            .read(b"xt\r\n\r\nlast")
            .build();
        let lines = FtpLineDataTransfer::new(data, &FtpTransferConfig::default(), TIMEOUT)
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(lines, ["b.txt", "a.txt", "last"]);
    }

    #[tokio::test]
    async fn keep_separators() {
        let data = Builder::new()
            .read(b".:\r\nsub\r\n\r\n./sub:\r\n")
            .read(b"file\r\n\r\n")
            .build();
        let lines = FtpLineDataTransfer::new(data, &FtpTransferConfig::default(), TIMEOUT)
            .keep_empty_lines()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(lines, [".:", "sub", "", "./sub:", "file"]);
    }

    #[tokio::test]
    async fn too_many_lines() {
        let mut config = FtpTransferConfig::default();
        config.set_list_max_entries(2);
        let data = Builder::new().read(b"1\r\n2\r\n3\r\n").build();
        let e = FtpLineDataTransfer::new(data, &config, TIMEOUT)
            .read_to_end()
            .await
            .unwrap_err();
        assert!(matches!(e, FtpLineDataReadError::TooManyLines));
    }

    #[tokio::test]
    async fn line_too_long() {
        let mut config = FtpTransferConfig::default();
        config.set_list_max_line_len(16);
        let data = Builder::new()
            .read(b"short\r\n-rw-r--r-- 1 ftp ftp 4096 long-name.txt\r\n")
            .build();
        let e = FtpLineDataTransfer::new(data, &config, TIMEOUT)
            .read_to_end()
            .await
            .unwrap_err();
        assert!(matches!(e, FtpLineDataReadError::LineTooLong(2)));
    }
}
