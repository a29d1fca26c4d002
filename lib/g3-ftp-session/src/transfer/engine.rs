/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::FtpTransferType;
use super::ascii::{AsciiDecoder, AsciiEncoder};
use crate::error::FtpTransferIoError;

pub(crate) struct FtpTransferEngine {
    transfer_type: FtpTransferType,
    buffer_size: usize,
    io_timeout: Duration,
    transferred: u64,
}

impl FtpTransferEngine {
    pub(crate) fn new(
        transfer_type: FtpTransferType,
        buffer_size: usize,
        io_timeout: Duration,
    ) -> Self {
        FtpTransferEngine {
            transfer_type,
            buffer_size,
            io_timeout,
            transferred: 0,
        }
    }

    /// Bytes written to the local sink or read from the local source.
    #[inline]
    pub(crate) fn transferred(&self) -> u64 {
        self.transferred
    }

    async fn write_local<W>(&mut self, sink: &mut W, buf: &[u8]) -> Result<(), FtpTransferIoError>
    where
        W: AsyncWrite + Unpin,
    {
        if buf.is_empty() {
            return Ok(());
        }
        sink.write_all(buf)
            .await
            .map_err(FtpTransferIoError::LocalWriteFailed)?;
        self.transferred += buf.len() as u64;
        Ok(())
    }

    pub(crate) async fn download<R, W>(
        &mut self,
        data: &mut R,
        sink: &mut W,
    ) -> Result<(), FtpTransferIoError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let mut out = Vec::<u8>::with_capacity(self.buffer_size);
        let mut decoder = AsciiDecoder::default();

        loop {
            let nr = tokio::time::timeout(self.io_timeout, data.read(&mut buf))
                .await
                .map_err(|_| FtpTransferIoError::DataTimedOut)?
                .map_err(FtpTransferIoError::DataReadFailed)?;

            out.clear();
            if nr == 0 {
                if self.transfer_type == FtpTransferType::Ascii {
                    decoder.finish(&mut out);
                    self.write_local(sink, &out).await?;
                }
                break;
            }

            match self.transfer_type {
                FtpTransferType::Image => self.write_local(sink, &buf[..nr]).await?,
                FtpTransferType::Ascii => {
                    decoder.decode(&buf[..nr], &mut out);
                    self.write_local(sink, &out).await?;
                }
            }
        }

        sink.flush()
            .await
            .map_err(FtpTransferIoError::LocalWriteFailed)
    }

    pub(crate) async fn upload<R, W>(
        &mut self,
        source: &mut R,
        data: &mut W,
    ) -> Result<(), FtpTransferIoError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let mut out = Vec::<u8>::with_capacity(self.buffer_size * 2);
        let mut encoder = AsciiEncoder::default();

        loop {
            let nr = source
                .read(&mut buf)
                .await
                .map_err(FtpTransferIoError::LocalReadFailed)?;
            if nr == 0 {
                break;
            }
            self.transferred += nr as u64;

            let to_send = match self.transfer_type {
                FtpTransferType::Image => &buf[..nr],
                FtpTransferType::Ascii => {
                    out.clear();
                    encoder.encode(&buf[..nr], &mut out);
                    &out[..]
                }
            };
            tokio::time::timeout(self.io_timeout, data.write_all(to_send))
                .await
                .map_err(|_| FtpTransferIoError::DataTimedOut)?
                .map_err(FtpTransferIoError::DataWriteFailed)?;
        }

        // the server detects the end of file by the close of data connection
        tokio::time::timeout(self.io_timeout, data.shutdown())
            .await
            .map_err(|_| FtpTransferIoError::DataTimedOut)?
            .map_err(FtpTransferIoError::DataWriteFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn download_image() {
        let mut data = Builder::new().read(b"ab\r\n").read(b"cd").build();
        let mut sink = Vec::new();
        let mut engine = FtpTransferEngine::new(FtpTransferType::Image, 1024, TIMEOUT);
        engine.download(&mut data, &mut sink).await.unwrap();
        assert_eq!(sink, b"ab\r\ncd");
        assert_eq!(engine.transferred(), 6);
    }

    #[tokio::test]
    async fn download_ascii() {
        let mut data = Builder::new()
            .read(b"line1\r")
            .read(b"\nline2\r\n")
            .build();
        let mut sink = Vec::new();
        let mut engine = FtpTransferEngine::new(FtpTransferType::Ascii, 1024, TIMEOUT);
        engine.download(&mut data, &mut sink).await.unwrap();
        assert_eq!(sink, b"line1\nline2\n");
        assert_eq!(engine.transferred(), 12);
    }

    #[tokio::test]
    async fn upload_ascii() {
        let mut data = Builder::new().write(b"a\r\nb\r\n").build();
        let mut source: &[u8] = b"a\nb\n";
        let mut engine = FtpTransferEngine::new(FtpTransferType::Ascii, 1024, TIMEOUT);
        engine.upload(&mut source, &mut data).await.unwrap();
        assert_eq!(engine.transferred(), 4);
    }

    #[tokio::test]
    async fn download_read_error() {
        let mut data = Builder::new()
            .read(b"part")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut sink = Vec::new();
        let mut engine = FtpTransferEngine::new(FtpTransferType::Image, 1024, TIMEOUT);
        let e = engine.download(&mut data, &mut sink).await.unwrap_err();
        assert!(matches!(e, FtpTransferIoError::DataReadFailed(_)));
        assert_eq!(engine.transferred(), 4);
    }

    #[tokio::test]
    async fn download_timed_out() {
        let mut data = Builder::new().wait(Duration::from_secs(2)).build();
        let mut sink = Vec::new();
        let mut engine =
            FtpTransferEngine::new(FtpTransferType::Image, 1024, Duration::from_millis(50));
        let e = engine.download(&mut data, &mut sink).await.unwrap_err();
        assert!(matches!(e, FtpTransferIoError::DataTimedOut));
    }
}
