/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWrite};

/// Local side of named get and put.
#[async_trait]
pub trait FtpLocalStore {
    type Sink: AsyncWrite + Unpin + Send;
    type Source: AsyncRead + Unpin + Send;

    /// Open for download, existing content after `offset` should be discarded.
    async fn open_sink(&mut self, name: &str, offset: u64) -> io::Result<Self::Sink>;

    /// Open for upload, starting at `offset`.
    async fn open_source(&mut self, name: &str, offset: u64) -> io::Result<Self::Source>;
}

/// Local files, relative names are resolved against the base dir if set.
#[derive(Debug, Clone, Default)]
pub struct FsLocalStore {
    base_dir: Option<PathBuf>,
}

impl FsLocalStore {
    pub fn new(base_dir: PathBuf) -> Self {
        FsLocalStore {
            base_dir: Some(base_dir),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl FtpLocalStore for FsLocalStore {
    type Sink = File;
    type Source = File;

    async fn open_sink(&mut self, name: &str, offset: u64) -> io::Result<File> {
        let path = self.resolve(name);
        if offset == 0 {
            return File::create(path).await;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        file.set_len(offset).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(file)
    }

    async fn open_source(&mut self, name: &str, offset: u64) -> io::Result<File> {
        let mut file = File::open(self.resolve(name)).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn resume_offsets() {
        let dir = std::env::temp_dir().join(format!("g3-ftp-local-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let mut store = FsLocalStore::new(dir.clone());

        let mut sink = store.open_sink("a.txt", 0).await.unwrap();
        sink.write_all(b"0123456789").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        let mut sink = store.open_sink("a.txt", 4).await.unwrap();
        sink.write_all(b"ab").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);
        let content = tokio::fs::read(dir.join("a.txt")).await.unwrap();
        assert_eq!(content, b"0123ab");

        let mut source = store.open_source("a.txt", 2).await.unwrap();
        let mut buf = Vec::new();
        source.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"23ab");

        assert!(store.open_source("missing.txt", 0).await.is_err());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
