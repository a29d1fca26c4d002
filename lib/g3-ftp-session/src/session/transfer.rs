/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::SeekFrom;

use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite};

use super::{FtpSession, FtpSessionInner, authenticated_control};
use crate::config::FtpTransferConfig;
use crate::connection::FtpConnectionProvider;
use crate::control::{FtpCommand, FtpControlChannel};
use crate::data::FtpDataChannel;
use crate::error::{FtpCommandError, FtpSessionError, FtpTransferError, FtpTransferIoError};
use crate::local::FtpLocalStore;
use crate::transfer::{FtpLineDataTransfer, FtpTransferEngine, FtpTransferType};

async fn ensure_type<S>(
    control: &mut FtpControlChannel<S>,
    current: &mut Option<FtpTransferType>,
    wanted: FtpTransferType,
) -> Result<(), FtpSessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if *current == Some(wanted) {
        return Ok(());
    }
    control.request_transfer_type(wanted).await?;
    *current = Some(wanted);
    Ok(())
}

async fn seek_local<T>(stream: &mut T, offset: u64) -> Result<(), FtpSessionError>
where
    T: AsyncSeek + Unpin,
{
    stream
        .seek(SeekFrom::Start(offset))
        .await
        .map_err(FtpTransferIoError::LocalSeekFailed)?;
    Ok(())
}

fn local_open_failed(e: std::io::Error) -> FtpSessionError {
    FtpTransferIoError::LocalOpenFailed(e).into()
}

impl<CP, S, LS> FtpSessionInner<CP, S, LS>
where
    CP: FtpConnectionProvider<S> + Send,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    LS: FtpLocalStore + Send,
{
    /// Set the type, negotiate the data channel and send REST if needed.
    ///
    /// Returns the data channel and the offset accepted by the server.
    async fn prepare_transfer(
        &mut self,
        config: &FtpTransferConfig,
        passive: bool,
        transfer_type: FtpTransferType,
        offset: u64,
    ) -> Result<(FtpDataChannel<S>, u64), FtpSessionError> {
        let control = authenticated_control(self.state, &mut self.control)?;
        ensure_type(control, &mut self.transfer_type, transfer_type).await?;

        let channel = FtpDataChannel::negotiate(
            control,
            &mut self.provider,
            passive,
            config.prefer_epsv,
            self.options.timeout(),
        )
        .await?;
        crate::log_msg!("data channel: {}", channel.descriptor());

        if offset == 0 {
            return Ok((channel, 0));
        }
        match control.request_restart(offset).await {
            Ok(true) => Ok((channel, offset)),
            Ok(false) => {
                log::info!("REST is not supported by server, restart from offset 0");
                Ok((channel, 0))
            }
            Err(e) => {
                channel.release(&mut self.provider);
                match e {
                    FtpCommandError::UnexpectedReply(_, reply) => {
                        Err(FtpTransferError::RestartRejected(reply).into())
                    }
                    e => Err(e.into()),
                }
            }
        }
    }

    /// Send the transfer command and get the data stream.
    async fn begin_transfer(
        &mut self,
        channel: FtpDataChannel<S>,
        cmd: FtpCommand,
        param: Option<&str>,
    ) -> Result<S, FtpSessionError> {
        let control = authenticated_control(self.state, &mut self.control)?;
        if let Err(e) = control.start_transfer(cmd, param).await {
            channel.release(&mut self.provider);
            return Err(FtpSessionError::from_transfer_start(e));
        }

        match channel
            .establish(&mut self.provider, self.options.timeout())
            .await
        {
            Ok(stream) => Ok(stream),
            Err(e) => {
                control.drain_reply("data connection").await;
                Err(e.into())
            }
        }
    }

    async fn end_transfer(&mut self, cmd: FtpCommand) -> Result<(), FtpSessionError> {
        let control = authenticated_control(self.state, &mut self.control)?;
        control
            .wait_transfer_end(cmd)
            .await
            .map_err(FtpSessionError::from_transfer_end)
    }

    /// Read the final reply of an interrupted transfer to keep the control channel in sync.
    async fn abort_transfer(&mut self, cmd: FtpCommand, e: FtpSessionError) -> FtpSessionError {
        if let Some(control) = self.control.as_mut() {
            if let Some(reply) = control.drain_reply("abort transfer").await {
                crate::log_msg!("{cmd} aborted by local error, server reply: {reply}");
            }
        }
        e
    }

    async fn download<W>(
        &mut self,
        config: &FtpTransferConfig,
        cmd: FtpCommand,
        mut data: S,
        sink: &mut W,
        transfer_type: FtpTransferType,
    ) -> Result<(), FtpSessionError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut engine =
            FtpTransferEngine::new(transfer_type, config.buffer_size, self.options.timeout());
        let result = engine.download(&mut data, sink).await;
        self.transferred += engine.transferred();
        drop(data);

        match result {
            Ok(_) => self.end_transfer(cmd).await,
            Err(e) => Err(self.abort_transfer(cmd, e.into()).await),
        }
    }

    async fn upload<R>(
        &mut self,
        config: &FtpTransferConfig,
        cmd: FtpCommand,
        source: &mut R,
        mut data: S,
        transfer_type: FtpTransferType,
    ) -> Result<(), FtpSessionError>
    where
        R: AsyncRead + Unpin,
    {
        let mut engine =
            FtpTransferEngine::new(transfer_type, config.buffer_size, self.options.timeout());
        let result = engine.upload(source, &mut data).await;
        self.transferred += engine.transferred();
        drop(data);

        match result {
            Ok(_) => self.end_transfer(cmd).await,
            Err(e) => Err(self.abort_transfer(cmd, e.into()).await),
        }
    }

    async fn read_listing(
        &mut self,
        config: &FtpTransferConfig,
        passive: bool,
        cmd: FtpCommand,
        param: Option<&str>,
    ) -> Result<Vec<String>, FtpSessionError> {
        let (channel, _) = self
            .prepare_transfer(config, passive, FtpTransferType::Ascii, 0)
            .await?;
        let data = self.begin_transfer(channel, cmd, param).await?;

        let mut reader = FtpLineDataTransfer::new(data, config, self.options.timeout());
        if cmd != FtpCommand::NLST {
            reader = reader.keep_empty_lines();
        }
        let result = reader.read_to_end().await;
        match result {
            Ok(lines) => {
                self.end_transfer(cmd).await?;
                Ok(lines)
            }
            Err(e) => Err(self.abort_transfer(cmd, e.into()).await),
        }
    }
}

impl<CP, S, LS> FtpSession<CP, S, LS>
where
    CP: FtpConnectionProvider<S> + Send,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    LS: FtpLocalStore + Send,
{
    #[inline]
    fn current_transfer_type(&self) -> FtpTransferType {
        FtpTransferType::from_binary(self.is_binary())
    }

    /// Get the names in a directory with NLST, sorted ascending.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<String>, FtpSessionError> {
        let mut inner = self.lock()?;
        let param = if path.is_empty() { None } else { Some(path) };
        let mut names = inner
            .read_listing(
                &self.config.transfer,
                self.is_passive(),
                FtpCommand::NLST,
                param,
            )
            .await?;
        names.sort();
        Ok(names)
    }

    /// Get the LIST output lines in server order.
    pub async fn rawlist_directory(
        &self,
        params: &str,
        recursive: bool,
    ) -> Result<Vec<String>, FtpSessionError> {
        let mut inner = self.lock()?;
        let cmd = if recursive {
            FtpCommand::LIST_R
        } else {
            FtpCommand::LIST
        };
        let param = if params.is_empty() { None } else { Some(params) };
        inner
            .read_listing(&self.config.transfer, self.is_passive(), cmd, param)
            .await
    }

    /// Download `remote` into the local store entry `local`.
    pub async fn get(
        &self,
        local: &str,
        remote: &str,
        offset: u64,
    ) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        authenticated_control(inner.state, &mut inner.control)?;
        let transfer_type = self.current_transfer_type();
        inner.transferred = 0;

        let mut sink = inner
            .local_store
            .open_sink(local, offset)
            .await
            .map_err(local_open_failed)?;
        let (channel, effective) = inner
            .prepare_transfer(&self.config.transfer, self.is_passive(), transfer_type, offset)
            .await?;
        if effective != offset {
            // restart not accepted, start over
            match inner.local_store.open_sink(local, effective).await {
                Ok(f) => sink = f,
                Err(e) => {
                    channel.release(&mut inner.provider);
                    return Err(local_open_failed(e));
                }
            }
        }
        inner.transferred = effective;

        let cmd = FtpCommand::RETR;
        let data = inner.begin_transfer(channel, cmd, Some(remote)).await?;
        inner
            .download(&self.config.transfer, cmd, data, &mut sink, transfer_type)
            .await?;
        Ok(self)
    }

    /// Upload the local store entry `local` to `remote`.
    pub async fn put(
        &self,
        remote: &str,
        local: &str,
        offset: u64,
    ) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        authenticated_control(inner.state, &mut inner.control)?;
        let transfer_type = self.current_transfer_type();
        inner.transferred = 0;

        let mut source = inner
            .local_store
            .open_source(local, offset)
            .await
            .map_err(local_open_failed)?;
        let (channel, effective) = inner
            .prepare_transfer(&self.config.transfer, self.is_passive(), transfer_type, offset)
            .await?;
        if effective != offset {
            match inner.local_store.open_source(local, effective).await {
                Ok(f) => source = f,
                Err(e) => {
                    channel.release(&mut inner.provider);
                    return Err(local_open_failed(e));
                }
            }
        }
        inner.transferred = effective;

        let cmd = FtpCommand::STOR;
        let data = inner.begin_transfer(channel, cmd, Some(remote)).await?;
        inner
            .upload(&self.config.transfer, cmd, &mut source, data, transfer_type)
            .await?;
        Ok(self)
    }

    /// Download `remote` into a caller supplied stream.
    ///
    /// With autoseek on the stream is positioned at `offset` first.
    pub async fn fget<W>(
        &self,
        sink: &mut W,
        remote: &str,
        offset: u64,
    ) -> Result<&Self, FtpSessionError>
    where
        W: AsyncWrite + AsyncSeek + Unpin,
    {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        authenticated_control(inner.state, &mut inner.control)?;
        let transfer_type = self.current_transfer_type();
        let autoseek = inner.options.autoseek();
        inner.transferred = 0;

        if autoseek && offset > 0 {
            seek_local(sink, offset).await?;
        }
        let (channel, effective) = inner
            .prepare_transfer(&self.config.transfer, self.is_passive(), transfer_type, offset)
            .await?;
        if autoseek && effective != offset {
            if let Err(e) = seek_local(sink, effective).await {
                channel.release(&mut inner.provider);
                return Err(e);
            }
        }
        inner.transferred = effective;

        let cmd = FtpCommand::RETR;
        let data = inner.begin_transfer(channel, cmd, Some(remote)).await?;
        inner
            .download(&self.config.transfer, cmd, data, sink, transfer_type)
            .await?;
        Ok(self)
    }

    /// Upload from a caller supplied stream to `remote`.
    ///
    /// With autoseek on the stream is positioned at `offset` first.
    pub async fn fput<R>(
        &self,
        remote: &str,
        source: &mut R,
        offset: u64,
    ) -> Result<&Self, FtpSessionError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        authenticated_control(inner.state, &mut inner.control)?;
        let transfer_type = self.current_transfer_type();
        let autoseek = inner.options.autoseek();
        inner.transferred = 0;

        if autoseek && offset > 0 {
            seek_local(source, offset).await?;
        }
        let (channel, effective) = inner
            .prepare_transfer(&self.config.transfer, self.is_passive(), transfer_type, offset)
            .await?;
        if autoseek && effective != offset {
            if let Err(e) = seek_local(source, effective).await {
                channel.release(&mut inner.provider);
                return Err(e);
            }
        }
        inner.transferred = effective;

        let cmd = FtpCommand::STOR;
        let data = inner.begin_transfer(channel, cmd, Some(remote)).await?;
        inner
            .upload(&self.config.transfer, cmd, source, data, transfer_type)
            .await?;
        Ok(self)
    }
}
