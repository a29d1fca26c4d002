/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, MutexGuard};

use crate::config::FtpClientConfig;
use crate::connection::{FtpConnectionProvider, FtpStream, TcpConnectionProvider};
use crate::control::FtpControlChannel;
use crate::error::{FtpAuthStatus, FtpConnectError, FtpSessionError};
use crate::local::{FsLocalStore, FtpLocalStore};
use crate::option::{FtpOptionValue, FtpRuntimeOption, FtpRuntimeOptions};
use crate::time_val;
use crate::transfer::FtpTransferType;

mod transfer;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpSessionState {
    Disconnected,
    /// greeting received
    Connected,
    /// logged in
    Authenticated,
    Closed,
}

impl FtpSessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtpSessionState::Disconnected => "disconnected",
            FtpSessionState::Connected => "connected",
            FtpSessionState::Authenticated => "authenticated",
            FtpSessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for FtpSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct FtpSessionInner<CP, S, LS>
where
    S: AsyncRead + AsyncWrite,
{
    provider: CP,
    local_store: LS,
    state: FtpSessionState,
    control: Option<FtpControlChannel<S>>,
    options: FtpRuntimeOptions,
    transfer_type: Option<FtpTransferType>,
    transferred: u64,
}

fn connected_control<S>(
    state: FtpSessionState,
    control: &mut Option<FtpControlChannel<S>>,
) -> Result<&mut FtpControlChannel<S>, FtpSessionError>
where
    S: AsyncRead + AsyncWrite,
{
    match state {
        FtpSessionState::Disconnected => Err(FtpSessionError::NotConnected),
        FtpSessionState::Closed => Err(FtpSessionError::Closed),
        FtpSessionState::Connected | FtpSessionState::Authenticated => {
            control.as_mut().ok_or(FtpSessionError::NotConnected)
        }
    }
}

fn authenticated_control<S>(
    state: FtpSessionState,
    control: &mut Option<FtpControlChannel<S>>,
) -> Result<&mut FtpControlChannel<S>, FtpSessionError>
where
    S: AsyncRead + AsyncWrite,
{
    if state == FtpSessionState::Connected {
        return Err(FtpSessionError::NotAuthenticated);
    }
    connected_control(state, control)
}

async fn authenticate<S>(
    control: &mut FtpControlChannel<S>,
    user: &str,
    pass: &str,
    account: Option<&str>,
) -> Result<(), FtpSessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let status = match control
        .send_username(user)
        .await
        .map_err(FtpSessionError::from_auth)?
    {
        FtpAuthStatus::NeedPassword => control
            .send_password(pass)
            .await
            .map_err(FtpSessionError::from_auth)?,
        status => status,
    };

    match status {
        FtpAuthStatus::LoggedIn => Ok(()),
        FtpAuthStatus::NeedAccount(reply) => match account {
            Some(account) => control
                .send_account(account)
                .await
                .map_err(FtpSessionError::from_auth),
            None => Err(FtpSessionError::Auth(reply)),
        },
        // not returned by PASS
        FtpAuthStatus::NeedPassword => Err(FtpSessionError::NotAuthenticated),
    }
}

/// A stateful FTP client session.
///
/// All operations take `&self`. An operation issued while another one is
/// still running fails with [`FtpSessionError::Busy`].
pub struct FtpSession<CP, S, LS>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    config: FtpClientConfig,
    inner: Mutex<FtpSessionInner<CP, S, LS>>,
    passive: AtomicBool,
    binary: AtomicBool,
}

pub type TcpFtpSession = FtpSession<TcpConnectionProvider, FtpStream, FsLocalStore>;

impl<CP, S, LS> FtpSession<CP, S, LS>
where
    CP: FtpConnectionProvider<S> + Send,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    LS: FtpLocalStore + Send,
{
    pub fn new(provider: CP, local_store: LS, config: FtpClientConfig) -> Self {
        let options = FtpRuntimeOptions::new(config.control.command_timeout, config.autoseek);
        FtpSession {
            config,
            inner: Mutex::new(FtpSessionInner {
                provider,
                local_store,
                state: FtpSessionState::Disconnected,
                control: None,
                options,
                transfer_type: None,
                transferred: 0,
            }),
            passive: AtomicBool::new(false),
            binary: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FtpSessionInner<CP, S, LS>>, FtpSessionError> {
        self.inner.try_lock().map_err(|_| FtpSessionError::Busy)
    }

    #[inline]
    pub fn config(&self) -> &FtpClientConfig {
        &self.config
    }

    pub fn state(&self) -> Result<FtpSessionState, FtpSessionError> {
        Ok(self.lock()?.state)
    }

    /// The type last acknowledged by the server.
    pub fn transfer_type(&self) -> Result<Option<FtpTransferType>, FtpSessionError> {
        Ok(self.lock()?.transfer_type)
    }

    /// Resume offset plus bytes moved by the last transfer.
    pub fn bytes_transferred(&self) -> Result<u64, FtpSessionError> {
        Ok(self.lock()?.transferred)
    }

    #[inline]
    pub fn is_passive(&self) -> bool {
        self.passive.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        self.binary.load(Ordering::Relaxed)
    }

    /// Use passive mode for the following transfers.
    pub fn passive(&self, enable: bool) -> &Self {
        self.passive.store(enable, Ordering::Relaxed);
        self
    }

    /// Use TYPE I instead of TYPE A for the following file transfers.
    pub fn binary(&self, enable: bool) -> &Self {
        self.binary.store(enable, Ordering::Relaxed);
        self
    }

    pub async fn connect(
        &self,
        host: &str,
        secure: bool,
        port: u16,
        timeout_secs: i64,
    ) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        match inner.state {
            FtpSessionState::Disconnected => {}
            FtpSessionState::Closed => return Err(FtpSessionError::Closed),
            _ => return Err(FtpSessionError::AlreadyConnected),
        }
        let timeout = FtpRuntimeOptions::validate_timeout(timeout_secs)?;
        inner.options.set_timeout(timeout);

        let stream = match tokio::time::timeout(
            timeout,
            inner.provider.new_control_connection(host, port, secure),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(FtpConnectError::ConnectIoError(e).into()),
            Err(_) => return Err(FtpConnectError::ConnectTimedOut.into()),
        };

        let mut control = FtpControlChannel::new(stream, self.config.control.clone());
        control.set_command_timeout(timeout);
        let greeting = control
            .wait_greetings()
            .await
            .map_err(FtpConnectError::from)?;
        log::info!("connected to ftp server {host}:{port}: {greeting}");

        inner.control = Some(control);
        inner.transfer_type = None;
        inner.state = FtpSessionState::Connected;
        Ok(self)
    }

    pub async fn login(&self, user: &str, pass: &str) -> Result<&Self, FtpSessionError> {
        self.do_login(user, pass, None).await
    }

    /// Login and send ACCT if the server asks for an account.
    pub async fn login_with_account(
        &self,
        user: &str,
        pass: &str,
        account: &str,
    ) -> Result<&Self, FtpSessionError> {
        self.do_login(user, pass, Some(account)).await
    }

    async fn do_login(
        &self,
        user: &str,
        pass: &str,
        account: Option<&str>,
    ) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = connected_control(inner.state, &mut inner.control)?;

        match authenticate(control, user, pass, account).await {
            Ok(_) => {
                log::info!("logged in as {user}");
                inner.state = FtpSessionState::Authenticated;
                // servers may reset the representation type on USER
                inner.transfer_type = None;
                Ok(self)
            }
            Err(e) => {
                log::debug!("login as {user} failed: {e}");
                inner.state = FtpSessionState::Connected;
                Err(e)
            }
        }
    }

    pub async fn change_directory(&self, dir: &str) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control
            .change_dir(dir)
            .await
            .map_err(FtpSessionError::from_navigation)?;
        Ok(self)
    }

    pub async fn parent_directory(&self) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control
            .change_to_parent()
            .await
            .map_err(FtpSessionError::from_navigation)?;
        Ok(self)
    }

    pub async fn get_directory(&self) -> Result<String, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control
            .print_working_dir()
            .await
            .map_err(FtpSessionError::from_navigation)
    }

    pub async fn create_directory(&self, dir: &str) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        let created = control
            .make_dir(dir)
            .await
            .map_err(FtpSessionError::from_navigation)?;
        crate::log_msg!("directory {created} created");
        Ok(self)
    }

    pub async fn remove_directory(&self, dir: &str) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control
            .remove_dir(dir)
            .await
            .map_err(FtpSessionError::from_navigation)?;
        Ok(self)
    }

    pub async fn delete(&self, path: &str) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control.delete_file(path).await?;
        Ok(self)
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control.rename_from(from).await?;
        control.rename_to(to).await?;
        Ok(self)
    }

    /// Send `SITE CHMOD` with `mode` in octal.
    pub async fn chmod(&self, mode: u32, path: &str) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control.site_chmod(mode, path).await?;
        Ok(self)
    }

    pub async fn exec(&self, command: &str) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        let reply = control.site_exec(command).await?;
        crate::log_msg!("SITE EXEC {command}: {reply}");
        Ok(self)
    }

    /// Reserve space for a following upload, servers may ignore it.
    pub async fn allocate(&self, size: u64) -> Result<&Self, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        control.request_allocate(size).await?;
        Ok(self)
    }

    pub async fn size(&self, path: &str) -> Result<u64, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        let size = control.request_size(path).await?;
        Ok(size)
    }

    pub async fn modified_time(&self, path: &str) -> Result<DateTime<Utc>, FtpSessionError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;
        let control = authenticated_control(inner.state, &mut inner.control)?;
        let dt = control.request_mtime(path).await?;
        Ok(dt)
    }

    /// Get the modification time formatted with a strftime style format.
    pub async fn modified_time_formatted(
        &self,
        path: &str,
        format: &str,
    ) -> Result<String, FtpSessionError> {
        if !time_val::is_valid_format(format) {
            return Err(FtpSessionError::InvalidTimeFormat(format.to_string()));
        }
        let dt = self.modified_time(path).await?;
        Ok(dt.format(format).to_string())
    }

    pub fn get_option(&self, key: FtpRuntimeOption) -> Result<FtpOptionValue, FtpSessionError> {
        let inner = self.lock()?;
        if inner.state == FtpSessionState::Closed {
            return Err(FtpSessionError::Closed);
        }
        Ok(inner.options.get(key))
    }

    pub fn set_option(
        &self,
        key: FtpRuntimeOption,
        value: FtpOptionValue,
    ) -> Result<&Self, FtpSessionError> {
        FtpRuntimeOptions::validate(key, value)?;

        let mut inner = self.lock()?;
        let inner = &mut *inner;
        if inner.state == FtpSessionState::Closed {
            return Err(FtpSessionError::Closed);
        }
        inner.options.set(key, value)?;
        if key == FtpRuntimeOption::TimeoutSeconds {
            let timeout = inner.options.timeout();
            if let Some(control) = &mut inner.control {
                control.set_command_timeout(timeout);
            }
        }
        Ok(self)
    }

    /// Send QUIT and close the control connection, a second call does nothing.
    ///
    /// The reply to QUIT is not checked.
    pub async fn close(&self) -> Result<(), FtpSessionError> {
        let mut inner = self.lock()?;
        if inner.state == FtpSessionState::Closed {
            return Ok(());
        }
        inner.state = FtpSessionState::Closed;
        inner.transfer_type = None;

        let Some(mut control) = inner.control.take() else {
            return Ok(());
        };
        if let Err(e) = control.send_quit().await {
            log::warn!("QUIT failed: {e}");
        }
        control.shutdown().await.map_err(FtpSessionError::Close)?;
        log::info!("ftp session closed");
        Ok(())
    }
}

impl<CP, S, LS> Drop for FtpSession<CP, S, LS>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state == FtpSessionState::Closed {
            return;
        }
        inner.state = FtpSessionState::Closed;

        let Some(mut control) = inner.control.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = control.send_quit().await {
                        log::warn!("QUIT failed: {e}");
                    }
                    if let Err(e) = control.shutdown().await {
                        log::warn!("failed to shutdown control connection: {e}");
                    }
                });
            }
            Err(_) => {
                log::warn!("no async runtime to close the ftp session, drop the connection");
            }
        }
    }
}
