/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};

use super::FtpControlChannel;
use crate::error::FtpReplyError;
use crate::io::LimitedBufReadExt;
use crate::time_val;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpReplyClass {
    /// 1xx, another reply will follow
    Preliminary,
    /// 2xx
    Completion,
    /// 3xx, the server waits for a further command
    Intermediate,
    /// 4xx
    TransientNegative,
    /// 5xx
    PermanentNegative,
}

/// A complete reply read from the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    code: u16,
    multi_line: bool,
    lines: Vec<String>,
}

impl FtpReply {
    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[inline]
    pub fn first_digit(&self) -> u8 {
        (self.code / 100) as u8
    }

    pub fn class(&self) -> FtpReplyClass {
        match self.first_digit() {
            1 => FtpReplyClass::Preliminary,
            2 => FtpReplyClass::Completion,
            3 => FtpReplyClass::Intermediate,
            4 => FtpReplyClass::TransientNegative,
            _ => FtpReplyClass::PermanentNegative,
        }
    }

    #[inline]
    pub fn is_completion(&self) -> bool {
        self.class() == FtpReplyClass::Completion
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.code >= 400
    }

    #[inline]
    pub fn is_multi_line(&self) -> bool {
        self.multi_line
    }

    /// Message lines without the reply code of the first and the last line.
    #[inline]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Message text of the first line.
    pub fn text(&self) -> &str {
        self.lines.first().map(|s| s.as_str()).unwrap_or_default()
    }

    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    pub(crate) fn line_trimmed(&self) -> Option<&str> {
        if self.multi_line {
            None
        } else {
            Some(self.text().trim())
        }
    }

    /// Get the path in a 257 reply, with `""` unescaped.
    pub(crate) fn quoted_path(&self) -> Option<String> {
        let line = self.text();
        let start = memchr::memchr(b'"', line.as_bytes())?;

        let mut path = String::with_capacity(line.len() - start);
        let mut chars = line[start + 1..].chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    return Some(path);
                }
            }
            path.push(c);
        }
        None
    }

    pub(crate) fn parse_pasv_227(&self) -> Option<SocketAddr> {
        let line = self.line_trimmed()?;

        // some servers omit the parentheses
        let (p_start, p_end) = match memchr::memchr(b'(', line.as_bytes()) {
            Some(p_start) => {
                let p_end = memchr::memchr(b')', &line.as_bytes()[p_start..])? + p_start;
                (p_start + 1, p_end)
            }
            None => {
                let p_start = line.find(|c: char| c.is_ascii_digit())?;
                (p_start, line.len())
            }
        };

        let a: Vec<&str> = line[p_start..p_end].split(',').map(|s| s.trim()).collect();
        if a.len() != 6 {
            return None;
        }

        let h1 = u8::from_str(a[0]).ok()?;
        let h2 = u8::from_str(a[1]).ok()?;
        let h3 = u8::from_str(a[2]).ok()?;
        let h4 = u8::from_str(a[3]).ok()?;
        let p1 = u8::from_str(a[4]).ok()?;
        let p2 = u8::from_str(a[5]).ok()?;

        let ip = IpAddr::V4(Ipv4Addr::new(h1, h2, h3, h4));
        let port = ((p1 as u16) << 8) + (p2 as u16);
        Some(SocketAddr::new(ip, port))
    }

    pub(crate) fn parse_epsv_229(&self) -> Option<u16> {
        let line = self.line_trimmed()?;

        let p_start = memchr::memchr(b'(', line.as_bytes())?;
        let p_end = memchr::memchr(b')', &line.as_bytes()[p_start..])? + p_start;
        let inner = &line[p_start + 1..p_end];
        if inner.len() < 5 {
            return None;
        }

        // (<d><d><d><port><d>), the delimiter is usually '|'
        let d = inner.chars().next()?;
        let mut parts = inner.split(d);
        if !parts.next()?.is_empty() || !parts.next()?.is_empty() || !parts.next()?.is_empty() {
            return None;
        }
        let port = u16::from_str(parts.next()?).ok()?;
        if !parts.next()?.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(port)
    }

    pub(crate) fn parse_mdtm_213(&self) -> Option<DateTime<Utc>> {
        let line = self.line_trimmed()?;
        time_val::parse_from_str(line).ok()
    }
}

impl fmt::Display for FtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join("\n"))
    }
}

struct FtpMultiLineReply {
    code: u16,
    end_prefix: [u8; 4],
    lines: Vec<String>,
}

/// Decode raw control channel lines into replies.
pub struct FtpReplyParser {
    max_lines: usize,
    multi_line: Option<FtpMultiLineReply>,
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn line_to_string(line: &[u8]) -> String {
    String::from_utf8_lossy(line).trim_end().to_string()
}

fn parse_code(line: &[u8]) -> Result<u16, FtpReplyError> {
    if line.len() < 3 || !line[..3].iter().all(|c| c.is_ascii_digit()) {
        return Err(FtpReplyError::MissingReplyCode);
    }
    let code =
        (line[0] - b'0') as u16 * 100 + (line[1] - b'0') as u16 * 10 + (line[2] - b'0') as u16;
    if !(100..600).contains(&code) {
        return Err(FtpReplyError::InvalidReplyCode(code));
    }
    Ok(code)
}

impl FtpReplyParser {
    pub fn new(max_lines: usize) -> Self {
        FtpReplyParser {
            max_lines,
            multi_line: None,
        }
    }

    /// Whether a multi-line reply has been started but not yet terminated.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.multi_line.is_some()
    }

    /// Feed one line, with or without the line ending.
    ///
    /// Returns the reply once its last line has been fed.
    pub fn feed_line(&mut self, line: &[u8]) -> Result<Option<FtpReply>, FtpReplyError> {
        let line = trim_line_end(line);

        let Some(mut ml) = self.multi_line.take() else {
            return self.feed_first_line(line);
        };

        let end = if line.len() == 3 {
            line == &ml.end_prefix[..3]
        } else {
            line.starts_with(&ml.end_prefix)
        };
        if end {
            ml.lines.push(line_to_string(line.get(4..).unwrap_or_default()));
            return Ok(Some(FtpReply {
                code: ml.code,
                multi_line: true,
                lines: ml.lines,
            }));
        }

        if ml.lines.len() >= self.max_lines {
            return Err(FtpReplyError::TooManyLines);
        }
        // do not trim whitespace at beginning
        ml.lines.push(line_to_string(line));
        self.multi_line = Some(ml);
        Ok(None)
    }

    fn feed_first_line(&mut self, line: &[u8]) -> Result<Option<FtpReply>, FtpReplyError> {
        let code = parse_code(line)?;
        if line.len() == 3 {
            return Ok(Some(FtpReply {
                code,
                multi_line: false,
                lines: vec![String::new()],
            }));
        }

        match line[3] {
            b' ' => Ok(Some(FtpReply {
                code,
                multi_line: false,
                lines: vec![line_to_string(&line[4..])],
            })),
            b'-' => {
                let mut lines = Vec::with_capacity(4);
                lines.push(line_to_string(&line[4..]));
                self.multi_line = Some(FtpMultiLineReply {
                    code,
                    end_prefix: [line[0], line[1], line[2], b' '],
                    lines,
                });
                Ok(None)
            }
            _ => Err(FtpReplyError::InvalidLineFormat),
        }
    }
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn read_reply(&mut self) -> Result<FtpReply, FtpReplyError> {
        let mut parser = FtpReplyParser::new(self.config.max_multi_lines);
        let mut buf = Vec::<u8>::with_capacity(self.config.max_line_len);

        loop {
            buf.clear();
            let (found, len) = self
                .stream
                .limited_read_until(b'\n', self.config.max_line_len, &mut buf)
                .await
                .map_err(FtpReplyError::ReadFailed)?;
            if len == 0 {
                return if parser.is_pending() {
                    Err(FtpReplyError::UnterminatedReply)
                } else {
                    Err(FtpReplyError::ConnectionClosed)
                };
            }

            #[cfg(feature = "log-raw-io")]
            crate::debug::log_rsp(String::from_utf8_lossy(&buf).trim_end());

            if !found && len >= self.config.max_line_len {
                return Err(FtpReplyError::LineTooLong);
            }
            // a partial line without line ending is followed by EOF
            if let Some(reply) = parser.feed_line(&buf)? {
                return Ok(reply);
            }
        }
    }

    pub(crate) async fn timed_read_reply(
        &mut self,
        stage: &'static str,
    ) -> Result<FtpReply, FtpReplyError> {
        match tokio::time::timeout(self.config.command_timeout, self.read_reply()).await {
            Ok(Ok(reply)) => {
                self.reply_pending = false;
                Ok(reply)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(FtpReplyError::ReadTimedOut(stage)),
        }
    }
}
