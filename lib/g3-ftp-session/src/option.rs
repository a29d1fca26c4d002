/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FtpSessionError;

/// Session options that may be changed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpRuntimeOption {
    /// timeout in seconds for every network operation
    TimeoutSeconds,
    /// seek caller supplied streams to the resume offset
    Autoseek,
}

impl FtpRuntimeOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtpRuntimeOption::TimeoutSeconds => "timeout-seconds",
            FtpRuntimeOption::Autoseek => "autoseek",
        }
    }
}

impl fmt::Display for FtpRuntimeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FtpRuntimeOption {
    type Err = FtpSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timeout_sec" | "timeout-seconds" | "timeout_seconds" => {
                Ok(FtpRuntimeOption::TimeoutSeconds)
            }
            "autoseek" => Ok(FtpRuntimeOption::Autoseek),
            _ => Err(FtpSessionError::UnsupportedOption(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpOptionValue {
    Integer(i64),
    Bool(bool),
}

impl From<i64> for FtpOptionValue {
    fn from(v: i64) -> Self {
        FtpOptionValue::Integer(v)
    }
}

impl From<bool> for FtpOptionValue {
    fn from(v: bool) -> Self {
        FtpOptionValue::Bool(v)
    }
}

impl fmt::Display for FtpOptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpOptionValue::Integer(v) => write!(f, "{v}"),
            FtpOptionValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FtpRuntimeOptions {
    timeout: Duration,
    autoseek: bool,
}

impl FtpRuntimeOptions {
    pub(crate) fn new(timeout: Duration, autoseek: bool) -> Self {
        FtpRuntimeOptions { timeout, autoseek }
    }

    pub(crate) fn validate_timeout(secs: i64) -> Result<Duration, FtpSessionError> {
        if secs > 0 {
            Ok(Duration::from_secs(secs as u64))
        } else {
            Err(FtpSessionError::Validation(
                FtpRuntimeOption::TimeoutSeconds,
                "timeout must be greater than 0",
            ))
        }
    }

    pub(crate) fn validate(
        key: FtpRuntimeOption,
        value: FtpOptionValue,
    ) -> Result<(), FtpSessionError> {
        match (key, value) {
            (FtpRuntimeOption::TimeoutSeconds, FtpOptionValue::Integer(secs)) => {
                Self::validate_timeout(secs).map(|_| ())
            }
            (FtpRuntimeOption::TimeoutSeconds, _) => Err(FtpSessionError::Validation(
                key,
                "timeout must be an integer",
            )),
            (FtpRuntimeOption::Autoseek, FtpOptionValue::Bool(_)) => Ok(()),
            (FtpRuntimeOption::Autoseek, _) => {
                Err(FtpSessionError::Validation(key, "autoseek must be a boolean"))
            }
        }
    }

    pub(crate) fn get(&self, key: FtpRuntimeOption) -> FtpOptionValue {
        match key {
            FtpRuntimeOption::TimeoutSeconds => {
                FtpOptionValue::Integer(self.timeout.as_secs() as i64)
            }
            FtpRuntimeOption::Autoseek => FtpOptionValue::Bool(self.autoseek),
        }
    }

    pub(crate) fn set(
        &mut self,
        key: FtpRuntimeOption,
        value: FtpOptionValue,
    ) -> Result<(), FtpSessionError> {
        Self::validate(key, value)?;
        match (key, value) {
            (FtpRuntimeOption::TimeoutSeconds, FtpOptionValue::Integer(secs)) => {
                self.timeout = Duration::from_secs(secs as u64);
            }
            (FtpRuntimeOption::Autoseek, FtpOptionValue::Bool(v)) => self.autoseek = v,
            _ => {}
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    #[inline]
    pub(crate) fn autoseek(&self) -> bool {
        self.autoseek
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key() {
        assert_eq!(
            FtpRuntimeOption::from_str("TIMEOUT_SEC").unwrap(),
            FtpRuntimeOption::TimeoutSeconds
        );
        assert_eq!(
            FtpRuntimeOption::from_str("timeout-seconds").unwrap(),
            FtpRuntimeOption::TimeoutSeconds
        );
        assert_eq!(
            FtpRuntimeOption::from_str("AutoSeek").unwrap(),
            FtpRuntimeOption::Autoseek
        );
        assert!(matches!(
            FtpRuntimeOption::from_str("passive"),
            Err(FtpSessionError::UnsupportedOption(s)) if s == "passive"
        ));
    }

    #[test]
    fn set_and_get() {
        let mut options = FtpRuntimeOptions::new(Duration::from_secs(90), true);
        assert_eq!(
            options.get(FtpRuntimeOption::TimeoutSeconds),
            FtpOptionValue::Integer(90)
        );

        options
            .set(FtpRuntimeOption::TimeoutSeconds, 5i64.into())
            .unwrap();
        assert_eq!(options.timeout(), Duration::from_secs(5));
        options.set(FtpRuntimeOption::Autoseek, false.into()).unwrap();
        assert!(!options.autoseek());
    }

    #[test]
    fn reject_invalid() {
        let mut options = FtpRuntimeOptions::new(Duration::from_secs(90), true);
        for v in [FtpOptionValue::Integer(0), FtpOptionValue::Integer(-3), true.into()] {
            assert!(matches!(
                options.set(FtpRuntimeOption::TimeoutSeconds, v),
                Err(FtpSessionError::Validation(FtpRuntimeOption::TimeoutSeconds, _))
            ));
        }
        assert!(matches!(
            options.set(FtpRuntimeOption::Autoseek, FtpOptionValue::Integer(1)),
            Err(FtpSessionError::Validation(FtpRuntimeOption::Autoseek, _))
        ));
        assert_eq!(options.timeout(), Duration::from_secs(90));
        assert!(options.autoseek());
    }
}
