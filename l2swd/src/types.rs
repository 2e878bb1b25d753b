// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! General types used throughout `l2swd`.

use std::convert;

pub type SwdResult<T> = Result<T, SwdError>;

#[derive(Debug, thiserror::Error)]
pub enum SwdError {
    #[error("I/O error: {0:?}")]
    Io(std::io::Error),
    #[error("Invalid argument: {0}")]
    Invalid(String),
    #[error("Error: {0}")]
    Other(String),
}

impl convert::From<std::io::Error> for SwdError {
    fn from(err: std::io::Error) -> Self {
        SwdError::Io(err)
    }
}

impl convert::From<String> for SwdError {
    fn from(err: String) -> Self {
        SwdError::Other(err)
    }
}

impl convert::From<&str> for SwdError {
    fn from(err: &str) -> Self {
        SwdError::Other(err.to_string())
    }
}

impl convert::From<anyhow::Error> for SwdError {
    fn from(err: anyhow::Error) -> Self {
        SwdError::Other(err.to_string())
    }
}
