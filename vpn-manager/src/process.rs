// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Invocation of the external driver program that creates and revokes clients.
//!
//! The program is a black box with a two-command contract:
//!
//! | Invocation | Success | Output |
//! |------------|---------|--------|
//! | `<program> new <client-id>` | exit code 0 | the client file on stdout |
//! | `<program> revoke <index>` | exit code 0 | ignored |
//!
//! `<index>` is the 1-based position of the client in issuance order (see
//! [`crate::registry`]). Everything the program prints on stdout during `new`
//! is taken verbatim as the client file, so the program must not log there.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::constants::LOG_PREFIX;
use crate::errors::AppError;
use crate::models::{ClientId, Material};

#[derive(Debug, Clone)]
pub struct ClientProgram {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ClientProgram {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// Adds a leading argument, e.g. the script path when `program` is an interpreter.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Runs `<program> new <id>` and returns its stdout.
    #[tracing::instrument(skip(self))]
    pub async fn issue(&self, id: &ClientId) -> Result<Material, AppError> {
        let stdout = self.run(&["new", id.as_str()]).await?;
        Ok(Material::new(stdout))
    }

    /// Runs `<program> revoke <position>`.
    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, position: usize) -> Result<(), AppError> {
        self.run(&["revoke", &position.to_string()]).await?;
        Ok(())
    }

    /// Revokes position 1 until the program refuses, returning how many were revoked.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self) -> usize {
        let mut revoked = 0;
        while self.revoke(1).await.is_ok() {
            revoked += 1;
        }
        tracing::info!(
            "{} finished purging the server's clients, revoked {}",
            LOG_PREFIX,
            revoked
        );
        revoked
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, AppError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::RunError(None, e.to_string()))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AppError::RunError(None, format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| AppError::RunError(None, e.to_string()))?;

        if !output.status.success() {
            return Err(AppError::RunError(
                output.status.code(),
                String::from_utf8_lossy(output.stderr.as_slice()).to_string(),
            ));
        }

        Ok(output.stdout)
    }
}
