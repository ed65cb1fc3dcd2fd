//! Sources of the caller's bearer credential.

use crate::config::SecretString;
use std::process::Command;
use thiserror::Error;

pub const DEFAULT_TOKEN_COMMAND: &str = "gcloud auth print-access-token";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token command is empty")]
    EmptyCommand,
    #[error("failed to run token command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("token command '{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("token source produced an empty token")]
    Empty,
    #[error("environment variable {0} is not set")]
    MissingEnv(String),
}

/// Produces the identity token forwarded to the monitored services.
pub trait TokenProvider: Send + Sync {
    fn caller_token(&self) -> Result<SecretString, TokenError>;
}

/// Runs an external command and takes its trimmed stdout as the token.
#[derive(Clone, Debug)]
pub struct CommandTokenProvider {
    program: String,
    args: Vec<String>,
}

impl CommandTokenProvider {
    pub fn new(command_line: &str) -> Result<Self, TokenError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(TokenError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TokenProvider for CommandTokenProvider {
    fn caller_token(&self) -> Result<SecretString, TokenError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|source| TokenError::Spawn {
                command: self.command_line(),
                source,
            })?;

        if !output.status.success() {
            return Err(TokenError::CommandFailed {
                command: self.command_line(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(SecretString::new(token))
    }
}

/// A token fixed at startup.
#[derive(Clone, Debug)]
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }

    pub fn from_env(var: &str) -> Result<Self, TokenError> {
        let value = std::env::var(var).map_err(|_| TokenError::MissingEnv(var.to_string()))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(Self::new(SecretString::new(value)))
    }
}

impl TokenProvider for StaticTokenProvider {
    fn caller_token(&self) -> Result<SecretString, TokenError> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            CommandTokenProvider::new("   "),
            Err(TokenError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_stdout_is_trimmed_into_token() {
        let provider = CommandTokenProvider::new("echo  tok-123 ").expect("provider");
        let token = provider.caller_token().expect("token");
        assert_eq!(token.expose(), "tok-123");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_status() {
        let provider = CommandTokenProvider::new("false").expect("provider");
        let err = provider.caller_token().expect_err("should fail");
        assert!(matches!(err, TokenError::CommandFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn silent_command_is_empty_token() {
        let provider = CommandTokenProvider::new("true").expect("provider");
        assert!(matches!(provider.caller_token(), Err(TokenError::Empty)));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let provider =
            CommandTokenProvider::new("drspulse-no-such-program-xyz").expect("provider");
        assert!(matches!(
            provider.caller_token(),
            Err(TokenError::Spawn { .. })
        ));
    }

    #[test]
    fn missing_env_var_is_reported() {
        let err = StaticTokenProvider::from_env("DRSPULSE_TEST_UNSET_TOKEN_VAR")
            .expect_err("unset");
        assert!(matches!(err, TokenError::MissingEnv(name) if name == "DRSPULSE_TEST_UNSET_TOKEN_VAR"));
    }

    #[test]
    fn static_provider_returns_its_token() {
        let provider = StaticTokenProvider::new(SecretString::new("fixed"));
        assert_eq!(provider.caller_token().expect("token").expose(), "fixed");
    }
}
