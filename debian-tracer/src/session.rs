// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Execution of commands against the system being traced. */

use {
    crate::error::{Result, TracerError},
    log::debug,
    std::path::Path,
};

/// Captured output of a successful command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Describes an environment that commands can be executed in and files read from.
///
/// Implementations must turn a nonzero exit status into [TracerError::CommandFailed]
/// carrying the captured output.
pub trait Session {
    /// Execute a command given as an argv vector.
    fn execute_command(&self, args: &[&str]) -> Result<CommandOutput>;

    /// Read the content of a file as text.
    fn read(&self, path: &str) -> Result<String>;

    /// Whether a path exists.
    fn exists(&self, path: &str) -> bool;
}

/// A [Session] bound to the machine this process runs on.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalSession;

impl Session for LocalSession {
    fn execute_command(&self, args: &[&str]) -> Result<CommandOutput> {
        let (program, arguments) = args.split_first().ok_or(TracerError::EmptyCommand)?;

        debug!("running {}", args.join(" "));

        let output = duct::cmd(*program, arguments.iter().copied())
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            Err(TracerError::CommandFailed {
                command: args.join(" "),
                status: output.status.code(),
                stdout,
                stderr,
            })
        }
    }

    fn read(&self, path: &str) -> Result<String> {
        match std::fs::read(path) {
            Ok(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TracerError::FileNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_read_and_exists() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = td.path().join("debian_version");
        std::fs::write(&path, "11.1\n")?;
        let path = path.display().to_string();

        let session = LocalSession;
        assert!(session.exists(&path));
        assert_eq!(session.read(&path)?, "11.1\n");

        let missing = td.path().join("missing").display().to_string();
        assert!(!session.exists(&missing));
        assert!(matches!(
            session.read(&missing),
            Err(TracerError::FileNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn local_empty_command() {
        assert!(matches!(
            LocalSession.execute_command(&[]),
            Err(TracerError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn local_command_failure() -> Result<()> {
        let output = LocalSession.execute_command(&["sh", "-c", "echo hello"])?;
        assert_eq!(output.stdout, "hello\n");

        let err = LocalSession
            .execute_command(&["sh", "-c", "echo out; echo err >&2; exit 3"])
            .unwrap_err();
        assert!(err.is_command_failure());
        assert_eq!(err.stdout(), Some("out\n"));
        assert_eq!(err.stderr(), Some("err\n"));

        match err {
            TracerError::CommandFailed { status, .. } => assert_eq!(status, Some(3)),
            _ => panic!("expected command failure"),
        }

        Ok(())
    }
}
