// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{
        error::{Result, TracerError},
        session::{CommandOutput, Session},
    },
    std::{cell::RefCell, collections::HashMap},
};

#[derive(Clone, Debug)]
struct ScriptedCommand {
    stdout: String,
    stderr: String,
    status: i32,
}

/// A [Session] replaying canned command output.
///
/// Commands are keyed by their arguments joined with spaces. Unknown commands exit
/// with status 127 and unknown files don't exist.
#[derive(Debug, Default)]
pub struct FakeSession {
    commands: HashMap<String, ScriptedCommand>,
    files: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl FakeSession {
    /// Register a command exiting successfully.
    pub fn command(mut self, command: &str, stdout: &str) -> Self {
        self.commands.insert(
            command.to_string(),
            ScriptedCommand {
                stdout: stdout.to_string(),
                stderr: String::new(),
                status: 0,
            },
        );
        self
    }

    /// Register a command exiting with status 1.
    pub fn failing_command(mut self, command: &str, stdout: &str, stderr: &str) -> Self {
        self.commands.insert(
            command.to_string(),
            ScriptedCommand {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                status: 1,
            },
        );
        self
    }

    /// Register a file.
    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    /// Commands executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Session for FakeSession {
    fn execute_command(&self, args: &[&str]) -> Result<CommandOutput> {
        let command = args.join(" ");
        self.calls.borrow_mut().push(command.clone());

        let scripted = self.commands.get(&command).cloned().unwrap_or(ScriptedCommand {
            stdout: String::new(),
            stderr: format!("{}: command not scripted", command),
            status: 127,
        });

        if scripted.status == 0 {
            Ok(CommandOutput {
                stdout: scripted.stdout,
                stderr: scripted.stderr,
            })
        } else {
            Err(TracerError::CommandFailed {
                command,
                status: Some(scripted.status),
                stdout: scripted.stdout,
                stderr: scripted.stderr,
            })
        }
    }

    fn read(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| TracerError::FileNotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}
