//! Process execution seam
//!
//! Every gh/git invocation goes through [`CommandRunner`], so the adapters
//! can be exercised with a scripted runner in tests.

use std::process::Command;

use crate::error::{Error, Result};

/// Runs an external program and returns its stdout
pub trait CommandRunner {
    /// Run `program` with `args`. Non-zero exit is an error carrying stderr.
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).run(program, args)
    }
}

/// Runs commands with [`std::process::Command`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecRunner;

impl CommandRunner for ExecRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let command = display_command(program, args);
        log::debug!("Running: {command}");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::from_command_output(command, &stderr))
        }
    }
}

/// `program arg1 arg2` for messages
pub fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Scripted runner: records every call and replays queued responses.
    /// Calls with nothing queued succeed with empty output.
    #[derive(Default)]
    pub struct FakeRunner {
        pub calls: RefCell<Vec<String>>,
        responses: RefCell<VecDeque<(String, Result<String>)>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for the next call whose command line contains `pattern`.
        pub fn respond(&self, pattern: &str, response: Result<String>) {
            self.responses
                .borrow_mut()
                .push_back((pattern.to_string(), response));
        }

        pub fn ok(&self, pattern: &str, stdout: &str) {
            self.respond(pattern, Ok(stdout.to_string()));
        }

        pub fn fail(&self, pattern: &str, stderr: &str) {
            self.respond(pattern, Err(Error::from_command_output(pattern, stderr)));
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<String> {
            let line = display_command(program, args);
            self.calls.borrow_mut().push(line.clone());

            let mut responses = self.responses.borrow_mut();
            let found = responses.iter().position(|(p, _)| line.contains(p.as_str()));
            match found.and_then(|i| responses.remove(i)) {
                Some((_, response)) => response,
                None => Ok(String::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeRunner;
    use super::*;

    #[test]
    fn test_display_command() {
        assert_eq!(display_command("gh", &[]), "gh");
        assert_eq!(
            display_command("gh", &["repo", "delete", "a/b"]),
            "gh repo delete a/b"
        );
    }

    #[test]
    fn test_exec_runner_missing_program() {
        let err = ExecRunner
            .run("ghm-definitely-not-a-real-binary", &["x"])
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[test]
    fn test_fake_runner_replays_in_order() {
        let runner = FakeRunner::new();
        runner.ok("gh api user", "alice\n");
        runner.fail("gh repo view", "HTTP 404");

        assert_eq!(runner.run("gh", &["api", "user"]).unwrap(), "alice\n");
        assert!(runner.run("gh", &["repo", "view", "a/b"]).is_err());
        assert_eq!(runner.run("git", &["status"]).unwrap(), "");
        assert_eq!(runner.calls().len(), 3);
    }
}
