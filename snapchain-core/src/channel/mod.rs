//! Remote command execution.
//!
//! A [`ShellChannel`] runs POSIX shell command strings on some host and hands
//! back the exit status and captured standard output. [`RemotePaths`] builds
//! every filesystem check and mutation on top of this one primitive.
//!
//! [`RemotePaths`]: crate::paths::remote::RemotePaths

pub mod ssh;

pub use ssh::SshChannel;

/// Result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_status: i32,
    pub stdout: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// A channel that can execute shell commands on a (usually remote) host.
///
/// `Err` is reserved for transport failures; a command that ran and exited
/// nonzero is `Ok` with the status filled in.
pub trait ShellChannel {
    fn run(&self, command: &str) -> std::io::Result<ShellOutput>;

    /// `user@host` as the transfer tool expects it in a destination address.
    fn user_at_host(&self) -> &str;
}

/// Quote a string for safe interpolation into a POSIX shell command.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ShellChannel, ShellOutput};
    use std::cell::RefCell;
    use std::process::Command;

    /// Runs every command through the local `sh`, recording what was sent.
    pub struct LocalShell {
        pub commands: RefCell<Vec<String>>,
        pub fail_transport: bool,
    }

    impl LocalShell {
        pub fn new() -> Self {
            Self {
                commands: RefCell::new(Vec::new()),
                fail_transport: false,
            }
        }

        pub fn broken() -> Self {
            Self {
                commands: RefCell::new(Vec::new()),
                fail_transport: true,
            }
        }
    }

    impl ShellChannel for LocalShell {
        fn run(&self, command: &str) -> std::io::Result<ShellOutput> {
            self.commands.borrow_mut().push(command.to_string());
            if self.fail_transport {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ));
            }
            let output = Command::new("sh").arg("-c").arg(command).output()?;
            Ok(ShellOutput {
                exit_status: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            })
        }

        fn user_at_host(&self) -> &str {
            "tester@localhost"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_shell_quote_plain() {
        assert_eq!(shell_quote("simple"), "'simple'");
        assert_eq!(shell_quote("with spaces"), "'with spaces'");
    }

    #[test]
    fn test_shell_quote_survives_the_shell() {
        let nasty = "it's a $HOME `path`; rm -rf /";
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("printf %s {}", shell_quote(nasty)))
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), nasty);
    }
}
