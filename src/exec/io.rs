//! I/O redirection
//!
//! Applies redirections either destructively in a forked child or with a
//! scoped save/restore of the parent's fd table (used by brace groups and
//! builtins). Restoring after applying is idempotent on the fd table.

use std::os::fd::{IntoRawFd, RawFd};

use log::debug;
use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2, pipe, write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("{path}: {source}")]
    Open { path: String, source: nix::errno::Errno },
    #[error("bad file descriptor: {0}")]
    BadFd(i32),
    #[error("{0}")]
    Sys(#[from] nix::errno::Errno),
}

/// One redirection to apply, already resolved from tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Redirect {
    /// `< path` (fd defaults to 0)
    ReadFile { fd: RawFd, path: String },
    /// `> path` / `>> path` / `>| path` (fd defaults to 1)
    WriteFile { fd: RawFd, path: String, append: bool },
    /// `<> path`
    ReadWriteFile { fd: RawFd, path: String },
    /// `N>&M` / `N<&M`
    DupFd { fd: RawFd, target: RawFd },
    /// `N>&-`
    CloseFd { fd: RawFd },
    /// `&> path` / `&>> path`: stdout and stderr together
    CombinedOutput { path: String, append: bool },
    /// Heredoc or here-string body fed over a pipe into `fd`
    HereBody { fd: RawFd, body: String },
}

/// A saved fd-table entry: `(fd, previous)` where `previous` is a duplicate
/// of the old descriptor, or None when the fd was closed.
pub type SavedFds = Vec<(RawFd, Option<RawFd>)>;

/// Applies and restores redirections.
#[derive(Debug, Default)]
pub struct IoManager;

impl IoManager {
    pub fn new() -> Self {
        Self
    }

    /// Apply redirections in the current process, saving the previous fd
    /// table entries for `restore_redirections`. Used for brace groups and
    /// builtins, where the shell itself must not lose its descriptors.
    pub fn apply_redirections(&self, redirects: &[Redirect]) -> Result<SavedFds, IoError> {
        let mut saved: SavedFds = Vec::new();
        for redirect in redirects {
            for fd in Self::affected_fds(redirect) {
                // Duplicate above the user range so the saved fd never
                // collides with a later redirection target
                let previous = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(10)).ok();
                saved.push((fd, previous));
            }
            if let Err(e) = self.apply_one(redirect) {
                self.restore_redirections(saved);
                return Err(e);
            }
        }
        Ok(saved)
    }

    /// Undo `apply_redirections`. Restores every saved entry in reverse
    /// order; descriptors that did not exist before are closed again.
    pub fn restore_redirections(&self, saved: SavedFds) {
        for (fd, previous) in saved.into_iter().rev() {
            match previous {
                Some(old) => {
                    let _ = dup2(old, fd);
                    let _ = close(old);
                }
                None => {
                    let _ = close(fd);
                }
            }
        }
    }

    /// Apply redirections destructively. Only for forked children, after
    /// which the process image is replaced or exits.
    pub fn setup_child_redirections(&self, redirects: &[Redirect]) -> Result<(), IoError> {
        for redirect in redirects {
            self.apply_one(redirect)?;
        }
        Ok(())
    }

    fn affected_fds(redirect: &Redirect) -> Vec<RawFd> {
        match redirect {
            Redirect::ReadFile { fd, .. }
            | Redirect::WriteFile { fd, .. }
            | Redirect::ReadWriteFile { fd, .. }
            | Redirect::DupFd { fd, .. }
            | Redirect::CloseFd { fd }
            | Redirect::HereBody { fd, .. } => vec![*fd],
            Redirect::CombinedOutput { .. } => vec![1, 2],
        }
    }

    fn apply_one(&self, redirect: &Redirect) -> Result<(), IoError> {
        debug!("redirect {:?}", redirect);
        match redirect {
            Redirect::ReadFile { fd, path } => {
                let file = open(path.as_str(), OFlag::O_RDONLY, Mode::empty())
                    .map_err(|e| IoError::Open { path: path.clone(), source: e })?;
                move_fd(file, *fd)?;
            }
            Redirect::WriteFile { fd, path, append } => {
                let file = open_for_write(path, *append)?;
                move_fd(file, *fd)?;
            }
            Redirect::ReadWriteFile { fd, path } => {
                let flags = OFlag::O_RDWR | OFlag::O_CREAT;
                let file = open(path.as_str(), flags, Mode::from_bits_truncate(0o644))
                    .map_err(|e| IoError::Open { path: path.clone(), source: e })?;
                move_fd(file, *fd)?;
            }
            Redirect::DupFd { fd, target } => {
                dup2(*target, *fd).map_err(|_| IoError::BadFd(*target))?;
            }
            Redirect::CloseFd { fd } => {
                close(*fd).map_err(|_| IoError::BadFd(*fd))?;
            }
            Redirect::CombinedOutput { path, append } => {
                let file = open_for_write(path, *append)?;
                dup2(file, 1)?;
                dup2(file, 2)?;
                if file != 1 && file != 2 {
                    let _ = close(file);
                }
            }
            Redirect::HereBody { fd, body } => {
                let (read_end, write_end) = pipe()?;
                let read_fd = read_end.into_raw_fd();
                let _ = write(&write_end, body.as_bytes());
                drop(write_end);
                move_fd(read_fd, *fd)?;
            }
        }
        Ok(())
    }
}

fn open_for_write(path: &str, append: bool) -> Result<RawFd, IoError> {
    let mut flags = OFlag::O_WRONLY | OFlag::O_CREAT;
    if append {
        flags |= OFlag::O_APPEND;
    } else {
        flags |= OFlag::O_TRUNC;
    }
    open(path, flags, Mode::from_bits_truncate(0o644))
        .map_err(|e| IoError::Open { path: path.to_string(), source: e })
}

/// dup2 `from` onto `to` and close the original when they differ.
fn move_fd(from: RawFd, to: RawFd) -> Result<(), IoError> {
    if from != to {
        dup2(from, to)?;
        let _ = close(from);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use nix::unistd::read;
    use std::io::Write;

    fn temp_path(name: &str) -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("jsh-io-test-{}-{}", std::process::id(), name));
        p.to_string_lossy().into_owned()
    }

    #[test]
    #[serial]
    fn test_write_redirect_apply_restore() {
        let path = temp_path("out");
        let io = IoManager::new();

        // Redirect a high fd rather than stdout so test output survives
        let _ = close(27);
        let redirects = vec![Redirect::WriteFile { fd: 27, path: path.clone(), append: false }];
        let saved = io.apply_redirections(&redirects).unwrap();
        write(unsafe { std::os::fd::BorrowedFd::borrow_raw(27) }, b"hello").unwrap();
        io.restore_redirections(saved);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "hello");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[serial]
    fn test_apply_then_restore_is_idempotent() {
        let path = temp_path("idem");
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();
        let io = IoManager::new();

        let _ = close(28);
        let redirects = vec![Redirect::ReadFile { fd: 28, path: path.clone() }];
        let saved = io.apply_redirections(&redirects).unwrap();
        io.restore_redirections(saved);
        // the fd must be closed again: reading it fails
        assert!(read(28, &mut [0u8; 1]).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[serial]
    fn test_missing_file_error_restores() {
        let io = IoManager::new();
        let _ = close(28);
        let redirects = vec![Redirect::ReadFile { fd: 28, path: "/no/such/file".to_string() }];
        let err = io.apply_redirections(&redirects);
        assert!(err.is_err());
        assert!(read(28, &mut [0u8; 1]).is_err());
    }

    #[test]
    #[serial]
    fn test_here_body() {
        let io = IoManager::new();
        let _ = close(29);
        let redirects = vec![Redirect::HereBody { fd: 29, body: "hello\n".to_string() }];
        let saved = io.apply_redirections(&redirects).unwrap();
        let mut buf = [0u8; 16];
        let n = read(29, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello\n");
        io.restore_redirections(saved);
    }
}
