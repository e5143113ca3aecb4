//-
// Copyright 2024 The autoshrink developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Isolating a single property call in a forked child process, with a
//! timeout and crash-as-fail semantics.
//!
//! The parent and child communicate over a one-shot pipe: the child writes
//! exactly one result byte and exits; the parent `poll`s the read end,
//! bounded by the configured timeout, and treats a pipe closed without a
//! byte as a crash (`CallResult::Fail`).

use crate::config::ForkConfig;
use crate::errors::{CallResult, FuzzError, HookRun};
use crate::reason::Reason;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

const MAX_FORK_RETRIES: u32 = 10;
const DEFAULT_EXIT_TIMEOUT_MS: u32 = 10;
const KILL_GRACE_MS: u32 = 10;

fn resource_err(what: &'static str) -> FuzzError {
    FuzzError::Resource(Reason::with_location(what))
}

/// Run `prop` in a forked child process, returning its result once the
/// child reports it (or a crash/timeout-derived result if it doesn't).
///
/// `post_fork` is invoked in the child, before `prop`; if it returns
/// [`HookRun::Error`] the child aborts with `CallResult::Error` instead of
/// calling `prop` at all. Any other `HookRun` is treated as "continue",
/// matching the reference implementation's fork-post hook.
pub fn call_in_worker<F>(
    prop: F,
    cfg: &ForkConfig,
    post_fork: Option<&dyn Fn() -> HookRun>,
) -> Result<CallResult, FuzzError>
where
    F: FnOnce() -> CallResult,
{
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return Err(resource_err("failed to create worker pipe"));
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    let pid = match fork_with_retry() {
        Ok(pid) => pid,
        Err(e) => {
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            return Err(e);
        }
    };

    if pid == 0 {
        unsafe { libc::close(read_fd) };
        let result = match post_fork {
            Some(hook) if matches!(hook(), HookRun::Error) => CallResult::Error,
            _ => panic::catch_unwind(AssertUnwindSafe(prop)).unwrap_or(CallResult::Error),
        };
        let byte = result as u8;
        unsafe {
            let wr = libc::write(write_fd, &byte as *const u8 as *const _, 1);
            libc::close(write_fd);
            libc::_exit(if wr == 1 && result == CallResult::Ok {
                0
            } else {
                1
            });
        }
    }

    unsafe { libc::close(write_fd) };
    let res = parent_handle_child(pid, read_fd, cfg);
    unsafe { libc::close(read_fd) };
    reap_available(None);
    res
}

fn fork_with_retry() -> Result<libc::pid_t, FuzzError> {
    let mut backoff_ns: i64 = 1;
    loop {
        let pid = unsafe { libc::fork() };
        if pid != -1 {
            return Ok(pid);
        }

        let errno = std::io::Error::last_os_error();
        if errno.raw_os_error() != Some(libc::EAGAIN) {
            return Err(resource_err("fork failed"));
        }

        // Forking is probably failing due to a process-count limit; give
        // terminated children a chance to be reaped before retrying.
        reap_available(None);

        let ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: backoff_ns,
        };
        if unsafe { libc::nanosleep(&ts, std::ptr::null_mut()) } == -1 {
            return Err(resource_err("nanosleep failed while retrying fork"));
        }

        if backoff_ns >= (1i64 << MAX_FORK_RETRIES) {
            return Err(resource_err("fork failed after exhausting retries"));
        }
        backoff_ns <<= 1;
    }
}

/// Reap any children that have changed state without blocking. If `only`
/// is `Some(pid)`, records and returns that pid's wait status.
fn reap_available(only: Option<libc::pid_t>) -> Option<libc::c_int> {
    let mut found = None;
    loop {
        let mut wstatus: libc::c_int = 0;
        let res = unsafe { libc::waitpid(-1, &mut wstatus, libc::WNOHANG) };
        if res <= 0 {
            break;
        }
        if Some(res) == only {
            found = Some(wstatus);
        }
    }
    found
}

fn parent_handle_child(
    pid: libc::pid_t,
    read_fd: libc::c_int,
    cfg: &ForkConfig,
) -> Result<CallResult, FuzzError> {
    let mut pfd = libc::pollfd {
        fd: read_fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout = if cfg.timeout_ms == 0 {
        -1
    } else {
        cfg.timeout_ms as libc::c_int
    };

    let res = loop {
        let res = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if res == -1 {
            let errno = std::io::Error::last_os_error();
            match errno.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => continue,
                _ => return Err(resource_err("poll on worker pipe failed")),
            }
        }
        break res;
    };

    if res == 0 {
        // Timed out: signal the child, then decide pass/fail based on
        // whether it still manages to exit successfully despite the race.
        let signal = if cfg.signal == 0 {
            libc::SIGTERM
        } else {
            cfg.signal
        };
        if unsafe { libc::kill(pid, signal) } == -1 {
            return Err(resource_err("failed to signal timed-out worker"));
        }

        let exit_timeout_ms = if cfg.exit_timeout_ms == 0 {
            DEFAULT_EXIT_TIMEOUT_MS
        } else {
            cfg.exit_timeout_ms
        };
        let wstatus = wait_for_exit(pid, exit_timeout_ms, KILL_GRACE_MS);

        return Ok(match wstatus {
            Some(st) if exited_successfully(st) => CallResult::Ok,
            _ => CallResult::Fail,
        });
    }

    // Not a timeout: read exactly one byte, or treat a clean EOF as a
    // crash.
    let mut byte = [0u8; 1];
    loop {
        let rd = unsafe {
            libc::read(read_fd, byte.as_mut_ptr() as *mut _, 1)
        };
        if rd == -1 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(resource_err("read from worker pipe failed"));
        }
        return Ok(if rd == 0 {
            CallResult::Fail
        } else {
            CallResult::from_byte(byte[0])
        });
    }
}

fn exited_successfully(wstatus: libc::c_int) -> bool {
    libc::WIFEXITED(wstatus) && libc::WEXITSTATUS(wstatus) == 0
}

/// Poll for up to `timeout_ms` for the child to have already exited; if it
/// hasn't by then, send `SIGKILL` and keep polling for up to
/// `kill_grace_ms` more.
fn wait_for_exit(
    pid: libc::pid_t,
    timeout_ms: u32,
    kill_grace_ms: u32,
) -> Option<libc::c_int> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
    loop {
        if let Some(st) = reap_available(Some(pid)) {
            return Some(st);
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    if unsafe { libc::kill(pid, libc::SIGKILL) } == -1 {
        let errno = std::io::Error::last_os_error();
        if errno.raw_os_error() != Some(libc::ESRCH) {
            return None;
        }
    }

    let deadline = Instant::now() + Duration::from_millis(kill_grace_ms as u64);
    loop {
        if let Some(st) = reap_available(Some(pid)) {
            return Some(st);
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passing_property_reports_ok() {
        let cfg = ForkConfig::default();
        let result = call_in_worker(|| CallResult::Ok, &cfg, None);
        assert_eq!(result.unwrap(), CallResult::Ok);
    }

    #[test]
    fn failing_property_reports_fail() {
        let cfg = ForkConfig::default();
        let result = call_in_worker(|| CallResult::Fail, &cfg, None);
        assert_eq!(result.unwrap(), CallResult::Fail);
    }

    #[test]
    fn panicking_property_reports_fail_via_exit_code() {
        let cfg = ForkConfig::default();
        let result = call_in_worker(
            || -> CallResult { panic!("boom") },
            &cfg,
            None,
        );
        // The child catches the panic, writes CallResult::Error, and exits
        // non-zero; the parent reads that byte directly (no timeout race),
        // so it observes Error rather than a pipe-closed crash.
        assert_eq!(result.unwrap(), CallResult::Error);
    }

    #[test]
    fn timeout_kills_worker_and_reports_fail() {
        let mut cfg = ForkConfig::default();
        cfg.timeout_ms = 20;
        let result = call_in_worker(
            || {
                std::thread::sleep(Duration::from_secs(5));
                CallResult::Ok
            },
            &cfg,
            None,
        );
        assert_eq!(result.unwrap(), CallResult::Fail);
    }
}
