//! Shell process bound to a PTY
//!
//! `PtyProcess` forks a shell into a pseudo-terminal, reads its output on a
//! background thread and reaps it on a second thread that reports the exit
//! status exactly once through the engine event channel.

use super::{EngineEvent, EventSender, ProcessId, StartRequest};
use crate::error::SpawnError;
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::libc;
use nix::pty::{Winsize, openpty};
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::sync::mpsc::{Receiver, channel};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// How long to wait for the process group after SIGKILL
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Exit status shared between the reaper thread and `terminate`
#[derive(Default)]
struct ExitState {
    status: Mutex<Option<Option<i32>>>,
    exited: Condvar,
}

impl ExitState {
    fn mark(&self, exit_code: Option<i32>) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        *status = Some(exit_code);
        self.exited.notify_all();
    }

    fn has_exited(&self) -> bool {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn wait(&self, timeout: Duration) -> bool {
        let status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        let (status, _) = self
            .exited
            .wait_timeout_while(status, timeout, |status| status.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        status.is_some()
    }
}

/// Iterator for reading from PTY in a background thread.
///
/// Yields chunks until EOF or a read error. The file descriptor is kept alive
/// through the Arc for as long as the reader exists.
struct PtyReader {
    master: Arc<OwnedFd>,
}

impl Iterator for PtyReader {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = [0u8; 4096];

        loop {
            match nix::unistd::read(self.master.as_raw_fd(), &mut buf) {
                Ok(0) => return None,
                Ok(n) => return Some(buf[..n].to_vec()),
                Err(Errno::EINTR) => continue,
                // EIO once the slave side is closed
                Err(_) => return None,
            }
        }
    }
}

/// Argument vectors prepared before `fork` so the child only execs
struct ExecImage {
    path: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    cwd: CString,
}

impl ExecImage {
    fn new(request: &StartRequest) -> Result<Self, SpawnError> {
        let path = CString::new(request.executable.as_os_str().as_bytes())?;

        let mut argv = Vec::with_capacity(request.args.len() + 1);
        argv.push(CString::new(request.exec_name.as_str())?);
        for arg in &request.args {
            argv.push(CString::new(arg.as_str())?);
        }

        let envp = request
            .environment
            .iter()
            .map(|(key, value)| {
                let mut entry = Vec::with_capacity(key.len() + value.len() + 1);
                entry.extend_from_slice(key.as_bytes());
                entry.push(b'=');
                entry.extend_from_slice(value.as_bytes());
                CString::new(entry)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cwd = CString::new(request.working_directory.as_os_str().as_bytes())?;

        Ok(Self {
            path,
            argv,
            envp,
            cwd,
        })
    }
}

/// Shell process with PTY, background reader and exit reaper
pub struct PtyProcess {
    master: Arc<OwnedFd>,
    pid: Pid,
    exit: Arc<ExitState>,
    /// Output chunks from the background reader thread
    pub receiver: Receiver<Vec<u8>>,
}

impl PtyProcess {
    /// Fork `request.executable` into a new PTY.
    ///
    /// The child becomes a session leader with the PTY as its controlling
    /// terminal, changes into `request.working_directory` and execs the shell
    /// with `request.environment` as its complete environment. An exec
    /// failure is reported back over a close-on-exec pipe so it surfaces here
    /// as `SpawnError::Exec` rather than as an early exit.
    pub fn spawn(request: &StartRequest, events: EventSender) -> Result<Self, SpawnError> {
        let image = ExecImage::new(request)?;

        let winsize = Winsize {
            ws_row: request.rows,
            ws_col: request.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let pty = openpty(Some(&winsize), None).map_err(SpawnError::Pty)?;
        // Shells of other sessions must not inherit this terminal
        set_cloexec(&pty.master).map_err(SpawnError::Pty)?;
        set_cloexec(&pty.slave).map_err(SpawnError::Pty)?;

        let (status_read, status_write) = nix::unistd::pipe().map_err(SpawnError::Fork)?;
        set_cloexec(&status_read).map_err(SpawnError::Fork)?;
        set_cloexec(&status_write).map_err(SpawnError::Fork)?;

        match unsafe { fork() }.map_err(SpawnError::Fork)? {
            ForkResult::Child => {
                drop(pty.master);
                drop(status_read);
                exec_child(&image, pty.slave, &status_write)
            }
            ForkResult::Parent { child } => {
                drop(pty.slave);
                drop(status_write);

                if let Some(errno) = read_exec_status(&status_read) {
                    let _ = waitpid(child, None);
                    return Err(SpawnError::Exec {
                        executable: request.executable.clone(),
                        source: errno,
                    });
                }

                let master = Arc::new(pty.master);
                let exit = Arc::new(ExitState::default());
                let pid = ProcessId(child.as_raw() as u32);

                let (tx, rx) = channel();
                let reader = PtyReader {
                    master: Arc::clone(&master),
                };
                thread::spawn(move || {
                    for data in reader {
                        if tx.send(data).is_err() {
                            break;
                        }
                    }
                });

                let reaper_exit = Arc::clone(&exit);
                thread::spawn(move || {
                    let exit_code = reap(child);
                    tracing::debug!(%pid, ?exit_code, "shell process reaped");
                    reaper_exit.mark(exit_code);
                    let _ = events.send(EngineEvent::ProcessTerminated { pid, exit_code });
                });

                Ok(Self {
                    master,
                    pid: child,
                    exit,
                    receiver: rx,
                })
            }
        }
    }

    pub fn pid(&self) -> ProcessId {
        ProcessId(self.pid.as_raw() as u32)
    }

    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }

    /// Write data to the shell's input
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        nix::unistd::write(self.master.as_ref(), buf).map_err(|e| e.into())
    }

    /// Resize the pseudo-terminal window
    pub fn resize(&mut self, cols: u16, rows: u16) -> io::Result<()> {
        let winsize = Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        unsafe {
            if libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &winsize) == -1 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }

    /// Hang up the shell's process group, then kill it if it outlives `grace`.
    ///
    /// Returns true once the reaper has observed the exit.
    pub fn terminate(&self, grace: Duration) -> bool {
        if self.exit.has_exited() {
            return true;
        }

        if let Err(e) = killpg(self.pid, Signal::SIGHUP) {
            tracing::debug!(pid = %self.pid, error = %e, "SIGHUP to process group failed");
        }
        if self.exit.wait(grace) {
            return true;
        }

        tracing::warn!(pid = %self.pid, ?grace, "shell ignored hangup, killing process group");
        if let Err(e) = killpg(self.pid, Signal::SIGKILL) {
            tracing::debug!(pid = %self.pid, error = %e, "SIGKILL to process group failed");
        }
        self.exit.wait(KILL_GRACE)
    }
}

fn set_cloexec(fd: &OwnedFd) -> nix::Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map(|_| ())
}

/// Runs in the forked child; never returns.
fn exec_child(image: &ExecImage, slave: OwnedFd, status_write: &OwnedFd) -> ! {
    let _ = nix::unistd::setsid();

    let slave_fd = slave.as_raw_fd();

    // Make the slave the controlling terminal
    unsafe {
        libc::ioctl(slave_fd, libc::TIOCSCTTY, 0);
    }

    let _ = nix::unistd::dup2(slave_fd, 0);
    let _ = nix::unistd::dup2(slave_fd, 1);
    let _ = nix::unistd::dup2(slave_fd, 2);

    if slave_fd > 2 {
        drop(slave);
    } else {
        std::mem::forget(slave);
    }

    if nix::unistd::chdir(image.cwd.as_c_str()).is_err() {
        let _ = nix::unistd::chdir(c"/");
    }

    let errno = match nix::unistd::execve(&image.path, &image.argv, &image.envp) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };

    let _ = nix::unistd::write(status_write, &(errno as i32).to_ne_bytes());
    unsafe { libc::_exit(127) }
}

/// Reads the exec status pipe. EOF means exec succeeded.
fn read_exec_status(status_read: &OwnedFd) -> Option<Errno> {
    let mut buf = [0u8; 4];
    loop {
        match nix::unistd::read(status_read.as_raw_fd(), &mut buf) {
            Ok(4) => return Some(Errno::from_raw(i32::from_ne_bytes(buf))),
            Err(Errno::EINTR) => continue,
            Ok(_) | Err(_) => return None,
        }
    }
}

fn reap(child: Pid) -> Option<i32> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => return Some(code),
            Ok(WaitStatus::Signaled(..)) => return None,
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(_) => return None,
        }
    }
}
