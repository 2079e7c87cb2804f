//! Detaching from the controlling terminal.
//!
//! Must run before the tokio runtime exists: `fork` only carries the calling
//! thread into the child.

use std::path::{Path, PathBuf};

/// PID file owned by the running daemon; removed when dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
mod imp {
    use std::fs::OpenOptions;
    use std::io::{self, Write};
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    use anyhow::Context;

    use super::PidFile;

    const PID_FILE_MODE: u32 = 0o644;
    const DAEMON_UMASK: libc::mode_t = 0o027;

    /// Forks into the background. Returns only in the child; the parent exits.
    pub fn daemonize(work_dir: &Path, pid_file: &Path) -> anyhow::Result<PidFile> {
        // SAFETY: called before any other thread is started.
        match unsafe { libc::fork() } {
            -1 => return Err(io::Error::last_os_error()).context("fork"),
            0 => {}
            _ => std::process::exit(0),
        }

        // SAFETY: plain syscalls with no pointer arguments.
        if unsafe { libc::setsid() } == -1 {
            return Err(io::Error::last_os_error()).context("setsid");
        }
        unsafe {
            libc::umask(DAEMON_UMASK);
        }

        std::env::set_current_dir(work_dir)
            .with_context(|| format!("changing directory to {}", work_dir.display()))?;
        redirect_stdio().context("redirecting stdio to /dev/null")?;

        write_pid_file(pid_file)
    }

    pub fn write_pid_file(path: &Path) -> anyhow::Result<PidFile> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(PID_FILE_MODE)
            .open(path)
            .with_context(|| format!("creating pid file {}", path.display()))?;
        writeln!(file, "{}", std::process::id())?;
        Ok(PidFile {
            path: path.to_path_buf(),
        })
    }

    fn redirect_stdio() -> io::Result<()> {
        let null = OpenOptions::new().read(true).write(true).open("/dev/null")?;
        let fd = null.as_raw_fd();
        for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
            // SAFETY: both descriptors are valid for the duration of the call.
            if unsafe { libc::dup2(fd, target) } == -1 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
pub use imp::{daemonize, write_pid_file};
