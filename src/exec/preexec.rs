/// Pre-exec setup for the sandboxed child.
///
/// Runs in the forked child between `fork` and `exec`, so it only issues
/// plain syscalls and never allocates on the success path. Order:
/// 1. parent-death signal, so a crashed judge never leaves a runaway child
/// 2. rlimit set (address space, CPU, file size, core, open files)
use crate::core::types::LaunchRequest;
use nix::sys::resource::{getrlimit, setrlimit, Resource};

/// Kernel resource limits applied to the child
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    pub address_space_bytes: u64,
    pub cpu_secs: u64,
    pub file_size_bytes: u64,
    pub open_files: u64,
}

impl ResourceLimits {
    pub fn from_request(request: &LaunchRequest) -> Self {
        Self {
            address_space_bytes: request.memory_limit_bytes,
            cpu_secs: request.cpu_limit_secs.max(1),
            file_size_bytes: request.file_size_limit_bytes,
            open_files: request.open_files_limit,
        }
    }

    /// Apply every limit to the calling process. Soft and hard limits are
    /// equal so the payload cannot raise them again.
    pub fn apply(&self) -> std::io::Result<()> {
        set(Resource::RLIMIT_AS, self.address_space_bytes)?;
        set(Resource::RLIMIT_CPU, self.cpu_secs)?;
        set(Resource::RLIMIT_FSIZE, self.file_size_bytes)?;
        set(Resource::RLIMIT_CORE, 0)?;
        set(Resource::RLIMIT_NOFILE, self.open_files)?;
        Ok(())
    }
}

/// Lower both limits to `limit`, never above the inherited hard limit.
fn set(resource: Resource, limit: u64) -> std::io::Result<()> {
    let (_, hard) = getrlimit(resource).map_err(std::io::Error::from)?;
    let value = (limit as libc::rlim_t).min(hard);
    setrlimit(resource, value, value).map_err(std::io::Error::from)
}

/// Ask the kernel to SIGKILL the child if the judge process dies.
#[cfg(target_os = "linux")]
pub fn set_parent_death_signal() -> std::io::Result<()> {
    let rc = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL as libc::c_ulong, 0, 0, 0) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_parent_death_signal() -> std::io::Result<()> {
    Ok(())
}

/// The complete pre-exec sequence.
pub fn prepare_child(limits: &ResourceLimits) -> std::io::Result<()> {
    set_parent_death_signal()?;
    limits.apply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn request() -> LaunchRequest {
        LaunchRequest {
            program: PathBuf::from("python3"),
            args: Vec::new(),
            workdir: PathBuf::from("/tmp"),
            timeout: Duration::from_secs(2),
            grace: Duration::from_secs(1),
            memory_limit_bytes: 128 * 1024 * 1024,
            cpu_limit_secs: 0,
            output_limit_bytes: 65536,
            file_size_limit_bytes: 4096,
            open_files_limit: 64,
        }
    }

    #[test]
    fn test_limits_from_request() {
        let limits = ResourceLimits::from_request(&request());
        assert_eq!(limits.address_space_bytes, 128 * 1024 * 1024);
        assert_eq!(limits.cpu_secs, 1);
        assert_eq!(limits.file_size_bytes, 4096);
        assert_eq!(limits.open_files, 64);
    }

    #[test]
    fn test_limits_apply_in_child() {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        let limits = ResourceLimits {
            address_space_bytes: 512 * 1024 * 1024,
            cpu_secs: 5,
            file_size_bytes: 1024,
            open_files: 32,
        };

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("ulimit -n");
        unsafe {
            cmd.pre_exec(move || prepare_child(&limits));
        }

        let Ok(output) = cmd.output() else {
            eprintln!("Skipping: /bin/sh unavailable");
            return;
        };
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "32");
    }
}
