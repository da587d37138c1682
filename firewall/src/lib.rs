pub mod app;
pub mod cmd;
pub mod collector;
pub mod config;
pub mod ebpf;
pub mod kernel;
pub mod pin;
pub mod shutdown;
pub mod teardown;

pub mod util {
    use std::{
        ffi::{c_char, CStr, CString},
        io,
    };

    use anyhow::{Context, Result};
    use log::{debug, warn};

    pub fn uname() -> io::Result<SysInfo> {
        let mut buf = unsafe { std::mem::zeroed() };
        match unsafe { libc::uname(&mut buf) } {
            0 => Ok(SysInfo::from(buf)),
            _ => Err(io::Error::last_os_error()),
        }
    }

    #[derive(Debug)]
    pub struct SysInfo {
        pub sys_name: String,
        pub node_name: String,
        pub release: String,
        pub version: String,
    }

    impl From<libc::utsname> for SysInfo {
        fn from(value: libc::utsname) -> Self {
            Self {
                sys_name: cstr(&value.sysname[..]).to_string_lossy().to_string(),
                node_name: cstr(&value.nodename[..]).to_string_lossy().to_string(),
                release: cstr(&value.release[..]).to_string_lossy().to_string(),
                version: cstr(&value.version[..]).to_string_lossy().to_string(),
            }
        }
    }

    #[inline]
    fn cstr(buf: &[c_char]) -> &CStr {
        unsafe { CStr::from_ptr(buf.as_ptr()) }
    }

    /// Resolve a network interface name to its kernel index.
    pub fn lookup_interface(iface: &str) -> Result<u32> {
        let name = CString::new(iface)
            .with_context(|| format!("interface name '{}' contains a NUL byte", iface))?;
        let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if index == 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("failed to lookup interface '{}'", iface));
        }

        Ok(index)
    }

    /// Lift RLIMIT_MEMLOCK on kernels that still charge eBPF memory against it.
    ///
    /// Since 5.11 eBPF allocations are accounted through memcg and the limit is
    /// ignored, so nothing is done there. An already unlimited limit is left alone.
    pub fn remove_memlock() -> Result<()> {
        let release = uname().context("failed to read kernel release")?.release;
        match memlock_enforced(&release) {
            Some(true) => {}
            Some(false) => {
                debug!("kernel {} uses memcg accounting, memlock untouched", release);
                return Ok(());
            }
            None => {
                warn!("unknown kernel release {:?}, memlock untouched", release);
                return Ok(());
            }
        }

        let mut current = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        if unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &mut current) } != 0 {
            return Err(io::Error::last_os_error()).context("failed to read memlock limit");
        }
        if current.rlim_cur == libc::RLIM_INFINITY && current.rlim_max == libc::RLIM_INFINITY {
            return Ok(());
        }

        let rlim = libc::rlimit {
            rlim_cur: libc::RLIM_INFINITY,
            rlim_max: libc::RLIM_INFINITY,
        };
        if unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) } != 0 {
            return Err(io::Error::last_os_error())
                .context("remove limit on locked memory failed");
        }
        debug!("removed memlock limit on kernel {}", release);

        Ok(())
    }

    /// Whether `release` (as reported by uname) predates memcg-based accounting,
    /// or `None` if the release does not start with `major.minor`.
    pub fn memlock_enforced(release: &str) -> Option<bool> {
        let mut parts = release
            .split(|c: char| !c.is_ascii_digit())
            .map(|p| p.parse::<u32>());
        match (parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor))) => Some((major, minor) < (5, 11)),
            _ => None,
        }
    }

    #[cfg(test)]
    mod test {
        use super::{lookup_interface, memlock_enforced};

        #[test]
        fn test_memlock_enforced() {
            assert_eq!(memlock_enforced("4.19.0-21-amd64"), Some(true));
            assert_eq!(memlock_enforced("5.10.0-19-cloud-amd64"), Some(true));
            assert_eq!(memlock_enforced("5.11.0"), Some(false));
            assert_eq!(memlock_enforced("6.1.0-13-amd64"), Some(false));
            assert_eq!(memlock_enforced("6.18.44-fc-v130"), Some(false));
            // unknown releases are left alone rather than guessed old
            assert_eq!(memlock_enforced("unknown"), None);
            assert_eq!(memlock_enforced("6"), None);
        }

        #[test]
        fn test_lookup_unknown_interface() {
            let err = lookup_interface("nonexistent0").unwrap_err();
            assert!(format!("{}", err).contains("nonexistent0"));

            assert!(lookup_interface("bad\0name").is_err());
        }
    }
}
