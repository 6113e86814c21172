use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use super::{PortTable, SYSTEM_TARGET, SystemError};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const LOOKUP_PROGRAM: &str = "lsof";

/// [`PortTable`] backed by a loopback connect and `lsof`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortTable;

impl SystemPortTable {
    /// Builds the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PortTable for SystemPortTable {
    fn is_listening(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(_) => true,
            Err(error) => {
                debug!(
                    target: SYSTEM_TARGET,
                    port,
                    error = %error,
                    "port not accepting connections"
                );
                false
            }
        }
    }

    fn owners(&self, port: u16) -> Result<Vec<u32>, SystemError> {
        let output = Command::new(LOOKUP_PROGRAM)
            .arg("-t")
            .arg("-i")
            .arg(format!(":{port}"))
            .output()
            .map_err(|source| SystemError::Command {
                program: LOOKUP_PROGRAM.to_owned(),
                source,
            })?;
        // `lsof` exits non-zero when nothing matches; an empty answer is
        // still a valid answer.
        if !output.status.success() && !output.stderr.is_empty() {
            let message = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(SystemError::Command {
                program: LOOKUP_PROGRAM.to_owned(),
                source: io::Error::other(message),
            });
        }
        Ok(parse_pids(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_pids(listing: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = listing
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", vec![])]
    #[case("4242\n", vec![4242])]
    #[case("17\n9\n17\n", vec![9, 17])]
    #[case("COMMAND\n12\n", vec![12])]
    fn parses_terse_lsof_output(#[case] listing: &str, #[case] expected: Vec<u32>) {
        assert_eq!(parse_pids(listing), expected);
    }

    #[test]
    fn bound_listener_is_reported_as_listening() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        assert!(SystemPortTable::new().is_listening(port));
        drop(listener);
        assert!(!SystemPortTable::new().is_listening(port));
    }
}
