use std::time::Duration;

use super::{HttpProbe, ProbeOutcome};

/// [`HttpProbe`] that issues real requests when the `http-probe` feature is
/// enabled and reports [`ProbeOutcome::Unavailable`] otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHttpProbe;

impl SystemHttpProbe {
    /// Builds the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[cfg(feature = "http-probe")]
impl HttpProbe for SystemHttpProbe {
    fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        match agent.get(url).call() {
            Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
            Err(error) => {
                tracing::debug!(
                    target: super::SYSTEM_TARGET,
                    url,
                    error = %error,
                    "probe request failed"
                );
                ProbeOutcome::Unreachable(error.to_string())
            }
        }
    }
}

#[cfg(not(feature = "http-probe"))]
impl HttpProbe for SystemHttpProbe {
    fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
        ProbeOutcome::Unavailable
    }
}

#[cfg(all(test, feature = "http-probe"))]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{Ipv4Addr, TcpListener};
    use std::thread;

    use super::*;

    fn serve_once(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).is_ok_and(|read| read > 2) {
                line.clear();
            }
            let mut stream = reader.into_inner();
            let _ = write!(
                stream,
                "{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
        });
        port
    }

    #[test]
    fn reports_the_response_status() {
        let port = serve_once("HTTP/1.1 200 OK");
        let url = format!("http://127.0.0.1:{port}/api/status");
        let outcome = SystemHttpProbe::new().probe(&url, Duration::from_secs(5));
        assert_eq!(outcome, ProbeOutcome::Status(200));
    }

    #[test]
    fn non_success_statuses_are_not_errors() {
        let port = serve_once("HTTP/1.1 503 Service Unavailable");
        let url = format!("http://127.0.0.1:{port}/api/status");
        let outcome = SystemHttpProbe::new().probe(&url, Duration::from_secs(5));
        assert_eq!(outcome, ProbeOutcome::Status(503));
    }

    #[test]
    fn closed_port_is_unreachable() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        let url = format!("http://127.0.0.1:{port}/");
        let outcome = SystemHttpProbe::new().probe(&url, Duration::from_secs(1));
        assert!(matches!(outcome, ProbeOutcome::Unreachable(_)));
    }
}
