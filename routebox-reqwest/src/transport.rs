//! Classification of reqwest errors into transport failure codes.

use std::error::Error as _;
use std::io;

use routebox_core::TransportFailureCode;

/// Returns the transport failure code for an error raised while the upstream
/// never produced a complete response.
///
/// `None` means the error is not a transport failure (request building,
/// serialization, decoding, ...).
pub fn transport_code(error: &reqwest::Error) -> Option<TransportFailureCode> {
    if error.is_timeout() {
        return Some(TransportFailureCode::TimedOut);
    }
    if !(error.is_connect() || error.is_request() || error.is_body()) {
        return None;
    }

    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>()
            && let Some(code) = io_code(io_error.kind())
        {
            return Some(code);
        }
        if is_resolution_failure(cause) {
            return Some(TransportFailureCode::NotFound);
        }
        source = cause.source();
    }

    Some(if error.is_connect() {
        TransportFailureCode::Other
    } else {
        TransportFailureCode::ConnectionReset
    })
}

// The connector reports resolver failures as "dns error", the system
// resolver as "failed to lookup address".
fn is_resolution_failure(cause: &(dyn std::error::Error + 'static)) -> bool {
    let message = cause.to_string();
    message.contains("dns error") || message.contains("failed to lookup address")
}

fn io_code(kind: io::ErrorKind) -> Option<TransportFailureCode> {
    match kind {
        io::ErrorKind::ConnectionRefused => Some(TransportFailureCode::ConnectionRefused),
        io::ErrorKind::TimedOut => Some(TransportFailureCode::TimedOut),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(TransportFailureCode::ConnectionReset),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_codes() {
        assert_eq!(
            io_code(io::ErrorKind::ConnectionRefused),
            Some(TransportFailureCode::ConnectionRefused)
        );
        assert_eq!(
            io_code(io::ErrorKind::BrokenPipe),
            Some(TransportFailureCode::ConnectionReset)
        );
        assert_eq!(io_code(io::ErrorKind::InvalidData), None);
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = reqwest::Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap_err();

        assert_eq!(
            transport_code(&error),
            Some(TransportFailureCode::ConnectionRefused)
        );
    }

    #[tokio::test]
    async fn unresolvable_host_is_not_found() {
        let error = reqwest::Client::new()
            .get("http://nonexistent.invalid/")
            .send()
            .await
            .unwrap_err();

        assert_eq!(transport_code(&error), Some(TransportFailureCode::NotFound));
    }

    #[test]
    fn resolver_messages_are_resolution_failures() {
        let dns = io::Error::other("dns error");
        let lookup =
            io::Error::other("failed to lookup address information: Name or service not known");
        let other = io::Error::other("certificate expired");

        assert!(is_resolution_failure(&dns));
        assert!(is_resolution_failure(&lookup));
        assert!(!is_resolution_failure(&other));
    }

    #[test]
    fn builder_errors_are_not_transport_failures() {
        let error = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();

        assert_eq!(transport_code(&error), None);
    }
}
