//! Outcome classification for a single attempt.

use crate::transport::{HttpResponse, TransportError};
use crate::Error;

/// Map one attempt's outcome to a success or an [`Error`].
///
/// - 5xx => [`Error::ServerError`] (retryable)
/// - 3xx => [`Error::UnexpectedRedirect`] (fatal, a misconfigured host or path)
/// - anything else is handed back to the caller, 4xx included; the combined
///   response decoder rejects bodies it cannot use.
pub(crate) fn classify(
    outcome: std::result::Result<HttpResponse, TransportError>,
) -> crate::Result<HttpResponse> {
    let response = outcome?;
    match response.status {
        500..=599 => Err(Error::ServerError {
            status: response.status,
            body: response.body,
        }),
        300..=399 => Err(Error::UnexpectedRedirect {
            status: response.status,
            location: response.location,
        }),
        _ => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionFault;

    #[test]
    fn test_success_statuses() {
        for status in [200, 201, 204, 400, 404] {
            let resp = classify(Ok(HttpResponse::new(status, "[]"))).unwrap();
            assert_eq!(resp.status, status);
        }
    }

    #[test]
    fn test_server_errors() {
        for status in [500, 502, 503, 599] {
            let err = classify(Ok(HttpResponse::new(status, "oops"))).unwrap_err();
            assert!(matches!(err, Error::ServerError { status: s, .. } if s == status));
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_redirects_are_fatal() {
        let err = classify(Ok(
            HttpResponse::new(302, "").with_location("https://login.example/")
        ))
        .unwrap_err();
        match &err {
            Error::UnexpectedRedirect { status, location } => {
                assert_eq!(*status, 302);
                assert_eq!(location.as_deref(), Some("https://login.example/"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transport_errors_pass_through() {
        let err = classify(Err(TransportError::connection(
            ConnectionFault::Reset,
            "connection reset by peer",
        )))
        .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_retryable());
    }
}
