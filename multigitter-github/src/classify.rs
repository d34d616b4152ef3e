//! Mapping of GitHub API failures onto core error kinds
//!
//! The core protocol only understands a handful of failure kinds; everything
//! GitHub reports that does not map onto one of them is passed through as
//! [`Error::Remote`] with the original message.

use multigitter_core::Error;

/// Remote call being classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    GetRef,
    CreateRef,
    GetFile,
    PutFile,
    Search,
}

/// HTTP status and message of an API error response
fn api_failure(err: &octocrab::Error) -> Option<(u16, &str)> {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            Some((source.status_code.as_u16(), source.message.as_str()))
        }
        _ => None,
    }
}

/// Convert an octocrab error into a core error
///
/// `what` describes the object involved (branch, file) for the error message.
pub(crate) fn into_core(op: Operation, err: octocrab::Error, what: &str) -> Error {
    if let Some((status, message)) = api_failure(&err) {
        if let Some(classified) = classify(op, status, message, what) {
            return classified;
        }
    }

    Error::Remote(format!("{:?} {}: {}", op, what, err))
}

/// Classify a GitHub API error response, `None` when it has no core meaning
pub(crate) fn classify(op: Operation, status: u16, message: &str, what: &str) -> Option<Error> {
    match (op, status) {
        // An empty repository answers ref lookups with 409 "Git Repository is empty."
        (Operation::GetRef, 404 | 409) => Some(Error::NotFound(what.to_string())),
        (Operation::CreateRef, 422) if message.contains("already exists") => {
            Some(Error::AlreadyExists(what.to_string()))
        }
        (Operation::GetFile, 404) => Some(Error::NotFound(what.to_string())),
        (Operation::PutFile, 409) => Some(Error::MarkerMismatch {
            path: what.to_string(),
        }),
        // Creating over a file that appeared meanwhile: "\"sha\" wasn't supplied."
        (Operation::PutFile, 422) if message.contains("sha") => Some(Error::MarkerMismatch {
            path: what.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ref_is_not_found() {
        let err = classify(Operation::GetRef, 404, "Not Found", "branch 'x'").unwrap();
        assert!(matches!(err, Error::NotFound(ref what) if what == "branch 'x'"));
    }

    #[test]
    fn test_empty_repository_ref_is_not_found() {
        let err = classify(Operation::GetRef, 409, "Git Repository is empty.", "branch 'main'");
        assert!(matches!(err, Some(Error::NotFound(_))));
    }

    #[test]
    fn test_existing_ref_is_already_exists() {
        let err = classify(Operation::CreateRef, 422, "Reference already exists", "branch 'x'");
        assert!(matches!(err, Some(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_other_validation_failure_on_create_is_unclassified() {
        assert!(
            classify(Operation::CreateRef, 422, "Object does not exist", "branch 'x'").is_none()
        );
    }

    #[test]
    fn test_sha_conflict_is_marker_mismatch() {
        let err = classify(
            Operation::PutFile,
            409,
            "README.md does not match 0123456789abcdef",
            "README.md",
        );
        assert!(matches!(err, Some(Error::MarkerMismatch { ref path }) if path == "README.md"));
    }

    #[test]
    fn test_missing_sha_is_marker_mismatch() {
        let err = classify(
            Operation::PutFile,
            422,
            "Invalid request.\n\n\"sha\" wasn't supplied.",
            "README.md",
        );
        assert!(matches!(err, Some(Error::MarkerMismatch { .. })));
    }

    #[test]
    fn test_auth_failures_pass_through() {
        assert!(classify(Operation::PutFile, 401, "Bad credentials", "README.md").is_none());
        assert!(
            classify(Operation::GetFile, 403, "Resource not accessible", "README.md").is_none()
        );
        assert!(classify(Operation::Search, 404, "Not Found", "q").is_none());
    }
}
