//! End-to-end tests over the library surface.
//!
//! These exercise the full signup -> login -> summarize flow without a
//! running server or network access.

use std::sync::atomic::{AtomicUsize, Ordering};

use lexsum::{
    hash_password, summarize_document, AuthService, CredentialStore, DocumentLoader, Error,
    Session, SessionManager, SessionState, Summarizer,
};

/// Stub summarizer that records calls and echoes a canned summary.
struct StubSummarizer {
    calls: AtomicUsize,
}

impl StubSummarizer {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Summarizer for StubSummarizer {
    async fn summarize(&self, document_content: &str) -> Result<String, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("summary of {} chars", document_content.len()))
    }
}

// =============================================================================
// Auth flow
// =============================================================================

#[test]
fn test_signup_login_logout_flow_with_file_backed_store() -> Result<(), Error> {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("users.db"))?;
    let auth = AuthService::new(store);

    auth.signup("paralegal", "s3cret")?;

    // Signup alone never authenticates.
    let mut session = Session::anonymous();
    assert_eq!(session.state(), &SessionState::Anonymous);

    auth.login(&mut session, "paralegal", "s3cret")?;
    assert_eq!(
        session.state(),
        &SessionState::Authenticated("paralegal".to_string())
    );

    auth.logout(&mut session);
    assert_eq!(session.state(), &SessionState::Anonymous);
    Ok(())
}

#[test]
fn test_credentials_survive_reopen() -> Result<(), Error> {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("users.db");

    {
        let auth = AuthService::new(CredentialStore::open(&db)?);
        auth.signup("paralegal", "s3cret")?;
    }

    // New process, same database file.
    let auth = AuthService::new(CredentialStore::open(&db)?);
    let mut session = Session::anonymous();
    auth.login(&mut session, "paralegal", "s3cret")?;
    assert!(session.is_authenticated());
    Ok(())
}

#[test]
fn test_stored_password_is_a_digest_not_plaintext() -> Result<(), Error> {
    let store = CredentialStore::open_in_memory()?;
    let digest = hash_password("s3cret");
    store.insert_user("paralegal", &digest)?;

    // Looking up with the plaintext as if it were a digest finds nothing.
    assert!(store.find_user("paralegal", "s3cret")?.is_none());
    assert!(store.find_user("paralegal", &digest)?.is_some());
    Ok(())
}

#[test]
fn test_failed_login_leaves_no_session_in_manager() {
    let auth = AuthService::new(CredentialStore::open_in_memory().unwrap());
    let manager = SessionManager::new();
    auth.signup("paralegal", "s3cret").unwrap();

    let mut session = Session::anonymous();
    let err = auth
        .login(&mut session, "paralegal", "wrong")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
    assert!(manager.is_empty());
}

// =============================================================================
// Upload-and-summarize pipeline
// =============================================================================

#[tokio::test]
async fn test_pipeline_txt_document() {
    let loader = DocumentLoader::new();
    let stub = StubSummarizer::new();

    let summary = summarize_document(&loader, &stub, "contract.txt", b"Hello, World")
        .await
        .unwrap();
    assert_eq!(summary, "summary of 12 chars");
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn test_pipeline_rejects_unsupported_format_before_model() {
    let loader = DocumentLoader::new();
    let stub = StubSummarizer::new();

    let err = summarize_document(&loader, &stub, "ledger.csv", b"a,b,c")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert_eq!(err.to_string(), "unsupported file type");
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn test_pipeline_cleans_spool_dir_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let loader = DocumentLoader::with_spool_dir(dir.path());
    let stub = StubSummarizer::new();

    let err = summarize_document(&loader, &stub, "broken.pdf", b"garbage")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert_eq!(stub.call_count(), 0);

    // Spool file removed even though extraction failed.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
