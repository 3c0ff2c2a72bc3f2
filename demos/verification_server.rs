//! Verification server example for docverify-session
//!
//! Runs the verification router over an in-memory state store and an HTTP
//! document checker.
//!
//! # Running the example
//!
//! 1. Start a document-check service that answers `POST /verify`
//!    (multipart `file`, `doc_type`, `user_input`) on port 8000, or point
//!    `DOCVERIFY_CHECKER_URL` at one:
//!    ```bash
//!    export DOCVERIFY_CHECKER_URL=http://127.0.0.1:8000
//!    ```
//! 2. Run the example:
//!    ```bash
//!    cargo run --example verification_server
//!    ```
//! 3. The server will start on http://127.0.0.1:5000
//!
//! # Testing the example
//!
//! ```bash
//! # Request an OTP (the code is echoed back while DOCVERIFY_ECHO_OTP is on)
//! curl -c cookies.txt -b cookies.txt -H 'content-type: application/json' \
//!   -d '{"docType":"nationalID","number":"1234 5678 9012"}' \
//!   http://127.0.0.1:5000/api/verify/otp
//!
//! # Confirm it
//! curl -b cookies.txt -H 'content-type: application/json' \
//!   -d '{"docType":"nationalID","code":"123456"}' \
//!   http://127.0.0.1:5000/api/verify/otp/confirm
//!
//! # Upload the scan and run the check
//! curl -b cookies.txt -F docType=nationalID -F file=@aadhaar.pdf \
//!   http://127.0.0.1:5000/api/verify/document
//!
//! # Review, then free the session for the next person
//! curl -b cookies.txt http://127.0.0.1:5000/api/review
//! curl -X POST http://127.0.0.1:5000/api/reset-verification
//! ```

use std::sync::Arc;

use docverify_session::{
    router, HttpDocumentChecker, MemoryStateStore, SystemClock, VerificationConfig,
    VerificationEngine,
};
use dotenvy::dotenv;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    // Load environment variables from .env file if present
    dotenv().ok();

    let config = VerificationConfig::from_env();
    info!(
        checker = %config.checker_url,
        timeout = ?config.checker_timeout,
        "using document checker"
    );

    let checker = HttpDocumentChecker::new(&config.checker_url, config.checker_timeout)?;
    let engine = VerificationEngine::new(
        MemoryStateStore::new(),
        Arc::new(checker),
        Arc::new(SystemClock),
        &config,
    );

    let app = router(Arc::new(engine), &config);

    info!("Server starting on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
