//! Tests against the live portal
//!
//! These need network access and an account, and are marked #[ignore].
//! Run with:
//!   SEASONSCAN_USERNAME=... SEASONSCAN_PASSWORD=... \
//!   cargo test -p seasonscan-portal --test live -- --ignored

use seasonscan_engine::{
    Identifier, LookupRequest, Parsed, ReportParser, Transport, TransportError,
};
use seasonscan_portal::{Credentials, HtmlReportParser, PortalClient, PortalConfig};

fn credentials() -> Credentials {
    let username = std::env::var("SEASONSCAN_USERNAME").expect("set SEASONSCAN_USERNAME");
    let password = std::env::var("SEASONSCAN_PASSWORD").expect("set SEASONSCAN_PASSWORD");
    Credentials::new(username, password)
}

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create runtime")
        .block_on(f)
}

#[test]
#[ignore]
fn login_and_fetch_one_season() {
    let request = LookupRequest::new(Identifier::new("V", 100081), 2024);
    // Same runtime for both calls: the session's connections belong to it
    let raw = block_on(async {
        let client = PortalClient::login(&PortalConfig::default(), &credentials())
            .await
            .expect("login should succeed");
        client.fetch(&request).await.expect("fetch should succeed")
    });

    // Either a report or "no record"; never unparseable
    match HtmlReportParser::new().parse(&raw).expect("page should parse") {
        Parsed::Present(report) => println!("{request}: {}", report.name()),
        Parsed::Absent => println!("{request}: no record"),
    }
}

#[test]
#[ignore]
fn bad_password_is_auth_error() {
    let user = credentials();
    let wrong = Credentials::new(user.username(), "definitely-not-the-password");
    let err = block_on(PortalClient::login(&PortalConfig::default(), &wrong))
        .err()
        .expect("login should fail");
    assert!(matches!(err, TransportError::Auth(_)));
}
