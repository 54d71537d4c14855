//! Talks to a running mock server (`cargo run`) with the refreshing client.
//!
//! $ cargo run --bin client_demo -- --settings=settings/dev.toml

use tokenward::client::*;
use tokenward::domain_model::AccessToken;
use tokenward::domain_port::{LoginInput, TokenStore};
use tokenward::logger::*;
use tokenward::settings::{Cli, Parser, parse_settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new_bootstrap();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let client = Client::try_new(&project_settings)?;

    let mut events = client.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("session event: {:?}", event);
        }
    });

    let user = client
        .session_service
        .login(LoginInput {
            username: "user".into(),
            password: "1234".into(),
        })
        .await?;
    println!("logged in as {} ({})", user.username, user.role);

    let response = client.pipeline.get("/api/test/protected").await?;
    println!("protected: {}", response.text());

    // Pretend the access token expired: the next calls are rejected with 401,
    // a single refresh runs and all of them are replayed.
    client
        .store
        .set_access_token(AccessToken("expired".to_string()))?;
    let (a, b, c) = tokio::join!(
        client.pipeline.get("/api/test/protected"),
        client.pipeline.get("/api/auth/me"),
        client.pipeline.get("/api/test/protected"),
    );
    for (i, result) in [a, b, c].into_iter().enumerate() {
        match result {
            Ok(response) => println!("request {} -> {}", i, response.status),
            Err(e) if e.is_session_ended() => println!("request {} ended the session: {}", i, e),
            Err(e) => println!("request {} failed: {}", i, e),
        }
    }

    match client.pipeline.get("/api/admin/users").await {
        Ok(response) => println!("admin users: {}", response.text()),
        Err(e) => println!("admin users: {}", e),
    }

    println!("profile: {:?}", client.session_service.fetch_profile().await);

    client.session_service.logout().await;
    println!("authenticated after logout: {}", client.session_service.is_authenticated());

    Ok(())
}
