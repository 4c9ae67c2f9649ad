use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use slvoters::configuration::get_configuration;
use slvoters::events::BroadcastEventBus;
use slvoters::service::Collaborators;
use slvoters::startup::Application;
use slvoters::storage::InMemoryMailSpool;
use slvoters::storage::InMemoryUserDirectory;
use slvoters::storage::InMemoryVoterStore;
use slvoters::telemetry::get_subscriber;
use slvoters::telemetry::init_subscriber;

/// Init the tracing subscriber once only.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    // the two sinks are different closure types, hence the two arms
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber).expect("init tracing");
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber).expect("init tracing");
        }
    };
});

pub struct TestApp {
    pub addr: String,
    pub api_client: reqwest::Client,
    /// Handles on the in-memory collaborators the app was built with, so that
    /// tests can seed and inspect them
    pub users: Arc<InMemoryUserDirectory>,
    pub spool: Arc<InMemoryMailSpool>,
    pub events: Arc<BroadcastEventBus>,
}

impl TestApp {
    pub async fn post_voter(
        &self,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .post(format!("{}/voters", self.addr))
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    /// Create a voter and return its id; panics if creation fails
    pub async fn create_voter(
        &self,
        body: &Value,
    ) -> i64 {
        let resp = self.post_voter(body).await;
        assert_eq!(resp.status().as_u16(), 201);
        let voter: Value = resp.json().await.unwrap();
        voter["id"].as_i64().expect("voter id")
    }

    pub async fn get_voter(
        &self,
        id: i64,
    ) -> reqwest::Response {
        self.api_client
            .get(format!("{}/voters/{id}", self.addr))
            .send()
            .await
            .expect("execute request")
    }

    pub async fn put_voter(
        &self,
        id: i64,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .put(format!("{}/voters/{id}", self.addr))
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    pub async fn post_subscription(
        &self,
        id: i64,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .post(format!("{}/voters/{id}/subscriptions", self.addr))
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    pub async fn delete_subscription(
        &self,
        id: i64,
        newsletter_id: i64,
        source: Option<&str>,
    ) -> reqwest::Response {
        let mut req = self
            .api_client
            .delete(format!("{}/voters/{id}/subscriptions/{newsletter_id}", self.addr));
        if let Some(source) = source {
            req = req.query(&[("source", source)]);
        }
        req.send().await.expect("execute request")
    }

    pub async fn subscribed_ids(
        &self,
        id: i64,
    ) -> Vec<i64> {
        self.api_client
            .get(format!("{}/voters/{id}/subscriptions", self.addr))
            .send()
            .await
            .expect("execute request")
            .json()
            .await
            .unwrap()
    }

    pub async fn put_changes(
        &self,
        id: i64,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .put(format!("{}/voters/{id}/changes", self.addr))
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    pub async fn get_changes(
        &self,
        id: i64,
    ) -> reqwest::Response {
        self.api_client
            .get(format!("{}/voters/{id}/changes", self.addr))
            .send()
            .await
            .expect("execute request")
    }

    pub async fn confirm_changes(
        &self,
        id: i64,
    ) -> reqwest::Response {
        self.api_client
            .post(format!("{}/voters/{id}/changes/confirm", self.addr))
            .send()
            .await
            .expect("execute request")
    }
}

pub async fn spawn_app() -> TestApp { spawn_app_with(true).await }

/// Spawn the app on a random port, on top of fresh in-memory collaborators.
/// Field schemas come from `configuration/base.yaml`.
pub async fn spawn_app_with(sync_fields: bool) -> TestApp {
    Lazy::force(&TRACING);

    let cfg = {
        let mut cfg = get_configuration().expect("read configuration");
        // port 0 is reserved by the OS; the server will be spawned on a random
        // available port
        cfg.application.port = 0;
        cfg.voters.sync_fields = sync_fields;
        cfg
    };

    let users = Arc::new(InMemoryUserDirectory::new());
    let spool = Arc::new(InMemoryMailSpool::new());
    let events = Arc::new(BroadcastEventBus::default());
    let collaborators = Collaborators {
        voters: Arc::new(InMemoryVoterStore::new()),
        users: users.clone(),
        mail_spool: spool.clone(),
        events: events.clone(),
    };

    let app = Application::build_with(cfg, collaborators).expect("build app");
    let addr = format!("http://127.0.0.1:{}", app.get_port());
    tokio::spawn(app.run_until_stopped());

    TestApp {
        addr,
        api_client: reqwest::Client::new(),
        users,
        spool,
        events,
    }
}
