//! Full sync lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every adapter
//! operation over real HTTP. The gateway runs ureq on tokio's blocking pool,
//! so the core stays free of I/O while the test still exercises a real
//! network round trip.

use std::net::SocketAddr;

use async_trait::async_trait;
use restsync_core::{
    AdapterConfig, HttpMethod, HttpRequest, HttpResponse, Record, Resource, ResourceType,
    RestAdapter, Settlement, SyncError, TransportError, TransportGateway,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct PostGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    name: String,
    rank: u32,
}

impl Resource for PostGroup {
    const TYPE: ResourceType = ResourceType::new("PostGroup", "id");
}

/// Blocking ureq gateway. Status codes are returned as data so the adapter
/// decides what a failure is.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

fn execute(agent: &ureq::Agent, req: HttpRequest) -> Result<HttpResponse, TransportError> {
    let accept = req.accept().unwrap_or("application/json").to_string();
    let content_type = req.content_type().unwrap_or("application/json").to_string();
    let url = req.url.as_str();

    let result = match (req.method, req.body.as_deref()) {
        (HttpMethod::Get, _) => agent.get(url).header("accept", accept.as_str()).call(),
        (HttpMethod::Delete, _) => agent.delete(url).header("accept", accept.as_str()).call(),
        (HttpMethod::Post, Some(body)) => agent
            .post(url)
            .header("accept", accept.as_str())
            .content_type(content_type.as_str())
            .send(body.as_bytes()),
        (HttpMethod::Post, None) => agent.post(url).send_empty(),
        (HttpMethod::Put, Some(body)) => agent
            .put(url)
            .header("accept", accept.as_str())
            .content_type(content_type.as_str())
            .send(body.as_bytes()),
        (HttpMethod::Put, None) => agent.put(url).send_empty(),
    };
    let mut response = result.map_err(|e| TransportError::Connection(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Ok(HttpResponse::new(status, body))
}

#[async_trait]
impl TransportGateway for UreqTransport {
    async fn submit(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?
    }
}

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn adapter(addr: SocketAddr, extension: bool) -> RestAdapter<UreqTransport> {
    let config = AdapterConfig::new(format!("http://{addr}"))
        .with_namespace("api/v1")
        .with_content_type_extension(extension);
    RestAdapter::new(config, UreqTransport::new())
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_lifecycle() {
    let addr = start_server();
    let adapter = adapter(addr, false);
    assert_eq!(adapter.root_path(), format!("http://{addr}/api/v1"));

    // Step 1: the collection starts empty.
    let all = adapter.find_all::<PostGroup>().await.unwrap();
    assert!(all.is_empty());
    assert!(all.is_loaded());
    assert!(!all.is_error());

    // Step 2: create.
    let record = Record::new(PostGroup {
        id: None,
        name: "Rustaceans".into(),
        rank: 1,
    })
    .into_shared();
    assert_eq!(adapter.save(&record).await.unwrap(), Settlement::Succeeded);
    let id = {
        let rec = record.lock();
        assert!(!rec.is_new());
        assert!(!rec.is_dirty());
        assert!(!rec.is_saving());
        assert!(rec.is_loaded());
        rec.resource().id.expect("server assigned an id")
    };

    // Step 3: a clean record is not sent again.
    assert_eq!(adapter.save(&record).await.unwrap(), Settlement::Skipped);

    // Step 4: validation failure keeps local edits.
    record.lock().update(|g| g.name.clear());
    let settlement = adapter.save(&record).await.unwrap();
    assert!(matches!(settlement, Settlement::Failed(ref e) if e.status == Some(422)));
    {
        let rec = record.lock();
        assert!(rec.is_error());
        assert_eq!(rec.errors(), Some(&json!({"name": ["can't be blank"]})));
        assert!(rec.is_dirty());
        assert!(rec.resource().name.is_empty());
    }

    // Step 5: fix and update.
    record.lock().update(|g| {
        g.name = "Crabs".into();
        g.rank = 2;
    });
    assert_eq!(adapter.save(&record).await.unwrap(), Settlement::Succeeded);
    {
        let rec = record.lock();
        assert!(!rec.is_error());
        assert!(rec.errors().is_none());
        assert!(!rec.is_dirty());
    }

    // Step 6: read it back by key.
    let found = adapter
        .find_by_key::<PostGroup>(&id.to_string(), &[])
        .await
        .unwrap();
    assert!(!found.is_error());
    assert_eq!(
        found.resource(),
        &PostGroup {
            id: Some(id),
            name: "Crabs".into(),
            rank: 2,
        }
    );

    // Step 7: reload picks up the server copy.
    assert_eq!(adapter.reload(&record).await.unwrap(), Settlement::Succeeded);

    // Step 8: a second record, then a filtered query.
    let other = Record::new(PostGroup {
        id: None,
        name: "Gophers".into(),
        rank: 3,
    })
    .into_shared();
    adapter.save(&other).await.unwrap();

    let crabs = adapter
        .find_query::<PostGroup>(&[("name", "Crabs")])
        .await
        .unwrap();
    assert_eq!(crabs.len(), 1);
    assert_eq!(crabs.get(0).map(|r| r.resource().id), Some(Some(id)));
    assert_eq!(adapter.find_all::<PostGroup>().await.unwrap().len(), 2);

    // Step 9: delete.
    assert_eq!(adapter.delete(&record).await.unwrap(), Settlement::Succeeded);
    assert!(record.lock().is_destroyed());
    assert!(matches!(
        adapter.delete(&record).await,
        Err(SyncError::Destroyed { .. })
    ));

    // Step 10: the deleted key no longer resolves.
    let missing = adapter
        .find_by_key::<PostGroup>(&id.to_string(), &[])
        .await
        .unwrap();
    assert!(missing.is_error());
    assert_eq!(missing.errors(), Some(&json!({"error": "not found"})));

    // Step 11: deleting it through a stale copy fails but leaves the copy usable.
    let stale = Record::new(PostGroup {
        id: Some(id),
        name: "Crabs".into(),
        rank: 2,
    })
    .into_shared();
    let settlement = adapter.delete(&stale).await.unwrap();
    assert!(matches!(settlement, Settlement::Failed(ref e) if e.status == Some(404)));
    assert!(!stale.lock().is_destroyed());
    assert!(stale.lock().is_error());

    let remaining = adapter.find_all::<PostGroup>().await.unwrap();
    let names: Vec<&str> = remaining.resources().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Gophers"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn content_type_extension_round_trip() {
    let addr = start_server();
    let adapter = adapter(addr, true);

    let record = Record::new(PostGroup {
        id: None,
        name: "Ext".into(),
        rank: 0,
    })
    .into_shared();
    assert_eq!(adapter.save(&record).await.unwrap(), Settlement::Succeeded);
    let key = record.lock().primary_key().expect("saved record has a key");

    let found = adapter.find_by_key::<PostGroup>(&key, &[]).await.unwrap();
    assert_eq!(found.resource().name, "Ext");
    assert_eq!(adapter.find_all::<PostGroup>().await.unwrap().len(), 1);
}
