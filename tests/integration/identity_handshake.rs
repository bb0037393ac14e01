use hub_client::Client;
use hub_core::{Hub, IdPoolKind};
use std::sync::Arc;

#[tokio::test]
async fn client_receives_a_nonzero_identity_on_connect() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let client = Client::connect("127.0.0.1", port).await.unwrap();
    assert!(client.id() >= 1);

    hub.stop().await;
}

#[tokio::test]
async fn two_clients_receive_distinct_ids() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let a = Client::connect("127.0.0.1", port).await.unwrap();
    let b = Client::connect("127.0.0.1", port).await.unwrap();
    assert_ne!(a.id(), b.id());

    hub.stop().await;
}
