use hub_client::Client;
use hub_core::{Hub, IdPoolKind};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

#[tokio::test]
async fn a_released_id_is_reassigned_before_the_counter_advances() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Reusable).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let first = Client::connect("127.0.0.1", port).await.unwrap();
    let first_id = first.id();
    first.disconnect();

    // Give the hub's per-connection handler a moment to observe quit and
    // release the id back to the pool before the next connect races it.
    sleep(Duration::from_millis(50)).await;

    let second = Client::connect("127.0.0.1", port).await.unwrap();
    assert_eq!(second.id(), first_id);

    hub.stop().await;
}

#[tokio::test]
async fn incremental_pool_never_reassigns_a_released_id() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let first = Client::connect("127.0.0.1", port).await.unwrap();
    let first_id = first.id();
    first.disconnect();
    sleep(Duration::from_millis(50)).await;

    let second = Client::connect("127.0.0.1", port).await.unwrap();
    assert_ne!(second.id(), first_id);

    hub.stop().await;
}
