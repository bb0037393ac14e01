use hub_client::Client;
use hub_core::{Hub, IdPoolKind};
use std::sync::Arc;

#[tokio::test]
async fn middle_client_sees_the_other_two_and_not_itself() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let a = Client::connect("127.0.0.1", port).await.unwrap();
    let mut b = Client::connect("127.0.0.1", port).await.unwrap();
    let c = Client::connect("127.0.0.1", port).await.unwrap();

    let mut list = b.refresh_list().await.unwrap();
    list.sort();
    let mut expected = vec![a.id(), c.id()];
    expected.sort();

    assert_eq!(list, expected);
    assert!(!list.contains(&b.id()));

    hub.stop().await;
}

#[tokio::test]
async fn sole_client_sees_an_empty_list() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let mut a = Client::connect("127.0.0.1", port).await.unwrap();
    let list = a.refresh_list().await.unwrap();
    assert!(list.is_empty());

    hub.stop().await;
}
