use hub_client::Client;
use hub_core::{Answer, Hub, IdPoolKind};
use std::sync::Arc;

#[tokio::test]
async fn recipient_receives_the_body_sender_receives_nothing() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let a = Client::connect("127.0.0.1", port).await.unwrap();
    let mut b = Client::connect("127.0.0.1", port).await.unwrap();

    a.relay(vec![b.id()], b"hi".to_vec()).await.unwrap();

    let answer = b.incoming_relay().await.expect("relay answer");
    assert_eq!(answer, Answer::Relay(b"hi".to_vec()));

    hub.stop().await;
}

#[tokio::test]
async fn relay_with_zero_recipients_fans_out_to_no_one() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let mut a = Client::connect("127.0.0.1", port).await.unwrap();
    a.relay(vec![], b"nobody home".to_vec()).await.unwrap();

    // Confirm the connection is still alive and responsive afterward.
    let list = a.refresh_list().await.unwrap();
    assert!(list.is_empty());

    hub.stop().await;
}

#[tokio::test]
async fn sender_listing_itself_receives_its_own_relay() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let mut a = Client::connect("127.0.0.1", port).await.unwrap();
    let id = a.id();
    a.relay(vec![id], b"echo".to_vec()).await.unwrap();

    let answer = a.incoming_relay().await.expect("relay answer");
    assert_eq!(answer, Answer::Relay(b"echo".to_vec()));

    hub.stop().await;
}
