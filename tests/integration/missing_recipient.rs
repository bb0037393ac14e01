use hub_client::Client;
use hub_core::{Hub, IdPoolKind};
use std::sync::Arc;

#[tokio::test]
async fn relay_to_a_never_issued_id_produces_no_reply_and_the_sender_stays_usable() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    tokio::spawn(async move { run_hub.run().await });

    let mut a = Client::connect("127.0.0.1", port).await.unwrap();
    a.relay(vec![9999], b"nobody".to_vec()).await.unwrap();

    // a's next request still succeeds normally: the dropped relay did not
    // wedge the sender's connection or the hub's dispatch path.
    let list = a.refresh_list().await.unwrap();
    assert!(list.is_empty());

    hub.stop().await;
}
