use hub_client::Client;
use hub_core::{Hub, IdPoolKind};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

#[tokio::test]
async fn stop_closes_every_connected_client_and_the_accept_loop_returns() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    let run = tokio::spawn(async move { run_hub.run().await });

    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(Client::connect("127.0.0.1", port).await.unwrap());
    }

    hub.stop().await;

    for mut client in clients {
        let observed_close = timeout(Duration::from_secs(1), client.incoming_id()).await;
        // Either the channel is closed outright (None) or the recv future
        // itself times out because nothing further ever arrives; both
        // indicate the connection no longer delivers answers.
        match observed_close {
            Ok(answer) => assert!(answer.is_none()),
            Err(_) => {}
        }
        assert!(!client.is_connected());
    }

    timeout(Duration::from_secs(1), run)
        .await
        .expect("accept loop should return promptly after stop")
        .unwrap();
}

#[tokio::test]
async fn stop_is_effective_while_clients_are_actively_relaying() {
    let hub = Arc::new(Hub::bind(0, IdPoolKind::Incremental).await.unwrap());
    let port = hub.local_port().unwrap();
    let run_hub = hub.clone();
    let run = tokio::spawn(async move { run_hub.run().await });

    let a = Client::connect("127.0.0.1", port).await.unwrap();
    let b = Client::connect("127.0.0.1", port).await.unwrap();
    let b_id = b.id();

    let sender = tokio::spawn(async move {
        loop {
            if a.relay(vec![b_id], b"x".to_vec()).await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    hub.stop().await;
    drop(b);

    timeout(Duration::from_secs(1), sender)
        .await
        .expect("sender should observe shutdown promptly")
        .unwrap();

    timeout(Duration::from_secs(1), run)
        .await
        .expect("accept loop should return promptly after stop")
        .unwrap();
}
