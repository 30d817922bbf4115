//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket server and client to verify that data
//! actually flows over the network, including a concurrent push while
//! the server side is parked on `recv`.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use parlor_transport::{Connection, Transport, WebSocketTransport};

    /// Helper: connects a tokio-tungstenite client to the given address.
    async fn connect_client(
        addr: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    async fn accept_one(
        addr: &str,
    ) -> (
        parlor_transport::WebSocketConnection,
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) {
        let mut transport =
            WebSocketTransport::bind(addr).await.expect("should bind");
        let local = transport.local_addr().expect("should have local addr");
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let client_ws = connect_client(&local.to_string()).await;
        let server_conn =
            server_handle.await.expect("task should complete");
        (server_conn, client_ws)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (server_conn, mut client_ws) = accept_one("127.0.0.1:0").await;

        // Verify the connection has a valid ID and a peer address.
        assert!(server_conn.id().into_inner() > 0);
        assert!(server_conn.peer_addr().port() > 0);

        // --- Server sends, client receives ---
        server_conn
            .send(b"hello from server")
            .await
            .expect("send should succeed");

        use futures_util::StreamExt;
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // --- Client sends, server receives ---
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        // --- Clean close ---
        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = accept_one("127.0.0.1:0").await;

        // Client closes the connection.
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        client_ws.send(Message::Close(None)).await.unwrap();

        // Server should see None (clean close).
        let result =
            server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        let (server_conn, mut client_ws) = accept_one("127.0.0.1:0").await;
        let server_conn = std::sync::Arc::new(server_conn);

        // Park a reader on recv; the client sends nothing yet.
        let reader = {
            let conn = server_conn.clone();
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A push must still go through while recv is pending.
        server_conn.send(b"pushed").await.expect("send should succeed");

        use futures_util::StreamExt;
        let msg = tokio::time::timeout(
            Duration::from_secs(5),
            client_ws.next(),
        )
        .await
        .expect("client should receive the push")
        .unwrap()
        .unwrap();
        assert_eq!(msg.into_data().as_ref(), b"pushed");

        // Unblock the reader.
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        client_ws
            .send(Message::Binary(b"reply".to_vec().into()))
            .await
            .unwrap();
        let received = reader
            .await
            .unwrap()
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"reply");
    }
}
