mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nubdb_client::{ClientConfig, ClientError, NubClient, Reply};

use common::{client_for, closed_port, config_for, FakeServer};

#[test]
fn client_set_get_roundtrip() {
    let server = FakeServer::spawn();
    let client = client_for(&server);

    assert!(client.set("name", "Alice").unwrap());
    assert_eq!(client.get("name").unwrap().as_deref(), Some("Alice"));

    assert!(client.set("age", 30).unwrap());
    assert_eq!(client.get("age").unwrap().as_deref(), Some("30"));

    assert!(client.set("ratio", 0.75).unwrap());
    assert_eq!(client.get("ratio").unwrap().as_deref(), Some("0.75"));

    assert!(client.set("city", "New York").unwrap());
    assert_eq!(client.get("city").unwrap().as_deref(), Some("New York"));
}

#[test]
fn missing_key_is_none() {
    let server = FakeServer::spawn();
    let client = client_for(&server);
    assert_eq!(client.get("never-set").unwrap(), None);
    assert!(!client.exists("never-set").unwrap());
}

#[test]
fn exists_tracks_set_and_delete() {
    let server = FakeServer::spawn();
    let client = client_for(&server);

    assert!(client.set("city", "NY").unwrap());
    assert!(client.exists("city").unwrap());
    assert!(client.delete("city").unwrap());
    assert!(!client.exists("city").unwrap());
    assert_eq!(client.get("city").unwrap(), None);
    // Deleting again is refused by the server, which degrades to false.
    assert!(!client.delete("city").unwrap());
}

#[test]
fn counters_step_and_reject_text() {
    let server = FakeServer::spawn();
    let client = client_for(&server);

    assert!(client.set("counter", "100").unwrap());
    assert_eq!(client.incr("counter").unwrap(), 101);
    assert_eq!(client.incr("counter").unwrap(), 102);
    assert_eq!(client.decr("counter").unwrap(), 101);
    assert_eq!(client.decr("counter").unwrap(), 100);

    assert!(client.set("name", "Alice").unwrap());
    let err = client.incr("name").unwrap_err();
    assert!(matches!(err, ClientError::Command { verb: "INCR", .. }), "{err:?}");
    let err = client.decr("name").unwrap_err();
    assert!(matches!(err, ClientError::Command { verb: "DECR", .. }), "{err:?}");
    // The connection is still healthy after a parse failure.
    assert_eq!(client.get("name").unwrap().as_deref(), Some("Alice"));
}

#[test]
fn size_and_clear() {
    let server = FakeServer::spawn();
    let client = client_for(&server);

    assert_eq!(client.size().unwrap(), 0);
    let keys = ["a", "b", "c", "d"];
    for (idx, key) in keys.iter().enumerate() {
        assert!(client.set(key, idx).unwrap());
    }
    assert_eq!(client.size().unwrap(), keys.len() as u64);

    assert!(client.clear().unwrap());
    assert_eq!(client.size().unwrap(), 0);
    for key in keys {
        assert!(!client.exists(key).unwrap());
    }
}

#[test]
fn mset_and_mget() {
    let server = FakeServer::spawn();
    let client = client_for(&server);

    assert!(client
        .mset([("user:1", "Alice"), ("user:2", "Bob"), ("user:3", "Charlie")])
        .unwrap());
    let values = client.mget(&["user:1", "user:3", "user:9"]).unwrap();
    assert_eq!(values["user:1"].as_deref(), Some("Alice"));
    assert_eq!(values["user:3"].as_deref(), Some("Charlie"));
    assert_eq!(values["user:9"], None);
}

#[test]
fn quoted_values_survive() {
    let server = FakeServer::spawn();
    let client = client_for(&server);

    assert!(client.set("greeting", "say \"hi\" there").unwrap());
    assert_eq!(
        client.get("greeting").unwrap().as_deref(),
        Some("say \"hi\" there")
    );
    assert!(client.set("empty", "").unwrap());
    assert_eq!(client.get("empty").unwrap().as_deref(), Some(""));
}

#[test]
fn batch_round_trip() {
    let server = FakeServer::spawn();
    let client = client_for(&server);

    let replies = client
        .batch()
        .set("user:1", "Alice")
        .set("visits", 9)
        .incr("visits")
        .get("user:1")
        .exists("user:2")
        .size()
        .execute()
        .unwrap();
    let replies: Vec<Reply> = replies.into_iter().map(Result::unwrap).collect();
    assert_eq!(
        replies,
        vec![
            Reply::Ok(true),
            Reply::Ok(true),
            Reply::Integer(10),
            Reply::Value(Some("Alice".to_string())),
            Reply::Exists(false),
            Reply::Size(2),
        ]
    );
    // The connection stays in step after a batch.
    assert_eq!(client.get("visits").unwrap().as_deref(), Some("10"));
}

#[test]
fn ttl_is_sent_in_seconds() {
    let server = FakeServer::spawn();
    let client = client_for(&server);
    assert!(client
        .set_with_ttl("session", "abc", Duration::from_millis(90_500))
        .unwrap());
    assert!(client
        .set_with_ttl("blink", "abc", Duration::from_millis(500))
        .unwrap());
    assert_eq!(client.get("session").unwrap().as_deref(), Some("abc"));
    assert_eq!(
        server.requests(),
        vec!["SET session abc 90", "SET blink abc 1", "GET session"]
    );
}

#[test]
fn unreachable_server_fails_fast() {
    let err = NubClient::with_config(config_for(closed_port())).unwrap_err();
    assert!(matches!(err, ClientError::Connection { .. }), "{err:?}");
}

#[test]
fn lazy_client_connects_on_first_command() {
    let server = FakeServer::spawn();
    let config = ClientConfig {
        lazy_connect: true,
        ..config_for(server.port)
    };
    let client = NubClient::with_config(config).unwrap();
    assert!(!client.is_connected());
    assert_eq!(server.accepted(), 0);
    assert!(client.ping());
    assert!(client.is_connected());
}

#[test]
fn close_is_idempotent() {
    let server = FakeServer::spawn();
    let client = client_for(&server);
    assert!(client.set("k", "v").unwrap());
    client.close();
    client.close();
    assert!(!client.is_connected());
    // Auto-reconnect brings the client back on the next call.
    assert_eq!(client.get("k").unwrap().as_deref(), Some("v"));
    assert_eq!(server.accepted(), 2);
}

#[test]
fn shared_client_serializes_commands() {
    let server = FakeServer::spawn();
    let client = Arc::new(client_for(&server));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for round in 0..25 {
                    let key = format!("w{worker}:{round}");
                    let value = format!("value {worker} {round}");
                    assert!(client.set(&key, &value).unwrap());
                    assert_eq!(client.get(&key).unwrap(), Some(value));
                    client.incr("hits").unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(client.get("hits").unwrap().as_deref(), Some("200"));
    assert_eq!(client.size().unwrap(), 8 * 25 + 1);
    assert_eq!(server.accepted(), 1);
}
