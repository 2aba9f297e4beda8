#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nubdb_client::{ClientConfig, NubClient};

pub type Store = Arc<Mutex<HashMap<String, String>>>;

/// In-process NubDB stand-in speaking the line protocol.
pub struct FakeServer {
    pub port: u16,
    pub store: Store,
    pub accepted: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<String>>>,
    stop: Arc<AtomicBool>,
    conns: Arc<Mutex<Vec<TcpStream>>>,
    acceptor: Option<JoinHandle<()>>,
}

impl FakeServer {
    pub fn spawn() -> Self {
        Self::spawn_on(0, Store::default())
    }

    pub fn spawn_on(port: u16, store: Store) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let stop = Arc::new(AtomicBool::new(false));
        let conns: Arc<Mutex<Vec<TcpStream>>> = Arc::default();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();

        let acceptor = {
            let (stop, conns, store, accepted, requests) = (
                stop.clone(),
                conns.clone(),
                store.clone(),
                accepted.clone(),
                requests.clone(),
            );
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(_) => continue,
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    if let Ok(clone) = stream.try_clone() {
                        conns.lock().unwrap().push(clone);
                    }
                    let (store, requests) = (store.clone(), requests.clone());
                    thread::spawn(move || serve(stream, store, requests));
                }
            })
        };

        FakeServer {
            port,
            store,
            accepted,
            requests,
            stop,
            conns,
            acceptor: Some(acceptor),
        }
    }

    /// Drops every open client connection; the listener keeps accepting.
    pub fn sever(&self) {
        for conn in self.conns.lock().unwrap().drain(..) {
            let _ = conn.shutdown(Shutdown::Both);
        }
    }

    /// Stops accepting, severs connections and frees the port.
    pub fn shutdown(mut self) -> Store {
        self.stop_accepting();
        self.store.clone()
    }

    /// Raw request lines received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn stop_accepting(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            self.stop.store(true, Ordering::SeqCst);
            // Wake the blocking accept.
            let _ = TcpStream::connect(("127.0.0.1", self.port));
            let _ = acceptor.join();
        }
        self.sever();
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.stop_accepting();
    }
}

fn serve(stream: TcpStream, store: Store, requests: Arc<Mutex<Vec<String>>>) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let request = line.trim_end_matches(['\r', '\n']);
        requests.lock().unwrap().push(request.to_string());
        let response = match handle(request, &store) {
            Some(response) => response,
            None => return,
        };
        if writer
            .write_all(format!("{response}\n").as_bytes())
            .is_err()
        {
            return;
        }
    }
}

/// Returns `None` for QUIT, which closes the connection without a reply.
fn handle(request: &str, store: &Store) -> Option<String> {
    let (verb, rest) = request.split_once(' ').unwrap_or((request, ""));
    let mut store = store.lock().unwrap();
    let reply = match verb {
        "SET" => match parse_set(rest) {
            Some((key, value)) => {
                store.insert(key, value);
                "OK".to_string()
            }
            None => "ERR syntax".to_string(),
        },
        "GET" => match store.get(rest) {
            Some(value) => format!("\"{value}\""),
            None => "(nil)".to_string(),
        },
        "DELETE" => match store.remove(rest) {
            Some(_) => "OK".to_string(),
            None => "ERR key not found".to_string(),
        },
        "EXISTS" => (if store.contains_key(rest) { "1" } else { "0" }).to_string(),
        "INCR" | "DECR" => {
            let delta = if verb == "INCR" { 1 } else { -1 };
            let current = store.get(rest).map(String::as_str).unwrap_or("0");
            match current.parse::<i64>() {
                Ok(value) => {
                    let next = value + delta;
                    store.insert(rest.to_string(), next.to_string());
                    next.to_string()
                }
                Err(_) => "ERR value is not an integer".to_string(),
            }
        }
        "SIZE" => format!("{} keys", store.len()),
        "CLEAR" => {
            store.clear();
            "OK".to_string()
        }
        "QUIT" => return None,
        _ => "ERR unknown command".to_string(),
    };
    Some(reply)
}

/// `<key> <value> [ttl]`, where value is bare or quoted with `\` escapes.
fn parse_set(rest: &str) -> Option<(String, String)> {
    let (key, rest) = rest.split_once(' ')?;
    let value = if let Some(quoted) = rest.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = quoted.chars();
        loop {
            match chars.next()? {
                '\\' => value.push(chars.next()?),
                '"' => break,
                c => value.push(c),
            }
        }
        value
    } else {
        rest.split(' ').next()?.to_string()
    };
    Some((key.to_string(), value))
}

pub fn config_for(port: u16) -> ClientConfig {
    ClientConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .timeout(Duration::from_secs(2))
        .retry_base_delay(Duration::from_millis(20))
        .build()
        .expect("config")
}

pub fn client_for(server: &FakeServer) -> NubClient {
    NubClient::with_config(config_for(server.port)).expect("client")
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}
