//! Throwaway HTTP/1.1 source for end-to-end runs.
//!
//! Every GET is answered with `200 OK` and a fixed-size body, written in small
//! pieces so a rate-limited client applies backpressure.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub fn serve(body_len: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream, body_len));
        }
    });
    format!("http://127.0.0.1:{port}/payload.bin")
}

fn handle(mut stream: TcpStream, body_len: usize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 4096];
    match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(_) => {}
    }

    let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {body_len}\r\nConnection: close\r\n\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    let piece = [0xa5u8; 8192];
    let mut remaining = body_len;
    while remaining > 0 {
        let take = remaining.min(piece.len());
        if stream.write_all(&piece[..take]).is_err() {
            return;
        }
        remaining -= take;
    }
}

/// Returns the parsed `done` event from `--json` output.
pub fn done_event(stdout: &[u8]) -> serde_json::Value {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|event| event["event"] == "done")
        .expect("done event in output")
}
