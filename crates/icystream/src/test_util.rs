//! Loopback servers for connection tests

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Accept one client and return its request head
fn accept_request(listener: &TcpListener) -> (TcpStream, String) {
    let (stream, _) = listener.accept().unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
            break;
        }
        request.push_str(&line);
    }
    (stream, request)
}

/// Serve one canned response, then close. The request head is sent back on
/// the returned channel.
pub(crate) fn serve_once(response: Vec<u8>) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, request) = accept_request(&listener);
        let _ = tx.send(request);
        let _ = stream.write_all(&response);
    });

    (format!("http://{addr}/stream"), rx)
}

/// Send `head`, then one audio byte per `pause` until the client hangs up
pub(crate) fn serve_trickle(head: &'static [u8], pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let (mut stream, _) = accept_request(&listener);
        if stream.write_all(head).is_err() {
            return;
        }
        for _ in 0..1000 {
            thread::sleep(pause);
            if stream.write_all(&[0x55]).and_then(|_| stream.flush()).is_err() {
                return;
            }
        }
    });

    format!("http://{addr}/stream")
}
