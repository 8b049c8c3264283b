//! End-to-end streaming against a local HTTP server that mimics Ollama's
//! chunked NDJSON responses.

use std::time::{Duration, Instant};

use locode_providers::{CompletionRequest, GenerationOptions, LLMProvider, OllamaProvider};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamExt;

const CHUNKED_HEADERS: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: application/x-ndjson\r\n\
Transfer-Encoding: chunked\r\n\
Connection: close\r\n\r\n";

/// Consume one request: headers plus a `Content-Length` body.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = socket.read(&mut tmp).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
    }
}

async fn write_chunk(socket: &mut TcpStream, data: &str) {
    let frame = format!("{:x}\r\n{}\r\n", data.len(), data);
    socket.write_all(frame.as_bytes()).await.unwrap();
    socket.flush().await.unwrap();
}

/// Serve one generate request, sending `parts` as NDJSON lines `gap` apart.
async fn spawn_server(parts: Vec<String>, gap: Duration, linger: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket.write_all(CHUNKED_HEADERS.as_bytes()).await.unwrap();
        for part in parts {
            tokio::time::sleep(gap).await;
            write_chunk(&mut socket, &format!("{}\n", part)).await;
        }
        tokio::time::sleep(linger).await;
        let _ = socket.write_all(b"0\r\n\r\n").await;
    });
    format!("http://{}", addr)
}

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "qwen2.5-coder:7b".to_string(),
        prompt: "user: count\n\nassistant: ".to_string(),
        stream: true,
        options: GenerationOptions::default(),
    }
}

#[tokio::test]
async fn test_stream_longer_than_timeout_completes_when_chunks_keep_arriving() {
    let mut parts: Vec<String> = (0..8)
        .map(|i| format!("{{\"response\":\"{} \",\"done\":false}}", i))
        .collect();
    parts.push(r#"{"response":"","done":true,"prompt_eval_count":5,"eval_count":8}"#.to_string());
    let url = spawn_server(parts, Duration::from_millis(400), Duration::ZERO).await;

    let provider = OllamaProvider::new(url, 2).unwrap();
    let started = Instant::now();
    let mut stream = provider.generate(request()).await.unwrap();

    let mut text = String::new();
    let mut finished = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        text.push_str(&chunk.content);
        if chunk.finished {
            finished = Some(chunk);
            break;
        }
    }

    assert!(started.elapsed() > Duration::from_secs(3));
    assert_eq!(text, "0 1 2 3 4 5 6 7 ");
    let usage = finished.and_then(|c| c.usage).unwrap();
    assert_eq!(usage.completion_tokens, 8);
}

#[tokio::test]
async fn test_silent_stream_ends_with_timeout_error() {
    let parts = vec![r#"{"response":"partial","done":false}"#.to_string()];
    let url = spawn_server(parts, Duration::ZERO, Duration::from_secs(10)).await;

    let provider = OllamaProvider::new(url, 1).unwrap();
    let mut stream = provider.generate(request()).await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content, "partial");

    let outcome = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream should give up before the server does");
    let error = outcome.unwrap().unwrap_err();
    assert!(error.to_string().contains("timed out"), "{}", error);
}
