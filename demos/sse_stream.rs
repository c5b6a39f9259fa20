//! Example demonstrating server-sent event streaming.
//!
//! This example shows how to:
//! - Decode `text/event-stream` frames incrementally with `SseDecoder`
//! - Read events one at a time from a response body with `SseEventReader`
//!
//! Run with: `cargo run --example sse_stream`

use keelson::error::Error;
use keelson::http::{do_action, Request};
use keelson::stream::{SseDecoder, SseEvent, SseEventReader};
use keelson::url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn print_event(event: &SseEvent) {
    println!(
        "  id={:?} event={:?} retry={:?} data={:?}",
        event.id, event.event, event.retry, event.data
    );
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("keelson=info,sse_stream=info")
        .init();

    println!("=== Decoding Frames by Hand ===");
    // Chunks split mid-line, the way a socket delivers them. Complete
    // frames come back as events; the tail stays buffered.
    let mut decoder = SseDecoder::new();
    let chunks = [
        "id: 1\nevent: tick\nda",
        "ta: {\"count\": 1}\n\nid: 2\ndata: {\"cou",
        "nt\": 2}\n\nretry: 3000\ndata: done\n\npartial: ",
    ];
    for chunk in chunks {
        let events = decoder.feed(chunk);
        println!("fed {} bytes, decoded {} event(s)", chunk.len(), events.len());
        for event in &events {
            print_event(event);
        }
    }
    println!("still buffered: {:?}", decoder.remainder());

    println!("\n=== Streaming From a Live Response ===");
    let server = MockServer::start().await;
    let body = concat!(
        "id: 1\nevent: progress\ndata: {\"done\": 10}\n\n",
        ": keepalive\n\n",
        "id: 2\nevent: progress\ndata: {\"done\": 100}\n\n",
        "data: complete\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/jobs/42/events"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let address = Url::parse(&server.uri())?;
    let mut request = Request::new();
    request.pathname = "/jobs/42/events".to_string();
    request
        .headers
        .insert("host".to_string(), address.host());
    request
        .headers
        .insert("accept".to_string(), "text/event-stream".to_string());

    let response = do_action(&request, None).await?;
    println!(
        "status {} with content type {:?}",
        response.status_code,
        response.headers.get("content-type")
    );

    let mut reader = SseEventReader::new(response.body.clone());
    while let Some(event) = reader.next_event().await? {
        print_event(&event);
    }
    println!("stream finished");

    Ok(())
}
