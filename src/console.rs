//! Terminal front-end: the same read-decode-merge-render loop the chat
//! page runs, driven over a real connection to a ricci-chat server.

use crate::decode::StreamDecoder;
use crate::transcript::Transcript;
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

pub async fn run() -> anyhow::Result<()> {
    let server_url =
        std::env::var("CHAT_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let endpoint = format!("{}/api/chat", server_url.trim_end_matches('/'));
    let client = reqwest::Client::new();
    let mut transcript = Transcript::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == "exit" {
            break;
        }
        if transcript.submit(&line).is_err() {
            continue;
        }

        if let Err(err) = stream_turn(&client, &endpoint, &mut transcript).await {
            transcript.fail();
            eprintln!("\nstream error: {err}");
        }
        println!();
    }
    Ok(())
}

/// One submission: POST the conversation, then run the read-decode-merge
/// loop until the response body ends. A failed read propagates so the
/// caller can mark the turn failed with its partial text kept.
async fn stream_turn(
    client: &reqwest::Client,
    endpoint: &str,
    transcript: &mut Transcript,
) -> anyhow::Result<()> {
    let response = client
        .post(endpoint)
        .json(transcript.messages())
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("server error {status}: {body}");
    }

    print!("assistant> ");
    std::io::stdout().flush()?;

    let mut decoder = StreamDecoder::new();
    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let bytes = item?;
        let text = decoder.decode(&bytes);
        if !text.is_empty() {
            transcript.merge_fragment(&text);
            print!("{text}");
            std::io::stdout().flush()?;
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        transcript.merge_fragment(&tail);
        print!("{tail}");
        std::io::stdout().flush()?;
    }

    transcript.finish();
    Ok(())
}
