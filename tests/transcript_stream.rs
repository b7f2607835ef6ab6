//! Client-loop properties: chunked byte sequences driven through the
//! stateful decoder and the transcript, the way the console client and
//! the chat page consume a relay response.

use ricci_chat::decode::StreamDecoder;
use ricci_chat::transcript::{SubmitError, Transcript, TurnState};
use ricci_chat::types::{ChatMessage, Role};

/// One turn's stream session: decode each chunk, merge what came out,
/// then either seal the turn or mark it failed.
fn drive_turn(transcript: &mut Transcript, chunks: &[&[u8]], clean_end: bool) {
    let mut decoder = StreamDecoder::new();
    for chunk in chunks {
        let text = decoder.decode(chunk);
        if !text.is_empty() {
            transcript.merge_fragment(&text);
        }
    }
    if clean_end {
        let tail = decoder.finish();
        if !tail.is_empty() {
            transcript.merge_fragment(&tail);
        }
        transcript.finish();
    } else {
        transcript.fail();
    }
}

#[test]
fn streamed_fragments_concatenate_into_one_assistant_message() {
    let mut transcript = Transcript::new();
    transcript
        .submit("prove symmetry of Ricci tensor")
        .expect("submit");

    drive_turn(
        &mut transcript,
        &[
            b"The ".as_slice(),
            b"Ricci ",
            b"tensor ",
            b"is symmetric because...",
        ],
        true,
    );

    assert_eq!(
        transcript.messages(),
        &[
            ChatMessage::user("prove symmetry of Ricci tensor"),
            ChatMessage::assistant("The Ricci tensor is symmetric because..."),
        ]
    );
    assert_eq!(transcript.state(), TurnState::Idle);
}

#[test]
fn multibyte_char_split_across_chunks_survives_intact() {
    // "∑" is three bytes; the transport may split it anywhere.
    let reply = "R\u{2211}g";
    let bytes = reply.as_bytes();

    let mut transcript = Transcript::new();
    transcript.submit("sum convention?").expect("submit");
    drive_turn(&mut transcript, &[&bytes[..2], &bytes[2..]], true);

    assert_eq!(transcript.messages().len(), 2);
    assert_eq!(transcript.messages()[1], ChatMessage::assistant(reply));
}

#[test]
fn zero_fragment_turn_adds_no_assistant_message() {
    let mut transcript = Transcript::new();
    transcript.submit("hello").expect("submit");
    drive_turn(&mut transcript, &[], true);

    assert_eq!(transcript.messages(), &[ChatMessage::user("hello")]);
    assert!(transcript.can_submit());
}

#[test]
fn read_error_keeps_partial_text_and_reopens_input() {
    let mut transcript = Transcript::new();
    transcript.submit("hello").expect("submit");
    drive_turn(&mut transcript, &[b"Here's ".as_slice()], false);

    assert_eq!(transcript.state(), TurnState::Failed);
    assert!(transcript.can_submit());
    assert_eq!(
        transcript.messages(),
        &[
            ChatMessage::user("hello"),
            ChatMessage::assistant("Here's "),
        ]
    );
}

#[test]
fn submissions_never_interleave() {
    let mut transcript = Transcript::new();
    transcript.submit("first question").expect("submit");

    // A second submission while the session is open is refused outright.
    assert_eq!(
        transcript.submit("second question"),
        Err(SubmitError::SessionOpen)
    );

    drive_turn(&mut transcript, &[b"first answer".as_slice()], true);

    // Only after the first assistant message is sealed does the second
    // user message get in.
    transcript.submit("second question").expect("submit");
    let roles: Vec<Role> = transcript
        .messages()
        .iter()
        .map(|message| message.role)
        .collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
}
