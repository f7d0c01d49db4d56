// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format tests: length-prefix framing and JSON encoding.

use std::time::Duration;

use jsd_core::{JobCounts, JobId, JobRecord, JobSpec, JobStatus};
use yare::parameterized;

use super::*;

const TIMEOUT: Duration = Duration::from_secs(1);

#[test]
fn encode_returns_json_without_length_prefix() {
    let response = Response::Ok;
    let encoded = encode(&response).expect("encode failed");

    // encode() returns raw JSON, no length prefix
    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(json_str.starts_with('{'), "should be JSON object: {}", json_str);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_message_on_empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed), "got {err:?}");
}

#[tokio::test]
async fn read_message_rejects_oversized_length() {
    let len = (MAX_MESSAGE_SIZE as u32) + 1;
    let mut cursor = std::io::Cursor::new(len.to_be_bytes().to_vec());
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::MessageTooLarge { .. }), "got {err:?}");
}

#[tokio::test]
async fn read_message_truncated_payload_is_io_error() {
    let mut buffer = 10u32.to_be_bytes().to_vec();
    buffer.extend_from_slice(b"abc");
    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn read_request_times_out_on_silent_peer() {
    let (mut client, _server) = tokio::io::duplex(64);
    let err = read_request(&mut client, Duration::from_millis(20)).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn request_and_response_cross_a_duplex_stream() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let spec = JobSpec::new("echo").arg("hi");
    let request = Request::Submit { spec };
    write_request(&mut client, &request, TIMEOUT).await.unwrap();
    assert_eq!(read_request(&mut server, TIMEOUT).await.unwrap(), request);

    let response = Response::Submitted { id: JobId(3), status: JobStatus::Scheduled };
    write_response(&mut server, &response, TIMEOUT).await.unwrap();
    assert_eq!(read_response(&mut client, TIMEOUT).await.unwrap(), response);
}

#[test]
fn garbage_payload_is_json_error() {
    let err = decode::<Request>(b"{\"type\":\"Launch\"}").unwrap_err();
    assert!(matches!(err, ProtocolError::Json(_)), "got {err:?}");
}

#[parameterized(
    ping = { Request::Ping, r#"{"type":"Ping"}"# },
    start = { Request::Start, r#"{"type":"Start"}"# },
    kill = { Request::Kill { id: JobId(7) }, r#"{"type":"Kill","id":7}"# },
    killall = { Request::KillAll, r#"{"type":"KillAll"}"# },
    hello_without_token = {
        Request::Hello { version: "1".into(), token: None },
        r#"{"type":"Hello","version":"1"}"#
    },
)]
fn request_json_shape(request: Request, expected: &str) {
    assert_eq!(String::from_utf8(encode(&request).unwrap()).unwrap(), expected);
}

#[parameterized(
    no_such_job = { ErrorKind::NoSuchJob, "\"no_such_job\"" },
    already_started = { ErrorKind::AlreadyStarted, "\"already_started\"" },
    shutting_down = { ErrorKind::ShuttingDown, "\"shutting_down\"" },
)]
fn error_kind_is_snake_case(kind: ErrorKind, expected: &str) {
    assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
}

#[test]
fn jobs_response_carries_full_records() {
    let mut record = JobRecord::new(JobId(1), JobSpec::new("true"), 5);
    record.status = JobStatus::Completed;
    record.exit_code = Some(0);
    let response = Response::Jobs { jobs: vec![record.clone()] };

    let bytes = encode(&response).unwrap();
    let Response::Jobs { jobs } = decode::<Response>(&bytes).unwrap() else {
        panic!("expected Jobs");
    };
    assert_eq!(jobs, vec![record]);
}

#[test]
fn status_response_embeds_counts() {
    let jobs: JobCounts = [JobStatus::Running, JobStatus::Failed].into_iter().collect();
    let response = Response::Status { uptime_secs: 3, cores: 4, capacity: 5, jobs };
    let value: serde_json::Value = serde_json::from_slice(&encode(&response).unwrap()).unwrap();
    assert_eq!(value["jobs"]["running"], 1);
    assert_eq!(value["jobs"]["failed"], 1);
    assert_eq!(value["capacity"], 5);
}

#[test]
fn request_names_are_lowercase() {
    assert_eq!(Request::KillAll.name(), "killall");
    assert_eq!(Request::Submit { spec: JobSpec::new("x") }.name(), "submit");
}
