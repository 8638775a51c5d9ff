//! Listener over a real socket.
//!
//! The wire format does not depend on the in-memory mesh, so a listener fed
//! from a loopback TCP stream must behave exactly like one fed from a
//! channel.

use pdes_core::EventInfo;
use pdes_test_helpers::{TestPayload, FORWARD};
use pdes_transport::codec::{command_frame, encode_frame, SHUTDOWN};
use pdes_transport::{shared_queue, Listener, SharedClock, StreamFrameSource};
use pdes_types::{EntityId, LpId, VirtualTime};
use std::io::Write;
use std::net::{TcpListener, TcpStream};

fn event(seq: u64, time: u64) -> EventInfo<TestPayload> {
    let mut event = EventInfo::new(
        EntityId::new('n', seq),
        FORWARD,
        VirtualTime(1),
        TestPayload::new(seq, 3),
    );
    event.time = VirtualTime(time);
    event
}

#[test]
fn test_listener_over_loopback_socket() {
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();

    let sender = std::thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        // Write frames in odd-sized pieces so reads straddle frame boundaries.
        let mut wire = Vec::new();
        for seq in 0..50u64 {
            wire.extend_from_slice(&encode_frame(&event(seq, 100 - seq)).unwrap());
        }
        wire.extend_from_slice(&command_frame(SHUTDOWN));
        for chunk in wire.chunks(7) {
            stream.write_all(chunk).unwrap();
        }
        stream.flush().unwrap();
    });

    let (stream, _) = server.accept().unwrap();
    let queue = shared_queue::<TestPayload>();
    let stats = Listener::new(
        LpId(0),
        StreamFrameSource::new(stream),
        queue.clone(),
        SharedClock::new(),
    )
    .spawn()
    .unwrap()
    .join()
    .unwrap()
    .unwrap();
    sender.join().unwrap();

    assert_eq!(stats.envelopes, 50);
    assert_eq!(stats.frames, 51);
    assert_eq!(stats.decode_errors, 0);

    let mut queue = queue.lock();
    assert_eq!(queue.len(), 50);
    let first = queue.pop_min().unwrap();
    assert_eq!(first.time, VirtualTime(51));
    assert_eq!(*first.payload, TestPayload::new(49, 3));
}

#[test]
fn test_listener_stops_when_peer_closes() {
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();

    let sender = std::thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .write_all(&encode_frame(&event(1, 10)).unwrap())
            .unwrap();
    });

    let (stream, _) = server.accept().unwrap();
    let queue = shared_queue::<TestPayload>();
    let listener = Listener::new(
        LpId(1),
        StreamFrameSource::new(stream),
        queue.clone(),
        SharedClock::new(),
    )
    .spawn()
    .unwrap();
    sender.join().unwrap();

    let stats = listener.join().unwrap().unwrap();
    assert_eq!(stats.envelopes, 1);
    assert_eq!(queue.lock().peek_time(), Some(VirtualTime(10)));
}
