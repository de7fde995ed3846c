use std::net::UdpSocket;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use can_gateway::frame::{
    FRAME_WIRE_LEN, TIMESTAMPED_WIRE_LEN, decode_timestamped, encode_frame_into,
    encode_timestamped_into,
};
use can_gateway::{GatewayFrame, RecvStatus, UdpTransport};
use embedded_can::{Frame as _, StandardId};

fn frame(id: u16, data: &[u8]) -> GatewayFrame {
    GatewayFrame::new(StandardId::new(id).unwrap(), data).unwrap()
}

/// A bound receiver plus a sender whose fixed peer is the receiver.
fn transport_pair() -> (UdpTransport, UdpTransport) {
    // The receiver's own peer address is never used; it only receives.
    let receiver = UdpTransport::open("127.0.0.1", 9).unwrap();
    receiver.bind_any(0).unwrap();
    let port = receiver.local_addr().unwrap().port();
    let sender = UdpTransport::open("127.0.0.1", port).unwrap();
    (sender, receiver)
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

#[test]
fn frames_pass_through_bit_identical() {
    let (sender, receiver) = transport_pair();
    receiver.set_receive_timeout(Duration::from_secs(2)).unwrap();

    let boundary_frames = [
        frame(0x000, &[]),
        frame(0x7FF, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]),
        frame(0x1D2, &[0xBB, 0xFF]),
        frame(0x0C9, &[0xFF, 0xBB, 0, 0]),
    ];

    for sent in boundary_frames {
        sender.transmit(&sent).unwrap();
        match receiver.receive().unwrap() {
            RecvStatus::Received(got) => {
                assert_eq!(got.raw_id(), sent.raw_id());
                assert_eq!(got.dlc(), sent.dlc());
                assert_eq!(got.data(), sent.data());
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }
}

#[test]
fn timestamped_datagram_has_fixed_layout() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = receiver.local_addr().unwrap().port();
    let sender = UdpTransport::open("127.0.0.1", port).unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    let forwarded = frame(0x1D2, &[0xBB, 0xFF, 0, 0, 0, 0, 0, 0]);
    let before = wall_clock_ms();
    let mut record = [0u8; TIMESTAMPED_WIRE_LEN];
    encode_timestamped_into(&mut record, wall_clock_ms(), &forwarded);
    sender.transmit_raw(&record).unwrap();

    let mut buf = [0u8; 64];
    let received = receiver.recv(&mut buf).unwrap();
    let after = wall_clock_ms();

    assert_eq!(received, TIMESTAMPED_WIRE_LEN);

    let mut expected = [0u8; FRAME_WIRE_LEN];
    encode_frame_into(&mut expected, &forwarded);
    assert_eq!(&buf[8..TIMESTAMPED_WIRE_LEN], &expected);

    let (time_ms, decoded) = decode_timestamped(&buf[..received]).unwrap();
    assert_eq!(decoded, forwarded);
    assert!(time_ms >= before && time_ms <= after);
}

#[test]
fn receive_times_out_within_the_configured_deadline() {
    let (_sender, receiver) = transport_pair();
    receiver.set_receive_timeout(Duration::from_secs(1)).unwrap();

    let started = Instant::now();
    let status = receiver.receive().unwrap();
    let elapsed = started.elapsed();

    assert_eq!(status, RecvStatus::TimedOut);
    assert!(elapsed >= Duration::from_millis(900), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "returned too late: {elapsed:?}");
}

#[test]
fn runt_datagrams_are_discarded() {
    let receiver = UdpTransport::open("127.0.0.1", 9).unwrap();
    receiver.bind_any(0).unwrap();
    receiver.set_receive_timeout(Duration::from_secs(2)).unwrap();
    let target = receiver.local_addr().unwrap();

    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    peer.send_to(&[0xAB; 5], target).unwrap();
    assert_eq!(receiver.receive().unwrap(), RecvStatus::Discarded);

    peer.send_to(&[], target).unwrap();
    assert_eq!(receiver.receive().unwrap(), RecvStatus::Discarded);
}

#[test]
fn oversized_datagrams_are_truncated_to_one_record() {
    let receiver = UdpTransport::open("127.0.0.1", 9).unwrap();
    receiver.bind_any(0).unwrap();
    receiver.set_receive_timeout(Duration::from_secs(2)).unwrap();
    let target = receiver.local_addr().unwrap();

    let mut oversized = [0u8; FRAME_WIRE_LEN + 4];
    let mut record = [0u8; FRAME_WIRE_LEN];
    encode_frame_into(&mut record, &frame(0x123, &[0xAA]));
    oversized[..FRAME_WIRE_LEN].copy_from_slice(&record);

    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    peer.send_to(&oversized, target).unwrap();

    match receiver.receive().unwrap() {
        RecvStatus::Received(got) => assert_eq!(got, frame(0x123, &[0xAA])),
        other => panic!("expected truncated record, got {other:?}"),
    }
}
