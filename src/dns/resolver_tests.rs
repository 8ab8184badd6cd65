// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the nameserver-backed resolver
//!
//! These tests never reach a real nameserver: they cover configuration and the
//! failure paths that do not depend on network answers.

use super::*;

#[test]
fn test_zero_in_flight_is_raised_to_one() {
    let resolver = DnsResolver::new(Vec::new(), Transport::Udp, Duration::from_secs(1), 0);

    assert_eq!(resolver.dispatch.available_permits(), 1);
}

#[test]
fn test_in_flight_limit_is_honored() {
    let resolver = DnsResolver::new(Vec::new(), Transport::Tcp, Duration::from_secs(1), 4);

    assert_eq!(resolver.dispatch.available_permits(), 4);
}

#[test]
fn test_nameservers_keep_configured_order() {
    let servers: Vec<SocketAddr> = vec![
        "10.0.0.2:53".parse().unwrap(),
        "10.0.0.1:53".parse().unwrap(),
    ];
    let resolver = DnsResolver::new(servers.clone(), Transport::Udp, Duration::from_secs(1), 1);

    assert_eq!(resolver.nameservers(), servers.as_slice());
}

#[test]
fn test_default_transport_is_udp() {
    assert_eq!(Transport::default(), Transport::Udp);
}

#[tokio::test]
async fn test_no_nameserver_is_a_failure() {
    let resolver = DnsResolver::new(Vec::new(), Transport::Udp, Duration::from_secs(1), 1);

    let resolution = resolver.resolve(&DnsRequest::a("cache.example.com")).await;

    assert!(matches!(
        resolution,
        DnsResolution::Failure(DnsError::NoNameservers)
    ));
}

#[tokio::test]
async fn test_invalid_name_is_a_failure() {
    let resolver = DnsResolver::new(
        vec!["127.0.0.1:53".parse().unwrap()],
        Transport::Udp,
        Duration::from_secs(1),
        1,
    );
    let label = "a".repeat(64);

    let resolution = resolver.resolve(&DnsRequest::srv(label)).await;

    assert!(matches!(
        resolution,
        DnsResolution::Failure(DnsError::InvalidName { .. })
    ));
}

#[tokio::test]
async fn test_permit_is_released_after_failure() {
    let resolver = DnsResolver::new(Vec::new(), Transport::Udp, Duration::from_secs(1), 1);

    for _ in 0..3 {
        let resolution = resolver.resolve(&DnsRequest::a("cache.example.com")).await;
        assert!(!resolution.is_success());
    }
    assert_eq!(resolver.dispatch.available_permits(), 1);
}

fn answer(truncated: bool) -> Answer {
    Answer {
        code: ResponseCode::NoError,
        truncated,
        records: Vec::new(),
    }
}

#[test]
fn test_truncated_udp_answer_is_retried_over_tcp() {
    assert!(retries_over_tcp(Transport::Udp, &answer(true)));
    assert!(!retries_over_tcp(Transport::Udp, &answer(false)));
    assert!(!retries_over_tcp(Transport::Tcp, &answer(true)));
}

mod truncation {
    use super::*;
    use hickory_client::op::{Message, MessageType, OpCode};
    use hickory_client::rr::rdata::A;
    use hickory_client::rr::RData;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpListener, UdpSocket};

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn respond(request: &[u8], ips: &[Ipv4Addr], truncated: bool) -> Vec<u8> {
        let request = Message::from_vec(request).unwrap();
        let name = request.queries()[0].name().clone();

        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_response_code(ResponseCode::NoError)
            .set_recursion_desired(request.recursion_desired())
            .set_truncated(truncated);
        response.add_queries(request.queries().to_vec());
        for &ip in ips {
            response.add_answer(Record::from_rdata(name.clone(), 60, RData::A(A(ip))));
        }
        response.to_vec().unwrap()
    }

    /// UDP and TCP listeners on the same local port. UDP answers with the first
    /// address only and the TC bit set, TCP answers with every address.
    fn nameserver(ips: Vec<Ipv4Addr>) -> SocketAddr {
        let tcp = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = tcp.local_addr().unwrap();
        let udp = UdpSocket::bind(addr).unwrap();

        let partial = vec![ips[0]];
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            let (len, peer) = udp.recv_from(&mut buf).unwrap();
            udp.send_to(&respond(&buf[..len], &partial, true), peer)
                .unwrap();
        });
        std::thread::spawn(move || {
            let (mut stream, _) = tcp.accept().unwrap();
            let mut len = [0u8; 2];
            stream.read_exact(&mut len).unwrap();
            let mut buf = vec![0u8; usize::from(u16::from_be_bytes(len))];
            stream.read_exact(&mut buf).unwrap();

            let reply = respond(&buf, &ips, false);
            let reply_len = u16::try_from(reply.len()).unwrap().to_be_bytes();
            stream.write_all(&reply_len).unwrap();
            stream.write_all(&reply).unwrap();
            stream.flush().unwrap();
        });

        addr
    }

    #[test]
    fn test_truncated_answer_is_completed_over_tcp() {
        let server = nameserver(vec![ip(1), ip(2), ip(3)]);
        let qname = Name::from_ascii("cache.example.com.").unwrap();

        let records = query_nameservers(
            &[server],
            Transport::Udp,
            Duration::from_secs(5),
            &qname,
            RecordType::A,
        )
        .unwrap();

        let addresses: Vec<_> = records
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::A(a)) => Some(a.0),
                _ => None,
            })
            .collect();
        assert_eq!(addresses, vec![ip(1), ip(2), ip(3)]);
    }
}
