//! Integration tests for the Lobbyforge server: raw TCP and UDP clients
//! speaking the binary protocol against a server on a random port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lobbyforge::UdpStats;
use lobbyforge::prelude::*;
use lobbyforge_protocol::{NetworkLobbyInfo, PlayerList, declared_len};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

// =========================================================================
// Helpers
// =========================================================================

struct TestServer {
    tcp: SocketAddr,
    udp: SocketAddr,
    udp_stats: Arc<UdpStats>,
}

/// Starts a server on a random port and returns its addresses.
async fn start_server() -> TestServer {
    let server = LobbyforgeServer::builder()
        .bind("127.0.0.1:0")
        .udp_bind("127.0.0.1:0")
        .game_version("0.1.1")
        .build()
        .await
        .expect("server should build");

    let test_server = TestServer {
        tcp: server.local_addr().expect("should have local addr"),
        udp: server.udp_local_addr().expect("should have udp addr"),
        udp_stats: server.udp_stats(),
    };

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    test_server
}

async fn send(stream: &mut TcpStream, packet: &Packet) {
    let frame = packet.encode().expect("encode");
    stream.write_all(&frame).await.expect("write frame");
}

/// Reads exactly one frame, or `None` on EOF.
async fn try_recv(stream: &mut TcpStream) -> Option<Packet> {
    let mut prefix = [0u8; 7];
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut prefix))
        .await
        .expect("timed out waiting for a frame");
    if read.is_err() {
        return None;
    }
    let total = declared_len(&prefix).expect("length field");
    let mut frame = prefix.to_vec();
    frame.resize(total, 0);
    stream.read_exact(&mut frame[7..]).await.expect("frame body");
    Some(Packet::decode(&frame).expect("decode"))
}

async fn recv(stream: &mut TcpStream) -> Packet {
    try_recv(stream).await.expect("connection closed")
}

/// Reads until a packet with this header and flag arrives.
async fn recv_matching(stream: &mut TcpStream, header: Header, flag: Flag) -> Packet {
    loop {
        let packet = recv(stream).await;
        if packet.header == header.code() && packet.flag == flag {
            return packet;
        }
    }
}

fn hello(version: &str) -> Packet {
    Packet::with_body(
        Header::Hello,
        Flag::NONE,
        &Hello {
            name: "tester".into(),
            identity: "token".into(),
            version: version.into(),
        },
    )
    .unwrap()
}

/// Connects and completes the handshake.
async fn connect(server: &TestServer) -> (TcpStream, PlayerId) {
    let mut stream = TcpStream::connect(server.tcp).await.expect("should connect");
    send(&mut stream, &hello("0.1.1")).await;
    let ack = recv(&mut stream).await;
    assert_eq!(ack.kind().unwrap(), Header::Data);
    assert_eq!(ack.flag, response::ID_ASSIGN);
    let IdAssign { id } = ack.body().unwrap();
    (stream, PlayerId(id))
}

fn create_lobby(name: &str, max_players: i32) -> Packet {
    Packet::data(
        post::CREATE_LOBBY,
        &CreateLobby {
            name: name.into(),
            max_players,
            is_password_protected: false,
            password: String::new(),
        },
    )
    .unwrap()
}

fn empty_request(flag: Flag) -> Packet {
    Packet::new(Header::Data, flag, Vec::<u8>::new())
}

/// Creates a lobby and returns its ID, read back from the lobby list.
async fn host_lobby(stream: &mut TcpStream, name: &str) -> LobbyId {
    send(stream, &create_lobby(name, 4)).await;
    recv_matching(stream, Header::Data, response::LOBBY_INFO).await;
    send(stream, &empty_request(request::LOBBY_LIST)).await;
    let list: LobbyList = recv_matching(stream, Header::Data, response::LOBBY_LIST)
        .await
        .body()
        .unwrap();
    let entry = list.lobbies.iter().find(|l| l.name == name).expect("lobby listed");
    LobbyId(entry.id)
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_hello_assigns_player_id() {
    let server = start_server().await;
    let (_stream, player_id) = connect(&server).await;
    assert_ne!(player_id, PlayerId::UNASSIGNED);
    assert!(player_id.is_assigned());
}

#[tokio::test]
async fn test_hello_wrong_version_disconnects() {
    let server = start_server().await;
    let mut stream = TcpStream::connect(server.tcp).await.unwrap();

    send(&mut stream, &hello("0.0.0")).await;

    let notice = recv(&mut stream).await;
    assert_eq!(notice.kind().unwrap(), Header::Disconnecting);
    let payload: ErrorPayload = notice.body().unwrap();
    assert_eq!(payload.message, "DATA_MISMATCH");
    assert_eq!(payload.description, "VERSION");

    assert!(try_recv(&mut stream).await.is_none(), "server should close");
}

#[tokio::test]
async fn test_first_packet_must_be_hello() {
    let server = start_server().await;
    let mut stream = TcpStream::connect(server.tcp).await.unwrap();

    send(&mut stream, &empty_request(request::LOBBY_LIST)).await;

    let notice = recv(&mut stream).await;
    assert_eq!(notice.kind().unwrap(), Header::Disconnecting);
    let payload: ErrorPayload = notice.body().unwrap();
    assert_eq!(payload.message, "NO_EXPECTED_PACKET");
    assert_eq!(payload.description, "HELLO");
    assert!(try_recv(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_malformed_hello_payload() {
    let server = start_server().await;
    let mut stream = TcpStream::connect(server.tcp).await.unwrap();

    send(&mut stream, &Packet::new(Header::Hello, Flag::NONE, vec![0xFFu8; 3])).await;

    let payload: ErrorPayload = recv(&mut stream).await.body().unwrap();
    assert_eq!(payload.message, "INVALID_PACKET");
    assert_eq!(payload.description, "HELLO");
}

// =========================================================================
// Dispatch
// =========================================================================

#[tokio::test]
async fn test_unknown_flag_is_rejected_and_connection_survives() {
    let server = start_server().await;
    let (mut stream, _) = connect(&server).await;

    send(&mut stream, &empty_request(Flag(0x42))).await;
    let rejected = recv(&mut stream).await;
    assert_eq!(rejected.kind().unwrap(), Header::Rejected);
    let payload: ErrorPayload = rejected.body().unwrap();
    assert_eq!(payload.message, "FLAG_NOT_RECOGNIZED");

    send(&mut stream, &empty_request(request::LOBBY_LIST)).await;
    let list = recv_matching(&mut stream, Header::Data, response::LOBBY_LIST).await;
    let list: LobbyList = list.body().unwrap();
    assert!(list.lobbies.is_empty());
}

#[tokio::test]
async fn test_unknown_header_is_rejected() {
    let server = start_server().await;
    let (mut stream, _) = connect(&server).await;

    let odd = Packet {
        header: 0x0900,
        flag: Flag::NONE,
        payload: Default::default(),
    };
    send(&mut stream, &odd).await;

    let payload: ErrorPayload = recv_matching(&mut stream, Header::Rejected, Flag::NONE)
        .await
        .body()
        .unwrap();
    assert_eq!(payload.message, "HEADER_NOT_RECOGNIZED");
}

#[tokio::test]
async fn test_echo_comes_back() {
    let server = start_server().await;
    let (mut stream, _) = connect(&server).await;
    let echo = Packet::new(Header::Echo, Flag(0x01), vec![1u8, 2, 3]);

    send(&mut stream, &echo).await;

    assert_eq!(recv(&mut stream).await, echo);
}

#[tokio::test]
async fn test_disconnecting_closes_connection() {
    let server = start_server().await;
    let (mut stream, _) = connect(&server).await;

    send(&mut stream, &Packet::new(Header::Disconnecting, Flag::NONE, Vec::<u8>::new())).await;

    assert!(try_recv(&mut stream).await.is_none());
}

// =========================================================================
// Lobbies
// =========================================================================

#[tokio::test]
async fn test_create_lobby_too_few_players() {
    let server = start_server().await;
    let (mut stream, _) = connect(&server).await;

    send(&mut stream, &create_lobby("duo", 2)).await;

    let payload: ErrorPayload = recv_matching(&mut stream, Header::Rejected, Flag::NONE)
        .await
        .body()
        .unwrap();
    assert_eq!(payload.message, "INVALID_DATA");
    assert_eq!(payload.description, "MAX_PLAYERS_LESS_THAN_THREE");
}

#[tokio::test]
async fn test_create_lobby_then_list() {
    let server = start_server().await;
    let (mut stream, _) = connect(&server).await;

    send(&mut stream, &create_lobby("trio", 3)).await;
    recv_matching(&mut stream, Header::Data, response::LOBBY_INFO).await;
    send(&mut stream, &empty_request(request::LOBBY_LIST)).await;

    let list: LobbyList = recv_matching(&mut stream, Header::Data, response::LOBBY_LIST)
        .await
        .body()
        .unwrap();
    assert_eq!(list.lobbies.len(), 1);
    assert_eq!(list.lobbies[0].name, "trio");
    assert_eq!(list.lobbies[0].max_players, 3);
    assert_eq!(list.lobbies[0].player_count, 1);
}

#[tokio::test]
async fn test_create_lobby_notifies_idle_players() {
    let server = start_server().await;
    let (mut host, _) = connect(&server).await;
    let (mut browser, _) = connect(&server).await;

    send(&mut host, &create_lobby("den", 4)).await;

    let changed = recv_matching(&mut browser, Header::Data, response::LOBBY_LIST_CHANGED).await;
    assert!(changed.payload.is_empty());
}

#[tokio::test]
async fn test_join_then_player_list_and_chat() {
    let server = start_server().await;
    let (mut host, host_id) = connect(&server).await;
    let (mut guest, guest_id) = connect(&server).await;
    let lobby_id = host_lobby(&mut host, "den").await;

    let join = Packet::data(
        post::JOIN_LOBBY,
        &JoinLobby {
            lobby_id: lobby_id.0,
            password: String::new(),
        },
    )
    .unwrap();
    send(&mut guest, &join).await;
    let info: NetworkLobbyInfo = recv_matching(&mut guest, Header::Data, response::LOBBY_INFO)
        .await
        .body()
        .unwrap();
    let ids: Vec<i32> = info.players.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![host_id.0, guest_id.0]);
    assert!(info.players[0].is_host);

    send(&mut guest, &empty_request(request::PLAYER_LIST)).await;
    let list: PlayerList = recv_matching(&mut guest, Header::Data, response::PLAYER_LIST)
        .await
        .body()
        .unwrap();
    assert_eq!(list.players.len(), 2);

    let line = Packet::data(post::CHAT_MESSAGE, &Chat { message: "hi all".into() }).unwrap();
    send(&mut guest, &line).await;
    let relayed: Chat = recv_matching(&mut host, Header::Data, response::CHAT_MESSAGE)
        .await
        .body()
        .unwrap();
    assert_eq!(relayed.message, "hi all");
}

#[tokio::test]
async fn test_join_unknown_lobby() {
    let server = start_server().await;
    let (mut stream, _) = connect(&server).await;
    let join = Packet::data(
        post::JOIN_LOBBY,
        &JoinLobby {
            lobby_id: 12345,
            password: String::new(),
        },
    )
    .unwrap();

    send(&mut stream, &join).await;

    let payload: ErrorPayload = recv_matching(&mut stream, Header::Rejected, Flag::NONE)
        .await
        .body()
        .unwrap();
    assert_eq!(payload.message, "LOBBY_NOT_FOUND");
}

#[tokio::test]
async fn test_join_full_lobby_is_rejected_and_roster_unchanged() {
    let server = start_server().await;
    let (mut host, _) = connect(&server).await;
    send(&mut host, &create_lobby("trio", 3)).await;
    recv_matching(&mut host, Header::Data, response::LOBBY_INFO).await;
    send(&mut host, &empty_request(request::LOBBY_LIST)).await;
    let list: LobbyList = recv_matching(&mut host, Header::Data, response::LOBBY_LIST)
        .await
        .body()
        .unwrap();
    let lobby_id = list.lobbies[0].id;
    let join = Packet::data(
        post::JOIN_LOBBY,
        &JoinLobby {
            lobby_id,
            password: String::new(),
        },
    )
    .unwrap();

    // Guests stay connected for the rest of the test.
    let mut guests = Vec::new();
    for _ in 0..2 {
        let (mut guest, _) = connect(&server).await;
        send(&mut guest, &join).await;
        recv_matching(&mut guest, Header::Data, response::LOBBY_INFO).await;
        guests.push(guest);
    }

    let (mut late, _) = connect(&server).await;
    send(&mut late, &join).await;
    let payload: ErrorPayload = recv_matching(&mut late, Header::Rejected, Flag::NONE)
        .await
        .body()
        .unwrap();
    assert_eq!(payload.message, "LOBBY_FULL");

    send(&mut host, &empty_request(request::PLAYER_LIST)).await;
    let roster: PlayerList = recv_matching(&mut host, Header::Data, response::PLAYER_LIST)
        .await
        .body()
        .unwrap();
    assert_eq!(roster.players.len(), 3);
}

#[tokio::test]
async fn test_lobby_closing_notifies_idle_players() {
    let server = start_server().await;
    let (mut host, _) = connect(&server).await;
    let (mut browser, _) = connect(&server).await;
    host_lobby(&mut host, "den").await;
    recv_matching(&mut browser, Header::Data, response::LOBBY_LIST_CHANGED).await;

    // The sole member leaving closes the lobby.
    drop(host);

    let changed = recv_matching(&mut browser, Header::Data, response::LOBBY_LIST_CHANGED).await;
    assert!(changed.payload.is_empty());
    send(&mut browser, &empty_request(request::LOBBY_LIST)).await;
    let list: LobbyList = recv_matching(&mut browser, Header::Data, response::LOBBY_LIST)
        .await
        .body()
        .unwrap();
    assert!(list.lobbies.is_empty());
}

#[tokio::test]
async fn test_disconnect_leaves_lobby() {
    let server = start_server().await;
    let (mut host, host_id) = connect(&server).await;
    let (mut guest, _) = connect(&server).await;
    let lobby_id = host_lobby(&mut host, "den").await;
    let join = Packet::data(
        post::JOIN_LOBBY,
        &JoinLobby {
            lobby_id: lobby_id.0,
            password: String::new(),
        },
    )
    .unwrap();
    send(&mut guest, &join).await;
    recv_matching(&mut guest, Header::Data, response::LOBBY_INFO).await;

    drop(guest);

    // The host keeps receiving LobbyInfo until the one without the guest.
    loop {
        let info: NetworkLobbyInfo = recv_matching(&mut host, Header::Data, response::LOBBY_INFO)
            .await
            .body()
            .unwrap();
        if info.players.len() == 1 {
            assert_eq!(info.players[0].id, host_id.0);
            break;
        }
    }
}

// =========================================================================
// UDP
// =========================================================================

#[tokio::test]
async fn test_im_here_binds_endpoint_for_udp_echo() {
    let server = start_server().await;
    let (_stream, player_id) = connect(&server).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let im_here = Packet::with_body(
        Header::ImHere,
        Flag::NONE,
        &ImHere {
            player_id: player_id.0,
        },
    )
    .unwrap();
    socket.send_to(&im_here.encode().unwrap(), server.udp).await.unwrap();

    let echo = Packet::new(Header::Echo, Flag(0x02), vec![7u8; 5]);
    socket.send_to(&echo.encode().unwrap(), server.udp).await.unwrap();

    let mut buf = [0u8; 2048];
    let (n, from) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("echo over UDP")
        .unwrap();
    assert_eq!(from, server.udp);
    assert_eq!(Packet::decode(&buf[..n]).unwrap(), echo);
    assert_eq!(server.udp_stats.bound(), 1);
}

#[tokio::test]
async fn test_udp_from_unmapped_endpoint_is_dropped() {
    let server = start_server().await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let echo = Packet::new(Header::Echo, Flag::NONE, Vec::<u8>::new());

    socket.send_to(&echo.encode().unwrap(), server.udp).await.unwrap();

    let stats = Arc::clone(&server.udp_stats);
    wait_until(|| stats.unmapped() == 1).await;
}

#[tokio::test]
async fn test_holepunch_is_ignored() {
    let server = start_server().await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    socket.send_to(b"holepunch", server.udp).await.unwrap();

    let stats = Arc::clone(&server.udp_stats);
    wait_until(|| stats.holepunch() == 1).await;
    assert_eq!(stats.unmapped(), 0);
    assert_eq!(stats.malformed(), 0);
}
