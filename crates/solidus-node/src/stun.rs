//! External-IP discovery over STUN (RFC 3489).
//!
//! A fire-and-forget probe: walk the server list in a pseudo-random
//! order derived from caller entropy, send one BIND request per server
//! with a short timeout, and return the first MAPPED-ADDRESS that comes
//! back. The walk and the wire codec are separated from the socket so
//! the traversal is testable without a network.

use std::net::{Ipv4Addr, SocketAddrV4, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::{debug, info};

/// BIND request message type.
const STUN_BINDREQ: u16 = 0x0001;

/// MAPPED-ADDRESS attribute type.
const STUN_MAPPED_ADDRESS: u16 = 0x0001;

/// Per-server response timeout.
const STUN_TIMEOUT: Duration = Duration::from_secs(3);

/// One STUN server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StunServer {
    /// Host name.
    pub host: &'static str,
    /// UDP port.
    pub port: u16,
}

/// Well-known public STUN servers.
pub const STUN_SERVERS: &[StunServer] = &[
    StunServer { host: "stun.l.google.com", port: 19302 },
    StunServer { host: "stun1.l.google.com", port: 19302 },
    StunServer { host: "stun2.l.google.com", port: 19302 },
    StunServer { host: "stun3.l.google.com", port: 19302 },
    StunServer { host: "stun4.l.google.com", port: 19302 },
    StunServer { host: "stun.12connect.com", port: 3478 },
    StunServer { host: "stun.12voip.com", port: 3478 },
    StunServer { host: "stun.1und1.de", port: 3478 },
    StunServer { host: "stun.acrobits.cz", port: 3478 },
    StunServer { host: "stun.antisip.com", port: 3478 },
    StunServer { host: "stun.avigora.fr", port: 3478 },
    StunServer { host: "stun.bluesip.net", port: 3478 },
    StunServer { host: "stun.cloudflare.com", port: 3478 },
    StunServer { host: "stun.cope.es", port: 3478 },
    StunServer { host: "stun.counterpath.com", port: 3478 },
    StunServer { host: "stun.dus.net", port: 3478 },
    StunServer { host: "stun.ekiga.net", port: 3478 },
    StunServer { host: "stun.epygi.com", port: 3478 },
    StunServer { host: "stun.flashdance.cx", port: 3478 },
    StunServer { host: "stun.freeswitch.org", port: 3478 },
    StunServer { host: "stun.gmx.de", port: 3478 },
    StunServer { host: "stun.gmx.net", port: 3478 },
    StunServer { host: "stun.internetcalls.com", port: 3478 },
    StunServer { host: "stun.linphone.org", port: 3478 },
    StunServer { host: "stun.liveo.fr", port: 3478 },
    StunServer { host: "stun.lundimatin.fr", port: 3478 },
    StunServer { host: "stun.mit.de", port: 3478 },
    StunServer { host: "stun.nextcloud.com", port: 443 },
    StunServer { host: "stun.schlund.de", port: 3478 },
    StunServer { host: "stun.sip.us", port: 3478 },
    StunServer { host: "stun.sipgate.net", port: 3478 },
    StunServer { host: "stun.sonetel.com", port: 3478 },
    StunServer { host: "stun.t-online.de", port: 3478 },
    StunServer { host: "stun.uls.co.za", port: 3478 },
    StunServer { host: "stun.voipbuster.com", port: 3478 },
    StunServer { host: "stun.voipgate.com", port: 3478 },
    StunServer { host: "stun.voipstunt.com", port: 3478 },
    StunServer { host: "stun.voys.nl", port: 3478 },
    StunServer { host: "stun.zadarma.com", port: 3478 },
    StunServer { host: "stunserver.stunprotocol.org", port: 3478 },
];

/// The constant table the transaction-id stir reads from: the server
/// list rendered as bytes.
fn stir_table(servers: &[StunServer]) -> Vec<u8> {
    let mut table = Vec::new();
    for server in servers {
        table.extend_from_slice(server.host.as_bytes());
        table.extend_from_slice(&server.port.to_be_bytes());
    }
    // The stir reads 8-byte words at byte offsets; pad for the tail.
    table.extend_from_slice(&[0u8; 8]);
    table
}

/// Generate a 16-byte transaction id.
///
/// Four random 32-bit words are masked with `0x55555555` (OR into words
/// 0 and 2, AND into 1 and 3), then stirred twenty rounds with a
/// rotate-and-add step over the constant table, the filler carrying
/// state between calls.
pub fn transaction_id(filler: &mut u64, table: &[u8]) -> [u8; 16] {
    let mut words: [u32; 4] = [
        rand::random::<u32>() | 0x5555_5555,
        rand::random::<u32>() & 0x5555_5555,
        rand::random::<u32>() | 0x5555_5555,
        rand::random::<u32>() & 0x5555_5555,
    ];

    let mut x: u8 = 20;
    while x > 0 {
        let offset = (*filler as u8) as usize % (table.len() - 8);
        let mut word = [0u8; 8];
        word.copy_from_slice(&table[offset..offset + 8]);
        let s_elm = u64::from_le_bytes(word);

        *filler ^= filler.rotate_left(5);
        *filler = filler.wrapping_add(s_elm ^ x as u64);
        words[(x & 3) as usize] ^= filler.wrapping_add(*filler >> 13) as u32;
        x -= 1;
    }

    let mut id = [0u8; 16];
    for (i, word) in words.iter().enumerate() {
        id[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    id
}

/// Build a BIND request: type, zero length, transaction id.
pub fn bind_request(id: &[u8; 16]) -> [u8; 20] {
    let mut packet = [0u8; 20];
    packet[0..2].copy_from_slice(&STUN_BINDREQ.to_be_bytes());
    // msglen stays zero.
    packet[4..20].copy_from_slice(id);
    packet
}

/// Pull the MAPPED-ADDRESS out of a BIND response.
pub fn parse_mapped_address(packet: &[u8]) -> Option<SocketAddrV4> {
    if packet.len() < 20 {
        return None;
    }
    let advertised = u16::from_be_bytes([packet[2], packet[3]]) as usize;
    let mut body = &packet[20..packet.len().min(20 + advertised)];

    while body.len() >= 4 {
        let attr_type = u16::from_be_bytes([body[0], body[1]]);
        let attr_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        if body.len() < 4 + attr_len {
            return None;
        }
        if attr_type == STUN_MAPPED_ADDRESS && attr_len == 8 {
            let value = &body[4..12];
            let port = u16::from_be_bytes([value[2], value[3]]);
            let addr = Ipv4Addr::new(value[4], value[5], value[6], value[7]);
            return Some(SocketAddrV4::new(addr, port));
        }
        body = &body[4 + attr_len..];
    }
    None
}

/// Walk the server list with a pseudo-random `(pos, step)` pair derived
/// from `rnd`, probing each visited server, for at most twice the list
/// length. Returns the mapped address and the index of the answering
/// server.
pub fn discover_with<F>(
    rnd: u64,
    servers: &[StunServer],
    mut probe: F,
) -> Option<(SocketAddrV4, usize)>
where
    F: FnMut(&StunServer) -> Option<SocketAddrV4>,
{
    if servers.is_empty() {
        return None;
    }
    let len = servers.len() as u64;
    let mut pos = rnd as u16 as u64 % len;
    let mut r = rnd;
    let step = loop {
        r = (r >> 8) | 0xff00_0000_0000_0000;
        let step = r % len;
        if step != 0 {
            break step;
        }
    };

    for attempt in 1..(servers.len() * 2) {
        pos = (pos + step) % len;
        let server = &servers[pos as usize];
        debug!(attempt, host = server.host, "STUN probe");
        if let Some(mapped) = probe(server) {
            return Some((mapped, pos as usize));
        }
    }
    None
}

/// Send one BIND request to a server and wait for the mapped address.
fn udp_probe(filler: &mut u64, table: &[u8], server: &StunServer) -> Option<SocketAddrV4> {
    let target = (server.host, server.port)
        .to_socket_addrs()
        .ok()?
        .find(|a| a.is_ipv4())?;
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.set_read_timeout(Some(STUN_TIMEOUT)).ok()?;

    let id = transaction_id(filler, table);
    socket.send_to(&bind_request(&id), target).ok()?;

    let mut buf = [0u8; 1024];
    let (len, _) = socket.recv_from(&mut buf).ok()?;
    parse_mapped_address(&buf[..len])
}

/// Discover this node's external IPv4 endpoint.
///
/// Blocking; run it on a blocking task. Returns the mapped endpoint and
/// the answering server's host name.
pub fn external_ip(entropy: u64) -> Option<(SocketAddrV4, &'static str)> {
    let table = stir_table(STUN_SERVERS);
    let mut filler = entropy;
    let result = discover_with(entropy, STUN_SERVERS, |server| {
        udp_probe(&mut filler, &table, server)
    });
    match &result {
        Some((mapped, index)) => info!(
            mapped = %mapped,
            server = STUN_SERVERS[*index].host,
            "External address discovered"
        ),
        None => debug!("External address discovery failed"),
    }
    result.map(|(mapped, index)| (mapped, STUN_SERVERS[index].host))
}
