//! Multicast packet sockets with per-packet control metadata.
//!
//! Both listeners enable `IP_PKTINFO` and `IP_RECVTTL` so every datagram
//! arrives with its source address, TTL, and ingress interface. Outbound
//! writes go through `sendmsg` with an `IP_PKTINFO` control message that
//! pins the egress interface.

use std::io::{self, IoSlice, IoSliceMut};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::AsRawFd;

use nix::cmsg_space;
use nix::libc;
use nix::sys::socket::{
    recvmsg, sendmsg, setsockopt, sockopt, ControlMessage, ControlMessageOwned, MsgFlags,
    SockaddrIn,
};
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::Result;
use crate::mdns::{MDNS_PORT, MULTICAST_GROUP};
use crate::net::interface::{Interface, TransmitDescriptor};

/// Per-packet control metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketMeta {
    /// Source address of the datagram.
    pub src: Ipv4Addr,
    /// Arrival TTL.
    pub ttl: u8,
    /// Ingress interface index.
    pub ifindex: u32,
}

/// Open a multicast listener bound to `listen_ip:port`.
///
/// Port 0 binds an ephemeral high port. The socket joins the mDNS group on
/// every selected interface, has multicast loopback disabled so our own
/// rebroadcasts are not received back, and is nonblocking for use behind an
/// `AsyncFd`.
pub fn open_listener(listen_ip: Ipv4Addr, port: u16, interfaces: &[Interface]) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    #[cfg(target_os = "linux")]
    socket.set_reuse_port(true)?;

    let bind_addr = SocketAddrV4::new(listen_ip, port);
    socket.bind(&bind_addr.into())?;

    for iface in interfaces {
        socket.join_multicast_v4(&MULTICAST_GROUP, &iface.addr)?;
    }

    socket.set_multicast_loop_v4(false)?;
    socket.set_multicast_ttl_v4(255)?;
    socket.set_nonblocking(true)?;

    setsockopt(&socket, sockopt::Ipv4PacketInfo, &true).map_err(io::Error::from)?;
    setsockopt(&socket, sockopt::Ipv4RecvTtl, &true).map_err(io::Error::from)?;

    Ok(socket)
}

/// Receive one datagram with its control metadata.
///
/// Returns the payload length and the metadata, or `None` for the metadata
/// when the kernel delivered no usable control messages.
pub fn recv_with_meta(socket: &Socket, buf: &mut [u8]) -> io::Result<(usize, Option<PacketMeta>)> {
    let mut iov = [IoSliceMut::new(buf)];
    let mut cmsg_buf = cmsg_space!(libc::in_pktinfo, libc::c_int);

    let msg = recvmsg::<SockaddrIn>(
        socket.as_raw_fd(),
        &mut iov,
        Some(&mut cmsg_buf),
        MsgFlags::empty(),
    )
    .map_err(io::Error::from)?;

    let len = msg.bytes;
    let src = msg.address.map(|addr| addr.ip());

    let mut ttl = None;
    let mut ifindex = None;
    for cmsg in msg.cmsgs().map_err(io::Error::from)? {
        match cmsg {
            ControlMessageOwned::Ipv4PacketInfo(info) => {
                ifindex = Some(info.ipi_ifindex as u32);
            }
            ControlMessageOwned::Ipv4Ttl(value) => {
                ttl = Some(value as u8);
            }
            _ => {}
        }
    }

    let meta = match (src, ttl, ifindex) {
        (Some(src), Some(ttl), Some(ifindex)) => Some(PacketMeta { src, ttl, ifindex }),
        _ => None,
    };

    Ok((len, meta))
}

/// Write raw bytes to the mDNS group through one egress interface.
pub fn send_multicast(
    socket: &Socket,
    data: &[u8],
    descriptor: &TransmitDescriptor,
) -> io::Result<usize> {
    let dst = SockaddrIn::from(SocketAddrV4::new(MULTICAST_GROUP, MDNS_PORT));
    let info = descriptor.pktinfo();
    let cmsgs = [ControlMessage::Ipv4PacketInfo(&info)];
    let iov = [IoSlice::new(data)];

    sendmsg(
        socket.as_raw_fd(),
        &iov,
        &cmsgs,
        MsgFlags::empty(),
        Some(&dst),
    )
    .map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Group joins need real multicast-capable interfaces, so these tests
    // stay on plain localhost binds.

    #[test]
    fn open_listener_binds_ephemeral_port() {
        let socket = open_listener(Ipv4Addr::LOCALHOST, 0, &[]).unwrap();
        let local = socket.local_addr().unwrap();
        let addr = local.as_socket_ipv4().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(*addr.ip(), Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn listener_delivers_metadata() {
        let receiver = open_listener(Ipv4Addr::LOCALHOST, 0, &[]).unwrap();
        let port = receiver
            .local_addr()
            .unwrap()
            .as_socket_ipv4()
            .unwrap()
            .port();

        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"ping", ("127.0.0.1", port)).unwrap();

        // The listener is nonblocking; poll briefly for the datagram.
        let mut buf = [0u8; 64];
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(1);
        loop {
            match recv_with_meta(&receiver, &mut buf) {
                Ok((len, meta)) => {
                    assert_eq!(&buf[..len], b"ping");
                    let meta = meta.expect("control metadata");
                    assert_eq!(meta.src, Ipv4Addr::LOCALHOST);
                    assert!(meta.ttl > 0);
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    assert!(std::time::Instant::now() < deadline, "no datagram received");
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
                Err(err) => panic!("recv failed: {}", err),
            }
        }
    }
}
