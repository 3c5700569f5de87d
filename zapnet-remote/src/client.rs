use crate::error::Error;
use log::{debug, trace};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;
use zapnet_packets::etherbone::{fill_read_request, fill_write_request, EtherbonePacket};

/// How long a read waits for its reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Words a single Etherbone record can carry; longer accesses are split.
pub const MAX_WORDS_PER_RECORD: usize = 255;

const DATAGRAM_CAPACITY: usize = 2048;

/// An Etherbone session with one device.
///
/// Every read carries a fresh return address; the device echoes it as the base address of
/// its reply, which is how late replies to earlier, timed-out reads are told apart.
pub struct RemoteClient {
    socket: UdpSocket,
    timeout: Duration,
    next_tag: AtomicU32,
}

impl RemoteClient {
    /// Binds `local` and talks to the device at `remote` only.
    pub async fn connect(local: SocketAddr, remote: SocketAddr) -> Result<Self, Error> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        debug!("etherbone session {} -> {}", socket.local_addr()?, remote);
        Ok(RemoteClient {
            socket,
            timeout: DEFAULT_TIMEOUT,
            next_tag: AtomicU32::new(0),
        })
    }

    /// Replaces the per-read reply timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-read reply timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Address the session is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// Reads one word.
    pub async fn read(&self, addr: u32) -> Result<u32, Error> {
        let values = self.read_many(&[addr]).await?;
        values
            .first()
            .copied()
            .ok_or(Error::MalformedReply("reply carried no values"))
    }

    /// Reads arbitrary addresses, in order.
    pub async fn read_many(&self, addrs: &[u32]) -> Result<Vec<u32>, Error> {
        let mut values = Vec::with_capacity(addrs.len());
        for chunk in addrs.chunks(MAX_WORDS_PER_RECORD) {
            values.extend(self.read_record(chunk).await?);
        }
        Ok(values)
    }

    /// Writes one word.
    pub async fn write(&self, addr: u32, value: u32) -> Result<(), Error> {
        self.write_burst(addr, &[value]).await
    }

    /// Writes `values` to consecutive words starting at `base`. Writes are not acknowledged.
    pub async fn write_burst(&self, base: u32, values: &[u32]) -> Result<(), Error> {
        let mut request = [0u8; DATAGRAM_CAPACITY];
        for (index, chunk) in values.chunks(MAX_WORDS_PER_RECORD).enumerate() {
            let addr = base.wrapping_add((index * MAX_WORDS_PER_RECORD * 4) as u32);
            let length = fill_write_request(&mut request, addr, chunk).map_err(Error::Request)?;
            trace!("write {} words at {:#010x}", chunk.len(), addr);
            self.socket.send(&request[..length]).await?;
        }
        Ok(())
    }

    async fn read_record(&self, addrs: &[u32]) -> Result<Vec<u32>, Error> {
        let tag = self.next_tag.fetch_add(4, Ordering::Relaxed);
        let mut request = [0u8; DATAGRAM_CAPACITY];
        let length = fill_read_request(&mut request, tag, addrs).map_err(Error::Request)?;
        self.socket.send(&request[..length]).await?;
        trace!("read {} words, tag {:#x}", addrs.len(), tag);

        match time::timeout(self.timeout, self.await_reply(tag, addrs.len())).await {
            Ok(reply) => reply,
            Err(_) => Err(Error::Timeout {
                addr: addrs.first().copied().unwrap_or_default(),
            }),
        }
    }

    async fn await_reply(&self, tag: u32, count: usize) -> Result<Vec<u32>, Error> {
        let mut buffer = [0u8; DATAGRAM_CAPACITY];
        loop {
            let received = self.socket.recv(&mut buffer).await?;
            let reply = match EtherbonePacket::new_checked(&buffer[..received]) {
                Ok(reply) => reply,
                Err(e) => {
                    debug!("ignoring datagram: {}", e);
                    continue;
                }
            };
            if !reply.is_supported() || reply.wcount() == 0 {
                debug!("ignoring datagram without a reply record");
                continue;
            }
            if reply.base_write_addr() != tag {
                debug!("ignoring stale reply {:#x}", reply.base_write_addr());
                continue;
            }
            if usize::from(reply.wcount()) != count {
                return Err(Error::MalformedReply("word count differs from the request"));
            }
            return Ok((0..count).map(|index| reply.write_value(index)).collect());
        }
    }
}
