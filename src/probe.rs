//! Probe engine: attempt a transport-level connection from an exact source
//! address to a destination:port within a timeout, stateless and safe to
//! call concurrently. Generalizes the teacher's `FeelerManager::test_address`
//! (which always fed from a single hard-coded slot in `AddrMan`) into a
//! bare `(SA, DA, port, timeout) -> Outcome` primitive any worker can drive.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpSocket;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success { latency_ms: u64 },
    Failure { reason: String },
}

/// Open a transport-level connection from `sa` to `(da, port)`, timing from
/// immediately-before-initiate to connected, then tear it down. A failure
/// to bind, a refused connection, a timeout, or an unreachable signal all
/// map to `Failure`.
pub async fn probe(sa: IpAddr, da: IpAddr, port: u16, probe_timeout: Duration) -> ProbeOutcome {
    let bind_addr = SocketAddr::new(sa, 0);
    let target = SocketAddr::new(da, port);

    let socket = match bind_addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    };
    let socket = match socket {
        Ok(s) => s,
        Err(e) => return ProbeOutcome::Failure { reason: format!("socket create: {e}") },
    };
    if let Err(e) = socket.bind(bind_addr) {
        return ProbeOutcome::Failure { reason: format!("bind {sa}: {e}") };
    }

    let start = Instant::now();
    match timeout(probe_timeout, socket.connect(target)).await {
        Ok(Ok(stream)) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            drop(stream);
            ProbeOutcome::Success { latency_ms }
        }
        Ok(Err(e)) => ProbeOutcome::Failure { reason: format!("connect: {e}") },
        Err(_) => ProbeOutcome::Failure { reason: "timed out".to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_succeeds_against_loopback_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let outcome = probe(
            "127.0.0.1".parse().unwrap(),
            "127.0.0.1".parse().unwrap(),
            port,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(outcome, ProbeOutcome::Success { .. }));
    }

    #[tokio::test]
    async fn probe_fails_against_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener); // closed immediately, connection should be refused

        let outcome = probe(
            "127.0.0.1".parse().unwrap(),
            "127.0.0.1".parse().unwrap(),
            port,
            Duration::from_millis(500),
        )
        .await;
        assert!(matches!(outcome, ProbeOutcome::Failure { .. }));
    }
}
