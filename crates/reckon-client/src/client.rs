//! Session client.
//!
//! The `Client` drives one session over one stream: it numbers calls,
//! pairs each response with its request, and turns faults into errors.
//! [`Client::run`] walks the whole reference flow: log in, iterate, report
//! the summary, log out.

use std::time::Duration;

use reckon_core::{Credentials, Environment};
use reckon_proto::{
    BatchFetchResult, Call, Envelope, Fault, FetchResult, FetchStatus, Frame, Item, ItemKinds,
    Reply, Summary, SummaryBuilder, read_frame, write_frame,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{ClientConfig, error::ClientError};

/// What a completed session revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Items received, counted once per delivery.
    pub revealed: u64,
    /// Summary submitted to (and accepted by) the server.
    pub summary: Summary,
}

/// Client for one session.
///
/// # Type Parameters
///
/// - `S`: byte stream to the server
/// - `E`: Environment implementation for retry sleeps and timing
pub struct Client<S, E: Environment> {
    stream: S,
    env: E,
    next_call_id: u32,
    retry_delay: Duration,
}

impl<S, E> Client<S, E>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    /// Client speaking over `stream`.
    pub fn new(stream: S, env: E) -> Self {
        Self { stream, env, next_call_id: 1, retry_delay: Duration::from_millis(100) }
    }

    /// Override the sleep after a pending fetch.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Issue one call and wait for its reply. A fault reply becomes
    /// [`ClientError::Fault`].
    pub async fn call(&mut self, call: Call) -> Result<Reply, ClientError> {
        let call_id = self.next_call_id;
        self.next_call_id = self.next_call_id.wrapping_add(1);

        tracing::trace!(call_id, method = call.method_name(), "call");
        let request = Frame::request(call_id, &Envelope::routed(call))?;
        write_frame(&mut self.stream, &request).await?;

        let response = read_frame(&mut self.stream).await?.ok_or(ClientError::Closed)?;
        let actual = response.header.call_id();
        if actual != call_id {
            return Err(ClientError::CallIdMismatch { expected: call_id, actual });
        }

        match response.reply()? {
            Reply::Fault(fault) => Err(fault.into()),
            reply => Ok(reply),
        }
    }

    /// `Login.logIn`.
    pub async fn log_in(&mut self, username: &str, key: i32) -> Result<(), ClientError> {
        let reply = self.call(Call::LogIn { username: username.to_string(), key }).await?;
        expect_done("logIn", reply)
    }

    /// `Login.logIn`, retried once with the key the server reports if the
    /// first key is wrong.
    pub async fn log_in_with_retry(&mut self, credentials: &Credentials) -> Result<(), ClientError> {
        match self.log_in(&credentials.username, credentials.key).await {
            Err(ClientError::Fault(Fault::InvalidKey { submitted, expected })) => {
                tracing::info!(submitted, expected, "key rejected, retrying with expected key");
                self.log_in(&credentials.username, expected).await
            },
            other => other,
        }
    }

    /// `Login.logOut`.
    pub async fn log_out(&mut self) -> Result<(), ClientError> {
        let reply = self.call(Call::LogOut).await?;
        expect_done("logOut", reply)
    }

    /// `Search.init`.
    pub async fn init(&mut self, allowed: ItemKinds, limit: i32) -> Result<bool, ClientError> {
        match self.call(Call::Init { allowed_types: allowed.names(), limit }).await? {
            Reply::Flag(accepted) => Ok(accepted),
            other => Err(unexpected("init", &other)),
        }
    }

    /// `Search.fetch`.
    pub async fn fetch(&mut self) -> Result<FetchResult, ClientError> {
        match self.call(Call::Fetch).await? {
            Reply::Fetched(result) => Ok(result),
            other => Err(unexpected("fetch", &other)),
        }
    }

    /// `Search.fetchBatch`.
    pub async fn fetch_batch(&mut self, count: i32) -> Result<BatchFetchResult, ClientError> {
        match self.call(Call::FetchBatch { count }).await? {
            Reply::FetchedBatch(result) => Ok(result),
            other => Err(unexpected("fetchBatch", &other)),
        }
    }

    /// `Reports.saveSummary`.
    pub async fn save_summary(&mut self, summary: &Summary) -> Result<bool, ClientError> {
        match self.call(Call::SaveSummary { summary: summary.clone() }).await? {
            Reply::Flag(accepted) => Ok(accepted),
            other => Err(unexpected("saveSummary", &other)),
        }
    }

    /// Fetch single items until the server reports the end, folding each
    /// into `summary`.
    pub async fn fetch_all(&mut self, summary: &mut SummaryBuilder) -> Result<(), ClientError> {
        loop {
            let result = self.fetch().await?;
            match (result.status, result.item) {
                (FetchStatus::Pending, _) => self.env.sleep(self.retry_delay).await,
                (FetchStatus::Item, Some(item)) => summary.add(&Item::A(item)),
                (FetchStatus::Ended, _) => return Ok(()),
                (FetchStatus::Item, None) => {
                    return Err(ClientError::UnexpectedReply {
                        method: "fetch",
                        reply: "ITEM without an item".to_string(),
                    });
                },
            }
        }
    }

    /// Fetch batches of `count` until the server reports the end, folding
    /// each item into `summary`.
    pub async fn fetch_all_batched(
        &mut self,
        count: i32,
        summary: &mut SummaryBuilder,
    ) -> Result<(), ClientError> {
        loop {
            let result = self.fetch_batch(count).await?;
            match (result.status, result.items) {
                (FetchStatus::Pending, _) => self.env.sleep(self.retry_delay).await,
                (FetchStatus::Item, Some(items)) => summary.extend(&items),
                (FetchStatus::Ended, _) => return Ok(()),
                (FetchStatus::Item, None) => {
                    return Err(ClientError::UnexpectedReply {
                        method: "fetchBatch",
                        reply: "ITEM without items".to_string(),
                    });
                },
            }
        }
    }

    /// Run a whole session.
    ///
    /// Only kind A allowed: single fetches with the server's default
    /// configuration. Anything else: `init` first, then batches. The session
    /// is logged out even when the summary is rejected.
    pub async fn run(&mut self, config: &ClientConfig) -> Result<SessionReport, ClientError> {
        let started = self.env.now();
        let credentials = config.credentials();
        self.log_in_with_retry(&credentials).await?;
        tracing::info!(username = %credentials.username, "logged in");

        let mut builder = SummaryBuilder::new();
        if config.allowed_types == ItemKinds::A {
            self.fetch_all(&mut builder).await?;
        } else {
            if !self.init(config.allowed_types, config.search_limit).await? {
                return Err(ClientError::InitDeclined);
            }
            self.fetch_all_batched(config.batch_size, &mut builder).await?;
        }

        let summary = builder.snapshot();
        let accepted = self.save_summary(&summary).await?;
        tracing::info!(revealed = builder.folded(), kinds = summary.len(), accepted, "summary sent");

        self.log_out().await?;
        let elapsed = self.env.now().saturating_duration_since(started);
        tracing::info!(?elapsed, "logged out");

        if !accepted {
            return Err(ClientError::SummaryRejected);
        }
        Ok(SessionReport { revealed: builder.folded(), summary })
    }
}

fn expect_done(method: &'static str, reply: Reply) -> Result<(), ClientError> {
    match reply {
        Reply::Done => Ok(()),
        other => Err(unexpected(method, &other)),
    }
}

fn unexpected(method: &'static str, reply: &Reply) -> ClientError {
    ClientError::UnexpectedReply { method, reply: format!("{reply:?}") }
}

#[cfg(test)]
mod tests {
    use reckon_proto::{FrameKind, ItemA};
    use tokio::io::DuplexStream;

    use super::*;

    #[derive(Clone)]
    struct NoSleep;

    impl Environment for NoSleep {
        fn now(&self) -> std::time::Instant {
            std::time::Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0);
        }
    }

    // Scripted server: answers each request with the next reply in order
    async fn scripted_server(mut stream: DuplexStream, replies: Vec<Reply>) -> Vec<Envelope> {
        let mut seen = Vec::new();
        for reply in replies {
            let frame = read_frame(&mut stream).await.unwrap().unwrap();
            assert_eq!(frame.header.kind(), FrameKind::Request);
            seen.push(frame.envelope().unwrap());
            let response = Frame::response(frame.header.call_id(), &reply).unwrap();
            write_frame(&mut stream, &response).await.unwrap();
        }
        seen
    }

    #[tokio::test]
    async fn wrong_key_is_retried_with_expected_key() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let server = tokio::spawn(scripted_server(server_side, vec![
            Reply::Fault(Fault::InvalidKey { submitted: 1, expected: 4242 }),
            Reply::Done,
        ]));

        let mut client = Client::new(client_side, NoSleep);
        client.log_in_with_retry(&Credentials::new("alice", 1)).await.unwrap();

        let seen = server.await.unwrap();
        assert_eq!(seen[1].call, Call::LogIn { username: "alice".to_string(), key: 4242 });
    }

    #[tokio::test]
    async fn pending_is_retried_until_end() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let item = ItemA { field_x: "a".to_string(), field_y: vec![3], field_z: Some(4) };
        let server = tokio::spawn(scripted_server(server_side, vec![
            Reply::Fetched(FetchResult::pending()),
            Reply::Fetched(FetchResult::item(item.clone())),
            Reply::Fetched(FetchResult::pending()),
            Reply::Fetched(FetchResult::ended()),
        ]));

        let mut client = Client::new(client_side, NoSleep);
        let mut builder = SummaryBuilder::new();
        client.fetch_all(&mut builder).await.unwrap();

        assert_eq!(builder.folded(), 1);
        assert_eq!(server.await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn fault_surfaces_as_error() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let server = tokio::spawn(scripted_server(server_side, vec![Reply::Fault(
            Fault::protocol("fetch not allowed in state CREATED"),
        )]));

        let mut client = Client::new(client_side, NoSleep);
        let err = client.fetch().await.unwrap_err();
        assert!(err.is_fatal());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn mismatched_reply_shape_is_rejected() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let server = tokio::spawn(scripted_server(server_side, vec![Reply::Flag(true)]));

        let mut client = Client::new(client_side, NoSleep);
        let err = client.log_out().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedReply { method: "logOut", .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_stream_is_reported() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut stream = server_side;
            read_frame(&mut stream).await.unwrap();
        });

        let mut client = Client::new(client_side, NoSleep);
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, ClientError::Closed));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_summary_still_logs_out() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let server = tokio::spawn(scripted_server(server_side, vec![
            Reply::Done,
            Reply::Fetched(FetchResult::ended()),
            Reply::Flag(false),
            Reply::Done,
        ]));

        let mut client = Client::new(client_side, NoSleep);
        let config = ClientConfig { username: "bob".to_string(), ..ClientConfig::default() };
        let err = client.run(&config).await.unwrap_err();
        assert!(matches!(err, ClientError::SummaryRejected));

        let seen = server.await.unwrap();
        assert_eq!(seen[3].call, Call::LogOut);
    }
}
