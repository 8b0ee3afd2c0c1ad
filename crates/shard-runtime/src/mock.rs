//! # Mock Shards & Testing Guide
//!
//! The `MockShard<B>` type hands out real [`ShardHandle<B>`](crate::ShardHandle)s whose mailbox
//! is drained by an in-memory responder instead of a backend. It lets you script replies and
//! count calls, so code that *uses* shards (facades, cursors, coordinators) can be tested
//! without spawning a real backend.
//!
//! ## When to use Mocks vs Real Shards
//!
//! | Feature | MockShard | Real Shard |
//! |---------|-----------|------------|
//! | **Speed** | Instant (in-memory) | Fast (but involves tokio spawn) |
//! | **Determinism** | 100% Deterministic | Subject to scheduler |
//! | **State** | No real state (scripted replies) | Real backend state |
//! | **Use Case** | Asserting what a caller sends | Testing the backend itself or the full system |
//! | **Error Injection** | Easy (`return_err`) | Hard (requires specific state) |
//!
//! ## Testing Strategies
//!
//! 1. **Scripted replies** with [`MockShard`]: queue expectations, run the caller, then
//!    inspect [`MockShard::requests`] and [`MockShard::calls`].
//! 2. **Step-by-step** with [`create_mock_handle`] + [`expect_execute`] / [`expect_batch`]:
//!    receive the raw request in the test body and answer it by hand.
//! 3. **Routing** with [`MockRegistry`]: every resolved name is recorded and answered by the
//!    same mock shard.
//!
//! ```rust
//! use shard_runtime::mock::MockShard;
//! use shard_runtime::ShardBackend;
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("echo failed")]
//! struct EchoError;
//!
//! #[async_trait]
//! impl ShardBackend for Echo {
//!     type Request = String;
//!     type Reply = String;
//!     type BatchOptions = ();
//!     type Error = EchoError;
//!     async fn execute(&mut self, request: String) -> Result<String, EchoError> { Ok(request) }
//!     async fn execute_batch(&mut self, requests: Vec<String>, _: ()) -> Result<Vec<String>, EchoError> {
//!         Ok(requests)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockShard::<Echo>::new("echo_0");
//!     mock.expect_execute().return_ok("pong".to_string());
//!
//!     let reply = mock.handle().execute("ping".to_string()).await.unwrap();
//!     assert_eq!(reply, "pong");
//!     assert_eq!(mock.requests(), vec!["ping".to_string()]);
//!     mock.verify();
//! }
//! ```

use crate::backend::ShardBackend;
use crate::client::ShardHandle;
use crate::error::ShardError;
use crate::message::{Response, ShardRequest};
use crate::registry::ShardRegistry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// Represents an expected request to the mock shard.
enum Expectation<B: ShardBackend> {
    Execute {
        response: Result<B::Reply, ShardError>,
    },
    Batch {
        response: Result<Vec<B::Reply>, ShardError>,
    },
}

/// Everything the mock has received, in arrival order.
struct Recorded<B: ShardBackend> {
    requests: Vec<B::Request>,
    batches: Vec<(Vec<B::Request>, B::BatchOptions)>,
}

type Shared<T> = Arc<Mutex<T>>;

/// A mock shard with expectation tracking for fluent testing.
pub struct MockShard<B: ShardBackend> {
    handle: ShardHandle<B>,
    expectations: Shared<VecDeque<Expectation<B>>>,
    recorded: Shared<Recorded<B>>,
    _task: tokio::task::JoinHandle<()>,
}

impl<B: ShardBackend> MockShard<B> {
    /// Creates a mock shard with no expectations. Must be called inside a Tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<ShardRequest<B>>(100);
        let expectations: Shared<VecDeque<Expectation<B>>> = Arc::new(Mutex::new(VecDeque::new()));
        let recorded = Arc::new(Mutex::new(Recorded {
            requests: Vec::new(),
            batches: Vec::new(),
        }));

        let task_expectations = expectations.clone();
        let task_recorded = recorded.clone();
        let task = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = task_expectations.lock().pop_front();

                match (request, expectation) {
                    (
                        ShardRequest::Execute {
                            request,
                            respond_to,
                        },
                        Some(Expectation::Execute { response }),
                    ) => {
                        task_recorded.lock().requests.push(request);
                        let _ = respond_to.send(response);
                    }
                    (
                        ShardRequest::Batch {
                            requests,
                            options,
                            respond_to,
                        },
                        Some(Expectation::Batch { response }),
                    ) => {
                        task_recorded.lock().batches.push((requests, options));
                        let _ = respond_to.send(response);
                    }
                    _ => {
                        panic!("Unexpected request or expectation mismatch");
                    }
                }
            }
        });

        Self {
            handle: ShardHandle::new(name, sender),
            expectations,
            recorded,
            _task: task,
        }
    }

    /// Returns a new handle to the mock.
    pub fn handle(&self) -> ShardHandle<B> {
        self.handle.clone()
    }

    /// Expects an `execute` call.
    pub fn expect_execute(&self) -> ExecuteExpectationBuilder<B> {
        ExecuteExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    /// Expects an `execute_batch` call.
    pub fn expect_batch(&self) -> BatchExpectationBuilder<B> {
        BatchExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    /// Number of calls (single and batch) answered so far.
    pub fn calls(&self) -> usize {
        let recorded = self.recorded.lock();
        recorded.requests.len() + recorded.batches.len()
    }

    /// Single requests received so far.
    pub fn requests(&self) -> Vec<B::Request>
    where
        B::Request: Clone,
    {
        self.recorded.lock().requests.clone()
    }

    /// Batches received so far, with their options.
    pub fn batches(&self) -> Vec<(Vec<B::Request>, B::BatchOptions)>
    where
        B::Request: Clone,
        B::BatchOptions: Clone,
    {
        self.recorded.lock().batches.clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().len();
        if remaining != 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

/// Builder for `execute` expectations.
pub struct ExecuteExpectationBuilder<B: ShardBackend> {
    expectations: Shared<VecDeque<Expectation<B>>>,
}

impl<B: ShardBackend> ExecuteExpectationBuilder<B> {
    /// Sets the expectation to return a successful reply.
    pub fn return_ok(self, reply: B::Reply) {
        self.expectations.lock().push_back(Expectation::Execute {
            response: Ok(reply),
        });
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: ShardError) {
        self.expectations.lock().push_back(Expectation::Execute {
            response: Err(error),
        });
    }
}

/// Builder for `execute_batch` expectations.
pub struct BatchExpectationBuilder<B: ShardBackend> {
    expectations: Shared<VecDeque<Expectation<B>>>,
}

impl<B: ShardBackend> BatchExpectationBuilder<B> {
    /// Sets the expectation to return successful replies.
    pub fn return_ok(self, replies: Vec<B::Reply>) {
        self.expectations.lock().push_back(Expectation::Batch {
            response: Ok(replies),
        });
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: ShardError) {
        self.expectations.lock().push_back(Expectation::Batch {
            response: Err(error),
        });
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// A registry that resolves every name to the same [`MockShard`] and records the names.
pub struct MockRegistry<B: ShardBackend> {
    sender: Option<mpsc::Sender<ShardRequest<B>>>,
    resolved: Mutex<Vec<String>>,
}

impl<B: ShardBackend> MockRegistry<B> {
    /// Resolves every name to `shard`.
    pub fn new(shard: &MockShard<B>) -> Self {
        Self {
            sender: Some(shard.handle.sender().clone()),
            resolved: Mutex::new(Vec::new()),
        }
    }

    /// A registry with no binding: every resolve fails with [`ShardError::Unavailable`].
    pub fn unbound() -> Self {
        Self {
            sender: None,
            resolved: Mutex::new(Vec::new()),
        }
    }

    /// Every name resolved so far, in order (repeats included).
    pub fn resolved_names(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }
}

impl<B: ShardBackend> ShardRegistry<B> for MockRegistry<B> {
    fn resolve(&self, name: &str) -> Result<ShardHandle<B>, ShardError> {
        self.resolved.lock().push(name.to_string());
        match &self.sender {
            Some(sender) => Ok(ShardHandle::new(name, sender.clone())),
            None => Err(ShardError::Unavailable(format!("no binding for {name}"))),
        }
    }
}

// =============================================================================
// STEP-BY-STEP HELPERS
// =============================================================================

/// Creates a handle and the receiver behind it, for answering requests by hand.
///
/// # Testing Strategy
/// The test owns the mailbox. Spawn the code under test, `recv` the request it sends with
/// [`expect_execute`] or [`expect_batch`], assert on it, then answer through the responder.
pub fn create_mock_handle<B: ShardBackend>(
    name: &str,
    buffer_size: usize,
) -> (ShardHandle<B>, mpsc::Receiver<ShardRequest<B>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (ShardHandle::new(name, sender), receiver)
}

/// Helper to verify that the next message is an Execute request
pub async fn expect_execute<B: ShardBackend>(
    receiver: &mut mpsc::Receiver<ShardRequest<B>>,
) -> Option<(B::Request, Response<B::Reply>)> {
    match receiver.recv().await {
        Some(ShardRequest::Execute {
            request,
            respond_to,
        }) => Some((request, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Batch request
pub async fn expect_batch<B: ShardBackend>(
    receiver: &mut mpsc::Receiver<ShardRequest<B>>,
) -> Option<(Vec<B::Request>, B::BatchOptions, Response<Vec<B::Reply>>)> {
    match receiver.recv().await {
        Some(ShardRequest::Batch {
            requests,
            options,
            respond_to,
        }) => Some((requests, options, respond_to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Counter {
        total: i64,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("Counter error")]
    struct CounterError;

    #[async_trait]
    impl ShardBackend for Counter {
        type Request = i64;
        type Reply = i64;
        type BatchOptions = ();
        type Error = CounterError;

        async fn execute(&mut self, request: i64) -> Result<i64, CounterError> {
            self.total += request;
            Ok(self.total)
        }

        async fn execute_batch(
            &mut self,
            requests: Vec<i64>,
            _options: (),
        ) -> Result<Vec<i64>, CounterError> {
            let mut out = Vec::new();
            for r in requests {
                out.push(self.execute(r).await?);
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn test_mock_handle() {
        let (handle, mut receiver) = create_mock_handle::<Counter>("counter_0", 10);

        let task = tokio::spawn(async move { handle.execute(5).await });

        let (request, responder) = expect_execute(&mut receiver)
            .await
            .expect("Expected Execute request");
        assert_eq!(request, 5);
        responder.send(Ok(42)).unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Ok(42)));
    }

    #[tokio::test]
    async fn test_mock_shard_with_expectations() {
        let mock = MockShard::<Counter>::new("counter_0");
        mock.expect_execute().return_ok(1);
        mock.expect_batch().return_ok(vec![2, 3]);
        mock.expect_execute().return_err(ShardError::ActorClosed);

        let handle = mock.handle();
        assert_eq!(handle.execute(1).await.unwrap(), 1);
        assert_eq!(handle.execute_batch(vec![1, 1], ()).await.unwrap(), vec![2, 3]);
        assert!(matches!(
            handle.execute(9).await,
            Err(ShardError::ActorClosed)
        ));

        assert_eq!(mock.calls(), 3);
        assert_eq!(mock.requests(), vec![1, 9]);
        assert_eq!(mock.batches(), vec![(vec![1, 1], ())]);
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_registry_records_names() {
        let mock = MockShard::<Counter>::new("counter");
        mock.expect_execute().return_ok(7);
        let registry = MockRegistry::new(&mock);

        let handle = registry.resolve("counter_1").unwrap();
        assert_eq!(handle.name(), "counter_1");
        assert_eq!(handle.execute(7).await.unwrap(), 7);

        registry.resolve("counter_1").unwrap();
        assert_eq!(registry.resolved_names(), vec!["counter_1", "counter_1"]);
    }

    #[test]
    fn test_unbound_registry_fails() {
        let registry = MockRegistry::<Counter>::unbound();
        assert!(matches!(
            registry.resolve("counter_0"),
            Err(ShardError::Unavailable(_))
        ));
    }
}
