//! Token-validation benchmark workload

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::protocol::{Protocol, Step};
use crate::random::RandomSource;
use stampede_http::{QueueApi, QueueCredentials};
use tracing::{debug, info, warn};

/// Tokens issued during setup, validated at random by each work item
#[derive(Debug, Clone, Default)]
pub struct TokenPool {
    entries: Vec<QueueCredentials>,
}

impl TokenPool {
    pub fn new(entries: Vec<QueueCredentials>) -> Self {
        Self { entries }
    }

    /// Enter users `1..=size` one after another and keep every issued token
    ///
    /// Setup traffic is not instrumented. Entries that fail or come back
    /// without a token are skipped; an empty pool is fatal.
    pub async fn create(queue: &dyn QueueApi, concert_id: &str, size: u32) -> EngineResult<Self> {
        info!(size, "creating validation token pool");
        let mut entries = Vec::with_capacity(size as usize);

        for user in 1..=size {
            let user_id = user.to_string();
            match queue.enter(concert_id, &user_id).await {
                Ok(data) => match data.token {
                    Some(token) => entries.push(QueueCredentials { user_id, token }),
                    None => debug!(user_id = %user_id, "entry issued no token"),
                },
                Err(e) => debug!(user_id = %user_id, error = %e, "token pool entry failed"),
            }

            if user % 100 == 0 {
                info!(created = entries.len(), attempted = user, "token pool progress");
            }
        }

        if entries.is_empty() {
            return Err(EngineError::TokenPoolEmpty { requested: size });
        }
        info!(tokens = entries.len(), requested = size, "token pool ready");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pick(&self, rng: &mut dyn RandomSource) -> Option<&QueueCredentials> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(rng.index(self.entries.len()))
    }
}

/// Validate one pooled token; valid and invalid verdicts both count as success
pub async fn validate_once(
    protocol: &Protocol,
    concert_id: &str,
    pool: &TokenPool,
    rng: &mut dyn RandomSource,
) -> bool {
    let Some(credentials) = pool.pick(rng) else {
        return false;
    };
    let timed = protocol
        .validate(concert_id, &credentials.user_id, &credentials.token)
        .await;
    let recorder = protocol.recorder();
    recorder.trend(metrics::VALIDATION_DURATION, timed.elapsed);

    match timed.result {
        Ok(_) => {
            recorder.rate(metrics::VALIDATION_SUCCESS_RATE, true);
            true
        }
        Err(e) => {
            warn!(
                client_id = %credentials.user_id,
                step = Step::Validate.as_str(),
                status = ?e.status(),
                error = %e,
                "validation failed"
            );
            recorder.rate(metrics::VALIDATION_SUCCESS_RATE, false);
            recorder.count(metrics::VALIDATION_FAILURES);
            false
        }
    }
}
