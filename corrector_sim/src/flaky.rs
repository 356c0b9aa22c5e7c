use corrector_core::session::{BoxError, Connector, Session, SubscriptionSpec};

use crate::error::SimError;

/// Refuses the first `failures` connect attempts, then delegates to `inner`.
#[derive(Debug)]
pub struct FlakyConnector<C> {
    inner: C,
    failures: u32,
    attempts: u32,
}

impl<C: Connector> FlakyConnector<C> {
    pub fn new(inner: C, failures: u32) -> Self {
        Self {
            inner,
            failures,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Connector> Connector for FlakyConnector<C> {
    type Writer = C::Writer;

    fn connect(
        &mut self,
        url: &str,
        spec: &SubscriptionSpec,
    ) -> Result<Session<Self::Writer>, BoxError> {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts <= self.failures {
            return Err(Box::new(SimError::Refused(self.attempts)));
        }
        self.inner.connect(url, spec)
    }
}
