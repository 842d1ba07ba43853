use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::ServiceError;
use crate::services::Service;

/// A data processor workers wait on before doing any work.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Description of the data this processor serves.
    fn data(&self) -> String;

    /// Resolves once the processor can accept work. May resolve immediately.
    async fn ready(&self);
}

/// Holds the single active [`Processor`].
#[derive(Default)]
pub struct ProcessorController {
    active: RwLock<Option<Arc<dyn Processor>>>,
}

impl ProcessorController {
    /// Creates a controller with no processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the active processor. Only one processor can ever be set.
    pub fn set(&self, processor: Arc<dyn Processor>) -> Result<(), ServiceError> {
        let mut active = self.active.write();
        if active.is_some() {
            return Err(ServiceError::fail("only one processor can be set"));
        }
        tracing::info!(data = %processor.data(), "Processor set");
        *active = Some(processor);
        Ok(())
    }

    /// The active processor, if any.
    pub fn get(&self) -> Option<Arc<dyn Processor>> {
        self.active.read().clone()
    }

    /// Data description of the active processor.
    pub fn describe(&self) -> Option<String> {
        self.active.read().as_ref().map(|p| p.data())
    }
}

impl Service for ProcessorController {
    fn init(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Instant(&'static str);

    #[async_trait]
    impl Processor for Instant {
        fn data(&self) -> String {
            self.0.to_string()
        }

        async fn ready(&self) {}
    }

    #[tokio::test]
    async fn test_only_one_processor() {
        let ctl = ProcessorController::new();
        assert!(ctl.get().is_none());
        assert_eq!(ctl.describe(), None);

        ctl.set(Arc::new(Instant("foo"))).unwrap();
        let err = ctl.set(Arc::new(Instant("bar"))).unwrap_err();
        assert_eq!(err.as_label(), "service_failed");

        assert_eq!(ctl.describe().as_deref(), Some("foo"));
        ctl.get().unwrap().ready().await;
    }
}
