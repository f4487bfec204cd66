use classifier::ClassifierService;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ClassifierService>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: ClassifierService, request_timeout: Duration) -> Self {
        Self {
            service: Arc::new(service),
            request_timeout,
        }
    }
}
