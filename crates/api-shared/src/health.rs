use crate::dto::HealthRes;

/// Health check shared by the REST binary and any future transport.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Reports the service as alive.
    ///
    /// There is no dependency to check: the record store lives in-process, so
    /// a process that can answer is a process that can serve.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "checkpost is alive".into(),
        }
    }
}
