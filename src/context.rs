use uuid::Uuid;

/// Identity and correlation data for one engine call.
///
/// Supplied explicitly by the caller on every operation; the engine keeps
/// no ambient or thread-local request state, so stateless replicas and
/// tests can run operations side by side.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Owning tenant. Every query issued on behalf of this context filters
    /// by it; an unscoped query is a defect, not an optimization.
    pub tenant_id: Uuid,
    /// Acting user, recorded on movements and reservations.
    pub actor_id: Uuid,
    /// Correlation id threaded through logs.
    pub request_id: String,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            tenant_id,
            actor_id,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Carries a correlation id minted by the surrounding transport layer.
    pub fn with_request_id(tenant_id: Uuid, actor_id: Uuid, request_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            actor_id,
            request_id: request_id.into(),
        }
    }
}
