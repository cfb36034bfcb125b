use std::{convert::Infallible, sync::Arc};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use lounge_core::{Coordinator, Database};

pub struct ServerContext<Db> {
    pub coordinator: Arc<Coordinator<Db>>,
}

impl<Db> Clone for ServerContext<Db> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}

#[async_trait]
impl<Db> FromRequestParts<ServerContext<Db>> for ServerContext<Db>
where
    Db: Database,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServerContext<Db>,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}
