mod config;
mod db;
mod lookup;
mod rooms;
mod util;

use std::sync::Arc;

use dashmap::DashMap;

pub use config::*;
pub use db::*;
pub use lookup::*;
pub use rooms::*;
pub use util::*;

// Reduces verbosity
pub type Store<Id, T> = Arc<DashMap<Id, T>>;
pub type ArcedStore<Id, T> = Store<Id, Arc<T>>;

/// The lounge coordination system, owning the room registry and the
/// upstream metadata lookup.
pub struct Coordinator<Db> {
    pub rooms: RoomManager<Db>,
    pub lookup: MetadataClient,
}

/// A type passed to various components of the coordinator, to access state
/// and the durable store.
pub struct CoreContext<Db> {
    pub config: Config,
    pub database: Arc<Db>,

    /// Rooms that are materialized in memory, keyed by their code.
    pub rooms: ArcedStore<String, Room<Db>>,
}

impl<Db> Coordinator<Db>
where
    Db: Database,
{
    pub fn new(database: Db, config: Config) -> Self {
        let lookup = MetadataClient::new(&config);

        let context = CoreContext {
            config,
            database: Arc::new(database),

            rooms: Default::default(),
        };

        let room_manager = RoomManager::new(&context);

        Self {
            rooms: room_manager,
            lookup,
        }
    }
}

impl<Db> Clone for CoreContext<Db>
where
    Db: Database,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            database: self.database.clone(),
            rooms: self.rooms.clone(),
        }
    }
}
