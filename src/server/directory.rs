use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, info, warn};

use crate::{
    common::{
        PartyError,
        types::{Millis, PartyCode},
    },
    configs::PartyConfig,
    party::{ContentCatalog, Founding, PartySession, content::resolve_content},
    protocol::{CreateParty, PartyCreated, PartySettings, Profile},
    server::room::PartyRoom,
};

/// Process-wide code -> live party lookup. The only state shared across parties.
pub struct SessionDirectory {
    rooms: DashMap<PartyCode, Arc<PartyRoom>>,
    config: PartyConfig,
    catalog: Arc<dyn ContentCatalog>,
}

impl SessionDirectory {
    pub fn new(config: PartyConfig, catalog: Arc<dyn ContentCatalog>) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
            catalog,
        }
    }

    /// Opens a party under a freshly drawn code. The code is claimed with an atomic
    /// check-and-insert; a collision just draws again.
    pub fn create(&self, request: CreateParty, now: Millis) -> Result<PartyCreated, PartyError> {
        let (content_ref, content) = resolve_content(self.catalog.as_ref(), &request.content_ref)?;
        let creator_profile = request
            .creator_profile
            .unwrap_or_else(|| Profile::named(request.creator_id.to_string()));
        let creator = request.creator_id.clone();
        let founding = Founding {
            content_ref,
            content,
            creator_id: request.creator_id,
            creator_profile,
            settings: PartySettings {
                max_participants: request.max_participants,
                allow_guest_control: request.allow_guest_control,
            },
        };

        for _ in 0..self.config.code_attempts {
            let code = PartyCode::generate();
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => {
                    debug!("Party code {} taken, drawing again", code);
                    continue;
                }
                Entry::Vacant(slot) => {
                    let session = PartySession::new(code.clone(), founding, self.config.clone(), now)?;
                    let snapshot = session.snapshot(now);
                    slot.insert(Arc::new(PartyRoom::new(session)));
                    info!(
                        "Party {} created by {} for {}",
                        code, creator, snapshot.content_ref
                    );
                    return Ok(PartyCreated { code, snapshot });
                }
            }
        }

        warn!(
            "Gave up drawing a party code after {} attempts",
            self.config.code_attempts
        );
        Err(PartyError::CodesExhausted)
    }

    /// Looks up a live party. Malformed and closed codes are both `NotFound`.
    pub fn get(&self, raw_code: &str) -> Result<Arc<PartyRoom>, PartyError> {
        let code = PartyCode::parse(raw_code).ok_or(PartyError::NotFound)?;
        let room = self
            .rooms
            .get(&code)
            .map(|r| r.value().clone())
            .ok_or(PartyError::NotFound)?;
        if room.is_closed() {
            self.destroy(&code);
            return Err(PartyError::NotFound);
        }
        Ok(room)
    }

    pub fn destroy(&self, code: &PartyCode) -> bool {
        let removed = self.rooms.remove(code).is_some();
        if removed {
            info!("Party {} removed from directory", code);
        }
        removed
    }

    /// Drops `room` from the directory if its session has closed.
    pub fn release(&self, room: &PartyRoom) {
        if room.is_closed() {
            self.destroy(room.code());
        }
    }

    /// Runs housekeeping on every party and removes the ones that closed. Returns how
    /// many were removed.
    pub fn sweep(&self, now: Millis) -> usize {
        // Snapshot the handles first so no map shard is locked while a room is.
        let rooms = self.rooms();
        let mut removed = 0;
        for room in rooms {
            room.sweep(now);
            if room.is_closed() && self.destroy(room.code()) {
                removed += 1;
            }
        }
        removed
    }

    pub fn rooms(&self) -> Vec<Arc<PartyRoom>> {
        self.rooms.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
