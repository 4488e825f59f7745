use crate::{protocol, server::AppState};

pub fn collect_stats(state: &AppState) -> protocol::Stats {
    let uptime = state.start_time.elapsed().as_millis() as u64;

    let mut parties = 0;
    let mut playing_parties = 0;
    let mut participants = 0;
    let mut connected_participants = 0;

    for room in state.directory.rooms() {
        let stats = room.stats();
        if stats.participants == 0 {
            // Closed, waiting for the sweeper.
            continue;
        }
        parties += 1;
        participants += stats.participants;
        connected_participants += stats.connected;
        if stats.playing {
            playing_parties += 1;
        }
    }

    protocol::Stats {
        parties,
        playing_parties,
        participants,
        connected_participants,
        uptime,
    }
}
