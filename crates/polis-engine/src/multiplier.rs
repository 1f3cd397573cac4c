//! Multiplier aggregation: pushes every unlocked technology's and active
//! specialist's contributions into the next-tick snapshot.
//!
//! Pure accumulation — no feasibility checks, no failures. Buildings read
//! the result from *current* one tick later; that lag is inherent to the
//! double-buffered design.

use polis_content::ContentDb;

use crate::fixed::Fixed64;
use crate::snapshot::TickSnapshot;
use crate::state::GameState;

/// Apply tech and specialist contributions for this tick into `next`.
pub fn aggregate(content: &ContentDb, state: &GameState, next: &mut TickSnapshot) {
    for tech_id in &state.unlocked_tech {
        let tech = content.tech(*tech_id);
        for (kind, m) in &tech.building_multipliers {
            next.add_building_multiplier(*kind, tech.name.clone(), *m);
        }
        for (bonus, v) in &tech.global_bonuses {
            next.add_global_bonus(*bonus, tech.name.clone(), *v);
        }
    }

    // Owned specialists persist; previews contribute for display without
    // ever being written back to owned state.
    for (owned, levels) in [(true, &state.specialists), (false, &state.specialist_previews)] {
        for (id, level) in levels {
            if *level == 0 {
                continue;
            }
            let def = content.specialist(*id);
            let factor = Fixed64::from_num(*level);
            let source = if owned {
                def.name.clone()
            } else {
                format!("{} (preview)", def.name)
            };
            for (kind, m) in &def.building_multipliers {
                next.add_building_multiplier(*kind, source.clone(), m.scaled(factor));
            }
            for (bonus, v) in &def.global_bonuses {
                next.add_global_bonus(*bonus, source.clone(), *v * factor);
            }
        }
    }
}
