//! Console command system for administering creatures.

use realm_shared::DeathState;
use crate::movement::MovementGenerator;
use crate::world::GameWorld;

/// Result of executing a command
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command was successful
    pub success: bool,
    /// Message to display to the operator
    pub message: String,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Parse and execute a console command
/// Returns None if it's not a command (doesn't start with /)
pub fn parse_and_execute(content: &str, world: &mut GameWorld) -> Option<CommandResult> {
    let content = content.trim();
    if !content.starts_with('/') {
        return None;
    }

    // Parse command and arguments
    let parts: Vec<&str> = content[1..].split_whitespace().collect();
    if parts.is_empty() {
        return Some(CommandResult::error("Invalid command"));
    }

    let command = parts[0].to_lowercase();
    let args = &parts[1..];

    Some(match command.as_str() {
        "help" => cmd_help(),
        "wp" | "waypoint" => cmd_waypoint(args, world),
        "npc" => cmd_npc(args, world),
        _ => CommandResult::error(format!("Unknown command: /{}", command)),
    })
}

fn cmd_help() -> CommandResult {
    let mut help = String::from("Available commands:\n");
    help.push_str("  /help - Show this help message\n");
    help.push_str("  /wp info <guid> - Show waypoint state\n");
    help.push_str("  /wp next <guid> <node> - Set the next waypoint node\n");
    help.push_str("  /wp pause <guid> - Pause waypoint movement\n");
    help.push_str("  /wp resume <guid> - Resume waypoint movement\n");
    help.push_str("  /wp reset <guid> - Move to the last reached node\n");
    help.push_str("  /npc info <guid> - Show creature state\n");
    help.push_str("  /npc kill <guid> - Kill a creature\n");
    help.push_str("  /npc despawn <guid> - Remove a creature immediately\n");
    help.push_str("  /npc respawn <guid> - Respawn a creature on the next tick\n");
    help.push_str("  /npc fly <guid> <taxi_path> - Start a taxi flight\n");
    help.push_str("  /npc entry <guid> <entry> - Use another template until the next respawn\n");

    CommandResult::success(help)
}

fn parse_guid(args: &[&str], index: usize) -> Result<u64, CommandResult> {
    let Some(raw) = args.get(index) else {
        return Err(CommandResult::error("Missing creature guid"));
    };
    raw.parse::<u64>()
        .map_err(|_| CommandResult::error(format!("Invalid guid: {}", raw)))
}

fn parse_u32(args: &[&str], index: usize, what: &str) -> Result<u32, CommandResult> {
    let Some(raw) = args.get(index) else {
        return Err(CommandResult::error(format!("Missing {}", what)));
    };
    raw.parse::<u32>()
        .map_err(|_| CommandResult::error(format!("Invalid {}: {}", what, raw)))
}

// =============================================================================
// Waypoint Commands
// =============================================================================

fn cmd_waypoint(args: &[&str], world: &mut GameWorld) -> CommandResult {
    let Some(sub) = args.first() else {
        return CommandResult::error("Usage: /wp <info|next|pause|resume|reset> <guid>");
    };
    let guid = match parse_guid(args, 1) {
        Ok(guid) => guid,
        Err(e) => return e,
    };
    if world.get_creature(guid).is_none() {
        return CommandResult::error(format!("Creature {} not found", guid));
    }

    match sub.to_lowercase().as_str() {
        "info" => waypoint_info(guid, world),
        "next" => {
            let node = match parse_u32(args, 2, "node id") {
                Ok(node) => node,
                Err(e) => return e,
            };
            match world.with_creature(guid, |c, _| c.set_next_waypoint(node)) {
                Some(true) => CommandResult::success(format!("Creature {} heads to node {} next", guid, node)),
                _ => CommandResult::error(format!("Node {} is not on the path of creature {}", node, guid)),
            }
        }
        "pause" => {
            world.with_creature(guid, |c, _| c.pause_waypoints());
            CommandResult::success(format!("Waypoint movement of creature {} paused", guid))
        }
        "resume" => {
            world.with_creature(guid, |c, _| c.resume_waypoints());
            CommandResult::success(format!("Waypoint movement of creature {} resumed", guid))
        }
        "reset" => match world.with_creature(guid, |c, ctx| c.reset_to_path_position(ctx)) {
            Some(true) => CommandResult::success(format!("Creature {} moved to its reset position", guid)),
            _ => CommandResult::error(format!("Creature {} has no reset position", guid)),
        },
        other => CommandResult::error(format!("Unknown waypoint command: {}", other)),
    }
}

fn waypoint_info(guid: u64, world: &GameWorld) -> CommandResult {
    let Some(creature) = world.get_creature(guid) else {
        return CommandResult::error(format!("Creature {} not found", guid));
    };
    let Some(wp) = creature.motion().waypoint() else {
        return CommandResult::error(format!(
            "Creature {} is not on a waypoint path ({} movement)",
            guid,
            creature.motion().generator().name()
        ));
    };

    let node = |n: Option<u32>| n.map_or_else(|| "none".to_string(), |n| n.to_string());
    let state = if wp.is_paused(creature.unit.waypoint_paused) { "paused" } else { "moving" };

    CommandResult::success(format!(
        "Creature {}: {} path {} ({} nodes), current node {}, last reached {}, {} ({} ms left)",
        guid,
        wp.origin().name(),
        wp.path_id(),
        wp.node_count(),
        node(wp.current_node()),
        node(wp.last_reached_node()),
        state,
        wp.pause_remaining()
    ))
}

// =============================================================================
// Creature Commands
// =============================================================================

fn cmd_npc(args: &[&str], world: &mut GameWorld) -> CommandResult {
    let Some(sub) = args.first() else {
        return CommandResult::error("Usage: /npc <info|kill|despawn|respawn|fly|entry> <guid>");
    };
    let guid = match parse_guid(args, 1) {
        Ok(guid) => guid,
        Err(e) => return e,
    };
    let Some(creature) = world.get_creature(guid) else {
        return CommandResult::error(format!("Creature {} not found", guid));
    };
    let state = creature.death_state();

    match sub.to_lowercase().as_str() {
        "info" => npc_info(guid, world),
        "kill" => {
            if state != DeathState::Alive {
                return CommandResult::error(format!("Creature {} is already {}", guid, state.name()));
            }
            world.with_creature(guid, |c, ctx| c.kill(None, ctx));
            CommandResult::success(format!("Creature {} killed", guid))
        }
        "despawn" => {
            if state == DeathState::Dead {
                return CommandResult::error(format!("Creature {} is not in the world", guid));
            }
            world.with_creature(guid, |c, ctx| c.forced_despawn(ctx));
            CommandResult::success(format!("Creature {} despawned", guid))
        }
        "respawn" => {
            if state == DeathState::Alive {
                return CommandResult::error(format!("Creature {} is alive", guid));
            }
            world.with_creature(guid, |c, ctx| c.respawn_now(ctx));
            CommandResult::success(format!("Creature {} will respawn on the next tick", guid))
        }
        "fly" => {
            let path_id = match parse_u32(args, 2, "taxi path id") {
                Ok(path_id) => path_id,
                Err(e) => return e,
            };
            match world.with_creature(guid, |c, ctx| c.start_flight(path_id, ctx)) {
                Some(true) => CommandResult::success(format!("Creature {} takes taxi path {}", guid, path_id)),
                _ => CommandResult::error(format!("Creature {} cannot fly taxi path {}", guid, path_id)),
            }
        }
        "entry" => {
            let entry = match parse_u32(args, 2, "entry") {
                Ok(entry) => entry,
                Err(e) => return e,
            };
            let Some(template) = world.template(entry) else {
                return CommandResult::error(format!("No creature template {}", entry));
            };
            world.with_creature(guid, |c, _| c.update_entry(template));
            CommandResult::success(format!("Creature {} uses entry {} until it respawns", guid, entry))
        }
        other => CommandResult::error(format!("Unknown npc command: {}", other)),
    }
}

fn npc_info(guid: u64, world: &GameWorld) -> CommandResult {
    let Some(creature) = world.get_creature(guid) else {
        return CommandResult::error(format!("Creature {} not found", guid));
    };
    let unit = &creature.unit;
    let now = world.now_ms();

    let mut msg = format!(
        "Creature {} ({}, entry {}) level {}: {}\n",
        guid, creature.template().name, unit.entry, unit.level, unit.death_state.name()
    );
    msg.push_str(&format!("  Health: {}/{}  Mana: {}/{}\n", unit.health, unit.max_health, unit.mana, unit.max_mana));
    msg.push_str(&format!(
        "  Map {} at ({:.1}, {:.1}, {:.1}) facing {:.2}\n",
        unit.map_id, unit.position[0], unit.position[1], unit.position[2], unit.orientation
    ));

    match creature.motion().generator() {
        MovementGenerator::Flight(flight) => msg.push_str(&format!(
            "  Movement: flight, node {}/{}\n",
            flight.current_index(),
            flight.node_count()
        )),
        generator => msg.push_str(&format!("  Movement: {}\n", generator.name())),
    }

    match unit.death_state {
        DeathState::Corpse => msg.push_str(&format!(
            "  Corpse removed in {}s, loot: {} items\n",
            creature.corpse_decay_at().saturating_sub(now) / 1000,
            creature.loot().items().len()
        )),
        DeathState::Dead => msg.push_str(&format!(
            "  Respawn in {}s\n",
            creature.respawn_at().saturating_sub(now) / 1000
        )),
        _ => {}
    }

    if let Some(link) = creature.link() {
        msg.push_str(&format!("  Linked to {} (flags {:#x})\n", link.master_guid, link.flags));
    }

    CommandResult::success(msg)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use super::*;
    use crate::ai::NoScripts;
    use crate::config::WorldConfig;
    use crate::paths::PathStore;
    use crate::persistence::NoPersistence;
    use crate::world::{SpawnRegistry, TerrainMaps};

    fn world() -> GameWorld {
        let mut world = GameWorld::new(
            WorldConfig::default(),
            SpawnRegistry::with_defaults(),
            Arc::new(PathStore::with_defaults()),
            TerrainMaps::new(),
            Box::new(NoScripts),
            Box::new(NoPersistence),
            1_700_000_000_000,
        );
        world.spawn_all(&HashMap::new());
        world
    }

    fn run(world: &mut GameWorld, line: &str) -> CommandResult {
        parse_and_execute(line, world).unwrap()
    }

    #[test]
    fn test_not_a_command() {
        let mut world = world();
        assert!(parse_and_execute("hello", &mut world).is_none());
        assert!(!run(&mut world, "/").success);
        assert!(!run(&mut world, "/dance").success);
    }

    #[test]
    fn test_waypoint_commands() {
        let mut world = world();

        let info = run(&mut world, "/wp info 1");
        assert!(info.success);
        assert!(info.message.contains("guid path 0 (4 nodes)"));

        assert!(run(&mut world, "/wp next 1 3").success);
        assert!(!run(&mut world, "/wp next 1 99").success);
        assert!(!run(&mut world, "/wp next 1 x").success);
        assert!(run(&mut world, "/wp pause 1").success);
        assert!(run(&mut world, "/wp info 1").message.contains("paused"));
        assert!(run(&mut world, "/wp resume 1").success);

        // Wolf is idle
        assert!(!run(&mut world, "/wp info 4").success);
        assert!(!run(&mut world, "/wp info 404").success);
    }

    #[test]
    fn test_npc_lifecycle_commands() {
        let mut world = world();

        assert!(run(&mut world, "/npc kill 4").success);
        assert!(!run(&mut world, "/npc kill 4").success);
        assert!(run(&mut world, "/npc info 4").message.contains(": corpse"));

        assert!(run(&mut world, "/npc respawn 4").success);
        assert_eq!(world.get_creature(4).unwrap().death_state(), DeathState::Dead);
        world.update(50);
        assert!(world.get_creature(4).unwrap().is_alive());

        assert!(run(&mut world, "/npc despawn 4").success);
        assert!(!run(&mut world, "/npc despawn 4").success);
    }

    #[test]
    fn test_npc_entry_reverts_on_respawn() {
        let mut world = world();
        assert!(!run(&mut world, "/npc entry 4 999").success);
        assert!(run(&mut world, "/npc entry 4 1").success);
        assert_eq!(world.get_creature(4).unwrap().unit.entry, 1);

        run(&mut world, "/npc kill 4");
        run(&mut world, "/npc respawn 4");
        world.update(50);
        assert_eq!(world.get_creature(4).unwrap().unit.entry, 3);
    }

    #[test]
    fn test_npc_fly() {
        let mut world = world();
        assert!(run(&mut world, "/npc fly 5 1").success);
        assert!(run(&mut world, "/npc info 5").message.contains("flight, node"));
        assert!(!run(&mut world, "/npc fly 5 42").success);
    }
}
