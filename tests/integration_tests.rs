//! Integration tests for the room server
//!
//! These tests drive the public room API end to end and exercise the real
//! UDP server loop.

use bincode::{deserialize, serialize};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::actor::DamageOutcome;
use server::catalog::Catalog;
use server::config::GameConfig;
use server::map::CollisionLayer;
use server::network::Server;
use server::room::Room;
use shared::{
    ActionRequest, ActorId, Direction, GameEvent, Packet, Position, StatKind, MAX_PACKET_SIZE,
    PROTOCOL_VERSION,
};
use std::sync::Arc;
use std::time::Duration;

const TEST_CATALOG: &str = r#"{
    "player": { "hp": 100, "mana": 100, "stamina": 100,
                "physical_damage": 12.0, "physical_defense": 2.0,
                "magical_damage": 2.0, "magical_defense": 1.0, "evasion": 0.0 },
    "races": [ { "id": "human" } ],
    "classes": [
        { "id": "fighter", "starting_items": [ { "item": "sword", "quantity": 1 } ] },
        { "id": "priest", "spells": ["revive", "bolt"] }
    ],
    "items": [
        { "id": "sword", "body_part": "weapon", "physical_damage": [2, 2] },
        { "id": "axe", "body_part": "weapon", "physical_damage": [4, 4] },
        { "id": "shield", "body_part": "shield" },
        { "id": "bow", "body_part": "weapon" },
        { "id": "gold" }
    ],
    "spells": [
        { "id": "revive", "type": "REVIVE", "mana_cost": 30 },
        { "id": "bolt", "type": "DAMAGE", "mana_cost": 10, "value": [1, 1] }
    ],
    "npcs": [
        { "id": "dummy", "hp": 40, "physical_damage": 3.0,
          "physical_defense": 5.0, "magical_defense": 50.0, "evasion": 0.0, "fov": 6 }
    ]
}"#;

fn test_config(map_size: usize) -> GameConfig {
    GameConfig {
        map_size,
        attack_stamina_cost: 20,
        ..GameConfig::default()
    }
}

fn test_room(map_size: usize) -> Room {
    let catalog = Catalog::from_json(TEST_CATALOG).unwrap();
    Room::new(test_config(map_size), Arc::new(catalog), 1234)
}

fn hp(room: &Room, id: ActorId) -> u32 {
    room.actor(id).unwrap().stat(StatKind::Hp)
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that action and event packets survive the wire encoding intact
    #[test]
    fn packet_serialization_preserves_content() {
        let action = Packet::Action {
            sequence: 42,
            action: ActionRequest::CastSpell {
                spell: "bolt".to_string(),
                position: Position::new(3, -1),
            },
        };
        match deserialize::<Packet>(&serialize(&action).unwrap()).unwrap() {
            Packet::Action {
                sequence: 42,
                action: ActionRequest::CastSpell { spell, position },
            } => {
                assert_eq!(spell, "bolt");
                assert_eq!(position, Position::new(3, -1));
            }
            other => panic!("Unexpected packet: {:?}", other),
        }

        let events = Packet::Events {
            tick: 7,
            events: vec![GameEvent::InventoryDropped {
                actor: 1,
                position: Position::new(2, 2),
                items: vec![("gold".to_string(), 5)],
            }],
        };
        match deserialize::<Packet>(&serialize(&events).unwrap()).unwrap() {
            Packet::Events { tick: 7, events } => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].subject(), Some(1));
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    /// Tests a full connect and act exchange against the running server
    #[tokio::test]
    async fn udp_connect_and_act() {
        let room = test_room(16);
        let mut server = Server::new("127.0.0.1:0", Duration::from_millis(10), room)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: "itest".to_string(),
            race: "human".to_string(),
            class: "fighter".to_string(),
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let mut actor_id = None;
        let mut saw_snapshot = false;
        let mut saw_speech = false;

        for _ in 0..50 {
            let received =
                tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await;
            let Ok(Ok((len, _))) = received else {
                break;
            };
            match deserialize::<Packet>(&buf[..len]).unwrap() {
                Packet::Connected { actor_id: id, .. } => {
                    actor_id = Some(id);
                    let speak = Packet::Action {
                        sequence: 1,
                        action: ActionRequest::Speak {
                            text: "hello".to_string(),
                        },
                    };
                    socket
                        .send_to(&serialize(&speak).unwrap(), server_addr)
                        .await
                        .unwrap();
                }
                Packet::Snapshot { actors, .. } => {
                    saw_snapshot = true;
                    assert!(actors.iter().any(|actor| Some(actor.id) == actor_id));
                }
                Packet::Events { events, .. } => {
                    if events.iter().any(|event| {
                        matches!(event, GameEvent::Spoke { text, .. } if text == "hello")
                    }) {
                        saw_speech = true;
                        break;
                    }
                }
                Packet::Disconnected { reason } => panic!("Refused: {}", reason),
                _ => {}
            }
        }

        assert!(actor_id.is_some());
        assert!(saw_snapshot);
        assert!(saw_speech);
    }

    /// Tests that garbage datagrams do not take the server down
    #[tokio::test]
    async fn malformed_packet_handling() {
        let room = test_room(8);
        let mut server = Server::new("127.0.0.1:0", Duration::from_millis(10), room)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for garbage in [&[][..], &[0xff; 3][..], &[1, 2, 3, 4, 5, 6, 7, 8, 9][..]] {
            socket.send_to(garbage, server_addr).await.unwrap();
        }

        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: "after".to_string(),
            race: "human".to_string(),
            class: "fighter".to_string(),
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            deserialize::<Packet>(&buf[..len]).unwrap(),
            Packet::Connected { .. }
        ));
    }
}

/// SCENARIO TESTS
mod scenario_tests {
    use super::*;

    /// Lethal damage zeroes HP, reports the death and clears a freeze
    #[test]
    fn lethal_damage_kills_and_unfreezes() {
        let mut room = test_room(8);
        let id = room
            .join_player_at("a", "human", "fighter", Position::new(1, 1))
            .unwrap();
        room.apply_damage(id, 50);
        assert_eq!(hp(&room, id), 50);
        room.freeze_actor(id, 5_000);
        room.drain_events();

        assert_eq!(room.apply_damage(id, 9_999), DamageOutcome::Killed);
        assert_eq!(hp(&room, id), 0);
        assert!(!room.actor(id).unwrap().is_frozen());
        let events = room.drain_events();
        assert!(events.contains(&GameEvent::Died { actor: id }));
        assert!(events.contains(&GameEvent::FrozenChanged {
            actor: id,
            frozen: false
        }));

        // The cancelled freeze must not fire later.
        room.advance(5_000);
        assert!(!room
            .drain_events()
            .iter()
            .any(|event| matches!(event, GameEvent::FrozenChanged { .. })));
    }

    /// A blow against a defender without evasion always lands
    #[test]
    fn blow_without_evasion_always_hits() {
        let mut room = test_room(8);
        let attacker = room
            .join_player_at("a", "human", "priest", Position::new(2, 2))
            .unwrap();
        let defender = room.spawn_npc_at("dummy", Position::new(2, 3)).unwrap();

        // Facing down by default, the dummy is straight ahead.
        assert!(room.attack(attacker));
        assert_eq!(hp(&room, defender), 40 - 7);
        assert_eq!(room.actor(attacker).unwrap().stat(StatKind::Stamina), 80);

        for _ in 0..4 {
            assert!(room.attack(attacker));
        }
        assert_eq!(hp(&room, defender), 40 - 5 * 7);
        assert!(!room.attack(attacker));
    }

    /// A third distinct item does not fit a two-slot inventory
    #[test]
    fn inventory_slot_limit() {
        let catalog = Catalog::from_json(TEST_CATALOG).unwrap();
        let config = GameConfig {
            inventory_size: 2,
            stack_ceiling: 100,
            ..test_config(8)
        };
        let mut room = Room::new(config, Arc::new(catalog), 1);
        let id = room
            .join_player_at("a", "human", "priest", Position::new(0, 0))
            .unwrap();

        assert_eq!(room.give_item(id, "sword", 10), 10);
        assert_eq!(room.give_item(id, "shield", 10), 10);
        assert_eq!(room.give_item(id, "bow", 10), 0);
        assert_eq!(room.actor(id).unwrap().inventory().quantity("bow"), 0);
    }

    /// REVIVE restores a dead target and is a no-op on a living one
    #[test]
    fn revive_spell() {
        let mut room = test_room(8);
        let priest = room
            .join_player_at("p", "human", "priest", Position::new(1, 1))
            .unwrap();
        let fallen = room
            .join_player_at("f", "human", "fighter", Position::new(4, 4))
            .unwrap();

        assert!(!room.cast_spell(priest, "revive", Position::new(4, 4)));
        assert_eq!(room.actor(priest).unwrap().stat(StatKind::Mana), 100);

        room.adjust_stat(fallen, StatKind::Stamina, -30);
        room.apply_damage(fallen, 1_000);
        room.drain_events();

        assert!(room.cast_spell(priest, "revive", Position::new(4, 4)));
        let actor = room.actor(fallen).unwrap();
        assert_eq!(actor.stat(StatKind::Hp), 100);
        assert_eq!(actor.stat(StatKind::Mana), 100);
        assert_eq!(actor.stat(StatKind::Stamina), 100);
        assert!(room.drain_events().contains(&GameEvent::Revived { actor: fallen }));
        assert_eq!(room.actor(priest).unwrap().stat(StatKind::Mana), 70);
    }

    /// Dropping onto a tile holding a different item is rejected
    #[test]
    fn drop_onto_mismatched_tile() {
        let mut room = test_room(8);
        let id = room
            .join_player_at("a", "human", "fighter", Position::new(3, 3))
            .unwrap();
        room.place_item(Position::new(3, 3), "gold", 4);
        room.drain_events();

        assert!(!room.drop_item(id, "sword", 1));
        assert_eq!(room.actor(id).unwrap().inventory().quantity("sword"), 1);
        let stack = room.grid().item_at(Position::new(3, 3)).unwrap();
        assert_eq!((stack.item.as_str(), stack.quantity), ("gold", 4));
        assert!(room.drain_events().is_empty());
    }

    /// Magic defense above raw spell damage clamps to a zero-damage hit
    #[test]
    fn overwhelmed_damage_spell_still_spends_mana() {
        let mut room = test_room(8);
        let priest = room
            .join_player_at("p", "human", "priest", Position::new(1, 1))
            .unwrap();
        let dummy = room.spawn_npc_at("dummy", Position::new(5, 5)).unwrap();

        assert!(room.cast_spell(priest, "bolt", Position::new(5, 5)));
        assert_eq!(hp(&room, dummy), 40);
        assert_eq!(room.actor(priest).unwrap().stat(StatKind::Mana), 90);
    }

    /// Equipping a second weapon swaps it for the first
    #[test]
    fn equipping_replaces_same_slot() {
        let mut room = test_room(8);
        let id = room
            .join_player_at("a", "human", "fighter", Position::new(1, 1))
            .unwrap();
        room.give_item(id, "axe", 1);
        assert!(room.use_item(id, "sword"));
        room.drain_events();

        assert!(room.use_item(id, "axe"));
        assert_eq!(
            room.drain_events(),
            vec![
                GameEvent::Unequipped {
                    actor: id,
                    item: "sword".to_string()
                },
                GameEvent::Equipped {
                    actor: id,
                    item: "axe".to_string()
                },
            ]
        );
    }
}

/// PROPERTY TESTS
mod property_tests {
    use super::*;

    /// Random stat changes never leave a pool outside `[0, max]`
    #[test]
    fn stat_bounds_hold() {
        let mut room = test_room(8);
        let id = room.join_player("a", "human", "fighter").unwrap();
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..2_000 {
            let stat = [StatKind::Hp, StatKind::Mana, StatKind::Stamina][rng.gen_range(0..3)];
            let delta = rng.gen_range(-250i64..=250);
            if rng.gen_bool(0.2) {
                room.apply_damage(id, delta);
            } else {
                room.adjust_stat(id, stat, delta);
            }
            if rng.gen_bool(0.05) {
                room.revive(id);
            }
            for value in room.actor(id).unwrap().stats().values() {
                assert!(value.current <= value.max);
            }
        }
    }

    /// Random walks never put two actors on one tile
    #[test]
    fn occupancy_is_unique() {
        let layer = CollisionLayer::from_rows(&[
            "........", ".##.....", "........", "....#...", "........", "..#.....", "........",
            "........",
        ])
        .unwrap();
        let catalog = Catalog::from_json(TEST_CATALOG).unwrap();
        let mut room = Room::with_collision(test_config(8), Arc::new(catalog), &layer, 5);
        let ids: Vec<ActorId> = (0..12)
            .map(|i| room.join_player(&format!("p{}", i), "human", "fighter").unwrap())
            .collect();
        let mut rng = StdRng::seed_from_u64(17);

        for _ in 0..1_000 {
            let id = ids[rng.gen_range(0..ids.len())];
            room.move_actor(id, Direction::ALL[rng.gen_range(0..4)]);
        }

        let mut seen = std::collections::HashSet::new();
        for id in &ids {
            let position = room.actor(*id).unwrap().position();
            assert!(seen.insert(position), "two actors at {:?}", position);
            assert_eq!(room.grid().occupant(position), Some(*id));
            assert!(!room.grid().collides(position));
        }
        assert_eq!(room.grid().actor_count(), ids.len());
    }

    /// Moving into a blocked tile twice is the same as once
    #[test]
    fn blocked_move_is_idempotent() {
        let mut room = test_room(4);
        let a = room
            .join_player_at("a", "human", "fighter", Position::new(1, 1))
            .unwrap();
        let b = room
            .join_player_at("b", "human", "fighter", Position::new(2, 1))
            .unwrap();

        // The first attempt only turns the actor.
        assert!(room.move_actor(a, Direction::Right));
        let after_once = room.actor(a).unwrap().snapshot();
        room.drain_events();

        assert!(!room.move_actor(a, Direction::Right));
        assert_eq!(room.actor(a).unwrap().snapshot(), after_once);
        assert!(room.drain_events().is_empty());
        assert_eq!(room.grid().occupant(Position::new(2, 1)), Some(b));
    }

    /// Grabbing a stack and dropping it again restores the tile
    #[test]
    fn grab_then_drop_conserves_stack() {
        let mut room = test_room(6);
        let id = room
            .join_player_at("a", "human", "priest", Position::new(2, 2))
            .unwrap();
        room.place_item(Position::new(2, 2), "gold", 37);

        assert!(room.grab_item(id));
        assert!(room.grid().item_at(Position::new(2, 2)).is_none());
        let held = room.actor(id).unwrap().inventory().quantity("gold");
        assert_eq!(held, 37);

        assert!(room.drop_item(id, "gold", held));
        let stack = room.grid().item_at(Position::new(2, 2)).unwrap();
        assert_eq!(stack.quantity, 37);
        assert_eq!(room.actor(id).unwrap().inventory().quantity("gold"), 0);
    }
}

/// STRESS TESTS
mod stress_tests {
    use super::*;

    /// A busy room with many NPCs hunting players keeps its invariants
    #[test]
    fn many_npcs_hunting() {
        let mut room = test_room(24);
        let players: Vec<ActorId> = (0..8)
            .map(|i| room.join_player(&format!("p{}", i), "human", "fighter").unwrap())
            .collect();
        for _ in 0..30 {
            room.spawn_npc("dummy").unwrap();
        }

        let interval = room.config().npc_tick_interval_ms;
        for step in 1..=200u64 {
            room.tick_npcs();
            room.advance(step * interval);
            room.drain_events();
        }

        let placed = room.actors().filter(|actor| actor.is_placed()).count();
        assert_eq!(room.grid().actor_count(), placed);
        for id in players {
            let actor = room.actor(id).unwrap();
            assert!(actor.stat(StatKind::Hp) <= actor.stats().get(StatKind::Hp).unwrap().max());
            assert_eq!(room.grid().occupant(actor.position()), Some(id));
        }
    }
}
