mod common;

use arena_rl_agent::{AgentConfig, CombatAgent, TableManager, TableStore, World};
use arena_rl_core::QTable;

fn shared_config(name: &str, seed: u64) -> AgentConfig {
    let mut config = AgentConfig::named(name);
    config.learning.seed = Some(seed);
    config.table.table_name = Some("Shared".into());
    config
}

#[tokio::test]
async fn shared_agents_pool_their_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path());
    let mut manager = TableManager::new(store.clone(), "SharedQTable.json");
    let world = World::new(store.clone()).with_manager(manager.handle());

    let mut finals = Vec::new();
    for (name, seed) in [("Left", 10), ("Right", 11)] {
        let mut arena = common::arena(seed);
        let mut agent = CombatAgent::start(shared_config(name, seed), &world, &arena)
            .await
            .unwrap();
        assert!(agent.mode().is_shared());
        common::run(&mut agent, &mut arena, 40.0);
        finals.push(agent.shutdown(&arena).await.unwrap().unwrap());
    }

    // Nothing is written for shared agents until the manager persists
    assert!(!store.path_for("Left_QTable.json").exists());
    assert!(!store.path_for("SharedQTable.json").exists());

    assert_eq!(manager.tick(), 2);
    assert_eq!(manager.merges(), 2);
    for table in &finals {
        for (state, _) in table.iter() {
            assert!(manager.merged().contains(state));
        }
    }

    let merged = manager.shutdown().await.unwrap();
    let saved = store.load("SharedQTable.json").await.unwrap();
    assert_eq!(saved, Some(merged.clone()));

    let arena = common::arena(12);
    let world = World::new(store);
    let agent = CombatAgent::start(shared_config("Late", 12), &world, &arena)
        .await
        .unwrap();
    assert_eq!(agent.table(), Some(&merged));
}

#[tokio::test]
async fn shared_table_without_manager_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path());
    let world = World::new(store.clone());

    let mut arena = common::arena(20);
    let mut agent = CombatAgent::start(shared_config("Loner", 20), &world, &arena)
        .await
        .unwrap();
    common::run(&mut agent, &mut arena, 20.0);
    let table = agent.shutdown(&arena).await.unwrap();

    assert!(table.is_some_and(|t: QTable| !t.is_empty()));
    assert!(!store.path_for("SharedQTable.json").exists());
    assert!(!store.path_for("Loner_QTable.json").exists());
}
