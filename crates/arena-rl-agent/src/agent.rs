//! Agent lifecycle: table loading at start, persistence or submission at
//! teardown

use arena_rl_core::{ActionTicket, CombatEvent, CombatHost, Policy, QTable, Result};
use tracing::{info, warn};

use crate::config::{AgentConfig, PolicyVariant};
use crate::cycle::DecisionCycle;
use crate::manager::ManagerHandle;
use crate::remote::RemotePolicy;
use crate::store::{TableMode, TableStore};
use crate::tabular::TabularPolicy;

/// Context shared by every agent of one simulation: where tables live and,
/// for shared-table agents, the manager to submit to
#[derive(Debug, Clone)]
pub struct World {
    store: TableStore,
    manager: Option<ManagerHandle>,
}

impl World {
    /// World without a table manager
    #[must_use]
    pub fn new(store: TableStore) -> Self {
        Self {
            store,
            manager: None,
        }
    }

    /// Register the world's table manager
    #[must_use]
    pub fn with_manager(mut self, manager: ManagerHandle) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Table storage
    #[must_use]
    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// The table manager, if one was registered
    #[must_use]
    pub fn manager(&self) -> Option<&ManagerHandle> {
        self.manager.as_ref()
    }
}

/// One learning combat agent
#[derive(Debug)]
pub struct CombatAgent {
    name: String,
    mode: TableMode,
    cycle: DecisionCycle,
    world: World,
}

impl CombatAgent {
    /// Build the policy for `config`, load its table or open its
    /// connection, and take the first observation from `host`
    pub async fn start(config: AgentConfig, world: &World, host: &dyn CombatHost) -> Result<Self> {
        config.validate()?;
        let mode = TableMode::from_table_name(&config.table_name());

        let policy: Box<dyn Policy> = match config.policy {
            PolicyVariant::Tabular => {
                let file_name = match &mode {
                    TableMode::Private { file_name } => file_name.clone(),
                    TableMode::Shared => world.manager().map_or_else(
                        || config.table.shared_filename.clone(),
                        |m| m.shared_filename().to_string(),
                    ),
                };
                let table = world.store().load_or_empty(&file_name).await;
                Box::new(TabularPolicy::with_table(table, config.learning))
            }
            PolicyVariant::Remote => Box::new(RemotePolicy::connect(&config.remote).await),
        };

        let mut cycle = DecisionCycle::new(&config, policy);
        cycle.begin(host);
        info!(
            agent = %config.name,
            policy = cycle.policy().name(),
            shared = mode.is_shared(),
            interval = cycle.interval(),
            "agent started"
        );

        Ok(Self {
            name: config.name,
            mode,
            cycle,
            world: world.clone(),
        })
    }

    /// Agent name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Persistence mode of the agent's table
    #[must_use]
    pub fn mode(&self) -> &TableMode {
        &self.mode
    }

    /// The agent's decision cycle
    #[must_use]
    pub fn cycle(&self) -> &DecisionCycle {
        &self.cycle
    }

    /// The agent's table, for tabular agents
    #[must_use]
    pub fn table(&self) -> Option<&QTable> {
        self.cycle.policy().table()
    }

    /// Advance the agent by `dt` seconds
    pub fn tick(&mut self, dt: f32, host: &mut dyn CombatHost) {
        self.cycle.tick(dt, host);
    }

    /// Forward a host completion signal
    pub fn complete_action(&mut self, ticket: ActionTicket, host: &dyn CombatHost) -> bool {
        self.cycle.complete_action(ticket, host)
    }

    /// Forward a combat outcome
    pub fn record(&mut self, event: CombatEvent) {
        self.cycle.record(event);
    }

    /// Forward the agent's death
    pub fn on_death(&mut self, host: &dyn CombatHost) {
        self.cycle.on_death(host);
    }

    /// Tear the agent down. Private tables are saved, shared tables are
    /// submitted to the world's manager, connections are closed. Returns
    /// the final table of tabular agents.
    pub async fn shutdown(mut self, host: &dyn CombatHost) -> Result<Option<QTable>> {
        self.cycle.shutdown(host);
        self.cycle.policy_mut().close().await?;

        let Some(table) = self.cycle.policy().table().cloned() else {
            info!(agent = %self.name, "agent stopped");
            return Ok(None);
        };

        match &self.mode {
            TableMode::Private { file_name } => {
                self.world.store().save(file_name, &table).await?;
            }
            TableMode::Shared => match self.world.manager() {
                Some(manager) => manager.submit(self.name.clone(), table.clone())?,
                None => warn!(agent = %self.name, "no table manager registered, shared table dropped"),
            },
        }
        info!(agent = %self.name, states = table.len(), "agent stopped");
        Ok(Some(table))
    }
}
