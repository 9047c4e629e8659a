use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::engine::graph::CommunicationGraph;
use crate::engine::registry::AgentRegistry;
use crate::error::{ConfigError, ProviderError, RunError, RunResult};
use crate::lifecycle::{LifecycleEvent, RunStateMachine};
use crate::providers::{GenerationContext, ResponseProvider};
use crate::storage::MessageLedger;
use crate::types::{
    Agent, AgentId, Link, Message, MessageDraft, MessageFilter, ProducedBy, Run, RunId,
    RunSnapshot, RunSpec, RunStatus, TickResult, USER_SENDER_ID,
};

/// Engine settings fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on a single provider call inside a tick.
    pub provider_timeout: Duration,
    /// Default request cap, used when the run spec sets none.
    pub max_requests: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            max_requests: None,
        }
    }
}

pub type RunHandle = Arc<Simulation>;

struct RunState {
    run: Run,
    registry: AgentRegistry,
    graph: CommunicationGraph,
    ledger: MessageLedger,
}

/// One agent's opportunity to respond in a round.
#[derive(Debug)]
struct Turn {
    responder: Agent,
    targets: Vec<Agent>,
    inbound: Vec<Message>,
}

/// A round that failed part way. Invocations already made still count
/// against the request cap.
#[derive(Debug)]
struct RoundAbort {
    dispatched: u64,
    error: RunError,
}

#[derive(Debug)]
struct RoundPlan {
    tick_index: u64,
    turns: Vec<Turn>,
}

impl RoundPlan {
    /// Collects last round's deliveries whose recipient can forward, ordered
    /// by recipient id and then by ledger order.
    fn build(state: &RunState) -> Self {
        let mut inbound_by_recipient: BTreeMap<AgentId, Vec<Message>> = BTreeMap::new();
        for message in state.ledger.at_tick(state.run.current_tick) {
            if state.graph.has_outgoing(&message.to_agent_id) {
                inbound_by_recipient
                    .entry(message.to_agent_id.clone())
                    .or_default()
                    .push(message.clone());
            }
        }

        let turns = inbound_by_recipient
            .into_iter()
            .filter_map(|(recipient_id, inbound)| {
                let responder = state.registry.get(&recipient_id)?.clone();
                let targets = state
                    .graph
                    .outgoing(&recipient_id)
                    .iter()
                    .filter_map(|target| state.registry.get(target).cloned())
                    .collect();
                Some(Turn {
                    responder,
                    targets,
                    inbound,
                })
            })
            .collect();

        Self {
            tick_index: state.run.current_tick + 1,
            turns,
        }
    }

    fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn invocation_count(&self) -> u64 {
        self.turns.iter().map(|t| t.targets.len() as u64).sum()
    }
}

/// A single run: the aggregate root owning roster, graph, ledger and lifecycle.
///
/// `start`, `tick`, `stop` and configured-state mutation are serialised by a
/// writer lock. Readers go through the state lock only and always observe a
/// fully committed round.
pub struct Simulation {
    id: RunId,
    state: RwLock<RunState>,
    writer: Mutex<()>,
    provider: Arc<dyn ResponseProvider>,
    config: EngineConfig,
}

impl Simulation {
    pub fn configure(
        spec: RunSpec,
        provider: Arc<dyn ResponseProvider>,
        config: EngineConfig,
    ) -> Result<RunHandle, ConfigError> {
        let registry = AgentRegistry::from_agents(spec.agents)?;
        let graph = CommunicationGraph::from_links(spec.links, &registry)?;
        if !registry.contains(&spec.first_agent_id) {
            return Err(ConfigError::UnknownFirstAgent(spec.first_agent_id));
        }

        let max_requests = spec.max_requests.or(config.max_requests);
        let run = Run::new(spec.first_agent_id, spec.initial_prompt, max_requests);
        let id = run.id;

        log::info!(
            "Configured run {} with {} agents and {} links ({} provider)",
            id,
            registry.len(),
            graph.edge_count(),
            provider.kind().as_str()
        );

        Ok(Arc::new(Self {
            id,
            state: RwLock::new(RunState {
                run,
                registry,
                graph,
                ledger: MessageLedger::new(),
            }),
            writer: Mutex::new(()),
            provider,
            config,
        }))
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider_kind(&self) -> ProducedBy {
        self.provider.kind()
    }

    pub async fn add_agent(&self, agent: Agent) -> RunResult<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write().await;
        Self::ensure_configured(&state.run, "add agent")?;

        state.registry.insert(agent)?;
        Ok(())
    }

    pub async fn add_link(&self, link: Link) -> RunResult<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write().await;
        Self::ensure_configured(&state.run, "add link")?;

        let RunState {
            registry, graph, ..
        } = &mut *state;
        graph.insert(link, registry)?;
        Ok(())
    }

    fn ensure_configured(run: &Run, operation: &'static str) -> RunResult<()> {
        if run.status != RunStatus::Configured {
            return Err(RunError::InvalidTransition {
                from: run.status,
                operation,
            });
        }
        Ok(())
    }

    /// Starts the run with the configured initial prompt.
    pub async fn start(&self) -> RunResult<()> {
        self.start_inner(None).await
    }

    /// Starts the run, replacing the configured initial prompt.
    pub async fn start_with_prompt(&self, initial_prompt: impl Into<String>) -> RunResult<()> {
        self.start_inner(Some(initial_prompt.into())).await
    }

    async fn start_inner(&self, initial_prompt: Option<String>) -> RunResult<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write().await;
        let next = RunStateMachine::next(state.run.status, LifecycleEvent::Start)?;

        if let Some(prompt) = initial_prompt {
            state.run.initial_prompt = prompt;
        }
        state.registry.freeze();
        state.graph.freeze();

        debug_assert!(state.ledger.is_empty());
        let first_agent_id = state.run.first_agent_id.clone();
        let seed = MessageDraft {
            from_agent_id: USER_SENDER_ID.to_string(),
            to_agent_id: first_agent_id.clone(),
            role_of_sender: None,
            model_label_of_sender: None,
            content: state.run.initial_prompt.clone(),
            produced_by: ProducedBy::Seed,
        };
        state.ledger.append(seed, 0);

        state.run.active_agent_id = Some(first_agent_id.clone());
        state.run.status = next;

        log::info!("Run {} started; first agent '{}'", self.id, first_agent_id);
        Ok(())
    }

    /// Advances the run by one full round.
    pub async fn tick(&self) -> RunResult<TickResult> {
        let _writer = self.writer.lock().await;

        let (plan, request_count, max_requests) = {
            let state = self.state.read().await;
            RunStateMachine::ensure(state.run.status, LifecycleEvent::TickAdvanced)?;
            (
                RoundPlan::build(&state),
                state.run.request_count,
                state.run.max_requests,
            )
        };

        if plan.is_empty() {
            let mut state = self.state.write().await;
            state.run.status =
                RunStateMachine::next(state.run.status, LifecycleEvent::TickExhausted)?;
            log::info!(
                "Run {} complete at tick {}: no legal deliveries remain",
                self.id,
                state.run.current_tick
            );
            return Ok(TickResult {
                new_messages: Vec::new(),
                current_tick: state.run.current_tick,
                status: state.run.status,
            });
        }

        let requested = plan.invocation_count();
        if let Some(limit) = max_requests {
            if request_count + requested > limit {
                log::warn!(
                    "Run {} refused tick {}: {} requests needed, {} of {} used",
                    self.id,
                    plan.tick_index,
                    requested,
                    request_count,
                    limit
                );
                return Err(RunError::RequestBudgetExceeded {
                    limit,
                    used: request_count,
                    requested,
                });
            }
        }

        let drafts = match self.generate_round(&plan).await {
            Ok(drafts) => drafts,
            Err(abort) => {
                let mut state = self.state.write().await;
                state.run.request_count += abort.dispatched;
                return Err(abort.error);
            }
        };

        let mut state = self.state.write().await;
        let status = RunStateMachine::next(state.run.status, LifecycleEvent::TickAdvanced)?;
        let tick_index = plan.tick_index;

        let mut last_sender = None;
        for draft in drafts {
            debug_assert!(state
                .graph
                .is_permitted(&draft.from_agent_id, &draft.to_agent_id));
            last_sender = Some(draft.from_agent_id.clone());
            state.ledger.append(draft, tick_index);
        }

        state.run.request_count += requested;
        state.run.current_tick = tick_index;
        if last_sender.is_some() {
            state.run.active_agent_id = last_sender;
        }
        state.run.status = status;

        let new_messages: Vec<Message> = state.ledger.at_tick(tick_index).cloned().collect();
        log::debug!(
            "Run {} tick {}: {} turns, {} requests, {} messages ({} in ledger)",
            self.id,
            tick_index,
            plan.turns.len(),
            requested,
            new_messages.len(),
            state.ledger.len()
        );

        Ok(TickResult {
            new_messages,
            current_tick: tick_index,
            status,
        })
    }

    /// Invokes the provider once per outgoing edge of every responder, one call
    /// at a time in plan order. The first failure ends the round; no further
    /// calls are made.
    async fn generate_round(&self, plan: &RoundPlan) -> Result<Vec<MessageDraft>, RoundAbort> {
        let mut drafts = Vec::new();
        let mut dispatched = 0;

        for turn in &plan.turns {
            for target in &turn.targets {
                dispatched += 1;
                match self.respond(turn, target, plan.tick_index).await {
                    Ok(Some(draft)) => drafts.push(draft),
                    Ok(None) => {}
                    Err(error) => return Err(RoundAbort { dispatched, error }),
                }
            }
        }

        Ok(drafts)
    }

    async fn respond(
        &self,
        turn: &Turn,
        target: &Agent,
        tick_index: u64,
    ) -> RunResult<Option<MessageDraft>> {
        let context = GenerationContext {
            tick_index,
            sender: turn.responder.clone(),
            recipient: target.clone(),
            inbound: turn.inbound.clone(),
        };

        let timeout = self.config.provider_timeout;
        let outcome = match tokio::time::timeout(timeout, self.provider.generate(&context)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        let content = outcome.map_err(|source| {
            log::warn!(
                "Agent '{}' failed to respond to '{}' at tick {}: {}",
                turn.responder.id,
                target.id,
                tick_index,
                source
            );
            RunError::Provider {
                agent_id: turn.responder.id.clone(),
                source,
            }
        })?;

        if content.is_blank() {
            log::debug!(
                "Agent '{}' produced no message for '{}'",
                turn.responder.id,
                target.id
            );
            return Ok(None);
        }

        Ok(Some(MessageDraft {
            from_agent_id: turn.responder.id.clone(),
            to_agent_id: target.id.clone(),
            role_of_sender: Some(turn.responder.role),
            model_label_of_sender: Some(turn.responder.model_label.clone()),
            content: content.text,
            produced_by: self.provider.kind(),
        }))
    }

    pub async fn stop(&self) -> RunResult<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write().await;
        state.run.status = RunStateMachine::next(state.run.status, LifecycleEvent::Stop)?;

        log::info!(
            "Run {} stopped at tick {} after {} requests",
            self.id,
            state.run.current_tick,
            state.run.request_count
        );
        Ok(())
    }

    /// Replaces the request cap. Raising it lets a budget-blocked run continue.
    pub async fn set_max_requests(&self, max_requests: Option<u64>) {
        let _writer = self.writer.lock().await;
        let mut state = self.state.write().await;
        state.run.max_requests = max_requests;
    }

    pub(crate) async fn set_autorun_enabled(&self, enabled: bool) {
        let mut state = self.state.write().await;
        state.run.autorun_enabled = enabled;
    }

    pub async fn get_status(&self) -> RunSnapshot {
        self.state.read().await.run.snapshot()
    }

    pub async fn list_messages(&self, filter: &MessageFilter) -> Vec<Message> {
        let state = self.state.read().await;
        state.ledger.list(filter).cloned().collect()
    }

    pub async fn agents(&self) -> Vec<Agent> {
        self.state.read().await.registry.agents().to_vec()
    }

    pub async fn links(&self) -> Vec<Link> {
        self.state.read().await.graph.links().to_vec()
    }

    pub async fn is_permitted(&self, from: &str, to: &str) -> bool {
        self.state.read().await.graph.is_permitted(from, to)
    }
}
