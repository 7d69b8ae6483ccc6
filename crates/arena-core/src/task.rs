//! Task assembly: every unit, volume and staging step of one match

use crate::config::LaunchConfig;
use crate::error::{AllocationError, LaunchError};
use crate::ident::{IdentifierMapping, ensure_distinct};
use crate::isolation::network::NetworkLockdown;
use crate::isolation::profile::{ContainmentPolicy, ContainmentProfile, Role};
use crate::isolation::resources::ResourceBudget;
use crate::isolation::storage::{Mount, StorageTopology, StorageUnit};
use crate::model::Match;
use crate::staging::{REPO_PATH, StagingPlanner};
use crate::Result;
use std::time::Duration;
use uuid::Uuid;

pub const ENV_MATCH_ID: &str = "MATCH_ID";
pub const ENV_SEND_RESULTS: &str = "SEND_RESULTS";
pub const ENV_RESULTS_BUS: &str = "RABBITMQ_URL";
pub const ENV_UPLOAD_URL: &str = "S3_PRESIGNED_URL";
pub const ENV_UPLOAD_REPLAY: &str = "UPLOAD_REPLAY";
pub const ENV_ID_MAPPING: &str = "PARTICIPANT_ID_MAPPING";

/// Name of the server application unit
pub const SERVER_UNIT: &str = "game";

/// Directory the participant build runs in
pub const BOT_WORKDIR: &str = "my-core-bot";

/// Env var carrying a participant's display name to the server
#[must_use]
pub fn player_name_var(short_id: &str) -> String {
    format!("PLAYER_{short_id}_NAME")
}

/// Deterministic task name for a match
#[must_use]
pub fn task_name(match_id: Uuid) -> String {
    format!("game-{match_id}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPolicy {
    Always,
}

/// One process definition inside a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnit {
    pub name: String,
    pub image: String,
    pub role: Role,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub mounts: Vec<Mount>,
    /// `None` leaves the platform default
    pub pull_policy: Option<PullPolicy>,
    pub profile: ContainmentProfile,
    pub budget: ResourceBudget,
}

impl ExecutionUnit {
    /// A unit whose containment profile and budget come from `policy` for `role`
    pub fn new(
        role: Role,
        name: impl Into<String>,
        image: impl Into<String>,
        policy: &ContainmentPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            role,
            command: Vec::new(),
            args: Vec::new(),
            env: Vec::new(),
            mounts: Vec::new(),
            pull_policy: None,
            profile: policy.profile(role),
            budget: policy.budget(role),
        }
    }

    #[must_use]
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, env: Vec<EnvVar>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    #[must_use]
    pub const fn pull_policy(mut self, policy: PullPolicy) -> Self {
        self.pull_policy = Some(policy);
        self
    }

    /// Value of an env var, if set
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }
}

/// Lifetime bounds enforced by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub completions: u32,
    /// Retries after a failure; always zero so results are never submitted twice
    pub retries: u32,
    pub deadline: Duration,
    pub retention: Duration,
}

impl Lifetime {
    #[must_use]
    pub const fn single_attempt(deadline: Duration, retention: Duration) -> Self {
        Self {
            completions: 1,
            retries: 0,
            deadline,
            retention,
        }
    }
}

/// One match, ready for submission
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub server: ExecutionUnit,
    pub participants: Vec<ExecutionUnit>,
    /// Strictly ordered: every fetch step, then the lockdown
    pub staging: Vec<ExecutionUnit>,
    pub storage: Vec<StorageUnit>,
    pub lifetime: Lifetime,
    /// Mount the platform service-account credentials into processes
    pub service_credentials: bool,
    /// Inject service-discovery environment into processes
    pub service_links: bool,
}

impl Task {
    /// Server first, then participants
    pub fn application_units(&self) -> impl Iterator<Item = &ExecutionUnit> {
        std::iter::once(&self.server).chain(self.participants.iter())
    }

    /// Staging units in execution order, then application units
    pub fn units(&self) -> impl Iterator<Item = &ExecutionUnit> {
        self.staging.iter().chain(self.application_units())
    }
}

/// Accumulates a task's parts as separate typed collections
#[derive(Debug)]
pub struct TaskBuilder {
    name: String,
    server: ExecutionUnit,
    lockdown: ExecutionUnit,
    lifetime: Lifetime,
    storage: Vec<StorageUnit>,
    fetch: Vec<ExecutionUnit>,
    participants: Vec<ExecutionUnit>,
}

impl TaskBuilder {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        server: ExecutionUnit,
        lockdown: ExecutionUnit,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            name: name.into(),
            server,
            lockdown,
            lifetime,
            storage: Vec::new(),
            fetch: Vec::new(),
            participants: Vec::new(),
        }
    }

    #[must_use]
    pub fn storage(mut self, units: impl IntoIterator<Item = StorageUnit>) -> Self {
        self.storage.extend(units);
        self
    }

    /// Add a participant together with the fetch step that prepares it
    #[must_use]
    pub fn participant(mut self, fetch: ExecutionUnit, unit: ExecutionUnit) -> Self {
        self.fetch.push(fetch);
        self.participants.push(unit);
        self
    }

    /// Combine everything; the lockdown step always runs last
    #[must_use]
    pub fn build(self) -> Task {
        let mut staging = self.fetch;
        staging.push(self.lockdown);
        Task {
            name: self.name,
            server: self.server,
            participants: self.participants,
            staging,
            storage: self.storage,
            lifetime: self.lifetime,
            service_credentials: false,
            service_links: false,
        }
    }
}

/// Composes the task for a match from its identifier mapping
#[derive(Debug)]
pub struct TaskAssembler<'a> {
    config: &'a LaunchConfig,
    policy: &'a ContainmentPolicy,
}

impl<'a> TaskAssembler<'a> {
    #[must_use]
    pub const fn new(config: &'a LaunchConfig, policy: &'a ContainmentPolicy) -> Self {
        Self { config, policy }
    }

    pub fn assemble(&self, game: &Match, mapping: &IdentifierMapping, upload_url: &str) -> Result<Task> {
        ensure_distinct(&game.participants)?;
        if mapping.len() != game.participants.len() {
            return Err(AllocationError::Mismatch {
                expected: game.participants.len(),
                actual: mapping.len(),
            }
            .into());
        }
        let mapping_json = mapping.to_json().map_err(LaunchError::Serialization)?;

        let topology = StorageTopology::plan(game, self.config.storage_quota);
        let planner = StagingPlanner::new(&self.config.fetch_image);
        let lockdown = NetworkLockdown::new(&self.config.lockdown_image);

        let mut env = vec![
            EnvVar::new(ENV_MATCH_ID, game.id.to_string()),
            EnvVar::new(ENV_SEND_RESULTS, "true"),
            EnvVar::new(ENV_RESULTS_BUS, self.config.results_publish_url()),
            EnvVar::new(ENV_UPLOAD_URL, upload_url),
            EnvVar::new(ENV_UPLOAD_REPLAY, "true"),
            EnvVar::new(ENV_ID_MAPPING, mapping_json),
        ];
        env.extend(game.participants.iter().zip(mapping.short_ids()).filter_map(
            |(participant, short_id)| {
                participant
                    .display_name()
                    .map(|name| EnvVar::new(player_name_var(short_id.as_str()), name))
            },
        ));

        let server = ExecutionUnit::new(Role::Server, SERVER_UNIT, &game.server_image, self.policy)
            .args(mapping.short_ids().map(ToString::to_string))
            .env(env)
            .mount(topology.server_mount());

        let mut builder = TaskBuilder::new(
            task_name(game.id),
            server,
            lockdown.unit(self.policy),
            Lifetime::single_attempt(self.config.deadline, self.config.retention),
        );

        for ((participant, short_id), volume) in game
            .participants
            .iter()
            .zip(mapping.short_ids())
            .zip(topology.participant_mounts())
        {
            let fetch = planner.fetch_unit(participant, volume.clone(), self.policy);
            let unit = ExecutionUnit::new(
                Role::Participant,
                format!("bot-{}", participant.id),
                &participant.image,
                self.policy,
            )
            .command(["sh", "-c"])
            .arg(format!("cd {REPO_PATH}/{BOT_WORKDIR} && make && ./bot {short_id}"))
            .mount(volume)
            .pull_policy(PullPolicy::Always);
            builder = builder.participant(fetch, unit);
        }

        Ok(builder.storage(topology.into_units()).build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{IdentifierAllocator, OsRandom};
    use crate::isolation::profile::StagingStep;
    use crate::model::Participant;

    fn game(names: &[Option<&str>]) -> Match {
        Match {
            id: Uuid::new_v4(),
            server_image: "server:1".into(),
            server_config: "rounds=3".into(),
            participants: names
                .iter()
                .map(|name| Participant {
                    id: Uuid::new_v4(),
                    name: name.map(str::to_string),
                    repo_url: "https://example.com/bot.git".into(),
                    image: "bot:1".into(),
                })
                .collect(),
        }
    }

    fn assemble(game: &Match) -> (Task, IdentifierMapping) {
        let config = LaunchConfig::default();
        let policy = ContainmentPolicy::from_config(&config).unwrap();
        let mapping = IdentifierAllocator::new(&OsRandom, config.id_width)
            .unwrap()
            .allocate(&game.participants)
            .unwrap();
        let task = TaskAssembler::new(&config, &policy)
            .assemble(game, &mapping, "https://upload/x")
            .unwrap();
        (task, mapping)
    }

    #[test]
    fn unit_counts_follow_participants() {
        for n in [0, 1, 4] {
            let game = game(&vec![None; n]);
            let (task, _) = assemble(&game);
            assert_eq!(task.participants.len(), n);
            assert_eq!(task.staging.len(), n + 1);
            assert_eq!(task.application_units().count(), n + 1);
            assert_eq!(task.storage.len(), n + 1);
        }
    }

    #[test]
    fn lockdown_runs_after_every_fetch() {
        let game = game(&[None, None, None]);
        let (task, _) = assemble(&game);
        let (last, fetches) = task.staging.split_last().unwrap();
        assert_eq!(last.role, Role::Staging(StagingStep::Lockdown));
        assert!(fetches.iter().all(|u| u.role == Role::Staging(StagingStep::Fetch)));
    }

    #[test]
    fn server_gets_ids_names_and_mapping() {
        let game = game(&[Some("Alice"), None]);
        let (task, mapping) = assemble(&game);

        let ids: Vec<String> = mapping.short_ids().map(ToString::to_string).collect();
        assert_eq!(task.server.args, ids);

        let alice = mapping.short_id(0).unwrap();
        assert_eq!(task.server.env_var(&player_name_var(alice.as_str())), Some("Alice"));
        assert_eq!(
            task.server.env.iter().filter(|e| e.name.starts_with("PLAYER_")).count(),
            1
        );

        let json = task.server.env_var(ENV_ID_MAPPING).unwrap();
        assert_eq!(IdentifierMapping::from_json(json).unwrap(), mapping);
        assert_eq!(task.server.env_var(ENV_MATCH_ID), Some(game.id.to_string().as_str()));
        assert_eq!(task.server.env_var(ENV_UPLOAD_URL), Some("https://upload/x"));
    }

    #[test]
    fn participants_run_their_own_short_id() {
        let game = game(&[None, None]);
        let (task, mapping) = assemble(&game);
        for (unit, short_id) in task.participants.iter().zip(mapping.short_ids()) {
            assert!(unit.args[0].ends_with(&format!("./bot {short_id}")));
            assert_eq!(unit.pull_policy, Some(PullPolicy::Always));
            assert_eq!(unit.mounts.len(), 1);
        }
    }

    #[test]
    fn config_mount_is_server_only() {
        let game = game(&[None, None]);
        let (task, _) = assemble(&game);
        let holders: Vec<_> = task
            .units()
            .filter(|u| u.mounts.iter().any(|m| m.volume == crate::isolation::storage::CONFIG_VOLUME))
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(holders, [SERVER_UNIT]);
    }

    #[test]
    fn lifetime_is_single_attempt_with_deadline_and_retention() {
        let (task, _) = assemble(&game(&[]));
        assert_eq!(task.name, task_name(task.server.env_var(ENV_MATCH_ID).unwrap().parse().unwrap()));
        assert_eq!(task.lifetime.completions, 1);
        assert_eq!(task.lifetime.retries, 0);
        assert_eq!(task.lifetime.deadline, Duration::from_secs(900));
        assert_eq!(task.lifetime.retention, Duration::from_secs(21_600));
        assert!(!task.service_credentials);
        assert!(!task.service_links);
    }

    #[test]
    fn empty_match_encodes_empty_mapping() {
        let (task, mapping) = assemble(&game(&[]));
        assert!(mapping.is_empty());
        assert_eq!(task.server.env_var(ENV_ID_MAPPING), Some("{}"));
        assert!(task.server.args.is_empty());
        assert_eq!(task.staging.len(), 1);
    }

    #[test]
    fn repeated_participant_is_rejected() {
        let config = LaunchConfig::default();
        let policy = ContainmentPolicy::from_config(&config).unwrap();
        let mut game = game(&[None]);
        game.participants.push(game.participants[0].clone());
        let mapping = IdentifierMapping::from_json(&format!(
            r#"{{"1":"{id}","2":"{id}"}}"#,
            id = game.participants[0].id
        ))
        .unwrap();

        let err = TaskAssembler::new(&config, &policy)
            .assemble(&game, &mapping, "u")
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Allocation(AllocationError::DuplicateParticipant(_))
        ));
    }

    #[test]
    fn mismatched_mapping_is_rejected() {
        let config = LaunchConfig::default();
        let policy = ContainmentPolicy::from_config(&config).unwrap();
        let err = TaskAssembler::new(&config, &policy)
            .assemble(&game(&[None]), &IdentifierMapping::default(), "u")
            .unwrap_err();
        assert!(matches!(err, LaunchError::Allocation(AllocationError::Mismatch { .. })));
    }
}
