//! Code-fetch staging: clone each participant's repository into its private volume

use crate::isolation::profile::{ContainmentPolicy, Role, StagingStep};
use crate::isolation::storage::{Mount, SHARED_DATA_PATH};
use crate::model::Participant;
use crate::task::ExecutionUnit;

/// Where the fetched tree lands inside the participant volume
pub const REPO_PATH: &str = "/shared-data/repo";

/// Quote `s` for a POSIX shell
#[must_use]
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Shallow clone with an audit trail, then hand the tree to `uid`
#[must_use]
pub fn fetch_script(repo_url: &str, uid: u32) -> String {
    let source = shell_quote(repo_url);
    format!(
        "set -eu;\n\
         echo '--- Cloning repository (verbose, progress) ---';\n\
         GIT_TERMINAL_PROMPT=0 git clone --single-branch --depth 1 --verbose --progress {source} {REPO_PATH};\n\
         cd {REPO_PATH};\n\
         echo '--- Last commit ---';\n\
         git --no-pager log -1 --decorate=short --pretty=fuller;\n\
         echo '--- Diffstat ---';\n\
         git --no-pager show --stat -1;\n\
         echo '--- changing permissions ---';\n\
         chown -R {uid}:{uid} {REPO_PATH} && chmod -R 770 {REPO_PATH};\n"
    )
}

/// Builds one fetch step per participant
#[derive(Debug, Clone)]
pub struct StagingPlanner {
    image: String,
}

impl StagingPlanner {
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Fetch step for `participant`, writing into its private `volume`
    #[must_use]
    pub fn fetch_unit(
        &self,
        participant: &Participant,
        volume: Mount,
        policy: &ContainmentPolicy,
    ) -> ExecutionUnit {
        debug_assert_eq!(volume.path, SHARED_DATA_PATH);
        ExecutionUnit::new(
            Role::Staging(StagingStep::Fetch),
            format!("clone-repo-{}", participant.id),
            &self.image,
            policy,
        )
        .command(["sh", "-c"])
        .arg(fetch_script(&participant.repo_url, policy.bot_uid()))
        .mount(volume)
    }
}
