//! Kubernetes object rendering for tasks and config artifacts

use crate::isolation::profile::{CapabilitySet, ContainmentProfile, SeccompProfile};
use crate::isolation::resources::ResourceBudget;
use crate::isolation::storage::{ConfigArtifact, Mount, StorageUnit};
use crate::platform::OwnerRef;
use crate::task::{ExecutionUnit, PullPolicy, Task};
use serde_json::{Map, Value, json};

/// ConfigMap holding the artifact's single entry
#[must_use]
pub fn config_map(artifact: &ConfigArtifact, namespace: &str) -> Value {
    let mut data = Map::new();
    data.insert(artifact.entry.clone(), Value::String(artifact.data.clone()));
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": artifact.name,
            "namespace": namespace,
        },
        "data": data,
    })
}

/// Merge patch setting the artifact's owner
#[must_use]
pub fn owner_patch(owner: &OwnerRef) -> Value {
    json!({ "metadata": { "ownerReferences": [owner] } })
}

/// batch/v1 Job running the whole match in one pod
#[must_use]
pub fn job(task: &Task, namespace: &str) -> Value {
    let lifetime = task.lifetime;
    json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": task.name,
            "namespace": namespace,
        },
        "spec": {
            "completions": lifetime.completions,
            "backoffLimit": lifetime.retries,
            "activeDeadlineSeconds": lifetime.deadline.as_secs(),
            "ttlSecondsAfterFinished": lifetime.retention.as_secs(),
            "template": {
                "spec": {
                    "volumes": task.storage.iter().map(volume).collect::<Vec<_>>(),
                    "initContainers": task.staging.iter().map(container).collect::<Vec<_>>(),
                    "containers": task.application_units().map(container).collect::<Vec<_>>(),
                    "restartPolicy": "Never",
                    "automountServiceAccountToken": task.service_credentials,
                    "enableServiceLinks": task.service_links,
                    "hostNetwork": false,
                    "hostPID": false,
                    "hostIPC": false,
                }
            }
        }
    })
}

fn volume(unit: &StorageUnit) -> Value {
    match unit {
        StorageUnit::Isolated { name, quota, .. } => json!({
            "name": name,
            "emptyDir": { "sizeLimit": quota.to_string() },
        }),
        StorageUnit::SharedConfig { name, artifact } => json!({
            "name": name,
            "configMap": { "name": artifact },
        }),
    }
}

fn container(unit: &ExecutionUnit) -> Value {
    let mut c = Map::new();
    c.insert("name".into(), json!(unit.name));
    c.insert("image".into(), json!(unit.image));
    if let Some(policy) = unit.pull_policy {
        let policy = match policy {
            PullPolicy::Always => "Always",
        };
        c.insert("imagePullPolicy".into(), json!(policy));
    }
    if !unit.command.is_empty() {
        c.insert("command".into(), json!(unit.command));
    }
    if !unit.args.is_empty() {
        c.insert("args".into(), json!(unit.args));
    }
    if !unit.env.is_empty() {
        let env: Vec<_> = unit
            .env
            .iter()
            .map(|e| json!({ "name": e.name, "value": e.value }))
            .collect();
        c.insert("env".into(), Value::Array(env));
    }
    if !unit.mounts.is_empty() {
        c.insert(
            "volumeMounts".into(),
            Value::Array(unit.mounts.iter().map(volume_mount).collect()),
        );
    }
    c.insert("securityContext".into(), security_context(&unit.profile));
    c.insert("resources".into(), resources(&unit.budget));
    Value::Object(c)
}

fn volume_mount(mount: &Mount) -> Value {
    let mut m = Map::new();
    m.insert("name".into(), json!(mount.volume));
    m.insert("mountPath".into(), json!(mount.path));
    if let Some(sub_path) = &mount.sub_path {
        m.insert("subPath".into(), json!(sub_path));
    }
    if mount.read_only {
        m.insert("readOnly".into(), json!(true));
    }
    Value::Object(m)
}

fn security_context(profile: &ContainmentProfile) -> Value {
    let mut sc = Map::new();
    if let Some(uid) = profile.run_as_user {
        sc.insert("runAsUser".into(), json!(uid));
    }
    if profile.run_as_non_root {
        sc.insert("runAsNonRoot".into(), json!(true));
    }
    sc.insert(
        "allowPrivilegeEscalation".into(),
        json!(profile.allow_privilege_escalation),
    );
    if profile.read_only_root_filesystem {
        sc.insert("readOnlyRootFilesystem".into(), json!(true));
    }
    let seccomp = match profile.seccomp {
        SeccompProfile::RuntimeDefault => "RuntimeDefault",
    };
    sc.insert("seccompProfile".into(), json!({ "type": seccomp }));
    sc.insert("capabilities".into(), capabilities(&profile.capabilities));
    Value::Object(sc)
}

/// `CAP_NET_ADMIN` → `NET_ADMIN`
fn capability_name(cap: caps::Capability) -> String {
    let name = cap.to_string();
    name.strip_prefix("CAP_").map_or_else(|| name.clone(), str::to_string)
}

fn capabilities(set: &CapabilitySet) -> Value {
    let mut c = Map::new();
    if set.drop_all {
        c.insert("drop".into(), json!(["ALL"]));
    }
    if !set.add.is_empty() {
        let add: Vec<_> = set.add.iter().copied().map(capability_name).collect();
        c.insert("add".into(), json!(add));
    }
    Value::Object(c)
}

fn resources(budget: &ResourceBudget) -> Value {
    json!({
        "requests": {
            "cpu": budget.request.cpu.to_string(),
            "memory": budget.request.memory.to_string(),
        },
        "limits": {
            "cpu": budget.limit.cpu.to_string(),
            "memory": budget.limit.memory.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchConfig;
    use crate::ident::{IdentifierAllocator, OsRandom};
    use crate::isolation::profile::ContainmentPolicy;
    use crate::model::{Match, Participant};
    use crate::task::TaskAssembler;
    use uuid::Uuid;

    fn rendered(bots: usize) -> (Match, Value) {
        let game = Match {
            id: Uuid::new_v4(),
            server_image: "server:1".into(),
            server_config: "cfg".into(),
            participants: (0..bots)
                .map(|_| Participant {
                    id: Uuid::new_v4(),
                    name: None,
                    repo_url: "https://example.com/bot.git".into(),
                    image: "bot:1".into(),
                })
                .collect(),
        };
        let config = LaunchConfig::default();
        let policy = ContainmentPolicy::from_config(&config).unwrap();
        let mapping = IdentifierAllocator::new(&OsRandom, 2)
            .unwrap()
            .allocate(&game.participants)
            .unwrap();
        let task = TaskAssembler::new(&config, &policy)
            .assemble(&game, &mapping, "https://upload")
            .unwrap();
        let job = job(&task, "matches");
        (game, job)
    }

    #[test]
    fn job_carries_lifetime_and_pod_isolation() {
        let (game, job) = rendered(1);
        assert_eq!(job["metadata"]["name"], format!("game-{}", game.id));
        assert_eq!(job["metadata"]["namespace"], "matches");
        let spec = &job["spec"];
        assert_eq!(spec["completions"], 1);
        assert_eq!(spec["backoffLimit"], 0);
        assert_eq!(spec["activeDeadlineSeconds"], 900);
        assert_eq!(spec["ttlSecondsAfterFinished"], 21_600);

        let pod = &spec["template"]["spec"];
        assert_eq!(pod["restartPolicy"], "Never");
        assert_eq!(pod["automountServiceAccountToken"], false);
        assert_eq!(pod["enableServiceLinks"], false);
        assert_eq!(pod["hostNetwork"], false);
    }

    #[test]
    fn bot_container_security_context() {
        let (_, job) = rendered(1);
        let bot = &job["spec"]["template"]["spec"]["containers"][1];
        let sc = &bot["securityContext"];
        assert_eq!(sc["runAsUser"], 2000);
        assert_eq!(sc["runAsNonRoot"], true);
        assert_eq!(sc["allowPrivilegeEscalation"], false);
        assert_eq!(sc["readOnlyRootFilesystem"], true);
        assert_eq!(sc["seccompProfile"]["type"], "RuntimeDefault");
        assert_eq!(sc["capabilities"]["drop"], json!(["ALL"]));
        assert_eq!(bot["imagePullPolicy"], "Always");
        assert_eq!(bot["resources"]["limits"]["cpu"], "1");
        assert_eq!(bot["resources"]["requests"]["memory"], "256Mi");
    }

    #[test]
    fn lockdown_is_last_init_container() {
        let (_, job) = rendered(2);
        let init = job["spec"]["template"]["spec"]["initContainers"].as_array().unwrap();
        assert_eq!(init.len(), 3);
        let last = init.last().unwrap();
        assert_eq!(last["name"], "net-guard");
        assert_eq!(last["securityContext"]["runAsUser"], 0);
        assert_eq!(last["securityContext"]["capabilities"]["add"], json!(["NET_ADMIN"]));
        assert!(last["securityContext"]["capabilities"].get("drop").is_none());
    }

    #[test]
    fn volumes_and_server_mount() {
        let (game, job) = rendered(1);
        let pod = &job["spec"]["template"]["spec"];
        let volumes = pod["volumes"].as_array().unwrap();
        assert_eq!(volumes[0]["configMap"]["name"], format!("game-config-{}", game.id));
        assert_eq!(volumes[1]["emptyDir"]["sizeLimit"], "250Mi");

        let server = &pod["containers"][0];
        let mount = &server["volumeMounts"][0];
        assert_eq!(mount["subPath"], "server.game.config");
        assert_eq!(mount["readOnly"], true);
        assert!(server["securityContext"].get("runAsUser").is_none());
    }

    #[test]
    fn config_map_and_owner_patch() {
        let artifact = ConfigArtifact {
            name: "game-config-x".into(),
            entry: "server.game.config".into(),
            data: "rounds=3".into(),
        };
        let cm = config_map(&artifact, "matches");
        assert_eq!(cm["data"]["server.game.config"], "rounds=3");

        let owner = OwnerRef {
            api_version: "batch/v1".into(),
            kind: "Job".into(),
            name: "game-x".into(),
            uid: "1234".into(),
        };
        let patch = owner_patch(&owner);
        assert_eq!(patch["metadata"]["ownerReferences"][0]["apiVersion"], "batch/v1");
        assert_eq!(patch["metadata"]["ownerReferences"][0]["uid"], "1234");
    }
}
