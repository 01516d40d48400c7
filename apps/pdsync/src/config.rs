//! Sync configuration: YAML file or a single sync assembled from flags.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use pdsync_core::models::{ChannelRef, GroupRef, ScheduleBinding, ScheduleRef, SyncUnit};
use pdsync_core::{ConfigError, StatusTemplate};

/// Name of the sync built from command-line flags.
pub const DEFAULT_SYNC_NAME: &str = "default";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default, alias = "slackSyncs")]
    pub syncs: Vec<SyncConfig>,
}

/// One synchronization between PagerDuty schedules and Slack.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub name: String,
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub pretend_users: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_groups: Vec<UserGroupConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UserGroupConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub handle: String,
}

impl UserGroupConfig {
    /// ID wins over name, name over handle.
    fn to_ref(&self) -> Option<GroupRef> {
        if !self.id.is_empty() {
            Some(GroupRef::Id(self.id.clone()))
        } else if !self.name.is_empty() {
            Some(GroupRef::Name(self.name.clone()))
        } else if !self.handle.is_empty() {
            Some(GroupRef::Handle(self.handle.clone()))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl ChannelConfig {
    fn is_given(&self) -> bool {
        !self.id.is_empty() || !self.name.is_empty()
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::invalid(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::invalid(format!("failed to parse config: {e}")))
    }

    /// A single sync named [`DEFAULT_SYNC_NAME`] from flag values.
    pub fn single(
        schedules: &[String],
        channel_id: Option<String>,
        channel_name: Option<String>,
        template: Option<String>,
    ) -> Result<Self, ConfigError> {
        let schedules = schedules
            .iter()
            .map(|s| parse_schedule(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            syncs: vec![SyncConfig {
                name: DEFAULT_SYNC_NAME.to_string(),
                schedules,
                channel: ChannelConfig {
                    id: channel_id.unwrap_or_default(),
                    name: channel_name.unwrap_or_default(),
                },
                template: template.unwrap_or_default(),
                dry_run: false,
                pretend_users: false,
            }],
        })
    }

    /// Global flags, when given, replace every per-sync value.
    pub fn apply_overrides(&mut self, dry_run: Option<bool>, pretend_users: Option<bool>) {
        for sync in &mut self.syncs {
            if let Some(dry_run) = dry_run {
                sync.dry_run = dry_run;
            }
            if let Some(pretend_users) = pretend_users {
                sync.pretend_users = pretend_users;
            }
        }
    }

    /// Check structural rules that do not need remote data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.syncs.is_empty() {
            return Err(ConfigError::invalid("no Slack syncs configured"));
        }

        let mut seen = HashSet::new();
        for sync in &self.syncs {
            if sync.name.is_empty() {
                return Err(ConfigError::invalid("slack sync name must not be empty"));
            }
            if !seen.insert(sync.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "slack sync name {:?} already used",
                    sync.name
                )));
            }
            if sync.schedules.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "slack sync {:?} invalid: must specify at least one schedule",
                    sync.name
                )));
            }

            for schedule in &sync.schedules {
                if schedule.id.is_empty() && schedule.name.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "slack sync {:?} invalid: must specify either schedule ID or schedule name",
                        sync.name
                    )));
                }
                if !schedule.id.is_empty() && !schedule.name.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "slack sync {:?} invalid: schedule ID {} and name {:?} cannot be specified simultaneously",
                        sync.name, schedule.id, schedule.name
                    )));
                }
                for group in &schedule.user_groups {
                    if group.to_ref().is_none() {
                        return Err(ConfigError::invalid(format!(
                            "slack sync {:?} invalid: user group must specify either ID, name or handle",
                            sync.name
                        )));
                    }
                }
            }

            if !sync.channel.id.is_empty() && !sync.channel.name.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "slack sync {:?} invalid: channel ID and channel name cannot be specified simultaneously",
                    sync.name
                )));
            }
            match (sync.template.is_empty(), sync.channel.is_given()) {
                (false, false) => {
                    return Err(ConfigError::invalid(format!(
                        "slack sync {:?} invalid: must specify either channel ID or channel name when template is given",
                        sync.name
                    )));
                }
                (true, true) => {
                    return Err(ConfigError::invalid(format!(
                        "slack sync {:?} invalid: must specify template when either channel ID or channel name is given",
                        sync.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate and convert into engine units.
    pub fn into_units(self) -> Result<Vec<SyncUnit>, ConfigError> {
        self.validate()?;
        self.syncs.into_iter().map(SyncConfig::into_unit).collect()
    }
}

impl SyncConfig {
    fn into_unit(self) -> Result<SyncUnit, ConfigError> {
        let schedules = self
            .schedules
            .into_iter()
            .map(|s| {
                let schedule = if s.id.is_empty() {
                    ScheduleRef::Name(s.name)
                } else {
                    ScheduleRef::Id(s.id)
                };
                ScheduleBinding {
                    schedule,
                    groups: s.user_groups.iter().filter_map(UserGroupConfig::to_ref).collect(),
                }
            })
            .collect();

        let channel = if !self.channel.id.is_empty() {
            Some(ChannelRef::Id(self.channel.id))
        } else if !self.channel.name.is_empty() {
            Some(ChannelRef::Name(self.channel.name))
        } else {
            None
        };

        let template = if self.template.is_empty() {
            None
        } else {
            Some(StatusTemplate::parse(&self.template)?)
        };

        Ok(SyncUnit {
            name: self.name,
            schedules,
            channel,
            template,
            dry_run: self.dry_run,
            pretend_users: self.pretend_users,
        })
    }
}

/// Parse a `--schedule` specifier.
///
/// Elements are separated by `;` and each is `key=value`. Exactly one of
/// `id` or `name` is required; `userGroup` may repeat and takes a nested
/// `id=`, `name=` or `handle=` value.
pub fn parse_schedule(spec: &str) -> Result<ScheduleConfig, ConfigError> {
    let mut kvs: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for elem in spec.split(';') {
        let (key, value) = elem.split_once('=').ok_or_else(|| {
            ConfigError::invalid(format!("missing separator on element {elem:?}"))
        })?;
        kvs.entry(key).or_default().push(value);
    }

    let mut single = |key: &str| -> Result<String, ConfigError> {
        match kvs.remove(key) {
            Some(values) if values.len() > 1 => Err(ConfigError::invalid(format!(
                "multiple values for key {key:?} not allowed"
            ))),
            Some(values) => Ok(values[0].to_string()),
            None => Ok(String::new()),
        }
    };
    let id = single("id")?;
    let name = single("name")?;

    if !id.is_empty() && !name.is_empty() {
        return Err(ConfigError::invalid(
            r#""id" and "name" cannot be specified simultaneously"#,
        ));
    }
    if id.is_empty() && name.is_empty() {
        return Err(ConfigError::invalid(r#"one of "id" or "name" must be given"#));
    }

    let mut user_groups = Vec::new();
    for group in kvs.remove("userGroup").unwrap_or_default() {
        let parts: Vec<&str> = group.split('=').collect();
        let [key, value] = parts.as_slice() else {
            return Err(ConfigError::invalid(format!(
                "user group {group} does not follow key=value pattern"
            )));
        };
        let mut ug = UserGroupConfig::default();
        match *key {
            "id" => ug.id = (*value).to_string(),
            "name" => ug.name = (*value).to_string(),
            "handle" => ug.handle = (*value).to_string(),
            other => {
                return Err(ConfigError::invalid(format!(
                    "user group {group} has unexpected key {other:?}"
                )));
            }
        }
        user_groups.push(ug);
    }

    if !kvs.is_empty() {
        return Err(ConfigError::invalid(format!(
            "unsupported key/value pairs left: {kvs:?}"
        )));
    }

    Ok(ScheduleConfig {
        id,
        name,
        user_groups,
    })
}
