//! Typed helpers for the racing preset.

use std::collections::BTreeMap;

use crate::client::error::ClientError;
use crate::client::facade::ConfigClient;
use crate::schema::presets::{AgentConfig, AgentRoster, AreaConfig, TrackConfig, AGENT_ROSTER_KEY};
use crate::schema::{ConfigKey, ConfigValue, Namespace, SchemaError};
use crate::store::{ConfigSnapshot, UpdateResult};

fn namespace(name: &str) -> Result<Namespace, ClientError> {
    Namespace::parse(name).map_err(conversion)
}

fn roster_key() -> Result<ConfigKey, ClientError> {
    ConfigKey::parse(AGENT_ROSTER_KEY).map_err(conversion)
}

fn conversion(err: SchemaError) -> ClientError {
    ClientError::Conversion(serde::ser::Error::custom(err.to_string()))
}

/// Decode the roster, let `edit` change it, and encode it back.
fn edit_roster(
    snapshot: &ConfigSnapshot,
    edit: impl FnOnce(&mut Vec<AgentConfig>) -> Result<(), ClientError>,
) -> Result<BTreeMap<ConfigKey, ConfigValue>, ClientError> {
    let mut roster: AgentRoster = snapshot.decode_into()?;
    edit(&mut roster.roster)?;
    let value = ConfigValue::from_serializable(&roster.roster)?;
    Ok(BTreeMap::from([(roster_key()?, value)]))
}

impl ConfigClient {
    pub async fn area(&self) -> Result<AreaConfig, ClientError> {
        self.get_as(&namespace("area")?).await
    }

    pub async fn apply_area(&self, area: &AreaConfig) -> Result<UpdateResult, ClientError> {
        self.set_as(&namespace("area")?, area, None).await
    }

    pub async fn track(&self) -> Result<TrackConfig, ClientError> {
        self.get_as(&namespace("track")?).await
    }

    pub async fn apply_track(&self, track: &TrackConfig) -> Result<UpdateResult, ClientError> {
        self.set_as(&namespace("track")?, track, None).await
    }

    /// Current roster in spawn order.
    pub async fn agents(&self) -> Result<Vec<AgentConfig>, ClientError> {
        let roster: AgentRoster = self.get_as(&namespace("agents")?).await?;
        Ok(roster.roster)
    }

    /// Add `agent`, replacing any agent with the same name.
    pub async fn spawn_agent(&self, agent: AgentConfig) -> Result<UpdateResult, ClientError> {
        self.update(&namespace("agents")?, |snapshot| {
            edit_roster(snapshot, |roster| {
                match roster.iter_mut().find(|existing| existing.name == agent.name) {
                    Some(existing) => *existing = agent.clone(),
                    None => roster.push(agent.clone()),
                }
                Ok(())
            })
        })
        .await
    }

    /// Replace the agent named `agent.name`.
    pub async fn apply_agent(&self, agent: AgentConfig) -> Result<UpdateResult, ClientError> {
        self.update(&namespace("agents")?, |snapshot| {
            edit_roster(snapshot, |roster| {
                let existing = roster
                    .iter_mut()
                    .find(|existing| existing.name == agent.name)
                    .ok_or_else(|| ClientError::AgentNotFound(agent.name.clone()))?;
                *existing = agent.clone();
                Ok(())
            })
        })
        .await
    }

    /// Remove the agent called `name`.
    ///
    /// Removing the last agent is rejected by the server with a range
    /// violation.
    pub async fn delete_agent(&self, name: &str) -> Result<UpdateResult, ClientError> {
        self.update(&namespace("agents")?, |snapshot| {
            edit_roster(snapshot, |roster| {
                let before = roster.len();
                roster.retain(|existing| existing.name != name);
                if roster.len() == before {
                    return Err(ClientError::AgentNotFound(name.to_string()));
                }
                Ok(())
            })
        })
        .await
    }
}
