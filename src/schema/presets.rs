//! Built-in schema for the racing environment.
//!
//! Three namespaces mirror the simulator's stock configuration:
//! - `area`: episode-wide rules
//! - `track`: which track is loaded and how it is driven
//! - `agents`: the roster of racing agents

use serde::{Deserialize, Serialize};

use crate::schema::definition::Schema;
use crate::schema::error::SchemaError;
use crate::schema::value::{ConfigValue, ValueType};

pub const DEFAULT_AGENT_NAME: &str = "agent0";
pub const DEFAULT_SHELL: &str = "deepracer_black";
pub const DEFAULT_TRACK: &str = "spain";

/// Key holding the agent roster.
pub const AGENT_ROSTER_KEY: &str = "agents.roster";

/// When an episode ends for multi-agent races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverCondition {
    /// First agent to finish ends the episode.
    #[default]
    Any,
    /// Episode ends once every agent is done.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackDirection {
    #[default]
    #[serde(rename = "ccw")]
    CounterClockwise,
    #[serde(rename = "cw")]
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackLine {
    #[default]
    TrackCenterLine,
    InnerLaneCenterLine,
    OuterLaneCenterLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorConfigType {
    #[default]
    FrontFacingCamera,
    StereoCameras,
    FrontFacingCameraAndLidar,
    StereoCamerasAndLidar,
    Lidar,
}

/// Typed view of the `area` namespace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AreaConfig {
    pub game_over_condition: GameOverCondition,
}

/// Typed view of the `track` namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub name: String,
    /// Finish line as normalized distance along the waypoints.
    pub finish_line: f64,
    pub direction: TrackDirection,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TRACK.to_string(),
            finish_line: 0.0,
            direction: TrackDirection::default(),
        }
    }
}

/// Start position of an agent relative to the track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StartLocation {
    pub normalized_distance: f64,
    pub track_line: TrackLine,
}

/// One racing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub shell: String,
    pub sensor_config_type: SensorConfigType,
    pub start_location: StartLocation,
    /// Lives per episode; -1 is unlimited, 0 ends the episode on the first crash.
    pub life_count: i64,
    pub lap_count: i64,
    /// Penalty seconds, only used when `life_count > 0`.
    pub offtrack_penalty: f64,
    pub crash_penalty: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            sensor_config_type: SensorConfigType::default(),
            start_location: StartLocation::default(),
            life_count: 0,
            lap_count: 1,
            offtrack_penalty: 0.0,
            crash_penalty: 0.0,
        }
    }
}

impl AgentConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Typed view of the `agents` namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRoster {
    pub roster: Vec<AgentConfig>,
}

fn agent_type() -> ValueType {
    ValueType::record([
        ("name", ValueType::string()),
        ("shell", ValueType::string()),
        (
            "sensor_config_type",
            ValueType::choice(&[
                "front_facing_camera",
                "stereo_cameras",
                "front_facing_camera_and_lidar",
                "stereo_cameras_and_lidar",
                "lidar",
            ]),
        ),
        (
            "start_location",
            ValueType::record([
                ("normalized_distance", ValueType::float_range(Some(0.0), Some(1.0))),
                (
                    "track_line",
                    ValueType::choice(&[
                        "track_center_line",
                        "inner_lane_center_line",
                        "outer_lane_center_line",
                    ]),
                ),
            ]),
        ),
        ("life_count", ValueType::integer_range(Some(-1), None)),
        ("lap_count", ValueType::integer_range(Some(1), None)),
        ("offtrack_penalty", ValueType::float_range(Some(0.0), None)),
        ("crash_penalty", ValueType::float_range(Some(0.0), None)),
    ])
}

/// Schema of the racing environment.
pub fn racing_schema() -> Result<Schema, SchemaError> {
    let default_agent = ConfigValue::from_serializable(&AgentConfig::default())
        .map_err(|e| SchemaError::Definition(e.to_string()))?;

    Schema::builder()
        .described(
            "area.game_over_condition",
            ValueType::choice(&["any", "all"]),
            "any",
            "episode ends when any or all agents are done",
        )
        .described("track.name", ValueType::string(), DEFAULT_TRACK, "track to load")
        .described(
            "track.finish_line",
            ValueType::float_range(Some(0.0), Some(1.0)),
            0.0,
            "finish line as normalized distance",
        )
        .described(
            "track.direction",
            ValueType::choice(&["ccw", "cw"]),
            "ccw",
            "driving direction",
        )
        .described(
            AGENT_ROSTER_KEY,
            ValueType::list_bounded(agent_type(), Some(1), None).unique_by("name"),
            ConfigValue::List(vec![default_agent]),
            "racing agents; at least one is always present",
        )
        .build()
}
