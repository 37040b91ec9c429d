//! Scene file format and loading
//!
//! ```toml
//! [scene]
//! name = "courtyard"
//!
//! [[nodes]]
//! name = "torch"
//! position = [0, 2, 0]
//! tags = ["light"]
//!
//! [nodes.emitter]
//! emission_rate = 30
//! shape = { type = "sphere", center = [0, 0, 0], radius = 0.2, border = true }
//!
//! [[tasks]]
//! type = "translate"
//! node = "torch"
//! offset = [4, 0, 0]
//! duration = 2.0
//! ```

use crate::config::SimConfig;
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use warp_core::{Result, Vec3, WarpError};
use warp_particles::EmitterConfig;
use warp_script::{ScriptContext, DEFAULT_SCRIPT_PRIORITY};
use warp_tasks::{
    Easing, EmitterRamp, EmitterTarget, NodeTimeWarp, TagPredicate, Translate, Wait, WaitTag,
};
use warp_world::NodeHandle;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub scene: SceneMetadata,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    #[serde(default = "default_scene_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for SceneMetadata {
    fn default() -> Self {
        Self {
            name: default_scene_name(),
            description: None,
        }
    }
}

fn default_scene_name() -> String {
    "untitled".to_string()
}

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Emitter settings, imported with `EmitterConfig::from_toml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitter: Option<toml::Table>,
    /// Inline Rhai source run as a task bound to this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskDef {
    Wait {
        duration: f32,
        #[serde(default)]
        priority: i32,
    },
    /// Exactly one of `tag`, `all` or `any`
    WaitTag {
        node: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(default = "default_true")]
        present: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        all: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        any: Vec<String>,
        #[serde(default)]
        priority: i32,
    },
    /// Exactly one of `duration` or `speed`
    Translate {
        node: String,
        offset: [f32; 3],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f32>,
        #[serde(default)]
        easing: Easing,
        #[serde(default)]
        priority: i32,
    },
    /// Ramp the node's local time multiplier
    TimeWarp {
        node: String,
        #[serde(default = "default_one")]
        from: f32,
        to: f32,
        duration: f32,
        #[serde(default)]
        priority: i32,
    },
    EmitterRate {
        node: String,
        rate: f32,
        duration: f32,
        #[serde(default)]
        easing: Easing,
        #[serde(default)]
        priority: i32,
    },
    EmitterSpeed {
        node: String,
        min: f32,
        max: f32,
        duration: f32,
        #[serde(default)]
        easing: Easing,
        #[serde(default)]
        priority: i32,
    },
    EmitterRadius {
        node: String,
        radius: f32,
        duration: f32,
        #[serde(default)]
        easing: Easing,
        #[serde(default)]
        priority: i32,
    },
    /// Inline `source` or a `file` relative to the scene
    Script {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        #[serde(default = "default_script_priority")]
        priority: i32,
    },
}

fn default_script_priority() -> i32 {
    DEFAULT_SCRIPT_PRIORITY
}

impl TaskDef {
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskDef::Wait { .. } => "wait",
            TaskDef::WaitTag { .. } => "wait_tag",
            TaskDef::Translate { .. } => "translate",
            TaskDef::TimeWarp { .. } => "time_warp",
            TaskDef::EmitterRate { .. } => "emitter_rate",
            TaskDef::EmitterSpeed { .. } => "emitter_speed",
            TaskDef::EmitterRadius { .. } => "emitter_radius",
            TaskDef::Script { .. } => "script",
        }
    }

    /// True for tasks that act on the node's emitter
    pub fn needs_emitter(&self) -> bool {
        matches!(
            self,
            TaskDef::EmitterRate { .. }
                | TaskDef::EmitterSpeed { .. }
                | TaskDef::EmitterRadius { .. }
        )
    }

    /// Emitter ramp described by this entry, if it is one
    fn emitter_ramp(&self) -> Option<(EmitterTarget, f32, Easing, i32)> {
        match self {
            TaskDef::EmitterRate {
                rate,
                duration,
                easing,
                priority,
                ..
            } => Some((EmitterTarget::Rate(*rate), *duration, *easing, *priority)),
            TaskDef::EmitterSpeed {
                min,
                max,
                duration,
                easing,
                priority,
                ..
            } => Some((
                EmitterTarget::Speed {
                    min: *min,
                    max: *max,
                },
                *duration,
                *easing,
                *priority,
            )),
            TaskDef::EmitterRadius {
                radius,
                duration,
                easing,
                priority,
                ..
            } => Some((EmitterTarget::Radius(*radius), *duration, *easing, *priority)),
            _ => None,
        }
    }

    /// Checks on fields that must come in exclusive groups
    fn check_fields(&self) -> Result<()> {
        self.tag_predicate()?;
        match self {
            TaskDef::Translate {
                duration, speed, ..
            } if duration.is_some() == speed.is_some() => Err(WarpError::invalid(
                "translate task",
                "duration",
                "exactly one of `duration` or `speed`",
            )),
            TaskDef::Script { source, file, .. } if source.is_some() == file.is_some() => {
                Err(WarpError::invalid(
                    "script task",
                    "source",
                    "exactly one of `source` or `file`",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Node this task refers to by name, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            TaskDef::Wait { .. } => None,
            TaskDef::WaitTag { node, .. }
            | TaskDef::Translate { node, .. }
            | TaskDef::TimeWarp { node, .. }
            | TaskDef::EmitterRate { node, .. }
            | TaskDef::EmitterSpeed { node, .. }
            | TaskDef::EmitterRadius { node, .. } => Some(node),
            TaskDef::Script { node, .. } => node.as_deref(),
        }
    }

    fn tag_predicate(&self) -> Result<Option<TagPredicate>> {
        let TaskDef::WaitTag {
            tag,
            present,
            all,
            any,
            ..
        } = self
        else {
            return Ok(None);
        };
        let given = tag.is_some() as u8 + !all.is_empty() as u8 + !any.is_empty() as u8;
        if given != 1 {
            return Err(WarpError::invalid(
                "wait_tag task",
                "tag",
                "exactly one of `tag`, `all` or `any`",
            ));
        }
        let predicate = match tag {
            Some(tag) => TagPredicate::Has {
                tag: tag.clone(),
                present: *present,
            },
            None if !all.is_empty() => TagPredicate::All(all.clone()),
            None => TagPredicate::Any(any.clone()),
        };
        Ok(Some(predicate))
    }
}

/// A problem found by `SceneFile::validate`
#[derive(Debug)]
pub struct SceneIssue {
    /// Node name, or `tasks[i]` for task entries
    pub location: String,
    pub error: WarpError,
}

impl FromStr for SceneFile {
    type Err = WarpError;

    fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl SceneFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scene: SceneMetadata {
                name: name.into(),
                description: None,
            },
            ..Self::default()
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every emitter and task entry without building a world.
    /// Reports the first error per node and per task.
    pub fn validate(&self) -> Vec<SceneIssue> {
        let mut issues = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let with_emitter: std::collections::HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| n.emitter.is_some())
            .map(|n| n.name.as_str())
            .collect();

        for node in &self.nodes {
            if !seen.insert(node.name.as_str()) {
                issues.push(SceneIssue {
                    location: node.name.clone(),
                    error: WarpError::DuplicateNodeName(node.name.clone()),
                });
                continue;
            }
            if let Some(table) = &node.emitter {
                if let Err(error) = EmitterConfig::from_toml(table) {
                    issues.push(SceneIssue {
                        location: node.name.clone(),
                        error,
                    });
                }
            }
        }

        for (i, task) in self.tasks.iter().enumerate() {
            let location = format!("tasks[{}]", i);
            if let Some(name) = task.node() {
                if !seen.contains(name) {
                    issues.push(SceneIssue {
                        location,
                        error: WarpError::NodeNotFound(name.to_string()),
                    });
                    continue;
                }
                if task.needs_emitter() && !with_emitter.contains(name) {
                    issues.push(SceneIssue {
                        location,
                        error: WarpError::invalid(
                            task.type_name(),
                            "node",
                            "a node with an emitter",
                        ),
                    });
                    continue;
                }
            }
            if let Err(error) = task.check_fields() {
                issues.push(SceneIssue { location, error });
            }
        }
        issues
    }

    /// Build a world. Script files resolve against `base_dir`.
    pub fn build(&self, config: &SimConfig, base_dir: &Path) -> Result<World> {
        let mut world = World::new(config);

        for def in &self.nodes {
            let node = world.spawn_node(&def.name, Vec3::from_array(def.position))?;
            for tag in &def.tags {
                world.nodes_mut().add_tag(node, tag.as_str());
            }
            if let Some(table) = &def.emitter {
                let mut emitter = EmitterConfig::from_toml(table)?;
                if !table.contains_key("max_particles") {
                    emitter.max_particles = config.particles.default_max;
                }
                world.attach_emitter(node, emitter)?;
            }
            if let Some(source) = &def.script {
                let context = ScriptContext::for_node(node)
                    .with_priority(def.script_priority.unwrap_or(DEFAULT_SCRIPT_PRIORITY));
                world.run_script(&def.name, source, context)?;
            }
        }

        for task in &self.tasks {
            spawn_task_def(&mut world, task, base_dir)?;
        }

        tracing::info!(
            scene = %self.scene.name,
            nodes = self.nodes.len(),
            tasks = self.tasks.len(),
            "scene loaded"
        );
        Ok(world)
    }
}

fn resolve_node(world: &World, name: &str) -> Result<NodeHandle> {
    world
        .nodes()
        .find(name)
        .ok_or_else(|| WarpError::NodeNotFound(name.to_string()))
}

fn spawn_task_def(world: &mut World, def: &TaskDef, base_dir: &Path) -> Result<()> {
    def.check_fields()?;
    match def {
        TaskDef::Wait { duration, priority } => {
            world.spawn_task(Wait::new(*duration).with_priority(*priority));
        }
        TaskDef::WaitTag { node, priority, .. } => {
            let node = resolve_node(world, node)?;
            if let Some(predicate) = def.tag_predicate()? {
                world.spawn_task(WaitTag::new(node, predicate).with_priority(*priority));
            }
        }
        TaskDef::Translate {
            node,
            offset,
            duration,
            speed,
            easing,
            priority,
        } => {
            let node = resolve_node(world, node)?;
            let offset = Vec3::from_array(*offset);
            let task = match speed {
                Some(speed) => Translate::at_speed(node, offset, *speed),
                None => Translate::new(node, offset, duration.unwrap_or(0.0)),
            };
            world.spawn_task(task.with_easing(*easing).with_priority(*priority));
        }
        TaskDef::TimeWarp {
            node,
            from,
            to,
            duration,
            priority,
        } => {
            let node = resolve_node(world, node)?;
            let task = NodeTimeWarp::new(node, *from, *to, *duration).with_priority(*priority);
            world.spawn_task(task);
        }
        TaskDef::EmitterRate { node, .. }
        | TaskDef::EmitterSpeed { node, .. }
        | TaskDef::EmitterRadius { node, .. } => {
            let node = resolve_node(world, node)?;
            if let Some((target, duration, easing, priority)) = def.emitter_ramp() {
                let task = EmitterRamp::new(node, target, duration)
                    .with_easing(easing)
                    .with_priority(priority);
                world.spawn_task(task);
            }
        }
        TaskDef::Script {
            name,
            node,
            source,
            file,
            priority,
        } => {
            let node = node.as_deref().map(|n| resolve_node(world, n)).transpose()?;
            let context = ScriptContext {
                node,
                priority: *priority,
            };
            match (source, file) {
                (Some(source), None) => {
                    let name = name.as_deref().unwrap_or("inline");
                    world.run_script(name, source, context)?;
                }
                (None, Some(file)) => {
                    let path = base_dir.join(file);
                    let ast = world.scripts().compile_file(&path)?;
                    let name = match name {
                        Some(n) => n.clone(),
                        None => file.display().to_string(),
                    };
                    world.scripts().spawn_ast(&name, ast, context);
                }
                _ => {
                    return Err(WarpError::invalid(
                        "script task",
                        "source",
                        "exactly one of `source` or `file`",
                    ))
                }
            }
        }
    }
    Ok(())
}

/// Load and build a scene from a TOML file
pub fn load_scene<P: AsRef<Path>>(path: P, config: &SimConfig) -> Result<(World, SceneFile)> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let scene: SceneFile = content.parse()?;
    let world = scene.build(config, base_dir)?;
    Ok((world, scene))
}

/// Load and build a scene from a TOML string. Script files resolve against
/// the working directory.
pub fn load_scene_string(content: &str, config: &SimConfig) -> Result<(World, SceneFile)> {
    let scene: SceneFile = content.parse()?;
    let world = scene.build(config, Path::new("."))?;
    Ok((world, scene))
}
