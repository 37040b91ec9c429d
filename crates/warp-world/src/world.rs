//! NodeWorld - named nodes with position and tags

use bimap::BiMap;
use std::collections::BTreeSet;
use warp_core::{Result, Vec3, WarpError};

/// Non-owning, generation-checked reference to a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(hecs::Entity);

impl NodeHandle {
    /// Opaque integer form, handed to the scripting host
    pub fn to_bits(self) -> u64 {
        self.0.to_bits().get()
    }

    pub fn from_bits(bits: u64) -> Option<Self> {
        hecs::Entity::from_bits(bits).map(NodeHandle)
    }

    pub fn entity(self) -> hecs::Entity {
        self.0
    }
}

struct Position(Vec3);

struct Tags(BTreeSet<String>);

/// Local speed-up applied on top of the global dilation
struct TimeScale(f32);

/// Emitter parameters exposed on a node so tasks can ramp them.
///
/// The particle system seeds this from the node's emitter and copies it back
/// into every emitter on the node each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmitterControls {
    /// Particles per dilated second
    pub emission_rate: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    /// Only sphere shapes have a radius
    pub radius: Option<f32>,
}

/// Spawn order, for deterministic lookups
struct Spawned(u64);

/// The node world
///
/// Wraps hecs::World with:
/// - Unique node names
/// - Position and tag set per node
/// - Handles that go stale when the node is despawned
pub struct NodeWorld {
    world: hecs::World,
    names: BiMap<String, hecs::Entity>,
    next_seq: u64,
}

impl Default for NodeWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeWorld {
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            names: BiMap::new(),
            next_seq: 0,
        }
    }

    /// Spawn a node with a unique name
    pub fn spawn(&mut self, name: impl Into<String>, position: Vec3) -> Result<NodeHandle> {
        let name = name.into();
        if self.names.contains_left(&name) {
            return Err(WarpError::DuplicateNodeName(name));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let entity = self
            .world
            .spawn((
                Position(position),
                Tags(BTreeSet::new()),
                TimeScale(1.0),
                Spawned(seq),
            ));
        tracing::debug!(node = %name, "spawned node");
        self.names.insert(name, entity);
        Ok(NodeHandle(entity))
    }

    /// Despawn a node. Outstanding handles become invalid.
    pub fn despawn(&mut self, handle: NodeHandle) -> Result<()> {
        self.world
            .despawn(handle.0)
            .map_err(|_| WarpError::NodeNotFound(format!("{:?}", handle.0)))?;
        if let Some((name, _)) = self.names.remove_by_right(&handle.0) {
            tracing::debug!(node = %name, "despawned node");
        }
        Ok(())
    }

    pub fn is_valid(&self, handle: NodeHandle) -> bool {
        self.world.contains(handle.0)
    }

    pub fn position(&self, handle: NodeHandle) -> Option<Vec3> {
        self.world.get::<&Position>(handle.0).ok().map(|p| p.0)
    }

    /// Returns false if the node no longer exists
    pub fn set_position(&mut self, handle: NodeHandle, position: Vec3) -> bool {
        match self.world.get::<&mut Position>(handle.0) {
            Ok(mut p) => {
                p.0 = position;
                true
            }
            Err(_) => false,
        }
    }

    pub fn tags(&self, handle: NodeHandle) -> Option<BTreeSet<String>> {
        self.world.get::<&Tags>(handle.0).ok().map(|t| t.0.clone())
    }

    pub fn has_tag(&self, handle: NodeHandle, tag: &str) -> bool {
        self.world
            .get::<&Tags>(handle.0)
            .map(|t| t.0.contains(tag))
            .unwrap_or(false)
    }

    pub fn add_tag(&mut self, handle: NodeHandle, tag: impl Into<String>) -> bool {
        match self.world.get::<&mut Tags>(handle.0) {
            Ok(mut t) => {
                t.0.insert(tag.into());
                true
            }
            Err(_) => false,
        }
    }

    pub fn remove_tag(&mut self, handle: NodeHandle, tag: &str) -> bool {
        match self.world.get::<&mut Tags>(handle.0) {
            Ok(mut t) => t.0.remove(tag),
            Err(_) => false,
        }
    }

    /// The node's local time multiplier, 1 unless something warped it
    pub fn time_multiplier(&self, handle: NodeHandle) -> Option<f32> {
        self.world.get::<&TimeScale>(handle.0).ok().map(|t| t.0)
    }

    /// Negative and non-finite multipliers are stored as 0 (frozen).
    /// Returns false if the node no longer exists.
    pub fn set_time_multiplier(&mut self, handle: NodeHandle, multiplier: f32) -> bool {
        let multiplier = if multiplier.is_finite() {
            multiplier.max(0.0)
        } else {
            0.0
        };
        match self.world.get::<&mut TimeScale>(handle.0) {
            Ok(mut t) => {
                t.0 = multiplier;
                true
            }
            Err(_) => false,
        }
    }

    /// None if the node is gone or has no emitter
    pub fn emitter_controls(&self, handle: NodeHandle) -> Option<EmitterControls> {
        self.world
            .get::<&EmitterControls>(handle.0)
            .ok()
            .map(|c| *c)
    }

    /// Returns false if the node no longer exists
    pub fn set_emitter_controls(&mut self, handle: NodeHandle, controls: EmitterControls) -> bool {
        self.world.insert_one(handle.0, controls).is_ok()
    }

    pub fn find(&self, name: &str) -> Option<NodeHandle> {
        self.names.get_by_left(name).copied().map(NodeHandle)
    }

    pub fn name(&self, handle: NodeHandle) -> Option<&str> {
        self.names.get_by_right(&handle.0).map(String::as_str)
    }

    /// Earliest-spawned node carrying `tag`
    pub fn first_with_tag(&self, tag: &str) -> Option<NodeHandle> {
        let mut query = self.world.query::<(&Tags, &Spawned)>();
        query
            .iter()
            .filter(|(_, (tags, _))| tags.0.contains(tag))
            .min_by_key(|(_, (_, seq))| seq.0)
            .map(|(entity, _)| NodeHandle(entity))
    }

    /// Every node carrying `tag`, in spawn order
    pub fn nodes_with_tag(&self, tag: &str) -> Vec<NodeHandle> {
        let mut query = self.world.query::<(&Tags, &Spawned)>();
        let mut found: Vec<(u64, NodeHandle)> = query
            .iter()
            .filter(|(_, (tags, _))| tags.0.contains(tag))
            .map(|(entity, (_, seq))| (seq.0, NodeHandle(entity)))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, h)| h).collect()
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.world.clear();
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_find() {
        let mut world = NodeWorld::new();
        let ship = world.spawn("ship", Vec3::new(1.0, 2.0, 3.0)).unwrap();

        assert_eq!(world.find("ship"), Some(ship));
        assert_eq!(world.name(ship), Some("ship"));
        assert_eq!(world.position(ship), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut world = NodeWorld::new();
        world.spawn("ship", Vec3::ZERO).unwrap();
        assert!(matches!(
            world.spawn("ship", Vec3::ZERO),
            Err(WarpError::DuplicateNodeName(_))
        ));
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut world = NodeWorld::new();
        let old = world.spawn("a", Vec3::ZERO).unwrap();
        world.despawn(old).unwrap();
        let new = world.spawn("b", Vec3::ONE).unwrap();

        assert!(!world.is_valid(old));
        assert!(world.is_valid(new));
        assert!(world.position(old).is_none());
        assert!(!world.set_position(old, Vec3::UP));
        assert!(!world.has_tag(old, "x"));
        assert!(world.find("a").is_none());
        assert!(world.despawn(old).is_err());
    }

    #[test]
    fn test_tags() {
        let mut world = NodeWorld::new();
        let n = world.spawn("door", Vec3::ZERO).unwrap();
        assert!(world.add_tag(n, "open"));
        assert!(world.has_tag(n, "open"));
        assert!(world.remove_tag(n, "open"));
        assert!(!world.has_tag(n, "open"));
        assert!(!world.remove_tag(n, "open"));
    }

    #[test]
    fn test_first_with_tag_uses_spawn_order() {
        let mut world = NodeWorld::new();
        let a = world.spawn("a", Vec3::ZERO).unwrap();
        let b = world.spawn("b", Vec3::ZERO).unwrap();
        world.add_tag(b, "enemy");
        world.add_tag(a, "enemy");

        assert_eq!(world.first_with_tag("enemy"), Some(a));
        assert_eq!(world.nodes_with_tag("enemy"), vec![a, b]);
        assert!(world.first_with_tag("boss").is_none());
    }

    #[test]
    fn test_time_multiplier_defaults_and_clamps() {
        let mut world = NodeWorld::new();
        let n = world.spawn("n", Vec3::ZERO).unwrap();
        assert_eq!(world.time_multiplier(n), Some(1.0));

        assert!(world.set_time_multiplier(n, 2.5));
        assert_eq!(world.time_multiplier(n), Some(2.5));
        world.set_time_multiplier(n, -1.0);
        assert_eq!(world.time_multiplier(n), Some(0.0));
        world.set_time_multiplier(n, f32::NAN);
        assert_eq!(world.time_multiplier(n), Some(0.0));

        world.despawn(n).unwrap();
        assert!(!world.set_time_multiplier(n, 1.0));
        assert!(world.time_multiplier(n).is_none());
    }

    #[test]
    fn test_emitter_controls_are_optional() {
        let mut world = NodeWorld::new();
        let n = world.spawn("torch", Vec3::ZERO).unwrap();
        assert!(world.emitter_controls(n).is_none());

        let controls = EmitterControls {
            emission_rate: 12.0,
            speed_min: 1.0,
            speed_max: 2.0,
            radius: None,
        };
        assert!(world.set_emitter_controls(n, controls));
        assert_eq!(world.emitter_controls(n), Some(controls));

        world.despawn(n).unwrap();
        assert!(!world.set_emitter_controls(n, controls));
    }

    #[test]
    fn test_handle_bits_roundtrip() {
        let mut world = NodeWorld::new();
        let n = world.spawn("n", Vec3::ZERO).unwrap();
        assert_eq!(NodeHandle::from_bits(n.to_bits()), Some(n));
        assert!(NodeHandle::from_bits(0).is_none());
    }
}
