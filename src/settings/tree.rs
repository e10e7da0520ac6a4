//! SettingsTree - settings snapshot synchronized with the engine

use super::node::{SettingLeaf, SettingNode, SettingValue};
use super::path::SettingPath;
use super::SettingsError;
use crate::bridge::NativeBridge;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings loaded from one engine snapshot
///
/// Each leaf follows `Synced(v) -> edit -> Synced(new)` when the engine accepts
/// the write and stays `Synced(v)` when it refuses. The engine call is
/// synchronous, so no pending state is ever observable.
pub struct SettingsTree {
    root: SettingNode,
    bridge: Arc<dyn NativeBridge>,
}

impl SettingsTree {
    /// Load a full snapshot from the engine
    pub fn load(bridge: Arc<dyn NativeBridge>) -> Result<Self, SettingsError> {
        let snapshot = bridge
            .settings_get()
            .ok_or(SettingsError::SnapshotUnavailable)?;
        Self::from_json(&snapshot, bridge)
    }

    pub fn from_json(text: &str, bridge: Arc<dyn NativeBridge>) -> Result<Self, SettingsError> {
        let document: serde_json::Value = serde_json::from_str(text)?;
        let root = SettingNode::from_json(&document)?;
        info!("Settings snapshot loaded ({} settings)", root.leaf_count());
        Ok(Self { root, bridge })
    }

    pub fn root(&self) -> &SettingNode {
        &self.root
    }

    pub fn node(&self, path: &SettingPath) -> Result<&SettingNode, SettingsError> {
        self.root
            .descend(path)
            .ok_or_else(|| SettingsError::NotFound(path.to_string()))
    }

    pub fn leaf(&self, path: &SettingPath) -> Result<&SettingLeaf, SettingsError> {
        self.node(path)?
            .as_leaf()
            .ok_or_else(|| SettingsError::NotALeaf(path.to_string()))
    }

    fn leaf_mut(&mut self, path: &SettingPath) -> Result<&mut SettingLeaf, SettingsError> {
        match self.root.descend_mut(path) {
            Some(SettingNode::Leaf(leaf)) => Ok(leaf),
            Some(SettingNode::Group(_)) => Err(SettingsError::NotALeaf(path.to_string())),
            None => Err(SettingsError::NotFound(path.to_string())),
        }
    }

    /// Current (last confirmed) value of a leaf
    pub fn get(&self, path: &SettingPath) -> Result<SettingValue, SettingsError> {
        self.leaf(path)?
            .value()
            .ok_or_else(|| SettingsError::NotEditable(path.to_string()))
    }

    pub fn is_modified(&self, path: &SettingPath) -> Result<bool, SettingsError> {
        Ok(self.leaf(path)?.is_modified())
    }

    /// Key followed by ` *` when the leaf differs from its default
    pub fn display_title(&self, path: &SettingPath) -> Result<String, SettingsError> {
        let key = path.key().unwrap_or_default();
        let marker = if self.is_modified(path)? { " *" } else { "" };
        Ok(format!("{}{}", key, marker))
    }

    /// Children of a group, in document order
    pub fn children(
        &self,
        path: &SettingPath,
    ) -> Result<Vec<(&str, &SettingNode)>, SettingsError> {
        match self.node(path)? {
            SettingNode::Group(children) => Ok(children
                .iter()
                .map(|(key, node)| (key.as_str(), node))
                .collect()),
            SettingNode::Leaf(_) => Err(SettingsError::NotAGroup(path.to_string())),
        }
    }

    /// Keys of a group containing `query` (case-insensitive)
    pub fn search(&self, path: &SettingPath, query: &str) -> Result<Vec<&str>, SettingsError> {
        let needle = query.to_lowercase();
        Ok(self
            .children(path)?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.to_lowercase().contains(&needle))
            .collect())
    }

    /// Write a value through the engine.
    ///
    /// The local value changes only when the engine accepts it.
    pub fn set(&mut self, path: &SettingPath, value: SettingValue) -> Result<(), SettingsError> {
        self.leaf(path)?.validate(path, &value)?;
        let message = format!("Failed to assign {} value {}", path, value);
        self.commit(path, value, message)
    }

    /// Parse user input for the leaf's type, then [`set`](Self::set) it
    pub fn set_raw(&mut self, path: &SettingPath, raw: &str) -> Result<(), SettingsError> {
        let value = self.leaf(path)?.decode(path, raw)?;
        self.set(path, value)
    }

    /// Write the leaf's recorded default through the engine
    pub fn reset(&mut self, path: &SettingPath) -> Result<(), SettingsError> {
        let leaf = self.leaf(path)?;
        let default = leaf
            .default_value()
            .ok_or_else(|| SettingsError::NotEditable(path.to_string()))?;
        let message = format!("Failed to reset {}", path.key().unwrap_or_default());
        self.commit(path, default, message)
    }

    fn commit(
        &mut self,
        path: &SettingPath,
        value: SettingValue,
        failure_message: String,
    ) -> Result<(), SettingsError> {
        let encoded_path = path.encode();
        let encoded_value = value.encode();
        debug!("settings_set({}, {})", encoded_path, encoded_value);

        if !self.bridge.settings_set(&encoded_path, &encoded_value) {
            warn!("Engine rejected {} = {}", encoded_path, encoded_value);
            return Err(SettingsError::Rejected(failure_message));
        }

        self.leaf_mut(path)?.apply(value);
        info!("Setting {} updated", path.title());
        Ok(())
    }
}
