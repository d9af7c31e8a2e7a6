use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Logical reference to an element, by numeric ids or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRef {
    Id { agent_id: i32, element_id: i32 },
    Name(String),
}

impl ElementRef {
    pub fn id(agent_id: i32, element_id: i32) -> Self {
        Self::Id {
            agent_id,
            element_id,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::Id {
                agent_id,
                element_id,
            } => write!(f, "{agent_id}/{element_id}"),
            ElementRef::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// Activity state reported for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    Active,
    Paused,
    Stopped,
    Error,
    Undefined,
}

/// Resolved identity of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub agent_id: i32,
    pub element_id: i32,
    pub name: String,
    /// Protocol the element runs, e.g. `"Ateme Titan Edge"`.
    pub protocol: String,
    pub state: ElementState,
}

impl ElementInfo {
    pub fn is_active(&self) -> bool {
        self.state == ElementState::Active
    }

    fn matches(&self, reference: &ElementRef) -> bool {
        match reference {
            ElementRef::Id {
                agent_id,
                element_id,
            } => self.agent_id == *agent_id && self.element_id == *element_id,
            ElementRef::Name(name) => self.name == *name,
        }
    }
}

/// Resolves element references to ids and activity state.
pub trait TargetLookup: Send + Sync {
    fn resolve(&self, reference: &ElementRef) -> Result<ElementInfo>;
}

/// Fixed, in-process element directory.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    elements: RwLock<HashMap<(i32, i32), ElementInfo>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `info`, replacing any element with the same ids.
    pub fn with_element(self, info: ElementInfo) -> Self {
        self.insert(info);
        self
    }

    pub fn insert(&self, info: ElementInfo) {
        write(&self.elements).insert((info.agent_id, info.element_id), info);
    }

    /// Update the activity state of a registered element.
    ///
    /// Returns `false` if no element has these ids.
    pub fn set_state(&self, agent_id: i32, element_id: i32, state: ElementState) -> bool {
        match write(&self.elements).get_mut(&(agent_id, element_id)) {
            Some(info) => {
                info.state = state;
                true
            }
            None => false,
        }
    }
}

impl TargetLookup for StaticDirectory {
    fn resolve(&self, reference: &ElementRef) -> Result<ElementInfo> {
        read(&self.elements)
            .values()
            .find(|info| info.matches(reference))
            .cloned()
            .ok_or_else(|| TransportError::ElementNotFound(reference.clone()))
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
