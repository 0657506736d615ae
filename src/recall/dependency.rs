// RecallDependency - declared reference from one template to another

use crate::recall::{RecallHandle, RecallType};

/// A dependency declared on a template and resolved per group
///
/// On templates `resolved` is always `None`. Runtime instances carry a copy
/// with `resolved` pointing at the runtime sibling of `template` that shares
/// their group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallDependency {
    pub template: RecallHandle,
    pub recall_type: RecallType,
    pub resolved: Option<RecallHandle>,
}

impl RecallDependency {
    pub fn new(template: RecallHandle, recall_type: RecallType) -> Self {
        Self {
            template,
            recall_type,
            resolved: None,
        }
    }

    pub fn resolved_to(self, resolved: RecallHandle) -> Self {
        Self {
            resolved: Some(resolved),
            ..self
        }
    }
}
