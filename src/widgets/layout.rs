use crate::model::{FieldGroup, FieldSchema};
use std::collections::HashMap;

/// Fields whose `group` matches no declared group land here.
pub const DEFAULT_GROUP: &str = "general";

/// How the group partition is presented; a pure function of terminal
/// width and group count, re-evaluated on every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Stacked,
    Tabs,
    Accordion,
}

pub const NARROW_WIDTH: u16 = 90;

pub fn layout_mode(width: u16, group_count: usize) -> LayoutMode {
    if group_count <= 1 {
        LayoutMode::Stacked
    } else if width >= NARROW_WIDTH {
        LayoutMode::Tabs
    } else {
        LayoutMode::Accordion
    }
}

#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub name: String,
    pub label: String,
    pub collapsible: bool,
}

/// Partition of the field list into named groups, with per-group
/// expand/collapse (accordion) and a single active selector (tabs).
pub struct GroupLayout {
    groups: Vec<GroupEntry>,
    expanded: HashMap<String, bool>,
    pub active: usize,
}

impl GroupLayout {
    pub fn new(declared: &[FieldGroup], fields: &[FieldSchema]) -> Self {
        let mut groups: Vec<GroupEntry> = declared
            .iter()
            .map(|g| GroupEntry {
                name: g.name.clone(),
                label: g.label.clone(),
                collapsible: g.collapsible,
            })
            .collect();
        let known = |name: &str| declared.iter().any(|g| g.name == name);
        let needs_default = fields
            .iter()
            .any(|f| f.group.as_deref().map(|g| !known(g)).unwrap_or(true));
        if needs_default {
            groups.push(GroupEntry {
                name: DEFAULT_GROUP.to_string(),
                label: "General".to_string(),
                collapsible: false,
            });
        }
        let mut expanded = HashMap::new();
        for g in declared {
            expanded.insert(g.name.clone(), g.default_expanded);
        }
        expanded.insert(DEFAULT_GROUP.to_string(), true);
        Self {
            groups,
            expanded,
            active: 0,
        }
    }

    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    pub fn active_group(&self) -> Option<&GroupEntry> {
        self.groups.get(self.active)
    }

    /// Resolve the group a field belongs to (unknown names fall back to
    /// the implicit default group).
    pub fn group_of<'a>(&'a self, field: &'a FieldSchema) -> &'a str {
        match &field.group {
            Some(g) if self.groups.iter().any(|e| &e.name == g) => g,
            _ => DEFAULT_GROUP,
        }
    }

    pub fn fields_for<'a>(
        &self,
        name: &str,
        fields: &'a [FieldSchema],
    ) -> Vec<&'a FieldSchema> {
        fields.iter().filter(|f| self.group_of(f) == name).collect()
    }

    /// Non-collapsible groups are pinned expanded.
    pub fn is_expanded(&self, name: &str) -> bool {
        let collapsible = self
            .groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.collapsible)
            .unwrap_or(false);
        if !collapsible {
            return true;
        }
        self.expanded.get(name).copied().unwrap_or(true)
    }

    /// Accordion toggle; ignored for non-collapsible groups.
    pub fn toggle(&mut self, name: &str) {
        let collapsible = self
            .groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.collapsible)
            .unwrap_or(false);
        if !collapsible {
            return;
        }
        let cur = self.expanded.get(name).copied().unwrap_or(true);
        self.expanded.insert(name.to_string(), !cur);
    }

    pub fn next_tab(&mut self) {
        if !self.groups.is_empty() {
            self.active = (self.active + 1) % self.groups.len();
        }
    }

    pub fn prev_tab(&mut self) {
        if !self.groups.is_empty() {
            self.active = (self.active + self.groups.len() - 1) % self.groups.len();
        }
    }
}
