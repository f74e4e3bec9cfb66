//! Per-plot selection store
//!
//! Selections move through `Proposed -> Active -> (Edited)* -> Removed`.
//! A [`ProposedSelection`] is a drawn region without identity; activating it
//! assigns an id that is never handed out again for this plot. Id and kind
//! are fixed for the lifetime of a selection. Geometry edits require
//! `fixed == false`, style edits are always allowed.

use beamplot_shared::selections::new_selection_id;
use beamplot_shared::{
    PlotError, PlotResult, Point2, SelectionDescriptor, SelectionKind, SelectionShape,
    SelectionStyle, StyleUpdate,
};
use std::collections::{HashMap, HashSet};

/// A finished drawing that has not been committed yet
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedSelection {
    pub start: Point2,
    pub shape: SelectionShape,
    pub style: SelectionStyle,
}

impl ProposedSelection {
    pub fn new(start: Point2, shape: SelectionShape) -> Self {
        Self {
            start,
            shape,
            style: SelectionStyle::default(),
        }
    }

    pub fn with_style(mut self, style: SelectionStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SelectionSet {
    plot_id: String,
    active: Vec<SelectionDescriptor>,
    issued_ids: HashSet<String>,
}

impl SelectionSet {
    pub fn new(plot_id: impl Into<String>) -> Self {
        Self {
            plot_id: plot_id.into(),
            active: Vec::new(),
            issued_ids: HashSet::new(),
        }
    }

    pub fn plot_id(&self) -> &str {
        &self.plot_id
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SelectionDescriptor> {
        self.active.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionDescriptor> {
        self.active.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.active.iter().map(|s| s.id.clone()).collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.active.iter().position(|s| s.id == id)
    }

    fn not_found(&self, id: &str) -> PlotError {
        PlotError::SelectionNotFound {
            plot_id: self.plot_id.clone(),
            id: id.to_string(),
        }
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = new_selection_id();
            if !self.issued_ids.contains(&id) {
                return id;
            }
        }
    }

    /// First free `<kind><n>` name, counting from zero
    fn default_name(&self, proposed: &ProposedSelection) -> String {
        let kind = proposed.shape.kind();
        (0..)
            .map(|n| format!("{kind}{n}"))
            .find(|name| self.active.iter().all(|s| &s.style.name != name))
            .unwrap_or_default()
    }

    /// Build the descriptor `proposed` would become without storing it
    pub fn prepare(&self, proposed: ProposedSelection) -> PlotResult<SelectionDescriptor> {
        let mut style = proposed.style.clone();
        if style.name.is_empty() {
            style.name = self.default_name(&proposed);
        }
        SelectionDescriptor::new(self.fresh_id(), proposed.start, proposed.shape)?.with_style(style)
    }

    /// Commit a selection built with [`SelectionSet::prepare`]
    pub fn insert(&mut self, selection: SelectionDescriptor) -> PlotResult<()> {
        selection.validate()?;
        if self.issued_ids.contains(&selection.id) {
            return Err(PlotError::InvalidSelection {
                message: format!("selection id {} has already been used", selection.id),
            });
        }
        self.issued_ids.insert(selection.id.clone());
        self.active.push(selection);
        Ok(())
    }

    /// `Proposed -> Active`
    pub fn activate(&mut self, proposed: ProposedSelection) -> PlotResult<SelectionDescriptor> {
        let selection = self.prepare(proposed)?;
        self.insert(selection.clone())?;
        Ok(selection)
    }

    /// Replace the whole set with selections from the server
    pub fn set_all(&mut self, selections: Vec<SelectionDescriptor>) -> PlotResult<()> {
        let mut seen = HashSet::new();
        for s in &selections {
            s.validate()?;
            if !seen.insert(s.id.as_str()) {
                return Err(PlotError::InvalidSelection {
                    message: format!("duplicate selection id {}", s.id),
                });
            }
        }
        self.issued_ids.extend(selections.iter().map(|s| s.id.clone()));
        self.active = selections;
        Ok(())
    }

    /// Add or replace selections by id; nothing changes if any is invalid
    ///
    /// A replacement must keep the kind already stored under its id.
    pub fn upsert(&mut self, selections: Vec<SelectionDescriptor>) -> PlotResult<()> {
        let mut kinds: HashMap<&str, SelectionKind> =
            self.active.iter().map(|s| (s.id.as_str(), s.kind())).collect();
        for s in &selections {
            s.validate()?;
            match kinds.get(s.id.as_str()) {
                Some(kind) if *kind != s.kind() => {
                    return Err(PlotError::SelectionKindChange {
                        id: s.id.clone(),
                        from: kind.to_string(),
                        to: s.kind().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    kinds.insert(s.id.as_str(), s.kind());
                }
            }
        }
        for s in selections {
            self.issued_ids.insert(s.id.clone());
            match self.position(&s.id) {
                Some(i) => self.active[i] = s,
                None => self.active.push(s),
            }
        }
        Ok(())
    }

    /// Style edit, allowed on fixed selections too
    pub fn update_style(&mut self, id: &str, update: &StyleUpdate) -> PlotResult<SelectionDescriptor> {
        let i = self.position(id).ok_or_else(|| self.not_found(id))?;
        let style = update.apply(&self.active[i].style)?;
        self.active[i].style = style;
        Ok(self.active[i].clone())
    }

    /// Edited geometry without storing it
    pub fn preview_geometry(
        &self,
        id: &str,
        start: Point2,
        shape: SelectionShape,
    ) -> PlotResult<SelectionDescriptor> {
        let current = self.get(id).ok_or_else(|| self.not_found(id))?;
        if current.style.fixed {
            return Err(PlotError::FixedSelection { id: id.to_string() });
        }
        if current.kind() != shape.kind() {
            return Err(PlotError::SelectionKindChange {
                id: id.to_string(),
                from: current.kind().to_string(),
                to: shape.kind().to_string(),
            });
        }
        SelectionDescriptor::new(id, start, shape)?.with_style(current.style.clone())
    }

    /// Geometry edit; rejected for fixed selections and kind changes
    pub fn update_geometry(
        &mut self,
        id: &str,
        start: Point2,
        shape: SelectionShape,
    ) -> PlotResult<SelectionDescriptor> {
        let edited = self.preview_geometry(id, start, shape)?;
        if let Some(i) = self.position(id) {
            self.active[i] = edited.clone();
        }
        Ok(edited)
    }

    pub fn remove(&mut self, id: &str) -> PlotResult<SelectionDescriptor> {
        let i = self.position(id).ok_or_else(|| self.not_found(id))?;
        Ok(self.active.remove(i))
    }

    /// Remove the listed ids, or everything for an empty list
    ///
    /// Unknown ids are skipped. Returns the removed selections.
    pub fn remove_many(&mut self, ids: &[String]) -> Vec<SelectionDescriptor> {
        if ids.is_empty() {
            return std::mem::take(&mut self.active);
        }
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|s| ids.contains(&s.id));
        self.active = kept;
        removed
    }

    pub fn clear(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64) -> ProposedSelection {
        ProposedSelection::new(
            [x, 0.0],
            SelectionShape::Rectangular {
                lengths: [1.0, 1.0],
                angle: 0.0,
            },
        )
    }

    #[test]
    fn test_add_add_remove() {
        let mut set = SelectionSet::new("p0");
        let s1 = set.activate(rect(0.0)).unwrap();
        let s2 = set.activate(rect(1.0)).unwrap();
        assert_ne!(s1.id, s2.id);
        assert_eq!(s1.id.len(), 8);

        set.remove(&s1.id).unwrap();
        assert_eq!(set.ids(), vec![s2.id.clone()]);
        assert!(matches!(
            set.remove(&s1.id),
            Err(PlotError::SelectionNotFound { .. })
        ));
    }

    #[test]
    fn test_ids_never_reused() {
        let mut set = SelectionSet::new("p0");
        let s1 = set.activate(rect(0.0)).unwrap();
        set.remove(&s1.id).unwrap();
        assert!(set.insert(s1.clone()).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_default_names() {
        let mut set = SelectionSet::new("p0");
        assert_eq!(set.activate(rect(0.0)).unwrap().style.name, "rectangular0");
        assert_eq!(set.activate(rect(1.0)).unwrap().style.name, "rectangular1");

        let named = rect(2.0).with_style(SelectionStyle {
            name: "roi".to_string(),
            ..SelectionStyle::default()
        });
        assert_eq!(set.activate(named).unwrap().style.name, "roi");

        let line = ProposedSelection::new(
            [0.0, 0.0],
            SelectionShape::Linear {
                length: 1.0,
                angle: 0.0,
            },
        );
        assert_eq!(set.activate(line).unwrap().style.name, "linear0");
    }

    #[test]
    fn test_fixed_blocks_geometry_not_style() {
        let mut set = SelectionSet::new("p0");
        let s = set
            .activate(rect(0.0).with_style(SelectionStyle {
                fixed: true,
                ..SelectionStyle::default()
            }))
            .unwrap();

        let moved = SelectionShape::Rectangular {
            lengths: [2.0, 2.0],
            angle: 0.0,
        };
        assert_eq!(
            set.update_geometry(&s.id, [5.0, 5.0], moved).unwrap_err(),
            PlotError::FixedSelection { id: s.id.clone() }
        );

        let update = StyleUpdate {
            alpha: Some(0.8),
            colour: Some(Some("#ff0000".to_string())),
            ..StyleUpdate::default()
        };
        let edited = set.update_style(&s.id, &update).unwrap();
        assert_eq!(edited.style.alpha, 0.8);
        assert_eq!(edited.start, [0.0, 0.0]);
    }

    #[test]
    fn test_kind_change_rejected() {
        let mut set = SelectionSet::new("p0");
        let s = set.activate(rect(0.0)).unwrap();
        let err = set
            .update_geometry(&s.id, [0.0, 0.0], SelectionShape::Circular { radius: 1.0 })
            .unwrap_err();
        assert!(matches!(err, PlotError::SelectionKindChange { .. }));
        assert_eq!(set.get(&s.id).unwrap().kind(), SelectionKind::Rectangular);
    }

    #[test]
    fn test_preview_does_not_store() {
        let mut set = SelectionSet::new("p0");
        let s = set.activate(rect(0.0)).unwrap();
        let shape = SelectionShape::Rectangular {
            lengths: [3.0, 3.0],
            angle: 0.0,
        };
        let preview = set.preview_geometry(&s.id, [1.0, 1.0], shape.clone()).unwrap();
        assert_eq!(preview.start, [1.0, 1.0]);
        assert_eq!(set.get(&s.id).unwrap().start, [0.0, 0.0]);

        set.update_geometry(&s.id, [1.0, 1.0], shape).unwrap();
        assert_eq!(set.get(&s.id).unwrap().start, [1.0, 1.0]);
    }

    #[test]
    fn test_upsert_is_all_or_nothing() {
        let mut set = SelectionSet::new("p0");
        let a = SelectionDescriptor::new("aaaaaaaa", [0.0, 0.0], SelectionShape::Point).unwrap();
        set.upsert(vec![a.clone()]).unwrap();

        let mut moved = a.clone();
        moved.start = [2.0, 2.0];
        let mut bad = SelectionDescriptor::new("bbbbbbbb", [0.0, 0.0], SelectionShape::Point).unwrap();
        bad.style.alpha = 2.0;

        assert!(set.upsert(vec![moved.clone(), bad]).is_err());
        assert_eq!(set.get("aaaaaaaa").unwrap().start, [0.0, 0.0]);

        set.upsert(vec![moved]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("aaaaaaaa").unwrap().start, [2.0, 2.0]);
    }

    #[test]
    fn test_upsert_keeps_kind_per_id() {
        let mut set = SelectionSet::new("p0");
        let rect = SelectionDescriptor::new(
            "abcd0001",
            [0.0, 0.0],
            SelectionShape::Rectangular {
                lengths: [1.0, 2.0],
                angle: 0.0,
            },
        )
        .unwrap();
        set.upsert(vec![rect]).unwrap();

        let circle =
            SelectionDescriptor::new("abcd0001", [0.0, 0.0], SelectionShape::Circular { radius: 1.0 })
                .unwrap();
        let other = SelectionDescriptor::new("abcd0002", [0.0, 0.0], SelectionShape::Point).unwrap();
        assert_eq!(
            set.upsert(vec![other.clone(), circle]).unwrap_err(),
            PlotError::SelectionKindChange {
                id: "abcd0001".to_string(),
                from: "rectangular".to_string(),
                to: "circular".to_string(),
            }
        );
        assert_eq!(set.get("abcd0001").unwrap().kind(), SelectionKind::Rectangular);
        assert!(set.get("abcd0002").is_none());

        // Within one batch the first occurrence fixes the kind
        let line = SelectionDescriptor::new(
            "abcd0002",
            [0.0, 0.0],
            SelectionShape::Linear {
                length: 1.0,
                angle: 0.0,
            },
        )
        .unwrap();
        assert!(set.upsert(vec![other, line]).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_set_all_and_remove_many() {
        let mut set = SelectionSet::new("p0");
        let make = |id: &str| SelectionDescriptor::new(id, [0.0, 0.0], SelectionShape::Point).unwrap();
        set.set_all(vec![make("a1"), make("b2"), make("c3")]).unwrap();
        assert!(set.set_all(vec![make("d4"), make("d4")]).is_err());
        assert_eq!(set.len(), 3);

        let removed = set.remove_many(&["b2".to_string(), "zz".to_string()]);
        assert_eq!(removed.len(), 1);
        assert_eq!(set.ids(), vec!["a1".to_string(), "c3".to_string()]);

        assert_eq!(set.remove_many(&[]).len(), 2);
        assert!(set.is_empty());
    }
}
